//! sdif - render diff output side by side

mod config;
mod diff_process;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use diff_process::{DiffCommand, Format};
use sidediff_core::{
    AmbiguousWidth, ColorMap, FoldMode, Layout, MarkPosition, Options, Session,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_WIDTH: usize = 160;

#[derive(Parser, Debug)]
#[command(name = "sdif")]
#[command(author, version, about = "Render diff output side by side")]
struct Args {
    /// A diff to render (stdin when omitted or "-"), or two files to compare
    #[arg(num_args = 0..=2)]
    files: Vec<PathBuf>,

    /// Total output width [default: $COLUMNS or 160]
    #[arg(short = 'W', long)]
    width: Option<usize>,

    /// Show line numbers
    #[arg(short = 'n', long)]
    number: bool,

    /// Digits reserved for line numbers
    #[arg(long, value_name = "N")]
    digit: Option<usize>,

    /// Show only the first slice of long lines
    #[arg(long, conflicts_with = "onword")]
    truncate: bool,

    /// Fold long lines at word boundaries
    #[arg(long)]
    onword: bool,

    /// Mark position: left, right, center, side or no
    #[arg(long)]
    mark: Option<MarkPosition>,

    /// Show each hunk as continuous old and new text
    #[arg(short, long)]
    view: bool,

    /// Width of East Asian ambiguous characters
    #[arg(long, value_enum)]
    ambiguous: Option<CliAmbiguous>,

    /// Tab stop used to expand tabs
    #[arg(long, value_name = "N")]
    tabstop: Option<usize>,

    /// When to use colors
    #[arg(long, value_enum)]
    color: Option<ColorWhen>,

    /// Set a color field, e.g. --cm OTEXT=red (repeatable)
    #[arg(long = "cm", value_name = "FIELD=SPEC")]
    colormap: Vec<String>,

    /// Compare files with unified diff output
    #[arg(short = 'u', conflicts_with_all = ["context", "unified_lines", "context_lines"])]
    unified: bool,

    /// Compare files with context diff output
    #[arg(short = 'c', conflicts_with_all = ["unified_lines", "context_lines"])]
    context: bool,

    /// Unified diff with N lines of context
    #[arg(short = 'U', value_name = "N", conflicts_with = "context_lines")]
    unified_lines: Option<usize>,

    /// Context diff with N lines of context
    #[arg(short = 'C', value_name = "N")]
    context_lines: Option<usize>,

    /// Diff command used to compare two files
    #[arg(long = "diff", value_name = "CMD", default_value = "diff")]
    diff: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliAmbiguous {
    Narrow,
    Wide,
}

impl From<CliAmbiguous> for AmbiguousWidth {
    fn from(width: CliAmbiguous) -> Self {
        match width {
            CliAmbiguous::Narrow => AmbiguousWidth::Narrow,
            CliAmbiguous::Wide => AmbiguousWidth::Wide,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ColorWhen {
    Auto,
    Always,
    Never,
}

impl Args {
    fn format(&self) -> Format {
        if self.unified {
            Format::Unified(None)
        } else if self.context {
            Format::Context(None)
        } else if let Some(n) = self.unified_lines {
            Format::Unified(Some(n))
        } else if let Some(n) = self.context_lines {
            Format::Context(Some(n))
        } else {
            Format::Normal
        }
    }
}

/// Represents input mode detected from arguments
#[derive(Debug, PartialEq, Eq)]
enum InputMode {
    /// Diff output on stdin
    Stdin,
    /// Diff output saved in a file
    DiffFile(PathBuf),
    /// Two files to run diff on
    TwoFiles { old: PathBuf, new: PathBuf },
}

fn detect_input_mode(files: &[PathBuf]) -> InputMode {
    match files {
        [old, new] => InputMode::TwoFiles {
            old: old.clone(),
            new: new.clone(),
        },
        [path] if path.as_os_str() != "-" => InputMode::DiffFile(path.clone()),
        _ => InputMode::Stdin,
    }
}

/// Layout from CLI flags, then the config file, then built-in defaults
fn layout(args: &Args, config: &Config, columns: Option<usize>) -> Layout {
    let display = &config.display;
    let fold = if args.truncate {
        FoldMode::Truncate
    } else if args.onword {
        FoldMode::Word
    } else {
        config.fold_mode().unwrap_or_default()
    };

    Layout {
        width: args
            .width
            .or(display.width)
            .or(columns)
            .unwrap_or(DEFAULT_WIDTH),
        digits: (args.number || display.number).then(|| args.digit.unwrap_or(display.digit)),
        mark: args.mark.or_else(|| config.mark_position()).unwrap_or_default(),
        fold,
        ambiguous: args
            .ambiguous
            .map(AmbiguousWidth::from)
            .or_else(|| config.ambiguous_width())
            .unwrap_or_default(),
        tabstop: args.tabstop.unwrap_or(display.tabstop),
    }
}

fn colors(args: &Args, config: &Config, terminal: bool) -> Result<ColorMap> {
    let when = args.color.unwrap_or_else(|| match config.display.color.as_deref() {
        Some("always") => ColorWhen::Always,
        Some("never") => ColorWhen::Never,
        _ => ColorWhen::Auto,
    });
    let enabled = match when {
        ColorWhen::Always => true,
        ColorWhen::Never => false,
        ColorWhen::Auto => terminal,
    };
    if !enabled {
        return Ok(ColorMap::new());
    }

    let mut colors = ColorMap::with_defaults();
    config.apply_colors(&mut colors);
    for assignment in &args.colormap {
        colors
            .assign(assignment)
            .with_context(|| format!("Invalid --cm value: {assignment}"))?;
    }
    Ok(colors)
}

fn columns_from_env() -> Option<usize> {
    std::env::var("COLUMNS").ok()?.trim().parse().ok()
}

/// Returns whether differences were found
fn run(args: Args) -> Result<bool> {
    let config = Config::load();
    let stdout = io::stdout();
    let terminal = stdout.is_terminal();

    let options = Options {
        layout: layout(&args, &config, columns_from_env()),
        view: args.view || config.display.view,
    };
    let colors = colors(&args, &config, terminal)?;
    let out = BufWriter::new(stdout.lock());
    let session = Session::new(options, colors, out);

    let differs = match detect_input_mode(&args.files) {
        InputMode::Stdin => {
            let mut session = session;
            session.run(io::stdin().lock())?.differences()
        }
        InputMode::DiffFile(path) => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to read: {}", path.display()))?;
            let mut session = session;
            session.run(BufReader::new(file))?.differences()
        }
        InputMode::TwoFiles { old, new } => {
            let format = args.format();
            let mut diff = DiffCommand::parse(&args.diff)?
                .with_format(format)
                .spawn(&old, &new)?;
            // Lock-step needs the plain grammar so every line of both files is accounted for
            let mut session = if format == Format::Normal {
                session.open_lockstep(&old, &new)?
            } else {
                session
            };
            session.run(diff.stdout()?)?;
            diff.finish()?
        }
    };
    io::stdout().flush()?;
    Ok(differs)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("SIDEDIFF_LOG", "warn"))
        .init();

    match run(Args::parse()) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(err) => {
            eprintln!("sdif: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sdif").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_detect_input_mode() {
        assert_eq!(detect_input_mode(&[]), InputMode::Stdin);
        assert_eq!(detect_input_mode(&[PathBuf::from("-")]), InputMode::Stdin);
        assert_eq!(
            detect_input_mode(&[PathBuf::from("x.diff")]),
            InputMode::DiffFile(PathBuf::from("x.diff"))
        );
        assert_eq!(
            detect_input_mode(&[PathBuf::from("a"), PathBuf::from("b")]),
            InputMode::TwoFiles {
                old: PathBuf::from("a"),
                new: PathBuf::from("b"),
            }
        );
    }

    #[test]
    fn test_diff_format_flags() {
        assert_eq!(args(&["a", "b"]).format(), Format::Normal);
        assert_eq!(args(&["-u", "a", "b"]).format(), Format::Unified(None));
        assert_eq!(args(&["-C", "2", "a", "b"]).format(), Format::Context(Some(2)));
        assert!(Args::try_parse_from(["sdif", "-u", "-c", "a", "b"]).is_err());
        assert!(Args::try_parse_from(["sdif", "a", "b", "c"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config::parse(
            r#"
            [display]
            width = 100
            number = true
            digit = 3
            fold = "truncate"
            mark = "left"
            "#,
        )
        .unwrap();

        let layout = layout(&args(&[]), &config, Some(80));
        assert_eq!(layout.width, 100);
        assert_eq!(layout.digits, Some(3));
        assert_eq!(layout.fold, FoldMode::Truncate);
        assert_eq!(layout.mark, MarkPosition::Left);

        let layout = super::layout(
            &args(&["-W", "60", "--digit", "5", "--onword", "--mark", "no"]),
            &config,
            Some(80),
        );
        assert_eq!(layout.width, 60);
        assert_eq!(layout.digits, Some(5));
        assert_eq!(layout.fold, FoldMode::Word);
        assert_eq!(layout.mark, MarkPosition::No);
    }

    #[test]
    fn test_width_fallbacks() {
        let config = Config::default();
        assert_eq!(layout(&args(&[]), &config, Some(90)).width, 90);
        assert_eq!(layout(&args(&[]), &config, None).width, DEFAULT_WIDTH);
        assert_eq!(layout(&args(&[]), &config, None).digits, None);
        assert_eq!(layout(&args(&["-n"]), &config, None).digits, Some(4));
    }

    #[test]
    fn test_color_modes() {
        let config = Config::default();
        let never = colors(&args(&["--color", "never", "--cm", "OTEXT=red"]), &config, true).unwrap();
        assert!(never.get(sidediff_core::Field::Text(sidediff_core::Side::Old)).is_none());

        let auto = colors(&args(&[]), &config, false).unwrap();
        assert!(auto.get(sidediff_core::Field::Text(sidediff_core::Side::Old)).is_none());

        let always = colors(&args(&["--color", "always", "--cm", "OTEXT=blue"]), &config, false).unwrap();
        assert_eq!(
            always.get(sidediff_core::Field::Text(sidediff_core::Side::Old)),
            Some("\x1b[34m")
        );

        assert!(colors(&args(&["--color", "always", "--cm", "NOPE=red"]), &config, false).is_err());
    }
}
