//! Running the system diff for the two-file case

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Output grammar requested from diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Normal,
    /// `-u` or `-U N`
    Unified(Option<usize>),
    /// `-c` or `-C N`
    Context(Option<usize>),
}

impl Format {
    fn args(self) -> Vec<String> {
        match self {
            Format::Normal => Vec::new(),
            Format::Unified(None) => vec!["-u".to_string()],
            Format::Unified(Some(n)) => vec![format!("-U{n}")],
            Format::Context(None) => vec!["-c".to_string()],
            Format::Context(Some(n)) => vec![format!("-C{n}")],
        }
    }
}

/// A running diff whose output is read while it is produced
#[derive(Debug)]
pub struct DiffProcess {
    program: String,
    child: Child,
}

impl DiffProcess {
    /// Diff's standard output; can be taken once
    pub fn stdout(&mut self) -> Result<BufReader<ChildStdout>> {
        self.child
            .stdout
            .take()
            .map(BufReader::new)
            .context("diff output already taken")
    }

    /// Wait for diff to exit; exit 0 and 1 are success, anything else fails.
    /// Returns whether the files differ.
    pub fn finish(mut self) -> Result<bool> {
        let status = self
            .child
            .wait()
            .with_context(|| format!("Failed to wait for {}", self.program))?;

        match status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => {
                let mut stderr = String::new();
                if let Some(mut pipe) = self.child.stderr.take() {
                    if let Err(err) = pipe.read_to_string(&mut stderr) {
                        log::debug!("could not read {} stderr: {err}", self.program);
                    }
                }
                bail!("{} failed ({}): {}", self.program, status, stderr.trim())
            }
        }
    }
}

/// A diff invocation: program, its own arguments and the output format
#[derive(Debug, Clone)]
pub struct DiffCommand {
    program: String,
    extra: Vec<String>,
    format: Format,
}

impl DiffCommand {
    /// Split a `--diff` value such as `diff -b` into program and arguments
    pub fn parse(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let Some(program) = words.next() else {
            bail!("empty diff command");
        };
        Ok(Self {
            program,
            extra: words.collect(),
            format: Format::Normal,
        })
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    fn args(&self, old: &Path, new: &Path) -> Vec<OsString> {
        self.extra
            .iter()
            .cloned()
            .chain(self.format.args())
            .map(OsString::from)
            .chain([old.as_os_str().to_owned(), new.as_os_str().to_owned()])
            .collect()
    }

    /// Start diff with its output on a pipe
    pub fn spawn(&self, old: &Path, new: &Path) -> Result<DiffProcess> {
        let args = self.args(old, new);
        log::debug!("running {} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.program))?;

        Ok(DiffProcess {
            program: self.program.clone(),
            child,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_command() {
        let command = DiffCommand::parse("diff -b --strip-trailing-cr").unwrap();
        assert_eq!(command.program, "diff");
        assert_eq!(command.extra, vec!["-b", "--strip-trailing-cr"]);
        assert!(DiffCommand::parse("   ").is_err());
    }

    #[test]
    fn test_args_order() {
        let command = DiffCommand::parse("diff -b")
            .unwrap()
            .with_format(Format::Unified(Some(5)));
        let args = command.args(Path::new("a"), Path::new("b"));
        assert_eq!(args, vec!["-b", "-U5", "a", "b"]);

        let command = DiffCommand::parse("diff").unwrap().with_format(Format::Context(None));
        assert_eq!(command.args(Path::new("a"), Path::new("b")), vec!["-c", "a", "b"]);
    }

    #[cfg(unix)]
    fn write_files(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let old = dir.join("old.txt");
        let new = dir.join("new.txt");
        std::fs::File::create(&old).unwrap().write_all(b"a\nb\n").unwrap();
        std::fs::File::create(&new).unwrap().write_all(b"a\nc\n").unwrap();
        (old, new)
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let (old, new) = write_files(dir.path());
        let diff = DiffCommand::parse("diff").unwrap();

        let mut process = diff.spawn(&old, &new).unwrap();
        let mut text = String::new();
        process.stdout().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "2c2\n< b\n---\n> c\n");
        assert!(process.stdout().is_err());
        assert!(process.finish().unwrap());

        let mut process = diff.spawn(&old, &old).unwrap();
        let mut text = String::new();
        process.stdout().unwrap().read_to_string(&mut text).unwrap();
        assert!(text.is_empty());
        assert!(!process.finish().unwrap());

        let mut process = diff.spawn(&old, &dir.path().join("missing")).unwrap();
        drop(process.stdout().unwrap());
        let err = process.finish().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_streams_into_session() {
        use sidediff_core::{ColorMap, Layout, MarkPosition, Options, Session};

        let dir = tempfile::tempdir().unwrap();
        let (old, new) = write_files(dir.path());
        let mut process = DiffCommand::parse("diff").unwrap().spawn(&old, &new).unwrap();

        let options = Options {
            layout: Layout {
                width: 11,
                mark: MarkPosition::No,
                ..Layout::default()
            },
            view: false,
        };
        let mut session = Session::new(options, ColorMap::new(), Vec::new());
        let summary = session.run(process.stdout().unwrap()).unwrap();
        assert_eq!(summary.hunks, 1);
        assert!(process.finish().unwrap());
        assert_eq!(String::from_utf8(session.into_inner()).unwrap(), "b     c    \n");
    }

    #[test]
    fn test_missing_program() {
        let diff = DiffCommand::parse("sidediff-no-such-program").unwrap();
        assert!(diff.spawn(Path::new("a"), Path::new("b")).is_err());
    }
}
