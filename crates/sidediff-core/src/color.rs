//! Color map: semantic output fields to SGR sequences

use crate::fold::RESET;
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ColorError {
    #[error("unknown color field: {0}")]
    UnknownField(String),
    #[error("invalid color assignment (expected FIELD=SPEC): {0}")]
    BadAssignment(String),
    #[error("invalid hex color: {0}")]
    BadHex(String),
    #[error("unknown color or effect: {0}")]
    UnknownToken(String),
}

/// RGB color (0-255 per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Parse hex color string (e.g., "#2ecc71" or "2ecc71")
pub fn parse_hex(s: &str) -> Result<Rgb, ColorError> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(ColorError::BadHex(s.to_string()));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| ColorError::BadHex(s.to_string()))
    };
    Ok(Rgb {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

/// Which column a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Old,
    New,
    Merge,
}

impl Side {
    pub fn of_column(column: usize) -> Self {
        match column {
            0 => Side::Old,
            1 => Side::New,
            _ => Side::Merge,
        }
    }
}

/// Semantic output fields that can be colored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Command(Side),
    File(Side),
    Mark(Side),
    Line(Side),
    Text(Side),
    UnchangedMark,
    UnchangedLine,
    UnchangedText,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::Command(Side::Old),
        Field::Command(Side::New),
        Field::Command(Side::Merge),
        Field::File(Side::Old),
        Field::File(Side::New),
        Field::File(Side::Merge),
        Field::Mark(Side::Old),
        Field::Mark(Side::New),
        Field::Mark(Side::Merge),
        Field::UnchangedMark,
        Field::Line(Side::Old),
        Field::Line(Side::New),
        Field::Line(Side::Merge),
        Field::UnchangedLine,
        Field::Text(Side::Old),
        Field::Text(Side::New),
        Field::Text(Side::Merge),
        Field::UnchangedText,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Command(Side::Old) => "OCOMMAND",
            Field::Command(Side::New) => "NCOMMAND",
            Field::Command(Side::Merge) => "MCOMMAND",
            Field::File(Side::Old) => "OFILE",
            Field::File(Side::New) => "NFILE",
            Field::File(Side::Merge) => "MFILE",
            Field::Mark(Side::Old) => "OMARK",
            Field::Mark(Side::New) => "NMARK",
            Field::Mark(Side::Merge) => "MMARK",
            Field::UnchangedMark => "UMARK",
            Field::Line(Side::Old) => "OLINE",
            Field::Line(Side::New) => "NLINE",
            Field::Line(Side::Merge) => "MLINE",
            Field::UnchangedLine => "ULINE",
            Field::Text(Side::Old) => "OTEXT",
            Field::Text(Side::New) => "NTEXT",
            Field::Text(Side::Merge) => "MTEXT",
            Field::UnchangedText => "UTEXT",
        }
    }

    /// Unchanged counterpart of a mark, line-number or text field
    pub fn unchanged(self) -> Option<Field> {
        match self {
            Field::Mark(_) => Some(Field::UnchangedMark),
            Field::Line(_) => Some(Field::UnchangedLine),
            Field::Text(_) => Some(Field::UnchangedText),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Field::ALL
            .into_iter()
            .find(|field| field.name() == upper)
            .ok_or_else(|| ColorError::UnknownField(s.to_string()))
    }
}

const DEFAULT_COLORS: &[(&str, &str)] = &[
    ("OCOMMAND", "bold yellow"),
    ("NCOMMAND", "bold yellow"),
    ("MCOMMAND", "bold yellow"),
    ("OFILE", "bold red"),
    ("NFILE", "bold green"),
    ("MFILE", "bold magenta"),
    ("OMARK", "black on_red"),
    ("NMARK", "black on_green"),
    ("MMARK", "black on_magenta"),
    ("UMARK", "plain"),
    ("OLINE", "yellow"),
    ("NLINE", "yellow"),
    ("MLINE", "yellow"),
    ("ULINE", "dim"),
    ("OTEXT", "red"),
    ("NTEXT", "green"),
    ("MTEXT", "magenta"),
    ("UTEXT", "plain"),
];

/// Field to SGR mapping; an unset field prints uncolored
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    sgr: FxHashMap<Field, String>,
}

impl ColorMap {
    /// No colors at all
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in palette
    pub fn with_defaults() -> Self {
        let mut map = Self::new();
        for (name, spec) in DEFAULT_COLORS {
            if let (Ok(field), Ok(sgr)) = (name.parse::<Field>(), sgr(spec)) {
                map.sgr.insert(field, sgr);
            }
        }
        map
    }

    /// Set `field` from a color spec; an empty spec unsets it
    pub fn set(&mut self, field: Field, spec: &str) -> Result<(), ColorError> {
        if spec.trim().is_empty() {
            self.sgr.remove(&field);
        } else {
            self.sgr.insert(field, sgr(spec)?);
        }
        Ok(())
    }

    /// Apply a `FIELD=SPEC` assignment
    pub fn assign(&mut self, assignment: &str) -> Result<(), ColorError> {
        let (name, spec) = assignment
            .split_once('=')
            .ok_or_else(|| ColorError::BadAssignment(assignment.to_string()))?;
        self.set(name.parse()?, spec)
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.sgr.get(&field).map(String::as_str)
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.sgr.contains_key(&field)
    }

    /// Field to use for a cell part: the unchanged variant when the mark is
    /// blank and that variant is configured, otherwise `field` itself
    pub fn select(&self, field: Field, changed: bool) -> Field {
        match field.unchanged() {
            Some(unchanged) if !changed && self.is_set(unchanged) => unchanged,
            _ => field,
        }
    }

    /// Wrap `text` in the field's color
    pub fn paint(&self, field: Field, text: &str) -> String {
        match self.get(field) {
            Some(sgr) if !sgr.is_empty() && !text.is_empty() => format!("{sgr}{text}{RESET}"),
            _ => text.to_string(),
        }
    }
}

fn color_index(name: &str) -> Option<u8> {
    let index = match name {
        "black" => 0,
        "red" => 1,
        "green" => 2,
        "yellow" => 3,
        "blue" => 4,
        "magenta" => 5,
        "cyan" => 6,
        "white" => 7,
        _ => return None,
    };
    Some(index)
}

fn effect_code(name: &str) -> Option<&'static str> {
    let code = match name {
        "bold" => "1",
        "dim" | "faint" => "2",
        "italic" => "3",
        "underline" => "4",
        "blink" => "5",
        "reverse" => "7",
        "conceal" => "8",
        "strike" => "9",
        _ => return None,
    };
    Some(code)
}

/// SGR parameter for a foreground (or background) color token
fn color_param(token: &str, background: bool) -> Result<Option<String>, ColorError> {
    if token.starts_with('#') || (token.len() == 6 && token.chars().all(|c| c.is_ascii_hexdigit())) {
        let rgb = parse_hex(token)?;
        let lead = if background { 48 } else { 38 };
        return Ok(Some(format!("{lead};2;{};{};{}", rgb.r, rgb.g, rgb.b)));
    }

    let (bright, name) = match token.strip_prefix("bright_") {
        Some(name) => (true, name),
        None => (false, token),
    };
    Ok(color_index(name).map(|index| {
        let base = match (background, bright) {
            (false, false) => 30,
            (false, true) => 90,
            (true, false) => 40,
            (true, true) => 100,
        };
        (base + index as u32).to_string()
    }))
}

/// Convert a color spec to an SGR sequence
///
/// Tokens are separated by whitespace or commas: color names, `bright_*`,
/// `#rrggbb`, `on_<color>` backgrounds, effects (`bold`, `underline`, ...),
/// raw parameter lists such as `1;32`, or `plain` for no styling.
pub fn sgr(spec: &str) -> Result<String, ColorError> {
    let mut params: Vec<String> = Vec::new();

    for token in spec
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        let lower = token.to_ascii_lowercase();
        if matches!(lower.as_str(), "plain" | "none" | "default") {
            continue;
        }
        if token.chars().all(|c| c.is_ascii_digit() || c == ';') {
            params.push(token.trim_matches(';').to_string());
            continue;
        }
        if let Some(code) = effect_code(&lower) {
            params.push(code.to_string());
            continue;
        }
        let (background, color) = match lower.strip_prefix("on_") {
            Some(rest) => (true, rest),
            None => (false, lower.as_str()),
        };
        match color_param(color, background)? {
            Some(param) => params.push(param),
            None => return Err(ColorError::UnknownToken(token.to_string())),
        }
    }

    params.retain(|p| !p.is_empty());
    if params.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("\x1b[{}m", params.join(";")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let rgb = parse_hex("#2ecc71").unwrap();
        assert_eq!(rgb, Rgb { r: 46, g: 204, b: 113 });

        let rgb = parse_hex("e74c3c").unwrap();
        assert_eq!(rgb, Rgb { r: 231, g: 76, b: 60 });

        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("zzzzzz").is_err());
    }

    #[test]
    fn test_sgr_tokens() {
        assert_eq!(sgr("red").unwrap(), "\x1b[31m");
        assert_eq!(sgr("bold, on_green").unwrap(), "\x1b[1;42m");
        assert_eq!(sgr("bright_blue").unwrap(), "\x1b[94m");
        assert_eq!(sgr("#ff0000").unwrap(), "\x1b[38;2;255;0;0m");
        assert_eq!(sgr("on_#000080").unwrap(), "\x1b[48;2;0;0;128m");
        assert_eq!(sgr("1;32").unwrap(), "\x1b[1;32m");
        assert_eq!(sgr("plain").unwrap(), "");
        assert_eq!(
            sgr("sparkly").unwrap_err(),
            ColorError::UnknownToken("sparkly".to_string())
        );
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>().unwrap(), field);
        }
        assert_eq!("otext".parse::<Field>().unwrap(), Field::Text(Side::Old));
        assert!("XTEXT".parse::<Field>().is_err());
    }

    #[test]
    fn test_assign_and_paint() {
        let mut map = ColorMap::new();
        map.assign("NTEXT=green").unwrap();
        assert_eq!(map.paint(Field::Text(Side::New), "x"), "\x1b[32mx\x1b[m");
        assert_eq!(map.paint(Field::Text(Side::Old), "x"), "x");

        map.assign("NTEXT=").unwrap();
        assert!(!map.is_set(Field::Text(Side::New)));
        assert!(map.assign("NTEXT").is_err());
        assert!(map.assign("BOGUS=red").is_err());
    }

    #[test]
    fn test_select_falls_back_to_changed_field() {
        let mut map = ColorMap::new();
        map.set(Field::Text(Side::Old), "red").unwrap();
        assert_eq!(map.select(Field::Text(Side::Old), false), Field::Text(Side::Old));

        map.set(Field::UnchangedText, "plain").unwrap();
        assert_eq!(map.select(Field::Text(Side::Old), false), Field::UnchangedText);
        assert_eq!(map.select(Field::Text(Side::Old), true), Field::Text(Side::Old));
        assert_eq!(map.paint(Field::UnchangedText, "x"), "x");
    }

    #[test]
    fn test_defaults_cover_every_field() {
        let map = ColorMap::with_defaults();
        for field in Field::ALL {
            assert!(map.is_set(field), "{field} missing from defaults");
        }
    }
}
