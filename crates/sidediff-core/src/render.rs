//! Column layout of printable rows
//!
//! Each row is written as two or three columns separated by a single space.
//! A column holds a one-cell mark, an optional line number and the folded
//! text; cells whose text needs several slices take several output lines.

use crate::color::{ColorMap, Field, Side};
use crate::flatten::{Cell, Row};
use crate::fold::{expand_tabs, AmbiguousWidth, Boundary, FoldError, Folder};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use thiserror::Error;

/// Separator printed between columns
pub const COLUMN_GAP: &str = " ";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("width {width} leaves no room for text in {columns} columns")]
    TooNarrow { width: usize, columns: usize },
    #[error(transparent)]
    Fold(#[from] FoldError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Where the change mark sits inside each column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkPosition {
    Left,
    Right,
    /// Marks face each other between the first and second column
    #[default]
    Center,
    /// Marks on the outer edges
    Side,
    No,
}

impl MarkPosition {
    /// Whether the mark precedes the rest of `column`; `None` when hidden
    fn leads(self, column: usize, columns: usize) -> Option<bool> {
        match self {
            MarkPosition::Left => Some(true),
            MarkPosition::Right => Some(false),
            MarkPosition::Center => Some(column != 0),
            MarkPosition::Side => Some(column + 1 != columns),
            MarkPosition::No => None,
        }
    }

    /// Whether the marks of `column` and the next column sit back to back,
    /// with the column gap moved in front of the first one
    fn faces_next(self, column: usize) -> bool {
        self == MarkPosition::Center && column == 0
    }
}

impl FromStr for MarkPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MarkPosition::Left),
            "right" => Ok(MarkPosition::Right),
            "center" => Ok(MarkPosition::Center),
            "side" => Ok(MarkPosition::Side),
            "no" | "none" => Ok(MarkPosition::No),
            other => Err(format!("unknown mark position: {other}")),
        }
    }
}

impl fmt::Display for MarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkPosition::Left => "left",
            MarkPosition::Right => "right",
            MarkPosition::Center => "center",
            MarkPosition::Side => "side",
            MarkPosition::No => "no",
        };
        f.write_str(name)
    }
}

/// What happens to text wider than its column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoldMode {
    /// Keep only the first slice
    Truncate,
    #[default]
    Fold,
    /// Fold, preferring word boundaries
    Word,
}

/// Caller-supplied layout settings
#[derive(Debug, Clone)]
pub struct Layout {
    /// Total display width of a row
    pub width: usize,
    /// Digits reserved for line numbers; `None` hides them
    pub digits: Option<usize>,
    pub mark: MarkPosition,
    pub fold: FoldMode,
    pub ambiguous: AmbiguousWidth,
    pub tabstop: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            width: 160,
            digits: None,
            mark: MarkPosition::Center,
            fold: FoldMode::Fold,
            ambiguous: AmbiguousWidth::Narrow,
            tabstop: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    column: usize,
    text: usize,
}

/// Writes rows using a fixed layout and color map
pub struct Renderer {
    layout: Layout,
    colors: ColorMap,
    /// Cached per column count: slot 0 for two columns, slot 1 for three
    geometry: [Option<Geometry>; 2],
}

impl Renderer {
    pub fn new(layout: Layout, colors: ColorMap) -> Self {
        Self {
            layout,
            colors,
            geometry: [None, None],
        }
    }

    fn geometry(&mut self, columns: usize) -> Result<Geometry, RenderError> {
        let columns = columns.clamp(2, 3);
        let slot = columns - 2;
        if let Some(geometry) = self.geometry[slot] {
            return Ok(geometry);
        }

        let gaps = (columns - 1) * COLUMN_GAP.len();
        let column = self.layout.width.saturating_sub(gaps) / columns;
        let mark = usize::from(self.layout.mark != MarkPosition::No);
        let number = self.layout.digits.map(|d| d + 1).unwrap_or(0);
        let text = column
            .checked_sub(mark + number)
            .filter(|w| *w >= 1)
            .ok_or(RenderError::TooNarrow {
                width: self.layout.width,
                columns,
            })?;

        let geometry = Geometry { column, text };
        log::debug!("{columns}-column layout: column {column}, text {text}");
        self.geometry[slot] = Some(geometry);
        Ok(geometry)
    }

    /// Width available for text in each column of a `columns`-wide row
    pub fn text_width(&mut self, columns: usize) -> Result<usize, RenderError> {
        Ok(self.geometry(columns)?.text)
    }

    fn folder(&self, width: usize) -> Result<Folder, FoldError> {
        let boundary = match self.layout.fold {
            FoldMode::Word => Boundary::Word,
            _ => Boundary::Any,
        };
        Ok(Folder::new(width)?
            .with_boundary(boundary)
            .with_padding(true)
            .with_ambiguous(self.layout.ambiguous))
    }

    fn slices(&self, folder: &Folder, text: &str) -> Vec<String> {
        let text = expand_tabs(text, self.layout.tabstop, self.layout.ambiguous);
        let chunks = folder.chunks(&text).map(|folded| folded.head);
        match self.layout.fold {
            FoldMode::Truncate => chunks.take(1).collect(),
            _ => chunks.collect(),
        }
    }

    /// Write one row, folding each cell until every cell is exhausted
    pub fn render_row<W: Write>(&mut self, row: &Row, out: &mut W) -> Result<(), RenderError> {
        let columns = row.cells.len();
        let geometry = self.geometry(columns)?;
        let folder = self.folder(geometry.text)?;

        let slices: Vec<Vec<String>> = row
            .cells
            .iter()
            .map(|cell| match &cell.text {
                Some(text) => self.slices(&folder, text),
                None => Vec::new(),
            })
            .collect();
        let height = slices.iter().map(Vec::len).max().unwrap_or(0).max(1);

        for line in 0..height {
            let mut text = String::new();
            for (column, cell) in row.cells.iter().enumerate() {
                if column > 0 && !self.layout.mark.faces_next(column - 1) {
                    text.push_str(COLUMN_GAP);
                }
                text.push_str(&self.cell_line(
                    column,
                    columns,
                    cell,
                    slices[column].get(line),
                    line == 0,
                    geometry,
                ));
            }
            writeln!(out, "{text}")?;
        }
        Ok(())
    }

    fn cell_line(
        &self,
        column: usize,
        columns: usize,
        cell: &Cell,
        slice: Option<&String>,
        first: bool,
        geometry: Geometry,
    ) -> String {
        let gap = if self.layout.mark.faces_next(column) && column + 1 < columns {
            COLUMN_GAP
        } else {
            ""
        };
        if cell.is_blank() {
            return " ".repeat(geometry.column + gap.len());
        }

        let side = Side::of_column(column);
        let changed = cell.mark != ' ';
        let colors = &self.colors;

        let text = match slice {
            Some(slice) => colors.paint(colors.select(Field::Text(side), changed), slice),
            None => " ".repeat(geometry.text),
        };

        let number = match (self.layout.digits, cell.number) {
            (Some(digits), Some(n)) if first => colors.paint(
                colors.select(Field::Line(side), changed),
                &format!("{n:>digits$} "),
            ),
            (Some(digits), _) => " ".repeat(digits + 1),
            (None, _) => String::new(),
        };

        let rest = format!("{number}{text}");
        match self.layout.mark.leads(column, columns) {
            None => rest,
            Some(leads) => {
                let mark = colors.paint(
                    colors.select(Field::Mark(side), changed),
                    &cell.mark.to_string(),
                );
                if leads {
                    format!("{mark}{rest}")
                } else {
                    format!("{rest}{gap}{mark}")
                }
            }
        }
    }

    /// Write a file-name header row; `None` leaves a column empty
    pub fn render_files<W: Write>(
        &mut self,
        names: &[Option<&str>],
        out: &mut W,
    ) -> Result<(), RenderError> {
        let columns = names.len();
        let geometry = self.geometry(columns)?;
        let folder = Folder::new(geometry.column)?
            .with_padding(true)
            .with_ambiguous(self.layout.ambiguous);

        let parts: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(column, name)| match name {
                Some(name) => {
                    let name = expand_tabs(name, self.layout.tabstop, self.layout.ambiguous);
                    let head = folder.fold(&name).head;
                    let field = if column + 1 == columns && columns == 3 {
                        Field::File(Side::Merge)
                    } else {
                        Field::File(Side::of_column(column))
                    };
                    self.colors.paint(field, &head)
                }
                None => " ".repeat(geometry.column),
            })
            .collect();
        writeln!(out, "{}", parts.join(COLUMN_GAP))?;
        Ok(())
    }

    /// Write a diff command or other annotation line across the full width
    pub fn render_command<W: Write>(
        &self,
        side: Side,
        line: &str,
        out: &mut W,
    ) -> Result<(), RenderError> {
        writeln!(out, "{}", self.colors.paint(Field::Command(side), line))?;
        Ok(())
    }

    /// Write a line exactly as it was read
    pub fn passthrough<W: Write>(&self, line: &str, out: &mut W) -> Result<(), RenderError> {
        writeln!(out, "{line}")?;
        Ok(())
    }
}
