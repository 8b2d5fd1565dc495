//! Row groups to printable rows

use crate::hunk::{Line, RowGroup};

/// One column of a printable row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub mark: char,
    pub number: Option<usize>,
    /// `None` renders as an empty cell
    pub text: Option<String>,
}

impl Cell {
    pub fn blank() -> Self {
        Self {
            mark: ' ',
            number: None,
            text: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_none()
    }
}

/// Cells printed side by side on one row (two or three)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

/// Next line number on each side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub old: usize,
    pub new: usize,
    pub merge: usize,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            old: 1,
            new: 1,
            merge: 1,
        }
    }
}

impl Counters {
    fn slot(&mut self, column: usize) -> &mut usize {
        match column {
            0 => &mut self.old,
            1 => &mut self.new,
            _ => &mut self.merge,
        }
    }

    /// Return the current number for `column` and move past it
    pub fn take(&mut self, column: usize) -> usize {
        let slot = self.slot(column);
        let number = *slot;
        *slot += 1;
        number
    }
}

/// Fold every group's changes onto the context that follows it, so each
/// column reads as continuous text rather than aligned blocks
pub fn view_mode(groups: Vec<RowGroup>) -> Vec<RowGroup> {
    groups
        .into_iter()
        .reduce(|mut acc, next| {
            acc.old.extend(next.common.iter().cloned());
            acc.old.extend(next.old);
            acc.new.extend(next.common.iter().cloned());
            acc.new.extend(next.new);
            if let Some(merge) = acc.merge.as_mut() {
                merge.extend(next.common);
                merge.extend(next.merge.unwrap_or_default());
            }
            acc
        })
        .into_iter()
        .collect()
}

/// Emit rows for `groups`, numbering lines from `counters`
///
/// Common lines come first and advance every counter; changed lines are
/// then paired by position and only the sides that have a line advance.
/// With `plain_marks` every mark is blank.
pub fn flatten(groups: &[RowGroup], counters: &mut Counters, plain_marks: bool) -> Vec<Row> {
    let mut rows = Vec::new();

    for group in groups {
        let columns = group.columns();

        for line in &group.common {
            let cells = (0..columns)
                .map(|column| Cell {
                    mark: ' ',
                    number: Some(counters.take(column)),
                    text: Some(line.text.clone()),
                })
                .collect();
            rows.push(Row { cells });
        }

        let mut sides: Vec<&[Line]> = vec![group.old.as_slice(), group.new.as_slice()];
        if let Some(merge) = &group.merge {
            sides.push(merge);
        }

        let depth = sides.iter().map(|side| side.len()).max().unwrap_or(0);
        for i in 0..depth {
            let cells = sides
                .iter()
                .enumerate()
                .map(|(column, side)| match side.get(i) {
                    Some(line) => Cell {
                        mark: if plain_marks { ' ' } else { line.mark },
                        number: Some(counters.take(column)),
                        text: Some(line.text.clone()),
                    },
                    None => Cell::blank(),
                })
                .collect();
            rows.push(Row { cells });
        }
    }

    rows
}
