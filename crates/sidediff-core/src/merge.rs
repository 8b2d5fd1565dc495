//! Alignment of context-diff old/new blocks
//!
//! A context hunk lists the old side and the new side as two separate
//! blocks. Merging walks both blocks at once and cuts them into units of
//! shared context followed by deletions, insertions or paired changes.

use crate::hunk::{strip_prefix, Line, Origin, RowGroup};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MergeError {
    #[error("unexpected line in {side} block of context diff: {line:?}")]
    Malformed { side: &'static str, line: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Common,
    Delete,
    Insert,
    Change,
}

fn classify(line: &str, side: &'static str) -> Result<Class, MergeError> {
    let class = match (side, line.as_bytes().first()) {
        (_, Some(b' ')) => Class::Common,
        (_, Some(b'!')) => Class::Change,
        ("old", Some(b'-')) => Class::Delete,
        ("new", Some(b'+')) => Class::Insert,
        _ => {
            return Err(MergeError::Malformed {
                side,
                line: line.to_string(),
            })
        }
    };
    Ok(class)
}

struct Block<'a> {
    lines: &'a [String],
    pos: usize,
    side: &'static str,
}

impl<'a> Block<'a> {
    fn new(lines: &'a [String], side: &'static str) -> Self {
        Self {
            lines,
            pos: 0,
            side,
        }
    }

    fn peek(&self) -> Result<Option<Class>, MergeError> {
        self.lines
            .get(self.pos)
            .map(|line| classify(line, self.side))
            .transpose()
    }

    fn leads_with(&self, class: Class) -> Result<bool, MergeError> {
        Ok(self.peek()? == Some(class))
    }

    /// Take the maximal run of `class` lines, stripped of their prefix
    fn drain(&mut self, class: Class, origin: Origin) -> Result<Vec<Line>, MergeError> {
        let mut taken = Vec::new();
        while self.leads_with(class)? {
            taken.push(Line::new(strip_prefix(&self.lines[self.pos], 2), origin));
            self.pos += 1;
        }
        Ok(taken)
    }
}

/// Align the old block (` `, `-`, `!`) with the new block (` `, `+`, `!`)
pub fn merge(old: &[String], new: &[String]) -> Result<Vec<RowGroup>, MergeError> {
    let mut old = Block::new(old, "old");
    let mut new = Block::new(new, "new");
    let mut groups = Vec::new();
    let mut unit = RowGroup::default();

    loop {
        let (o, n) = (old.peek()?, new.peek()?);
        if o.is_none() && n.is_none() {
            break;
        }

        // Context on one side only counts as common once the other side is done
        let common = match (o, n) {
            (Some(Class::Common), Some(Class::Common)) => true,
            (Some(Class::Common), None) | (None, Some(Class::Common)) => true,
            _ => false,
        };
        if common {
            if unit.has_changes() {
                groups.push(std::mem::take(&mut unit));
            }
            if o.is_some() && n.is_some() {
                while old.leads_with(Class::Common)? && new.leads_with(Class::Common)? {
                    unit.common
                        .push(Line::new(strip_prefix(&old.lines[old.pos], 2), Origin::Common));
                    old.pos += 1;
                    new.pos += 1;
                }
            } else if o.is_some() {
                unit.common.extend(old.drain(Class::Common, Origin::Common)?);
            } else {
                unit.common.extend(new.drain(Class::Common, Origin::Common)?);
            }
            continue;
        }

        if o == Some(Class::Delete) {
            unit.old.extend(old.drain(Class::Delete, Origin::Old)?);
            groups.push(std::mem::take(&mut unit));
            continue;
        }

        if n == Some(Class::Insert) {
            unit.new.extend(new.drain(Class::Insert, Origin::New)?);
            groups.push(std::mem::take(&mut unit));
            continue;
        }

        // Only paired changes are left at the front of either block
        unit.old.extend(old.drain(Class::Change, Origin::Changed)?);
        unit.new.extend(new.drain(Class::Change, Origin::Changed)?);
        groups.push(std::mem::take(&mut unit));
    }

    if !unit.is_empty() {
        groups.push(unit);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn texts(lines: &[Line]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_change_between_context() {
        let old = lines(&["  a", "! b", "  c"]);
        let new = lines(&["  a", "! B1", "! B2", "  c"]);
        let groups = merge(&old, &new).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(texts(&groups[0].common), vec!["a"]);
        assert_eq!(texts(&groups[0].old), vec!["b"]);
        assert_eq!(texts(&groups[0].new), vec!["B1", "B2"]);
        assert_eq!(groups[0].old[0].mark, '!');
        assert_eq!(texts(&groups[1].common), vec!["c"]);
        assert!(!groups[1].has_changes());
    }

    #[test]
    fn test_delete_and_insert_are_separate_units() {
        let old = lines(&["  a", "- gone", "  b"]);
        let new = lines(&["  a", "  b", "+ added"]);
        let groups = merge(&old, &new).unwrap();

        assert_eq!(texts(&groups[0].common), vec!["a"]);
        assert_eq!(texts(&groups[0].old), vec!["gone"]);
        assert!(groups[0].new.is_empty());
        assert_eq!(texts(&groups[1].common), vec!["b"]);
        assert_eq!(texts(&groups[1].new), vec!["added"]);
        assert!(groups[1].old.is_empty());
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_one_sided_context_waits_for_other_side() {
        let old = lines(&["  a", "  b", "! x"]);
        let new = lines(&["  a", "+ n", "  b", "! X"]);
        let groups = merge(&old, &new).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(texts(&groups[0].common), vec!["a"]);
        assert_eq!(texts(&groups[0].new), vec!["n"]);
        assert!(groups[0].old.is_empty());
        assert_eq!(texts(&groups[1].common), vec!["b"]);
        assert_eq!(texts(&groups[1].old), vec!["x"]);
        assert_eq!(texts(&groups[1].new), vec!["X"]);
    }

    #[test]
    fn test_omitted_old_block() {
        let new = lines(&["  a", "+ x", "  b"]);
        let groups = merge(&[], &new).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(texts(&groups[0].common), vec!["a"]);
        assert_eq!(texts(&groups[0].new), vec!["x"]);
        assert_eq!(texts(&groups[1].common), vec!["b"]);
    }

    #[test]
    fn test_every_line_consumed_in_order() {
        let old = lines(&["  1", "- 2", "! 3", "! 4", "  5", "- 6"]);
        let new = lines(&["  1", "! three", "  5", "+ 7"]);
        let groups = merge(&old, &new).unwrap();

        let old_side: Vec<&str> = groups
            .iter()
            .flat_map(|g| g.common.iter().chain(g.old.iter()))
            .map(|l| l.text.as_str())
            .collect();
        let new_side: Vec<&str> = groups
            .iter()
            .flat_map(|g| g.common.iter().chain(g.new.iter()))
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(old_side, vec!["1", "2", "3", "4", "5", "6"]);
        assert_eq!(new_side, vec!["1", "three", "5", "7"]);
    }

    #[test]
    fn test_malformed_line_is_fatal() {
        let err = merge(&lines(&["+ nope"]), &[]).unwrap_err();
        assert_eq!(
            err,
            MergeError::Malformed {
                side: "old",
                line: "+ nope".to_string()
            }
        );
        assert!(merge(&[], &lines(&["? what"])).is_err());
    }
}
