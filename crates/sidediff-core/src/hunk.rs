//! Lines, ranges and row groups shared by the parsers and the flattener

/// Where a line came from, derived from its diff-format prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Common,
    Old,
    New,
    Changed,
    Merge,
}

impl Origin {
    /// Mark shown next to a line of this origin
    pub fn mark(self) -> char {
        match self {
            Origin::Common => ' ',
            Origin::Old => '-',
            Origin::New | Origin::Merge => '+',
            Origin::Changed => '!',
        }
    }
}

/// One source line with its prefix stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub origin: Origin,
    pub mark: char,
}

impl Line {
    pub fn new(text: impl Into<String>, origin: Origin) -> Self {
        Self {
            text: text.into(),
            origin,
            mark: origin.mark(),
        }
    }

    pub fn with_mark(mut self, mark: char) -> Self {
        self.mark = mark;
        self
    }
}

/// Text of `line` after its `width`-byte diff prefix
pub fn strip_prefix(line: &str, width: usize) -> &str {
    line.get(width..).unwrap_or("")
}

/// First line number and line count covered on one side of a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: usize,
    pub count: usize,
}

impl Range {
    pub fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// `N` or `N,M` as written by normal and context diffs (inclusive end)
    pub fn inclusive(first: usize, last: Option<usize>) -> Self {
        match last {
            Some(last) if last >= first => Self::new(first, last - first + 1),
            Some(_) => Self::new(first, 0),
            None if first == 0 => Self::new(1, 0),
            None => Self::new(first, 1),
        }
    }

    /// Empty range sitting right after line `after`
    pub fn after(after: usize) -> Self {
        Self::new(after + 1, 0)
    }

    /// `N` or `N,COUNT` as written by unified and combined diffs
    pub fn counted(start: usize, count: Option<usize>) -> Self {
        match count.unwrap_or(1) {
            0 => Self::after(start),
            count => Self::new(start, count),
        }
    }

    /// First line number after the range
    pub fn next(&self) -> usize {
        self.start + self.count
    }
}

/// Lines of one aligned unit: shared context first, then each side's changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowGroup {
    pub common: Vec<Line>,
    pub old: Vec<Line>,
    pub new: Vec<Line>,
    /// Only present in three-way output
    pub merge: Option<Vec<Line>>,
}

impl RowGroup {
    pub fn has_changes(&self) -> bool {
        !self.old.is_empty()
            || !self.new.is_empty()
            || self.merge.as_ref().is_some_and(|m| !m.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && !self.has_changes()
    }

    /// Number of columns this group renders into
    pub fn columns(&self) -> usize {
        if self.merge.is_some() {
            3
        } else {
            2
        }
    }

    /// Build groups from a flat `[common, old, new(, merge)]*` list, padding
    /// the tail with empty sections so every group has `arity` parts
    pub fn from_flat(flat: Vec<Vec<Line>>, arity: usize) -> Vec<RowGroup> {
        let arity = arity.clamp(3, 4);
        let mut flat = flat;
        let short = (arity - flat.len() % arity) % arity;
        flat.extend(std::iter::repeat_with(Vec::new).take(short));

        let mut groups = Vec::with_capacity(flat.len() / arity);
        let mut parts = flat.into_iter();
        while let Some(common) = parts.next() {
            let old = parts.next().unwrap_or_default();
            let new = parts.next().unwrap_or_default();
            let merge = if arity == 4 {
                Some(parts.next().unwrap_or_default())
            } else {
                None
            };
            groups.push(RowGroup {
                common,
                old,
                new,
                merge,
            });
        }
        groups
    }
}

/// A parsed hunk: its ranges plus the aligned groups of its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old: Range,
    pub new: Range,
    pub merge: Option<Range>,
    pub groups: Vec<RowGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_ranges() {
        assert_eq!(Range::inclusive(3, None), Range::new(3, 1));
        assert_eq!(Range::inclusive(3, Some(5)), Range::new(3, 3));
        assert_eq!(Range::inclusive(0, None), Range::new(1, 0));
    }

    #[test]
    fn test_counted_ranges() {
        assert_eq!(Range::counted(1, Some(3)), Range::new(1, 3));
        assert_eq!(Range::counted(7, None), Range::new(7, 1));
        assert_eq!(Range::counted(4, Some(0)), Range::new(5, 0));
        assert_eq!(Range::counted(0, Some(0)), Range::new(1, 0));
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("< foo", 2), "foo");
        assert_eq!(strip_prefix("-", 2), "");
        assert_eq!(strip_prefix("+bar", 1), "bar");
    }

    #[test]
    fn test_from_flat_pads_tail() {
        let line = |s: &str| vec![Line::new(s, Origin::Common)];
        let groups = RowGroup::from_flat(vec![line("a"), line("b"), line("c"), line("d")], 3);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].common[0].text, "d");
        assert!(groups[1].old.is_empty());
        assert!(groups[1].new.is_empty());
        assert!(groups[1].merge.is_none());

        let groups = RowGroup::from_flat(vec![line("a")], 4);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].merge, Some(Vec::new()));
    }
}
