//! Segment stack for combined (three-way) diff bodies
//!
//! Combined-diff producers do not always emit lines of the same origin in
//! file order. Lines are grouped by their mark label into segments; a label
//! that comes back after another label was used opens a new segment.

use rustc_hash::FxHashMap;

/// Lines of one contiguous run, keyed by mark label in first-seen order
#[derive(Debug, Clone, Default)]
pub struct Segment {
    index: FxHashMap<String, usize>,
    entries: Vec<(String, Vec<String>)>,
    last: Option<String>,
}

impl Segment {
    fn accepts(&self, label: &str) -> bool {
        self.last.as_deref() == Some(label) || !self.index.contains_key(label)
    }

    fn push(&mut self, label: &str, line: String) {
        let slot = match self.index.get(label) {
            Some(&slot) => slot,
            None => {
                self.entries.push((label.to_string(), Vec::new()));
                self.index.insert(label.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[slot].1.push(line);
        self.last = Some(label.to_string());
    }

    /// Labels with their lines, in the order each label first appeared
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(label, lines)| (label.as_str(), lines.as_slice()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabelStack {
    segments: Vec<Segment>,
    weight: usize,
}

impl LabelStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, label: &str, line: String) {
        let reuse = self
            .segments
            .last()
            .map(|segment| segment.accepts(label))
            .unwrap_or(false);
        if !reuse {
            self.segments.push(Segment::default());
        }
        if let Some(segment) = self.segments.last_mut() {
            segment.push(label, line);
        }
        self.weight += marker_weight(label);
    }

    /// Sum of the marker weights of every appended label
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// Non-blank mark positions of `label`; an all-blank label weighs 1
pub fn marker_weight(label: &str) -> usize {
    match label.chars().filter(|c| *c != ' ').count() {
        0 => 1,
        n => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(segment: &Segment) -> Vec<&str> {
        segment.entries().map(|(label, _)| label).collect()
    }

    fn lines<'a>(segment: &'a Segment, label: &str) -> &'a [String] {
        segment
            .entries()
            .find(|(l, _)| *l == label)
            .map(|(_, lines)| lines)
            .unwrap()
    }

    #[test]
    fn test_marker_weight() {
        assert_eq!(marker_weight("  "), 1);
        assert_eq!(marker_weight("- "), 1);
        assert_eq!(marker_weight(" +"), 1);
        assert_eq!(marker_weight("--"), 2);
        assert_eq!(marker_weight("++"), 2);
    }

    #[test]
    fn test_same_label_stays_in_segment() {
        let mut stack = LabelStack::new();
        stack.append("- ", "a".into());
        stack.append("- ", "b".into());
        stack.append(" -", "c".into());
        assert_eq!(stack.segments().len(), 1);
        let segment = &stack.segments()[0];
        assert_eq!(lines(segment, "- "), ["a", "b"]);
        assert_eq!(lines(segment, " -"), ["c"]);
        assert_eq!(stack.weight(), 3);
    }

    #[test]
    fn test_repeated_label_opens_segment() {
        let mut stack = LabelStack::new();
        stack.append("  ", "ctx1".into());
        stack.append("- ", "old".into());
        stack.append("++", "merged".into());
        stack.append("  ", "ctx2".into());
        stack.append("- ", "old2".into());

        let segments = stack.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(labels(&segments[0]), vec!["  ", "- ", "++"]);
        assert_eq!(labels(&segments[1]), vec!["  ", "- "]);
        assert_eq!(lines(&segments[1], "  "), ["ctx2"]);
    }

    #[test]
    fn test_out_of_order_label_joins_current_segment() {
        let mut stack = LabelStack::new();
        stack.append(" -", "b".into());
        stack.append("- ", "a".into());
        assert_eq!(stack.segments().len(), 1);
        assert_eq!(labels(&stack.segments()[0]), vec![" -", "- "]);
    }
}
