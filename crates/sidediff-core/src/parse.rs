//! Header recognition for the four diff grammars

use crate::hunk::Range;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const RANGE: &str = r"(\d+)(?:,(\d+))?";

static NORMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^{RANGE}([acd]){RANGE}$")).expect("normal header regex"));
static CONTEXT_OLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\*\*\* {RANGE} \*\*\*\*$")).expect("context header regex"));
static CONTEXT_NEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^--- {RANGE} ----$")).expect("context header regex"));
static UNIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^@@ -{RANGE} \+{RANGE} @@(?:\s.*)?$")).expect("unified header regex")
});
static COMBINED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^@@@ -{RANGE} -{RANGE} \+{RANGE} @@@(?:\s.*)?$"))
        .expect("combined header regex")
});
static COMBINED_INTRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^diff --(?:cc|combined) ").expect("combined intro regex"));
static COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:diff |Index: |Only in |Binary files |Files .* differ$|index |similarity index |rename |new file mode |deleted file mode |old mode |new mode )")
        .expect("command regex")
});

/// Operation letter of a normal-diff header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalOp {
    Add,
    Change,
    Delete,
}

/// A recognized hunk or section header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Normal { old: Range, op: NormalOp, new: Range },
    /// `*** a,b ****`; the raw numbers are kept because an empty old block
    /// can only be told apart once the block has been read
    ContextOld { first: usize, last: Option<usize> },
    ContextNew { first: usize, last: Option<usize> },
    Unified { old: Range, new: Range },
    CombinedIntro,
    Combined { parents: [Range; 2], merge: Range },
}

fn number(caps: &Captures<'_>, index: usize) -> Option<usize> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn numbers(caps: &Captures<'_>, first: usize) -> Option<(usize, Option<usize>)> {
    Some((number(caps, first)?, number(caps, first + 1)))
}

impl Header {
    pub fn parse(line: &str) -> Option<Header> {
        if let Some(caps) = NORMAL.captures(line) {
            let (a, b) = numbers(&caps, 1)?;
            let (c, d) = numbers(&caps, 4)?;
            let (op, old, new) = match &caps[3] {
                "a" => (NormalOp::Add, Range::after(a), Range::inclusive(c, d)),
                "d" => (NormalOp::Delete, Range::inclusive(a, b), Range::after(c)),
                _ => (NormalOp::Change, Range::inclusive(a, b), Range::inclusive(c, d)),
            };
            return Some(Header::Normal { old, op, new });
        }
        if let Some(caps) = UNIFIED.captures(line) {
            let (a, b) = numbers(&caps, 1)?;
            let (c, d) = numbers(&caps, 3)?;
            return Some(Header::Unified {
                old: Range::counted(a, b),
                new: Range::counted(c, d),
            });
        }
        if let Some(caps) = COMBINED.captures(line) {
            let (a, b) = numbers(&caps, 1)?;
            let (c, d) = numbers(&caps, 3)?;
            let (e, f) = numbers(&caps, 5)?;
            return Some(Header::Combined {
                parents: [Range::counted(a, b), Range::counted(c, d)],
                merge: Range::counted(e, f),
            });
        }
        if let Some(caps) = CONTEXT_OLD.captures(line) {
            let (first, last) = numbers(&caps, 1)?;
            return Some(Header::ContextOld { first, last });
        }
        if let Some(caps) = CONTEXT_NEW.captures(line) {
            let (first, last) = numbers(&caps, 1)?;
            return Some(Header::ContextNew { first, last });
        }
        if COMBINED_INTRO.is_match(line) {
            return Some(Header::CombinedIntro);
        }
        None
    }
}

/// `diff ...`, `Index: ...` and similar lines printed by the diff driver
pub fn is_command(line: &str) -> bool {
    COMMAND.is_match(line)
}

/// Body line of a context-diff old block
pub fn is_context_old_body(line: &str) -> bool {
    has_body_prefix(line, &[b' ', b'-', b'!'])
}

/// Body line of a context-diff new block
pub fn is_context_new_body(line: &str) -> bool {
    has_body_prefix(line, &[b' ', b'+', b'!'])
}

fn has_body_prefix(line: &str, marks: &[u8]) -> bool {
    let bytes = line.as_bytes();
    match bytes {
        [mark] => marks.contains(mark),
        [mark, b' ', ..] => marks.contains(mark),
        _ => false,
    }
}

/// Mark label of a combined-diff body line with `parents` mark columns;
/// `None` when the line cannot be a body line
pub fn combined_label(line: &str, parents: usize) -> Option<String> {
    let mut label = String::with_capacity(parents);
    let mut chars = line.chars();
    for _ in 0..parents {
        match chars.next() {
            Some(c @ (' ' | '+' | '-')) => label.push(c),
            // Trailing blanks of an empty context line may have been stripped
            None => label.push(' '),
            Some(_) => return None,
        }
    }
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_headers() {
        assert_eq!(
            Header::parse("3c3"),
            Some(Header::Normal {
                old: Range::new(3, 1),
                op: NormalOp::Change,
                new: Range::new(3, 1),
            })
        );
        assert_eq!(
            Header::parse("5a6,8"),
            Some(Header::Normal {
                old: Range::new(6, 0),
                op: NormalOp::Add,
                new: Range::new(6, 3),
            })
        );
        assert_eq!(
            Header::parse("2,4d1"),
            Some(Header::Normal {
                old: Range::new(2, 3),
                op: NormalOp::Delete,
                new: Range::new(2, 0),
            })
        );
        assert_eq!(Header::parse("3x3"), None);
        assert_eq!(Header::parse("3c3 "), None);
    }

    #[test]
    fn test_unified_and_combined_headers() {
        assert_eq!(
            Header::parse("@@ -1,2 +1,3 @@"),
            Some(Header::Unified {
                old: Range::new(1, 2),
                new: Range::new(1, 3),
            })
        );
        assert_eq!(
            Header::parse("@@ -0,0 +1 @@ fn main()"),
            Some(Header::Unified {
                old: Range::new(1, 0),
                new: Range::new(1, 1),
            })
        );
        assert_eq!(
            Header::parse("@@@ -1,3 -1,2 +1,4 @@@"),
            Some(Header::Combined {
                parents: [Range::new(1, 3), Range::new(1, 2)],
                merge: Range::new(1, 4),
            })
        );
        assert_eq!(Header::parse("diff --cc file.c"), Some(Header::CombinedIntro));
        assert_eq!(Header::parse("diff --combined file.c"), Some(Header::CombinedIntro));
        assert_eq!(Header::parse("@@ -1,2 @@"), None);
    }

    #[test]
    fn test_context_headers() {
        assert_eq!(
            Header::parse("*** 1,5 ****"),
            Some(Header::ContextOld {
                first: 1,
                last: Some(5)
            })
        );
        assert_eq!(
            Header::parse("--- 3 ----"),
            Some(Header::ContextNew {
                first: 3,
                last: None
            })
        );
        assert_eq!(Header::parse("*** a/file.c\t2024-01-01"), None);
        assert_eq!(Header::parse("--- a/file.c"), None);
    }

    #[test]
    fn test_body_prefixes() {
        assert!(is_context_old_body("- gone"));
        assert!(is_context_old_body("  same"));
        assert!(is_context_old_body("!"));
        assert!(!is_context_old_body("+ added"));
        assert!(!is_context_old_body("--- 1,3 ----"));
        assert!(is_context_new_body("+ added"));
        assert!(!is_context_new_body("***************"));
    }

    #[test]
    fn test_combined_label() {
        assert_eq!(combined_label("- old", 2).as_deref(), Some("- "));
        assert_eq!(combined_label("++new", 2).as_deref(), Some("++"));
        assert_eq!(combined_label("", 2).as_deref(), Some("  "));
        assert_eq!(combined_label("@@@ -1 -1 +1 @@@", 2), None);
    }

    #[test]
    fn test_command_lines() {
        assert!(is_command("diff -u a.txt b.txt"));
        assert!(is_command("Only in dir: file"));
        assert!(is_command("index 83db48f..bf269f4 100644"));
        assert!(!is_command("  context"));
    }
}
