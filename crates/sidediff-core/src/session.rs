//! Stream dispatcher: reads diff output line by line and renders every hunk
//! it recognizes, passing everything else through unchanged.

use crate::color::{ColorMap, Side};
use crate::flatten::{flatten, view_mode, Cell, Counters, Row};
use crate::hunk::{strip_prefix, Hunk, Line, Origin, Range, RowGroup};
use crate::label_stack::LabelStack;
use crate::merge::{merge, MergeError};
use crate::parse::{
    combined_label, is_command, is_context_new_body, is_context_old_body, Header, NormalOp,
};
use crate::render::{Layout, RenderError, Renderer};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
}

/// Rendering options that do not belong to the column layout
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub layout: Layout,
    /// Show each hunk as two continuous texts with blank marks
    pub view: bool,
}

/// What a run saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub hunks: usize,
    /// Lines that matched no grammar and were copied verbatim
    pub passthrough: usize,
}

impl RunSummary {
    pub fn differences(&self) -> bool {
        self.hunks > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    Normal,
    Context,
    Unified,
    Combined,
}

/// Read one line without its terminator; invalid UTF-8 is replaced
pub(crate) fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

struct Input<R> {
    reader: R,
    pending: Vec<String>,
}

impl<R: BufRead> Input<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
        }
    }

    fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.pending.pop() {
            Some(line) => Ok(Some(line)),
            None => read_line(&mut self.reader),
        }
    }

    fn peek(&mut self) -> io::Result<Option<&str>> {
        if self.pending.is_empty() {
            match read_line(&mut self.reader)? {
                Some(line) => self.pending.push(line),
                None => return Ok(None),
            }
        }
        Ok(self.pending.last().map(String::as_str))
    }

    fn push_back(&mut self, line: String) {
        self.pending.push(line);
    }
}

/// One of the two compared files, read alongside the diff
struct Source {
    reader: Box<dyn BufRead>,
    /// Number of the next line to be read
    next: usize,
}

impl Source {
    fn new(reader: Box<dyn BufRead>) -> Self {
        Self { reader, next: 1 }
    }

    fn read(&mut self) -> io::Result<Option<String>> {
        let line = read_line(&mut self.reader)?;
        if line.is_some() {
            self.next += 1;
        }
        Ok(line)
    }

    /// Lines up to (not including) line `stop`
    fn read_until(&mut self, stop: usize) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        while self.next < stop {
            match self.read()? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }

    fn skip_to(&mut self, stop: usize) -> io::Result<()> {
        while self.next < stop {
            if self.read()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn rest(&mut self) -> io::Result<Vec<String>> {
        self.read_until(usize::MAX)
    }
}

struct Lockstep {
    old: Source,
    new: Source,
}

/// Renders one diff stream to `out`
pub struct Session<W: Write> {
    renderer: Renderer,
    view: bool,
    counters: Counters,
    lockstep: Option<Lockstep>,
    summary: RunSummary,
    state: State,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(options: Options, colors: ColorMap, out: W) -> Self {
        Self {
            renderer: Renderer::new(options.layout, colors),
            view: options.view,
            counters: Counters::default(),
            lockstep: None,
            summary: RunSummary::default(),
            state: State::Scanning,
            out,
        }
    }

    /// Fill the unchanged stretches between hunks from the compared files
    pub fn with_lockstep(
        mut self,
        old: impl BufRead + 'static,
        new: impl BufRead + 'static,
    ) -> Self {
        self.lockstep = Some(Lockstep {
            old: Source::new(Box::new(old)),
            new: Source::new(Box::new(new)),
        });
        self
    }

    pub fn open_lockstep(self, old: &Path, new: &Path) -> Result<Self, SessionError> {
        let open = |path: &Path| {
            File::open(path)
                .map(BufReader::new)
                .map_err(|source| SessionError::Open {
                    path: path.to_path_buf(),
                    source,
                })
        };
        let (old, new) = (open(old)?, open(new)?);
        Ok(self.with_lockstep(old, new))
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render the whole of `input`
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<RunSummary, SessionError> {
        let mut input = Input::new(input);
        while let Some(line) = input.next_line()? {
            self.dispatch(line, &mut input)?;
        }
        self.flush_lockstep()?;
        self.out.flush()?;
        log::debug!(
            "rendered {} hunks, {} lines passed through",
            self.summary.hunks,
            self.summary.passthrough
        );
        Ok(self.summary)
    }

    fn enter(&mut self, state: State) {
        if self.state != state {
            log::debug!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn dispatch<R: BufRead>(&mut self, line: String, input: &mut Input<R>) -> Result<(), SessionError> {
        match Header::parse(&line) {
            Some(Header::Normal { old, op, new }) => self.normal(line, old, op, new, input),
            Some(Header::Unified { old, new }) => self.unified(line, old, new, input),
            Some(Header::ContextOld { first, last }) => self.context(line, first, last, input),
            Some(Header::Combined { parents, merge }) => self.combined(line, parents, merge, input),
            Some(Header::CombinedIntro) => {
                self.enter(State::Combined);
                self.renderer.render_command(Side::Merge, &line, &mut self.out)?;
                Ok(())
            }
            Some(Header::ContextNew { .. }) | None => self.other(line, input),
        }
    }

    fn other<R: BufRead>(&mut self, line: String, input: &mut Input<R>) -> Result<(), SessionError> {
        if is_command(&line) {
            if line.starts_with("diff ") {
                self.enter(State::Scanning);
            }
            let side = if self.state == State::Combined {
                Side::Merge
            } else {
                Side::Old
            };
            self.renderer.render_command(side, &line, &mut self.out)?;
            return Ok(());
        }

        let pair = match line.get(..4) {
            Some("--- ") => "+++ ",
            Some("*** ") => "--- ",
            _ => "",
        };
        if !pair.is_empty() && input.peek()?.is_some_and(|next| next.starts_with(pair)) {
            if let Some(next) = input.next_line()? {
                let names = if self.state == State::Combined {
                    vec![Some(line.as_str()), None, Some(next.as_str())]
                } else {
                    vec![Some(line.as_str()), Some(next.as_str())]
                };
                self.renderer.render_files(&names, &mut self.out)?;
            }
            return Ok(());
        }

        self.summary.passthrough += 1;
        self.renderer.passthrough(&line, &mut self.out)?;
        Ok(())
    }

    /// Give up on a hunk: copy what was read and resume scanning at `stop`
    fn resync<R: BufRead>(
        &mut self,
        consumed: Vec<String>,
        stop: Option<String>,
        input: &mut Input<R>,
    ) -> Result<(), SessionError> {
        log::warn!(
            "malformed {:?} hunk at {:?}, passing {} lines through",
            self.state,
            consumed.first().map(String::as_str).unwrap_or(""),
            consumed.len()
        );
        for line in &consumed {
            self.renderer.passthrough(line, &mut self.out)?;
        }
        self.summary.passthrough += consumed.len();
        if let Some(stop) = stop {
            input.push_back(stop);
        }
        if self.state != State::Combined {
            self.enter(State::Scanning);
        }
        Ok(())
    }

    fn normal<R: BufRead>(
        &mut self,
        header: String,
        old: Range,
        op: NormalOp,
        new: Range,
        input: &mut Input<R>,
    ) -> Result<(), SessionError> {
        self.enter(State::Normal);
        let mut consumed = vec![header];
        let mut unit = RowGroup::default();

        let sides = [
            (op != NormalOp::Add, old.count, "<", Origin::Old),
            (op != NormalOp::Delete, new.count, ">", Origin::New),
        ];
        for (index, (present, count, prefix, origin)) in sides.into_iter().enumerate() {
            if !present {
                continue;
            }
            if index == 1 && op == NormalOp::Change {
                match input.next_line()? {
                    Some(line) if line == "---" => consumed.push(line),
                    other => return self.resync(consumed, other, input),
                }
            }
            for _ in 0..count {
                match input.next_line()? {
                    Some(line) if line.starts_with(prefix) && matches!(line.as_bytes().get(1), None | Some(b' ')) => {
                        let text = Line::new(strip_prefix(&line, 2), origin);
                        match origin {
                            Origin::Old => unit.old.push(text),
                            _ => unit.new.push(text),
                        }
                        consumed.push(line);
                    }
                    other => return self.resync(consumed, other, input),
                }
            }
        }

        self.emit(
            Hunk {
                old,
                new,
                merge: None,
                groups: vec![unit],
            },
            Vec::new(),
        )
    }

    fn unified<R: BufRead>(
        &mut self,
        header: String,
        old: Range,
        new: Range,
        input: &mut Input<R>,
    ) -> Result<(), SessionError> {
        self.enter(State::Unified);
        let mut consumed = vec![header];
        let mut notes = Vec::new();
        let mut groups = Vec::new();
        let mut unit = RowGroup::default();
        let (mut old_left, mut new_left) = (old.count, new.count);

        while old_left > 0 || new_left > 0 {
            let Some(line) = input.next_line()? else {
                return self.resync(consumed, None, input);
            };
            match line.as_bytes().first() {
                Some(b'\\') => {
                    notes.push(line.clone());
                    consumed.push(line);
                    continue;
                }
                None | Some(b' ') if old_left > 0 && new_left > 0 => {
                    if unit.has_changes() {
                        groups.push(std::mem::take(&mut unit));
                    }
                    unit.common.push(Line::new(strip_prefix(&line, 1), Origin::Common));
                    old_left -= 1;
                    new_left -= 1;
                }
                Some(b'-') if old_left > 0 => {
                    if !unit.new.is_empty() {
                        groups.push(std::mem::take(&mut unit));
                    }
                    unit.old.push(Line::new(strip_prefix(&line, 1), Origin::Old));
                    old_left -= 1;
                }
                Some(b'+') if new_left > 0 => {
                    unit.new.push(Line::new(strip_prefix(&line, 1), Origin::New));
                    new_left -= 1;
                }
                _ => return self.resync(consumed, Some(line), input),
            }
            consumed.push(line);
        }

        // A trailing no-newline note follows the last counted line
        if input.peek()?.is_some_and(|next| next.starts_with('\\')) {
            if let Some(note) = input.next_line()? {
                notes.push(note);
            }
        }

        if !unit.is_empty() {
            groups.push(unit);
        }
        self.emit(
            Hunk {
                old,
                new,
                merge: None,
                groups,
            },
            notes,
        )
    }

    fn context<R: BufRead>(
        &mut self,
        header: String,
        first: usize,
        last: Option<usize>,
        input: &mut Input<R>,
    ) -> Result<(), SessionError> {
        self.enter(State::Context);
        let mut consumed = vec![header];

        let old_block = read_block(input, Range::inclusive(first, last).count, is_context_old_body)?;
        consumed.extend(old_block.iter().cloned());

        let (new_first, new_last) = match input.next_line()? {
            Some(line) => match Header::parse(&line) {
                Some(Header::ContextNew { first, last }) => {
                    consumed.push(line);
                    (first, last)
                }
                _ => return self.resync(consumed, Some(line), input),
            },
            None => return self.resync(consumed, None, input),
        };

        let new_block = read_block(
            input,
            Range::inclusive(new_first, new_last).count,
            is_context_new_body,
        )?;

        let range = |first, last: Option<usize>, block: &[String], other: &[String]| {
            let shared = other.iter().any(|line| line.starts_with(' '));
            if last.is_none() && block.is_empty() && !shared {
                Range::after(first)
            } else {
                Range::inclusive(first, last)
            }
        };
        let old = range(first, last, &old_block, &new_block);
        let new = range(new_first, new_last, &new_block, &old_block);

        let groups = merge(&old_block, &new_block)?;
        self.emit(
            Hunk {
                old,
                new,
                merge: None,
                groups,
            },
            Vec::new(),
        )
    }

    fn combined<R: BufRead>(
        &mut self,
        header: String,
        parents: [Range; 2],
        merge: Range,
        input: &mut Input<R>,
    ) -> Result<(), SessionError> {
        self.enter(State::Combined);
        let total = parents[0].count + parents[1].count + merge.count;
        let mut stack = LabelStack::new();

        while stack.weight() < total {
            let label = match input.peek()? {
                Some(next) if !next.starts_with("@@") => combined_label(next, parents.len()),
                _ => None,
            };
            let Some(label) = label else {
                log::debug!(
                    "combined hunk {header:?} ended at weight {} of {total}",
                    stack.weight()
                );
                break;
            };
            if let Some(line) = input.next_line()? {
                let text = line.get(parents.len()..).unwrap_or("").to_string();
                stack.append(&label, text);
            }
        }

        let mut units: Vec<[Vec<Line>; 4]> = Vec::new();
        for segment in stack.segments() {
            let mut unit: [Vec<Line>; 4] = Default::default();
            for (label, lines) in segment.entries() {
                let common = label.chars().all(|c| c == ' ');
                if common && unit[1..].iter().any(|side| !side.is_empty()) {
                    units.push(std::mem::take(&mut unit));
                }
                partition(&mut unit, label, lines);
            }
            units.push(unit);
        }
        let flat: Vec<Vec<Line>> = units.into_iter().flatten().collect();

        self.emit(
            Hunk {
                old: parents[0],
                new: parents[1],
                merge: Some(merge),
                groups: RowGroup::from_flat(flat, 4),
            },
            Vec::new(),
        )
    }

    fn emit(&mut self, hunk: Hunk, notes: Vec<String>) -> Result<(), SessionError> {
        let two_way = hunk.merge.is_none();
        if two_way {
            self.fill_gap(hunk.old.start, hunk.new.start)?;
        }

        self.counters = Counters {
            old: hunk.old.start,
            new: hunk.new.start,
            merge: hunk.merge.map(|range| range.start).unwrap_or(1),
        };
        let groups = if self.view {
            view_mode(hunk.groups)
        } else {
            hunk.groups
        };
        for row in flatten(&groups, &mut self.counters, self.view) {
            self.renderer.render_row(&row, &mut self.out)?;
        }
        for note in &notes {
            self.renderer.passthrough(note, &mut self.out)?;
        }
        self.summary.hunks += 1;

        if two_way && (self.counters.old, self.counters.new) != (hunk.old.next(), hunk.new.next()) {
            log::debug!(
                "hunk {:?}/{:?} ended at lines {}/{}",
                hunk.old,
                hunk.new,
                self.counters.old,
                self.counters.new
            );
        }
        if let Some(lockstep) = self.lockstep.as_mut().filter(|_| two_way) {
            lockstep.old.skip_to(self.counters.old)?;
            lockstep.new.skip_to(self.counters.new)?;
        }
        if self.state != State::Combined {
            self.enter(State::Scanning);
        }
        Ok(())
    }

    /// Render the unchanged lines in front of a hunk starting at `old`/`new`
    fn fill_gap(&mut self, old: usize, new: usize) -> Result<(), SessionError> {
        let Some(lockstep) = self.lockstep.as_mut() else {
            return Ok(());
        };
        let numbers = (lockstep.old.next, lockstep.new.next);
        let lines = (lockstep.old.read_until(old)?, lockstep.new.read_until(new)?);
        self.identical_rows(numbers, lines)
    }

    fn flush_lockstep(&mut self) -> Result<(), SessionError> {
        let Some(lockstep) = self.lockstep.as_mut() else {
            return Ok(());
        };
        let numbers = (lockstep.old.next, lockstep.new.next);
        let lines = (lockstep.old.rest()?, lockstep.new.rest()?);
        self.identical_rows(numbers, lines)
    }

    fn identical_rows(
        &mut self,
        numbers: (usize, usize),
        lines: (Vec<String>, Vec<String>),
    ) -> Result<(), SessionError> {
        let (old, new) = lines;
        if old.len() != new.len() {
            log::warn!(
                "compared files out of step at lines {}/{}: {} vs {} unchanged lines",
                numbers.0,
                numbers.1,
                old.len(),
                new.len()
            );
        }
        self.counters.old = numbers.0;
        self.counters.new = numbers.1;

        let depth = old.len().max(new.len());
        let (mut old, mut new) = (old.into_iter(), new.into_iter());
        for _ in 0..depth {
            let cells = [old.next(), new.next()]
                .into_iter()
                .enumerate()
                .map(|(column, text)| match text {
                    Some(text) => Cell {
                        mark: ' ',
                        number: Some(self.counters.take(column)),
                        text: Some(text),
                    },
                    None => Cell::blank(),
                })
                .collect();
            self.renderer.render_row(&Row { cells }, &mut self.out)?;
        }
        Ok(())
    }
}

/// Body lines of a context block, at most `limit` of them
fn read_block<R: BufRead>(
    input: &mut Input<R>,
    limit: usize,
    is_body: fn(&str) -> bool,
) -> io::Result<Vec<String>> {
    let mut block = Vec::new();
    while block.len() < limit && input.peek()?.is_some_and(is_body) {
        if let Some(line) = input.next_line()? {
            block.push(line);
        }
    }
    Ok(block)
}

/// Place one labelled run of a combined hunk into `[common, parent1, parent2, merge]`
fn partition(unit: &mut [Vec<Line>; 4], label: &str, lines: &[String]) {
    let marks: Vec<char> = label.chars().collect();
    if marks.iter().all(|c| *c == ' ') {
        unit[0].extend(lines.iter().map(|text| Line::new(text.as_str(), Origin::Common)));
        return;
    }

    if marks.contains(&'-') {
        for (column, _) in marks.iter().enumerate().filter(|(_, c)| **c == '-') {
            unit[column + 1].extend(lines.iter().map(|text| Line::new(text.as_str(), Origin::Old)));
        }
        return;
    }

    unit[3].extend(lines.iter().map(|text| Line::new(text.as_str(), Origin::Merge)));
    for (column, _) in marks.iter().enumerate().filter(|(_, c)| **c == ' ') {
        unit[column + 1].extend(
            lines
                .iter()
                .map(|text| Line::new(text.as_str(), Origin::Merge).with_mark(' ')),
        );
    }
}
