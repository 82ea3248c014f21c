//! Character-level diff codec.
//!
//! `encode` turns two snapshots into an ordered list of typed segments and
//! `apply` replays such a list against a baseline. Lengths are counted in
//! chars (Unicode scalar values) on both sides.

use std::iter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MalformedDiff;

/// Upper bound on the edit distance `encode` searches for.
///
/// Past this the changed middle is sent as one deletion and one insertion.
pub const MAX_EDIT_DISTANCE: usize = 1024;

/// One typed unit of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireSegment", into = "WireSegment")]
pub enum DiffSegment {
    /// Copy this many chars from the baseline.
    Unchanged(usize),
    /// Emit this text.
    Inserted(String),
    /// Skip this many chars of the baseline.
    Deleted(usize),
}

impl DiffSegment {
    /// Chars of baseline this segment consumes.
    pub fn source_len(&self) -> usize {
        match self {
            DiffSegment::Unchanged(n) | DiffSegment::Deleted(n) => *n,
            DiffSegment::Inserted(_) => 0,
        }
    }

    /// Chars this segment contributes to the reconstructed text.
    pub fn target_len(&self) -> usize {
        match self {
            DiffSegment::Unchanged(n) => *n,
            DiffSegment::Inserted(text) => text.chars().count(),
            DiffSegment::Deleted(_) => 0,
        }
    }

    /// Whether the segment inserts or deletes anything.
    pub fn is_change(&self) -> bool {
        match self {
            DiffSegment::Unchanged(_) => false,
            DiffSegment::Inserted(text) => !text.is_empty(),
            DiffSegment::Deleted(n) => *n > 0,
        }
    }
}

const TYPE_UNCHANGED: i64 = 0;
const TYPE_INSERTED: i64 = 1;
const TYPE_DELETED: i64 = 2;

/// Segment as it appears in the JSON envelope.
#[derive(Serialize, Deserialize)]
struct WireSegment {
    count: usize,
    #[serde(rename = "type")]
    kind: i64,
    #[serde(default)]
    value: String,
}

#[derive(Error, Debug)]
#[error("unknown diff segment type {0}")]
pub struct UnknownSegmentType(i64);

impl TryFrom<WireSegment> for DiffSegment {
    type Error = UnknownSegmentType;

    fn try_from(wire: WireSegment) -> Result<Self, Self::Error> {
        match wire.kind {
            TYPE_UNCHANGED => Ok(DiffSegment::Unchanged(wire.count)),
            TYPE_INSERTED => Ok(DiffSegment::Inserted(wire.value)),
            TYPE_DELETED => Ok(DiffSegment::Deleted(wire.count)),
            other => Err(UnknownSegmentType(other)),
        }
    }
}

impl From<DiffSegment> for WireSegment {
    fn from(segment: DiffSegment) -> Self {
        match segment {
            DiffSegment::Unchanged(count) => WireSegment {
                count,
                kind: TYPE_UNCHANGED,
                value: String::new(),
            },
            DiffSegment::Inserted(value) => WireSegment {
                count: value.chars().count(),
                kind: TYPE_INSERTED,
                value,
            },
            DiffSegment::Deleted(count) => WireSegment {
                count,
                kind: TYPE_DELETED,
                value: String::new(),
            },
        }
    }
}

/// Ordered segment list describing how to turn one text into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff {
    segments: Vec<DiffSegment>,
}

impl Diff {
    pub fn segments(&self) -> &[DiffSegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<DiffSegment> {
        self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if any segment inserts or deletes.
    pub fn has_changes(&self) -> bool {
        self.segments.iter().any(DiffSegment::is_change)
    }

    /// Chars of baseline the diff consumes.
    pub fn source_len(&self) -> usize {
        self.segments.iter().map(DiffSegment::source_len).sum()
    }

    /// Chars of the text the diff produces.
    pub fn target_len(&self) -> usize {
        self.segments.iter().map(DiffSegment::target_len).sum()
    }
}

impl From<Vec<DiffSegment>> for Diff {
    fn from(segments: Vec<DiffSegment>) -> Self {
        Self { segments }
    }
}

impl IntoIterator for Diff {
    type Item = DiffSegment;
    type IntoIter = std::vec::IntoIter<DiffSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diff {
    type Item = &'a DiffSegment;
    type IntoIter = std::slice::Iter<'a, DiffSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Compute the diff that turns `old` into `new`.
pub fn encode(old: &str, new: &str) -> Diff {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];

    let mut builder = DiffBuilder::default();
    builder.keep(prefix);
    match shortest_edit_script(a, b, MAX_EDIT_DISTANCE) {
        Some(script) => {
            for edit in script {
                match edit {
                    Edit::Keep => builder.keep(1),
                    Edit::Delete => builder.delete(1),
                    Edit::Insert(c) => builder.insert(c),
                }
            }
        }
        None => {
            tracing::debug!(
                old_len = a.len(),
                new_len = b.len(),
                "edit distance over limit, replacing changed region"
            );
            builder.delete(a.len());
            b.iter().for_each(|&c| builder.insert(c));
        }
    }
    builder.keep(suffix);
    builder.finish()
}

/// Replay `segments` against `baseline`.
///
/// Baseline left over after the last segment is dropped.
pub fn apply(baseline: &str, segments: &[DiffSegment]) -> Result<String, MalformedDiff> {
    let mut out = String::with_capacity(baseline.len());
    let mut byte = 0;
    let mut offset = 0;

    for segment in segments {
        match segment {
            DiffSegment::Inserted(text) => out.push_str(text),
            DiffSegment::Unchanged(n) | DiffSegment::Deleted(n) => {
                let end = advance(baseline, byte, *n).ok_or_else(|| MalformedDiff {
                    offset,
                    requested: *n,
                    available: baseline[byte..].chars().count(),
                })?;
                if let DiffSegment::Unchanged(_) = segment {
                    out.push_str(&baseline[byte..end]);
                }
                byte = end;
                offset += n;
            }
        }
    }
    Ok(out)
}

/// Byte index `len` chars past `byte`, or None if `s` runs out first.
fn advance(s: &str, byte: usize, len: usize) -> Option<usize> {
    s[byte..]
        .char_indices()
        .map(|(i, _)| byte + i)
        .chain(iter::once(s.len()))
        .nth(len)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep,
    Delete,
    Insert(char),
}

/// Myers' O(ND) shortest edit script, giving up past `max_distance`.
fn shortest_edit_script(a: &[char], b: &[char], max_distance: usize) -> Option<Vec<Edit>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let limit = (a.len() + b.len()).min(max_distance) as isize;
    let offset = limit + 1;

    let mut v = vec![0isize; (2 * limit + 3) as usize];
    // trace[d] holds v[-d-1..=d+1] as it was before round d
    let mut trace: Vec<Vec<isize>> = Vec::new();

    for d in 0..=limit {
        trace.push(v[(offset - d - 1) as usize..=(offset + d + 1) as usize].to_vec());

        for k in (-d..=d).step_by(2) {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;

            if x >= n && y >= m {
                return Some(backtrack(&trace, b, n, m));
            }
        }
    }
    None
}

fn backtrack(trace: &[Vec<isize>], b: &[char], n: isize, m: isize) -> Vec<Edit> {
    let at = |row: &[isize], d: isize, k: isize| row[(k + d + 1) as usize];

    let mut script = Vec::new();
    let (mut x, mut y) = (n, m);

    for (d, row) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(row, d, k - 1) < at(row, d, k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(row, d, prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            script.push(Edit::Keep);
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                script.push(Edit::Insert(b[(y - 1) as usize]));
            } else {
                script.push(Edit::Delete);
            }
        }
        x = prev_x;
        y = prev_y;
    }

    script.reverse();
    script
}

/// Accumulates edits, merging runs and putting deletions first in each
/// changed region.
#[derive(Default)]
struct DiffBuilder {
    segments: Vec<DiffSegment>,
    pending_delete: usize,
    pending_insert: String,
}

impl DiffBuilder {
    fn keep(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.flush();
        match self.segments.last_mut() {
            Some(DiffSegment::Unchanged(len)) => *len += n,
            _ => self.segments.push(DiffSegment::Unchanged(n)),
        }
    }

    fn delete(&mut self, n: usize) {
        self.pending_delete += n;
    }

    fn insert(&mut self, c: char) {
        self.pending_insert.push(c);
    }

    fn flush(&mut self) {
        if self.pending_delete > 0 {
            self.segments
                .push(DiffSegment::Deleted(std::mem::take(&mut self.pending_delete)));
        }
        if !self.pending_insert.is_empty() {
            self.segments
                .push(DiffSegment::Inserted(std::mem::take(&mut self.pending_insert)));
        }
    }

    fn finish(mut self) -> Diff {
        self.flush();
        Diff::from(self.segments)
    }
}
