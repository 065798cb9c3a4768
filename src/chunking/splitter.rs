//! Recursive separator-priority splitter

use serde::{Deserialize, Serialize};

/// A contiguous segment of the source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Emission order after splitting
    pub index: usize,
    /// Chunk text, overlap prefix included
    pub text: String,
    /// Length of `text` in characters
    pub size: usize,
    /// Byte offset of `text` in the source document
    pub start: usize,
    /// Byte length of the overlap prefix carried over from the previous chunk
    pub overlap: usize,
}

impl Chunk {
    /// The part of the chunk not repeated from its predecessor
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap..]
    }

    /// Byte range of the fresh region in the source document
    pub fn fresh_range(&self) -> std::ops::Range<usize> {
        self.start + self.overlap..self.start + self.text.len()
    }
}

/// Header separators begin with a newline followed by a non-whitespace marker
fn is_header_separator(separator: &str) -> bool {
    let mut chars = separator.chars();
    chars.next() == Some('\n') && chars.next().is_some_and(|c| !c.is_whitespace())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte ranges of pieces no longer than `limit` characters, covering `text[start..end]`
pub(crate) fn split_ranges(
    text: &str,
    start: usize,
    end: usize,
    separators: &[String],
    limit: usize,
    out: &mut Vec<(usize, usize)>,
) {
    let segment = &text[start..end];
    if segment.is_empty() {
        return;
    }
    if char_len(segment) <= limit {
        out.push((start, end));
        return;
    }

    let Some((separator, weaker)) = separators.split_first() else {
        hard_split(text, start, end, limit, out);
        return;
    };
    if separator.is_empty() || !segment.contains(separator.as_str()) {
        split_ranges(text, start, end, weaker, limit, out);
        return;
    }

    let attach_forward = is_header_separator(separator);
    let mut cuts: Vec<usize> = segment
        .match_indices(separator.as_str())
        .map(|(at, sep)| {
            if attach_forward {
                start + at
            } else {
                start + at + sep.len()
            }
        })
        .filter(|&cut| cut > start && cut < end)
        .collect();
    cuts.push(end);

    let mut piece_start = start;
    for cut in cuts {
        if cut <= piece_start {
            continue;
        }
        if char_len(&text[piece_start..cut]) <= limit {
            out.push((piece_start, cut));
        } else {
            split_ranges(text, piece_start, cut, weaker, limit, out);
        }
        piece_start = cut;
    }
}

/// Cut on character boundaries every `limit` characters
fn hard_split(text: &str, start: usize, end: usize, limit: usize, out: &mut Vec<(usize, usize)>) {
    let mut piece_start = start;
    let mut count = 0;
    for (offset, _) in text[start..end].char_indices() {
        if count == limit {
            out.push((piece_start, start + offset));
            piece_start = start + offset;
            count = 0;
        }
        count += 1;
    }
    if piece_start < end {
        out.push((piece_start, end));
    }
}

/// Greedily merge adjacent pieces while the merged piece stays within `limit` characters
pub(crate) fn merge_ranges(
    text: &str,
    pieces: &[(usize, usize)],
    limit: usize,
) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<(usize, usize, usize)> = None;

    for &(start, end) in pieces {
        let len = char_len(&text[start..end]);
        current = match current {
            Some((s, _, n)) if n + len <= limit => Some((s, end, n + len)),
            Some((s, e, _)) => {
                merged.push((s, e));
                Some((start, end, len))
            }
            None => Some((start, end, len)),
        };
    }
    if let Some((s, e, _)) = current {
        merged.push((s, e));
    }
    merged
}

/// Byte offset where the overlap prefix for a region starting at `region_start` begins
///
/// Takes at most `overlap` characters from `text[floor..region_start]` and moves
/// forward past the first whitespace so the prefix does not open mid-word.
pub(crate) fn overlap_start(
    text: &str,
    floor: usize,
    region_start: usize,
    overlap: usize,
) -> usize {
    if overlap == 0 || region_start <= floor {
        return region_start;
    }
    let window = &text[floor..region_start];
    let from = window
        .char_indices()
        .rev()
        .nth(overlap - 1)
        .map(|(i, _)| floor + i)
        .unwrap_or(floor);

    match text[from..region_start].find(char::is_whitespace) {
        Some(ws) => {
            let after = from + ws;
            let ws_len = text[after..].chars().next().map_or(0, char::len_utf8);
            after + ws_len
        }
        None => from,
    }
}
