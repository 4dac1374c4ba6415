//! Separator-priority text chunker with overlap.
//!
//! Splits document text into segments no longer than `chunk_size`,
//! preferring to break on paragraph boundaries (`\n\n`), then line breaks,
//! then sentence ends, then spaces, and only as a last resort on raw
//! characters. Adjacent chunks share a trailing window of roughly
//! `overlap` bytes so no semantic unit is lost at a boundary.
//!
//! Sizes are byte lengths; every split point lands on a UTF-8 character
//! boundary. Identical input and configuration always produce an
//! identical chunk sequence.

use std::collections::VecDeque;

/// Separators in priority order. The empty fallback (raw characters) is
/// handled by `hard_split`.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split `text` into ordered chunks of at most `chunk_size` bytes, with
/// adjacent chunks overlapping by up to `overlap` bytes of shared context.
///
/// Whitespace-only input yields no chunks. The final chunk may be shorter
/// than `chunk_size` and carries no right-side overlap.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let fragments = fragment(text, chunk_size, 0);
    merge(&fragments, chunk_size, overlap)
}

/// Recursively break `text` into fragments no longer than `chunk_size`,
/// trying the separator at `level` first and falling back to
/// lower-priority separators for any piece that is still too large.
///
/// Separators stay attached to the end of the preceding piece, so the
/// concatenation of all fragments reproduces the input exactly.
fn fragment(text: &str, chunk_size: usize, level: usize) -> Vec<String> {
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }
    if level >= SEPARATORS.len() {
        return hard_split(text, chunk_size);
    }

    let sep = SEPARATORS[level];
    if !text.contains(sep) {
        return fragment(text, chunk_size, level + 1);
    }

    let mut out = Vec::new();
    for piece in split_keeping_separator(text, sep) {
        if piece.len() <= chunk_size {
            out.push(piece);
        } else {
            out.extend(fragment(&piece, chunk_size, level + 1));
        }
    }
    out
}

/// Split on `sep`, keeping the separator at the end of each piece.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(sep) {
        let end = idx + sep.len();
        pieces.push(text[start..end].to_string());
        start = end;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

/// Last-resort split at `chunk_size` byte boundaries, snapped back to the
/// nearest UTF-8 character boundary.
fn hard_split(text: &str, chunk_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while rest.len() > chunk_size {
        let mut cut = chunk_size;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // chunk_size smaller than one character; take the character whole
            cut = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(rest.len());
        }
        out.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

/// Greedily merge fragments into chunks. When a chunk fills up, the
/// trailing fragments within the `overlap` budget are carried over as the
/// start of the next chunk.
fn merge(fragments: &[String], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for frag in fragments {
        if !window.is_empty() && total + frag.len() > chunk_size {
            emit(&mut chunks, &window);
            while !window.is_empty() && (total > overlap || total + frag.len() > chunk_size) {
                let dropped = window.pop_front().unwrap();
                total -= dropped.len();
            }
        }
        window.push_back(frag);
        total += frag.len();
    }

    if !window.is_empty() {
        emit(&mut chunks, &window);
    }
    chunks
}

fn emit(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
