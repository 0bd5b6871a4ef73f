//! Heuristic segmentation of merged physical lines.
//!
//! The module writes incoming payload and its own command responses to the
//! same UART with no boundary marker, so one physical line can carry both
//! (`"Hello Module A!AT+OPTION=OK"`). A segment boundary is inserted before a
//! marker substring when the text accumulated so far does not itself start
//! with a marker; a segment that already begins with `AT+`, `OK`, or
//! `SUCCESS` absorbs later markers, which keeps `AT+OPTION=OK` in one piece.
//!
//! Absorption also means at most one boundary per physical line: once a
//! marker-led segment has started it runs to the end of the line, so a line
//! carrying two payload/response pairs comes back as two segments, not four.
//! The module emits at most one response per exchange, which keeps that case
//! out of normal traffic.
//!
//! The heuristic has a known false positive: payload that happens to contain
//! a marker is split (`"BROKEN"` becomes `["BR", "OKEN"]`). The wire format
//! gives no way to tell the two apart.

/// Substrings that mark the start of a module-generated segment.
pub const SPLIT_MARKERS: [&str; 3] = ["AT+", "OK", "SUCCESS"];

/// Check whether one of [`SPLIT_MARKERS`] starts at `pos`, returning its
/// length. Matching is ASCII case-insensitive and byte-based; the markers are
/// pure ASCII, so a match never lands inside a multi-byte character.
fn marker_at(bytes: &[u8], pos: usize) -> Option<usize> {
    for marker in SPLIT_MARKERS {
        let m = marker.as_bytes();
        if bytes.len() - pos >= m.len() && bytes[pos..pos + m.len()].eq_ignore_ascii_case(m) {
            return Some(m.len());
        }
    }
    None
}

/// Split a physical line into logical segments.
///
/// Each segment is trimmed; empty segments are dropped. A line with no
/// embedded marker comes back as a single segment.
pub fn split_merged_line(line: &str) -> Vec<String> {
    let bytes = line.as_bytes();
    let mut segments = Vec::new();

    let mut seg_start = 0;
    let mut seg_has_marker = false;
    let mut pos = 0;

    while pos < bytes.len() {
        match marker_at(bytes, pos) {
            Some(len) if !seg_has_marker => {
                // Boundary: close the current segment, start a marker-led
                // one. A marker at position 0 just starts the first segment.
                let piece = line[seg_start..pos].trim();
                if !piece.is_empty() {
                    segments.push(piece.to_string());
                }
                seg_start = pos;
                seg_has_marker = true;
                pos += len;
            }
            Some(len) => pos += len,
            None => pos += 1,
        }
    }

    let piece = line[seg_start..].trim();
    if !piece.is_empty() {
        segments.push(piece.to_string());
    }

    if segments.len() > 1 {
        log::trace!("split merged line {:?} into {} segments", line, segments.len());
    }

    segments
}
