//! Paragraph-boundary text segmentation for embedding input.
//!
//! Embedding models accept bounded input, so long text is split into
//! segments of at most `max_chars` bytes before inference and the segment
//! vectors are pooled afterwards.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries.
//! 2. Accumulate paragraphs into a buffer until the next one would
//!    exceed `max_chars`, then flush the buffer as a segment.
//! 3. A single paragraph longer than `max_chars` is hard-split at the
//!    last newline or space before the limit (or at the limit itself).
//! 4. Empty or whitespace-only input yields no segments.

/// Split `text` into segments of at most `max_chars` bytes.
///
/// ```rust
/// use vault_search_core::segment::segment_text;
///
/// let segments = segment_text("Hello world.\n\nSecond paragraph.", 2000);
/// assert_eq!(segments.len(), 1);
/// ```
pub fn segment_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if buf.is_empty() {
            trimmed.len()
        } else {
            buf.len() + 2 + trimmed.len()
        };
        if would_be > max_chars && !buf.is_empty() {
            segments.push(std::mem::take(&mut buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut segments);
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(trimmed);
        }
    }

    if !buf.is_empty() {
        segments.push(buf);
    }
    segments
}

fn hard_split(mut remaining: &str, max_chars: usize, out: &mut Vec<String>) {
    while !remaining.is_empty() {
        let mut split_at = snap_to_char_boundary(remaining, max_chars);
        if split_at < remaining.len() {
            if let Some(pos) = remaining[..split_at]
                .rfind('\n')
                .or_else(|| remaining[..split_at].rfind(' '))
            {
                if pos > 0 {
                    split_at = pos + 1;
                }
            }
        }
        if split_at == 0 {
            // A single char wider than the limit still has to go somewhere.
            split_at = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
