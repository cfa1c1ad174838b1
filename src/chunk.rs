//! Hierarchical text chunker with overlap.
//!
//! Splits document text into spans that respect a configurable
//! `chunk_size` soft maximum. Splitting prefers paragraph boundaries
//! (`\n\n`), then line and sentence boundaries, then raw character
//! windows, and repeats the trailing `chunk_overlap` characters of each
//! emitted chunk at the start of the next one.
//!
//! Identical input and parameters always yield byte-identical chunks;
//! the synchronizer's skip-unchanged logic depends on it.

const PARA_SEP: &str = "\n\n";
const LINE_SEP: &str = "\n";

struct Fragment<'a> {
    text: &'a str,
    /// Separator joining this fragment to the previous one.
    sep: &'static str,
}

/// Split text into ordered chunks. Whitespace-only input yields no chunks.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = chunk_overlap.min(chunk_size - 1);
    // Fragments must leave room for the carried overlap prefix.
    let budget = (chunk_size - overlap).max(1);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    // Bytes of `current` carried over from the previous chunk. A buffer
    // holding only carried text is never flushed on its own.
    let mut carried = 0usize;

    for frag in fragment(text, budget) {
        let sep = if current.is_empty() { "" } else { frag.sep };

        if current.len() > carried && current.len() + sep.len() + frag.text.len() > chunk_size {
            let tail = overlap_tail(&current, overlap).to_string();
            chunks.push(std::mem::replace(&mut current, tail));
            carried = current.len();
        }

        let sep = if current.is_empty() { "" } else { frag.sep };
        current.push_str(sep);
        current.push_str(frag.text);
    }

    if current.len() > carried && !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Break text into fragments no larger than `budget` bytes, descending
/// the boundary hierarchy only where a unit is oversized.
fn fragment(text: &str, budget: usize) -> Vec<Fragment<'_>> {
    let mut out = Vec::new();

    for para in text.split(PARA_SEP) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        if para.len() <= budget {
            out.push(Fragment {
                text: para,
                sep: PARA_SEP,
            });
            continue;
        }

        let mut first_in_para = true;
        for line in para.split('\n') {
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            let line_sep = if first_in_para { PARA_SEP } else { LINE_SEP };
            first_in_para = false;

            if line.len() <= budget {
                out.push(Fragment {
                    text: line,
                    sep: line_sep,
                });
                continue;
            }

            let mut first_in_line = true;
            for sentence in line.split_inclusive(". ") {
                let sent_sep = if first_in_line { line_sep } else { "" };
                first_in_line = false;

                if sentence.len() <= budget {
                    out.push(Fragment {
                        text: sentence,
                        sep: sent_sep,
                    });
                } else {
                    for (i, window) in char_windows(sentence, budget).into_iter().enumerate() {
                        out.push(Fragment {
                            text: window,
                            sep: if i == 0 { sent_sep } else { "" },
                        });
                    }
                }
            }
        }
    }

    out
}

/// Hard-split a span into windows of at most `budget` bytes, cutting at a
/// space when one falls inside the window and always on a char boundary.
fn char_windows(s: &str, budget: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = s;

    while !rest.is_empty() {
        if rest.len() <= budget {
            out.push(rest);
            break;
        }

        let mut end = budget;
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // A single code point wider than the budget; take it whole.
            end = rest
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
        }

        let cut = match rest[..end].rfind(' ') {
            Some(pos) if pos > 0 => pos + 1,
            _ => end,
        };

        out.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    out
}

/// The trailing `overlap` bytes of a chunk, aligned forward to a char
/// boundary so the slice is always valid UTF-8.
fn overlap_tail(s: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }
    if s.len() <= overlap {
        return s;
    }
    let mut start = s.len() - overlap;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
