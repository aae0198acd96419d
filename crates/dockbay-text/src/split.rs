//! Segmentation primitives. All lengths are counted in chars so multi-byte
//! text is never cut inside a code point.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::flatten::char_len;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+").expect("valid regex"));

const PARAGRAPH_SEP: &str = "\n\n";
const LINE_SEP: &str = "\n";

pub(crate) fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_heading_only(paragraph: &str) -> bool {
    !paragraph.contains('\n') && HEADING.is_match(paragraph)
}

/// Glue heading-only paragraphs to whatever follows them.
pub(crate) fn attach_headings(paragraphs: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(paragraphs.len());
    let mut pending: Option<String> = None;
    for paragraph in paragraphs {
        let heading = is_heading_only(&paragraph);
        let merged = match pending.take() {
            Some(head) => format!("{head}{PARAGRAPH_SEP}{paragraph}"),
            None => paragraph,
        };
        if heading {
            pending = Some(merged);
        } else {
            out.push(merged);
        }
    }
    if let Some(head) = pending {
        out.push(head);
    }
    out
}

/// Paragraphs → lines → fixed char offsets, each level packed greedily.
pub(crate) fn pack_document(text: &str, budget: usize) -> Vec<String> {
    let paragraphs = attach_headings(split_paragraphs(text));
    pack(paragraphs, PARAGRAPH_SEP, budget, &|p: &str| pack_lines(p, budget))
}

fn pack_lines(paragraph: &str, budget: usize) -> Vec<String> {
    let lines: Vec<String> = paragraph
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    pack(lines, LINE_SEP, budget, &|l: &str| hard_split(l, budget))
}

pub(crate) fn hard_split(line: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(budget).map(|piece| piece.iter().collect()).collect()
}

fn pack(units: Vec<String>, sep: &str, budget: usize, oversized: &dyn Fn(&str) -> Vec<String>) -> Vec<String> {
    let sep_len = char_len(sep);
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for unit in units {
        let unit_len = char_len(&unit);
        if unit_len > budget {
            if !buf.is_empty() {
                out.push(std::mem::take(&mut buf));
                buf_len = 0;
            }
            out.extend(oversized(&unit));
            continue;
        }
        if buf.is_empty() {
            buf = unit;
            buf_len = unit_len;
        } else if buf_len + sep_len + unit_len <= budget {
            buf.push_str(sep);
            buf.push_str(&unit);
            buf_len += sep_len + unit_len;
        } else {
            out.push(std::mem::replace(&mut buf, unit));
            buf_len = unit_len;
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}

/// Merge chunks shorter than `min_length` forward while the result fits
/// `budget`. A short tail is folded back into its predecessor when possible.
pub(crate) fn merge_small(chunks: Vec<String>, min_length: usize, budget: usize) -> Vec<String> {
    let sep_len = char_len(PARAGRAPH_SEP);
    let mut out: Vec<String> = Vec::with_capacity(chunks.len());
    let mut buf = String::new();

    for chunk in chunks {
        if buf.is_empty() {
            buf = chunk;
            continue;
        }
        let buf_len = char_len(&buf);
        if buf_len < min_length && buf_len + sep_len + char_len(&chunk) <= budget {
            buf.push_str(PARAGRAPH_SEP);
            buf.push_str(&chunk);
        } else {
            out.push(std::mem::replace(&mut buf, chunk));
        }
    }

    if !buf.is_empty() {
        let buf_len = char_len(&buf);
        if buf_len < min_length {
            if let Some(last) = out.last_mut() {
                if char_len(last) + sep_len + buf_len <= budget {
                    last.push_str(PARAGRAPH_SEP);
                    last.push_str(&buf);
                    return out;
                }
            }
        }
        out.push(buf);
    }
    out
}

pub(crate) fn tail_chars(s: &str, n: usize) -> String {
    let total = char_len(s);
    s.chars().skip(total.saturating_sub(n)).collect()
}

/// Prefix every chunk after the first with the last `overlap` chars of its
/// predecessor's body, separated by a newline.
pub(crate) fn apply_overlap(chunks: &[String], overlap: usize) -> Vec<String> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| match i {
            0 => chunk.clone(),
            _ => format!("{}\n{chunk}", tail_chars(&chunks[i - 1], overlap)),
        })
        .collect()
}
