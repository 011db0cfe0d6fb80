use crate::tokens::TokenEstimator;

/// Split a diff into line-aligned chunks whose estimated token count stays
/// under `max_chunk_tokens` minus the per-chunk overhead reserve.
///
/// Lines keep their terminators, so concatenating the returned chunks in
/// order reproduces the input byte for byte. A single line larger than the
/// budget becomes its own chunk rather than being split mid-line.
pub fn chunk_diff(
    diff: &str,
    max_chunk_tokens: usize,
    overhead_tokens: usize,
    estimator: &TokenEstimator,
) -> Vec<String> {
    let safe_max = max_chunk_tokens.saturating_sub(overhead_tokens).max(1);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for line in split_keepends(diff) {
        let line_tokens = estimator.count(line);
        if current_tokens + line_tokens > safe_max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push_str(line);
        current_tokens += line_tokens;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    // Shouldn't happen for non-empty input; slice by characters as a last
    // resort so oversized content still goes out in bounded pieces.
    if chunks.is_empty() && !diff.is_empty() {
        chunks = slice_by_chars(diff, safe_max.saturating_mul(4).max(1));
    }

    if chunks.is_empty() {
        return vec![diff.to_string()];
    }
    chunks
}

/// Line iterator that keeps each `\n` (and any preceding `\r`) attached to
/// its line, so joins are lossless.
fn split_keepends(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let (line, tail) = rest.split_at(end);
        rest = tail;
        Some(line)
    })
}

fn slice_by_chars(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut len = 0usize;
    for ch in text.chars() {
        buf.push(ch);
        len += 1;
        if len == max_chars {
            out.push(std::mem::take(&mut buf));
            len = 0;
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}
