//! Bounded Marker Search

/// Offset of the leftmost occurrence of `pattern` in `haystack` at or after `from`
pub fn find(haystack: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    if pattern.is_empty() || from >= haystack.len() {
        return None;
    }

    haystack[from..]
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|pos| from + pos)
}

/// Append the start offsets of successive, non-overlapping occurrences of
/// `pattern` found at or after `start_offset`.
///
/// Stops after `max_depth` occurrences (0 = unbounded). Returns how many
/// offsets were appended.
pub fn search_frame(
    haystack: &[u8],
    pattern: &[u8],
    results: &mut Vec<usize>,
    max_depth: usize,
    start_offset: usize,
) -> usize {
    let mut found = 0;
    let mut from = start_offset;

    while max_depth == 0 || found < max_depth {
        let Some(pos) = find(haystack, pattern, from) else {
            break;
        };
        results.push(pos);
        found += 1;
        from = pos + pattern.len();
    }

    found
}
