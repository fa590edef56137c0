//! Single-`*` glob matching over resource patterns.
//!
//! A pattern is split on `*` into literal segments. The first segment
//! anchors at the start of the resource string, the last anchors at the
//! end, and any interior segments must appear, in order, somewhere between
//! them. `*` matches any run of characters, including the empty run, with
//! no restriction on what characters it may cross (unlike glob dialects
//! that stop `*` at a path separator).

/// Split a pattern into its literal segments around `*`.
pub fn split_segments(pattern: &str) -> Vec<&str> {
    pattern.split('*').collect()
}

/// Does `resource` match `pattern`?
pub fn matches(resource: &str, pattern: &str) -> bool {
    let segments = split_segments(pattern);

    if segments.len() == 1 {
        return resource == pattern;
    }

    let first = segments[0];
    let last = segments[segments.len() - 1];

    if !resource.starts_with(first) || !resource.ends_with(last) {
        return false;
    }
    if resource.len() < first.len() + last.len() {
        return false;
    }

    let mut cursor = first.len();
    let search_end = resource.len() - last.len();
    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match resource[cursor..search_end].find(segment) {
            Some(offset) => cursor += offset + segment.len(),
            None => return false,
        }
    }
    true
}
