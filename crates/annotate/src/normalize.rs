/// Strip a leading continuation marker from every line of a block body.
///
/// Doc comments put a `*` at the start of continuation lines:
///
/// ```text
/// /**
///  * @route.path /admin
///  */
/// ```
///
/// Each line loses its leading whitespace, then `marker` and one following
/// space when present. Lines without the marker keep their content. A first
/// line that starts with the marker (the second `*` of `/**`) is treated the same.
pub fn normalize_block(inner: &str, marker: &str) -> String {
    if marker.is_empty() {
        return inner.to_string();
    }
    inner
        .split('\n')
        .map(|line| normalize_line(line.strip_suffix('\r').unwrap_or(line), marker))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line of [`normalize_block`]. The result is always a suffix of `line`.
pub(crate) fn normalize_line<'a>(line: &'a str, marker: &str) -> &'a str {
    if marker.is_empty() {
        return line;
    }
    match line.trim_start().strip_prefix(marker) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_doc_markers() {
        let inner = "*\n * @tag one\n *   indented\n ";
        assert_eq!(normalize_block(inner, "*"), "\n@tag one\n  indented\n ");
    }

    #[test]
    fn test_lines_without_marker_are_kept() {
        assert_eq!(normalize_block(" plain\nline", "*"), " plain\nline");
    }

    #[test]
    fn test_empty_marker_is_identity() {
        assert_eq!(normalize_block(" * x", ""), " * x");
    }
}
