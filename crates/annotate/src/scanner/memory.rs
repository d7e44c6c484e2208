use super::{
    BlockStep, block_comment, blocks_longest_first, content_end, line_comment, line_prefixes,
    match_open, step_in_block,
};
use smelter_api::{CommentNode, CommentSyntax, Position};
use std::ops::Range;

/// Offsets of line starts, for offset -> position lookups.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(bytes: &[u8]) -> Self {
        let mut starts = vec![0];
        starts.extend(
            bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    fn position(&self, offset: usize) -> Position {
        let line = match self.starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        Position::new(line + 1, offset - self.starts[line] + 1)
    }
}

struct BlockHits {
    ranges: Vec<(Range<usize>, usize)>,
    /// Start of an unclosed block; everything after it is abandoned.
    abandoned_from: Option<usize>,
}

fn find_blocks(bytes: &[u8], blocks: &[smelter_api::BlockSyntax]) -> BlockHits {
    let mut hits = BlockHits {
        ranges: Vec::new(),
        abandoned_from: None,
    };
    if blocks.is_empty() {
        return hits;
    }

    let mut pos = 0;
    'outer: while pos < bytes.len() {
        let Some(idx) = match_open(bytes, pos, blocks) else {
            pos += 1;
            continue;
        };
        let block = &blocks[idx];
        let start = pos;
        let mut cursor = pos + block.open.len();
        let mut depth = 1usize;
        loop {
            if cursor >= bytes.len() {
                hits.abandoned_from = Some(start);
                break 'outer;
            }
            match step_in_block(bytes, cursor, block) {
                BlockStep::Close(len) => {
                    cursor += len;
                    depth -= 1;
                    if depth == 0 {
                        hits.ranges.push((start..cursor, idx));
                        break;
                    }
                }
                BlockStep::Open(len) => {
                    cursor += len;
                    depth += 1;
                }
                BlockStep::Advance => cursor += 1,
            }
        }
        pos = cursor;
    }
    hits
}

/// Scan `text` for comments declared by `syntax`, ordered by start offset.
pub fn scan_comments(text: &str, syntax: &CommentSyntax) -> Vec<CommentNode> {
    let bytes = text.as_bytes();
    let blocks = blocks_longest_first(syntax);
    let prefixes = line_prefixes(syntax);
    let index = LineIndex::new(bytes);
    let hits = find_blocks(bytes, &blocks);

    let mut nodes: Vec<CommentNode> = hits
        .ranges
        .iter()
        .map(|(range, idx)| {
            block_comment(
                text[range.clone()].to_string(),
                &blocks[*idx],
                range.start,
                index.position(range.start),
                index.position(range.end),
            )
        })
        .collect();

    if !prefixes.is_empty() {
        let mut line_start = 0;
        let mut line_no = 1;
        // Ranges are sorted and disjoint, and lines only move forward.
        let mut cursor = 0;
        while line_start <= bytes.len() {
            let line_end = bytes[line_start..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|i| line_start + i)
                .unwrap_or(bytes.len());

            let abandoned = hits.abandoned_from.is_some_and(|a| a < line_end);
            while cursor < hits.ranges.len() && hits.ranges[cursor].0.end <= line_start {
                cursor += 1;
            }
            let in_block = hits
                .ranges
                .get(cursor)
                .is_some_and(|(r, _)| r.start < line_end);
            if !abandoned && !in_block {
                let end = content_end(bytes, line_start, line_end);
                if let Some(node) =
                    line_comment(&text[line_start..end], line_start, line_no, &prefixes)
                {
                    nodes.push(node);
                }
            }

            if line_end >= bytes.len() {
                break;
            }
            line_start = line_end + 1;
            line_no += 1;
        }
    }

    nodes.sort_by_key(|n| n.range.start);
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use smelter_api::{BlockSyntax, CommentKind};

    fn sql() -> CommentSyntax {
        CommentSyntax {
            line: vec!["--".into()],
            block: vec![BlockSyntax::new("/*", "*/")],
        }
    }

    fn c_like(nested: bool) -> CommentSyntax {
        CommentSyntax {
            line: vec!["//".into()],
            block: vec![BlockSyntax::new("/*", "*/").nested(nested)],
        }
    }

    #[test]
    fn test_single_line_comment_spans_line() {
        let nodes = scan_comments("-- @tag hello", &sql());
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.kind, CommentKind::Line);
        assert_eq!(node.range, 0..13);
        assert_eq!(node.inner, "@tag hello");
        assert_eq!(node.start, Position::new(1, 1));
        assert_eq!(node.end, Position::new(1, 14));
    }

    #[test]
    fn test_nested_block_spans_outer_comment() {
        let text = "/* a /* b */ c */";
        let nodes = scan_comments(text, &c_like(true));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].range, 0..text.len());
        assert_eq!(nodes[0].inner, " a /* b */ c ");
    }

    #[test]
    fn test_unnested_block_ends_at_first_close() {
        let text = "/* a /* b */ c */";
        let nodes = scan_comments(text, &c_like(false));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].range, 0..12);
        assert_eq!(&text[nodes[0].range.end..], " c */");
    }

    #[test]
    fn test_unclosed_block_is_abandoned() {
        let text = "-- before\n/* open\n-- inside\n";
        let nodes = scan_comments(text, &sql());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].inner, "before");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let syntax = CommentSyntax {
            line: vec!["-".into(), "--".into()],
            block: vec![],
        };
        let nodes = scan_comments("  -- x", &syntax);
        assert_eq!(nodes[0].fence, "--");
        assert_eq!(nodes[0].inner, "x");
    }

    #[test]
    fn test_trailing_code_comment_is_not_a_line_comment() {
        let nodes = scan_comments("select 1; -- trailing", &sql());
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_mixed_comments_sorted_with_positions() {
        let text = "select 1;\n  -- one\n/* two\n   lines */\r\n-- three\r\n";
        let nodes = scan_comments(text, &sql());
        let inners: Vec<_> = nodes.iter().map(|n| n.inner.as_str()).collect();
        assert_eq!(inners, vec!["one", " two\n   lines ", "three"]);
        assert_eq!(nodes[0].start, Position::new(2, 1));
        assert_eq!(nodes[1].start, Position::new(3, 1));
        assert_eq!(nodes[1].end, Position::new(4, 12));
        assert_eq!(nodes[2].raw, "-- three");
    }

    #[test]
    fn test_line_inside_block_is_ignored() {
        let text = "/*\n-- not a line comment\n*/";
        let nodes = scan_comments(text, &sql());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, CommentKind::Block);
    }

    #[test]
    fn test_many_blocks_interleaved_with_lines() {
        let text: String = (0..200)
            .map(|i| format!("/* b{i} */\n-- l{i}\n/* multi\n-- hidden{i}\n*/ -- tail\n"))
            .collect();
        let nodes = scan_comments(&text, &sql());
        assert_eq!(nodes.len(), 600);
        let lines: Vec<_> = nodes
            .iter()
            .filter(|n| n.kind == CommentKind::Line)
            .map(|n| n.inner.as_str())
            .collect();
        assert_eq!(lines.len(), 200);
        assert_eq!(lines[0], "l0");
        assert_eq!(lines[199], "l199");
        assert!(nodes.iter().all(|n| !n.inner.contains("tail")));
        assert!(nodes.windows(2).all(|w| w[0].range.start < w[1].range.start));
    }
}
