//! Comment scanners.
//!
//! Both scanners share one contract: given text and a [`CommentSyntax`],
//! produce the ordered list of [`CommentNode`]s. The rules they agree on:
//!
//! - block comments are found first; the earliest opener wins, the longest
//!   opener breaks ties, and nesting is honored when the syntax declares it
//! - a block opened but never closed abandons everything from its opener to
//!   the end of input
//! - a line is a line comment when its trimmed content starts with a declared
//!   prefix (longest first) and it does not intersect any block comment

pub mod memory;
pub mod stream;

use smelter_api::{BlockSyntax, CommentKind, CommentNode, CommentSyntax, Position};

/// Block syntaxes ordered by opener length, longest first.
pub(crate) fn blocks_longest_first(syntax: &CommentSyntax) -> Vec<BlockSyntax> {
    let mut blocks: Vec<BlockSyntax> = syntax
        .block
        .iter()
        .filter(|b| !b.open.is_empty() && !b.close.is_empty())
        .cloned()
        .collect();
    blocks.sort_by(|a, b| b.open.len().cmp(&a.open.len()));
    blocks
}

/// Longest block fence token, the lookahead a scanner needs at any offset.
pub(crate) fn block_lookahead(blocks: &[BlockSyntax]) -> usize {
    blocks
        .iter()
        .flat_map(|b| [b.open.len(), b.close.len()])
        .max()
        .unwrap_or(0)
}

/// Index of the block whose opener starts at `pos`.
pub(crate) fn match_open(bytes: &[u8], pos: usize, blocks: &[BlockSyntax]) -> Option<usize> {
    let rest = &bytes[pos..];
    blocks
        .iter()
        .position(|b| rest.starts_with(b.open.as_bytes()))
}

pub(crate) enum BlockStep {
    Close(usize),
    Open(usize),
    Advance,
}

/// What happens at `pos` while inside `block`. Closers are tried before
/// openers so symmetric fences (`"""`) terminate.
pub(crate) fn step_in_block(bytes: &[u8], pos: usize, block: &BlockSyntax) -> BlockStep {
    let rest = &bytes[pos..];
    if rest.starts_with(block.close.as_bytes()) {
        BlockStep::Close(block.close.len())
    } else if block.nested && rest.starts_with(block.open.as_bytes()) {
        BlockStep::Open(block.open.len())
    } else {
        BlockStep::Advance
    }
}

/// Strip a trailing `\r` from a line.
pub(crate) fn content_end(bytes: &[u8], start: usize, end: usize) -> usize {
    if end > start && bytes[end - 1] == b'\r' {
        end - 1
    } else {
        end
    }
}

/// Build a line comment node when `line` is one.
pub(crate) fn line_comment(
    line: &str,
    offset: usize,
    line_no: usize,
    prefixes: &[String],
) -> Option<CommentNode> {
    let trimmed = line.trim_start();
    let prefix = prefixes.iter().find(|p| trimmed.starts_with(p.as_str()))?;
    let after = &trimmed[prefix.len()..];
    let inner = after.strip_prefix(' ').unwrap_or(after);
    Some(CommentNode {
        kind: CommentKind::Line,
        raw: line.to_string(),
        inner: inner.to_string(),
        fence: prefix.clone(),
        range: offset..offset + line.len(),
        start: Position::new(line_no, 1),
        end: Position::new(line_no, line.len() + 1),
    })
}

pub(crate) fn block_comment(
    raw: String,
    block: &BlockSyntax,
    offset: usize,
    start: Position,
    end: Position,
) -> CommentNode {
    let inner_end = raw.len().saturating_sub(block.close.len());
    let inner = raw
        .get(block.open.len()..inner_end)
        .unwrap_or_default()
        .to_string();
    let len = raw.len();
    CommentNode {
        kind: CommentKind::Block,
        raw,
        inner,
        fence: block.open.clone(),
        range: offset..offset + len,
        start,
        end,
    }
}

/// Line prefixes ordered longest first.
pub(crate) fn line_prefixes(syntax: &CommentSyntax) -> Vec<String> {
    syntax
        .line_prefixes_longest_first()
        .into_iter()
        .map(str::to_string)
        .collect()
}
