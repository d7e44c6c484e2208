use super::{
    BlockStep, block_comment, block_lookahead, blocks_longest_first, content_end, line_comment,
    line_prefixes, match_open, step_in_block,
};
use crate::error::ScanError;
use smelter_api::{BlockSyntax, CommentNode, CommentSyntax, Position};
use tokio::io::{AsyncRead, AsyncReadExt};

struct OpenBlock {
    idx: usize,
    start: usize,
    start_pos: Position,
    depth: usize,
}

/// Incremental comment scanner over chunked input.
///
/// Produces the same nodes as [`scan_comments`](super::memory::scan_comments)
/// no matter how the input is split. Between pushes it holds back at most
/// `longest fence token - 1` unscanned bytes, plus the text of the line or
/// block it may still have to emit.
pub struct StreamScanner {
    blocks: Vec<BlockSyntax>,
    prefixes: Vec<String>,
    lookahead: usize,
    /// Retained input; `buf[0]` is absolute offset `base`.
    buf: Vec<u8>,
    base: usize,
    /// Absolute offset of the next byte to scan.
    cursor: usize,
    line_start: usize,
    line_no: usize,
    /// Current line intersects a block comment.
    line_in_block: bool,
    open: Option<OpenBlock>,
}

impl StreamScanner {
    pub fn new(syntax: &CommentSyntax) -> Self {
        let blocks = blocks_longest_first(syntax);
        let lookahead = block_lookahead(&blocks);
        Self {
            blocks,
            prefixes: line_prefixes(syntax),
            lookahead,
            buf: Vec::new(),
            base: 0,
            cursor: 0,
            line_start: 0,
            line_no: 1,
            line_in_block: false,
            open: None,
        }
    }

    /// Feed the next chunk, returning comments completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<CommentNode> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        self.advance(false, &mut out);
        self.compact();
        out
    }

    /// Signal end of input. An open block is dropped, never force-closed.
    pub fn finish(mut self) -> Vec<CommentNode> {
        let mut out = Vec::new();
        self.advance(true, &mut out);
        if self.open.is_none() && !self.line_in_block {
            let end = self.base + self.buf.len();
            if self.line_start < end {
                self.emit_line(end, &mut out);
            }
        }
        out
    }

    fn end(&self) -> usize {
        self.base + self.buf.len()
    }

    fn advance(&mut self, eof: bool, out: &mut Vec<CommentNode>) {
        while self.cursor < self.end() {
            if !eof && self.end() - self.cursor < self.lookahead {
                break;
            }
            let rel = self.cursor - self.base;

            if let Some(open) = self.open.as_mut() {
                let block = &self.blocks[open.idx];
                match step_in_block(&self.buf, rel, block) {
                    BlockStep::Close(len) => {
                        self.cursor += len;
                        open.depth -= 1;
                        if open.depth == 0 {
                            self.close_block(out);
                        }
                        continue;
                    }
                    BlockStep::Open(len) => {
                        self.cursor += len;
                        open.depth += 1;
                        continue;
                    }
                    BlockStep::Advance => {}
                }
            } else if let Some(idx) = match_open(&self.buf, rel, &self.blocks) {
                self.open = Some(OpenBlock {
                    idx,
                    start: self.cursor,
                    start_pos: self.position(self.cursor),
                    depth: 1,
                });
                self.line_in_block = true;
                self.cursor += self.blocks[idx].open.len();
                continue;
            }

            if self.buf[rel] == b'\n' {
                if self.open.is_none() && !self.line_in_block {
                    self.emit_line(self.cursor, out);
                }
                self.line_start = self.cursor + 1;
                self.line_no += 1;
                self.line_in_block = self.open.is_some();
            }
            self.cursor += 1;
        }
    }

    fn position(&self, offset: usize) -> Position {
        Position::new(self.line_no, offset - self.line_start + 1)
    }

    fn close_block(&mut self, out: &mut Vec<CommentNode>) {
        let Some(open) = self.open.take() else {
            return;
        };
        let span = &self.buf[open.start - self.base..self.cursor - self.base];
        let raw = String::from_utf8_lossy(span).into_owned();
        out.push(block_comment(
            raw,
            &self.blocks[open.idx],
            open.start,
            open.start_pos,
            self.position(self.cursor),
        ));
    }

    fn emit_line(&self, line_end: usize, out: &mut Vec<CommentNode>) {
        if self.prefixes.is_empty() {
            return;
        }
        let start = self.line_start - self.base;
        let end = content_end(&self.buf, start, line_end - self.base);
        let line = String::from_utf8_lossy(&self.buf[start..end]);
        if let Some(node) = line_comment(&line, self.line_start, self.line_no, &self.prefixes) {
            out.push(node);
        }
    }

    /// Drop bytes no pending line or block can refer to.
    fn compact(&mut self) {
        let keep_from = self
            .open
            .as_ref()
            .map(|o| o.start.min(self.line_start))
            .unwrap_or(self.line_start)
            .min(self.cursor);
        let drop = keep_from - self.base;
        if drop > 0 {
            self.buf.drain(..drop);
            self.base = keep_from;
        }
    }
}

/// Scan an async reader in `chunk_size` reads.
pub async fn scan_reader<R>(
    mut reader: R,
    syntax: &CommentSyntax,
    chunk_size: usize,
) -> Result<Vec<CommentNode>, ScanError>
where
    R: AsyncRead + Unpin,
{
    let mut scanner = StreamScanner::new(syntax);
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut nodes = Vec::new();
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        nodes.extend(scanner.push(&chunk[..n]));
    }
    nodes.extend(scanner.finish());
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::memory::scan_comments;

    fn sql() -> CommentSyntax {
        CommentSyntax {
            line: vec!["--".into()],
            block: vec![BlockSyntax::new("/*", "*/")],
        }
    }

    fn feed(text: &str, syntax: &CommentSyntax, sizes: &[usize]) -> Vec<CommentNode> {
        let mut scanner = StreamScanner::new(syntax);
        let mut nodes = Vec::new();
        let bytes = text.as_bytes();
        let mut pos = 0;
        let mut i = 0;
        while pos < bytes.len() {
            let size = sizes[i % sizes.len()].max(1);
            let end = (pos + size).min(bytes.len());
            nodes.extend(scanner.push(&bytes[pos..end]));
            pos = end;
            i += 1;
        }
        nodes.extend(scanner.finish());
        nodes
    }

    #[test]
    fn test_fence_split_across_chunks() {
        let text = "x /* body */ y\n-- tail";
        // splits land between `/` and `*` of both fences
        let nodes = feed(text, &sql(), &[3, 8, 1]);
        assert_eq!(nodes, scan_comments(text, &sql()));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].inner, " body ");
    }

    #[test]
    fn test_line_terminator_split() {
        let text = "-- one\r\n-- two\r\n";
        let nodes = feed(text, &sql(), &[7, 1, 100]);
        assert_eq!(nodes, scan_comments(text, &sql()));
        assert_eq!(nodes[1].raw, "-- two");
    }

    #[test]
    fn test_unclosed_block_not_emitted_at_end_of_stream() {
        let text = "-- keep\n/* never closed\n-- gone";
        let nodes = feed(text, &sql(), &[4]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].inner, "keep");
    }

    #[test]
    fn test_buffer_is_compacted() {
        let mut scanner = StreamScanner::new(&sql());
        for _ in 0..100 {
            scanner.push(b"select 1;\n");
        }
        assert!(scanner.buf.len() < 16);
    }

    #[tokio::test]
    async fn test_scan_reader_matches_memory() {
        let text = "/** doc\n * @route.path /a\n */\n-- @tag v\n";
        let nodes = scan_reader(text.as_bytes(), &sql(), 5).await.unwrap();
        assert_eq!(nodes, scan_comments(text, &sql()));
    }
}
