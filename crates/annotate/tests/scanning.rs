use smelter_annotate::{
    AnnotationExtractor, ExtractorConfig, StreamScanner, scan_comments, scan_reader,
};
use smelter_api::{BlockSyntax, CommentKind, CommentNode, CommentSyntax};

fn sql() -> CommentSyntax {
    CommentSyntax {
        line: vec!["--".into()],
        block: vec![BlockSyntax::new("/*", "*/")],
    }
}

fn rust_like() -> CommentSyntax {
    CommentSyntax {
        line: vec!["//".into(), "///".into()],
        block: vec![BlockSyntax::new("/*", "*/").nested(true)],
    }
}

fn html_like() -> CommentSyntax {
    CommentSyntax {
        line: vec![],
        block: vec![BlockSyntax::new("<!--", "-->")],
    }
}

fn python_like() -> CommentSyntax {
    CommentSyntax {
        line: vec!["#".into()],
        block: vec![BlockSyntax::new("\"\"\"", "\"\"\"")],
    }
}

const SAMPLES: &[&str] = &[
    "-- @tag hello",
    "select 1;\n/**\n * @resource.nature sql\n * @resource.impact ddl\n */\ncreate table t (id int);\n-- trailing\n",
    "/* a /* b */ c */\n// after\n/// doc line\r\n",
    "<p>x</p>\n<!-- ---\nroute:\n  path: /a\n  caption: A\n--- -->\n<!-- never closed",
    "#!/usr/bin/env python3\n# @foundry\n\"\"\"\n@resource.nature foundry\n\"\"\"\nprint('hi')  # not a line comment\n",
    "\n\n--\n--x\r\n   -- indented\n/**/",
];

fn syntax_for(i: usize) -> CommentSyntax {
    match i {
        2 => rust_like(),
        3 => html_like(),
        4 => python_like(),
        _ => sql(),
    }
}

fn stream(text: &str, syntax: &CommentSyntax, sizes: &[usize]) -> Vec<CommentNode> {
    let mut scanner = StreamScanner::new(syntax);
    let bytes = text.as_bytes();
    let mut nodes = Vec::new();
    let (mut pos, mut i) = (0, 0);
    while pos < bytes.len() {
        let end = (pos + sizes[i % sizes.len()].max(1)).min(bytes.len());
        nodes.extend(scanner.push(&bytes[pos..end]));
        pos = end;
        i += 1;
    }
    nodes.extend(scanner.finish());
    nodes
}

#[test]
fn test_streaming_matches_memory_for_every_chunking() {
    let patterns: &[&[usize]] = &[&[1], &[2], &[3], &[1, 4], &[5, 1, 2], &[7], &[64], &[4096]];
    for (i, text) in SAMPLES.iter().enumerate() {
        let syntax = syntax_for(i);
        let expected = scan_comments(text, &syntax);
        for sizes in patterns {
            assert_eq!(
                stream(text, &syntax, sizes),
                expected,
                "sample {i} with chunk sizes {sizes:?}"
            );
        }
        // every single split point
        for split in 0..=text.len() {
            let mut scanner = StreamScanner::new(&syntax);
            let mut nodes = scanner.push(&text.as_bytes()[..split]);
            nodes.extend(scanner.push(&text.as_bytes()[split..]));
            nodes.extend(scanner.finish());
            assert_eq!(nodes, expected, "sample {i} split at {split}");
        }
    }
}

#[test]
fn test_nested_flag_changes_block_extent() {
    let text = "/* a /* b */ c */";
    let nested = CommentSyntax {
        line: vec![],
        block: vec![BlockSyntax::new("/*", "*/").nested(true)],
    };
    let flat = CommentSyntax {
        line: vec![],
        block: vec![BlockSyntax::new("/*", "*/")],
    };

    let nodes = scan_comments(text, &nested);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].raw, text);

    let nodes = scan_comments(text, &flat);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].raw, "/* a /* b */");
    assert_eq!(&text[nodes[0].range.end..], " c */");
}

#[test]
fn test_html_unclosed_tail_is_dropped() {
    let nodes = scan_comments(SAMPLES[3], &html_like());
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].kind, CommentKind::Block);
}

#[test]
fn test_reextraction_is_idempotent() {
    let extractor = AnnotationExtractor::new(ExtractorConfig::default()).unwrap();
    for (i, text) in SAMPLES.iter().enumerate() {
        let syntax = syntax_for(i);
        let first = extractor.extract(text, &syntax);
        let second = extractor.extract(text, &syntax);
        assert_eq!(first.items, second.items);
        assert_eq!(first.summary, second.summary);
    }
}

#[test]
fn test_streamed_comments_extract_like_memory() {
    let extractor = AnnotationExtractor::new(ExtractorConfig::default()).unwrap();
    let text = SAMPLES[1];
    let streamed = stream(text, &sql(), &[3]);
    let catalog = extractor.extract_comments(&streamed);
    assert_eq!(catalog, extractor.extract(text, &sql()));
    assert_eq!(catalog.count("tag:resource.nature"), 1);
    assert_eq!(catalog.count("tag:resource.impact"), 1);
}

#[test]
fn test_yaml_inside_html_comment() {
    let extractor = AnnotationExtractor::new(ExtractorConfig::default()).unwrap();
    let catalog = extractor.extract(SAMPLES[3], &html_like());
    assert_eq!(catalog.len(), 1);
    assert_eq!(
        catalog.items[0].value,
        serde_json::json!({"route": {"path": "/a", "caption": "A"}})
    );
}

#[tokio::test]
async fn test_reader_scan_uses_small_reads() {
    let text = SAMPLES[2];
    let nodes = scan_reader(text.as_bytes(), &rust_like(), 2).await.unwrap();
    assert_eq!(nodes, scan_comments(text, &rust_like()));
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[2].fence, "///");
}
