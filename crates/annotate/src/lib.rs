//! Comment scanning and annotation extraction.
//!
//! Source text goes through three steps:
//! 1. a scanner ([`scan_comments`] or [`StreamScanner`]) finds comments using a
//!    language's [`CommentSyntax`](smelter_api::CommentSyntax)
//! 2. block bodies are normalized ([`normalize_block`])
//! 3. the [`AnnotationExtractor`] runs tag, key/value, YAML and JSON
//!    sub-extractors and aggregates an [`AnnotationCatalog`](smelter_api::AnnotationCatalog)

pub mod error;
pub mod extract;
pub mod normalize;
pub mod scanner;

pub use error::ScanError;
pub use extract::{AnnotationExtractor, ExtractorConfig, ItemValidator};
pub use normalize::normalize_block;
pub use scanner::memory::scan_comments;
pub use scanner::stream::{StreamScanner, scan_reader};
