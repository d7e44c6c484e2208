use smelter_annotate::{AnnotationExtractor, scan_reader};
use smelter_core::config::AnnotationConfig;
use std::path::PathBuf;

const CHUNK_SIZE: usize = 8 * 1024;

pub async fn run(
    file: PathBuf,
    language: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = smelter_runtime::default_registry();
    let spec = match language {
        Some(name) => registry.get(&name)?,
        None => {
            let text = smelter_core::content::read_text(&file).await?;
            registry
                .detect(&file, Some(text.as_str()))
                .ok_or_else(|| format!("cannot detect a language for {}", file.display()))?
        }
    };

    let reader = tokio::fs::File::open(&file).await?;
    let comments = scan_reader(reader, &spec.comments, CHUNK_SIZE).await?;
    let extractor = AnnotationExtractor::new((&AnnotationConfig::default()).into())?;
    let catalog = extractor.extract_comments(&comments);

    tracing::info!(
        file = %file.display(),
        language = %spec.name,
        comments = comments.len(),
        items = catalog.len(),
        "scanned"
    );
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}
