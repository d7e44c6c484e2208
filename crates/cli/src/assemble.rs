use crate::view::{DiagnosticView, ResourceView};
use nu_ansi_term::Color;
use smelter_core::AssemblyReport;
use std::path::PathBuf;
use tabled::Table;
use tracing::info;

pub async fn run(
    path: PathBuf,
    dry_run: bool,
    config: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = smelter_runtime::load_config(&path, config.as_deref())?;
    config.dry_run |= dry_run;

    let assembler = smelter_runtime::build_default_assembler(path.clone(), config)?;

    // Ctrl+C stops walking; the run still finishes and reports
    let cancel = assembler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    info!("Assembling project at: {}...", path.display());
    let report = assembler.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &AssemblyReport) {
    let rows: Vec<ResourceView> = report
        .materialized
        .iter()
        .map(ResourceView::from_resource)
        .collect();
    if rows.is_empty() {
        println!("No resources found.");
    } else {
        println!("{}", Table::new(rows));
    }

    println!(
        "Discovered: {}  Materialized: {}  Routes: {}",
        report.discovered.len(),
        report.materialized.len(),
        report.forest.len()
    );
    let written = report.directives.iter().filter(|d| d.written).count();
    println!(
        "Directives: {} files, {} written  Foundries: {} run",
        report.directives.len(),
        written,
        report.foundries.len()
    );
    for foundry in &report.foundries {
        let status = match &foundry.error {
            Some(e) => Color::Red.paint(format!("failed: {}", e)).to_string(),
            None if foundry.dry_run => Color::Yellow.paint("planned").to_string(),
            None => Color::Green.paint("ok").to_string(),
        };
        let output = foundry
            .output
            .as_ref()
            .map(|o| o.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let source = foundry.resource.rel_path.display();
        println!("  {} -> {} [{}]", source, output, status);
    }

    if report.cancelled {
        let notice = Color::Yellow.bold().paint("Cancelled before completion.");
        println!("{}", notice);
    }
    if report.diagnostics.is_empty() {
        println!("{}", Color::Green.paint("No diagnostics."));
    } else {
        println!(
            "{}",
            Color::Red
                .bold()
                .paint(format!("{} diagnostics:", report.diagnostics.len()))
        );
        let rows: Vec<DiagnosticView> = report
            .diagnostics
            .iter()
            .map(DiagnosticView::from_diagnostic)
            .collect();
        println!("{}", Table::new(rows));
    }
}
