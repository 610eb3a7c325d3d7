//! Import a document into a store

use comfy_table::{ContentArrangement, Table};
use miette::Result;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

use metaport_core::config::MetaportConfig;
use metaport_core::export::read_document;
use metaport_core::{CancelFlag, ImportOptions, ImportReport, Importer};

use crate::output::{Output, format_status};
use crate::progress::ProgressDisplay;

pub struct ImportArgs<'a> {
    pub env: &'a str,
    pub file: &'a Path,
    pub skip_errors: bool,
    pub entry: Option<usize>,
    pub summary: Option<PathBuf>,
    pub cancel: CancelFlag,
}

/// `<file stem>.import-summary.json` next to the document
fn default_summary_path(file: &Path) -> PathBuf {
    file.with_extension("import-summary.json")
}

fn results_table(report: &ImportReport) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "TYPE", "HANDLE", "STATUS", "ERROR"]);
    for result in &report.results {
        table.add_row(vec![
            result.index.to_string(),
            result.type_name.clone(),
            result.handle.clone(),
            format_status(result.status),
            result.error.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub async fn run(config: &MetaportConfig, args: ImportArgs<'_>) -> Result<()> {
    let output = Output::new();
    let document = read_document(args.file).await?;
    let store = super::connect(config, args.env)?;

    output.info(
        "Importing",
        &format!(
            "{} entries from {} ({}) into {}",
            document.count,
            args.file.display(),
            document.environment,
            args.env.bright_cyan()
        ),
    );

    let options = ImportOptions {
        skip_on_error: args.skip_errors,
        cancel: Some(args.cancel),
        ..ImportOptions::from_limits(&config.limits)
    };
    let total = if args.entry.is_some() { 1 } else { document.count };
    let display = ProgressDisplay::for_import(total);
    let importer = Importer::new(&store, options).with_observer(&display);
    let result = match args.entry {
        Some(index) => importer.import_entry(&document, index).await,
        None => importer.import(&document).await,
    };
    display.finish();

    let summary_path = args
        .summary
        .unwrap_or_else(|| default_summary_path(args.file));

    // A run whose back-reference writes failed still finished every entry
    let report = match &result {
        Ok(report) => Some(report),
        Err(e) => e.import_report(),
    };
    if let Some(report) = report {
        report.write_summary(&summary_path).await?;
        print_results(&output, report, &summary_path);
    }

    let finished = report.is_some();

    if let Err(e) = result {
        let e = miette::Report::new(e);
        metaport_core::log_error!("Import failed", e);
        output.error(if finished {
            "Import finished with back-reference failures"
        } else {
            "Import aborted"
        });
        return Err(e);
    }
    Ok(())
}

fn print_results(output: &Output, report: &ImportReport, summary_path: &Path) {
    println!("{}", results_table(report));
    if report.cancelled {
        output.warning("Import cancelled; entries not started are marked pending");
    }
    let failed = report.failed_count();
    if failed == 0 {
        output.success("Import complete!");
    } else {
        output.error(&format!("{failed} entr{} failed", if failed == 1 { "y" } else { "ies" }));
    }
    output.kv("Created", &report.created_count().to_string());
    output.kv("Failed", &failed.to_string());
    output.kv("Summary", &summary_path.display().to_string());
}
