//! Export metaobjects from a store into a document

use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use metaport_core::config::MetaportConfig;
use metaport_core::export::write_document;
use metaport_core::{ExportOptions, Exporter, Store};

use crate::output::Output;
use crate::progress::ProgressDisplay;

pub struct ExportArgs<'a> {
    pub env: &'a str,
    pub types: &'a [String],
    pub all_types: bool,
    pub retain_ids: bool,
    pub back_references: bool,
    pub output: Option<PathBuf>,
}

/// `<env>-<type>.json`, with characters unsafe in file names replaced
fn default_output_path(env: &str, types: &[String]) -> PathBuf {
    let subject = match types {
        [single] => single.as_str(),
        _ => "metaobjects",
    };
    let name: String = format!("{env}-{subject}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    PathBuf::from(format!("{}.json", name.trim_matches('-')))
}

pub async fn run(config: &MetaportConfig, args: ExportArgs<'_>) -> Result<()> {
    let output = Output::new();
    let store = super::connect(config, args.env)?;

    let types = if args.all_types {
        store.metaobject_types().await?
    } else {
        args.types.to_vec()
    };
    if types.is_empty() {
        return Err(miette::miette!(
            help = "Pass --type <TYPE> (repeatable) or --all-types",
            "No metaobject types to export"
        ));
    }

    let path = args
        .output
        .unwrap_or_else(|| default_output_path(args.env, &types));
    output.info(
        "Exporting",
        &format!(
            "{} type(s) from {} to {}",
            types.len(),
            args.env.bright_cyan(),
            path.display()
        ),
    );

    let options = ExportOptions {
        retain_ids: args.retain_ids,
        include_back_references: args.back_references,
        ..ExportOptions::from_limits(&config.limits)
    };
    let display = ProgressDisplay::for_export();
    let result = Exporter::new(&store, options)
        .with_observer(&display)
        .export(&types)
        .await;
    display.finish();

    let document = match result {
        Ok(document) => document,
        Err(e) => {
            metaport_core::log_error!("Export failed", e);
            output.error("Export failed, no document written");
            return Err(e.into());
        }
    };
    write_document(&path, &document).await?;

    let back_references: usize = document
        .entries
        .iter()
        .map(|e| e.back_references.len())
        .sum();
    output.success("Export complete!");
    output.kv("Entries", &document.count.to_string());
    output.kv("Back-references", &back_references.to_string());
    output.kv("Mode", if args.retain_ids { "retain ids" } else { "portable" });

    Ok(())
}
