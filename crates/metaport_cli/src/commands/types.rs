use comfy_table::{ContentArrangement, Table};
use metaport_core::Store;
use metaport_core::config::MetaportConfig;
use miette::Result;

use crate::output::Output;

/// List the metaobject definition types of a store
pub async fn list(config: &MetaportConfig, env: &str) -> Result<()> {
    let output = Output::new();
    let store = super::connect(config, env)?;

    output.info("Listing", &format!("metaobject types on {env}"));
    let types = store.metaobject_types().await?;

    if types.is_empty() {
        output.status("No metaobject definitions found");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["TYPE", "PORTABLE TYPE"]);
    for type_name in &types {
        table.add_row(vec![
            type_name.clone(),
            metaport_core::normalize_type(type_name),
        ]);
    }
    println!("{table}");
    output.kv("Types", &types.len().to_string());

    Ok(())
}
