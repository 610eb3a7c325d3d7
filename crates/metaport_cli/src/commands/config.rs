use miette::{IntoDiagnostic, Result};
use metaport_core::config::{self, MetaportConfig};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::output::Output;

/// Copy of the config with literal tokens masked
fn redacted(config: &MetaportConfig) -> MetaportConfig {
    let mut config = config.clone();
    for environment in config.environments.values_mut() {
        if environment.access_token.is_some() {
            environment.access_token = Some("********".to_string());
        }
    }
    config
}

/// Show current configuration
pub async fn show(config: &MetaportConfig) -> Result<()> {
    let output = Output::new();

    output.section("Current Configuration");
    println!();

    let toml_str = toml::to_string_pretty(&redacted(config)).into_diagnostic()?;
    println!("{}", toml_str);

    for label in config.environments.keys() {
        output.kv(
            &format!("{label} token variable"),
            &config.environments[label]
                .access_token_env
                .clone()
                .unwrap_or_else(|| config::default_token_var(label)),
        );
    }

    Ok(())
}

/// Save current configuration to file
pub async fn save(config: &MetaportConfig, path: &PathBuf) -> Result<()> {
    let output = Output::new();

    output.info(
        "Saving",
        &format!("configuration to: {}", path.display()),
    );

    config::save_config(config, path).await?;

    output.success("Configuration saved successfully!");
    println!();
    println!("To use this configuration, run:");
    println!(
        "  {} --config {}",
        "metaport".bright_green(),
        path.display()
    );

    Ok(())
}
