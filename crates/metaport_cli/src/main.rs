mod commands;
mod output;
mod progress;

use clap::{Parser, Subcommand};
use metaport_core::CancelFlag;
use metaport_core::config;
use miette::Result;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser)]
#[command(name = "metaport")]
#[command(about = "Move metaobjects between stores with portable references")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Also write logs to daily files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List metaobject definition types of a store
    Types {
        /// Environment label from the configuration
        #[arg(long)]
        env: String,
    },
    /// Export metaobjects to a document
    Export {
        /// Environment label to read from
        #[arg(long)]
        env: String,

        /// Metaobject types to export
        #[arg(long = "type", short = 't')]
        types: Vec<String>,

        /// Export every type defined on the store
        #[arg(long, conflicts_with = "types")]
        all_types: bool,

        /// Keep store ids instead of portable references
        #[arg(long)]
        retain_ids: bool,

        /// Skip back-references
        #[arg(long)]
        no_back_references: bool,

        /// Output file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Import a document into a store
    Import {
        /// Environment label to write to
        #[arg(long)]
        env: String,

        /// Export document to import
        file: PathBuf,

        /// Record failing entries and continue
        #[arg(long)]
        skip_errors: bool,

        /// Import only the entry at this index
        #[arg(long)]
        entry: Option<usize>,

        /// Summary file (default: <file>.import-summary.json)
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Save current configuration to file
    Save {
        /// Path to save configuration
        #[arg(default_value = config::CONFIG_FILE_NAME)]
        path: PathBuf,
    },
}

fn init_logging(debug: bool, log_dir: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if debug {
        EnvFilter::new("metaport_core=debug,metaport_cli=debug,warn")
    } else {
        EnvFilter::new("metaport_core=info,metaport_cli=info,warn")
    };

    let console = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_timer(fmt::time::LocalTime::rfc_3339())
        .compact();

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .map_err(|e| miette::miette!("Cannot create log directory {}: {}", dir.display(), e))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "metaport.log"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(false),
        )
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .with_syntax_highlighting(miette::highlighters::SyntectHighlighter::default())
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    // Held until exit so buffered log lines are flushed
    let _log_guard = init_logging(cli.debug, cli.log_dir.as_ref())?;

    let config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        config::load_config(config_path).await?
    } else {
        info!("Loading config from standard locations");
        config::load_config_from_standard_locations().await?
    };

    match &cli.command {
        Commands::Types { env } => commands::types::list(&config, env).await?,
        Commands::Export {
            env,
            types,
            all_types,
            retain_ids,
            no_back_references,
            output,
        } => {
            let args = commands::export::ExportArgs {
                env,
                types,
                all_types: *all_types,
                retain_ids: *retain_ids,
                back_references: !*no_back_references,
                output: output.clone(),
            };
            commands::export::run(&config, args).await?
        }
        Commands::Import {
            env,
            file,
            skip_errors,
            entry,
            summary,
        } => {
            let cancel = CancelFlag::new();
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping after the current entry");
                    flag.cancel();
                }
            });

            let args = commands::import::ImportArgs {
                env,
                file,
                skip_errors: *skip_errors,
                entry: *entry,
                summary: summary.clone(),
                cancel,
            };
            commands::import::run(&config, args).await?
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => commands::config::show(&config).await?,
            ConfigCommands::Save { path } => commands::config::save(&config, path).await?,
        },
    }

    Ok(())
}
