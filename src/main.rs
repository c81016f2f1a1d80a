use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docextract::{
    config::Config,
    extraction::render::{render_structured, render_summary, render_tabular},
    models::{ExtractionRequest, OutputFormat},
    ocr::languages::languages_or_fallback,
    routes, AppState,
};

#[derive(Parser)]
#[command(name = "docextract")]
#[command(about = "Extract text from documents and images", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Extract a single file and print the result
    Extract {
        path: PathBuf,

        /// structured (json), tabular (csv) or summary
        #[arg(short, long, default_value = "structured")]
        format: String,

        /// Include every OCR pass in the output
        #[arg(short, long)]
        verbose: bool,
    },
    /// List the OCR languages the engine reports
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    // Logs go to stderr so `extract` output can be piped
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "docextract=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;

    match command {
        Command::Serve => serve(config).await,
        Command::Extract { path, format, verbose } => extract(config, path, &format, verbose).await,
        Command::Languages => {
            let state = AppState::from_config(config)?;
            for language in languages_or_fallback(state.languages.as_ref()).await {
                println!("{}", language);
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let address = config.server_address.clone();
    let state = AppState::from_config(config)?;
    state
        .extraction
        .staging()
        .initialize()
        .await
        .context("Failed to create upload directory")?;

    let app = routes::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Document extraction API listening on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn extract(config: Config, path: PathBuf, format: &str, verbose: bool) -> Result<()> {
    let summary = format.eq_ignore_ascii_case("summary");
    let output_format: OutputFormat = if summary {
        OutputFormat::Structured
    } else {
        format.parse().map_err(|e: String| anyhow!(e))?
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("'{}' has no usable file name", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let state = AppState::from_config(config)?;
    let request = ExtractionRequest::new(filename, bytes)
        .with_output_format(output_format)
        .verbose(verbose);
    let result = state.extraction.extract(request).await?;

    if summary {
        print!("{}", render_summary(&result));
    } else {
        match output_format {
            OutputFormat::Structured => {
                println!("{}", serde_json::to_string_pretty(&render_structured(&result)?)?)
            }
            OutputFormat::Tabular => print!("{}", render_tabular(&result)?),
        }
    }

    Ok(())
}
