use clap::Parser;
use std::path::PathBuf;
use timesheet_extract::{BedrockClient, Config, ExtractionReport, Extractor};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Extract employee timesheets from documents and print them as JSON.
#[derive(Parser, Debug)]
#[command(name = "timesheet-extract")]
#[command(version)]
struct Args {
    /// TOML config file; defaults apply when it does not exist
    #[arg(short, long, default_value = "timesheet.toml", env = "TIMESHEET_CONFIG")]
    config: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Documents to process
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = Config::load_or_default(&args.config)?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    timesheet_extract::inference::install_crypto_provider();

    let client = BedrockClient::new(&cfg.inference)?;
    let extractor = Extractor::new(&cfg, client);

    info!(files = args.files.len(), config = %args.config.display(), "Starting extraction");

    let output = tokio::select! {
        res = run(&extractor, &args.files) => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning in-flight extraction");
            return Ok(());
        }
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}

/// One file prints one report; several go through the batch path.
async fn run(
    extractor: &Extractor<BedrockClient>,
    files: &[PathBuf],
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    if let [path] = files {
        let report = extractor.report_path(path).await;
        return Ok(serde_json::to_value(report)?);
    }
    let reports: Vec<ExtractionReport> = extractor.report_paths(files).await?;
    Ok(serde_json::to_value(reports)?)
}
