//! CLI binary for formatbridge.
//!
//! A thin shim over the library crate: `list` renders the capability
//! catalog the way the web page renders its card grid, `convert` runs one
//! upload session with a progress bar and writes the result to disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formatbridge::{
    CatalogView, Checkpoint, ClientConfig, ConversionProgressCallback,
    ConversionSelection, ConverterClient, FormatId, ProgressCallback, UploadFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a percentage bar driven by upload checkpoints.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, file_name: &str, selection: &ConversionSelection) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&selection.title()),
            dim(file_name)
        ));
    }

    fn on_checkpoint(&self, checkpoint: Checkpoint) {
        self.bar.set_position(checkpoint.percent() as u64);
        self.bar.set_message(checkpoint.label());
    }

    fn on_upload_complete(&self, filename: &str, bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(filename),
            dim(&format!("{bytes} bytes"))
        );
    }

    fn on_upload_error(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show every available conversion
  formatbridge list

  # Search the catalog (matches source and target names)
  formatbridge list docx

  # Convert a file; the result lands in the current directory
  formatbridge convert data.json --to md

  # Choose the output path explicitly
  formatbridge convert scan.pdf --to .png -o pages/scan.png

  # Talk to a remote service
  formatbridge --url https://convert.example.com list

ENVIRONMENT VARIABLES:
  FORMATBRIDGE_URL          Base URL of the conversion service
  FORMATBRIDGE_API_PREFIX   API path prefix (default /api/v1)
  FORMATBRIDGE_TIMEOUT      Request timeout in seconds (default: none)
  RUST_LOG                  Override the log filter
"#;

/// Convert files through a format-conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "formatbridge",
    version,
    about = "Convert files through a format-conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the conversion service.
    #[arg(long, global = true, env = "FORMATBRIDGE_URL", default_value = "http://localhost:8000")]
    url: String,

    /// API path prefix.
    #[arg(long, global = true, env = "FORMATBRIDGE_API_PREFIX", default_value = "/api/v1")]
    api_prefix: String,

    /// Request timeout in seconds. No timeout when unset.
    #[arg(long, global = true, env = "FORMATBRIDGE_TIMEOUT")]
    timeout: Option<u64>,

    /// Disable progress bar.
    #[arg(long, global = true, env = "FORMATBRIDGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FORMATBRIDGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FORMATBRIDGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available conversions, optionally filtered by a search query.
    List {
        /// Case-insensitive search over source and target formats.
        #[arg(default_value = "")]
        query: String,

        /// Print the matching entries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Upload a file and download the converted result.
    Convert {
        /// The file to convert. Its extension selects the source format.
        input: PathBuf,

        /// Target format, with or without the leading dot (e.g. `md`, `.docx`).
        #[arg(long, short = 't')]
        to: String,

        /// Output file or directory. Default: current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a JSON report instead of the summary line.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar owns stderr while it is visible; only errors get
    // through unless the user asked for more.
    let json = matches!(
        cli.command,
        Command::List { json: true, .. } | Command::Convert { json: true, .. }
    );
    let show_progress = !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = match cli.command {
        Command::Convert { .. } if show_progress => {
            Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
        }
        _ => None,
    };
    let config = build_config(&cli, progress)?;
    let mut client = ConverterClient::new(config).context("Failed to create client")?;

    match cli.command {
        Command::List { ref query, json } => run_list(&mut client, query, json).await,
        Command::Convert {
            ref input,
            ref to,
            ref output,
            json,
        } => run_convert(&mut client, input, to, output.clone(), json, cli.quiet).await,
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(&cli.url)
        .api_prefix(&cli.api_prefix);
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

async fn run_list(client: &mut ConverterClient, query: &str, json: bool) -> Result<()> {
    // A failed load is shown in place of the grid, not raised.
    if let Err(e) = client.load_catalog().await {
        tracing::error!("{e}");
    }

    if json {
        if let Some(err) = client.catalog().load_error() {
            anyhow::bail!("Failed to load capabilities: {err}");
        }
        let entries = client.catalog().search(query);
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialise catalog")?
        );
        return Ok(());
    }

    let view = client.catalog().render(query);
    match &view {
        CatalogView::LoadError { .. } => anyhow::bail!("{view}"),
        CatalogView::NoResults { .. } => eprintln!("{}", dim(&view.to_string())),
        _ => println!("{view}"),
    }
    Ok(())
}

async fn run_convert(
    client: &mut ConverterClient,
    input: &Path,
    to: &str,
    output: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    client
        .load_catalog()
        .await
        .context("Failed to load the list of supported conversions")?;

    let target = FormatId::new(to);
    let source = client.catalog().source_for_path(input)?;
    let mut session = client
        .open_session(&source, &target)
        .context("Conversion not available")?;
    let upload = UploadFile::from_path(input).await?;

    if let Err(e) = client.submit(&mut session, &upload).await {
        if e.is_conversion_failure() {
            return Err(anyhow::Error::new(e).context("Conversion failed"));
        }
        return Err(e.into());
    }

    let dest = output.unwrap_or_else(|| PathBuf::from("."));
    let path = client
        .save_artifact(&mut session, &dest)
        .await
        .context("Failed to save converted file")?;
    let bytes = session.artifact().map(|a| a.len()).unwrap_or(0);

    if json {
        let report = serde_json::json!({
            "input": input,
            "output": path,
            "source": source,
            "target": target,
            "bytes": bytes,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {}  →  {}",
            green("✔"),
            input.display(),
            bold(&path.display().to_string())
        );
    }
    Ok(())
}
