//! CLI binary for pdf-translate-client.
//!
//! A thin shim over the library crate: maps CLI flags to `ClientConfig`,
//! drives one `UploadController` session and saves the translated PDF.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_translate_client::{
    format_file_size, ClientConfig, HttpService, Phase, SelectedFile, SessionError,
    SessionObserver, Stage, TranslationService, UploadController,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal observer using indicatif ────────────────────────────────────────

/// Renders the session as a spinner while uploading and a percentage bar
/// while the service works on the document.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_bar(&self) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(style);
    }
}

impl SessionObserver for CliObserver {
    fn on_phase_change(&self, _from: Phase, to: Phase) {
        match to {
            Phase::FileSelected => self.bar.set_message("Waiting to upload…"),
            Phase::Uploading => {
                self.bar.set_prefix("Uploading");
                self.bar.set_message("Sending file to server…");
            }
            Phase::Polling => {
                self.activate_bar();
                self.bar.set_prefix(Stage::Recognizing.label());
                self.bar.set_position(0);
            }
            Phase::Completed => {
                self.bar.set_position(100);
                self.bar.finish_and_clear();
                eprintln!("{} {}", green("✔"), bold("Translation complete"));
            }
            Phase::Failed => self.bar.finish_and_clear(),
            Phase::Idle => self.bar.finish_and_clear(),
        }
    }

    fn on_progress(&self, percent: u8, stage: Stage, message: &str) {
        self.bar.set_prefix(stage.label());
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(message.to_string());
    }

    fn on_error(&self, error: &SessionError) {
        self.bar.println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate a document with a local server
  pdftx paper.pdf

  # Different server, write next to a target directory
  pdftx --server https://translate.example.com -o out/ paper.pdf

  # Only check that the server is up
  pdftx --health-only

  # Final session state as JSON (for scripts)
  pdftx --json paper.pdf

ENVIRONMENT VARIABLES:
  PDFTX_SERVER      Base URL of the translation service
  PDFTX_OUTPUT_DIR  Directory the translated PDF is written to
  RUST_LOG          Overrides the log filter (e.g. pdf_translate_client=debug)
"#;

/// Upload a PDF to a translation service and download the translated result.
#[derive(Parser, Debug)]
#[command(
    name = "pdftx",
    version,
    about = "Translate a PDF through a remote translation service",
    long_about = "Uploads a PDF to a translation service, follows its progress through \
recognition, translation and rebuilding, and saves the translated document as \
translated_<name>.pdf.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path of the PDF to translate.
    #[arg(required_unless_present = "health_only")]
    input: Option<PathBuf>,

    /// Base URL of the translation service.
    #[arg(short, long, env = "PDFTX_SERVER", default_value = pdf_translate_client::DEFAULT_BASE_URL)]
    server: String,

    /// Directory the translated PDF is written to.
    #[arg(short, long, env = "PDFTX_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Status check interval in milliseconds.
    #[arg(long, env = "PDFTX_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Extra attempts when the download fails.
    #[arg(long, default_value_t = 2)]
    download_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Only probe the service health endpoint.
    #[arg(long)]
    health_only: bool,

    /// Print the final session snapshot as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already says everything INFO logs would.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = build_config(&cli, (show_progress && !cli.health_only).then(CliObserver::new))?;
    let service = Arc::new(HttpService::new(&config).context("Failed to build HTTP client")?);

    // ── Health-only mode ─────────────────────────────────────────────────
    if cli.health_only {
        let report = service
            .health()
            .await
            .with_context(|| format!("Server at {} is unreachable", cli.server))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise health report")?
            );
        } else if !cli.quiet {
            let mark = if report.is_healthy() { green("✔") } else { red("✘") };
            eprintln!("{} {} is {}", mark, bold(&cli.server), report.status);
        }
        if !report.is_healthy() {
            bail!("Server reported status '{}'", report.status);
        }
        return Ok(());
    }

    let Some(input) = cli.input.as_ref() else {
        bail!("No input file given");
    };
    let file = SelectedFile::from_path(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold(&file.name),
            dim(&format_file_size(file.size()))
        );
    }

    // ── Run the session ──────────────────────────────────────────────────
    let controller = UploadController::new(service, config);
    controller
        .select_file(file)
        .context("File was not accepted")?;

    let log_lines = (!show_progress && !cli.quiet && !cli.json).then(|| {
        let mut updates = controller.updates();
        tokio::spawn(async move {
            let mut last = None;
            while let Some(snap) = updates.next().await {
                let line = (snap.phase, snap.progress_percent, snap.last_message.clone());
                if last.as_ref() != Some(&line) {
                    eprintln!("[{}] {:>3}%  {}", snap.phase, snap.progress_percent, snap.last_message);
                    last = Some(line);
                }
            }
        })
    });

    let done = tokio::select! {
        done = controller.wait_until_settled() => done,
        _ = tokio::signal::ctrl_c() => {
            controller.reset();
            bail!("Interrupted");
        }
    };
    if let Some(task) = log_lines {
        task.abort();
    }

    let saved = match done.phase {
        Phase::Completed => Some(download_with_retries(&controller, &cli).await?),
        _ => None,
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&controller.snapshot())
            .context("Failed to serialise session snapshot")?;
        println!("{json}");
    }

    match (done.phase, saved) {
        (Phase::Completed, Some(path)) => {
            if !cli.quiet && !cli.json {
                eprintln!("   {}  {}", dim("saved to"), bold(&path.display().to_string()));
            }
            Ok(())
        }
        _ => bail!("Translation failed: {}", done.last_message),
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<CliObserver>>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.server.clone())
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .download_timeout_secs(cli.download_timeout);
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }
    builder.build().context("Invalid configuration")
}

async fn download_with_retries(controller: &UploadController, cli: &Cli) -> Result<PathBuf> {
    let mut attempt = 0;
    let artifact = loop {
        match controller.download().await {
            Ok(artifact) => break artifact,
            Err(e) if attempt < cli.download_retries => {
                attempt += 1;
                if !cli.quiet {
                    eprintln!("  {} {} (retry {}/{})", cyan("⚠"), e, attempt, cli.download_retries);
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e).context("Download failed"),
        }
    };

    artifact
        .save_to(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to write into {}", cli.output_dir.display()))
}
