//! CLI binary for pagelens.
//!
//! A thin shim over the library crate that maps CLI flags to `ClientConfig`,
//! streams answers to stdout and keeps status chatter on stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pagelens::{
    ClientConfig, ContentTarget, ConversationObserver, ConversationState, ConversationTurn,
    DocumentHandle, Explainer, ExplanationRequest, LlmCredentials, Provider, RequestStatus,
    SharedObserver, DEFAULT_PROMPT,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
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

// ── Terminal observer ────────────────────────────────────────────────────────

/// Prints answer text to stdout as it streams and shows a spinner on stderr
/// while waiting for the first token.
///
/// One spinner per request: it is created when the request starts preparing
/// and cleared as soon as text starts flowing, so it never interleaves with
/// the answer.
struct TerminalObserver {
    spinner: Mutex<Option<ProgressBar>>,
    show_spinner: bool,
    echo_content: bool,
    quiet: bool,
    /// Whether anything was written to stdout since the last newline.
    mid_line: AtomicBool,
}

impl TerminalObserver {
    fn new(show_spinner: bool, echo_content: bool, quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
            show_spinner,
            echo_content,
            quiet,
            mid_line: AtomicBool::new(false),
        })
    }

    fn start_spinner(&self, message: &str) {
        if !self.show_spinner {
            return;
        }
        let Ok(mut slot) = self.spinner.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("pagelens");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        bar.set_message(message.to_string());
    }

    fn clear_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn end_line(&self) {
        if self.mid_line.swap(false, Ordering::SeqCst) {
            println!();
        }
    }
}

impl ConversationObserver for TerminalObserver {
    fn on_status(&self, status: RequestStatus, message: &str) {
        match status {
            RequestStatus::Preparing | RequestStatus::Submitting => self.start_spinner(message),
            RequestStatus::Streaming => self.clear_spinner(),
            _ => {}
        }
    }

    fn on_question(&self, turn: &ConversationTurn) {
        if self.echo_content {
            self.end_line();
            println!("\n{} {}\n", cyan("▶"), bold(&turn.text));
        }
    }

    fn on_content(&self, _target: ContentTarget, text: &str) {
        if !self.echo_content {
            return;
        }
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        // A closed pipe (e.g. `| head`) is not worth aborting the stream for.
        if handle.write_all(text.as_bytes()).is_ok() {
            handle.flush().ok();
            self.mid_line.store(!text.ends_with('\n'), Ordering::SeqCst);
        }
    }

    fn on_finished(&self, status: RequestStatus, message: &str) {
        self.clear_spinner();
        if self.echo_content {
            self.end_line();
        }
        if self.quiet {
            return;
        }
        match status {
            RequestStatus::Completed => eprintln!("{} {}", green("✔"), dim(message)),
            _ => eprintln!("{} {}", red("✘"), red(message)),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Explain the first page
  pagelens explain manual.pdf

  # Explain page 12 with deep analysis, then ask two follow-ups
  pagelens explain manual.pdf --page 12 --deep \
      --follow-up "What does the second table compare?" \
      --follow-up "Summarise that in one sentence."

  # Keep asking questions about the page until an empty line
  pagelens explain manual.pdf --page 3 --interactive

  # Dump the full conversation as JSON
  pagelens explain manual.pdf --json > conversation.json

  # Store credentials on the backend
  pagelens keys --provider openai --api-key sk-... --model gpt-4.1

  # Page count (no backend needed)
  pagelens inspect manual.pdf

ENVIRONMENT VARIABLES:
  PAGELENS_BACKEND_URL     Analysis backend (default http://localhost:8000)
  PDFIUM_LIB_PATH          Path to an existing libpdfium
  RUST_LOG                 Overrides the log filter (e.g. pagelens=debug)

SETUP:
  1. Start the analysis backend on port 8000.
  2. Save a provider key:  pagelens keys --provider openai --api-key sk-...
  3. Explain:              pagelens explain document.pdf --page 4
"#;

/// Explain PDF pages with a streaming analysis backend.
#[derive(Parser, Debug)]
#[command(
    name = "pagelens",
    version,
    about = "Explain one page of a PDF and ask follow-up questions about it",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the analysis backend.
    #[arg(
        long,
        global = true,
        env = "PAGELENS_BACKEND_URL",
        default_value = "http://localhost:8000"
    )]
    backend_url: String,

    /// Path to the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// TCP connect timeout in seconds.
    #[arg(long, global = true, env = "PAGELENS_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Longest silence allowed while an answer streams, in seconds.
    #[arg(long, global = true, env = "PAGELENS_IDLE_TIMEOUT", default_value_t = 600)]
    idle_timeout: u64,

    /// Disable the spinner.
    #[arg(long, global = true, env = "PAGELENS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAGELENS_VERBOSE")]
    verbose: bool,

    /// Suppress everything except the answer and errors.
    #[arg(short, long, global = true, env = "PAGELENS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explain a page, then optionally ask follow-up questions.
    Explain(ExplainArgs),
    /// Save model-provider credentials on the backend.
    Keys(KeysArgs),
    /// Print the page count of a PDF.
    Inspect {
        /// PDF file.
        pdf: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ExplainArgs {
    /// PDF file.
    pdf: PathBuf,

    /// Page to explain (1-based).
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    /// Prompt for the initial explanation.
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Let the backend parse the page with a model before answering.
    #[arg(long)]
    deep: bool,

    /// Follow-up question, asked after the explanation. Repeatable.
    #[arg(long = "follow-up", value_name = "QUESTION")]
    follow_ups: Vec<String>,

    /// Read further follow-up questions from stdin until an empty line.
    #[arg(short, long)]
    interactive: bool,

    /// Print the final conversation as JSON instead of streaming text.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct KeysArgs {
    /// openai, anthropic or gemini.
    #[arg(long)]
    provider: Provider,

    /// Provider API key.
    #[arg(long, env = "PAGELENS_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model used to answer questions.
    #[arg(long)]
    model: Option<String>,

    /// Model used for deep-analysis page parsing.
    #[arg(long)]
    parsing_model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active; it
    // would be torn apart by log lines on the same stream.
    let json = matches!(&cli.command, Command::Explain(args) if args.json);
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

    match &cli.command {
        Command::Inspect { pdf } => run_inspect(&cli, pdf).await,
        Command::Keys(args) => run_keys(&cli, args).await,
        Command::Explain(args) => run_explain(&cli, args, show_progress).await,
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, observer: Option<SharedObserver>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .backend_url(cli.backend_url.clone())
        .connect_timeout_secs(cli.connect_timeout)
        .stream_idle_timeout_secs(cli.idle_timeout);

    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    builder.build().context("Invalid configuration")
}

async fn run_inspect(cli: &Cli, pdf: &Path) -> Result<()> {
    let document = DocumentHandle::open_path(pdf, cli.pdfium_lib.as_deref())
        .await
        .context("Failed to inspect PDF")?;

    println!("File:   {}", pdf.display());
    println!("Pages:  {}", document.page_count());
    Ok(())
}

async fn run_keys(cli: &Cli, args: &KeysArgs) -> Result<()> {
    let config = build_config(cli, None)?;
    let explainer = Explainer::new(config).context("Failed to create client")?;

    let mut creds = LlmCredentials::new(args.provider, args.api_key.clone());
    if let Some(ref model) = args.model {
        creds = creds.expert_model(model.clone());
    }
    if let Some(ref model) = args.parsing_model {
        creds = creds.parsing_model(model.clone());
    }

    match explainer.save_credentials(&creds).await {
        Ok(message) => {
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), message);
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!("credential save failed: {}", e);
            anyhow::bail!("{}", e.user_message())
        }
    }
}

async fn run_explain(cli: &Cli, args: &ExplainArgs, show_progress: bool) -> Result<()> {
    if args.page == 0 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
    }

    let observer = TerminalObserver::new(show_progress, !args.json, cli.quiet);
    let config = build_config(cli, Some(observer.clone() as SharedObserver))?;
    let explainer = Explainer::new(config).context("Failed to create client")?;

    let mut document = DocumentHandle::open_path(&args.pdf, cli.pdfium_lib.as_deref())
        .await
        .context("Failed to open PDF")?;
    document.set_current_page(args.page);
    if document.current_page() != args.page {
        anyhow::bail!(
            "Page {} is out of range ({} has {} pages)",
            args.page,
            args.pdf.display(),
            document.page_count()
        );
    }

    if !cli.quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Page {}/{} of {}",
                document.current_page(),
                document.page_count(),
                args.pdf.display()
            ))
        );
    }

    let mut state = ConversationState::new();
    let request = ExplanationRequest::explain(args.prompt.clone()).deep_analysis(args.deep);
    explainer
        .submit(&mut state, &document, document.current_index(), request)
        .await
        .context("Request refused")?;

    for question in &args.follow_ups {
        if !state.can_follow_up() || state.error_flag() {
            break;
        }
        let request = ExplanationRequest::follow_up(question.clone()).deep_analysis(args.deep);
        explainer
            .submit(&mut state, &document, document.current_index(), request)
            .await
            .context("Follow-up refused")?;
    }

    if args.interactive && state.can_follow_up() && !state.error_flag() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("{} ", cyan("?"));
            io::stderr().flush().ok();

            let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                break;
            };
            let question = line.trim();
            if question.is_empty() {
                break;
            }

            let request = ExplanationRequest::follow_up(question).deep_analysis(args.deep);
            explainer
                .submit(&mut state, &document, document.current_index(), request)
                .await
                .context("Follow-up refused")?;
            if state.error_flag() {
                break;
            }
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&state).context("Failed to serialise conversation")?;
        println!("{json}");
    }

    if state.error_flag() {
        anyhow::bail!("{}", state.last_status_message());
    }
    Ok(())
}
