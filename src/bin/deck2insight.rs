//! deck2insight CLI: analyze a startup document from the command line.
//!
//! ```text
//! deck2insight pitch.pdf --doc-type "Pitch Deck"
//! deck2insight plan.pdf --json --output analysis.json
//! deck2insight deck.pdf --history ~/.deck2insight/history.jsonl
//! ```
//!
//! The document type is auto-detected from the extracted text when
//! `--doc-type` is not given. `--history` appends one JSON line of run
//! metadata per analysis — the CLI's stand-in for the persistence layer a
//! hosting application would provide.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use deck2insight::pipeline::extract;
use deck2insight::{
    analyze_pages, AnalysisConfig, AnalysisOutput, DocumentType, RunRecord, RunRecorder,
};

#[derive(Parser, Debug)]
#[command(
    name = "deck2insight",
    version,
    about = "Analyze startup documents (pitch decks, business plans) with retrieval-augmented LLM calls",
    after_help = "Set GEMINI_API_KEY (or GOOGLE_API_KEY) for the default Gemini provider."
)]
struct Cli {
    /// Path to the PDF document to analyze.
    input: PathBuf,

    /// Document type; auto-detected from the text when omitted.
    /// One of: "Business Analysis", "Pitch Deck", "Business Plan",
    /// "Market Research", "Financial Model".
    #[arg(short = 't', long)]
    doc_type: Option<String>,

    /// Emit the full result (sections + stats) as JSON instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Write output to a file instead of stdout (atomic write).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append one JSON line of run metadata per analysis to this file.
    #[arg(long)]
    history: Option<PathBuf>,

    /// Generation model identifier.
    #[arg(long, env = "DECK2INSIGHT_MODEL")]
    model: Option<String>,

    /// Chunks retrieved per analysis section.
    #[arg(long, default_value_t = 3)]
    top_k: usize,

    /// Maximum chunk length in characters.
    #[arg(long, default_value_t = 1500)]
    chunk_chars: usize,

    /// Overlap between adjacent chunks in characters.
    #[arg(long, default_value_t = 150)]
    overlap_chars: usize,

    /// Prompt budget in estimated tokens.
    #[arg(long, default_value_t = 6000)]
    prompt_tokens: usize,

    /// Per-model-call timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Retry attempts for transient model failures.
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Verbose logging (-v: info, -vv: debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Append-only JSONL history sink — the CLI's persistence collaborator.
struct JsonlRecorder {
    path: PathBuf,
}

impl RunRecorder for JsonlRecorder {
    fn record(&self, record: &RunRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("history record not serialisable: {e}");
                return;
            }
        };
        let appended = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = appended {
            tracing::warn!("could not append history to '{}': {e}", self.path.display());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("reading '{}'", cli.input.display()))?;

    let spinner = make_spinner("extracting text");
    let pages = extract::extract_pages(&bytes).await?;
    spinner.finish_and_clear();

    let doc_type = match cli.doc_type.as_deref() {
        Some(s) => DocumentType::from_str(s).map_err(anyhow::Error::msg)?,
        None => {
            let joined: String = pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let detected = DocumentType::detect(&joined);
            eprintln!("detected document type: {detected}");
            detected
        }
    };

    let mut builder = AnalysisConfig::builder()
        .top_k(cli.top_k)
        .max_chunk_chars(cli.chunk_chars)
        .overlap_chars(cli.overlap_chars)
        .max_prompt_tokens(cli.prompt_tokens)
        .api_timeout_secs(cli.timeout)
        .max_retries(cli.retries);
    if let Some(model) = cli.model.clone() {
        builder = builder.model(model);
    }
    if let Some(history) = cli.history.clone() {
        builder = builder.recorder(Arc::new(JsonlRecorder { path: history }));
    }
    let config = builder.build()?;

    let spinner = make_spinner(&format!("analyzing as {doc_type}"));
    let output = analyze_pages(pages, doc_type, &config).await?;
    spinner.finish_and_clear();

    let rendered = render(&output, cli.json)?;
    match cli.output {
        Some(ref path) => {
            write_atomic(path, &rendered)?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }

    eprintln!(
        "{} sections · {} pages · {}/{} chunks in prompt · {} retries · {}ms",
        output.result.len(),
        output.stats.page_count,
        output.stats.prompt_chunks,
        output.stats.chunk_count,
        output.stats.retries,
        output.stats.total_duration_ms
    );

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "deck2insight=info",
        _ => "deck2insight=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template is valid"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner
}

fn render(output: &AnalysisOutput, json: bool) -> Result<String> {
    if json {
        Ok(format!("{}\n", serde_json::to_string_pretty(output)?))
    } else {
        Ok(output.result.to_markdown())
    }
}

/// Atomic write: temp file in the target directory, then rename.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating '{}'", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).with_context(|| format!("writing '{}'", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming to '{}'", path.display()))?;
    Ok(())
}
