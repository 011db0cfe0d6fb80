use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod chunk;
mod config;
mod io;
mod llm;
mod pipeline;
mod prompts;
mod rate;
mod tokens;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gpt-review",
    version,
    about = "Chunked GPT review of a unified diff with TPM pacing",
    long_about = None
)]
struct Cli {
    /// Path to unified diff/patch file (falls back to DIFF_FILE)
    #[arg(long = "diff-file")]
    diff_file: Option<PathBuf>,

    /// Report output file
    #[arg(short = 'o', long = "output", default_value = "review.txt")]
    output: PathBuf,

    /// Model identifier (falls back to OPENAI_MODEL)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Provider to use (openai, mock)
    #[arg(long)]
    provider: Option<String>,

    /// Active profile name
    #[arg(short = 'p', long = "profile")]
    profile: Option<String>,

    /// PR labels as a JSON array of {"name": ...} objects (falls back to PR_LABELS_JSON)
    #[arg(long = "labels-json")]
    labels_json: Option<String>,

    /// Tokens-per-minute ceiling (falls back to TPM_LIMIT)
    #[arg(long = "tpm-limit")]
    tpm_limit: Option<u64>,

    /// Max input tokens per chunk (falls back to MAX_CHUNK_INPUT_TOKENS)
    #[arg(long = "max-chunk-tokens")]
    max_chunk_tokens: Option<usize>,

    /// Token reserve per chunk for prompt overhead (falls back to CHUNK_OVERHEAD_TOKENS)
    #[arg(long = "overhead-tokens")]
    overhead_tokens: Option<usize>,

    /// Tokens-per-call estimate used when the API omits usage (falls back to TOKENS_PER_CALL_ESTIMATE)
    #[arg(long = "tokens-per-call")]
    tokens_per_call: Option<u64>,

    /// Overall run duration ceiling in seconds (falls back to MAX_SCRIPT_DURATION_SECONDS)
    #[arg(long = "max-duration-secs")]
    max_duration_secs: Option<u64>,

    /// Timeout (seconds) for network requests
    #[arg(long = "timeout")]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let overrides = config::Overrides {
        profile: cli.profile.clone(),
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        diff_file: cli.diff_file.clone(),
        labels_json: cli.labels_json.clone(),
        tpm_limit: cli.tpm_limit,
        max_chunk_tokens: cli.max_chunk_tokens,
        overhead_tokens: cli.overhead_tokens,
        tokens_per_call_estimate: cli.tokens_per_call,
        max_duration_secs: cli.max_duration_secs,
        request_timeout_secs: cli.timeout_secs,
    };

    let cfg = match config::resolve_review_config(&overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            let message = format!("❌ Configuration Error: {}", e);
            return fatal(&cli.output, &message).await;
        }
    };

    let mode = prompts::select_mode(cfg.labels_json.as_deref());
    println!("Determined review mode: {}", mode.as_str());

    let Some(diff_path) = cfg.diff_file.clone() else {
        let message = format!(
            "❌ GPT Review failed (mode: {}): DIFF_FILE environment variable not set.",
            mode.as_str()
        );
        return fatal(&cli.output, &message).await;
    };

    let diff = match io::read_diff_file_async(&diff_path).await {
        Ok(d) => d,
        Err(e) => {
            let message = format!(
                "❌ GPT Review failed (mode: {}): Error reading diff file '{}' - {:#}",
                mode.as_str(),
                diff_path.display(),
                e
            );
            return fatal(&cli.output, &message).await;
        }
    };

    if diff.trim().is_empty() {
        eprintln!("Warning: Diff content is empty or whitespace only.");
        let notice = "❓ Review skipped: Diff content is empty or whitespace only.";
        return match io::write_report_async(&cli.output, notice).await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("FATAL: Error writing {} file: {:#}", cli.output.display(), e);
                1
            }
        };
    }

    let timeout = Duration::from_secs(cfg.request_timeout_secs);
    let adapter = match llm::adapter_for(&cfg.provider, &cfg.api_key, timeout) {
        Ok(a) => a,
        Err(e) => {
            let message = format!("❌ Configuration Error: {}", e);
            return fatal(&cli.output, &message).await;
        }
    };

    let outcome = pipeline::run_review(&cfg, mode, adapter.as_ref(), &diff).await;

    if let Err(e) = io::write_report_async(&cli.output, &outcome.report).await {
        eprintln!("FATAL: Error writing {} file: {:#}", cli.output.display(), e);
        return 1;
    }

    if outcome.time_limit_reached {
        println!(
            "Review process truncated due to time limit; partial results written to {}.",
            cli.output.display()
        );
    } else if !outcome.any_call_failed && outcome.chunks_reviewed > 0 {
        println!(
            "Overall review generated successfully and written to {}.",
            cli.output.display()
        );
    } else {
        println!(
            "Review process completed with errors or no content; details written to {}.",
            cli.output.display()
        );
    }
    0
}

/// Fatal configuration or input error: report it on stderr, leave the same
/// message in the output artifact for downstream consumers, exit non-zero.
async fn fatal(output: &Path, message: &str) -> i32 {
    eprintln!("{}", message);
    if let Err(e) = io::write_report_async(output, message).await {
        eprintln!("FATAL: Error writing {} file: {:#}", output.display(), e);
    }
    1
}
