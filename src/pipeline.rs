use std::time::{Duration, Instant};

use crate::chunk::chunk_diff;
use crate::config::ReviewConfig;
use crate::llm::{ApiFailure, ChatMessage, LlmRequest, ModelProviderAdapter};
use crate::prompts::ReviewMode;
use crate::rate;
use crate::tokens::TokenEstimator;

/// Final state of one review run. Failures are folded into the report text;
/// the run itself never errors.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: String,
    pub chunks_total: usize,
    pub chunks_reviewed: usize,
    pub time_limit_reached: bool,
    pub any_call_failed: bool,
}

struct PipelineState {
    started: Instant,
    parts: Vec<String>,
    chunks_reviewed: usize,
    time_limit_reached: bool,
    any_call_failed: bool,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            parts: Vec::new(),
            chunks_reviewed: 0,
            time_limit_reached: false,
            any_call_failed: false,
        }
    }

    fn truncate(&mut self, cfg: &ReviewConfig) {
        self.parts.push(truncation_notice(cfg.max_duration_secs));
        self.time_limit_reached = true;
        self.any_call_failed = true;
    }
}

fn truncation_notice(max_duration_secs: u64) -> String {
    format!(
        "\n\n--- REVIEW TRUNCATED DUE TO TIME LIMIT ({} minutes) ---",
        max_duration_secs / 60
    )
}

fn chunk_preamble(chunk_no: usize, total: usize) -> String {
    if total > 1 {
        format!(
            "This is chunk {} of {} of a larger code diff. Please focus your review \
             on this specific chunk, considering it in the context of a larger set \
             of changes.\n\n",
            chunk_no, total
        )
    } else {
        String::new()
    }
}

/// Drive every chunk of `diff` through the API sequentially, pacing calls
/// against the TPM ceiling and stopping at the wall-clock deadline. The
/// deadline is cooperative: it is checked before each chunk and before each
/// sleep, never by aborting an in-flight call.
pub async fn run_review(
    cfg: &ReviewConfig,
    mode: ReviewMode,
    adapter: &dyn ModelProviderAdapter,
    diff: &str,
) -> PipelineOutcome {
    let mut state = PipelineState::new();
    let max_duration = Duration::from_secs(cfg.max_duration_secs);

    let estimator = TokenEstimator::for_model(&cfg.model);
    let chunks = chunk_diff(diff, cfg.max_chunk_tokens, cfg.overhead_tokens, &estimator);
    let total = chunks.len();
    println!("Diff split into {} chunks.", total);

    for (idx, chunk_text) in chunks.iter().enumerate() {
        let chunk_no = idx + 1;
        let elapsed = state.started.elapsed();

        if elapsed > max_duration {
            eprintln!(
                "Warning: Run time limit ({}s) reached. Stopping further chunk processing.",
                cfg.max_duration_secs
            );
            state.truncate(cfg);
            break;
        }

        println!(
            "Processing chunk {} of {} (Elapsed time: {:.0}s)...",
            chunk_no,
            total,
            elapsed.as_secs_f64()
        );

        let messages = vec![
            ChatMessage { role: "system".into(), content: mode.template().to_string() },
            ChatMessage {
                role: "user".into(),
                content: format!("{}{}", chunk_preamble(chunk_no, total), chunk_text),
            },
        ];
        let req = LlmRequest { model: cfg.model.clone(), messages };

        println!(
            "Attempting API call for chunk {} (Model: {}, Mode: {})...",
            chunk_no,
            cfg.model,
            mode.as_str()
        );
        match adapter.send(req).await {
            Ok(res) => {
                let tokens_used = match res.usage.as_ref().and_then(|u| u.total_tokens) {
                    Some(total_tokens) => {
                        println!("Tokens used for chunk {}: {}", chunk_no, total_tokens);
                        u64::from(total_tokens)
                    }
                    None => cfg.tokens_per_call_estimate,
                };

                state
                    .parts
                    .push(format!("--- Review for Chunk {}/{} ---\n{}", chunk_no, total, res.content));
                state.chunks_reviewed += 1;
                println!("Chunk {} processed successfully.", chunk_no);

                // Throttle before the next chunk.
                if chunk_no < total {
                    let delay = rate::pacing_delay(tokens_used, cfg.tpm_limit);
                    let elapsed_now = state.started.elapsed();
                    if elapsed_now + Duration::from_secs_f64(delay) > max_duration {
                        eprintln!(
                            "Warning: Calculated delay ({:.2}s) for chunk {} would exceed total time limit. Not sleeping and stopping further processing.",
                            delay, chunk_no
                        );
                        state.truncate(cfg);
                        break;
                    }
                    println!("Delaying for {:.2} seconds to respect TPM limit...", delay);
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }
            Err(failure) => {
                let entry = format!(
                    "❌ {} on chunk {} (mode: {}): {}",
                    failure.label(),
                    chunk_no,
                    mode.as_str(),
                    failure.detail()
                );
                eprintln!("{}", entry);
                state.parts.push(entry);
                state.any_call_failed = true;

                match failure {
                    ApiFailure::RateLimited(_) => {
                        // Wait the limit out, then move on. The failed chunk
                        // is not retried; its error entry stays in the report.
                        let elapsed_now = state.started.elapsed();
                        if elapsed_now >= max_duration {
                            state.truncate(cfg);
                            break;
                        }
                        let remaining = (max_duration - elapsed_now).as_secs_f64();
                        let wait = rate::rate_limit_wait(remaining);
                        println!("Waiting for {:.0} seconds due to rate limit...", wait);
                        tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                    }
                    ApiFailure::Connection(_)
                    | ApiFailure::Auth(_)
                    | ApiFailure::BadRequest(_)
                    | ApiFailure::Api(_)
                    | ApiFailure::Unexpected(_) => break,
                }
            }
        }
    }

    let mut report = state.parts.join("\n\n");
    if report.trim().is_empty() {
        report = "⚠️ Review generation process completed, but no content was generated or an error occurred."
            .to_string();
    }
    if state.time_limit_reached && !report.contains("REVIEW TRUNCATED DUE TO TIME LIMIT") {
        report.push_str(&truncation_notice(cfg.max_duration_secs));
    }

    PipelineOutcome {
        report,
        chunks_total: total,
        chunks_reviewed: state.chunks_reviewed,
        time_limit_reached: state.time_limit_reached,
        any_call_failed: state.any_call_failed,
    }
}
