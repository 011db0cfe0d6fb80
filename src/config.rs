use anyhow::{Context, Result, anyhow, bail};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::{env, fs};

pub const APP_DIR_NAME: &str = "gpt-review";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_MODEL: &str = "gpt-5.1";
const DEFAULT_TPM_LIMIT: u64 = 30_000;
const DEFAULT_MAX_CHUNK_TOKENS: usize = 4_000;
const DEFAULT_OVERHEAD_TOKENS: usize = 250;
const DEFAULT_TOKENS_PER_CALL_ESTIMATE: u64 = 9_000;
const DEFAULT_MAX_DURATION_SECS: u64 = 7 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: std::collections::BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub tpm_limit: Option<u64>,
    pub max_chunk_tokens: Option<usize>,
    pub overhead_tokens: Option<usize>,
    pub tokens_per_call_estimate: Option<u64>,
    pub max_duration_secs: Option<u64>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let base = config_dir().context("unable to resolve OS config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn load_config_if_exists(path: &PathBuf) -> Result<Option<AppConfig>> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&text).context("parsing config TOML")?;
        Ok(Some(cfg))
    } else {
        Ok(None)
    }
}

/// CLI-level overrides, highest precedence. Unset fields fall through to the
/// environment, then the active profile, then built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub diff_file: Option<PathBuf>,
    pub labels_json: Option<String>,
    pub tpm_limit: Option<u64>,
    pub max_chunk_tokens: Option<usize>,
    pub overhead_tokens: Option<usize>,
    pub tokens_per_call_estimate: Option<u64>,
    pub max_duration_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// Immutable settings for one review run, resolved once at startup and passed
/// explicitly to every component.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub diff_file: Option<PathBuf>,
    pub labels_json: Option<String>,
    pub tpm_limit: u64,
    pub max_chunk_tokens: usize,
    pub overhead_tokens: usize,
    pub tokens_per_call_estimate: u64,
    pub max_duration_secs: u64,
    pub request_timeout_secs: u64,
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{} is not a valid number: {}", name, e)),
        None => Ok(None),
    }
}

pub fn resolve_review_config(ov: &Overrides) -> Result<ReviewConfig> {
    let file_cfg = load_config_if_exists(&default_config_path()?)?;
    let profile = file_cfg.as_ref().and_then(|cfg| {
        let name = ov
            .profile
            .clone()
            .or_else(|| cfg.default_profile.clone())
            .unwrap_or_else(|| "default".to_string());
        cfg.profiles.get(&name).cloned()
    });
    let profile = profile.unwrap_or_default();

    let provider = ov
        .provider
        .clone()
        .or(profile.provider)
        .unwrap_or_else(|| "openai".to_string());
    let model = ov
        .model
        .clone()
        .or_else(|| env_string("OPENAI_MODEL"))
        .or(profile.model)
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let tpm_limit = ov
        .tpm_limit
        .or(env_parse("TPM_LIMIT")?)
        .or(profile.tpm_limit)
        .unwrap_or(DEFAULT_TPM_LIMIT);
    if tpm_limit == 0 {
        bail!("TPM_LIMIT must be > 0");
    }

    let max_chunk_tokens = ov
        .max_chunk_tokens
        .or(env_parse("MAX_CHUNK_INPUT_TOKENS")?)
        .or(profile.max_chunk_tokens)
        .unwrap_or(DEFAULT_MAX_CHUNK_TOKENS);
    if max_chunk_tokens == 0 {
        bail!("MAX_CHUNK_INPUT_TOKENS must be > 0");
    }

    let overhead_tokens = ov
        .overhead_tokens
        .or(env_parse("CHUNK_OVERHEAD_TOKENS")?)
        .or(profile.overhead_tokens)
        .unwrap_or(DEFAULT_OVERHEAD_TOKENS);
    let tokens_per_call_estimate = ov
        .tokens_per_call_estimate
        .or(env_parse("TOKENS_PER_CALL_ESTIMATE")?)
        .or(profile.tokens_per_call_estimate)
        .unwrap_or(DEFAULT_TOKENS_PER_CALL_ESTIMATE);
    let max_duration_secs = ov
        .max_duration_secs
        .or(env_parse("MAX_SCRIPT_DURATION_SECONDS")?)
        .or(profile.max_duration_secs)
        .unwrap_or(DEFAULT_MAX_DURATION_SECS);
    let request_timeout_secs = ov
        .request_timeout_secs
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

    // The mock provider runs offline and needs no credential.
    let api_key = if provider.to_lowercase() == "mock" {
        String::new()
    } else {
        let raw = env::var("OPENAI_API_KEY")
            .ok()
            .or(profile.api_key)
            .ok_or_else(|| anyhow!("OPENAI_API_KEY secret not set."))?;
        let key = raw.trim();
        if key.is_empty() {
            bail!("OPENAI_API_KEY is empty after stripping whitespace.");
        }
        key.to_string()
    };

    let diff_file = ov
        .diff_file
        .clone()
        .or_else(|| env_string("DIFF_FILE").map(PathBuf::from));
    let labels_json = ov.labels_json.clone().or_else(|| env_string("PR_LABELS_JSON"));

    Ok(ReviewConfig {
        provider,
        model,
        api_key,
        diff_file,
        labels_json,
        tpm_limit,
        max_chunk_tokens,
        overhead_tokens,
        tokens_per_call_estimate,
        max_duration_secs,
        request_timeout_secs,
    })
}
