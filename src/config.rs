//! Configuration helpers for the OpenRouter agent client

use std::env;

/// Default API root for OpenRouter.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Environment variable overriding the API root.
pub const BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";

/// Environment variable naming the default model.
pub const MODEL_ENV: &str = "OPENROUTER_MODEL";

/// Get the API key from the environment.
///
/// Returns a configuration error when the variable is unset or blank.
pub fn get_api_key() -> crate::Result<String> {
    match env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(crate::Error::config(format!("{} is not set", API_KEY_ENV))),
    }
}

/// Get the base URL from environment variable or fallback
///
/// Priority:
/// 1. OPENROUTER_BASE_URL environment variable
/// 2. fallback parameter
/// 3. [`DEFAULT_BASE_URL`]
///
/// Trailing slashes are stripped so paths can be appended directly.
///
/// # Examples
///
/// ```rust,no_run
/// use openrouter_agent::get_base_url;
///
/// let url = get_base_url(None);
/// let url = get_base_url(Some("http://localhost:8080/api/v1"));
/// ```
pub fn get_base_url(fallback: Option<&str>) -> String {
    let url = env::var(BASE_URL_ENV)
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| fallback.unwrap_or(DEFAULT_BASE_URL).to_string());

    normalize_base_url(&url)
}

/// Get the model name from environment variable or fallback
///
/// Priority:
/// 1. OPENROUTER_MODEL environment variable (if prefer_env is true)
/// 2. fallback parameter
///
/// # Examples
///
/// ```rust,no_run
/// use openrouter_agent::get_model;
///
/// let model = get_model(Some("meta-llama/llama-3.2-1b-instruct"), true);
/// let model = get_model(Some("specific-model"), false);
/// ```
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    if prefer_env {
        if let Ok(model) = env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                return Some(model);
            }
        }
    }

    fallback.map(|s| s.to_string())
}

pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
