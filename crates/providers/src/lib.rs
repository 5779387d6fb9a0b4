//! LLM Provider implementations for taskweave.
//!
//! All providers implement the `taskweave_core::Provider` trait.
//! [`build_from_config`] creates the configured provider.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;

use taskweave_config::ProviderConfig;
use taskweave_core::error::ProviderError;
use taskweave_core::provider::Provider;

/// Build the provider described by `config`.
///
/// Local providers (ollama, vllm, llama.cpp) work without an API key;
/// everything else needs one.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.name));

    let api_key = match (&config.api_key, is_local(&config.name)) {
        (Some(key), _) => key.clone(),
        (None, true) => config.name.clone(),
        (None, false) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}'; set provider.api_key or TASKWEAVE_API_KEY",
                config.name
            )));
        }
    };

    tracing::debug!(provider = %config.name, url = %base_url, model = %config.model, "Building provider");

    Ok(Arc::new(
        OpenAiCompatProvider::new(&config.name, base_url, api_key, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens),
    ))
}

fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
