use super::{
    anthropic::AnthropicProvider,
    base::Provider,
    configs::{
        AnthropicProviderConfig, GoogleProviderConfig, OllamaProviderConfig,
        OpenAiProviderConfig, ProviderConfig, ANTHROPIC_HOST, ANTHROPIC_MAX_TOKENS, GOOGLE_HOST,
        OLLAMA_HOST, OPENAI_HOST,
    },
    errors::ProviderError,
    google::GoogleProvider,
    ollama::OllamaProvider,
    openai::OpenAiProvider,
};
use crate::config::ConfigError;

pub const DEFAULT_MODEL: &str = "anthropic:claude-3-5-sonnet-latest";

/// Everything the command line can say about the model backend
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// `provider:model`, e.g. `ollama:qwen2.5:3b`
    pub model: String,
    pub system_prompt: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_url: Option<String>,
    pub google_api_key: Option<String>,
}

/// Split `provider:model` on the first colon, so model names may contain colons
pub fn parse_model_string(model: &str) -> Result<(&str, &str), ConfigError> {
    match model.split_once(':') {
        Some((provider, name)) if !provider.is_empty() && !name.is_empty() => {
            Ok((provider, name))
        }
        _ => Err(ConfigError::InvalidModel(model.to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolve settings into a concrete provider config. Missing keys and urls are
/// looked up through `env`, which is `std::env::var` outside of tests.
pub fn resolve_provider_config<E>(
    settings: &ProviderSettings,
    env: E,
) -> Result<ProviderConfig, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let (provider, model) = parse_model_string(&settings.model)?;
    let model = model.to_string();
    let system_prompt = settings.system_prompt.clone();

    match provider {
        "anthropic" => {
            let api_key = non_empty(settings.anthropic_api_key.clone())
                .or_else(|| non_empty(env("ANTHROPIC_API_KEY")))
                .ok_or(ConfigError::MissingApiKey {
                    provider: "Anthropic",
                    flag: "anthropic-api-key",
                    env: "ANTHROPIC_API_KEY",
                })?;
            Ok(ProviderConfig::Anthropic(AnthropicProviderConfig {
                host: non_empty(settings.anthropic_url.clone())
                    .unwrap_or_else(|| ANTHROPIC_HOST.to_string()),
                api_key,
                model,
                system_prompt,
                max_tokens: ANTHROPIC_MAX_TOKENS,
                temperature: None,
            }))
        }
        "openai" => {
            let api_key = non_empty(settings.openai_api_key.clone())
                .or_else(|| non_empty(env("OPENAI_API_KEY")))
                .ok_or(ConfigError::MissingApiKey {
                    provider: "OpenAI",
                    flag: "openai-api-key",
                    env: "OPENAI_API_KEY",
                })?;
            Ok(ProviderConfig::OpenAi(OpenAiProviderConfig {
                host: non_empty(settings.openai_url.clone())
                    .unwrap_or_else(|| OPENAI_HOST.to_string()),
                api_key,
                model,
                system_prompt,
                temperature: None,
                max_tokens: None,
            }))
        }
        "ollama" => {
            let host = match non_empty(env("OLLAMA_HOST")) {
                Some(host) if host.starts_with("http://") || host.starts_with("https://") => host,
                Some(host) => format!("http://{}", host),
                None => OLLAMA_HOST.to_string(),
            };
            Ok(ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                system_prompt,
            }))
        }
        "google" => {
            let api_key = non_empty(settings.google_api_key.clone())
                .or_else(|| non_empty(env("GOOGLE_API_KEY")))
                .or_else(|| non_empty(env("GEMINI_API_KEY")))
                .ok_or(ConfigError::MissingApiKey {
                    provider: "Google",
                    flag: "google-api-key",
                    env: "GOOGLE_API_KEY",
                })?;
            Ok(ProviderConfig::Google(GoogleProviderConfig {
                host: GOOGLE_HOST.to_string(),
                api_key,
                model,
                system_prompt,
            }))
        }
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>, ProviderError> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Ollama(ollama_config) => Ok(Box::new(OllamaProvider::new(ollama_config)?)),
        ProviderConfig::Google(google_config) => Ok(Box::new(GoogleProvider::new(google_config)?)),
    }
}
