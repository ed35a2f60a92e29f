pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_MAX_TOKENS: i32 = 4096;
pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com";

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    OpenAi(OpenAiProviderConfig),
    Ollama(OllamaProviderConfig),
    Google(GoogleProviderConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: i32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}
