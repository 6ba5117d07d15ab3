use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Config files tried in order when no explicit path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "./chatmark.toml",
    "~/.config/chatmark/config.toml",
    "~/.chatmark.toml",
];

pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Provider configuration with named configs per provider type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Default provider in format "<provider_type>.<config_name>"
    pub default_provider: String,

    /// Named Gemini provider configs
    #[serde(default)]
    pub gemini: HashMap<String, GeminiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Literal key; takes precedence over `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            model: default_model(),
            max_tokens: Some(8192),
            temperature: Some(0.7),
        }
    }
}

impl GeminiConfig {
    /// The configured key, or the value of `api_key_env` from the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Like [`resolve_api_key`](Self::resolve_api_key) with a custom
    /// environment lookup.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }
        match lookup(&self.api_key_env) {
            Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => anyhow::bail!(
                "No API key configured. Set `api_key` in the config file or the {} environment variable.",
                self.api_key_env
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Seed an empty conversation with greeting messages
    #[serde(default = "default_greeting")]
    pub greeting: bool,
    #[serde(default = "default_greeting_messages")]
    pub greeting_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_greeting() -> bool {
    true
}

fn default_greeting_messages() -> Vec<String> {
    [
        "Hello! How can I assist you today?",
        "Feel free to ask me anything about our services.",
        "I can help you with account issues, product information, and more.",
        "Just type your question below and I will do my best to assist you!",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            greeting_messages: default_greeting_messages(),
            system_prompt: None,
        }
    }
}

impl ChatConfig {
    /// Greeting messages to seed, empty when greetings are off.
    pub fn active_greetings(&self) -> &[String] {
        if self.greeting {
            &self.greeting_messages
        } else {
            &[]
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut gemini_configs = HashMap::new();
        gemini_configs.insert("default".to_string(), GeminiConfig::default());

        Self {
            providers: ProvidersConfig {
                default_provider: "gemini.default".to_string(),
                gemini: gemini_configs,
            },
            chat: ChatConfig::default(),
        }
    }
}

/// Error message for the flat provider format
const OLD_CONFIG_FORMAT_ERROR: &str = r#"Your configuration file puts provider settings directly under [providers.gemini].

Provider settings live in named sections:

```toml
[providers]
default_provider = "gemini.default"  # Format: "<provider_type>.<config_name>"

[providers.gemini.default]
api_key_env = "GEMINI_API_KEY"
model = "gemini-2.5-flash"
```"#;

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        if let Some(path) = config_path {
            let expanded = shellexpand::tilde(path);
            if !Path::new(expanded.as_ref()).exists() {
                anyhow::bail!("Config file not found: {}", path);
            }
            return Self::load_file(Path::new(expanded.as_ref()));
        }

        let found = DEFAULT_CONFIG_PATHS.iter().find_map(|path| {
            let expanded_path = shellexpand::tilde(path);
            let candidate = PathBuf::from(expanded_path.as_ref());
            candidate.exists().then_some(candidate)
        });

        match found {
            Some(path) => Self::load_file(&path),
            None => {
                // No config anywhere: write a default one for the user to edit
                let default_config = Self::default();
                let config_file = Self::default_config_file();
                if let Some(dir) = config_file.parent() {
                    std::fs::create_dir_all(dir).ok();
                }
                match default_config.save(&config_file) {
                    Ok(()) => info!(
                        "Created default configuration at: {}",
                        config_file.display()
                    ),
                    Err(e) => warn!("Could not save default config: {}", e),
                }
                Ok(default_config)
            }
        }
    }

    /// `~/.config/chatmark/config.toml`, or `./config.toml` without a home dir
    pub fn default_config_file() -> PathBuf {
        dirs::home_dir()
            .map(|mut path| {
                path.push(".config");
                path.push("chatmark");
                path
            })
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    fn load_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate a config document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        if Self::is_old_format(content) {
            anyhow::bail!("{}", OLD_CONFIG_FORMAT_ERROR);
        }

        let config: Config = toml::from_str(content)?;
        config.validate_provider_reference(&config.providers.default_provider)?;
        Ok(config)
    }

    /// True when `[providers.gemini]` carries settings itself instead of named sections
    fn is_old_format(content: &str) -> bool {
        let Ok(value) = content.parse::<toml::Value>() else {
            return false;
        };
        value
            .get("providers")
            .and_then(|p| p.get("gemini"))
            .and_then(|g| g.as_table())
            .is_some_and(|gemini| gemini.values().any(|entry| !entry.is_table()))
    }

    /// Validate a provider reference (format: "<provider_type>.<config_name>")
    pub fn validate_provider_reference(&self, reference: &str) -> Result<()> {
        let (provider_type, config_name) = Self::parse_provider_reference(reference)?;

        match provider_type.as_str() {
            "gemini" => {
                if !self.providers.gemini.contains_key(&config_name) {
                    let mut available: Vec<_> = self.providers.gemini.keys().collect();
                    available.sort();
                    anyhow::bail!(
                        "Provider config 'gemini.{}' not found. Available: {:?}",
                        config_name,
                        available
                    );
                }
            }
            _ => anyhow::bail!(
                "Unknown provider type '{}'. Valid types: gemini",
                provider_type
            ),
        }

        Ok(())
    }

    /// Parse a provider reference into (provider_type, config_name)
    pub fn parse_provider_reference(reference: &str) -> Result<(String, String)> {
        match reference.split_once('.') {
            Some((provider_type, config_name))
                if !provider_type.is_empty()
                    && !config_name.is_empty()
                    && !config_name.contains('.') =>
            {
                Ok((provider_type.to_string(), config_name.to_string()))
            }
            _ => anyhow::bail!(
                "Invalid provider reference '{}'. Expected format: '<provider_type>.<config_name>'",
                reference
            ),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load_with_overrides(
        config_path: Option<&str>,
        provider_override: Option<String>,
        model_override: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.apply_overrides(provider_override, model_override)?;
        Ok(config)
    }

    /// Switch the default provider and/or its model.
    pub fn apply_overrides(
        &mut self,
        provider_override: Option<String>,
        model_override: Option<String>,
    ) -> Result<()> {
        if let Some(provider) = provider_override {
            self.validate_provider_reference(&provider)?;
            self.providers.default_provider = provider;
        }

        if let Some(model) = model_override {
            let (_, config_name) =
                Self::parse_provider_reference(&self.providers.default_provider)?;
            match self.providers.gemini.get_mut(&config_name) {
                Some(gemini_config) => gemini_config.model = model,
                None => anyhow::bail!("Provider config 'gemini.{}' not found.", config_name),
            }
        }

        Ok(())
    }

    /// Get Gemini config by name
    pub fn get_gemini_config(&self, name: &str) -> Option<&GeminiConfig> {
        self.providers.gemini.get(name)
    }

    /// The config name and settings of the default provider
    pub fn default_gemini_config(&self) -> Result<(String, &GeminiConfig)> {
        let (_, config_name) = Self::parse_provider_reference(&self.providers.default_provider)?;
        let gemini = self
            .providers
            .gemini
            .get(&config_name)
            .ok_or_else(|| anyhow::anyhow!("Gemini config '{}' not found", config_name))?;
        Ok((config_name, gemini))
    }
}

#[cfg(test)]
mod tests;
