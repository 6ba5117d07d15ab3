#[cfg(test)]
mod tests {
    use crate::{Config, GeminiConfig, DEFAULT_API_KEY_ENV, DEFAULT_MODEL};
    use std::fs;
    use tempfile::TempDir;

    fn write_config(temp_dir: &TempDir, content: &str) -> String {
        let config_path = temp_dir.path().join("test_config.toml");
        fs::write(&config_path, content).unwrap();
        config_path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_load_named_gemini_configs() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
[providers]
default_provider = "gemini.fast"

[providers.gemini.fast]
api_key = "test-key"
model = "gemini-2.0-flash"
max_tokens = 1024

[providers.gemini.smart]
api_key_env = "MY_GEMINI_KEY"
model = "gemini-2.5-pro"
temperature = 0.2
"#,
        );

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.providers.default_provider, "gemini.fast");
        let fast = config.get_gemini_config("fast").unwrap();
        assert_eq!(fast.api_key.as_deref(), Some("test-key"));
        assert_eq!(fast.max_tokens, Some(1024));
        assert_eq!(fast.api_key_env, DEFAULT_API_KEY_ENV);

        let smart = config.get_gemini_config("smart").unwrap();
        assert_eq!(smart.api_key_env, "MY_GEMINI_KEY");
        assert_eq!(smart.temperature, Some(0.2));
        assert!(smart.api_key.is_none());

        let (name, active) = config.default_gemini_config().unwrap();
        assert_eq!(name, "fast");
        assert_eq!(active.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_chat_section_defaults() {
        let config = Config::from_toml_str(
            r#"
[providers]
default_provider = "gemini.default"

[providers.gemini.default]
"#,
        )
        .unwrap();

        assert!(config.chat.greeting);
        assert_eq!(config.chat.greeting_messages.len(), 4);
        assert_eq!(
            config.chat.greeting_messages[0],
            "Hello! How can I assist you today?"
        );
        assert!(config.chat.system_prompt.is_none());
        assert_eq!(config.get_gemini_config("default").unwrap().model, DEFAULT_MODEL);
    }

    #[test]
    fn test_chat_section_overrides() {
        let config = Config::from_toml_str(
            r#"
[providers]
default_provider = "gemini.default"

[providers.gemini.default]

[chat]
greeting = false
greeting_messages = ["Hi"]
system_prompt = "Answer in markdown."
"#,
        )
        .unwrap();

        assert!(config.chat.active_greetings().is_empty());
        assert_eq!(config.chat.greeting_messages, vec!["Hi".to_string()]);
        assert_eq!(
            config.chat.system_prompt.as_deref(),
            Some("Answer in markdown.")
        );
    }

    #[test]
    fn test_invalid_provider_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
[providers]
default_provider = "gemini.missing"

[providers.gemini.default]
api_key = "k"
"#,
        );

        let err = Config::load(Some(&path)).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("gemini.missing"), "got: {}", message);
        assert!(message.contains("default"), "got: {}", message);
    }

    #[test]
    fn test_unknown_provider_type() {
        let err = Config::from_toml_str(
            r#"
[providers]
default_provider = "openai.default"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown provider type 'openai'"));
    }

    #[test]
    fn test_old_format_detected() {
        let err = Config::from_toml_str(
            r#"
[providers]
default_provider = "gemini.default"

[providers.gemini]
api_key = "flat"
model = "gemini-2.5-flash"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("named sections"));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        let err = Config::load(Some(missing.to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_parse_provider_reference() {
        assert_eq!(
            Config::parse_provider_reference("gemini.default").unwrap(),
            ("gemini".to_string(), "default".to_string())
        );
        assert!(Config::parse_provider_reference("gemini").is_err());
        assert!(Config::parse_provider_reference("gemini.a.b").is_err());
        assert!(Config::parse_provider_reference(".default").is_err());
        assert!(Config::parse_provider_reference("gemini.").is_err());
    }

    #[test]
    fn test_load_with_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
[providers]
default_provider = "gemini.default"

[providers.gemini.default]
model = "gemini-2.5-flash"

[providers.gemini.alt]
model = "gemini-2.0-flash"
"#,
        );

        let config = Config::load_with_overrides(
            Some(&path),
            Some("gemini.alt".to_string()),
            Some("gemini-2.5-pro".to_string()),
        )
        .unwrap();

        assert_eq!(config.providers.default_provider, "gemini.alt");
        assert_eq!(config.get_gemini_config("alt").unwrap().model, "gemini-2.5-pro");
        assert_eq!(
            config.get_gemini_config("default").unwrap().model,
            "gemini-2.5-flash"
        );

        let bad = Config::load_with_overrides(Some(&path), Some("gemini.nope".to_string()), None);
        assert!(bad.is_err());
    }

    #[test]
    fn test_save_and_reload_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("saved.toml");

        Config::default().save(&path).unwrap();
        let reloaded = Config::load(Some(path.to_str().unwrap())).unwrap();

        assert_eq!(reloaded.providers.default_provider, "gemini.default");
        let gemini = reloaded.get_gemini_config("default").unwrap();
        assert_eq!(gemini.api_key_env, DEFAULT_API_KEY_ENV);
        assert!(gemini.api_key.is_none());
        assert!(reloaded.chat.greeting);
    }

    #[test]
    fn test_resolve_api_key_prefers_literal_key() {
        let config = GeminiConfig {
            api_key: Some(" literal ".to_string()),
            ..GeminiConfig::default()
        };
        let key = config
            .resolve_api_key_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(key, "literal");
    }

    #[test]
    fn test_resolve_api_key_from_environment() {
        let config = GeminiConfig {
            api_key: Some(String::new()),
            api_key_env: "CUSTOM_KEY".to_string(),
            ..GeminiConfig::default()
        };
        let key = config
            .resolve_api_key_with(|name| (name == "CUSTOM_KEY").then(|| "env-key".to_string()))
            .unwrap();
        assert_eq!(key, "env-key");
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let config = GeminiConfig::default();
        let err = config.resolve_api_key_with(|_| None).unwrap_err();
        assert!(err.to_string().contains(DEFAULT_API_KEY_ENV));

        let blank = config.resolve_api_key_with(|_| Some("   ".to_string()));
        assert!(blank.is_err());
    }
}
