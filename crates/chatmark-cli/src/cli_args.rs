//! CLI argument parsing for chatmark.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(name = "chatmark")]
#[command(about = "Stream chat replies from an AI provider and render them as HTML")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the configured provider (e.g., 'gemini.default')
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Override the model for the selected provider
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Render a Markdown file ('-' for stdin) to HTML on stdout and exit
    #[arg(long, value_name = "FILE", conflicts_with = "prompt")]
    pub render: Option<String>,

    /// Write the conversation as an HTML transcript on exit
    #[arg(long, value_name = "PATH")]
    pub html_out: Option<PathBuf>,

    /// Do not seed the conversation with greeting messages
    #[arg(long)]
    pub no_greeting: bool,

    /// Prompt to send (if provided, runs in single-shot mode instead of interactive)
    pub prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["chatmark"]).unwrap();
        assert!(!cli.verbose);
        assert!(!cli.no_greeting);
        assert!(cli.prompt.is_none());
        assert!(cli.render.is_none());
        assert!(cli.html_out.is_none());
    }

    #[test]
    fn test_single_shot_with_overrides() {
        let cli = Cli::try_parse_from([
            "chatmark",
            "-v",
            "--provider",
            "gemini.fast",
            "--model",
            "gemini-2.5-pro",
            "--html-out",
            "chat.html",
            "What is Rust?",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.provider.as_deref(), Some("gemini.fast"));
        assert_eq!(cli.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(cli.html_out, Some(PathBuf::from("chat.html")));
        assert_eq!(cli.prompt.as_deref(), Some("What is Rust?"));
    }

    #[test]
    fn test_render_accepts_stdin_marker() {
        let cli = Cli::try_parse_from(["chatmark", "--render", "-"]).unwrap();
        assert_eq!(cli.render.as_deref(), Some("-"));
    }

    #[test]
    fn test_render_conflicts_with_prompt() {
        assert!(Cli::try_parse_from(["chatmark", "--render", "notes.md", "hello"]).is_err());
    }
}
