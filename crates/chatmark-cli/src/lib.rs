//! chatmark CLI - terminal front end for the streaming Markdown chat client.

mod cli_args;
mod console_view;
mod interactive;
mod simple_output;
mod task_execution;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use chatmark_config::Config;
use chatmark_core::{write_transcript, ChatSession, ChatView};
use chatmark_providers::{GeminiProvider, LLMProvider, ProviderRegistry};
use chatmark_render::MarkdownRenderer;

pub use cli_args::Cli;
pub use console_view::ConsoleView;
use clap::Parser;

use interactive::run_interactive;
use simple_output::SimpleOutput;
use task_execution::send_with_interrupt;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    if let Some(source) = &cli.render {
        return run_render_mode(source);
    }

    let config = Config::load_with_overrides(
        cli.config.as_deref(),
        cli.provider.clone(),
        cli.model.clone(),
    )?;

    let output = SimpleOutput::new();
    let greet = cli.prompt.is_none() && !cli.no_greeting;
    let session = start_session(&config, ConsoleView::new(), greet);

    if let Some(prompt) = &cli.prompt {
        send_with_interrupt(&session, prompt, &output).await;
    } else {
        run_interactive(&session).await?;
    }

    if let Some(path) = &cli.html_out {
        save_transcript(&session, path, &output)?;
    }

    Ok(())
}

// --- Helper functions ---

fn initialize_logging(cli: &Cli) {
    use tracing_subscriber::filter::Directive;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in [
        "chatmark",
        "chatmark_cli",
        "chatmark_core",
        "chatmark_config",
        "chatmark_providers",
        "chatmark_render",
    ] {
        match format!("{}={}", target, level).parse::<Directive>() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Create the session, seed greetings, and record a provider setup failure
/// as an error message after them.
fn start_session<V: ChatView>(config: &Config, view: V, greet: bool) -> ChatSession<V> {
    let (provider, setup_error) = match build_provider(config) {
        Ok(provider) => {
            info!("Using provider {} ({})", provider.name(), provider.model());
            (Some(provider), None)
        }
        Err(e) => {
            warn!("Provider setup failed: {:#}", e);
            (None, Some(format!("Error: Could not initialize AI. {}", e)))
        }
    };

    let session = ChatSession::new(provider, Arc::new(MarkdownRenderer), view)
        .with_system_prompt(config.chat.system_prompt.clone());
    if greet {
        session.seed_greetings(config.chat.active_greetings());
    }
    if let Some(text) = setup_error {
        session.push_error(&text);
    }
    session
}

/// Build the configured default provider.
fn build_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let (config_name, gemini) = config.default_gemini_config()?;
    let api_key = gemini.resolve_api_key()?;

    let provider = GeminiProvider::new_with_name(
        format!("gemini.{}", config_name),
        api_key,
        Some(gemini.model.clone()),
        gemini.max_tokens,
        gemini.temperature,
    )?;

    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    registry.set_default(&config.providers.default_provider)?;
    registry.get(None)
}

/// Render a Markdown file (or stdin for `-`) to HTML on stdout.
fn run_render_mode(source: &str) -> Result<()> {
    let markdown = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read Markdown from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read Markdown file {}", source))?
    };

    debug!("Rendering {} bytes from {}", markdown.len(), source);
    SimpleOutput::new().print(&chatmark_render::render(&markdown));
    Ok(())
}

fn save_transcript<V: ChatView>(
    session: &ChatSession<V>,
    path: &Path,
    output: &SimpleOutput,
) -> Result<()> {
    let messages = session.messages();
    write_transcript(path, &messages)?;
    output.print(&format!("📝 Transcript saved to {}", path.display()));
    Ok(())
}
