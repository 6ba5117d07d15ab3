//! Interactive mode for the chatmark CLI.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::error;

use chatmark_core::{ChatSession, ChatView};

use crate::simple_output::SimpleOutput;
use crate::task_execution::send_with_interrupt;

/// Build the interactive prompt string.
///
/// - Multiline mode: `"... > "`
/// - Otherwise: `"you> "`
pub fn build_prompt(in_multiline: bool) -> &'static str {
    if in_multiline {
        "... > "
    } else {
        "you> "
    }
}

fn is_exit_command(input: &str) -> bool {
    input == "exit" || input == "quit"
}

/// Read prompts until `exit`, `quit` or EOF. A line ending in `\` continues
/// on the next line.
pub async fn run_interactive<V: ChatView>(session: &ChatSession<V>) -> Result<()> {
    let output = SimpleOutput::new();
    let mut rl = DefaultEditor::new()?;

    let history_file = dirs::home_dir().map(|mut path| {
        path.push(".chatmark_history");
        path
    });

    if let Some(ref history_path) = history_file {
        let _ = rl.load_history(history_path);
    }

    let mut multiline_buffer = String::new();
    let mut in_multiline = false;

    loop {
        let readline = rl.readline(build_prompt(in_multiline));
        match readline {
            Ok(line) => {
                let trimmed = line.trim_end();

                if let Some(without_backslash) = trimmed.strip_suffix('\\') {
                    multiline_buffer.push_str(without_backslash);
                    multiline_buffer.push('\n');
                    in_multiline = true;
                    continue;
                }

                let input = if in_multiline {
                    multiline_buffer.push_str(&line);
                    in_multiline = false;
                    std::mem::take(&mut multiline_buffer).trim().to_string()
                } else {
                    line.trim().to_string()
                };

                if input.is_empty() {
                    continue;
                }
                if is_exit_command(&input) {
                    break;
                }

                rl.add_history_entry(&input)?;
                send_with_interrupt(session, &input, &output).await;
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    output.print("Multi-line input cancelled");
                    multiline_buffer.clear();
                    in_multiline = false;
                } else {
                    output.print("CTRL-C");
                }
                continue;
            }
            Err(ReadlineError::Eof) => {
                output.print("CTRL-D");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref history_path) = history_file {
        let _ = rl.save_history(history_path);
    }

    output.print("👋 Goodbye!");
    Ok(())
}
