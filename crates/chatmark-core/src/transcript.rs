//! Standalone HTML transcript of a conversation.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::message::ChatMessage;

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto}\
.message{margin:.5rem 0;padding:.5rem .75rem;border-radius:.5rem}\
.user-message{background:#e8f0fe;margin-left:4rem}\
.bot-message{background:#f1f3f4;margin-right:4rem}\
.error-message{background:#fce8e6;color:#a50e0e}\
pre{background:#272822;color:#f8f8f2;padding:.5rem;overflow-x:auto}\
blockquote{border-left:3px solid #ccc;margin-left:0;padding-left:.75rem}\
td{border:1px solid #ccc;padding:.25rem .5rem}";

/// One message as a `<div class="message {sender}-message">` block.
pub fn message_html(message: &ChatMessage) -> String {
    format!(
        "<div class=\"message {}-message\" id=\"{}\"><div class=\"message-content\">{}</div></div>",
        message.sender.as_str(),
        message.id,
        message.display_html()
    )
}

/// A complete HTML document for the given messages.
pub fn transcript_html(messages: &[ChatMessage]) -> String {
    let body: Vec<String> = messages.iter().map(message_html).collect();
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"generated\" content=\"{}\">\n<title>chatmark transcript</title>\n\
         <style>{}</style>\n</head>\n<body>\n<div class=\"chat-messages\">\n{}\n</div>\n</body>\n</html>\n",
        Utc::now().to_rfc3339(),
        STYLE,
        body.join("\n")
    )
}

pub fn write_transcript(path: &Path, messages: &[ChatMessage]) -> Result<()> {
    std::fs::write(path, transcript_html(messages))
        .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
    info!(
        "Wrote transcript with {} messages to {}",
        messages.len(),
        path.display()
    );
    Ok(())
}
