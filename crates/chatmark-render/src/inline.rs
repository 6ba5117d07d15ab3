//! Span-level styling: inline code, links, bold, italic, strikethrough.
//!
//! Text is held as a list of spans. Each pass only rewrites `Raw` spans and
//! leaves emitted markup alone, so a later pass can never match across a tag
//! produced by an earlier one. Pass order is load-bearing: bold must run
//! before italic or `**x**` turns into two empty-ish italic matches.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::escape::escape_html;

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+?)`").expect("code span pattern"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+?)\]\(([^)]+?)\)").expect("link pattern"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern"));
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").expect("strike pattern"));

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Span {
    /// Unprocessed source text, escaped at the very end.
    Raw(String),
    /// Final HTML emitted by a pass.
    Markup(String),
}

/// Render one line of inline markdown to HTML.
pub fn style_inline(text: &str) -> String {
    let spans = vec![Span::Raw(text.to_string())];
    let spans = rewrite_raw(spans, &CODE_SPAN, |caps| {
        Some(vec![Span::Markup(format!("<code>{}</code>", escape_html(&caps[1])))])
    });
    let spans = rewrite_raw(spans, &LINK, |caps| {
        let (label, url) = (&caps[1], &caps[2]);
        if !is_safe_url(url) {
            return None;
        }
        Some(vec![Span::Markup(format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            escape_html(url),
            escape_html(label)
        ))])
    });
    let spans = rewrite_raw(spans, &BOLD, |caps| Some(wrap("strong", &caps[1])));
    let spans = split_italic(spans);
    let spans = rewrite_raw(spans, &STRIKE, |caps| Some(wrap("del", &caps[1])));

    spans
        .into_iter()
        .map(|span| match span {
            Span::Raw(text) => escape_html(&text),
            Span::Markup(html) => html,
        })
        .collect()
}

fn wrap(tag: &str, inner: &str) -> Vec<Span> {
    vec![
        Span::Markup(format!("<{}>", tag)),
        Span::Raw(inner.to_string()),
        Span::Markup(format!("</{}>", tag)),
    ]
}

/// Apply `replace` to every match of `re` inside raw spans.
///
/// Returning `None` from `replace` rejects the match and keeps its text raw.
fn rewrite_raw<F>(spans: Vec<Span>, re: &Regex, mut replace: F) -> Vec<Span>
where
    F: FnMut(&Captures) -> Option<Vec<Span>>,
{
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let text = match span {
            Span::Raw(text) => text,
            markup => {
                out.push(markup);
                continue;
            }
        };

        let mut last = 0;
        for caps in re.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(replacement) = replace(&caps) else { continue };
            if whole.start() > last {
                out.push(Span::Raw(text[last..whole.start()].to_string()));
            }
            out.extend(replacement);
            last = whole.end();
        }
        if last < text.len() {
            out.push(Span::Raw(text[last..].to_string()));
        }
    }
    out
}

/// Italic pass: `*x*` where neither delimiter touches another `*`.
///
/// Equivalent to `(?<!\*)\*(?!\*)(.+?)(?<!\*)\*(?!\*)`, which the regex crate
/// cannot express because it has no lookaround.
fn split_italic(spans: Vec<Span>) -> Vec<Span> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let text = match span {
            Span::Raw(text) => text,
            markup => {
                out.push(markup);
                continue;
            }
        };

        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let is_star = |i: usize| chars.get(i).is_some_and(|&(_, c)| c == '*');
        let lone_star = |i: usize| is_star(i) && !(i > 0 && is_star(i - 1)) && !is_star(i + 1);

        let mut last_byte = 0;
        let mut i = 0;
        while i < chars.len() {
            if lone_star(i) {
                if let Some(j) = (i + 2..chars.len()).find(|&j| lone_star(j)) {
                    let open = chars[i].0;
                    let close = chars[j].0;
                    if open > last_byte {
                        out.push(Span::Raw(text[last_byte..open].to_string()));
                    }
                    out.extend(wrap("em", &text[open + 1..close]));
                    last_byte = close + 1;
                    i = j + 1;
                    continue;
                }
            }
            i += 1;
        }
        if last_byte < text.len() {
            out.push(Span::Raw(text[last_byte..].to_string()));
        }
    }
    out
}

/// Reject `javascript:` and friends; relative URLs and fragments are fine.
fn is_safe_url(url: &str) -> bool {
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    match cleaned.find([':', '/', '?', '#']) {
        Some(idx) if cleaned[idx..].starts_with(':') => {
            let scheme = cleaned[..idx].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}
