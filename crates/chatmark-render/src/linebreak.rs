//! Final pass: line breaks for plain segments only.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::Segment;

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<pre><code([^>]*)>(.*?)</code></pre>").expect("code block pattern")
});
static BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<br\s*/?>").expect("break pattern"));
static HEADING_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(</h[1-6]>)(?:<br\s*/?>)+").expect("heading break pattern"));

/// Join segments, turning newlines into `<br>` inside plain segments only.
pub fn apply_line_breaks(segments: Vec<Segment>) -> String {
    segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Plain(text) => text.replace('\n', "<br>"),
            Segment::Protected(html) | Segment::Structural(html) => html,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `<br>` markers that ended up inside code blocks or right after a
/// heading.
pub fn strip_stray_breaks(html: &str) -> String {
    let html = CODE_BLOCK.replace_all(html, |caps: &Captures| {
        format!(
            "<pre><code{}>{}</code></pre>",
            &caps[1],
            BREAK.replace_all(&caps[2], "\n")
        )
    });
    HEADING_BREAK.replace_all(&html, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_plain_segments_get_breaks() {
        let segments = vec![
            Segment::Plain("a\nb".to_string()),
            Segment::Protected("<pre><code>x\ny</code></pre>".to_string()),
            Segment::Structural("<blockquote>p\nq</blockquote>".to_string()),
        ];
        assert_eq!(
            apply_line_breaks(segments),
            "a<br>b\n<pre><code>x\ny</code></pre>\n<blockquote>p\nq</blockquote>"
        );
    }

    #[test]
    fn test_strip_breaks_inside_code() {
        assert_eq!(
            strip_stray_breaks("<pre><code class=\"language-rs\">a<br>b<br/>c</code></pre><br>x"),
            "<pre><code class=\"language-rs\">a\nb\nc</code></pre><br>x"
        );
    }

    #[test]
    fn test_strip_breaks_after_heading() {
        assert_eq!(
            strip_stray_breaks("<h2>T</h2><br><br>text<br>more"),
            "<h2>T</h2>text<br>more"
        );
    }

    #[test]
    fn test_escaped_markup_is_untouched() {
        let escaped = "&lt;/h1&gt;&lt;br&gt;";
        assert_eq!(strip_stray_breaks(escaped), escaped);
    }
}
