//! HTML escaping for untrusted text.

/// Escape the five HTML-significant characters.
///
/// Not idempotent: `&amp;` escapes again to `&amp;amp;`, so every raw
/// segment must go through here exactly once.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Check whether `s` can be used verbatim inside a `language-*` class.
pub fn is_bare_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_all_five_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_other_characters_pass_through() {
        assert_eq!(escape_html("plain text, ünïcödé *stars*"), "plain text, ünïcödé *stars*");
        assert_eq!(escape_html(""), "");
    }

    #[test]
    fn test_not_idempotent() {
        let once = escape_html("&");
        assert_eq!(once, "&amp;");
        assert_eq!(escape_html(&once), "&amp;amp;");
    }

    #[test]
    fn test_no_raw_specials_survive() {
        let nasty = "<<>>&&\"\"''<script>alert('x')</script>";
        let escaped = escape_html(nasty);
        for ch in ['<', '>', '"', '\''] {
            assert!(!escaped.contains(ch), "raw {:?} in {}", ch, escaped);
        }
        // Every ampersand must start one of our entities
        for (idx, _) in escaped.match_indices('&') {
            let rest = &escaped[idx..];
            assert!(
                ["&amp;", "&lt;", "&gt;", "&quot;", "&#039;"]
                    .iter()
                    .any(|e| rest.starts_with(e)),
                "stray ampersand at {} in {}",
                idx,
                escaped
            );
        }
    }

    #[test]
    fn test_bare_identifier() {
        assert!(is_bare_identifier("rust"));
        assert!(is_bare_identifier("c++"));
        assert!(is_bare_identifier("objective-c"));
        assert!(is_bare_identifier("c#"));
        assert!(!is_bare_identifier(""));
        assert!(!is_bare_identifier("js\" onclick=\"x"));
        assert!(!is_bare_identifier("two words"));
    }
}
