//! Reply markup
//!
//! Replies support exactly two constructs: `**bold**` spans and line breaks.
//! Everything else in the reply is escaped, so the output is safe to hand
//! to an HTML renderer.

use regex::Regex;
use std::sync::OnceLock;

fn bold_span() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    BOLD.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern is valid"))
}

fn any_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Turn raw reply text into display markup.
pub fn format_reply(raw: &str) -> String {
    let escaped = escape_html(raw);
    let bolded = bold_span().replace_all(&escaped, "<b>$1</b>");
    bolded.replace('\n', "<br />")
}

/// Inverse of [`format_reply`] for plain-text sinks (clipboard, terminal).
pub fn plain_text(markup: &str) -> String {
    let with_newlines = markup.replace("<br />", "\n");
    any_tag()
        .replace_all(&with_newlines, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
