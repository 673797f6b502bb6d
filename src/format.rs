//! Reddit body text to HTML markup.
//!
//! This is an ordered list of regex substitutions, not a markdown parser.
//! Each stage reads the previous stage's output, so the order below is part
//! of the behavior: overlapping constructs (a link inside a heading, emphasis
//! spanning a list item) can come out with odd nesting, and that is accepted.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// HTML fragment produced by [`format`].
///
/// The content comes straight from Reddit and is never sanitized. Anything that
/// injects it into a real HTML surface must go through
/// [`Markup::as_unsanitized_html`], which keeps that boundary searchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    pub fn as_unsanitized_html(&self) -> &str {
        &self.0
    }

    pub fn into_unsanitized_html(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatted {
    pub markup: Markup,
    pub extracted_image_urls: Vec<String>,
}

pub fn format(raw: &str) -> Formatted {
    let text = strip_escapes(raw);
    let text = collapse_blank_lines(&text);
    let (text, extracted_image_urls) = extract_preview_images(&text);
    let text = spoilers(&text);
    let text = blockquotes(&text);
    let text = headings(&text);
    let text = links(&text);
    let text = inline_spans(&text);
    let text = emphasis(&text);
    let text = list_items(&text);
    let text = code_blocks(&text);
    let text = line_breaks(&text);

    Formatted {
        markup: Markup(text),
        extracted_image_urls,
    }
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid formatter regex")
}

pub fn strip_escapes(text: &str) -> String {
    text.replace('\\', "")
}

pub fn collapse_blank_lines(text: &str) -> String {
    static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| regex(r"\n(?:[ \t]*\n){2,}"));
    BLANK_RUN_RE.replace_all(text, "\n\n").into_owned()
}

/// Pulls `preview.redd.it` images out of the text, either bare or wrapped in
/// link syntax. The caller renders them as separate image elements.
pub fn extract_preview_images(text: &str) -> (String, Vec<String>) {
    static PREVIEW_RE: Lazy<Regex> = Lazy::new(|| {
        regex(
            r"\[[^\]]*\]\((https?://preview\.redd\.it/[^\s)]+)\)|(https?://preview\.redd\.it/[^\s)\]]+)",
        )
    });

    let mut urls = Vec::new();
    let stripped = PREVIEW_RE
        .replace_all(text, |caps: &Captures| {
            if let Some(url) = caps.get(1).or_else(|| caps.get(2)) {
                let url = url.as_str().replace("&amp;", "&");
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
            String::new()
        })
        .into_owned();
    (stripped, urls)
}

/// `>!hidden!<` becomes a click-to-reveal span. Reddit escapes `>` and `<`
/// in bodies, so both forms are accepted.
pub fn spoilers(text: &str) -> String {
    static SPOILER_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?:>|&gt;)!(.+?)!(?:<|&lt;)"));
    SPOILER_RE
        .replace_all(
            text,
            r#"<span class="spoiler" onclick="this.classList.toggle('revealed')">$1</span>"#,
        )
        .into_owned()
}

pub fn blockquotes(text: &str) -> String {
    static QUOTE_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^(?:>|&gt;)[ \t]?(.*)$"));
    QUOTE_RE
        .replace_all(text, "<blockquote>$1</blockquote>")
        .into_owned()
}

/// Font size in `em` for a heading level; deeper levels are smaller.
pub fn heading_size(level: usize) -> &'static str {
    match level {
        1 => "2",
        2 => "1.5",
        3 => "1.25",
        4 => "1.1",
        5 => "1",
        _ => "0.9",
    }
}

pub fn headings(text: &str) -> String {
    static HEADING_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^(#{1,6})[ \t]+(.+)$"));
    HEADING_RE
        .replace_all(text, |caps: &Captures| {
            let level = caps[1].len();
            format!(
                r#"<h{level} style="font-size: {}em">{}</h{level}>"#,
                heading_size(level),
                caps[2].trim_end()
            )
        })
        .into_owned()
}

pub fn links(text: &str) -> String {
    static LINK_RE: Lazy<Regex> = Lazy::new(|| regex(r"\[([^\]]+)\]\((https?://[^\s)]+)\)"));
    LINK_RE
        .replace_all(text, r#"<a href="$2" class="link">$1</a>"#)
        .into_owned()
}

pub fn inline_spans(text: &str) -> String {
    static STRIKE_RE: Lazy<Regex> = Lazy::new(|| regex(r"~~(.*?)~~"));
    static SUPER_RE: Lazy<Regex> = Lazy::new(|| regex(r"\^(\S+)"));
    static CODE_RE: Lazy<Regex> = Lazy::new(|| regex(r"`(.*?)`"));

    let text = STRIKE_RE.replace_all(text, "<del>$1</del>");
    let text = SUPER_RE.replace_all(&text, "<sup>$1</sup>");
    CODE_RE.replace_all(&text, "<code>$1</code>").into_owned()
}

/// Triple, then double, then single delimiters. `regex` has no
/// backreferences, so `*` and `_` get separate patterns per width.
pub fn emphasis(text: &str) -> String {
    static BOLD_ITALIC_RE: Lazy<[Regex; 2]> =
        Lazy::new(|| [regex(r"\*\*\*(.+?)\*\*\*"), regex(r"___(.+?)___")]);
    static BOLD_RE: Lazy<[Regex; 2]> = Lazy::new(|| [regex(r"\*\*(.+?)\*\*"), regex(r"__(.+?)__")]);
    static ITALIC_RE: Lazy<[Regex; 2]> = Lazy::new(|| [regex(r"\*(.+?)\*"), regex(r"_(.+?)_")]);

    let mut out = text.to_string();
    for re in BOLD_ITALIC_RE.iter() {
        out = re
            .replace_all(&out, "<strong><em>$1</em></strong>")
            .into_owned();
    }
    for re in BOLD_RE.iter() {
        out = re.replace_all(&out, "<strong>$1</strong>").into_owned();
    }
    for re in ITALIC_RE.iter() {
        out = re.replace_all(&out, "<em>$1</em>").into_owned();
    }
    out
}

/// One level of indentation only.
pub fn list_items(text: &str) -> String {
    static ITEM_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^(?:(-)|(\d+)\.) (.*)$"));
    ITEM_RE
        .replace_all(text, |caps: &Captures| {
            let marker = match caps.get(2) {
                Some(number) => format!("{}.", number.as_str()),
                None => "&bull;".to_string(),
            };
            format!(
                r#"<div class="list-item" style="margin-left: 1.5em">{marker} {}</div>"#,
                &caps[3]
            )
        })
        .into_owned()
}

pub fn code_blocks(text: &str) -> String {
    static BLOCK_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?:^|\n)((?: {4}.*\n)+)"));
    static INDENT_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^ {4}"));
    BLOCK_RE
        .replace_all(text, |caps: &Captures| {
            let body = INDENT_RE.replace_all(&caps[1], "");
            format!("<pre>{}</pre>\n", body.trim_end_matches('\n'))
        })
        .into_owned()
}

/// A newline right after a block element is dropped; the element already
/// breaks the line.
pub fn line_breaks(text: &str) -> String {
    static BLOCK_END_RE: Lazy<Regex> =
        Lazy::new(|| regex(r"(</h[1-6]>|</blockquote>|</div>|</pre>)\n"));
    let text = BLOCK_END_RE.replace_all(text, "$1");
    text.replace('\n', "<br/>")
}
