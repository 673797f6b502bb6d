//! Formatter markup drawn as styled terminal lines.
//!
//! Only the tags the formatter emits are understood. Unknown tags are dropped
//! and their text kept.

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::format::Markup;

use super::{COLOR_ACCENT, COLOR_CODE, COLOR_PANEL_SELECTED_BG, COLOR_QUOTE, COLOR_TEXT_PRIMARY};

const QUOTE_PREFIX: &str = "│ ";

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>|([^<]+)|<"#).expect("valid markup token regex")
});
static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="([^"]*)""#).expect("valid href regex"));

#[derive(Debug, Clone)]
struct Open {
    tag: String,
    style: Style,
    href: Option<String>,
}

#[derive(Debug, Default)]
struct Logical {
    quoted: bool,
    segments: Vec<(String, Style)>,
}

impl Logical {
    fn is_empty(&self) -> bool {
        self.segments.iter().all(|(text, _)| text.is_empty())
    }
}

struct Builder {
    base: Style,
    reveal_spoilers: bool,
    stack: Vec<Open>,
    lines: Vec<Logical>,
    current: Logical,
}

impl Builder {
    fn style(&self) -> Style {
        self.stack
            .iter()
            .fold(self.base, |style, open| style.patch(open.style))
    }

    fn quoted(&self) -> bool {
        self.stack.iter().any(|open| open.tag == "blockquote")
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let style = self.style();
        self.current.quoted |= self.quoted();
        self.current.segments.push((text.to_string(), style));
    }

    fn break_line(&mut self) {
        let quoted = self.quoted();
        let done = std::mem::take(&mut self.current);
        self.lines.push(done);
        self.current.quoted = quoted;
    }

    fn break_if_open(&mut self) {
        if !self.current.is_empty() {
            self.break_line();
        }
    }

    fn open(&mut self, tag: &str, attrs: &str) {
        let style = match tag {
            "strong" | "b" => Style::default().add_modifier(Modifier::BOLD),
            "em" | "i" => Style::default().add_modifier(Modifier::ITALIC),
            "del" => Style::default().add_modifier(Modifier::CROSSED_OUT),
            "code" | "pre" => Style::default().fg(COLOR_CODE),
            "blockquote" => Style::default()
                .fg(COLOR_QUOTE)
                .add_modifier(Modifier::ITALIC),
            "a" => Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::UNDERLINED),
            "span" if !self.reveal_spoilers && attrs.contains("spoiler") => Style::default()
                .fg(COLOR_PANEL_SELECTED_BG)
                .bg(COLOR_PANEL_SELECTED_BG),
            "h1" | "h2" => Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            "h3" | "h4" | "h5" | "h6" => Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
            _ => Style::default(),
        };
        if is_block(tag) {
            self.break_if_open();
        }
        let href = HREF_RE
            .captures(attrs)
            .map(|caps| decode_html_entities(&caps[1]).into_owned());
        self.stack.push(Open {
            tag: tag.to_string(),
            style,
            href,
        });
        if tag == "sup" {
            self.push_text("^");
        }
        if is_block(tag) {
            self.current.quoted |= self.quoted();
        }
    }

    fn close(&mut self, tag: &str) {
        let Some(position) = self.stack.iter().rposition(|open| open.tag == tag) else {
            return;
        };
        let open = self.stack.remove(position);
        if let Some(href) = open.href {
            let label_matches = self
                .current
                .segments
                .last()
                .is_some_and(|(text, _)| text.trim() == href);
            if !label_matches && !href.is_empty() {
                let style = self.style().add_modifier(Modifier::DIM);
                self.current.segments.push((format!(" ({href})"), style));
            }
        }
        if is_block(tag) {
            self.break_line();
        }
    }

    fn finish(mut self) -> Vec<Logical> {
        if !self.current.is_empty() || self.lines.is_empty() {
            let done = std::mem::take(&mut self.current);
            self.lines.push(done);
        }
        self.lines
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "div" | "pre"
    )
}

/// Renders markup into lines no wider than `width`, each starting with
/// `prefix`.
pub fn lines(
    markup: &Markup,
    width: usize,
    prefix: &str,
    base: Style,
    reveal_spoilers: bool,
) -> Vec<Line<'static>> {
    let mut builder = Builder {
        base,
        reveal_spoilers,
        stack: Vec::new(),
        lines: Vec::new(),
        current: Logical::default(),
    };

    for caps in TOKEN_RE.captures_iter(markup.as_unsanitized_html()) {
        if let Some(text) = caps.get(4) {
            builder.push_text(&decode_html_entities(text.as_str()));
            continue;
        }
        let Some(tag) = caps.get(2) else {
            builder.push_text("<");
            continue;
        };
        let tag = tag.as_str().to_ascii_lowercase();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        match (tag.as_str(), closing) {
            ("br", _) => builder.break_line(),
            (_, false) => builder.open(&tag, attrs),
            (_, true) => builder.close(&tag),
        }
    }

    builder
        .finish()
        .into_iter()
        .flat_map(|logical| {
            let prefix = if logical.quoted {
                format!("{prefix}{QUOTE_PREFIX}")
            } else {
                prefix.to_string()
            };
            wrap_segments(&logical.segments, width, &prefix, base)
        })
        .collect()
}

/// Greedy word wrap over styled segments. Words longer than a whole line are
/// split by character.
fn wrap_segments(
    segments: &[(String, Style)],
    width: usize,
    prefix: &str,
    base: Style,
) -> Vec<Line<'static>> {
    let prefix_width = UnicodeWidthStr::width(prefix);
    let avail = width.saturating_sub(prefix_width).max(1);

    let mut out = Vec::new();
    let mut spans = vec![Span::styled(prefix.to_string(), base)];
    let mut used = 0usize;

    for (text, style) in segments {
        for token in tokens(text) {
            let blank = token.trim().is_empty();
            let token_width = UnicodeWidthStr::width(token);
            if blank && used == 0 {
                continue;
            }
            if used + token_width > avail && used > 0 {
                out.push(finish_line(&mut spans, prefix, base));
                used = 0;
                if blank {
                    continue;
                }
            }
            if token_width > avail {
                let mut chunk = String::new();
                let mut chunk_width = 0usize;
                for ch in token.chars() {
                    let ch_width = ch.width().unwrap_or(0);
                    if used + chunk_width + ch_width > avail && (chunk_width > 0 || used > 0) {
                        spans.push(Span::styled(std::mem::take(&mut chunk), *style));
                        out.push(finish_line(&mut spans, prefix, base));
                        used = 0;
                        chunk_width = 0;
                    }
                    chunk.push(ch);
                    chunk_width += ch_width;
                }
                if !chunk.is_empty() {
                    spans.push(Span::styled(chunk, *style));
                    used += chunk_width;
                }
                continue;
            }
            spans.push(Span::styled(token.to_string(), *style));
            used += token_width;
        }
    }
    out.push(finish_line(&mut spans, prefix, base));
    out
}

/// Takes the spans built so far as a line, minus trailing blanks, and starts
/// the next line with `prefix`.
fn finish_line(spans: &mut Vec<Span<'static>>, prefix: &str, base: Style) -> Line<'static> {
    let mut done = std::mem::replace(spans, vec![Span::styled(prefix.to_string(), base)]);
    while done.len() > 1
        && done
            .last()
            .is_some_and(|span| span.content.trim().is_empty())
    {
        done.pop();
    }
    Line::from(done)
}

/// Splits into alternating runs of whitespace and non-whitespace.
fn tokens(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (index, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        match in_space {
            Some(previous) if previous != space => {
                out.push(&text[start..index]);
                start = index;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    fn render(raw: &str, width: usize) -> Vec<Line<'static>> {
        lines(&format(raw).markup, width, "", Style::default(), false)
    }

    #[test]
    fn breaks_and_blocks_split_lines() {
        let out = plain(&render("# Title\nfirst\nsecond", 80));
        assert_eq!(out, vec!["Title", "first", "second"]);
    }

    #[test]
    fn emphasis_is_styled() {
        let out = render("some **bold** text", 80);
        let bold = out[0]
            .spans
            .iter()
            .find(|span| span.content == "bold")
            .expect("bold span");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn quotes_get_prefix_and_entities_decode() {
        let out = plain(&render("> a &amp; b\n- item", 80));
        assert_eq!(out, vec!["│ a & b", "• item"]);
    }

    #[test]
    fn anchors_show_target() {
        let out = plain(&render("[docs](https://example.com)", 80));
        assert_eq!(out, vec!["docs (https://example.com)"]);
    }

    #[test]
    fn long_text_wraps_with_prefix() {
        let out = lines(
            &format("one two three four").markup,
            10,
            "  ",
            Style::default(),
            false,
        );
        assert_eq!(plain(&out), vec!["  one two", "  three", "  four"]);
    }

    #[test]
    fn spoilers_are_concealed_until_revealed() {
        let markup = format(">!secret!<").markup;
        let hidden = lines(&markup, 80, "", Style::default(), false);
        let span = hidden[0]
            .spans
            .iter()
            .find(|span| span.content == "secret")
            .expect("spoiler span");
        assert_eq!(span.style.fg, span.style.bg);

        let shown = lines(&markup, 80, "", Style::default(), true);
        let span = shown[0]
            .spans
            .iter()
            .find(|span| span.content == "secret")
            .expect("spoiler span");
        assert_eq!(span.style.bg, None);
    }

    #[test]
    fn tokens_alternate_runs() {
        assert_eq!(tokens("ab  cd "), vec!["ab", "  ", "cd", " "]);
        assert!(tokens("").is_empty());
    }
}
