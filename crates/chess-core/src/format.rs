//! Turns a coach's markdown-ish reply into display blocks:
//! headings, numbered items, bullets and paragraphs with bold spans.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"));
static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.)]\s+(.+)$").expect("valid numbered regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•]\s+(.+)$").expect("valid bullet regex"));
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Span {
    Text(String),
    Bold(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    NumberedItem { number: u32, spans: Vec<Span> },
    Bullet { spans: Vec<Span> },
    Paragraph { spans: Vec<Span> },
}

pub fn format_coaching_text(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    let flush = |paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>| {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph { spans: parse_spans(&paragraph.join(" ")) });
            paragraph.clear();
        }
    };

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            flush(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some(cap) = HEADING_RE.captures(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading {
                level: cap[1].len() as u8,
                spans: parse_spans(cap[2].trim()),
            });
        } else if let Some(cap) = NUMBERED_RE.captures(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::NumberedItem {
                number: cap[1].parse().unwrap_or(0),
                spans: parse_spans(&cap[2]),
            });
        } else if let Some(cap) = BULLET_RE.captures(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Bullet { spans: parse_spans(&cap[1]) });
        } else {
            paragraph.push(line);
        }
    }
    flush(&mut paragraph, &mut blocks);

    blocks
}

/// Split `**bold**` runs out of a line. Unmatched markers stay literal.
pub fn parse_spans(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for cap in BOLD_RE.captures_iter(line) {
        let whole = cap.get(0).expect("group 0 always present");
        if whole.start() > last {
            spans.push(Span::Text(line[last..whole.start()].to_string()));
        }
        spans.push(Span::Bold(cap[1].to_string()));
        last = whole.end();
    }
    if last < line.len() {
        spans.push(Span::Text(line[last..].to_string()));
    }

    spans
}

fn plain(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|s| match s {
            Span::Text(t) => t.clone(),
            Span::Bold(t) => t.to_uppercase(),
        })
        .collect()
}

/// Terminal rendering: headings underlined, bold shown upper-case.
pub fn render_plain(blocks: &[Block]) -> String {
    let mut out: Vec<String> = Vec::new();
    for block in blocks {
        match block {
            Block::Heading { spans, .. } => {
                let title = plain(spans);
                let rule = "-".repeat(title.chars().count());
                out.push(format!("{title}\n{rule}"));
            }
            Block::NumberedItem { number, spans } => out.push(format!("  {number}. {}", plain(spans))),
            Block::Bullet { spans } => out.push(format!("  • {}", plain(spans))),
            Block::Paragraph { spans } => out.push(plain(spans)),
        }
    }
    out.join("\n")
}
