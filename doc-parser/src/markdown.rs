//! Markdown rendering for cleaned content trees.
//!
//! The walk keeps two buffers: finished blocks and the inline run currently
//! being collected. Any block-level element flushes the inline run as a
//! paragraph first, so loose text between blocks is never lost.

use scraper::{node::Node, ElementRef, Selector};

use crate::code::{detect_language, CodeContext};
use crate::collapse_whitespace;

const SKIPPED_TAGS: &[&str] = &[
    "button", "svg", "input", "select", "textarea", "form", "script", "style", "noscript",
    "template",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "pre", "blockquote", "table", "dl",
    "hr", "div", "section", "article", "main", "header", "footer", "figure", "details",
    "summary", "li", "body",
];

const LIST_INDENT: &str = "  ";

/// Renders the subtree below `root` as normalized markdown.
pub fn render_markdown(root: ElementRef<'_>) -> String {
    let mut renderer = Renderer::default();
    renderer.blocks(root);
    normalize_markdown(&renderer.finish())
}

#[derive(Default)]
struct Renderer {
    blocks: Vec<String>,
    inline: String,
}

impl Renderer {
    fn finish(mut self) -> String {
        self.flush();
        self.blocks.join("\n\n")
    }

    fn push_block(&mut self, block: String) {
        if !block.trim().is_empty() {
            self.blocks.push(block);
        }
    }

    fn flush(&mut self) {
        let paragraph = finish_inline(&std::mem::take(&mut self.inline));
        self.push_block(paragraph);
    }

    fn blocks(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => push_text(&mut self.inline, text),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = child.value().name();
                    if SKIPPED_TAGS.contains(&name) {
                        continue;
                    }
                    if BLOCK_TAGS.contains(&name) {
                        self.flush();
                        self.block(child);
                        self.flush();
                    } else {
                        inline(child, &mut self.inline);
                    }
                }
                _ => {}
            }
        }
    }

    fn block(&mut self, element: ElementRef<'_>) {
        match element.value().name() {
            name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = collapse_whitespace(&element.text().collect::<String>());
                if !text.is_empty() {
                    self.push_block(format!("{} {}", "#".repeat(level), text));
                }
            }
            "p" => {
                let mut buf = String::new();
                inline_children(element, &mut buf);
                self.push_block(finish_inline(&buf));
            }
            "ul" | "ol" => self.push_block(render_list(element, 0).join("\n")),
            "pre" => self.push_block(render_fence(element)),
            "blockquote" => {
                let mut inner = Renderer::default();
                inner.blocks(element);
                let quoted = inner
                    .finish()
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                self.push_block(quoted);
            }
            "table" => {
                if let Some(table) = render_table(element) {
                    self.push_block(table);
                }
            }
            "dl" => self.push_block(render_definitions(element)),
            "hr" => self.push_block("---".to_string()),
            _ => self.blocks(element),
        }
    }
}

fn push_text(buf: &mut String, text: &str) {
    let spaced = text.chars().map(|ch| if ch.is_whitespace() { ' ' } else { ch });
    buf.extend(spaced);
}

/// Collapses an inline run, keeping explicit `<br>` breaks as newlines.
fn finish_inline(raw: &str) -> String {
    raw.split('\n')
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_children(element: ElementRef<'_>, buf: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_text(buf, text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    inline(child, buf);
                }
            }
            _ => {}
        }
    }
}

fn inline(element: ElementRef<'_>, buf: &mut String) {
    let value = element.value();
    match value.name() {
        name if SKIPPED_TAGS.contains(&name) => {}
        "br" => buf.push('\n'),
        "a" => {
            let mut text = String::new();
            inline_children(element, &mut text);
            let label = text.trim();
            let href = value.attr("href").map(str::trim).filter(|h| !h.is_empty());
            match href {
                Some(href) if !label.is_empty() => {
                    pad_start(buf, &text);
                    buf.push_str(&format!("[{label}]({href})"));
                    pad_end(buf, &text);
                }
                _ => buf.push_str(&text),
            }
        }
        "img" => {
            if let Some(src) = value.attr("src").filter(|src| !src.trim().is_empty()) {
                let alt = value.attr("alt").unwrap_or_default().trim();
                buf.push_str(&format!("![{alt}]({})", src.trim()));
            }
        }
        "strong" | "b" => emphasize(element, buf, "**"),
        "em" | "i" => emphasize(element, buf, "*"),
        "code" => {
            let code = collapse_whitespace(&element.text().collect::<String>());
            if code.is_empty() {
                return;
            }
            if code.contains('`') {
                buf.push_str(&format!("`` {code} ``"));
            } else {
                buf.push_str(&format!("`{code}`"));
            }
        }
        _ => inline_children(element, buf),
    }
}

fn emphasize(element: ElementRef<'_>, buf: &mut String, marker: &str) {
    let mut inner = String::new();
    inline_children(element, &mut inner);
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        buf.push_str(&inner);
        return;
    }
    pad_start(buf, &inner);
    buf.push_str(marker);
    buf.push_str(trimmed);
    buf.push_str(marker);
    pad_end(buf, &inner);
}

fn pad_start(buf: &mut String, inner: &str) {
    if inner.starts_with(char::is_whitespace) {
        buf.push(' ');
    }
}

fn pad_end(buf: &mut String, inner: &str) {
    if inner.ends_with(char::is_whitespace) {
        buf.push(' ');
    }
}

/// Block elements rendered whole under a list item instead of being flattened inline.
const ITEM_BLOCK_TAGS: &[&str] = &["pre", "table", "blockquote", "dl"];

fn render_list(list: ElementRef<'_>, depth: usize) -> Vec<String> {
    let ordered = list.value().name() == "ol";
    let start = list
        .value()
        .attr("start")
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let indent = LIST_INDENT.repeat(depth);

    let mut lines = Vec::new();
    let items = list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li");
    for (index, item) in items.enumerate() {
        let marker = if ordered {
            format!("{}.", start + index)
        } else {
            "-".to_string()
        };
        let mut body = ItemBody::new(format!("{indent}{}", " ".repeat(marker.len() + 1)));

        for child in item.children() {
            match child.value() {
                Node::Text(raw) => push_text(body.text(), raw),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    match child.value().name() {
                        "ul" | "ol" => {
                            body.flush();
                            body.rest.extend(render_list(child, depth + 1));
                        }
                        "p" | "div" => {
                            let text = body.text();
                            text.push(' ');
                            inline_children(child, text);
                            text.push(' ');
                        }
                        name if ITEM_BLOCK_TAGS.contains(&name) => {
                            let mut inner = Renderer::default();
                            inner.block(child);
                            body.push_block(&inner.finish());
                        }
                        name if SKIPPED_TAGS.contains(&name) => {}
                        _ => inline(child, body.text()),
                    }
                }
                _ => {}
            }
        }
        body.flush();

        let lead = finish_inline(&body.lead).replace('\n', " ");
        let first = format!("{indent}{marker} {lead}");
        lines.push(first.trim_end().to_string());
        lines.extend(body.rest);
    }
    lines
}

/// Content of one list item: the text on the marker line, then indented continuation lines.
struct ItemBody {
    continuation: String,
    lead: String,
    pending: String,
    rest: Vec<String>,
}

impl ItemBody {
    fn new(continuation: String) -> Self {
        Self {
            continuation,
            lead: String::new(),
            pending: String::new(),
            rest: Vec::new(),
        }
    }

    /// Inline text goes on the marker line until a block has been emitted.
    fn text(&mut self) -> &mut String {
        if self.rest.is_empty() {
            &mut self.lead
        } else {
            &mut self.pending
        }
    }

    fn flush(&mut self) {
        let paragraph = finish_inline(&std::mem::take(&mut self.pending)).replace('\n', " ");
        if !paragraph.is_empty() {
            let line = format!("{}{paragraph}", self.continuation);
            self.push_lines(&line);
        }
    }

    fn push_block(&mut self, block: &str) {
        self.flush();
        if block.trim().is_empty() {
            return;
        }
        let indented = block
            .lines()
            .map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("{}{line}", self.continuation)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.push_lines(&indented);
    }

    fn push_lines(&mut self, block: &str) {
        self.rest.push(String::new());
        self.rest.extend(block.lines().map(str::to_string));
    }
}

fn render_fence(pre: ElementRef<'_>) -> String {
    let ctx = CodeContext::from_element(pre);
    let language = detect_language(&ctx);
    let mut fence = format!("```{language}\n{}", ctx.text);
    if !fence.ends_with('\n') {
        fence.push('\n');
    }
    fence.push_str("```");
    fence
}

fn render_table(table: ElementRef<'_>) -> Option<String> {
    let row = Selector::parse("tr").expect("tr selector");
    let rows: Vec<Vec<String>> = table
        .select(&row)
        .map(|tr| {
            tr.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                .map(table_cell)
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max()?;
    let line = |cells: &[String]| {
        let padded = (0..width).map(|i| cells.get(i).map_or("", String::as_str));
        format!("| {} |", padded.collect::<Vec<_>>().join(" | "))
    };

    let mut lines = vec![line(&rows[0]), line(&vec!["---".to_string(); width])];
    lines.extend(rows[1..].iter().map(|cells| line(cells)));
    Some(lines.join("\n"))
}

fn table_cell(cell: ElementRef<'_>) -> String {
    let mut buf = String::new();
    inline_children(cell, &mut buf);
    finish_inline(&buf).replace('\n', " ").replace('|', "\\|")
}

fn render_definitions(list: ElementRef<'_>) -> String {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter_map(|child| {
            let mut buf = String::new();
            inline_children(child, &mut buf);
            let text = finish_inline(&buf).replace('\n', " ");
            if text.is_empty() {
                return None;
            }
            match child.value().name() {
                "dt" => Some(format!("**{text}**")),
                "dd" => Some(format!(": {text}")),
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cleans up rendered markdown without touching fenced code.
///
/// Outside fences: trailing whitespace is trimmed, interior space runs
/// collapse to one space (leading indentation is kept), and blank lines are
/// squeezed to at most one. Leading and trailing newlines are removed.
pub fn normalize_markdown(input: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;

    for line in input.lines() {
        if is_fence_line(line) {
            in_fence = !in_fence;
            lines.push(line.trim_end().to_string());
            continue;
        }
        if in_fence {
            lines.push(line.to_string());
            continue;
        }

        let line = line.trim_end();
        if line.is_empty() {
            if lines.last().map(|last| !last.is_empty()).unwrap_or(false) {
                lines.push(String::new());
            }
            continue;
        }

        let body = line.trim_start();
        let indent = &line[..line.len() - body.len()];
        lines.push(format!("{indent}{}", squeeze_spaces(body)));
    }

    lines.join("\n").trim_matches('\n').to_string()
}

/// A code fence, possibly indented under a list item or quoted with `>`.
fn is_fence_line(line: &str) -> bool {
    let mut rest = line.trim_start();
    while let Some(unquoted) = rest.strip_prefix('>') {
        rest = unquoted.trim_start();
    }
    rest.starts_with("```")
}

fn squeeze_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for ch in text.chars() {
        if ch == ' ' || ch == '\t' {
            if !previous_space {
                out.push(' ');
            }
            previous_space = true;
        } else {
            out.push(ch);
            previous_space = false;
        }
    }
    out
}
