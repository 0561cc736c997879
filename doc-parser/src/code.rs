//! Code example extraction and language detection.

use std::collections::HashSet;
use std::sync::OnceLock;

use crc32fast::Hasher as Crc32;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::{collapse_whitespace, CodeExample};

const CODE_SELECTORS: &[&str] = &[
    "pre code",
    "pre",
    ".highlight code",
    ".code-block code",
    "code[class*=\"language-\"]",
];

const DEDUPE_PREFIX_CHARS: usize = 100;

const FALLBACK_LANGUAGE: &str = "text";

/// DOM-independent view of a code block used for language detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeContext {
    /// Class tokens on the `code` element (or the `pre` when there is none).
    pub code_classes: Vec<String>,
    /// Class tokens on the enclosing `pre`.
    pub pre_classes: Vec<String>,
    /// `data-language` / `data-lang` value, code element first.
    pub data_language: Option<String>,
    /// Exact code text.
    pub text: String,
}

impl CodeContext {
    /// Builds the context for a `pre` or `code` element.
    pub fn from_element(element: ElementRef<'_>) -> Self {
        let code = if element.value().name() == "pre" {
            let inner = Selector::parse("code").expect("code selector");
            element.select(&inner).next().unwrap_or(element)
        } else {
            element
        };
        let pre = enclosing_pre(code);

        Self {
            code_classes: class_tokens(code),
            pre_classes: pre.map(class_tokens).unwrap_or_default(),
            data_language: data_language(code).or_else(|| pre.and_then(data_language)),
            text: code.text().collect(),
        }
    }
}

fn class_tokens(element: ElementRef<'_>) -> Vec<String> {
    element.value().classes().map(str::to_string).collect()
}

fn data_language(element: ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr("data-language")
        .or_else(|| element.value().attr("data-lang"))
        .map(str::to_string)
}

type LanguageSource = fn(&CodeContext) -> Option<String>;

/// Detection chain, highest priority first.
const LANGUAGE_SOURCES: &[LanguageSource] = &[
    code_class_language,
    pre_class_language,
    data_attribute_language,
    content_language,
];

fn code_class_language(ctx: &CodeContext) -> Option<String> {
    language_from_classes(&ctx.code_classes)
}

fn pre_class_language(ctx: &CodeContext) -> Option<String> {
    language_from_classes(&ctx.pre_classes)
}

fn data_attribute_language(ctx: &CodeContext) -> Option<String> {
    ctx.data_language
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(normalize_language)
}

fn content_language(ctx: &CodeContext) -> Option<String> {
    infer_language(&ctx.text).map(str::to_string)
}

/// Resolves the language of a code block, falling back to `"text"`.
pub fn detect_language(ctx: &CodeContext) -> String {
    LANGUAGE_SOURCES
        .iter()
        .find_map(|source| source(ctx))
        .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
}

/// Collects code examples below `root`, deduplicated across overlapping selectors.
///
/// Only block code counts: a match must be a `pre` or sit inside one.
pub fn extract_code_examples(root: ElementRef<'_>) -> Vec<CodeExample> {
    let mut seen = HashSet::new();
    let mut examples = Vec::new();

    for raw in CODE_SELECTORS {
        let selector = Selector::parse(raw).expect("code selector");
        for element in root.select(&selector) {
            let Some(block) = enclosing_pre(element) else {
                continue;
            };
            let ctx = CodeContext::from_element(element);
            if ctx.text.trim().is_empty() {
                continue;
            }
            let language = detect_language(&ctx);
            if !seen.insert(dedupe_key(&language, &ctx.text)) {
                continue;
            }
            let description = describe(block);
            examples.push(CodeExample {
                language,
                code: ctx.text,
                description,
            });
        }
    }

    examples
}

fn dedupe_key(language: &str, code: &str) -> u32 {
    let prefix: String = code.chars().take(DEDUPE_PREFIX_CHARS).collect();
    let mut hasher = Crc32::new();
    hasher.update(language.as_bytes());
    hasher.update(&[0]);
    hasher.update(prefix.as_bytes());
    hasher.finalize()
}

fn enclosing_pre(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if element.value().name() == "pre" {
        return Some(element);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "pre")
}

fn describe(block: ElementRef<'_>) -> Option<String> {
    match previous_element(block) {
        Some(prev) => label_text(prev),
        None => block
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(previous_element)
            .and_then(label_text),
    }
}

fn previous_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.prev_siblings().find_map(ElementRef::wrap)
}

fn label_text(element: ElementRef<'_>) -> Option<String> {
    match element.value().name() {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let text = collapse_whitespace(&element.text().collect::<String>());
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn language_from_classes(classes: &[String]) -> Option<String> {
    classes.iter().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(normalize_language)
    })
}

fn normalize_language(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "js" | "jsx" | "node" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" | "python3" => "python",
        "sh" | "shell" | "zsh" | "console" | "shellscript" => "bash",
        "yml" => "yaml",
        "rb" => "ruby",
        "rs" => "rust",
        "golang" => "go",
        "md" | "mdx" => "markdown",
        other => other,
    };
    canonical.to_string()
}

struct Sniffers {
    shell: Regex,
    typescript: Regex,
    javascript: Regex,
    python: Regex,
    sql: Regex,
    html: Regex,
    css: Regex,
    yaml_line: Regex,
}

fn sniffers() -> &'static Sniffers {
    static SNIFFERS: OnceLock<Sniffers> = OnceLock::new();
    SNIFFERS.get_or_init(|| Sniffers {
        shell: Regex::new(
            r"(?m)^\s*(\$\s+\S|(sudo\s+)?(curl|npm|npx|yarn|pnpm|pip|pip3|brew|git|export|mkdir|docker|apt|apt-get|mintlify|cargo)\s)",
        )
        .expect("shell regex"),
        typescript: Regex::new(
            r"\binterface\s+\w+\s*\{|\btype\s+\w+\s*=|:\s*(string|number|boolean|void)\b|\bas\s+const\b",
        )
        .expect("typescript regex"),
        javascript: Regex::new(
            r#"\b(const|let|var)\s+\w+\s*=|\bfunction\s*\w*\s*\(|=>|console\.log|require\(|\bimport\s+.+\s+from\s+['"]|\bexport\s+(default|const|function)\b|\bawait\s+fetch\("#,
        )
        .expect("javascript regex"),
        python: Regex::new(
            r"(?m)^\s*def\s+\w+\s*\(|^\s*class\s+\w+(\(.*\))?:\s*$|^\s*from\s+[\w.]+\s+import\s+\w+|^\s*import\s+[\w.]+\s*$|\bprint\(|\bself\.",
        )
        .expect("python regex"),
        sql: Regex::new(
            r"(?i)^\s*(select\s+.+\s+from|insert\s+into|update\s+\w+\s+set|delete\s+from|create\s+(table|index|view))\b",
        )
        .expect("sql regex"),
        html: Regex::new(r"(?i)^\s*(<!doctype\s+html|<html|<head|<body|<div|<span|<p>|<a\s|<script|<img\s)")
            .expect("html regex"),
        css: Regex::new(r"(?s)^\s*[.#@]?[\w\-\s,:>\[\]=()]+\{[^{}]*:[^{}]*;[^{}]*\}")
            .expect("css regex"),
        yaml_line: Regex::new(r"^\s*(-\s+)?[\w.\-]+:(\s|$)").expect("yaml regex"),
    })
}

/// Guesses a language from code text alone.
///
/// Checks run from most to least distinctive: JSON, shell, TypeScript,
/// JavaScript, Python, SQL, HTML, CSS, YAML.
pub fn infer_language(code: &str) -> Option<&'static str> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return None;
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Some("json");
    }

    let s = sniffers();
    if s.shell.is_match(trimmed) {
        return Some("bash");
    }
    if s.typescript.is_match(trimmed) {
        return Some("typescript");
    }
    if s.javascript.is_match(trimmed) {
        return Some("javascript");
    }
    if s.python.is_match(trimmed) {
        return Some("python");
    }
    if s.sql.is_match(trimmed) {
        return Some("sql");
    }
    if s.html.is_match(trimmed) {
        return Some("html");
    }
    if s.css.is_match(trimmed) {
        return Some("css");
    }
    if looks_like_yaml(trimmed, &s.yaml_line) {
        return Some("yaml");
    }
    None
}

fn looks_like_yaml(code: &str, line_re: &Regex) -> bool {
    if code.contains('{') || code.contains(';') {
        return false;
    }
    let mut lines = code
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .peekable();
    lines.peek().is_some() && lines.all(|line| line_re.is_match(line) || line.starts_with(' '))
}
