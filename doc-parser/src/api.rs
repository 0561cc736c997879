//! Heuristic API endpoint extraction.
//!
//! Pages are matched by markup conventions rather than a schema, so results
//! are best-effort. The [`EndpointExtractor`] trait keeps the heuristic
//! swappable without touching the rest of the parser.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::{collapse_whitespace, ApiEndpoint, ApiParameter};

/// Finds endpoint metadata inside a cleaned content root.
pub trait EndpointExtractor: Send + Sync {
    /// Returns the endpoint documented below `root`, if any.
    fn extract(&self, root: ElementRef<'_>) -> Option<ApiEndpoint>;
}

/// Class-name and regex driven extractor tuned for Mintlify API pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEndpointExtractor;

const INDICATOR_SELECTOR: &str =
    "[class*=\"endpoint\"], [id*=\"endpoint\"], [class*=\"api-method\"], [class*=\"method-pill\"]";

const RESPONSE_ANCESTOR_DEPTH: usize = 3;

fn method_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b").expect("method regex")
    })
}

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(https?://[^\s"'<>]+|/[A-Za-z0-9_\-./{}:]+)"#).expect("path regex")
    })
}

fn code_span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\s+(https?://|/)\S*\s*$")
            .expect("code span regex")
    })
}

impl EndpointExtractor for HeuristicEndpointExtractor {
    fn extract(&self, root: ElementRef<'_>) -> Option<ApiEndpoint> {
        let (method, path) = locate_endpoint(root)?;
        Some(ApiEndpoint {
            method,
            path,
            description: first_paragraph(root).unwrap_or_default(),
            parameters: parameter_rows(root),
            response_example: response_example(root),
        })
    }
}

fn locate_endpoint(root: ElementRef<'_>) -> Option<(String, String)> {
    let indicators = Selector::parse(INDICATOR_SELECTOR).expect("indicator selector");
    let from_indicator = root
        .select(&indicators)
        .find_map(|element| method_and_path(&element.text().collect::<String>()));
    if from_indicator.is_some() {
        return from_indicator;
    }

    let code = Selector::parse("code").expect("code selector");
    root.select(&code)
        .filter(|element| !inside_pre(element))
        .map(|element| element.text().collect::<String>())
        .filter(|text| code_span_regex().is_match(text))
        .find_map(|text| method_and_path(&text))
}

fn method_and_path(text: &str) -> Option<(String, String)> {
    let method = method_regex().captures(text)?.get(1)?.as_str().to_string();
    let path = path_regex().find(text)?.as_str().to_string();
    Some((method, path))
}

fn first_paragraph(root: ElementRef<'_>) -> Option<String> {
    let p = Selector::parse("p").expect("p selector");
    root.select(&p)
        .map(|node| collapse_whitespace(&node.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn parameter_rows(root: ElementRef<'_>) -> Vec<ApiParameter> {
    let table = Selector::parse("table").expect("table selector");
    let row = Selector::parse("tr").expect("tr selector");
    let header_cell = Selector::parse("th").expect("th selector");
    let cell = Selector::parse("td").expect("td selector");

    let Some(table) = root.select(&table).next() else {
        return Vec::new();
    };

    table
        .select(&row)
        .filter(|tr| tr.select(&header_cell).next().is_none())
        .filter_map(|tr| {
            let cells: Vec<String> = tr
                .select(&cell)
                .map(|td| collapse_whitespace(&td.text().collect::<String>()))
                .collect();
            if cells.len() < 2 || cells[0].is_empty() {
                return None;
            }
            let required = cells
                .get(2)
                .map(|flag| {
                    let flag = flag.to_ascii_lowercase();
                    flag.contains("yes") || flag == "required"
                })
                .unwrap_or(false);
            Some(ApiParameter {
                name: cells[0].clone(),
                param_type: cells[1].clone(),
                required,
                description: cells.get(3).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

fn response_example(root: ElementRef<'_>) -> Option<String> {
    let pre = Selector::parse("pre").expect("pre selector");
    let code = Selector::parse("code").expect("code selector");
    root.select(&pre)
        .find(|block| mentions_response(*block))
        .map(|block| {
            block
                .select(&code)
                .next()
                .unwrap_or(block)
                .text()
                .collect::<String>()
        })
}

fn mentions_response(block: ElementRef<'_>) -> bool {
    let mut context = String::new();
    let previous = block.prev_siblings().find_map(ElementRef::wrap);
    let wrapper_previous = block
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|parent| parent.prev_siblings().find_map(ElementRef::wrap));
    for label in [previous, wrapper_previous].into_iter().flatten() {
        context.extend(label.text());
        context.push(' ');
    }
    for ancestor in block
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(RESPONSE_ANCESTOR_DEPTH)
    {
        let value = ancestor.value();
        context.extend(value.classes());
        context.push(' ');
        if let Some(id) = value.id() {
            context.push_str(id);
        }
        if let Some(title) = value.attr("data-title") {
            context.push(' ');
            context.push_str(title);
        }
    }
    context.to_ascii_lowercase().contains("response")
}

fn inside_pre(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "pre")
}
