//! Writes crawl results to disk and reads them back for indexing.
//!
//! Layout under the output directory:
//!
//! ```text
//! INDEX.md
//! COMPLETE.md
//! metadata.json
//! <section>/<slug>.md
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::document::{sanitize_component, slug_for, Document, INDEX_SLUG};
use crate::manifest::{PageEntry, SiteManifest};

/// Combined index of every page, grouped by section.
pub const INDEX_FILE: &str = "INDEX.md";
/// Every page concatenated.
pub const COMPLETE_FILE: &str = "COMPLETE.md";
/// Machine-readable manifest.
pub const METADATA_FILE: &str = "metadata.json";

/// Failure writing or reading an output directory.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Filesystem access failed.
    #[error("output io error at {path}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// `metadata.json` could not be encoded or decoded.
    #[error("invalid metadata at {path}: {source}")]
    Metadata {
        /// Manifest location.
        path: PathBuf,
        /// Decoder error.
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Hands out page file paths, suffixing `-2`, `-3`... on collisions.
#[derive(Debug, Default)]
struct PathAllocator {
    used: HashSet<PathBuf>,
}

impl PathAllocator {
    fn allocate(&mut self, section: &str, url: &str) -> PathBuf {
        let dir = sanitize_component(section);
        let slug = Url::parse(url)
            .map(|url| slug_for(&url))
            .unwrap_or_else(|_| INDEX_SLUG.to_string());
        let mut candidate = Path::new(&dir).join(format!("{slug}.md"));
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = Path::new(&dir).join(format!("{slug}-{n}.md"));
            n += 1;
        }
        candidate
    }
}

/// Orders documents by section, then title.
pub fn output_order(documents: &[Document]) -> Vec<&Document> {
    let mut ordered: Vec<&Document> = documents.iter().collect();
    ordered.sort_by(|a, b| {
        a.section
            .cmp(&b.section)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.url.cmp(&b.url))
    });
    ordered
}

fn relative_link(path: &Path) -> String {
    path.components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn page_file(document: &Document) -> String {
    let mut out = String::from("---\n");
    push_field(&mut out, "title", Some(&document.title));
    push_field(&mut out, "url", Some(&document.url));
    push_field(&mut out, "section", Some(&document.section));
    push_field(&mut out, "subsection", document.subsection.as_ref());
    push_field(&mut out, "description", document.description.as_ref());
    out.push_str("---\n\n");
    out.push_str(document.content.trim_end());
    out.push('\n');
    out
}

fn push_field(out: &mut String, key: &str, value: Option<&String>) {
    if let Some(value) = value {
        // JSON strings are valid YAML scalars.
        let quoted = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""));
        out.push_str(&format!("{key}: {quoted}\n"));
    }
}

/// Removes the front matter written by [`write_site`].
pub fn strip_front_matter(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("---\n") else {
        return text;
    };
    match rest.find("\n---\n") {
        Some(end) => rest[end + 5..].trim_start_matches('\n'),
        None => text,
    }
}

fn index_file(manifest: &SiteManifest, paths: &[PathBuf]) -> String {
    let mut out = format!(
        "# Documentation index\n\nSource: {}\nPages: {}\n",
        manifest.base_url, manifest.total_pages
    );
    let mut current: Option<&str> = None;
    for (page, path) in manifest.pages.iter().zip(paths) {
        if current != Some(page.section.as_str()) {
            out.push_str(&format!("\n## {}\n\n", page.section));
            current = Some(page.section.as_str());
        }
        out.push_str(&format!("- [{}]({})", page.title, relative_link(path)));
        if page.has_api_endpoint {
            out.push_str(" (API)");
        }
        out.push('\n');
    }
    out
}

fn complete_file(base_url: &str, documents: &[&Document]) -> String {
    let mut out = format!("# Complete documentation\n\nSource: {base_url}\n");
    for document in documents {
        out.push_str("\n---\n\n");
        out.push_str(&format!("<!-- {} -->\n\n", document.url));
        out.push_str(document.content.trim_end());
        out.push('\n');
    }
    out
}

fn write(path: &Path, contents: &str) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::write(path, contents).map_err(io_error(path))
}

/// Writes every output file for `documents` into `dir`.
pub fn write_site(
    dir: &Path,
    base_url: &str,
    documents: &[Document],
    scraped_at: DateTime<Utc>,
) -> Result<SiteManifest, OutputError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let ordered = output_order(documents);
    let manifest = SiteManifest::new(base_url, &ordered, scraped_at);

    let mut allocator = PathAllocator::default();
    let mut paths = Vec::with_capacity(ordered.len());
    for document in &ordered {
        let relative = allocator.allocate(&document.section, &document.url);
        write(&dir.join(&relative), &page_file(document))?;
        debug!(path = %relative.display(), "wrote page");
        paths.push(relative);
    }

    write(&dir.join(INDEX_FILE), &index_file(&manifest, &paths))?;
    write(&dir.join(COMPLETE_FILE), &complete_file(base_url, &ordered))?;

    let metadata_path = dir.join(METADATA_FILE);
    let json = serde_json::to_string_pretty(&manifest).map_err(|source| OutputError::Metadata {
        path: metadata_path.clone(),
        source,
    })?;
    write(&metadata_path, &json)?;

    info!(dir = %dir.display(), pages = manifest.total_pages, "outputs written");
    Ok(manifest)
}

/// A page read back from an output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePage {
    /// Manifest entry.
    pub entry: PageEntry,
    /// Path relative to the output directory.
    pub file: PathBuf,
    /// Markdown body without front matter.
    pub content: String,
}

/// Reads `metadata.json` and the page files it lists.
pub fn read_site(dir: &Path) -> Result<(SiteManifest, Vec<SitePage>), OutputError> {
    let metadata_path = dir.join(METADATA_FILE);
    let raw = fs::read_to_string(&metadata_path).map_err(io_error(&metadata_path))?;
    let manifest: SiteManifest =
        serde_json::from_str(&raw).map_err(|source| OutputError::Metadata {
            path: metadata_path.clone(),
            source,
        })?;

    let mut allocator = PathAllocator::default();
    let mut pages = Vec::with_capacity(manifest.pages.len());
    for entry in &manifest.pages {
        let file = allocator.allocate(&entry.section, &entry.url);
        let path = dir.join(&file);
        let text = fs::read_to_string(&path).map_err(io_error(&path))?;
        pages.push(SitePage {
            entry: entry.clone(),
            content: strip_front_matter(&text).to_string(),
            file,
        });
    }
    Ok((manifest, pages))
}

/// Bodies of the fenced code blocks in `markdown`.
pub fn fenced_code(markdown: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, String)> = None;
    for line in markdown.lines() {
        let trimmed = line.trim_start();
        match current.as_mut() {
            None => {
                if trimmed.starts_with("```") {
                    current = Some((fence_of(trimmed), String::new()));
                }
            }
            Some((fence, body)) => {
                if trimmed.starts_with(fence.as_str()) && trimmed.trim_end() == fence.as_str() {
                    if let Some((_, body)) = current.take() {
                        blocks.push(body);
                    }
                } else {
                    body.push_str(line);
                    body.push('\n');
                }
            }
        }
    }
    blocks
}

fn fence_of(line: &str) -> String {
    line.chars().take_while(|ch| *ch == '`').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn colliding_slugs_get_suffixes() {
        let mut allocator = PathAllocator::default();
        assert_eq!(
            allocator.allocate("guides", "https://d.dev/guides/a/b"),
            Path::new("guides").join("a-b.md")
        );
        assert_eq!(
            allocator.allocate("guides", "https://d.dev/guides/a-b"),
            Path::new("guides").join("a-b-2.md")
        );
        assert_eq!(
            allocator.allocate("guides", "https://d.dev/guides"),
            Path::new("guides").join("index.md")
        );
    }

    #[test]
    fn front_matter_is_stripped() {
        let text = "---\ntitle: \"A\"\n---\n\n# A\n\nBody\n";
        assert_eq!(strip_front_matter(text), "# A\n\nBody\n");
        assert_eq!(strip_front_matter("# plain"), "# plain");
    }

    #[test]
    fn fenced_code_bodies() {
        let md = "Intro\n\n```python\nprint('x')\n```\n\n````md\n```\ninner\n```\n````\n";
        assert_eq!(
            fenced_code(md),
            ["print('x')\n".to_string(), "```\ninner\n```\n".to_string()]
        );
    }
}
