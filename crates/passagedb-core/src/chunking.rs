use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::traits::Chunker;
use crate::types::{Document, Passage};

/// How split boundaries are chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRecipe {
    /// Blank-line paragraphs only.
    Plain,
    /// ATX headings start a new section first, then paragraphs; fenced code stays whole.
    #[default]
    Markdown,
}

/// Paragraph-packing chunker with word-window overlap for oversized paragraphs.
#[derive(Debug, Clone, Default)]
pub struct ParagraphChunker {
    settings: ChunkingSettings,
}

impl ParagraphChunker {
    pub fn new(settings: ChunkingSettings) -> Self {
        Self { settings }
    }

    fn sections<'a>(&self, text: &'a str) -> Vec<Vec<&'a str>> {
        match self.settings.recipe {
            ChunkRecipe::Plain => vec![text.split("\n\n").collect()],
            ChunkRecipe::Markdown => markdown_sections(text),
        }
    }

    fn count_tokens(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f32 / 0.75) as usize
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = ((self.settings.max_tokens as f32 * 0.75) as usize).max(1);
        let overlap_words = ((words_per_chunk as f32 * self.settings.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for section in self.sections(text) {
            let mut current = String::new();
            let mut current_tokens = 0usize;
            for paragraph in section {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() { continue; }
                let tokens = self.count_tokens(paragraph);
                if tokens > self.settings.max_tokens {
                    if !current.is_empty() { out.push(std::mem::take(&mut current)); current_tokens = 0; }
                    out.extend(self.split_paragraph_with_overlap(paragraph));
                    continue;
                }
                if !current.is_empty() && current_tokens + tokens > self.settings.max_tokens {
                    out.push(std::mem::take(&mut current));
                    current_tokens = 0;
                }
                if !current.is_empty() { current.push_str("\n\n"); }
                current.push_str(paragraph);
                current_tokens += tokens;
            }
            if !current.is_empty() { out.push(current); }
        }
        tracing::debug!(passages = out.len(), recipe = ?self.settings.recipe, "chunked document");
        out
    }
}

/// Splits markdown into heading-led sections, each a list of paragraphs.
fn markdown_sections(text: &str) -> Vec<Vec<&str>> {
    let mut sections: Vec<Vec<&str>> = vec![Vec::new()];
    let mut in_fence = false;
    let mut para_start: Option<usize> = None;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            if para_start.is_none() { para_start = Some(line_start); }
            continue;
        }
        if in_fence { continue; }
        if is_atx_heading(trimmed) {
            flush(&mut sections, text, para_start.take(), line_start);
            if sections.last().is_some_and(|s| !s.is_empty()) { sections.push(Vec::new()); }
            para_start = Some(line_start);
            continue;
        }
        if trimmed.trim().is_empty() {
            flush(&mut sections, text, para_start.take(), line_start);
        } else if para_start.is_none() {
            para_start = Some(line_start);
        }
    }
    flush(&mut sections, text, para_start, text.len());
    sections.retain(|s| !s.is_empty());
    sections
}

fn flush<'a>(sections: &mut [Vec<&'a str>], text: &'a str, start: Option<usize>, end: usize) {
    if let (Some(s), Some(last)) = (start, sections.last_mut()) {
        last.push(&text[s..end]);
    }
}

fn is_atx_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with([' ', '\t', '\n', '\r'])
}

/// Runs `chunker` over `document` and tags each passage with its source name.
pub fn passages(chunker: &dyn Chunker, document: &Document) -> Vec<Passage> {
    chunker
        .chunk(&document.raw_text)
        .into_iter()
        .map(|text| Passage { text, source_document_name: document.name.clone() })
        .collect()
}

/// Reads a file into a [`Document`], named `name` or else the file name.
pub fn read_document(path: &Path, name: Option<&str>) -> Result<Document> {
    let raw_text = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            let bytes = fs::read(path).map_err(|e| Error::validation(format!("cannot read {}: {e}", path.display())))?;
            String::from_utf8_lossy(&bytes).to_string()
        }
    };
    let name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .ok_or_else(|| Error::validation(format!("{} has no file name", path.display())))?,
    };
    Ok(Document { name, raw_text })
}

/// Lists `.txt`/`.md` files under `root`, sorted.
pub fn list_documents(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if matches!(path.extension().and_then(|s| s.to_str()), Some("txt" | "md" | "markdown")) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}
