use crate::error::IngestError;
use crate::models::TextChunk;
use regex::Regex;

pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Word-window chunking parameters. `size` and `overlap` are counted in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self, IngestError> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    /// The window must advance on every step, so `size > overlap` is required.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.size <= self.overlap {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk size {} must be greater than overlap {}",
                self.size, self.overlap
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.size - self.overlap
    }
}

/// Cleans extracted PDF text: non-ASCII runs become a space, whitespace and
/// control character runs collapse to one space, ends are trimmed.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    non_ascii: Regex,
    blank_runs: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            non_ascii: Regex::new(r"[^\x00-\x7F]+")?,
            blank_runs: Regex::new(r"[\s\x00-\x1F\x7F]+")?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let ascii = self.non_ascii.replace_all(raw, " ");
        let collapsed = self.blank_runs.replace_all(&ascii, " ");
        collapsed.trim().to_string()
    }
}

pub fn normalize_text(raw: &str) -> Result<String, IngestError> {
    Ok(TextNormalizer::new()?.normalize(raw))
}

/// Splits `text` on whitespace and emits overlapping windows of `config.size`
/// words, advancing by `config.size - config.overlap`. The last window is
/// whatever remains once a window reaches the end of the text, so it may be
/// shorter than `size`. Empty text yields a single empty chunk.
pub fn chunk_words(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return Ok(vec![String::new()]);
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += config.stride();
    }

    Ok(chunks)
}

pub fn build_chunks(text: &str, config: ChunkingConfig) -> Result<Vec<TextChunk>, IngestError> {
    Ok(chunk_words(text, config)?
        .into_iter()
        .enumerate()
        .map(|(position, text)| TextChunk {
            id: position as u64,
            text,
        })
        .collect())
}
