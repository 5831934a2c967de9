use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::compliance::Language;

/// Longest chunk the translate TTS endpoint accepts
pub const MAX_CHUNK_CHARS: usize = 100;

const TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Turns a message into MP3 audio
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>>;
}

/// Client for the public Google Translate TTS endpoint
pub struct GoogleTranslateTts {
    agent: ureq::Agent,
    endpoint: String,
}

impl GoogleTranslateTts {
    pub fn new() -> Self {
        Self::with_endpoint(TTS_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(15))
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }

    fn fetch_chunk(&self, chunk: &str, index: usize, total: usize, language: Language) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("ie", "UTF-8")
            .query("client", "tw-ob")
            .query("tl", language.code())
            .query("q", chunk)
            .query("idx", &index.to_string())
            .query("total", &total.to_string())
            .query("textlen", &chunk.chars().count().to_string())
            .call()
            .with_context(|| format!("speech request {} of {}", index + 1, total))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .context("reading speech audio")?;
        if bytes.is_empty() {
            anyhow::bail!("speech service returned no audio");
        }
        Ok(bytes)
    }
}

impl Default for GoogleTranslateTts {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for GoogleTranslateTts {
    fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            anyhow::bail!("nothing to say");
        }

        // MP3 frames can simply be concatenated
        let mut audio = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, index, chunks.len(), language)?);
        }
        Ok(audio)
    }
}

/// Split on whitespace into chunks of at most `max_len` characters.
/// Words longer than `max_len` are split mid-word.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_len);
            chunks.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word.len() > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("  hola   compañero ", 100), vec!["hola compañero"]);
    }

    #[test]
    fn chunks_respect_the_limit() {
        let text = "uno dos tres cuatro cinco seis";
        let chunks = split_text(text, 10);
        assert_eq!(chunks, vec!["uno dos", "tres", "cuatro", "cinco seis"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn long_words_are_hard_split() {
        assert_eq!(split_text("ab abcdefgh", 3), vec!["ab", "abc", "def", "gh"]);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        assert_eq!(split_text("ñññ ñññ", 7), vec!["ñññ ñññ"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text("   ", 100).is_empty());
    }
}
