//! Sliding-window passage chunking
//!
//! Windows are measured in whitespace-delimited tokens and advance by
//! `window - overlap` tokens. The overlap exists so a sentence split across
//! a window boundary still appears whole in at least one passage. Passages
//! are byte-slices of the input text, so interior whitespace survives and
//! concatenating passages with overlaps removed reconstructs the tokenized
//! input.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// One retrieval passage, borrowed from the extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passage<'a> {
    pub text: &'a str,
    /// Zero-based index of the passage's first token in the input
    pub token_start: usize,
    /// Whitespace-token count of this passage
    pub token_count: usize,
}

/// Text chunker with configurable window and overlap
pub struct PassageChunker {
    window: usize,
    overlap: usize,
}

impl PassageChunker {
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        if overlap >= window {
            return Err(Error::InvalidChunkConfig { window, overlap });
        }
        Ok(Self { window, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.window_tokens, config.overlap_tokens)
    }

    /// Split `text` into overlapping passages. Empty (or all-whitespace)
    /// input yields an empty sequence, not an error.
    pub fn chunk<'a>(&self, text: &'a str) -> Vec<Passage<'a>> {
        let spans = token_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let step = self.window - self.overlap;
        let mut passages = Vec::with_capacity(spans.len() / step + 1);
        let mut start = 0usize;
        loop {
            let end = (start + self.window).min(spans.len());
            passages.push(Passage {
                text: &text[spans[start].0..spans[end - 1].1],
                token_start: start,
                token_count: end - start,
            });
            // The final window is truncated to the remaining text, never
            // padded; once a window reaches the end there is nothing left
            // that is not already covered.
            if end == spans.len() {
                break;
            }
            start += step;
        }
        passages
    }
}

/// Byte ranges of the whitespace-delimited tokens in `text`
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(matches!(
            PassageChunker::new(100, 100),
            Err(Error::InvalidChunkConfig { .. })
        ));
        assert!(matches!(
            PassageChunker::new(100, 150),
            Err(Error::InvalidChunkConfig { .. })
        ));
        assert!(PassageChunker::new(100, 0).is_ok());
    }

    #[test]
    fn empty_input_yields_no_passages() {
        let chunker = PassageChunker::new(200, 40).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\t ").is_empty());
    }

    #[test]
    fn short_input_yields_one_truncated_passage() {
        let chunker = PassageChunker::new(200, 40).unwrap();
        let text = words(12);
        let passages = chunker.chunk(&text);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].token_count, 12);
        assert_eq!(passages[0].text, text);
    }

    #[test]
    fn thousand_tokens_with_default_policy() {
        // stride 160: windows start at 0,160,...,800 and the window at 800
        // ends exactly on token 1000
        let chunker = PassageChunker::new(200, 40).unwrap();
        let text = words(1000);
        let passages = chunker.chunk(&text);
        assert_eq!(passages.len(), 6);
        assert!(passages.iter().all(|p| p.token_count == 200));
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.token_start, i * 160);
        }
    }

    #[test]
    fn final_window_is_truncated_not_padded() {
        let chunker = PassageChunker::new(200, 40).unwrap();
        let text = words(1030);
        let passages = chunker.chunk(&text);
        assert_eq!(passages.len(), 7);
        assert_eq!(passages.last().unwrap().token_start, 960);
        assert_eq!(passages.last().unwrap().token_count, 70);
    }

    #[test]
    fn overlap_removal_reconstructs_the_input() {
        let chunker = PassageChunker::new(50, 10).unwrap();
        let text = words(137);
        let original: Vec<&str> = text.split_whitespace().collect();

        let mut rebuilt: Vec<&str> = Vec::new();
        for passage in chunker.chunk(&text) {
            let tokens = passage.text.split_whitespace();
            let already = rebuilt.len() - passage.token_start;
            rebuilt.extend(tokens.skip(already));
        }
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn passages_preserve_interior_whitespace() {
        let chunker = PassageChunker::new(4, 1).unwrap();
        let text = "alpha  beta\ngamma\t delta epsilon";
        let passages = chunker.chunk(text);
        assert_eq!(passages[0].text, "alpha  beta\ngamma\t delta");
        assert_eq!(passages[1].text, "delta epsilon");
    }
}
