//! Text chunking along sentence and word boundaries.
//!
//! Remote synthesis services cap request sizes and local engines stall on very
//! long inputs, so an utterance is cut into chunks of at most `max_len`
//! characters. Sentences are packed greedily; a sentence that is too long on its
//! own is packed word by word instead. A single word longer than `max_len` is
//! emitted whole as its own chunk.

use crate::error::{SpeechError, SpeechResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::SplitWhitespace;

/// Sentence terminator followed by the whitespace that separates it from the next sentence.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

/// One speakable unit of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the utterance
    pub index: usize,
    /// Whitespace-normalized text
    pub text: String,
}

impl Chunk {
    /// Create a chunk
    #[must_use]
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Splits text into bounded-size chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_len: usize,
}

impl Chunker {
    /// Create a chunker with the given maximum chunk length in characters
    ///
    /// # Errors
    ///
    /// Returns an error if `max_len` is zero
    pub fn new(max_len: usize) -> SpeechResult<Self> {
        if max_len == 0 {
            return Err(SpeechError::invalid_input(
                "Chunk size must be greater than 0",
            ));
        }
        Ok(Self { max_len })
    }

    /// Maximum chunk length in characters
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Lazily chunk `text`. Each call starts a fresh pass over the input.
    ///
    /// Empty or whitespace-only input yields no chunks.
    #[must_use]
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            sentences: Sentences::new(text),
            words: None,
            max_len: self.max_len,
            current: String::new(),
            current_len: 0,
            next_index: 0,
        }
    }

    /// Collect all chunks of `text`
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        self.chunks(text).collect()
    }

    /// Number of chunks `text` produces
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.chunks(text).count()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            max_len: crate::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Sentences of a text, each ending at a terminator that precedes whitespace
struct Sentences<'a> {
    text: &'a str,
    ends: regex::Matches<'static, 'a>,
    start: usize,
    finished: bool,
}

impl<'a> Sentences<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            ends: SENTENCE_END.find_iter(text),
            start: 0,
            finished: false,
        }
    }
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if let Some(end) = self.ends.next() {
            // Terminators are single-byte ASCII, so `start + 1` is a char boundary.
            let sentence = &self.text[self.start..=end.start()];
            self.start = end.end();
            return Some(sentence);
        }
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(&self.text[self.start..])
    }
}

/// Lazy chunk iterator returned by [`Chunker::chunks`]
pub struct Chunks<'a> {
    sentences: Sentences<'a>,
    words: Option<SplitWhitespace<'a>>,
    max_len: usize,
    current: String,
    current_len: usize,
    next_index: usize,
}

impl Chunks<'_> {
    fn fits(&self, len: usize) -> bool {
        let separator = usize::from(self.current_len > 0);
        self.current_len + separator + len <= self.max_len
    }

    fn append(&mut self, fragment: &str) {
        for word in fragment.split_whitespace() {
            if !self.current.is_empty() {
                self.current.push(' ');
                self.current_len += 1;
            }
            self.current.push_str(word);
            self.current_len += word.chars().count();
        }
    }

    fn take_current(&mut self) -> Option<String> {
        if self.current.is_empty() {
            return None;
        }
        self.current_len = 0;
        Some(std::mem::take(&mut self.current))
    }

    fn emit(&mut self, text: String) -> Chunk {
        let chunk = Chunk {
            index: self.next_index,
            text,
        };
        self.next_index += 1;
        chunk
    }

    /// Add one word of an oversized sentence, returning any chunk it displaced.
    fn push_word(&mut self, word: &str) -> Option<String> {
        if self.fits(word.chars().count()) {
            self.append(word);
            return None;
        }
        let flushed = self.take_current();
        self.append(word);
        flushed
    }
}

/// Length of `text` once its whitespace runs are collapsed to single spaces
fn normalized_len(text: &str) -> usize {
    let mut words: usize = 0;
    let mut chars = 0;
    for word in text.split_whitespace() {
        words += 1;
        chars += word.chars().count();
    }
    chars + words.saturating_sub(1)
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            if let Some(words) = self.words.as_mut() {
                if let Some(word) = words.next() {
                    if let Some(text) = self.push_word(word) {
                        return Some(self.emit(text));
                    }
                    continue;
                }
                // The tail of an oversized sentence is never merged with the next one.
                self.words = None;
                if let Some(text) = self.take_current() {
                    return Some(self.emit(text));
                }
                continue;
            }

            let Some(sentence) = self.sentences.next() else {
                let text = self.take_current()?;
                return Some(self.emit(text));
            };

            let len = normalized_len(sentence);
            if len == 0 {
                continue;
            }
            if self.fits(len) {
                self.append(sentence);
                continue;
            }

            let flushed = self.take_current();
            if len > self.max_len {
                self.words = Some(sentence.split_whitespace());
            } else {
                self.append(sentence);
            }
            if let Some(text) = flushed {
                return Some(self.emit(text));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    fn collapse(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_zero_max_len_rejected() {
        assert!(Chunker::new(0).is_err());
        assert_eq!(Chunker::new(1).unwrap().max_len(), 1);
    }

    #[test]
    fn test_default_chunk_size() {
        assert_eq!(Chunker::default().max_len(), crate::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.split("Hello world. How are you?");
        assert_eq!(texts(&chunks), vec!["Hello world. How are you?"]);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_splitter_scenario() {
        let chunker = Chunker::new(40).unwrap();
        let text = "Hello world. This is a test of the chunk splitter that should definitely wrap around nicely.";
        let chunks = chunker.split(text);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 40, "chunk too long: {chunk}");
        }
        assert_eq!(chunks[0].text, "Hello world.");
        assert_eq!(
            texts(&chunks[1..]),
            vec![
                "This is a test of the chunk splitter",
                "that should definitely wrap around",
                "nicely.",
            ]
        );
    }

    #[test]
    fn test_sentences_are_packed() {
        let chunker = Chunker::new(30).unwrap();
        let chunks = chunker.split("One two. Three four. Five six seven eight nine.");
        assert_eq!(
            texts(&chunks),
            vec!["One two. Three four.", "Five six seven eight nine."]
        );
    }

    #[test]
    fn test_oversized_word_is_its_own_chunk() {
        let chunker = Chunker::new(5).unwrap();
        let chunks = chunker.split("a supercalifragilistic b");
        assert_eq!(texts(&chunks), vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_oversized_sentence_tail_not_merged() {
        let chunker = Chunker::new(12).unwrap();
        let chunks = chunker.split("alpha beta gamma delta. Hi.");
        assert_eq!(texts(&chunks), vec!["alpha beta", "gamma delta.", "Hi."]);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let chunker = Chunker::default();
        let chunks = chunker.split("  Hello\n\n   world!\tBye  now.  ");
        assert_eq!(texts(&chunks), vec!["Hello world! Bye now."]);
    }

    #[test]
    fn test_normalized_len() {
        assert_eq!(normalized_len(""), 0);
        assert_eq!(normalized_len("   "), 0);
        assert_eq!(normalized_len("word"), 4);
        assert_eq!(normalized_len("  two \n  words "), 9);
    }

    #[test]
    fn test_terminator_without_whitespace_does_not_split() {
        let chunker = Chunker::new(10).unwrap();
        let chunks = chunker.split("v1.2.3 is out");
        assert_eq!(texts(&chunks), vec!["v1.2.3 is", "out"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let chunker = Chunker::default();
        assert!(chunker.split("").is_empty());
        assert!(chunker.split(" \n\t ").is_empty());
        assert_eq!(chunker.count("   "), 0);
    }

    #[test]
    fn test_indices_are_sequential() {
        let chunker = Chunker::new(8).unwrap();
        let chunks = chunker.split("one two three four five six seven");
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
    }

    #[test]
    fn test_chunks_restart() {
        let chunker = Chunker::new(10).unwrap();
        let text = "First one. Second one. Third one.";
        let first: Vec<Chunk> = chunker.chunks(text).collect();
        let second: Vec<Chunk> = chunker.chunks(text).collect();
        assert_eq!(first, second);
        assert_eq!(chunker.count(text), first.len());
    }

    #[test]
    fn test_multibyte_lengths_counted_in_chars() {
        let chunker = Chunker::new(6).unwrap();
        let chunks = chunker.split("héllo wörld");
        assert_eq!(texts(&chunks), vec!["héllo", "wörld"]);
    }

    proptest! {
        #[test]
        fn prop_chunks_respect_max_len(
            text in "[a-zA-Z .!?\n]{0,300}",
            max_len in 1usize..60,
        ) {
            let chunker = Chunker::new(max_len).unwrap();
            for chunk in chunker.chunks(&text) {
                prop_assert!(!chunk.text.is_empty());
                if chunk.char_len() > max_len {
                    prop_assert!(!chunk.text.contains(' '), "oversized chunk is not a single word: {:?}", chunk.text);
                }
            }
        }

        #[test]
        fn prop_join_reproduces_input(
            text in "[a-zA-Z .!?\t\n]{1,300}",
            max_len in 1usize..60,
        ) {
            let chunker = Chunker::new(max_len).unwrap();
            let joined = texts(&chunker.split(&text)).join(" ");
            prop_assert_eq!(collapse(&joined), collapse(&text));
        }
    }
}
