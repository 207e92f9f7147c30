//! Chunking utilities for splitting extracted document text into
//! overlapping fixed-size windows.
//!
//! Window sizes are rebalanced so the final window is not disproportionately
//! short: the number of windows is derived from the requested size and
//! overlap, then every window is widened to spread the text evenly across
//! them. Lengths are counted in characters, not bytes.

use crate::error::{Error, Result};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunk size and overlap, validated before any text is split.
///
/// # Examples
///
/// ```
/// use fileseek::chunking::ChunkingConfig;
///
/// assert!(ChunkingConfig::new(1000, 200).is_ok());
/// assert!(ChunkingConfig::new(200, 200).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Requested window size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check `0 <= overlap < chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A chunk of text from a larger document.
///
/// Produced by [`chunk_text`]. Chunks are owned by exactly one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text content.
    pub text: String,
    /// Zero-based chunk index within the document.
    pub index: usize,
    /// Number of chunks the document was split into.
    pub total: usize,
}

/// Compute the rebalanced window width used for `char_count` characters.
///
/// Returns `None` when the text fits in a single chunk.
pub fn adjusted_chunk_size(
    char_count: usize,
    chunk_size: usize,
    overlap: usize,
) -> Option<usize> {
    if char_count <= chunk_size {
        return None;
    }
    let num_chunks = (char_count - overlap).div_ceil(chunk_size - overlap);
    Some(char_count.div_ceil(num_chunks) + overlap)
}

/// Split text into overlapping chunks.
///
/// If the text has at most `chunk_size` characters, returns a single chunk
/// holding the whole text. Otherwise windows of the adjusted size slide
/// forward by `adjusted - overlap` characters until the text is covered.
///
/// # Errors
///
/// Returns [`Error::Config`] unless `overlap < chunk_size`.
///
/// # Examples
///
/// ```
/// use fileseek::chunking::chunk_text;
///
/// let chunks = chunk_text("Hello, world!", 1000, 200).unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text, "Hello, world!");
///
/// let text = "x".repeat(2500);
/// let chunks = chunk_text(&text, 1000, 200).unwrap();
/// assert_eq!(chunks.len(), 3);
/// ```
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    ChunkingConfig {
        chunk_size,
        overlap,
    }
    .validate()?;

    let char_count = text.chars().count();
    let Some(window) = adjusted_chunk_size(char_count, chunk_size, overlap)
    else {
        return Ok(vec![Chunk {
            text: text.to_string(),
            index: 0,
            total: 1,
        }]);
    };

    // char index -> byte index, with a trailing entry for the end of text
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let step = window - overlap;
    let mut pieces = Vec::new();
    let mut start_char = 0;

    while start_char < char_count {
        let end_char = (start_char + window).min(char_count);
        let start_byte = char_to_byte[start_char];
        let end_byte = char_to_byte[end_char];
        pieces.push(&text[start_byte..end_byte]);
        start_char += step;
    }

    let total = pieces.len();
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| Chunk {
            text: piece.to_string(),
            index,
            total,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text(
            "Hello, world!",
            DEFAULT_CHUNK_SIZE,
            DEFAULT_CHUNK_OVERLAP,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total, 1);
    }

    #[test]
    fn text_exactly_chunk_size_is_not_split() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn rebalanced_windows_for_2500_chars() {
        let text: String =
            (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_text(&text, 1000, 200).unwrap();

        // ceil(2300 / 800) = 3 windows of ceil(2500 / 3) + 200 = 1034
        assert_eq!(adjusted_chunk_size(2500, 1000, 200), Some(1034));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.chars().count(), 1034);
        assert_eq!(chunks[1].text.chars().count(), 1034);
        assert_eq!(chunks[2].text.chars().count(), 2500 - 2 * 834);
        assert!(chunks.iter().all(|c| c.total == 3));

        // consecutive windows share exactly `overlap` characters
        let tail: String = chunks[0].text.chars().skip(834).collect();
        let head: String = chunks[1].text.chars().take(200).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(matches!(
            chunk_text("anything", 100, 100),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            chunk_text("anything", 100, 150),
            Err(Error::Config(_))
        ));
        assert!(matches!(chunk_text("anything", 0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn zero_overlap_partitions_text() {
        let text = "b".repeat(3000);
        let chunks = chunk_text(&text, 1000, 0).unwrap();
        assert_eq!(chunks.len(), 3);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn handles_mixed_length_unicode() {
        // ASCII (1 byte), accented chars (2 bytes), CJK (3 bytes), emoji (4)
        let text = "café ☕ naïve 日本語 🎉 ".repeat(50);
        let chunks = chunk_text(&text, 100, 20).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn empty_text_is_a_single_empty_chunk() {
        let chunks = chunk_text("", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.is_empty());
    }

    proptest! {
        #[test]
        fn chunks_cover_all_text(
            text in "\\PC{0,3000}",
            chunk_size in 1usize..600,
            overlap_seed in 0usize..600,
        ) {
            let overlap = overlap_seed % chunk_size;
            let chunks = chunk_text(&text, chunk_size, overlap).unwrap();
            let chars: Vec<char> = text.chars().collect();

            match adjusted_chunk_size(chars.len(), chunk_size, overlap) {
                None => {
                    prop_assert_eq!(chunks.len(), 1);
                    prop_assert_eq!(&chunks[0].text, &text);
                }
                Some(window) => {
                    let step = window - overlap;
                    let mut covered_to = 0;
                    for chunk in &chunks {
                        let start = chunk.index * step;
                        let len = chunk.text.chars().count();
                        prop_assert!(len > 0);
                        prop_assert!(len <= window);
                        prop_assert!(start <= covered_to);
                        let expected: String =
                            chars[start..start + len].iter().collect();
                        prop_assert_eq!(&chunk.text, &expected);
                        covered_to = covered_to.max(start + len);
                    }
                    prop_assert_eq!(covered_to, chars.len());
                }
            }
        }

        #[test]
        fn chunk_count_follows_window_formula(
            len in 1usize..5000,
            chunk_size in 200usize..1200,
            overlap_pct in 0usize..50,
        ) {
            let overlap = chunk_size * overlap_pct / 100;
            let text = "x".repeat(len);
            let chunks = chunk_text(&text, chunk_size, overlap).unwrap();

            if len > chunk_size {
                let expected =
                    (len - overlap).div_ceil(chunk_size - overlap);
                prop_assert!(chunks.len().abs_diff(expected) <= 1);
            } else {
                prop_assert_eq!(chunks.len(), 1);
            }
        }

        #[test]
        fn chunking_is_deterministic(
            text in "\\PC{0,2000}",
            chunk_size in 2usize..400,
        ) {
            let overlap = chunk_size / 3;
            let a = chunk_text(&text, chunk_size, overlap).unwrap();
            let b = chunk_text(&text, chunk_size, overlap).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
