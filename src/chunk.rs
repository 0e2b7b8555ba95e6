//! Fixed-size overlapping text chunker.
//!
//! Splits normalized document text into [`Chunk`]s of `chunk_size`
//! characters with `overlap` characters shared between neighbors, so the
//! chunks cover the whole document without gaps. Splitting is by
//! character count, not token-aware; offsets are char offsets into the
//! document text and slicing always lands on UTF-8 boundaries.
//!
//! [`ChunkIter`] is lazy, finite, and restartable (constructing a new
//! iterator over the same text yields the same sequence). Each chunk
//! receives a v4 UUID plus a SHA-256 hash of its text for staleness
//! detection.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Lazy iterator over the chunks of one document.
pub struct ChunkIter<'a> {
    document_id: String,
    text: &'a str,
    /// Byte offset of every char boundary, plus one sentinel for the end.
    boundaries: Vec<usize>,
    chunk_size: usize,
    stride: usize,
    pos: usize,
    sequence_index: i64,
    done: bool,
}

impl<'a> ChunkIter<'a> {
    /// Validates parameters and prepares the char-boundary table.
    ///
    /// Fails with [`RagError::InvalidConfig`] if `chunk_size == 0` or
    /// `overlap >= chunk_size`. Empty text yields an empty sequence, not
    /// an error.
    pub fn new(
        document_id: &str,
        text: &'a str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "overlap ({}) must be < chunk_size ({})",
                overlap, chunk_size
            )));
        }

        let mut boundaries: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        boundaries.push(text.len());

        Ok(Self {
            document_id: document_id.to_string(),
            text,
            boundaries,
            chunk_size,
            stride: chunk_size - overlap,
            pos: 0,
            sequence_index: 0,
            done: text.is_empty(),
        })
    }

    /// Number of chars in the underlying text.
    fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let start = self.pos;
        let end = (start + self.chunk_size).min(self.char_len());
        let piece = &self.text[self.boundaries[start]..self.boundaries[end]];

        let chunk = make_chunk(&self.document_id, self.sequence_index, start, end, piece);
        self.sequence_index += 1;

        if end == self.char_len() {
            // The final chunk may be shorter than chunk_size but is
            // never dropped and never followed by an empty tail.
            self.done = true;
        } else {
            self.pos = start + self.stride;
        }

        Some(chunk)
    }
}

/// Split text into chunks eagerly. Convenience wrapper over [`ChunkIter`].
pub fn chunk_text(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    Ok(ChunkIter::new(document_id, text, chunk_size, overlap)?.collect())
}

fn make_chunk(document_id: &str, index: i64, start: usize, end: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        text: text.to_string(),
        char_offset_start: start,
        char_offset_end: end,
        sequence_index: index,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("doc1", "Hello, world!", 300, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].char_offset_start, 0);
        assert_eq!(chunks[0].char_offset_end, 13);
    }

    #[test]
    fn test_empty_text_yields_empty_sequence() {
        let chunks = chunk_text("doc1", "", 300, 50).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_overlap_must_be_less_than_chunk_size() {
        let err = chunk_text("doc1", "abc", 10, 10).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
        let err = chunk_text("doc1", "abc", 0, 0).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn test_thousand_chars_300_50() {
        // 1000 chars, chunk_size=300, overlap=50 => stride 250:
        // [0,300) [250,550) [500,800) [750,1000)
        let text: String = std::iter::repeat('x').take(1000).collect();
        let chunks = chunk_text("doc1", &text, 300, 50).unwrap();
        assert_eq!(chunks.len(), 4);
        let spans: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.char_offset_start, c.char_offset_end))
            .collect();
        assert_eq!(spans, vec![(0, 300), (250, 550), (500, 800), (750, 1000)]);
    }

    #[test]
    fn test_offsets_reconstruct_original() {
        let text: String = (0..997).map(|i| ((i % 26) as u8 + b'a') as char).collect();
        let chunks = chunk_text("doc1", &text, 120, 30).unwrap();

        // Concatenating with overlaps removed must reproduce the text.
        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for c in &chunks {
            assert!(c.char_offset_start <= covered, "gap before chunk {}", c.sequence_index);
            let skip = covered - c.char_offset_start;
            rebuilt.extend(c.text.chars().skip(skip));
            covered = c.char_offset_end;
        }
        assert_eq!(rebuilt, text);
        assert_eq!(covered, 997);
    }

    #[test]
    fn test_offsets_monotonic_and_indices_contiguous() {
        let text: String = std::iter::repeat('y').take(2500).collect();
        let chunks = chunk_text("doc1", &text, 400, 100).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_index, i as i64);
            if i > 0 {
                assert!(c.char_offset_start >= chunks[i - 1].char_offset_start);
                // No gaps: each chunk starts inside or at the end of the
                // previous one.
                assert!(c.char_offset_start <= chunks[i - 1].char_offset_end);
            }
        }
        assert_eq!(chunks.last().unwrap().char_offset_end, 2500);
    }

    #[test]
    fn test_multibyte_text_slices_on_char_boundaries() {
        let text: String = std::iter::repeat('é').take(700).collect();
        let chunks = chunk_text("doc1", &text, 300, 50).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.chars().count(), 300);
        assert_eq!(chunks[2].char_offset_end, 700);
    }

    #[test]
    fn test_restartable() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta.";
        let a: Vec<_> = ChunkIter::new("doc1", text, 16, 4).unwrap().collect();
        let b: Vec<_> = ChunkIter::new("doc1", text, 16, 4).unwrap().collect();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.char_offset_start, y.char_offset_start);
            assert_eq!(x.char_offset_end, y.char_offset_end);
        }
    }

    #[test]
    fn test_no_zero_length_chunks() {
        // Text length an exact multiple of the stride used to be a
        // classic off-by-one source; make sure no empty tail is emitted.
        let text: String = std::iter::repeat('z').take(500).collect();
        let chunks = chunk_text("doc1", &text, 250, 0).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }
}
