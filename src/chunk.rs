//! Overlapping text chunker.
//!
//! Splits extracted document text into windows of at most `chunk_size`
//! characters. Each window is cut at the best boundary available inside
//! the size budget — paragraph (`\n\n`), then line (`\n`), then word
//! (space), then a raw character cut — and the next window starts
//! `overlap` characters before the cut, so consecutive chunks share an
//! `overlap`-sized boundary region.
//!
//! All cut positions are kept on UTF-8 character boundaries.

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Text no longer than `chunk_size` yields exactly one chunk equal to the
/// input. Empty text yields no chunks.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let remaining = &text[start..];
        if remaining.len() <= chunk_size {
            chunks.push(remaining.to_string());
            break;
        }

        let window_end = floor_char_boundary(remaining, chunk_size);
        let window = &remaining[..window_end];
        let cut = cut_point(window);
        chunks.push(window[..cut].to_string());

        // Next window begins `overlap` characters before the cut. A cut
        // inside the overlap span would stall, so fall back to no overlap.
        let mut next = if cut > overlap {
            let mut back = start + cut - overlap;
            while !text.is_char_boundary(back) {
                back -= 1;
            }
            back
        } else {
            start + cut
        };
        if next <= start {
            next = start + cut;
        }
        start = next;
    }
    chunks
}

/// Best cut position within a full-size window: after the last paragraph
/// break, else after the last newline, else after the last space, else
/// the window end. Separators at position zero are ignored — they would
/// produce an empty or separator-only chunk.
fn cut_point(window: &str) -> usize {
    if let Some(pos) = window.rfind("\n\n") {
        if pos > 0 {
            return pos + 2;
        }
    }
    if let Some(pos) = window.rfind('\n') {
        if pos > 0 {
            return pos + 1;
        }
    }
    if let Some(pos) = window.rfind(' ') {
        if pos > 0 {
            return pos + 1;
        }
    }
    window.len()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Chunk a document's per-page texts, tagging each chunk with the source
/// filename, a 1-based page number, and a zero-based sequence index that
/// runs across the whole document.
pub fn chunk_pages(pages: &[String], filename: &str, chunking: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut sequence = 0usize;
    for (page_idx, page) in pages.iter().enumerate() {
        for text in split_text(page, chunking.chunk_size, chunking.overlap) {
            chunks.push(Chunk {
                text,
                source_file: filename.to_string(),
                sequence_index: sequence,
                page: Some(page_idx + 1),
            });
            sequence += 1;
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 1000, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(split_text("", 1000, 200).is_empty());
    }

    #[test]
    fn raw_cut_has_exact_overlap() {
        let text = "x".repeat(1500);
        let chunks = split_text(&text, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 700);
        assert_eq!(&chunks[0][800..], &chunks[1][..200]);
    }

    #[test]
    fn consecutive_chunks_share_overlap_region() {
        let text = "word ".repeat(600); // 3000 chars, space boundaries only
        let chunks = split_text(&text, 1000, 200);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let prev = &pair[0];
            let next = &pair[1];
            assert!(prev.len() > 200);
            assert_eq!(&prev[prev.len() - 200..], &next[..200]);
        }
    }

    #[test]
    fn prefers_paragraph_boundary() {
        let text = format!("{}\n\n{}", "a".repeat(600), "b".repeat(600));
        let chunks = split_text(&text, 1000, 200);
        assert!(chunks[0].ends_with("\n\n"), "cut after the paragraph break");
        assert!(chunks[0].starts_with('a'));
        assert!(chunks.last().unwrap().ends_with('b'));
    }

    #[test]
    fn falls_back_to_line_then_word() {
        let line_text = format!("{}\n{}", "a".repeat(600), "b".repeat(600));
        let chunks = split_text(&line_text, 1000, 200);
        assert!(chunks[0].ends_with('\n'));

        let word_text = format!("{} {}", "a".repeat(600), "b".repeat(600));
        let chunks = split_text(&word_text, 1000, 200);
        assert!(chunks[0].ends_with(' '));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "héllo wörld ".repeat(200);
        let chunks = split_text(&text, 100, 20);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.len() <= 100);
        }
    }

    #[test]
    fn chunk_pages_tags_source_page_and_running_sequence() {
        let pages = vec!["a".repeat(1500), "b".repeat(500), "c".repeat(2000)];
        let config = ChunkingConfig {
            chunk_size: 1000,
            overlap: 200,
        };
        let chunks = chunk_pages(&pages, "report.pdf", &config);
        assert!(chunks.len() >= 5);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert_eq!(chunk.source_file, "report.pdf");
        }
        assert_eq!(chunks.first().unwrap().page, Some(1));
        assert_eq!(chunks.last().unwrap().page, Some(3));
    }

    #[test]
    fn empty_page_contributes_no_chunks() {
        let pages = vec![String::new(), "content".to_string()];
        let config = ChunkingConfig {
            chunk_size: 1000,
            overlap: 200,
        };
        let chunks = chunk_pages(&pages, "doc.pdf", &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, Some(2));
        assert_eq!(chunks[0].sequence_index, 0);
    }
}
