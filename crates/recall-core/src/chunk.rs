//! Paragraph-then-sentence text chunker with word overlap.
//!
//! Splits source text into ordered fragments sized to a target length
//! (measured in characters). Splitting prefers paragraph boundaries
//! (`\n\n`) to keep related sentences together.
//!
//! # Algorithm
//!
//! 1. Normalize the configuration: a non-positive `target_size` becomes
//!    [`DEFAULT_TARGET_SIZE`]; an `overlap` outside `0..target_size` becomes
//!    20% of the target.
//! 2. Split text on `\n\n` paragraph boundaries, skipping blank paragraphs.
//! 3. Accumulate paragraphs into a buffer until adding the next one would
//!    exceed the target, then emit the buffer and seed a new one with the
//!    trailing `overlap` words of the emitted fragment.
//! 4. A paragraph longer than the target is split into sentences
//!    (`. ! ? 。 ！ ？ ；`) and fed through the same buffer logic.
//! 5. A single sentence longer than the target is emitted verbatim.
//!
//! # Example
//!
//! ```rust
//! use recall_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Alpha.\n\nBeta.", 1000, 0);
//! assert_eq!(chunks, vec!["Alpha.\n\nBeta.".to_string()]);
//! ```

/// Target fragment length used when the configured size is not positive.
pub const DEFAULT_TARGET_SIZE: usize = 1000;

const PARAGRAPH_SEP: &str = "\n\n";
const SENTENCE_SEP: &str = " ";
const SENTENCE_DELIMITERS: [char; 7] = ['.', '!', '?', '。', '！', '？', '；'];

/// Chunking parameters after fallback rules have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    /// Maximum fragment length in characters.
    pub target_size: usize,
    /// Number of trailing words carried into the next fragment.
    pub overlap: usize,
}

impl ChunkParams {
    /// Normalize raw configuration values. Never fails.
    pub fn normalize(target_size: i64, overlap: i64) -> Self {
        let target_size = if target_size <= 0 {
            DEFAULT_TARGET_SIZE
        } else {
            target_size as usize
        };
        let overlap = if overlap < 0 || overlap as usize >= target_size {
            target_size / 5
        } else {
            overlap as usize
        };
        Self {
            target_size,
            overlap,
        }
    }
}

/// Split `text` into ordered fragments of roughly `target_size` characters.
///
/// Returns no fragments for empty or whitespace-only input and at least one
/// fragment otherwise. The output depends only on the arguments.
pub fn chunk_text(text: &str, target_size: i64, overlap: i64) -> Vec<String> {
    let params = ChunkParams::normalize(target_size, overlap);
    let mut builder = FragmentBuilder::new(params);

    for para in text.split(PARAGRAPH_SEP) {
        if para.trim().is_empty() {
            continue;
        }
        if char_len(para) > params.target_size {
            for sentence in split_sentences(para) {
                builder.push(sentence, SENTENCE_SEP);
            }
        } else {
            builder.push(para, PARAGRAPH_SEP);
        }
    }

    builder.finish()
}

/// Running buffer that emits fragments and reseeds with overlap words.
struct FragmentBuilder {
    params: ChunkParams,
    buf: String,
    buf_len: usize,
    out: Vec<String>,
}

impl FragmentBuilder {
    fn new(params: ChunkParams) -> Self {
        Self {
            params,
            buf: String::new(),
            buf_len: 0,
            out: Vec::new(),
        }
    }

    fn push(&mut self, piece: &str, sep: &str) {
        let piece_len = char_len(piece);
        let sep_len = char_len(sep);
        let target = self.params.target_size;

        let would_be = if self.buf.is_empty() {
            piece_len
        } else {
            self.buf_len + sep_len + piece_len
        };
        if would_be <= target {
            self.append(piece, piece_len, sep, sep_len);
            return;
        }

        let emitted = self.emit();

        if piece_len > target {
            // Oversized sentence: emitted whole, never truncated.
            self.out.push(piece.to_string());
            return;
        }

        if let Some(prev) = emitted {
            let room = target.saturating_sub(piece_len + sep_len);
            let seed = overlap_tail(&prev, self.params.overlap, room);
            if !seed.is_empty() {
                self.buf_len = char_len(&seed);
                self.buf = seed;
            }
        }
        self.append(piece, piece_len, sep, sep_len);
    }

    fn append(&mut self, piece: &str, piece_len: usize, sep: &str, sep_len: usize) {
        if !self.buf.is_empty() {
            self.buf.push_str(sep);
            self.buf_len += sep_len;
        }
        self.buf.push_str(piece);
        self.buf_len += piece_len;
    }

    /// Move the current buffer to the output, returning a copy of it.
    fn emit(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let fragment = std::mem::take(&mut self.buf);
        self.buf_len = 0;
        self.out.push(fragment.clone());
        Some(fragment)
    }

    fn finish(mut self) -> Vec<String> {
        self.emit();
        self.out
    }
}

/// The last `words` whitespace-delimited words of `fragment`, dropping
/// leading words until the result fits in `max_chars`.
fn overlap_tail(fragment: &str, words: usize, max_chars: usize) -> String {
    if words == 0 {
        return String::new();
    }
    let all: Vec<&str> = fragment.split_whitespace().collect();
    let mut start = all.len().saturating_sub(words);
    loop {
        let tail = all[start..].join(" ");
        if char_len(&tail) <= max_chars {
            return tail;
        }
        start += 1;
        if start >= all.len() {
            return String::new();
        }
    }
}

/// Split a paragraph after each sentence delimiter, trimming whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if SENTENCE_DELIMITERS.contains(&c) {
            let end = i + c.len_utf8();
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Alpha.\n\nBeta.", 1000, 0);
        assert_eq!(chunks, vec!["Alpha.\n\nBeta."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("  \n\n \n\n", 1000, 200).is_empty());
    }

    #[test]
    fn test_normalize_fallbacks() {
        assert_eq!(
            ChunkParams::normalize(0, -1),
            ChunkParams {
                target_size: 1000,
                overlap: 200
            }
        );
        assert_eq!(ChunkParams::normalize(100, 100).overlap, 20);
        assert_eq!(ChunkParams::normalize(100, -1).overlap, 20);
        assert_eq!(ChunkParams::normalize(100, 0).overlap, 0);
        assert_eq!(ChunkParams::normalize(-5, -5).target_size, 1000);
    }

    #[test]
    fn test_paragraphs_exceed_limit_without_overlap_cover_input() {
        let paras: Vec<String> = (0..30).map(|i| format!("Paragraph number {}.", i)).collect();
        let text = paras.join("\n\n");
        let chunks = chunk_text(&text, 60, 0);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 60, "oversized chunk: {:?}", c);
        }
        assert_eq!(chunks.join("\n\n"), text);
    }

    #[test]
    fn test_overlap_seeds_next_chunk_with_trailing_words() {
        let text = "one two three four.\n\nfive six seven eight.\n\nnine ten eleven twelve.";
        let chunks = chunk_text(text, 40, 2);
        assert_eq!(chunks.len(), 3);
        for pair in chunks.windows(2) {
            let prev_words: Vec<&str> = pair[0].split_whitespace().collect();
            let tail = prev_words[prev_words.len() - 2..].join(" ");
            assert!(
                pair[1].starts_with(&tail),
                "{:?} does not start with {:?}",
                pair[1],
                tail
            );
        }
    }

    #[test]
    fn test_paragraph_order_preserved() {
        let text = "Alpha beta.\n\nGamma delta.\n\nEpsilon zeta.\n\nEta theta.";
        let chunks = chunk_text(text, 26, 1);
        let joined = chunks.join(" ");
        let positions: Vec<usize> = ["Alpha", "Gamma", "Epsilon", "Eta"]
            .iter()
            .map(|w| joined.find(w).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_long_paragraph_splits_on_sentences() {
        let text = "First sentence here. Second sentence here! Third one? Fourth。";
        let chunks = chunk_text(text, 25, 0);
        assert_eq!(
            chunks,
            vec![
                "First sentence here.",
                "Second sentence here!",
                "Third one? Fourth。"
            ]
        );
    }

    #[test]
    fn test_oversized_sentence_emitted_verbatim() {
        let long = "word ".repeat(40);
        let text = format!("Short one. {}end.", long);
        let chunks = chunk_text(&text, 50, 0);
        assert_eq!(chunks[0], "Short one.");
        assert_eq!(chunks[1], format!("{}end.", long).trim());
        assert!(chunks[1].chars().count() > 50);
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "你好世界。这是第二句话。第三句。";
        let chunks = chunk_text(text, 6, 0);
        assert_eq!(chunks, vec!["你好世界。", "这是第二句话。", "第三句。"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        assert_eq!(chunk_text(text, 12, 1), chunk_text(text, 12, 1));
    }
}
