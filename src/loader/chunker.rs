//! Character-window text chunking with overlap and sentence-boundary preference.

use crate::error::{AgribotError, Result};

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub max_chunk_size: usize,
    /// Characters repeated at the start of every chunk after the first.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            max_chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// The window must advance on every step: a sentence break is only taken past the
    /// midpoint, so the overlap may not exceed half the window.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(AgribotError::InvalidInput(
                "max_chunk_size must be positive".to_string(),
            ));
        }
        if self.overlap > self.max_chunk_size / 2 {
            return Err(AgribotError::InvalidInput(format!(
                "overlap ({}) must not exceed half of max_chunk_size ({})",
                self.overlap, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Split `text` into chunks of at most `config.max_chunk_size` characters.
///
/// Texts that fit are returned whole. Longer texts are cut into windows that start
/// `overlap` characters before the previous window's end and, when a `.` exists in the
/// second half of the window, end right after the last one.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let max = config.max_chunk_size;

    if chars.len() <= max {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut cursor = 0;

    while cursor < chars.len() {
        let start = if cursor > 0 {
            cursor.saturating_sub(config.overlap)
        } else {
            0
        };

        let mut end = (start + max).min(chars.len());
        if end < chars.len() {
            if let Some(period) = chars[start..end].iter().rposition(|&c| c == '.') {
                let period = start + period;
                if period > start + max / 2 {
                    end = period + 1;
                }
            }
        }

        chunks.push(chars[start..end].iter().collect());
        cursor = end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let config = ChunkingConfig::default();
        let text = "Drip irrigation saves water.";
        assert_eq!(chunk_text(text, &config), vec![text.to_string()]);

        let exact: String = "x".repeat(1000);
        assert_eq!(chunk_text(&exact, &config), vec![exact.clone()]);

        assert_eq!(chunk_text("", &config), vec![String::new()]);
    }

    #[test]
    fn test_long_text_respects_bounds_and_is_lossless() {
        let config = ChunkingConfig::default();
        let sentence = "Farmers should check soil moisture before every irrigation cycle. ";
        let text = sentence.repeat(60);

        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= config.max_chunk_size);
        }
        assert_eq!(reassemble(&chunks, config.overlap), text);
    }

    #[test]
    fn test_prefers_sentence_boundary_past_midpoint() {
        let config = ChunkingConfig::new(100, 20).unwrap();
        // Period at index 79, well past the midpoint of the first window.
        let mut text = "a".repeat(79);
        text.push('.');
        text.push_str(&"b".repeat(100));

        let chunks = chunk_text(&text, &config);
        assert_eq!(chunks[0].chars().count(), 80);
        assert!(chunks[0].ends_with('.'));
        assert_eq!(reassemble(&chunks, config.overlap), text);
    }

    #[test]
    fn test_ignores_boundary_before_midpoint() {
        let config = ChunkingConfig::new(100, 20).unwrap();
        let mut text = "a".repeat(10);
        text.push('.');
        text.push_str(&"b".repeat(150));

        let chunks = chunk_text(&text, &config);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(reassemble(&chunks, config.overlap), text);
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let config = ChunkingConfig::new(50, 10).unwrap();
        let text = "सिंचाई का समय सुबह जल्दी रखें। ".repeat(10);

        let chunks = chunk_text(&text, &config);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
        assert_eq!(reassemble(&chunks, config.overlap), text);
    }

    #[test]
    fn test_lossless_across_window_shapes() {
        let text = "Mulch keeps roots cool. Rotate legumes with cereals to fix nitrogen. \
                    Test soil pH every season. Avoid flooding young seedlings."
            .repeat(25);
        for (max, overlap) in [(40, 0), (64, 32), (120, 7), (500, 200), (1000, 200)] {
            let config = ChunkingConfig::new(max, overlap).unwrap();
            let chunks = chunk_text(&text, &config);
            assert!(chunks.iter().all(|c| c.chars().count() <= max));
            assert_eq!(reassemble(&chunks, overlap), text, "max={max} overlap={overlap}");
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(100, 51).is_err());
        assert!(ChunkingConfig::new(100, 50).is_ok());
    }
}
