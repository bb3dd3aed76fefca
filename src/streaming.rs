/// Client-side "typing" effect for completed answers.
///
/// The backend returns the whole answer at once; this module reveals it a few
/// words at a time with a fixed pause between chunks. The chunks, joined,
/// reproduce the original text exactly.
use std::time::Duration;

use thiserror::Error;

fn default_words_per_chunk() -> usize {
    2
}

fn default_delay_ms() -> u64 {
    30
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StreamingError {
    #[error("words_per_chunk must be positive, got {0}")]
    InvalidChunkSize(usize),
}

/// Chunking and pacing of the typing effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingOptions {
    pub words_per_chunk: usize,
    pub delay_ms: u64,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            words_per_chunk: default_words_per_chunk(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl StreamingOptions {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    fn validate(&self) -> Result<(), StreamingError> {
        if self.words_per_chunk == 0 {
            return Err(StreamingError::InvalidChunkSize(self.words_per_chunk));
        }
        Ok(())
    }
}

/// Split `text` into the chunks the typing effect would emit.
///
/// Words are separated on single spaces (runs of spaces yield empty words, so
/// spacing survives). Every chunk but the last carries one trailing space.
/// Empty text yields no chunks.
pub fn chunk_words(text: &str, words_per_chunk: usize) -> Result<Vec<String>, StreamingError> {
    if words_per_chunk == 0 {
        return Err(StreamingError::InvalidChunkSize(words_per_chunk));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let words: Vec<&str> = text.split(' ').collect();
    let total = words.chunks(words_per_chunk).len();

    Ok(words
        .chunks(words_per_chunk)
        .enumerate()
        .map(|(i, group)| {
            let mut chunk = group.join(" ");
            if i + 1 < total {
                chunk.push(' ');
            }
            chunk
        })
        .collect())
}

/// Feed `text` to `on_chunk` a few words at a time.
///
/// Sleeps `options.delay_ms` between chunks but not after the last one.
/// Fails before the first callback when `words_per_chunk` is zero.
pub async fn simulate_streaming<F>(
    text: &str,
    mut on_chunk: F,
    options: StreamingOptions,
) -> Result<(), StreamingError>
where
    F: FnMut(&str),
{
    let chunks = chunk_words(text, options.words_per_chunk)?;
    let delay = options.delay();

    let mut iter = chunks.iter().peekable();
    while let Some(chunk) = iter.next() {
        on_chunk(chunk.as_str());
        if iter.peek().is_some() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(())
}

/// Total time [`simulate_streaming`] spends waiting for `text`.
///
/// One delay per gap between chunks; no delay after the last chunk.
pub fn estimate_streaming_duration(
    text: &str,
    options: StreamingOptions,
) -> Result<Duration, StreamingError> {
    options.validate()?;
    if text.is_empty() {
        return Ok(Duration::ZERO);
    }

    let word_count = text.split(' ').count();
    let chunk_count = word_count.div_ceil(options.words_per_chunk);
    let gaps = u32::try_from(chunk_count.saturating_sub(1)).unwrap_or(u32::MAX);
    Ok(options.delay().saturating_mul(gaps))
}

// ── Tests ────────────────────────────────────────────────────────────
