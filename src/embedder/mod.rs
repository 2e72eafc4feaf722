//! Embedding backends and the caller-owned embedding memo cache.
//!
//! The ranker treats the embedder as a read-only shared resource: any type
//! implementing [`Embedder`] must be safely callable from multiple scoring
//! workers at once. Backends signal unavailability through [`EmbedError`];
//! the ranker reacts by degrading to the keyword strategy instead of failing
//! the run.

pub mod openai;

use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Maps arbitrary text to a fixed-length numeric vector.
pub trait Embedder: Send + Sync {
    /// Embeds a single string.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Errors surfaced by embedding backends.
#[derive(Debug)]
pub enum EmbedError {
    /// The backend is offline, rate-limited past its retry budget, or
    /// otherwise unable to serve requests right now.
    Unavailable(String),
    /// The backend answered with something the client could not use.
    InvalidResponse(String),
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "embedding backend unavailable: {reason}"),
            Self::InvalidResponse(reason) => write!(f, "invalid embedding response: {reason}"),
        }
    }
}

impl std::error::Error for EmbedError {}

/// Caller-owned memo cache for embedding vectors.
///
/// Explicitly passed into the ranker rather than living as process-wide state,
/// so repeated runs over the same corpus skip recomputation while tests stay
/// hermetic. Interior locking keeps it shareable across scoring workers.
pub struct EmbeddingCache {
    inner: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Builds a cache holding up to `capacity` embeddings.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is nonzero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached vector for `text`, computing it through `embedder`
    /// on a miss.
    pub fn get_or_embed(&self, embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, EmbedError> {
        {
            let mut cache = self.inner.lock().expect("embedding cache poisoned");
            if let Some(hit) = cache.get(text) {
                return Ok(hit.clone());
            }
        }
        // Embed outside the lock; backends may block on the network.
        let vector = embedder.embed(text)?;
        let mut cache = self.inner.lock().expect("embedding cache poisoned");
        cache.put(text.to_string(), vector.clone());
        Ok(vector)
    }

    /// Number of vectors currently cached.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("embedding cache poisoned").len()
    }

    /// True when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[test]
    fn cache_memoizes_repeated_texts() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let cache = EmbeddingCache::new(8);
        let first = cache.get_or_embed(&embedder, "methods").expect("embed");
        let second = cache.get_or_embed(&embedder, "methods").expect("embed");
        assert_eq!(first, second);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    struct OfflineEmbedder;

    impl Embedder for OfflineEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn unavailable_backend_propagates_without_caching() {
        let cache = EmbeddingCache::new(8);
        let err = cache
            .get_or_embed(&OfflineEmbedder, "anything")
            .expect_err("offline backend");
        assert!(matches!(err, EmbedError::Unavailable(_)));
        assert!(cache.is_empty());
    }
}
