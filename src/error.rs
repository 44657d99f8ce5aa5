//! Error types for the stratacache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by cache operations. `NotFound` is the expected
//!   miss outcome; the codec variants come only from the compression
//!   decorator, and `FilteredOut` only from a live filter view.
//! - [`ConfigError`]: Returned when construction parameters are invalid
//!   (e.g. a bloom filter false-positive rate outside `(0, 1)`).
//!
//! ## Example Usage
//!
//! ```
//! use stratacache::error::CacheError;
//! use stratacache::policy::lru::LruCache;
//! use stratacache::traits::Cache;
//!
//! let mut cache: LruCache<&str, i32> = LruCache::new(2);
//! let err = cache.get(&"missing").unwrap_err();
//! assert!(err.is_not_found());
//! ```

use std::io;

use thiserror::Error;

/// Result alias used by every cache operation.
pub type CacheResult<T> = Result<T, CacheError>;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by [`Cache`](crate::traits::Cache) operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is absent, expired, or hidden by a view.
    #[error("key not found")]
    NotFound,

    /// The cache rejected an insert instead of evicting.
    ///
    /// None of the bundled strategies produce this; it is reserved for
    /// implementations that refuse writes under pressure.
    #[error("cache is full")]
    CacheFull,

    /// A live filter view refused a value that fails its predicate.
    #[error("value rejected by filter predicate")]
    FilteredOut,

    /// The value could not be encoded or decoded by the serializer.
    #[error("serialization failed: {0}")]
    Serialization(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The gzip encoder failed.
    #[error("compression failed: {0}")]
    Compression(#[source] io::Error),

    /// The stored payload is not a valid gzip stream.
    #[error("decompression failed: {0}")]
    Decompression(#[source] io::Error),
}

impl CacheError {
    /// Wraps any codec error as [`CacheError::Serialization`].
    pub fn serialization<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization(Box::new(err))
    }

    /// Returns `true` for [`CacheError::NotFound`].
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns `true` for errors produced by the compression decorator.
    pub fn is_codec(&self) -> bool {
        matches!(
            self,
            Self::Serialization(_) | Self::Compression(_) | Self::Decompression(_)
        )
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when construction parameters are invalid.
///
/// # Example
///
/// ```
/// use stratacache::ds::BloomFilter;
///
/// let err = BloomFilter::new(100, 1.5).unwrap_err();
/// assert!(err.to_string().contains("false positive rate"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}
