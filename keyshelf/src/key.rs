use crate::errors::{ErrorKind, ShelfError};
use thiserror::Error;

/// Literal separator placed between the segments of a composite key.
pub const KEY_SEPARATOR: &str = "|+|";

/// Largest number of segments a composite key may have.
pub const MAX_KEY_SEGMENTS: usize = 3;

/// Largest physical key the engine accepts, in bytes.
pub const MAX_KEY_BYTES: usize = u16::MAX as usize;

/// Error type for composite key construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyError {
    /// No segments were supplied
    #[error("Composite key needs at least one segment")]
    NoSegments,
    /// More than [`MAX_KEY_SEGMENTS`] segments were supplied
    #[error("Composite key has {0} segments, at most 3 are allowed")]
    TooManySegments(usize),
    /// The joined key is the empty string
    #[error("Physical key must not be empty")]
    EmptyKey,
    /// The joined key exceeds [`MAX_KEY_BYTES`]
    #[error("Physical key is {0} bytes long, at most 65535 are allowed")]
    KeyTooLong(usize),
}

impl From<KeyError> for ShelfError {
    /// Converts a `KeyError` to a `ShelfError` with InvalidKey kind.
    fn from(err: KeyError) -> Self {
        ShelfError::new(&err.to_string(), ErrorKind::InvalidKey)
    }
}

/// A logical key made of 1 to 3 string segments.
///
/// The physical key stored in the engine is the segments joined with
/// [`KEY_SEPARATOR`]. Segments are not escaped, so `("a", "b")` and the single
/// segment `"a|+|b"` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    segments: Vec<String>,
}

impl CompositeKey {
    /// Builds a key from an ordered sequence of segments.
    ///
    /// Fails when the sequence is empty, longer than [`MAX_KEY_SEGMENTS`],
    /// joins to an empty string, or joins to more than [`MAX_KEY_BYTES`].
    pub fn new<I, S>(segments: I) -> Result<CompositeKey, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        match segments.len() {
            0 => return Err(KeyError::NoSegments),
            n if n > MAX_KEY_SEGMENTS => return Err(KeyError::TooManySegments(n)),
            _ => {}
        }

        let key = CompositeKey { segments };
        let len = key.physical_len();
        if len == 0 {
            return Err(KeyError::EmptyKey);
        }
        if len > MAX_KEY_BYTES {
            return Err(KeyError::KeyTooLong(len));
        }
        Ok(key)
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the physical key: segments joined with [`KEY_SEPARATOR`].
    #[inline]
    pub fn joined(&self) -> String {
        self.segments.join(KEY_SEPARATOR)
    }

    fn physical_len(&self) -> usize {
        let payload: usize = self.segments.iter().map(String::len).sum();
        payload + KEY_SEPARATOR.len() * (self.segments.len() - 1)
    }
}

/// Splits a physical key back into its segments.
///
/// The inverse of [`CompositeKey::joined`] only when no segment contained the
/// separator itself.
pub fn split_key(physical: &str) -> Vec<&str> {
    physical.split(KEY_SEPARATOR).collect()
}

/// Conversion into a validated [`CompositeKey`].
///
/// Implemented for single strings, 2- and 3-tuples of strings, and slices or
/// vectors of segments, so one accessor method covers every key arity.
pub trait IntoCompositeKey {
    fn into_composite_key(self) -> Result<CompositeKey, KeyError>;
}

impl IntoCompositeKey for CompositeKey {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        Ok(self)
    }
}

impl IntoCompositeKey for &CompositeKey {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        Ok(self.clone())
    }
}

impl IntoCompositeKey for &str {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new([self])
    }
}

impl IntoCompositeKey for String {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new([self])
    }
}

impl IntoCompositeKey for &String {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new([self.as_str()])
    }
}

impl<A, B> IntoCompositeKey for (A, B)
where
    A: Into<String>,
    B: Into<String>,
{
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new([self.0.into(), self.1.into()])
    }
}

impl<A, B, C> IntoCompositeKey for (A, B, C)
where
    A: Into<String>,
    B: Into<String>,
    C: Into<String>,
{
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new([self.0.into(), self.1.into(), self.2.into()])
    }
}

impl IntoCompositeKey for &[&str] {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new(self.iter().copied())
    }
}

impl IntoCompositeKey for &[String] {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new(self.iter().cloned())
    }
}

impl IntoCompositeKey for Vec<String> {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new(self)
    }
}

impl IntoCompositeKey for Vec<&str> {
    #[inline]
    fn into_composite_key(self) -> Result<CompositeKey, KeyError> {
        CompositeKey::new(self)
    }
}
