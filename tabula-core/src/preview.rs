//! Row caps for previews and inline parses.

use thiserror::Error;

/// Rows returned when a parse request names no limit.
pub const DEFAULT_PREVIEW_ROWS: usize = 1_000;
/// Largest limit a parse request may ask for.
pub const MAX_PREVIEW_ROWS: usize = 10_000;

/// Errors raised by [`PreviewLimit::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreviewLimitError {
    /// A limit of zero rows was requested.
    #[error("limit must be greater than zero")]
    Zero,
    /// The limit exceeds the configured maximum.
    #[error("limit {requested} exceeds the maximum of {max} rows")]
    TooLarge {
        /// Requested limit.
        requested: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// A validated row limit in `1..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewLimit(usize);

impl PreviewLimit {
    /// Validate `requested` against `max`.
    ///
    /// # Examples
    /// ```
    /// use tabula_core::{PreviewLimit, PreviewLimitError};
    ///
    /// assert_eq!(PreviewLimit::new(5, 10).map(PreviewLimit::get), Ok(5));
    /// assert_eq!(PreviewLimit::new(0, 10), Err(PreviewLimitError::Zero));
    /// ```
    pub const fn new(requested: usize, max: usize) -> Result<Self, PreviewLimitError> {
        if requested == 0 {
            return Err(PreviewLimitError::Zero);
        }
        if requested > max {
            return Err(PreviewLimitError::TooLarge { requested, max });
        }
        Ok(Self(requested))
    }

    /// The limit as a row count.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// How many rows a normalizer may keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCap {
    /// Keep at most this many rows.
    Limited(usize),
    /// Keep every row.
    Unbounded,
}

impl RowCap {
    /// Maximum number of rows, if any.
    #[must_use]
    pub const fn limit(self) -> Option<usize> {
        match self {
            Self::Limited(limit) => Some(limit),
            Self::Unbounded => None,
        }
    }

    /// Whether another row may be kept once `kept` rows are held.
    #[must_use]
    pub const fn admits(self, kept: usize) -> bool {
        match self {
            Self::Limited(limit) => kept < limit,
            Self::Unbounded => true,
        }
    }

    /// Whether `available` rows overflow the cap.
    #[must_use]
    pub const fn truncates(self, available: usize) -> bool {
        match self {
            Self::Limited(limit) => available > limit,
            Self::Unbounded => false,
        }
    }

    /// Keep at most the capped number of items, reporting whether any were cut.
    ///
    /// # Examples
    /// ```
    /// use tabula_core::RowCap;
    ///
    /// let (rows, truncated) = RowCap::Limited(2).apply(vec![1, 2, 3]);
    /// assert_eq!(rows, [1, 2]);
    /// assert!(truncated);
    /// ```
    #[must_use]
    pub fn apply<T>(self, mut items: Vec<T>) -> (Vec<T>, bool) {
        let truncated = self.truncates(items.len());
        if let Self::Limited(limit) = self {
            items.truncate(limit);
        }
        (items, truncated)
    }
}

impl From<PreviewLimit> for RowCap {
    fn from(limit: PreviewLimit) -> Self {
        Self::Limited(limit.get())
    }
}
