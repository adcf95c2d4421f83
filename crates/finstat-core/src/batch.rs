//! Fixed-size batching of identifier lists.
//!
//! Providers cap how many identifiers a single request may carry. [`batches`]
//! splits a slice into contiguous chunks no longer than that cap.

use std::iter::FusedIterator;
use std::slice::Chunks;

use crate::error::{FinstatError, Result};

/// Lazy iterator over contiguous batches of a slice.
///
/// The iterator is `Clone`, so a caller can restart from the first batch by
/// keeping a copy around.
#[derive(Debug, Clone)]
pub struct Batches<'a, T> {
    chunks: Chunks<'a, T>,
}

/// Splits `items` into batches of at most `limit` elements, preserving order.
///
/// An empty slice yields no batches at all.
///
/// # Errors
/// Returns [`FinstatError::InvalidParameter`] if `limit` is zero.
pub fn batches<T>(items: &[T], limit: usize) -> Result<Batches<'_, T>> {
    if limit == 0 {
        return Err(FinstatError::InvalidParameter(
            "batch limit must be positive".to_string(),
        ));
    }
    Ok(Batches {
        chunks: items.chunks(limit),
    })
}

impl<'a, T> Iterator for Batches<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T> ExactSizeIterator for Batches<'_, T> {}

impl<T> FusedIterator for Batches<'_, T> {}
