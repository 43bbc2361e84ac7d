//! Trailing-row buffer shared by every stateful stage.
//!
//! Every buffered stage follows the same three-step discipline:
//!
//! 1. `window(input)` prepends the whole buffer to the input, so each row of a
//!    multi-row batch sees the same lookback it would have seen in one batch.
//! 2. The stage computes on the window and keeps the last `input.n_rows()` rows.
//! 3. `store(window)` replaces the buffer with the trailing `capacity` rows.
//!
//! The buffer is always replaced, never appended to, so its length is capped
//! at `capacity` regardless of call size. An empty buffer is not an error:
//! rows without enough history come out as NaN and the aligner removes them.

use super::error::PipelineError;
use super::table::FeatureTable;
use crate::domain::PriceTable;

/// Tables a [`TailBuffer`] can hold.
pub trait RowTable: Clone {
    fn n_rows(&self) -> usize;
    fn tail(&self, n: usize) -> Self;
    fn vstack(&self, other: &Self) -> Result<Self, PipelineError>;
}

impl RowTable for PriceTable {
    fn n_rows(&self) -> usize {
        self.len()
    }

    fn tail(&self, n: usize) -> Self {
        self.split_tail(n).1
    }

    fn vstack(&self, other: &Self) -> Result<Self, PipelineError> {
        let mut bars = self.bars().to_vec();
        bars.extend_from_slice(other.bars());
        Ok(PriceTable::new(bars))
    }
}

impl RowTable for FeatureTable {
    fn n_rows(&self) -> usize {
        FeatureTable::n_rows(self)
    }

    fn tail(&self, n: usize) -> Self {
        FeatureTable::tail(self, n)
    }

    fn vstack(&self, other: &Self) -> Result<Self, PipelineError> {
        FeatureTable::vstack(self, other)
    }
}

#[derive(Debug, Clone)]
pub struct TailBuffer<T> {
    capacity: usize,
    rows: Option<T>,
}

impl<T: RowTable> TailBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rows: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.as_ref().map_or(0, |r| r.n_rows())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffered rows followed by `input`, plus the number of leading rows
    /// the caller must strip from its result.
    pub fn window(&self, input: &T) -> Result<(T, usize), PipelineError> {
        match &self.rows {
            Some(rows) => Ok((rows.vstack(input)?, rows.n_rows())),
            None => Ok((input.clone(), 0)),
        }
    }

    /// Replace the buffer with the trailing `capacity` rows of `window`.
    pub fn store(&mut self, window: &T) {
        self.rows = Some(window.tail(self.capacity));
    }

    pub fn clear(&mut self) {
        self.rows = None;
    }
}
