//! Rolling observation windows.
//!
//! Provides a fixed-capacity FIFO buffer and the two-resolution window store
//! (short-term and long-term) fed by a single observation stream.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single timestamped market reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observed price (expected positive, not enforced)
    pub price: f64,

    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,

    /// Traded volume, when the source reports one
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Observation {
    /// Create an observation without volume.
    pub fn new(price: f64, timestamp_ms: i64) -> Self {
        Self {
            price,
            timestamp_ms,
            volume: None,
        }
    }

    /// Create an observation carrying a volume reading.
    pub fn with_volume(price: f64, timestamp_ms: i64, volume: f64) -> Self {
        Self {
            price,
            timestamp_ms,
            volume: Some(volume),
        }
    }
}

/// A generic rolling buffer with fixed capacity.
///
/// Pushing into a full buffer evicts the oldest element first, so the
/// contents always stay ordered oldest to newest.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// Create a new rolling buffer with the specified capacity.
    ///
    /// # Example
    /// ```
    /// use ash_projection::RollingBuffer;
    /// let buffer: RollingBuffer<f64> = RollingBuffer::new(30);
    /// assert_eq!(buffer.capacity(), 30);
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a new element, evicting the oldest one when at capacity.
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    /// Insert older elements ahead of the current contents.
    ///
    /// `values` must be ordered oldest to newest. Only as many of the newest
    /// values as fit in the remaining capacity are kept; existing elements
    /// are never evicted.
    ///
    /// # Arguments
    /// * `values` - Elements older than everything already buffered
    ///
    /// # Returns
    /// Number of elements inserted
    pub fn prepend(&mut self, values: Vec<T>) -> usize {
        let room = self.capacity.saturating_sub(self.buffer.len());
        let skip = values.len().saturating_sub(room);
        let mut inserted = 0;
        for value in values.into_iter().skip(skip).rev() {
            self.buffer.push_front(value);
            inserted += 1;
        }
        inserted
    }

    /// Get the current number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if the buffer is at full capacity.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    /// Get the buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all elements from the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Oldest buffered element.
    pub fn first(&self) -> Option<&T> {
        self.buffer.front()
    }

    /// Most recently pushed element.
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }

    /// Get an iterator over all elements (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }
}

impl<T: Clone> RollingBuffer<T> {
    /// Copy all elements out (oldest to newest).
    pub fn to_vec(&self) -> Vec<T> {
        self.buffer.iter().cloned().collect()
    }
}

/// Outcome of a long-window history backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backfill {
    /// Readings placed in the long window
    pub inserted: usize,

    /// Readings not older than the data already held
    pub skipped: usize,
}

/// Short-term and long-term windows fed by the same observation stream.
///
/// Snapshots are independent copies; callers never hold a reference into the
/// live windows.
#[derive(Debug, Clone)]
pub struct WindowStore {
    short: RollingBuffer<Observation>,
    long: RollingBuffer<Observation>,

    /// Observations whose timestamp did not advance past the previous one
    out_of_order: u64,
}

impl WindowStore {
    /// Create a store with the given short and long capacities.
    pub fn new(short_capacity: usize, long_capacity: usize) -> Self {
        Self {
            short: RollingBuffer::new(short_capacity),
            long: RollingBuffer::new(long_capacity),
            out_of_order: 0,
        }
    }

    /// Append to both windows. Non-monotonic timestamps are accepted as-is.
    ///
    /// Returns `false` when the observation's timestamp does not advance past
    /// the newest observation already held.
    pub fn push(&mut self, observation: Observation) -> bool {
        let newest = self
            .long
            .last()
            .or_else(|| self.short.last())
            .map(|o| o.timestamp_ms);
        let advances = newest.map_or(true, |t| observation.timestamp_ms > t);
        if !advances {
            self.out_of_order += 1;
        }

        self.short.push(observation);
        self.long.push(observation);
        advances
    }

    /// Insert historical readings into the long window only, as its oldest data.
    ///
    /// History is sorted by timestamp and placed ahead of the existing
    /// contents. Readings not strictly older than the oldest observation
    /// already held are skipped and counted as out of order. When the window
    /// lacks room, the newest history readings that fit are kept and live
    /// observations are never evicted.
    ///
    /// # Arguments
    /// * `observations` - Historical readings, in any order
    ///
    /// # Returns
    /// Counts of inserted and skipped readings
    pub fn backfill_long<I>(&mut self, observations: I) -> Backfill
    where
        I: IntoIterator<Item = Observation>,
    {
        let oldest = self.long.first().map(|o| o.timestamp_ms);
        let (mut history, rejected): (Vec<Observation>, Vec<Observation>) = observations
            .into_iter()
            .partition(|o| oldest.map_or(true, |t| o.timestamp_ms < t));
        history.sort_by_key(|o| o.timestamp_ms);

        let skipped = rejected.len();
        self.out_of_order += skipped as u64;
        let inserted = self.long.prepend(history);

        Backfill { inserted, skipped }
    }

    /// Copy of the short-term window (oldest to newest).
    pub fn snapshot_short(&self) -> Vec<Observation> {
        self.short.to_vec()
    }

    /// Copy of the long-term window (oldest to newest).
    pub fn snapshot_long(&self) -> Vec<Observation> {
        self.long.to_vec()
    }

    /// Clear both windows and the out-of-order counter.
    pub fn reset(&mut self) {
        self.short.clear();
        self.long.clear();
        self.out_of_order = 0;
    }

    /// Number of observations in the short-term window.
    pub fn short_len(&self) -> usize {
        self.short.len()
    }

    /// Number of observations in the long-term window.
    pub fn long_len(&self) -> usize {
        self.long.len()
    }

    /// Observations accepted or skipped because their timestamp was out of order.
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order
    }
}
