//! Data buffers for rendering
//!
//! Inbound feed messages and the frame loop run independently. Each message
//! builds a complete new buffer and swaps it into a [`SnapshotStore`]; the
//! frame loop reads whatever snapshot is current when it wakes. Intermediate
//! snapshots may never be drawn, which is fine: latest wins.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("sample and value lengths differ ({samples} vs {values})")]
    LengthMismatch { samples: usize, values: usize },
    #[error("row {row} has {found} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("{axis} axis has {found} entries, matrix has {expected}")]
    AxisMismatch {
        axis: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Latest time-domain window received from the feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    /// Sample positions (seconds in the producer's time base)
    pub samples: Vec<f64>,
    /// Signal values, scaled against their own max magnitude when drawn
    pub values: Vec<f64>,
    pub received_at: Option<jiff::Timestamp>,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f64>, values: Vec<f64>) -> Result<Self, BufferError> {
        if samples.len() != values.len() {
            return Err(BufferError::LengthMismatch {
                samples: samples.len(),
                values: values.len(),
            });
        }
        ensure_finite(&samples, "samples")?;
        ensure_finite(&values, "values")?;

        Ok(Self {
            samples,
            values,
            received_at: None,
        })
    }

    /// Stamp the buffer with the current time
    pub fn stamped(mut self) -> Self {
        self.received_at = Some(jiff::Timestamp::now());
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() || self.values.is_empty()
    }

    /// (min, max, mean) of the signal values, for diagnostics
    pub fn value_stats(&self) -> Option<(f64, f64, f64)> {
        if self.values.is_empty() {
            return None;
        }
        let (min, max) = min_max(&self.values)?;
        let mean = self.values.iter().sum::<f64>() / self.values.len() as f64;
        Some((min, max, mean))
    }
}

/// Rectangular magnitude matrix, rows = frequency bins (0 = lowest),
/// columns = time bins (0 = earliest)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramMatrix {
    rows: Vec<Vec<f64>>,
    cols: usize,
}

impl SpectrogramMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, BufferError> {
        let cols = rows.first().map_or(0, Vec::len);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(BufferError::Ragged {
                    row: i,
                    expected: cols,
                    found: row.len(),
                });
            }
            ensure_finite(row, "spectrogram")?;
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True when there is nothing to draw: no rows, or rows with no columns
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols == 0
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.rows[row]
    }

    /// Global (min, max) over every cell
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|row| min_max(row))
            .reduce(|(lo, hi), (row_lo, row_hi)| (lo.min(row_lo), hi.max(row_hi)))
    }
}

/// A spectrogram matrix with its axes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramFrame {
    pub matrix: SpectrogramMatrix,
    /// Ascending Hz values, one per row (may be empty when the producer omits it)
    pub frequencies: Vec<f64>,
    /// Ascending seconds, one per column (may be empty)
    pub times: Vec<f64>,
    pub received_at: Option<jiff::Timestamp>,
}

impl SpectrogramFrame {
    pub fn new(
        matrix: SpectrogramMatrix,
        frequencies: Vec<f64>,
        times: Vec<f64>,
    ) -> Result<Self, BufferError> {
        if !frequencies.is_empty() && frequencies.len() != matrix.rows() {
            return Err(BufferError::AxisMismatch {
                axis: "frequency",
                expected: matrix.rows(),
                found: frequencies.len(),
            });
        }
        if !times.is_empty() && times.len() != matrix.cols() {
            return Err(BufferError::AxisMismatch {
                axis: "time",
                expected: matrix.cols(),
                found: times.len(),
            });
        }
        ensure_finite(&frequencies, "frequencies")?;
        ensure_finite(&times, "times")?;

        Ok(Self {
            matrix,
            frequencies,
            times,
            received_at: None,
        })
    }

    pub fn stamped(mut self) -> Self {
        self.received_at = Some(jiff::Timestamp::now());
        self
    }

    /// (lowest, highest) frequency, falling back to 0..4000 Hz without an axis
    pub fn frequency_range(&self) -> (f64, f64) {
        match (self.frequencies.first(), self.frequencies.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (0.0, 4000.0),
        }
    }

    /// Length of the analysed window in seconds (last time-axis entry)
    pub fn window_seconds(&self) -> Option<f64> {
        if self.times.len() > 1 {
            self.times.last().copied()
        } else {
            None
        }
    }
}

/// Latest-wins store: publishing swaps in a whole new snapshot
#[derive(Debug)]
pub struct SnapshotStore<T> {
    tx: watch::Sender<Arc<T>>,
}

impl<T: Default> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> SnapshotStore<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Replace the current snapshot
    pub fn publish(&self, value: T) {
        self.tx.send_replace(Arc::new(value));
    }

    /// Current snapshot
    pub fn latest(&self) -> Arc<T> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// The two buffers fed by the acoustic stream
#[derive(Debug, Default)]
pub struct FeedStores {
    pub waveform: SnapshotStore<SampleBuffer>,
    pub spectrogram: SnapshotStore<SpectrogramFrame>,
}

impl FeedStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop both snapshots, back to the empty initial state
    pub fn clear(&self) {
        self.waveform.publish(SampleBuffer::default());
        self.spectrogram.publish(SpectrogramFrame::default());
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn ensure_finite(values: &[f64], what: &'static str) -> Result<(), BufferError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(BufferError::NonFinite(what))
    }
}
