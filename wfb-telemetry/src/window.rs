use std::time::{Duration, Instant};

use crate::sample::Timestamped;

/// Sliding time window over a stream of timestamped samples.
///
/// Writes only append; the window invariant (every entry younger than the
/// window duration) is re-established lazily by calling [`evict`] before
/// each read.
///
/// [`evict`]: SampleWindow::evict
#[derive(Debug)]
pub struct SampleWindow<T> {
    samples: Vec<T>,
    duration: Duration,
}

impl<T: Timestamped> SampleWindow<T> {
    pub fn new(duration: Duration) -> Self {
        Self {
            samples: Vec::new(),
            duration,
        }
    }

    pub fn push(&mut self, sample: T) {
        self.samples.push(sample);
    }

    /// Drop every entry older than the window duration relative to `now`.
    pub fn evict(&mut self, now: Instant) {
        let duration = self.duration;
        self.samples
            .retain(|sample| now.duration_since(sample.timestamp()) <= duration);
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
