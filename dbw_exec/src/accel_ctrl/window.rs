//! Fixed length history of samples

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// History of the last `N` samples, oldest first.
///
/// Starts filled with zeros, every push evicts the oldest sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingWindow<const N: usize> {
    samples: [f64; N],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<const N: usize> SlidingWindow<N> {
    pub fn new() -> Self {
        Self { samples: [0.0; N] }
    }

    /// Append a sample, dropping the oldest.
    pub fn push(&mut self, value: f64) {
        if N == 0 {
            return;
        }

        self.samples.rotate_left(1);
        self.samples[N - 1] = value;
    }

    /// Sample `i` places after the oldest.
    pub fn get(&self, i: usize) -> Option<f64> {
        self.samples.get(i).copied()
    }

    pub fn oldest(&self) -> f64 {
        self.samples.first().copied().unwrap_or(0.0)
    }

    pub fn newest(&self) -> f64 {
        self.samples.last().copied().unwrap_or(0.0)
    }

    /// The sample before the newest.
    pub fn previous(&self) -> f64 {
        match N {
            0 | 1 => 0.0,
            _ => self.samples[N - 2],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    /// Reset every sample to zero.
    pub fn clear(&mut self) {
        self.samples = [0.0; N];
    }
}

impl<const N: usize> Default for SlidingWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Serialize for SlidingWindow<N> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_slice().serialize(serializer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut w = SlidingWindow::<3>::new();
        assert_eq!(w.as_slice(), &[0.0, 0.0, 0.0]);

        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        assert_eq!(w.as_slice(), &[1.0, 2.0, 3.0]);

        w.push(4.0);
        assert_eq!(w.oldest(), 2.0);
        assert_eq!(w.previous(), 3.0);
        assert_eq!(w.newest(), 4.0);
        assert_eq!(w.get(3), None);

        w.clear();
        assert_eq!(w.newest(), 0.0);
    }
}
