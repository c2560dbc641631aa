use std::collections::VecDeque;
use log::warn;
use crate::drivers::{Sample, StreamError};
/// Flattened, read-only view of a window for the chart.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowFrame {
    pub channel_labels: Vec<String>,
    pub timestamps: Vec<f64>,
    pub values: Vec<Vec<f64>>, // channels x samples
}
impl WindowFrame {
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
/// Bounded, time-ordered buffer of samples with a fixed channel set.
#[derive(Clone, Debug)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    channel_labels: Vec<String>,
    capacity: usize,
}
impl SampleWindow {
    pub fn new(channel_labels: Vec<String>, capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::InvalidCapacity);
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            channel_labels,
            capacity,
        })
    }
    pub fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.samples.back().map(|s| s.timestamp)
    }
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator {
        self.samples.iter()
    }
    /// Appends every sample strictly newer than the current newest one, then
    /// evicts from the oldest end down to capacity. Returns the accepted
    /// samples, including any that were evicted again by the same batch.
    pub fn push_batch(&mut self, mut batch: Vec<Sample>) -> Vec<Sample> {
        if batch.is_empty() {
            return Vec::new();
        }
        batch.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let mut newest = self.latest_timestamp();
        let mut accepted = Vec::new();
        for sample in batch {
            if sample.num_channels() != self.channel_labels.len() {
                warn!(
                    "dropping sample at t={}: expected {} channels, got {}",
                    sample.timestamp,
                    self.channel_labels.len(),
                    sample.num_channels()
                );
                continue;
            }
            if newest.is_some_and(|t| sample.timestamp <= t) || sample.timestamp.is_nan() {
                continue;
            }
            newest = Some(sample.timestamp);
            accepted.push(sample.clone());
            self.samples.push_back(sample);
        }
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        accepted
    }
    /// Frame of the newest `count` samples, oldest first.
    pub fn snapshot(&self, count: usize) -> WindowFrame {
        let skip = self.samples.len().saturating_sub(count);
        let tail: Vec<&Sample> = self.samples.iter().skip(skip).collect();
        let values = (0..self.channel_labels.len())
            .map(|idx| tail.iter().map(|s| s.values[idx]).collect())
            .collect();
        WindowFrame {
            channel_labels: self.channel_labels.clone(),
            timestamps: tail.iter().map(|s| s.timestamp).collect(),
            values,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn window(capacity: usize) -> SampleWindow {
        SampleWindow::new(vec!["a".into(), "b".into()], capacity).unwrap()
    }
    fn sample(t: f64) -> Sample {
        Sample::new(t, vec![t, t * 10.0])
    }
    fn timestamps(w: &SampleWindow) -> Vec<f64> {
        w.iter().map(|s| s.timestamp).collect()
    }
    fn pushed(w: &mut SampleWindow, batch: Vec<Sample>) -> usize {
        w.push_batch(batch).len()
    }
    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            SampleWindow::new(vec![], 0),
            Err(StreamError::InvalidCapacity)
        ));
    }
    #[test]
    fn keeps_suffix_of_prior_and_batch() {
        let mut w = window(4);
        assert_eq!(pushed(&mut w, (1..=3).map(|t| sample(t as f64)).collect()), 3);
        assert_eq!(pushed(&mut w, (4..=6).map(|t| sample(t as f64)).collect()), 3);
        assert_eq!(w.len(), 4);
        assert_eq!(timestamps(&w), vec![3.0, 4.0, 5.0, 6.0]);
    }
    #[test]
    fn replayed_batch_is_ignored() {
        let mut w = window(10);
        w.push_batch(vec![sample(1.0), sample(2.0), sample(3.0)]);
        let before = timestamps(&w);
        assert_eq!(pushed(&mut w, vec![sample(1.0), sample(3.0), sample(2.5)]), 0);
        assert_eq!(timestamps(&w), before);
    }
    #[test]
    fn overlapping_batch_only_appends_newer_rows() {
        let mut w = window(10);
        w.push_batch(vec![sample(1.0), sample(2.0)]);
        assert_eq!(pushed(&mut w, vec![sample(1.0), sample(2.0), sample(3.0)]), 1);
        assert_eq!(timestamps(&w), vec![1.0, 2.0, 3.0]);
    }
    #[test]
    fn unordered_batch_with_duplicates_is_sorted_and_deduplicated() {
        let mut w = window(10);
        assert_eq!(pushed(&mut w, vec![sample(3.0), sample(1.0), sample(3.0)]), 2);
        assert_eq!(timestamps(&w), vec![1.0, 3.0]);
    }
    #[test]
    fn eviction_is_fifo() {
        let mut w = window(3);
        w.push_batch(vec![sample(1.0), sample(2.0), sample(3.0)]);
        w.push_batch(vec![sample(4.0)]);
        assert_eq!(timestamps(&w), vec![2.0, 3.0, 4.0]);
    }
    #[test]
    fn accepted_rows_survive_eviction_in_the_return_value() {
        let mut w = window(2);
        let accepted = w.push_batch((1..=5).map(|t| sample(t as f64)).collect());
        let accepted: Vec<f64> = accepted.iter().map(|s| s.timestamp).collect();
        assert_eq!(accepted, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(timestamps(&w), vec![4.0, 5.0]);
    }
    #[test]
    fn mismatched_sample_is_dropped() {
        let mut w = window(3);
        assert_eq!(pushed(&mut w, vec![Sample::new(1.0, vec![1.0])]), 0);
        assert!(w.is_empty());
    }
    #[test]
    fn snapshot_is_column_major_tail() {
        let mut w = window(5);
        w.push_batch((1..=5).map(|t| sample(t as f64)).collect());
        let frame = w.snapshot(2);
        assert_eq!(frame.timestamps, vec![4.0, 5.0]);
        assert_eq!(frame.values, vec![vec![4.0, 5.0], vec![40.0, 50.0]]);
        assert_eq!(w.snapshot(100).timestamps.len(), 5);
    }
}
