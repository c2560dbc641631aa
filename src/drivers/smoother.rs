use log::{debug, warn};
use crate::drivers::smooth_tail;
use crate::drivers::source::Batch;
use crate::drivers::{ChannelSelector, Sample, SampleWindow, StreamError, WindowFrame};
/// Owns one window of recent samples and derives smoothed scalars from it.
///
/// The window is created from the channel labels of the first non-empty batch;
/// later batches must carry the same labels.
pub struct StreamingSmoother {
    window: Option<SampleWindow>,
    capacity: usize,
    active: bool,
}
impl StreamingSmoother {
    pub fn new(capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::InvalidCapacity);
        }
        Ok(Self {
            window: None,
            capacity,
            active: true,
        })
    }
    pub fn window(&self) -> Option<&SampleWindow> {
        self.window.as_ref()
    }
    /// After teardown every batch is discarded.
    pub fn teardown(&mut self) {
        self.active = false;
    }
    /// Appends the strictly-newer samples of `batch` and returns them, even
    /// those the window could not keep.
    pub fn ingest(&mut self, batch: Batch) -> Vec<Sample> {
        if !self.active {
            debug!("discarding batch of {} after teardown", batch.samples.len());
            return Vec::new();
        }
        if batch.is_empty() {
            return Vec::new();
        }
        if let Err(err) = self.check_labels(&batch) {
            warn!("dropping batch: {err}");
            return Vec::new();
        }
        if self.window.is_none() {
            match SampleWindow::new(batch.channel_labels.clone(), self.capacity) {
                Ok(window) => self.window = Some(window),
                Err(err) => {
                    warn!("cannot create window: {err}");
                    return Vec::new();
                }
            }
        }
        let Some(window) = self.window.as_mut() else {
            return Vec::new();
        };
        window.push_batch(batch.samples)
    }
    fn check_labels(&self, batch: &Batch) -> Result<(), StreamError> {
        let Some(window) = &self.window else {
            return Ok(());
        };
        let expected = window.channel_labels();
        let same = expected.len() == batch.channel_labels.len()
            && expected
                .iter()
                .zip(&batch.channel_labels)
                .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if same {
            Ok(())
        } else {
            Err(StreamError::ChannelMismatch {
                expected: expected.len(),
                actual: batch.channel_labels.len(),
            })
        }
    }
    /// Resolves channel names against the window; `None` until the first batch.
    pub fn selector<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Option<Result<ChannelSelector, StreamError>> {
        self.window
            .as_ref()
            .map(|w| ChannelSelector::resolve(w.channel_labels(), names))
    }
    /// Mean of the last `k` derived values if fewer than `k` exist, otherwise
    /// their EMA. Zero when there is nothing to smooth.
    pub fn smoothed(&self, selector: &ChannelSelector, k: usize) -> f64 {
        let Some(window) = &self.window else {
            return 0.0;
        };
        let mut tail: Vec<f64> = window
            .iter()
            .rev()
            .filter_map(|s| selector.derive(s))
            .take(k)
            .collect();
        tail.reverse();
        smooth_tail(&tail, k)
    }
    /// The newest `count` samples, oldest first.
    pub fn recent(&self, count: usize) -> Vec<&Sample> {
        let Some(window) = &self.window else {
            return Vec::new();
        };
        let skip = window.len().saturating_sub(count);
        window.iter().skip(skip).collect()
    }
    pub fn frame(&self, count: usize) -> WindowFrame {
        self.window
            .as_ref()
            .map(|w| w.snapshot(count))
            .unwrap_or_default()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn bands() -> Vec<String> {
        vec!["attention".into()]
    }
    fn batch(points: &[(f64, f64)]) -> Batch {
        Batch::new(
            bands(),
            points.iter().map(|&(t, v)| Sample::new(t, vec![v])).collect(),
        )
    }
    fn timestamps(s: &StreamingSmoother) -> Vec<f64> {
        s.window().unwrap().iter().map(|x| x.timestamp).collect()
    }
    fn accepted(s: &mut StreamingSmoother, b: Batch) -> usize {
        s.ingest(b).len()
    }
    #[test]
    fn three_single_sample_batches_with_capacity_two() {
        let mut smoother = StreamingSmoother::new(2).unwrap();
        assert_eq!(accepted(&mut smoother, batch(&[(1.0, 10.0)])), 1);
        assert_eq!(accepted(&mut smoother, batch(&[(2.0, 20.0)])), 1);
        assert_eq!(accepted(&mut smoother, batch(&[(3.0, 30.0)])), 1);
        assert_eq!(timestamps(&smoother), vec![2.0, 3.0]);
    }
    #[test]
    fn empty_batch_is_a_no_op() {
        let mut smoother = StreamingSmoother::new(4).unwrap();
        assert_eq!(accepted(&mut smoother, Batch::empty()), 0);
        assert!(smoother.window().is_none());
        smoother.ingest(batch(&[(1.0, 10.0)]));
        assert_eq!(accepted(&mut smoother, Batch::empty()), 0);
        assert_eq!(timestamps(&smoother), vec![1.0]);
    }
    #[test]
    fn smoothed_switches_from_mean_to_ema() {
        let mut smoother = StreamingSmoother::new(10).unwrap();
        let labels = bands();
        let selector = ChannelSelector::resolve(&labels, &["attention"]).unwrap();
        assert_eq!(smoother.smoothed(&selector, 5), 0.0);
        smoother.ingest(batch(&[(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]));
        assert_eq!(smoother.smoothed(&selector, 5), 20.0);
        smoother.ingest(batch(&[(4.0, 40.0), (5.0, 50.0)]));
        assert!((smoother.smoothed(&selector, 5) - 33.950617).abs() < 1e-6);
    }
    #[test]
    fn selector_names_resolve_after_first_batch() {
        let mut smoother = StreamingSmoother::new(3).unwrap();
        assert!(smoother.selector(&["attention"]).is_none());
        smoother.ingest(batch(&[(1.0, 10.0)]));
        assert!(smoother.selector(&["attention"]).unwrap().is_ok());
        assert!(smoother.selector(&["beta"]).unwrap().is_err());
    }
    #[test]
    fn batch_with_other_channels_is_dropped() {
        let mut smoother = StreamingSmoother::new(3).unwrap();
        smoother.ingest(batch(&[(1.0, 10.0)]));
        let other = Batch::new(vec!["meditation".into()], vec![Sample::new(2.0, vec![1.0])]);
        assert_eq!(accepted(&mut smoother, other), 0);
        assert_eq!(timestamps(&smoother), vec![1.0]);
    }
    #[test]
    fn teardown_discards_late_batches() {
        let mut smoother = StreamingSmoother::new(3).unwrap();
        smoother.ingest(batch(&[(1.0, 10.0)]));
        smoother.teardown();
        assert_eq!(accepted(&mut smoother, batch(&[(2.0, 20.0)])), 0);
        assert_eq!(timestamps(&smoother), vec![1.0]);
    }
    #[test]
    fn oversized_batch_is_returned_whole() {
        let mut smoother = StreamingSmoother::new(2).unwrap();
        let rows = smoother.ingest(batch(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (3.0, 9.0)]));
        let values: Vec<f64> = rows.iter().map(|s| s.values[0]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(timestamps(&smoother), vec![2.0, 3.0]);
    }
    #[test]
    fn recent_returns_newest_in_order() {
        let mut smoother = StreamingSmoother::new(5).unwrap();
        smoother.ingest(batch(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]));
        let recent: Vec<f64> = smoother.recent(2).iter().map(|s| s.timestamp).collect();
        assert_eq!(recent, vec![2.0, 3.0]);
    }
}
