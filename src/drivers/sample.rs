use crate::drivers::StreamError;
/// One timestamped multi-channel reading.
///
/// `values` follow the channel order of the window that stores the sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Seconds; only the ordering matters to the window.
    pub timestamp: f64,
    pub values: Vec<f64>,
}
impl Sample {
    pub fn new(timestamp: f64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }
    pub fn num_channels(&self) -> usize {
        self.values.len()
    }
}
/// Set of channel indices whose per-sample mean feeds a derived metric.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSelector {
    indices: Vec<usize>,
}
impl ChannelSelector {
    /// Resolves channel names against a window's labels.
    pub fn resolve<S: AsRef<str>>(labels: &[String], names: &[S]) -> Result<Self, StreamError> {
        let indices = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                labels
                    .iter()
                    .position(|label| label.eq_ignore_ascii_case(name))
                    .ok_or_else(|| StreamError::UnknownChannel {
                        name: name.to_string(),
                        available: labels.join(", "),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { indices })
    }
    /// Mean of the selected channels, `None` when nothing is selected.
    pub fn derive(&self, sample: &Sample) -> Option<f64> {
        if self.indices.is_empty() {
            return None;
        }
        let sum: f64 = self
            .indices
            .iter()
            .map(|&idx| sample.values.get(idx).copied().unwrap_or(0.0))
            .sum();
        Some(sum / self.indices.len() as f64)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn labels() -> Vec<String> {
        ["alpha", "beta", "gamma", "theta", "delta"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
    #[test]
    fn selector_averages_named_channels() {
        let selector = ChannelSelector::resolve(&labels(), &["beta", "Gamma"]).unwrap();
        assert_eq!(selector.indices, vec![1, 2]);
        let sample = Sample::new(0.0, vec![1.0, 40.0, 60.0, 4.0, 5.0]);
        assert_eq!(selector.derive(&sample), Some(50.0));
    }
    #[test]
    fn selector_rejects_unknown_channel() {
        let err = ChannelSelector::resolve(&labels(), &["low_beta"]).unwrap_err();
        assert!(matches!(err, StreamError::UnknownChannel { ref name, .. } if name == "low_beta"));
    }
    #[test]
    fn empty_selector_derives_nothing() {
        let selector = ChannelSelector::resolve::<&str>(&labels(), &[]).unwrap();
        assert_eq!(selector.derive(&Sample::new(0.0, vec![1.0; 5])), None);
    }
}
