use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::table::parse_table;
use crate::drivers::{Sample, StreamError};
/// Eight sub-bands of the latest headset revision.
pub const SUB_BANDS: [&str; 8] = [
    "delta",
    "theta",
    "low_alpha",
    "high_alpha",
    "low_beta",
    "high_beta",
    "low_gamma",
    "high_gamma",
];
/// Five bands of the first dashboard revision.
pub const CLASSIC_BANDS: [&str; 5] = ["alpha", "beta", "gamma", "theta", "delta"];
/// Rows of one dataset, in whatever order the source produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub channel_labels: Vec<String>,
    pub samples: Vec<Sample>,
}
impl Batch {
    pub fn new(channel_labels: Vec<String>, samples: Vec<Sample>) -> Self {
        Self {
            channel_labels,
            samples,
        }
    }
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
/// Anything that can answer "what rows does dataset X have right now".
///
/// Sources may return rows that were already delivered; the window drops
/// anything not newer than what it holds.
pub trait DataSource: Send + Sync {
    fn fetch(&self, dataset: &str) -> Result<Batch, StreamError>;
}
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
#[cfg(test)]
pub use manual::ManualSource;
/// Scripted in-memory source for tests.
#[cfg(test)]
mod manual {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use super::{lock, Batch, DataSource};
    use crate::drivers::StreamError;
    #[derive(Default)]
    pub struct ManualSource {
        queues: Mutex<HashMap<String, VecDeque<Result<Batch, StreamError>>>>,
        delay: Option<Duration>,
    }
    impl ManualSource {
        pub fn new() -> Self {
            Self::default()
        }
        /// Every fetch sleeps for `delay` before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
        pub fn push(&self, dataset: &str, batch: Batch) {
            lock(&self.queues)
                .entry(dataset.to_string())
                .or_default()
                .push_back(Ok(batch));
        }
        pub fn push_error(&self, dataset: &str, error: StreamError) {
            lock(&self.queues)
                .entry(dataset.to_string())
                .or_default()
                .push_back(Err(error));
        }
    }
    impl DataSource for ManualSource {
        fn fetch(&self, dataset: &str) -> Result<Batch, StreamError> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            lock(&self.queues)
                .get_mut(dataset)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(Batch::empty()))
        }
    }
}
/// Reads `<root>/<dataset>.csv` in full on every fetch.
pub struct CsvDirectorySource {
    root: PathBuf,
}
impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
    pub fn dataset_path(&self, dataset: &str) -> PathBuf {
        self.root.join(format!("{dataset}.csv"))
    }
}
impl DataSource for CsvDirectorySource {
    fn fetch(&self, dataset: &str) -> Result<Batch, StreamError> {
        let text = std::fs::read_to_string(self.dataset_path(dataset))?;
        parse_table(&text)
    }
}
struct SimulatedState {
    rng: StdRng,
    next_tick: HashMap<String, u64>,
}
/// Random readings, one new row per dataset per fetch.
///
/// `brainwaves` yields the eight sub-bands in `1000..1_000_000`, `bands` the five
/// classic bands in `0..100`, `attention` and `meditation` a single channel in
/// `0..=100`, `noise` a `poor_signal` channel in `0..=200`. Timestamps count
/// ticks from zero.
pub struct SimulatedSource {
    state: Mutex<SimulatedState>,
    history: u64,
}
impl SimulatedSource {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: Mutex::new(SimulatedState {
                rng,
                next_tick: HashMap::new(),
            }),
            history: 1,
        }
    }
    /// The first fetch of each dataset returns `rows` rows instead of one.
    pub fn with_history(mut self, rows: u64) -> Self {
        self.history = rows.max(1);
        self
    }
    fn channels(dataset: &str) -> Option<(Vec<String>, f64, f64)> {
        let (labels, low, high): (&[&str], f64, f64) = match dataset {
            "brainwaves" => (&SUB_BANDS[..], 1000.0, 1_000_000.0),
            "bands" => (&CLASSIC_BANDS[..], 0.0, 100.0),
            "attention" => (&["attention"][..], 0.0, 100.0),
            "meditation" => (&["meditation"][..], 0.0, 100.0),
            "noise" => (&["poor_signal"][..], 0.0, 200.0),
            _ => return None,
        };
        Some((labels.iter().map(|s| s.to_string()).collect(), low, high))
    }
}
impl DataSource for SimulatedSource {
    fn fetch(&self, dataset: &str) -> Result<Batch, StreamError> {
        let (labels, low, high) = Self::channels(dataset)
            .ok_or_else(|| StreamError::UnknownDataset(dataset.to_string()))?;
        let mut state = lock(&self.state);
        let SimulatedState { rng, next_tick } = &mut *state;
        let tick = next_tick.entry(dataset.to_string()).or_insert(0);
        let rows = if *tick == 0 { self.history } else { 1 };
        let samples = (0..rows)
            .map(|_| {
                let values = labels
                    .iter()
                    .map(|_| rng.gen_range(low..=high).round())
                    .collect();
                let sample = Sample::new(*tick as f64, values);
                *tick += 1;
                sample
            })
            .collect();
        Ok(Batch::new(labels, samples))
    }
}
