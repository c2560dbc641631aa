//! ThinkGear (TGAM) serial protocol.
//!
//! Packet: `0xAA 0xAA <len> <payload..len> <checksum>`, where the checksum is the
//! inverted low byte of the payload sum. Payload rows are `[0x55..] code [vlen] data`;
//! codes below `0x80` carry exactly one data byte.
use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use log::{debug, info, warn};
use crate::drivers::source::{lock, Batch, DataSource, SUB_BANDS};
use crate::drivers::{Sample, StreamError};
const SYNC: u8 = 0xAA;
const EXCODE: u8 = 0x55;
const MAX_PAYLOAD: usize = 169;
// 同一次读取中的多个包共享一个时钟读数, 依次错开
const TIMESTAMP_STEP: f64 = 1e-6;
pub const DEFAULT_BAUD_RATE: u32 = 57_600;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reading {
    PoorSignal(u8),
    Attention(u8),
    Meditation(u8),
    Raw(i16),
    /// delta, theta, low/high alpha, low/high beta, low/high gamma.
    BandPowers([u32; 8]),
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Sync,
    SecondSync,
    Length,
    Payload,
    Checksum,
}
/// Incremental decoder; bytes may arrive split at any point.
#[derive(Debug)]
pub struct PacketParser {
    state: State,
    expected_len: usize,
    payload: Vec<u8>,
    dropped: usize,
}
impl Default for PacketParser {
    fn default() -> Self {
        Self {
            state: State::Sync,
            expected_len: 0,
            payload: Vec::with_capacity(MAX_PAYLOAD),
            dropped: 0,
        }
    }
}
impl PacketParser {
    pub fn new() -> Self {
        Self::default()
    }
    /// Packets discarded because of a checksum mismatch.
    pub fn dropped_packets(&self) -> usize {
        self.dropped
    }
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Reading> {
        let mut readings = Vec::new();
        for &byte in bytes {
            match self.state {
                State::Sync => {
                    if byte == SYNC {
                        self.state = State::SecondSync;
                    }
                }
                State::SecondSync => {
                    self.state = if byte == SYNC {
                        State::Length
                    } else {
                        State::Sync
                    };
                }
                State::Length => {
                    let len = byte as usize;
                    if byte == SYNC {
                        // extra sync byte, still waiting for the length
                    } else if len > MAX_PAYLOAD {
                        self.state = State::Sync;
                    } else {
                        self.expected_len = len;
                        self.payload.clear();
                        self.state = if len == 0 {
                            State::Checksum
                        } else {
                            State::Payload
                        };
                    }
                }
                State::Payload => {
                    self.payload.push(byte);
                    if self.payload.len() == self.expected_len {
                        self.state = State::Checksum;
                    }
                }
                State::Checksum => {
                    if byte == checksum(&self.payload) {
                        readings.extend(parse_payload(&self.payload));
                    } else {
                        self.dropped += 1;
                        debug!("thinkgear checksum mismatch, packet dropped");
                    }
                    self.state = State::Sync;
                }
            }
        }
        readings
    }
}
pub fn checksum(payload: &[u8]) -> u8 {
    !payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
/// Decodes every row of one packet payload. Unknown codes are skipped; a
/// truncated trailing row ends decoding.
pub fn parse_payload(payload: &[u8]) -> Vec<Reading> {
    let mut readings = Vec::new();
    let mut i = 0;
    while i < payload.len() {
        while payload.get(i) == Some(&EXCODE) {
            i += 1;
        }
        let Some(&code) = payload.get(i) else {
            break;
        };
        i += 1;
        let len = if code >= 0x80 {
            let Some(&len) = payload.get(i) else {
                break;
            };
            i += 1;
            len as usize
        } else {
            1
        };
        let Some(data) = payload.get(i..i + len) else {
            break;
        };
        i += len;
        if let Some(reading) = decode_row(code, data) {
            readings.push(reading);
        }
    }
    readings
}
fn decode_row(code: u8, data: &[u8]) -> Option<Reading> {
    match code {
        0x02 => Some(Reading::PoorSignal(data[0])),
        0x04 => Some(Reading::Attention(data[0])),
        0x05 => Some(Reading::Meditation(data[0])),
        0x80 if data.len() >= 2 => Some(Reading::Raw(i16::from_be_bytes([data[0], data[1]]))),
        0x83 if data.len() >= 24 => {
            let mut bands = [0u32; 8];
            for (band, chunk) in bands.iter_mut().zip(data.chunks_exact(3)) {
                *band = u32::from_be_bytes([0, chunk[0], chunk[1], chunk[2]]);
            }
            Some(Reading::BandPowers(bands))
        }
        _ => None,
    }
}
/// Bounded per-dataset history of decoded readings.
#[derive(Debug)]
pub struct ReadingLog {
    datasets: HashMap<&'static str, VecDeque<Sample>>,
    history: usize,
}
impl ReadingLog {
    pub fn new(history: usize) -> Self {
        Self {
            datasets: HashMap::new(),
            history: history.max(1),
        }
    }
    fn labels(dataset: &str) -> Option<Vec<String>> {
        let labels: &[&str] = match dataset {
            "brainwaves" => &SUB_BANDS[..],
            "attention" => &["attention"][..],
            "meditation" => &["meditation"][..],
            "noise" => &["poor_signal"][..],
            "raw" => &["raw_eeg"][..],
            _ => return None,
        };
        Some(labels.iter().map(|s| s.to_string()).collect())
    }
    /// Stores `reading` under its dataset. Timestamps within a dataset stay
    /// strictly increasing: a reading stamped no later than the previous row
    /// is placed just after it.
    pub fn record(&mut self, reading: Reading, timestamp: f64) {
        let (dataset, values) = match reading {
            Reading::PoorSignal(v) => ("noise", vec![v as f64]),
            Reading::Attention(v) => ("attention", vec![v as f64]),
            Reading::Meditation(v) => ("meditation", vec![v as f64]),
            Reading::Raw(v) => ("raw", vec![v as f64]),
            Reading::BandPowers(bands) => ("brainwaves", bands.iter().map(|&b| b as f64).collect()),
        };
        let rows = self.datasets.entry(dataset).or_default();
        let timestamp = match rows.back() {
            Some(last) if timestamp <= last.timestamp => last.timestamp + TIMESTAMP_STEP,
            _ => timestamp,
        };
        if rows.len() == self.history {
            rows.pop_front();
        }
        rows.push_back(Sample::new(timestamp, values));
    }
    pub fn batch(&self, dataset: &str) -> Result<Batch, StreamError> {
        let labels =
            Self::labels(dataset).ok_or_else(|| StreamError::UnknownDataset(dataset.to_string()))?;
        let samples = self
            .datasets
            .get(dataset)
            .map(|rows| rows.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Batch::new(labels, samples))
    }
}
fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
/// Headset source: a reader thread decodes the byte stream into a
/// [`ReadingLog`]; each fetch returns the retained rows of one dataset.
pub struct ThinkGearSource {
    log: Arc<Mutex<ReadingLog>>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}
impl ThinkGearSource {
    pub fn open(port: &str, baud_rate: u32, history: usize) -> Result<Self, StreamError> {
        let serial = serialport::new(port, baud_rate)
            .timeout(Duration::from_millis(200))
            .open()?;
        info!("opened ThinkGear headset on {port} at {baud_rate} baud");
        Ok(Self::from_reader(serial, history))
    }
    pub fn from_reader<R: Read + Send + 'static>(mut reader: R, history: usize) -> Self {
        let log = Arc::new(Mutex::new(ReadingLog::new(history)));
        let stop = Arc::new(AtomicBool::new(false));
        let thread_log = Arc::clone(&log);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut parser = PacketParser::new();
            let mut buf = [0u8; 256];
            while !thread_stop.load(Ordering::Relaxed) {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let readings = parser.feed(&buf[..n]);
                        if readings.is_empty() {
                            continue;
                        }
                        let t = now_seconds();
                        let mut log = lock(&thread_log);
                        for reading in readings {
                            log.record(reading, t);
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!("thinkgear read failed: {err}");
                        break;
                    }
                }
            }
            debug!(
                "thinkgear reader stopped ({} packets dropped)",
                parser.dropped_packets()
            );
        });
        Self {
            log,
            stop,
            reader: Some(handle),
        }
    }
}
impl DataSource for ThinkGearSource {
    fn fetch(&self, dataset: &str) -> Result<Batch, StreamError> {
        lock(&self.log).batch(dataset)
    }
}
impl Drop for ThinkGearSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            handle.join().ok();
        }
    }
}
