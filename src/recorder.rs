use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use log::info;

use crate::drivers::table::format_time;
use crate::drivers::{Sample, StreamError};

/// Appends accepted samples to `<dir>/<dataset>.csv`, in the same layout the
/// CSV directory source reads back.
pub struct CsvRecorder {
    dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl CsvRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!("💾 Recording to {}", dir.display());
        Ok(Self { dir, writers: HashMap::new() })
    }

    pub fn record(&mut self, dataset: &str, labels: &[String], samples: &[Sample]) -> Result<(), StreamError> {
        if samples.is_empty() {
            return Ok(());
        }
        if !self.writers.contains_key(dataset) {
            let w = self.open(dataset, labels)?;
            self.writers.insert(dataset.to_string(), w);
        }
        let Some(w) = self.writers.get_mut(dataset) else {
            return Ok(());
        };
        for sample in samples {
            write!(w, "{}", format_time(sample.timestamp))?;
            for val in &sample.values {
                write!(w, ",{}", val)?;
            }
            writeln!(w)?;
        }
        w.flush()?;
        Ok(())
    }

    fn open(&self, dataset: &str, labels: &[String]) -> Result<BufWriter<File>, StreamError> {
        let path = self.dir.join(format!("{dataset}.csv"));
        let fresh = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut w = BufWriter::new(file);
        if fresh {
            // 表头: time, 通道名...
            writeln!(w, "time,{}", labels.join(","))?;
        }
        Ok(w)
    }

    pub fn stop(&mut self) {
        for (_, mut w) in self.writers.drain() {
            w.flush().ok();
        }
        info!("💾 Recording saved.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::table::parse_table;

    #[test]
    fn recorded_rows_parse_back() {
        let dir = std::env::temp_dir().join(format!("brainwave-rec-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let mut recorder = CsvRecorder::new(&dir).unwrap();
        let labels = vec!["attention".to_string()];
        let a = Sample::new(1_700_000_000.0, vec![40.0]);
        let b = Sample::new(1_700_000_000.5, vec![42.5]);
        recorder.record("attention", &labels, &[a.clone()]).unwrap();
        recorder.record("attention", &labels, &[b.clone()]).unwrap();
        recorder.stop();

        let text = std::fs::read_to_string(dir.join("attention.csv")).unwrap();
        assert!(text.starts_with("time,attention\n"));
        let batch = parse_table(&text).unwrap();
        assert_eq!(batch.samples, vec![a, b]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
