//! Tabular text (CSV) to samples.
//!
//! First row is a header whose first column is the time column; the other
//! columns name the channels. The time cell is either plain seconds or a
//! `%Y-%m-%d %H:%M:%S` datetime with optional fractional seconds.
use chrono::NaiveDateTime;
use crate::drivers::source::Batch;
use crate::drivers::{Sample, StreamError};
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
pub fn parse_table(text: &str) -> Result<Batch, StreamError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());
    let Some((header_line, header)) = lines.next() else {
        return Ok(Batch::empty());
    };
    let mut columns = split_row(header);
    if columns.len() < 2 {
        return Err(StreamError::parse(header_line, "header needs a time column and at least one channel"));
    }
    let channel_labels: Vec<String> = columns.drain(1..).map(str::to_string).collect();
    let mut samples = Vec::new();
    for (line_no, line) in lines {
        let cells = split_row(line);
        if cells.len() != channel_labels.len() + 1 {
            return Err(StreamError::parse(
                line_no,
                format!(
                    "expected {} columns, found {}",
                    channel_labels.len() + 1,
                    cells.len()
                ),
            ));
        }
        let timestamp = parse_time(cells[0]).ok_or_else(|| {
            StreamError::parse(line_no, format!("unrecognised time `{}`", cells[0]))
        })?;
        let values = cells[1..]
            .iter()
            .map(|cell| {
                cell.parse::<f64>()
                    .map_err(|_| StreamError::parse(line_no, format!("`{cell}` is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        samples.push(Sample::new(timestamp, values));
    }
    Ok(Batch::new(channel_labels, samples))
}
fn split_row(line: &str) -> Vec<&str> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"'))
        .collect()
}
/// Seconds since the epoch (datetimes) or the number itself.
pub fn parse_time(cell: &str) -> Option<f64> {
    if let Ok(seconds) = cell.parse::<f64>() {
        return seconds.is_finite().then_some(seconds);
    }
    DATETIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(cell, fmt)
            .ok()
            .map(|dt| dt.and_utc().timestamp_millis() as f64 / 1000.0)
    })
}
/// Inverse of [`parse_time`] for datetimes, with millisecond precision.
pub fn format_time(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as i64;
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{seconds:.3}"),
    }
}
