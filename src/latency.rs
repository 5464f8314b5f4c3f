//! Average message latency from simulator traffic logs.
//!
//! After a simulation, every endpoint `i` leaves two whitespace-separated
//! logs in the run directory:
//!
//! - `OutLog<i>`: `target source size out_ts`, one line per message sent;
//! - `InLog<i>`: `target source size out_ts in_ts`, one line per message
//!   received.
//!
//! A sent message is matched with a received one on
//! `(target, source, out_ts)`, and the latency `in_ts - out_ts` is folded
//! into a running average for its `(target, source)` pair.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::Address;

/// Errors raised while reading traffic logs.
#[derive(Error, Debug)]
pub enum LatencyError {
    #[error("cannot read log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },
}

pub type LatencyResult<T> = Result<T, LatencyError>;

/// One parsed log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub target: Address,
    pub source: Address,
    pub size: u64,
    pub out_ts: u64,
    /// Present on received-message lines only
    pub in_ts: Option<u64>,
}

impl LogEntry {
    /// Parses a line with four (sent) or five (received) integer fields.
    pub fn parse(line: &str) -> Result<Self, String> {
        let fields = line
            .split_whitespace()
            .map(|f| f.parse::<u64>().map_err(|e| format!("invalid field {:?}: {}", f, e)))
            .collect::<Result<Vec<u64>, String>>()?;

        let in_ts = match fields.len() {
            4 => None,
            5 => Some(fields[4]),
            n => return Err(format!("expected 4 or 5 fields, found {}", n)),
        };
        Ok(Self {
            target: fields[0] as Address,
            source: fields[1] as Address,
            size: fields[2],
            out_ts: fields[3],
            in_ts,
        })
    }

    fn key(&self) -> (Address, Address, u64) {
        (self.target, self.source, self.out_ts)
    }
}

/// Which of the two per-endpoint logs a file is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogKind {
    Out,
    In,
}

impl LogKind {
    fn file_name(self, endpoint: Address) -> String {
        match self {
            LogKind::Out => format!("OutLog{}", endpoint),
            LogKind::In => format!("InLog{}", endpoint),
        }
    }
}

fn read_log(dir: &Path, kind: LogKind, endpoint: Address, amount_of_pes: usize) -> LatencyResult<Vec<LogEntry>> {
    let path = dir.join(kind.file_name(endpoint));
    let content = fs::read_to_string(&path).map_err(|source| LatencyError::Io {
        path: path.clone(),
        source,
    })?;

    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parse_error = |message: String| LatencyError::Parse {
            file: path.clone(),
            line: index + 1,
            message,
        };

        let entry = LogEntry::parse(line).map_err(parse_error)?;
        match (kind, entry.in_ts) {
            (LogKind::Out, Some(_)) => {
                return Err(parse_error("sent-message line has an input timestamp".into()))
            }
            (LogKind::In, None) => {
                return Err(parse_error("received-message line lacks an input timestamp".into()))
            }
            _ => {}
        }
        if entry.target >= amount_of_pes || entry.source >= amount_of_pes {
            return Err(parse_error(format!(
                "endpoint outside 0..{} (target {}, source {})",
                amount_of_pes, entry.target, entry.source
            )));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Average latency per `(target, source)` pair.
#[derive(Clone, Debug, Serialize)]
pub struct LatencyReport {
    amount_of_pes: usize,
    /// Row-major `[target][source]` running averages
    averages: Vec<f64>,
    counts: Vec<u64>,
    matched: u64,
    unmatched: u64,
}

impl LatencyReport {
    /// Creates an empty report for `amount_of_pes` endpoints.
    pub fn new(amount_of_pes: usize) -> Self {
        Self {
            amount_of_pes,
            averages: vec![0.0; amount_of_pes * amount_of_pes],
            counts: vec![0; amount_of_pes * amount_of_pes],
            matched: 0,
            unmatched: 0,
        }
    }

    /// Reads `OutLog0..N` and `InLog0..N` from `dir` and matches them.
    pub fn from_logs(dir: impl AsRef<Path>, amount_of_pes: usize) -> LatencyResult<Self> {
        let dir = dir.as_ref();

        // Received messages by key; a key may legitimately repeat.
        let mut received: HashMap<(Address, Address, u64), Vec<u64>> = HashMap::new();
        for endpoint in 0..amount_of_pes {
            for entry in read_log(dir, LogKind::In, endpoint, amount_of_pes)? {
                if let Some(in_ts) = entry.in_ts {
                    received.entry(entry.key()).or_default().push(in_ts);
                }
            }
        }

        let mut report = Self::new(amount_of_pes);
        for endpoint in 0..amount_of_pes {
            let sent = read_log(dir, LogKind::Out, endpoint, amount_of_pes)?;
            tracing::debug!("Log OutLog{} contains {} entries", endpoint, sent.len());

            for entry in sent {
                match received.get_mut(&entry.key()).and_then(Vec::pop) {
                    Some(in_ts) => {
                        let latency = in_ts as f64 - entry.out_ts as f64;
                        // Endpoints were range-checked while parsing.
                        let _ = report.record(entry.target, entry.source, latency);
                    }
                    None => report.unmatched += 1,
                }
            }
        }

        tracing::info!(
            matched = report.matched,
            unmatched = report.unmatched,
            "latency logs analysed"
        );
        Ok(report)
    }

    /// Folds one latency sample into the running average of its pair.
    ///
    /// Returns the updated average, or `None` (recording nothing) if either
    /// endpoint is outside `0..amount_of_pes`.
    pub fn record(&mut self, target: Address, source: Address, latency: f64) -> Option<f64> {
        let i = self.index(target, source)?;
        self.counts[i] += 1;
        self.averages[i] += (latency - self.averages[i]) / self.counts[i] as f64;
        self.matched += 1;
        Some(self.averages[i])
    }

    pub fn amount_of_pes(&self) -> usize {
        self.amount_of_pes
    }

    /// Average latency from `source` to `target`, if any message matched.
    pub fn average(&self, target: Address, source: Address) -> Option<f64> {
        let i = self.index(target, source)?;
        (self.counts[i] > 0).then_some(self.averages[i])
    }

    /// Number of matched messages from `source` to `target`.
    pub fn count(&self, target: Address, source: Address) -> u64 {
        self.index(target, source).map_or(0, |i| self.counts[i])
    }

    pub fn matched(&self) -> u64 {
        self.matched
    }

    /// Sent messages with no received counterpart.
    pub fn unmatched(&self) -> u64 {
        self.unmatched
    }

    fn index(&self, target: Address, source: Address) -> Option<usize> {
        (target < self.amount_of_pes && source < self.amount_of_pes)
            .then(|| target * self.amount_of_pes + source)
    }

    /// Average latency matrix; rows are targets, columns are sources and
    /// pairs without traffic are shown as `-`.
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{:>8}", "tgt\\src");
        for source in 0..self.amount_of_pes {
            let _ = write!(out, "{:>10}", source);
        }
        out.push('\n');

        for target in 0..self.amount_of_pes {
            let _ = write!(out, "{:>8}", target);
            for source in 0..self.amount_of_pes {
                match self.average(target, source) {
                    Some(avg) => {
                        let _ = write!(out, "{:>10.2}", avg);
                    }
                    None => {
                        let _ = write!(out, "{:>10}", "-");
                    }
                }
            }
            out.push('\n');
        }
        let _ = writeln!(out, "matched: {}, unmatched: {}", self.matched, self.unmatched);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_logs(dir: &Path, logs: &[(&str, &str)]) {
        for (name, content) in logs {
            fs::write(dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn test_parse_line() {
        let sent = LogEntry::parse("1 0 32 100").unwrap();
        assert_eq!(sent.target, 1);
        assert_eq!(sent.in_ts, None);

        let received = LogEntry::parse("1 0 32 100 140").unwrap();
        assert_eq!(received.in_ts, Some(140));

        assert!(LogEntry::parse("1 0 32").is_err());
        assert!(LogEntry::parse("1 0 x 100").is_err());
    }

    #[test]
    fn test_incremental_average() {
        let dir = tempfile::tempdir().unwrap();
        write_logs(
            dir.path(),
            &[
                ("OutLog0", "1 0 32 100\n1 0 32 200\n1 0 32 300\n"),
                ("OutLog1", ""),
                ("InLog0", ""),
                ("InLog1", "1 0 32 100 110\n1 0 32 200 230\n"),
            ],
        );

        let report = LatencyReport::from_logs(dir.path(), 2).unwrap();
        assert_eq!(report.matched(), 2);
        assert_eq!(report.unmatched(), 1);
        assert_eq!(report.count(1, 0), 2);
        assert_eq!(report.average(1, 0), Some(20.0));
        assert_eq!(report.average(0, 1), None);
    }

    #[test]
    fn test_repeated_keys_match_once_each() {
        let dir = tempfile::tempdir().unwrap();
        write_logs(
            dir.path(),
            &[
                ("OutLog0", "1 0 32 5\n1 0 32 5\n1 0 32 5\n"),
                ("InLog0", ""),
                ("InLog1", "1 0 32 5 9\n1 0 32 5 15\n"),
                ("OutLog1", ""),
            ],
        );

        let report = LatencyReport::from_logs(dir.path(), 2).unwrap();
        assert_eq!(report.matched(), 2);
        assert_eq!(report.unmatched(), 1);
        assert_eq!(report.average(1, 0), Some(7.0));
    }

    #[test]
    fn test_parse_error_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        write_logs(
            dir.path(),
            &[("InLog0", "0 0 32 1 2\n\n0 0 32 1\n"), ("OutLog0", "")],
        );

        match LatencyReport::from_logs(dir.path(), 1) {
            Err(LatencyError::Parse { file, line, .. }) => {
                assert!(file.ends_with("InLog0"));
                assert_eq!(line, 3);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        write_logs(dir.path(), &[("InLog0", "3 0 32 1 2\n"), ("OutLog0", "")]);
        assert!(matches!(
            LatencyReport::from_logs(dir.path(), 1),
            Err(LatencyError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LatencyReport::from_logs(dir.path(), 1),
            Err(LatencyError::Io { .. })
        ));
    }

    #[test]
    fn test_record_rejects_unknown_endpoints() {
        let mut report = LatencyReport::new(2);
        assert_eq!(report.record(5, 0, 1.0), None);
        assert_eq!(report.record(0, 2, 1.0), None);
        assert_eq!(report.matched(), 0);

        assert_eq!(report.record(1, 0, 4.0), Some(4.0));
        assert_eq!(report.record(1, 0, 8.0), Some(6.0));
        assert_eq!(report.matched(), 2);
    }

    #[test]
    fn test_table() {
        let mut report = LatencyReport::new(2);
        report.record(0, 1, 12.5);
        let table = report.to_table();

        assert!(table.contains("12.50"));
        assert!(table.ends_with("matched: 1, unmatched: 0\n"));
    }
}
