//! Failure Log Module
//!
//! Append-only JSON-lines record of failed geolocation lookups. Writes are
//! rate limited: at most one entry per interval, with the number of failures
//! skipped in between carried on the next entry.
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct FailureEntry<'a> {
    timestamp: DateTime<Utc>,
    ip: &'a str,
    error: &'a str,
    suppressed: u64,
}

#[derive(Debug, Default)]
struct RateState {
    last_write: Option<Instant>,
    suppressed: u64,
}

#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    interval: Duration,
    state: Mutex<RateState>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        FailureLog {
            path: path.into(),
            interval,
            state: Mutex::new(RateState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a failed lookup. Returns `Ok(false)` when the entry was
    /// suppressed by the rate limit.
    pub fn record(&self, ip: &str, error: &str) -> Result<bool> {
        let suppressed = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            if let Some(last) = state.last_write {
                if now.duration_since(last) < self.interval {
                    state.suppressed += 1;
                    return Ok(false);
                }
            }
            state.last_write = Some(now);
            std::mem::take(&mut state.suppressed)
        };

        let entry = FailureEntry {
            timestamp: Utc::now(),
            ip,
            error,
            suppressed,
        };
        let line = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(true)
    }
}
