//! Resume checkpoint.
//!
//! One JSON artifact per lane records the progress of the current (or last)
//! run. Monitoring polls it; the next run reads its resume pointer.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use boursomatic_market_data::{FailureKind, Interval, Market, Symbol};

use crate::bars::UpsertSummary;
use crate::errors::{CheckpointError, Result};

/// Default artifact for daily runs.
pub const DAILY_CHECKPOINT_FILE: &str = "seed_checkpoint.json";
/// Default artifact for weekly runs.
pub const WEEKLY_CHECKPOINT_FILE: &str = "seed_weekly_checkpoint.json";
/// Default artifact for intraday runs.
pub const INTRADAY_CHECKPOINT_FILE: &str = "seed_intraday_checkpoint.json";

/// Lifecycle of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Initializing,
    Running,
    Completed,
    Partial,
    Aborted,
}

/// Per-symbol tallies. `attempted == succeeded + failed + skipped`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Valid symbols with no data in the window
    pub skipped: usize,
    /// Subset of `succeeded` that was already in the store
    #[serde(default)]
    pub already_covered: usize,
}

/// One failed symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolError {
    pub ticker: String,
    pub market: Market,
    pub interval: Interval,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    pub timestamp: DateTime<Utc>,
}

/// The persisted progress of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub run_id: Uuid,
    pub interval: Interval,
    pub state: RunState,
    pub start_offset: usize,
    pub universe_size: usize,
    /// Universe index of the last symbol the next run need not redo
    pub last_completed_index: Option<usize>,
    pub counts: RunCounts,
    pub bars: UpsertSummary,
    pub throttle_warnings: u64,
    #[serde(default)]
    pub consecutive_store_failures: u32,
    /// Set once a symbol failed on an unreachable store; the pointer stays put
    #[serde(default)]
    pub resume_pinned: bool,
    pub errors: Vec<SymbolError>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Fresh record for a run starting at `start_offset`.
    ///
    /// The resume pointer starts just before `start_offset`, so a run that
    /// dies before finishing a batch resumes where it began.
    pub fn begin(
        interval: Interval,
        start_offset: usize,
        universe_size: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            interval,
            state: RunState::Initializing,
            start_offset,
            universe_size,
            last_completed_index: start_offset.checked_sub(1),
            counts: RunCounts::default(),
            bars: UpsertSummary::default(),
            throttle_warnings: 0,
            consecutive_store_failures: 0,
            resume_pinned: false,
            errors: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Index the next run would start from.
    pub fn next_index(&self) -> usize {
        self.last_completed_index
            .and_then(|i| i.checked_add(1))
            .unwrap_or(0)
    }

    pub fn record_error(
        &mut self,
        symbol: &Symbol,
        error: impl Into<String>,
        kind: Option<FailureKind>,
        now: DateTime<Utc>,
    ) {
        self.errors.push(SymbolError {
            ticker: symbol.ticker().to_string(),
            market: symbol.market(),
            interval: self.interval,
            error: error.into(),
            kind,
            timestamp: now,
        });
    }

    /// Tickers of failed symbols, in failure order.
    pub fn failed_symbols(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}:{}", e.ticker, e.market))
            .collect()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Where to start, given an operator override and the last saved pointer.
///
/// An explicit offset always wins. Otherwise resume one past the last
/// completed index, or from the top if the previous run reached the end.
pub fn resolve_start_offset(
    explicit: Option<usize>,
    last_completed_index: Option<usize>,
    universe_len: usize,
) -> usize {
    if let Some(offset) = explicit {
        return offset;
    }
    match last_completed_index {
        Some(index) => match index.checked_add(1) {
            Some(next) if next < universe_len => next,
            _ => 0,
        },
        None => 0,
    }
}

/// Durable home of a [`CheckpointRecord`].
pub trait CheckpointStore: Send + Sync {
    /// The last saved record, or `None` if there is no usable one.
    fn load(&self) -> Option<CheckpointRecord>;

    /// Replace the saved record.
    fn save(&self, record: &CheckpointRecord) -> Result<()>;
}

/// JSON file with atomic replace.
#[derive(Clone, Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default artifact for `interval` inside `dir`.
    pub fn for_interval(dir: impl AsRef<Path>, interval: Interval) -> Self {
        let file = match interval {
            Interval::Daily => DAILY_CHECKPOINT_FILE,
            Interval::Weekly => WEEKLY_CHECKPOINT_FILE,
            _ => INTRADAY_CHECKPOINT_FILE,
        };
        Self::new(dir.as_ref().join(file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Option<CheckpointRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint, starting fresh");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "checkpoint unreadable, starting fresh");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "checkpoint corrupt, starting fresh");
                None
            }
        }
    }

    fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).map_err(CheckpointError::from)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }

        let tmp = self.tmp_path();
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(self.write_err(e).into());
        }
        Ok(())
    }
}
