//! File-drop signal source.
//!
//! The screen-reading sensor writes `chart_<id>.json` into a directory:
//!
//! ```json
//! {"power_score": 78, "confluence_level": "L3", "color": "GREEN", "valid": true}
//! ```
//!
//! A file older than `max_age` is reported as an invalid read.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::application::ports::{SignalSourceError, SignalSourcePort};
use crate::domain::shared::ChartId;
use crate::domain::signal::RawSignal;

/// Reads sensor output files from a directory.
#[derive(Debug, Clone)]
pub struct FileSignalSource {
    dir: PathBuf,
    max_age: Duration,
}

impl FileSignalSource {
    /// Source reading from `dir`, treating files older than `max_age` as stale.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    /// Path of a chart's sensor file.
    #[must_use]
    pub fn path_for(&self, chart_id: ChartId) -> PathBuf {
        self.dir.join(format!("chart_{}.json", chart_id.value()))
    }

    /// Directory being read.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_stale(&self, modified: SystemTime) -> bool {
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age > self.max_age)
    }
}

#[async_trait]
impl SignalSourcePort for FileSignalSource {
    async fn read(&self, chart_id: ChartId) -> Result<RawSignal, SignalSourceError> {
        let path = self.path_for(chart_id);

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| SignalSourceError::Unavailable {
                message: format!("{}: {e}", path.display()),
            })?;
        if let Ok(modified) = metadata.modified()
            && self.is_stale(modified)
        {
            tracing::debug!(chart_id = %chart_id, path = %path.display(), "Stale sensor file");
            return Ok(RawSignal::invalid());
        }

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SignalSourceError::Unavailable {
                message: format!("{}: {e}", path.display()),
            })?;

        serde_json::from_str(&contents).map_err(|e| SignalSourceError::Malformed {
            message: format!("{}: {e}", path.display()),
        })
    }
}
