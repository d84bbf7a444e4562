//! Scripted signal source for tests and demos.
//!
//! Each chart has a queue of reads. When the queue runs dry the last
//! successful reading repeats; a chart that never had one is unavailable.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{SignalSourceError, SignalSourcePort};
use crate::domain::shared::ChartId;
use crate::domain::signal::RawSignal;

/// One scripted read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRead {
    /// Return this reading.
    Signal(RawSignal),
    /// Fail with this error.
    Error(SignalSourceError),
    /// Sleep, then return the reading (for timeout tests).
    Delayed(Duration, RawSignal),
}

#[derive(Debug, Default)]
struct ChartScript {
    queue: VecDeque<ScriptedRead>,
    sticky: Option<RawSignal>,
}

/// Deterministic per-chart signal source.
#[derive(Debug, Default)]
pub struct ScriptedSignalSource {
    charts: Mutex<HashMap<ChartId, ChartScript>>,
}

impl ScriptedSignalSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a read for a chart.
    pub fn push(&self, chart_id: ChartId, read: ScriptedRead) {
        self.charts
            .lock()
            .entry(chart_id)
            .or_default()
            .queue
            .push_back(read);
    }

    /// Queue a reading.
    pub fn push_signal(&self, chart_id: ChartId, raw: RawSignal) {
        self.push(chart_id, ScriptedRead::Signal(raw));
    }

    /// Queue a failure.
    pub fn push_error(&self, chart_id: ChartId, error: SignalSourceError) {
        self.push(chart_id, ScriptedRead::Error(error));
    }

    /// Drop any queued reads and return `raw` from now on.
    pub fn set(&self, chart_id: ChartId, raw: RawSignal) {
        let mut charts = self.charts.lock();
        let script = charts.entry(chart_id).or_default();
        script.queue.clear();
        script.sticky = Some(raw);
    }

    /// Reads still queued for a chart.
    #[must_use]
    pub fn pending(&self, chart_id: ChartId) -> usize {
        self.charts
            .lock()
            .get(&chart_id)
            .map_or(0, |script| script.queue.len())
    }

    fn next(&self, chart_id: ChartId) -> Result<ScriptedRead, SignalSourceError> {
        let mut charts = self.charts.lock();
        let script = charts.entry(chart_id).or_default();
        match script.queue.pop_front() {
            Some(read) => {
                if let ScriptedRead::Signal(raw) | ScriptedRead::Delayed(_, raw) = &read {
                    script.sticky = Some(raw.clone());
                }
                Ok(read)
            }
            None => script
                .sticky
                .clone()
                .map(ScriptedRead::Signal)
                .ok_or_else(|| SignalSourceError::Unavailable {
                    message: format!("no scripted reading for chart {chart_id}"),
                }),
        }
    }
}

#[async_trait]
impl SignalSourcePort for ScriptedSignalSource {
    async fn read(&self, chart_id: ChartId) -> Result<RawSignal, SignalSourceError> {
        match self.next(chart_id)? {
            ScriptedRead::Signal(raw) => Ok(raw),
            ScriptedRead::Error(error) => Err(error),
            ScriptedRead::Delayed(delay, raw) => {
                tokio::time::sleep(delay).await;
                Ok(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_then_sticky() {
        let source = ScriptedSignalSource::new();
        let chart = ChartId::new(1);
        source.push_signal(chart, RawSignal::new(80, "L3", "GREEN"));
        source.push_error(
            chart,
            SignalSourceError::Unavailable {
                message: "window hidden".to_string(),
            },
        );

        assert_eq!(source.read(chart).await.unwrap().power_score, 80);
        assert!(source.read(chart).await.is_err());
        assert_eq!(source.read(chart).await.unwrap().power_score, 80);
        assert_eq!(source.pending(chart), 0);
    }

    #[tokio::test]
    async fn unknown_chart_is_unavailable() {
        let source = ScriptedSignalSource::new();
        let Err(err) = source.read(ChartId::new(9)).await else {
            panic!("expected unavailable");
        };
        assert!(matches!(err, SignalSourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn set_replaces_queue() {
        let source = ScriptedSignalSource::new();
        let chart = ChartId::new(2);
        source.push_signal(chart, RawSignal::new(10, "L1", "RED"));
        source.set(chart, RawSignal::new(95, "L4", "BLUE"));
        assert_eq!(source.read(chart).await.unwrap().power_score, 95);
    }
}
