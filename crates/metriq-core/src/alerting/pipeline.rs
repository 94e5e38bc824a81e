//! Ingestion pipeline for streamed metrics
//!
//! The pipeline receives samples, batches them, optionally persists each
//! batch and feeds it to the alert engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info};

use super::engine::AlertEngine;
use crate::config::AlertingConfig;
use crate::error::{Error, Result};
use crate::models::Metric;
use crate::store::MetricWriter;

/// Ingestion pipeline feeding an [`AlertEngine`]
pub struct AlertPipeline {
    config: AlertingConfig,
    metric_tx: Mutex<Option<mpsc::Sender<Metric>>>,
    metric_rx: Mutex<Option<mpsc::Receiver<Metric>>>,
    engine: Arc<AlertEngine>,
    writer: Option<Arc<dyn MetricWriter>>,
    processed: AtomicU64,
    triggered: AtomicU64,
}

impl AlertPipeline {
    /// Create a new pipeline
    pub fn new(config: AlertingConfig, engine: Arc<AlertEngine>) -> Self {
        let (metric_tx, metric_rx) = mpsc::channel(config.channel_capacity.max(1));

        Self {
            config,
            metric_tx: Mutex::new(Some(metric_tx)),
            metric_rx: Mutex::new(Some(metric_rx)),
            engine,
            writer: None,
            processed: AtomicU64::new(0),
            triggered: AtomicU64::new(0),
        }
    }

    /// Persist every batch through `writer` before it is evaluated
    #[must_use]
    pub fn with_writer(mut self, writer: Arc<dyn MetricWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Submit a sample for processing
    pub async fn submit(&self, metric: Metric) -> Result<()> {
        let tx = self
            .metric_tx
            .lock()
            .clone()
            .ok_or_else(|| Error::Channel("Pipeline is closed".to_string()))?;
        tx.send(metric).await.map_err(|e| Error::Channel(e.to_string()))?;
        Ok(())
    }

    /// Submit a batch of samples; returns how many were accepted
    pub async fn submit_batch(&self, metrics: Vec<Metric>) -> Result<usize> {
        let mut count = 0;
        for metric in metrics {
            if self.submit(metric).await.is_ok() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Stop accepting samples; `start` returns once the queue is drained
    pub fn close(&self) {
        if self.metric_tx.lock().take().is_some() {
            debug!("Pipeline closed for new metrics");
        }
    }

    /// Run the processing loop until the pipeline is closed
    pub async fn start(&self) -> Result<()> {
        let mut metric_rx = self
            .metric_rx
            .lock()
            .take()
            .ok_or_else(|| Error::Channel("Pipeline already started".to_string()))?;

        let batch_size = self.config.batch_size.max(1);
        let batch_timeout = Duration::from_millis(self.config.batch_timeout_ms.max(1));

        info!(
            "Pipeline started (batch_size={}, timeout={}ms)",
            batch_size, self.config.batch_timeout_ms
        );

        let mut batch: Vec<Metric> = Vec::with_capacity(batch_size);
        let mut flush_interval = interval(batch_timeout);

        loop {
            tokio::select! {
                received = metric_rx.recv() => match received {
                    Some(metric) => {
                        batch.push(metric);
                        if batch.len() >= batch_size {
                            self.flush_batch(&mut batch).await;
                        }
                    }
                    None => {
                        if !batch.is_empty() {
                            self.flush_batch(&mut batch).await;
                        }
                        info!("Pipeline stopped");
                        break;
                    }
                },

                _ = flush_interval.tick() => {
                    if !batch.is_empty() {
                        self.flush_batch(&mut batch).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn flush_batch(&self, batch: &mut Vec<Metric>) {
        let metrics = std::mem::take(batch);
        debug!(count = metrics.len(), "Flushing metric batch");

        if let Some(writer) = &self.writer {
            if let Err(e) = writer.write_metrics(&metrics) {
                error!(error = %e, "Failed to store metrics");
            }
        }

        match self.engine.process_metrics(&metrics).await {
            Ok(fired) => {
                self.triggered.fetch_add(fired as u64, Ordering::Relaxed);
            }
            Err(e) => error!(error = %e, "Failed to evaluate alerts"),
        }
        self.processed.fetch_add(metrics.len() as u64, Ordering::Relaxed);
    }

    /// Get pipeline statistics
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            queue_capacity: self.metric_tx.lock().as_ref().map_or(0, mpsc::Sender::capacity),
            queue_max_capacity: self.config.channel_capacity,
            processed: self.processed.load(Ordering::Relaxed),
            triggered: self.triggered.load(Ordering::Relaxed),
        }
    }
}

/// Pipeline statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Free slots in the queue
    pub queue_capacity: usize,
    /// Queue size
    pub queue_max_capacity: usize,
    /// Samples evaluated so far
    pub processed: u64,
    /// Alerts fired so far
    pub triggered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::action::test_support::RecordingDispatcher;
    use crate::alerting::action::InMemoryCatalog;
    use crate::alerting::query::{AlertQuery, Condition, TriggerExpression};
    use crate::grammar::Comparator;
    use crate::models::{ActionKind, ActionRecord, AlertRecord, MetricId};
    use crate::store::InMemoryStore;
    use crate::time::MS_PER_MINUTE;
    use pretty_assertions::assert_eq;

    fn load() -> MetricId {
        MetricId::new("host1", "cpu", "load")
    }

    fn pipeline(dispatcher: Arc<RecordingDispatcher>) -> AlertPipeline {
        let catalog = InMemoryCatalog::with_records(
            [AlertRecord::new(1, "load")],
            [ActionRecord::new(1, "page", ActionKind::Log)],
        );
        let engine = AlertEngine::new(Arc::new(catalog), dispatcher);
        let trigger = TriggerExpression::new(Condition::new(Comparator::GreaterThan, 0.9)).with_duration(5 * MS_PER_MINUTE);
        engine.add_or_update_alert_queries([AlertQuery::new(&load(), trigger, "page").unwrap().with_alert_id(1)]);

        let config = AlertingConfig {
            batch_size: 4,
            ..AlertingConfig::default()
        };
        AlertPipeline::new(config, Arc::new(engine))
    }

    #[tokio::test]
    async fn test_pipeline_drains_and_fires() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline(dispatcher.clone()).with_writer(store.clone());

        let metrics: Vec<Metric> = (0..10).map(|m| Metric::new(load(), m * MS_PER_MINUTE, 0.95, "")).collect();
        assert_eq!(pipeline.submit_batch(metrics).await.unwrap(), 10);
        pipeline.close();
        pipeline.start().await.unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.processed, 10);
        // minutes 6 through 9
        assert_eq!(stats.triggered, 4);
        assert_eq!(dispatcher.fired.lock().len(), 4);
        assert_eq!(store.len(), 10);
    }

    #[tokio::test]
    async fn test_closed_pipeline_rejects_and_cannot_restart() {
        let pipeline = pipeline(Arc::new(RecordingDispatcher::default()));
        pipeline.close();
        assert!(pipeline.submit(Metric::new(load(), 0, 1.0, "")).await.is_err());

        pipeline.start().await.unwrap();
        assert_eq!(
            pipeline.start().await.unwrap_err().to_string(),
            "Channel error: Pipeline already started"
        );
    }
}
