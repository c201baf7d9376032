use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::{
    runtime::{Builder, Handle},
    task::JoinHandle,
};

/// Builder for [`QuakeTelemetry`].
pub struct QuakeTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl QuakeTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Debug,
            event_publisher: None,
        }
    }

    /// Sets the JSON-lines log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops log records below `level`.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<QuakeTelemetry> {
        let logger = self
            .log_path
            .map(|path| JsonLogger::with_min_level(path, self.min_level))
            .transpose()?;
        Ok(QuakeTelemetry {
            module: Arc::from(self.module),
            sinks: Arc::new(Sinks {
                logger,
                publisher: self.event_publisher,
                pending: Mutex::new(Vec::new()),
            }),
        })
    }
}

struct Sinks {
    logger: Option<JsonLogger>,
    publisher: Option<Arc<dyn EventPublisher>>,
    /// Publishes spawned on a runtime and not yet awaited by [`QuakeTelemetry::flush`].
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// Cloneable telemetry handle. Clones and [`QuakeTelemetry::scoped`] handles share sinks.
#[derive(Clone)]
pub struct QuakeTelemetry {
    module: Arc<str>,
    sinks: Arc<Sinks>,
}

impl fmt::Debug for QuakeTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuakeTelemetry")
            .field("module", &self.module)
            .field("logs", &self.sinks.logger.as_ref().map(JsonLogger::path))
            .field("events", &self.sinks.publisher.is_some())
            .finish()
    }
}

impl QuakeTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> QuakeTelemetryBuilder {
        QuakeTelemetryBuilder::new(module)
    }

    /// Same sinks, different module name.
    #[must_use]
    pub fn scoped(&self, module: &str) -> Self {
        Self {
            module: Arc::from(module),
            sinks: Arc::clone(&self.sinks),
        }
    }

    /// Module name stamped on records.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.sinks.logger {
            let mut record = LogRecord::new(self.module.as_ref(), level, message);
            if let Value::Object(fields) = metadata {
                record.metadata = fields;
            }
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Emits an event on the bus.
    ///
    /// Inside a tokio runtime (including blocking tasks) the publish is spawned
    /// and tracked until [`QuakeTelemetry::flush`]; outside one it runs on a
    /// throwaway current-thread runtime.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        let Some(publisher) = &self.sinks.publisher else {
            return Ok(());
        };
        let record = EventRecord::new(self.module.as_ref(), event_type, payload);
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(publisher);
            let task = handle.spawn(async move {
                if let Err(err) = publisher.publish(record).await {
                    eprintln!("telemetry event publish failed: {err:?}");
                }
            });
            let mut pending = self.sinks.pending.lock();
            pending.retain(|task| !task.is_finished());
            pending.push(task);
            Ok(())
        } else {
            Builder::new_current_thread()
                .build()?
                .block_on(publisher.publish(record))
        }
    }

    /// Waits for every spawned publish. Call before the runtime shuts down,
    /// otherwise in-flight events are dropped with it.
    pub async fn flush(&self) {
        loop {
            let pending = std::mem::take(&mut *self.sinks.pending.lock());
            if pending.is_empty() {
                break;
            }
            for task in pending {
                let _ = task.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::{EventSubscriber, FileEventPublisher, MemoryEventBus};
    use tempfile::tempdir;

    #[test]
    fn writes_log_and_event_outside_runtime() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("quake.log");
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = QuakeTelemetry::builder("catalog")
            .log_path(&path)
            .min_level(LogLevel::Info)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Debug, "catalog.debug", json!({}))
            .unwrap();
        telemetry
            .scoped("heatmap")
            .log(LogLevel::Warn, "heatmap.record.skipped", json!({ "index": 3 }))
            .unwrap();
        telemetry
            .event("catalog.fetch.completed", json!({ "events": 2 }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("catalog.debug"));
        assert!(content.contains("\"module\":\"heatmap\""));
        assert_eq!(bus.events_of_type("catalog.fetch.completed").len(), 1);
    }

    #[tokio::test]
    async fn spawns_publish_inside_runtime() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let mut rx = bus.subscribe().await.unwrap();
        let telemetry = QuakeTelemetry::builder("forecast")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .event("forecast.state.changed", json!({ "to": "training" }))
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.source, "forecast");
    }

    #[test]
    fn flushed_events_survive_runtime_shutdown() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        let telemetry = QuakeTelemetry::builder("forecast")
            .event_publisher(Arc::new(FileEventPublisher::new(&path).unwrap()))
            .build()
            .unwrap();
        let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            for kind in ["forecast.training.completed", "forecast.artifact.swapped"] {
                telemetry.event(kind, json!({})).unwrap();
            }
            telemetry.flush().await;
        });
        drop(runtime);

        let content = std::fs::read_to_string(&path).unwrap();
        let kinds: Vec<String> = content
            .lines()
            .map(|line| serde_json::from_str::<EventRecord>(line).unwrap().event_type)
            .collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&"forecast.training.completed".to_string()));
        assert!(telemetry.sinks.pending.lock().is_empty());
    }
}
