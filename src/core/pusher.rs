use crate::core::bulk::{build_bulk_frame, BulkFrameBuilder};
use crate::core::interaction::parse_interaction;
use crate::domain::model::{InputType, InteractionRecord, LogEntry};
use crate::domain::ports::{ConfigProvider, IndexSink, Storage};
use crate::utils::error::{PusherError, Result};
use crate::utils::logger::ForwardedLog;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

const INDEX_EXISTS: &str = "resource_already_exists_exception";

/// What happened to one push.
#[derive(Debug)]
pub enum PushOutcome {
    /// The sink accepted the payload.
    Pushed { documents: usize },
    /// The sink rejected the payload. Already logged; not fatal.
    Failed(PusherError),
    /// Nothing to push.
    Skipped,
}

impl PushOutcome {
    pub fn is_pushed(&self) -> bool {
        matches!(self, PushOutcome::Pushed { .. })
    }
}

/// Reads one input file, turns it into documents and hands them to the sink.
pub struct Pusher<S: Storage, K: IndexSink, C: ConfigProvider> {
    storage: S,
    sink: K,
    config: C,
}

impl<S: Storage, K: IndexSink, C: ConfigProvider> Pusher<S, K, C> {
    pub fn new(storage: S, sink: K, config: C) -> Self {
        Self {
            storage,
            sink,
            config,
        }
    }

    /// Pushes the configured input file. Read errors are returned; sink
    /// errors are logged and reported through [`PushOutcome::Failed`].
    pub async fn push_file(&self) -> Result<PushOutcome> {
        if let Some(mapping_file) = self.config.index_mapping() {
            if let Some(failed) = self.prepare_index(mapping_file).await? {
                return Ok(failed);
            }
        }

        let Some(file) = self.config.input_file() else {
            tracing::info!("No input specified (piping currently not supported). Exiting program!");
            return Ok(PushOutcome::Skipped);
        };

        let index = self.config.index_name();
        let project = self.config.project();

        let outcome = match self.config.input_type() {
            InputType::Json => {
                tracing::info!(
                    "Pushing JSON file {} to index {} for project {}",
                    file,
                    index,
                    project
                );
                self.push_json_lines(file).await?
            }
            InputType::Raw => {
                tracing::info!(
                    "Pushing RAW file {} to index {} for project {} and host {}",
                    file,
                    index,
                    project,
                    self.config.host()
                );
                self.push_interaction(file).await?
            }
            InputType::Other => {
                tracing::info!(
                    "Pushing other file {} to index {} for project {}",
                    file,
                    index,
                    project
                );
                self.push_blob(file).await?
            }
        };

        tracing::info!("elasticPusher finished");
        Ok(outcome)
    }

    /// Creates the target index from a mapping file. An index that already
    /// exists is fine; any other rejection stops the push.
    async fn prepare_index(&self, mapping_file: &str) -> Result<Option<PushOutcome>> {
        let mapping = self.storage.read_file(mapping_file).await?;
        let mapping = String::from_utf8_lossy(&mapping);
        let index = self.config.index_name();

        match self.sink.create_index(index, &mapping).await {
            Ok(()) => {
                tracing::info!("Created index {} from {}", index, mapping_file);
                Ok(None)
            }
            Err(PusherError::SinkError { error_type, .. }) if error_type == INDEX_EXISTS => {
                tracing::info!("Index {} already exists", index);
                Ok(None)
            }
            Err(e) => {
                tracing::error!("Creating index {} failed: {}", index, e);
                Ok(Some(PushOutcome::Failed(e)))
            }
        }
    }

    async fn push_json_lines(&self, file: &str) -> Result<PushOutcome> {
        let data = self.storage.read_file(file).await?;
        let index = self.config.index_name();
        let project = self.config.project();

        let (frame, documents) = if self.config.validate_json() {
            let mut builder = BulkFrameBuilder::new(index, project).with_validation(true);
            builder.push_lines(&data)?;
            let documents = builder.document_count();
            (builder.finish(), documents)
        } else {
            // one action/document pair per line, trailing empty line included
            let documents = data.split(|b| *b == b'\n').count();
            (build_bulk_frame(&data, index, project), documents)
        };

        Ok(Self::deliver(self.sink.bulk_write(index, frame), documents).await)
    }

    async fn push_interaction(&self, file: &str) -> Result<PushOutcome> {
        let data = self.storage.read_file(file).await?;
        let parsed = parse_interaction(&data);
        let record = InteractionRecord::from_parsed(
            parsed,
            Utc::now(),
            self.config.project(),
            self.config.host(),
        );
        self.send_document(&record).await
    }

    async fn push_blob(&self, file: &str) -> Result<PushOutcome> {
        let data = self.storage.read_file(file).await?;
        let content = String::from_utf8_lossy(&data).into_owned();
        let record = InteractionRecord::from_raw(content, Utc::now(), self.config.project());
        self.send_document(&record).await
    }

    /// Ships a single log line to the index as its own document.
    pub async fn push_log(&self, entry: &str, level: &str) -> Result<PushOutcome> {
        let log_entry = LogEntry {
            timestamp: Utc::now(),
            project_name: self.config.project().to_string(),
            host_name: self.config.host().to_string(),
            entry: entry.to_string(),
            level: level.to_string(),
        };
        self.send_document(&log_entry).await
    }

    async fn forward_log(&self, log: ForwardedLog) -> usize {
        match self.push_log(&log.entry, &log.level).await {
            Ok(PushOutcome::Pushed { .. }) => 1,
            Ok(_) => 0,
            Err(e) => {
                tracing::error!("Forwarding log line failed: {}", e);
                0
            }
        }
    }

    async fn send_document<T: serde::Serialize + Sync>(&self, document: &T) -> Result<PushOutcome> {
        let body = serde_json::to_vec(document)?;
        Ok(Self::deliver(self.sink.create_document(self.config.index_name(), body), 1).await)
    }

    async fn deliver<F>(request: F, documents: usize) -> PushOutcome
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match request.await {
            Ok(()) => PushOutcome::Pushed { documents },
            Err(e) => {
                tracing::error!("Pushing failed: {}", e);
                PushOutcome::Failed(e)
            }
        }
    }
}

/// Background task shipping forwarded log lines through [`Pusher::push_log`].
pub struct LogForwarder {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<usize>,
}

impl LogForwarder {
    pub fn spawn<S, K, C>(
        pusher: Arc<Pusher<S, K, C>>,
        mut logs: UnboundedReceiver<ForwardedLog>,
    ) -> Self
    where
        S: Storage + 'static,
        K: IndexSink + 'static,
        C: ConfigProvider + 'static,
    {
        let (shutdown, mut stop) = oneshot::channel::<()>();

        let task = async move {
            let mut forwarded = 0;
            loop {
                tokio::select! {
                    biased;
                    Some(log) = logs.recv() => {
                        forwarded += pusher.forward_log(log).await;
                    }
                    _ = &mut stop => break,
                }
            }

            // 停止接收後, 送出佇列中剩餘的紀錄
            logs.close();
            while let Some(log) = logs.recv().await {
                forwarded += pusher.forward_log(log).await;
            }
            forwarded
        };

        // must match utils::logger::FORWARDING_SPAN
        let handle = tokio::spawn(task.instrument(tracing::error_span!("log_forwarding")));
        Self { shutdown, handle }
    }

    /// Flushes queued lines and stops the task. Returns how many lines the
    /// sink accepted.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap_or(0)
    }
}
