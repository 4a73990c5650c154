//! Batch orchestration over a full image list.
//!
//! Images are processed in fixed-size groups. Every image of a group runs as
//! its own task; the next group starts only once the previous one has fully
//! resolved, so at most `group_size × prompts` provider calls are in flight.
//!
//! Completed results are appended to an in-memory accumulator and streamed
//! to the caller as [`RunEvent`]s. The accumulator is checkpointed every
//! `checkpoint_every` images or `checkpoint_interval`, whichever comes first.
//! Periodic flushes run detached from the loop on a snapshot of the results;
//! the terminal flush is awaited.

use super::analyzer::ImageAnalyzer;
use super::checkpoint::{new_run_id, CheckpointWriter, RunMetadata};
use super::evaluator::{EvaluatorOptions, PromptEvaluator};
use super::limiter::RateLimiter;
use crate::config::{BatchConfig, Config};
use crate::error::{ArgusError, Result};
use crate::provider::VisionProvider;
use crate::store::ObjectStore;
use crate::types::{ImageAnalysisResult, ImageTask, PromptSpec, RunSummary};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Buffered events before the run waits on a slow consumer.
const EVENT_BUFFER: usize = 64;

/// Batching and checkpoint settings for one orchestrator.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Images analyzed concurrently per group
    pub group_size: usize,
    /// Flush when the results count reaches a multiple of this
    pub checkpoint_every: usize,
    /// Flush when this much time passed since the last flush
    pub checkpoint_interval: Duration,
    /// Store prefix for checkpoint documents
    pub checkpoint_prefix: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

impl BatchOptions {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            group_size: config.group_size.max(1),
            checkpoint_every: config.checkpoint_every.max(1),
            checkpoint_interval: Duration::from_secs(config.checkpoint_interval_secs),
            checkpoint_prefix: config.checkpoint_prefix.clone(),
        }
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    #[serde(rename_all = "camelCase")]
    Start {
        run_id: String,
        total: usize,
        prompts: usize,
    },
    /// `current` counts completed images regardless of their status
    Progress {
        current: usize,
        total: usize,
        matched: usize,
    },
    ImageCompleted { result: ImageAnalysisResult },
    CheckpointSaved { path: String },
    /// Terminal failure; emitted at most once per run
    Error {
        message: String,
        checkpoint: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        final_path: Option<String>,
        summary: RunSummary,
    },
}

/// A run started with [`BatchOrchestrator::submit`].
pub struct RunHandle {
    /// Event stream; closes when the run and all of its flushes are done
    pub events: mpsc::Receiver<RunEvent>,
    run_id: String,
    join: JoinHandle<Result<Vec<ImageAnalysisResult>>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Wait for the run to end, discarding any unread events.
    pub async fn finish(self) -> Result<Vec<ImageAnalysisResult>> {
        drop(self.events);
        let run_id = self.run_id;
        self.join.await.map_err(|e| ArgusError::Run {
            run_id,
            completed: 0,
            message: format!("run task failed: {e}"),
        })?
    }
}

/// Drives the image analyzer over a batch with periodic checkpoints.
pub struct BatchOrchestrator {
    analyzer: Arc<ImageAnalyzer>,
    store: Arc<dyn ObjectStore>,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(analyzer: Arc<ImageAnalyzer>, store: Arc<dyn ObjectStore>, options: BatchOptions) -> Self {
        Self {
            analyzer,
            store,
            options,
        }
    }

    /// Wire limiter, evaluator and analyzer from configuration.
    ///
    /// The limiter is owned by this orchestrator, so separate orchestrators
    /// never share rate-limit state.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn VisionProvider>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.limits));
        let evaluator = Arc::new(PromptEvaluator::new(
            provider,
            store.clone(),
            limiter,
            EvaluatorOptions::from_config(config),
        ));
        let analyzer = Arc::new(ImageAnalyzer::new(
            evaluator,
            store.clone(),
            config.store.url_ttl(),
            config.batch.prompt_mode,
        ));
        Self::new(analyzer, store, BatchOptions::from_config(&config.batch))
    }

    /// Start a run in the background and return its event stream.
    pub fn submit(
        self: &Arc<Self>,
        tasks: Vec<ImageTask>,
        prompts: Vec<PromptSpec>,
        metadata: RunMetadata,
    ) -> RunHandle {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let run_id = new_run_id(&metadata);
        let this = Arc::clone(self);
        let id = run_id.clone();
        let join =
            tokio::spawn(async move { this.run(id, tasks, prompts, metadata, tx).await });
        RunHandle {
            events: rx,
            run_id,
            join,
        }
    }

    /// Analyze every task against `prompts`, streaming events to `events`.
    ///
    /// Returns all image results on completion. Per-prompt and per-image
    /// failures are recorded in the results; only a failure of the loop
    /// itself (a panicking image task, or a failed terminal flush) ends the
    /// run early, after a best-effort partial checkpoint.
    async fn run(
        &self,
        run_id: String,
        tasks: Vec<ImageTask>,
        prompts: Vec<PromptSpec>,
        metadata: RunMetadata,
        events: mpsc::Sender<RunEvent>,
    ) -> Result<Vec<ImageAnalysisResult>> {
        let total = tasks.len();
        let writer = Arc::new(CheckpointWriter::new(
            self.store.clone(),
            &self.options.checkpoint_prefix,
            run_id.clone(),
            metadata,
            total,
        ));
        let prompts: Arc<[PromptSpec]> = prompts.into();

        tracing::info!(
            "Starting run {run_id}: {total} images × {} prompts (groups of {})",
            prompts.len(),
            self.options.group_size
        );
        emit(
            &events,
            RunEvent::Start {
                run_id: run_id.clone(),
                total,
                prompts: prompts.len(),
            },
        )
        .await;

        let mut run = RunState {
            writer,
            events,
            results: Vec::with_capacity(total),
            matched: 0,
            pending: Vec::new(),
            last_flush: Instant::now(),
        };

        let mut tasks = tasks.into_iter();
        for size in group_sizes(total, self.options.group_size) {
            let mut aborts = Vec::with_capacity(size);
            let mut group: FuturesUnordered<JoinHandle<ImageAnalysisResult>> = FuturesUnordered::new();
            for task in tasks.by_ref().take(size) {
                let analyzer = self.analyzer.clone();
                let prompts = prompts.clone();
                let handle = tokio::spawn(async move { analyzer.analyze(&task, &prompts).await });
                aborts.push(handle.abort_handle());
                group.push(handle);
            }

            while let Some(joined) = group.next().await {
                match joined {
                    Ok(result) => self.record(&mut run, result, total).await,
                    Err(e) => {
                        for abort in &aborts {
                            abort.abort();
                        }
                        return Err(run.fail(format!("image task failed: {e}")).await);
                    }
                }
            }
        }

        run.drain_pending().await;
        let snapshot = run.results.len();
        if let Err(e) = run.writer.flush(snapshot, &run.results, false).await {
            return Err(run.fail(format!("final checkpoint failed: {e}")).await);
        }

        let path = run.writer.path().to_string();
        let summary = RunSummary::from_results(&run.results);
        tracing::info!(
            "Run {run_id} complete: {} succeeded, {} failed, {} matched → {path}",
            summary.successful,
            summary.failed,
            summary.matched
        );
        emit(&run.events, RunEvent::CheckpointSaved { path: path.clone() }).await;
        emit(
            &run.events,
            RunEvent::Complete {
                final_path: Some(path),
                summary,
            },
        )
        .await;

        Ok(run.results)
    }

    async fn record(&self, run: &mut RunState, result: ImageAnalysisResult, total: usize) {
        if result.any_match() {
            run.matched += 1;
        }
        run.results.push(result.clone());
        let current = run.results.len();

        emit(&run.events, RunEvent::ImageCompleted { result }).await;
        emit(
            &run.events,
            RunEvent::Progress {
                current,
                total,
                matched: run.matched,
            },
        )
        .await;

        let due_by_count = current % self.options.checkpoint_every == 0;
        let due_by_time = run.last_flush.elapsed() >= self.options.checkpoint_interval;
        if (due_by_count || due_by_time) && current < total {
            run.spawn_flush();
        }
    }
}

/// Mutable state of one run, owned by the processing loop.
struct RunState {
    writer: Arc<CheckpointWriter>,
    events: mpsc::Sender<RunEvent>,
    results: Vec<ImageAnalysisResult>,
    matched: usize,
    pending: Vec<JoinHandle<()>>,
    last_flush: Instant,
}

impl RunState {
    /// Checkpoint a snapshot without blocking the loop.
    fn spawn_flush(&mut self) {
        self.last_flush = Instant::now();
        self.pending.retain(|handle| !handle.is_finished());

        let snapshot = self.results.clone();
        let writer = self.writer.clone();
        let events = self.events.clone();
        self.pending.push(tokio::spawn(async move {
            match writer.flush(snapshot.len(), &snapshot, true).await {
                Ok(true) => {
                    emit(
                        &events,
                        RunEvent::CheckpointSaved {
                            path: writer.path().to_string(),
                        },
                    )
                    .await
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Checkpoint flush failed, continuing: {e}"),
            }
        }));
    }

    /// Let every in-flight flush finish before the checkpoint is touched again.
    async fn drain_pending(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!("Checkpoint flush task failed: {e}");
            }
        }
    }

    /// Persist what was accumulated, emit the terminal error, and build the
    /// error returned to the caller.
    async fn fail(&mut self, message: String) -> ArgusError {
        let run_id = self.writer.run_id().to_string();
        let completed = self.results.len();
        tracing::error!("Run {run_id} failed after {completed} image(s): {message}");

        self.drain_pending().await;
        if completed > 0 {
            if let Err(e) = self.writer.flush(completed, &self.results, true).await {
                tracing::warn!("Could not save partial checkpoint: {e}");
            }
        }
        let checkpoint = if self.writer.has_written().await {
            Some(self.writer.path().to_string())
        } else {
            None
        };

        emit(
            &self.events,
            RunEvent::Error {
                message: message.clone(),
                checkpoint,
            },
        )
        .await;

        ArgusError::Run {
            run_id,
            completed,
            message,
        }
    }
}

/// Send an event; a dropped receiver does not stop the run.
async fn emit(events: &mpsc::Sender<RunEvent>, event: RunEvent) {
    let _ = events.send(event).await;
}

/// Sizes of the sequential concurrency groups for `total` images.
pub(crate) fn group_sizes(total: usize, group_size: usize) -> Vec<usize> {
    let group_size = group_size.max(1);
    (0..total)
        .step_by(group_size)
        .map(|start| group_size.min(total - start))
        .collect()
}
