use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;
use tokio::{
    sync::{mpsc, oneshot, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    models::ContentUnit,
    quiz::{AnswerOutcome, CheckGenerator},
    tracker::{TrackingConfig, VisibilityChange},
};

use super::{
    loop_worker::{session_loop, SessionCommand},
    ReadingSession, SessionSnapshot,
};

struct RunningSession {
    generation: u64,
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

struct ControllerInner {
    running: Option<RunningSession>,
    generation: u64,
    config: TrackingConfig,
}

/// Cloneable handle the presentation layer drives a reading session through.
///
/// Owns at most one session loop. Replacing the content-unit list stops the
/// old loop, and any check generation it started, before the new one starts.
/// Subscribers obtained from [`SessionController::subscribe`] keep receiving
/// snapshots across replacements.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<ControllerInner>>,
    generator: Arc<dyn CheckGenerator>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionController {
    pub fn new(generator: Arc<dyn CheckGenerator>, config: TrackingConfig) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Mutex::new(ControllerInner {
                running: None,
                generation: 0,
                config,
            })),
            generator,
            snapshots: Arc::new(snapshots),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Supplies or replaces the content-unit list. All tracking state starts
    /// over: stats, active set, checked set and counters. Returns the new
    /// generation number.
    pub async fn load_units(&self, units: Vec<ContentUnit>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        inner
            .config
            .validate()
            .context("refusing to start a session with invalid tracking config")?;

        if let Some(previous) = inner.running.take() {
            stop_running(previous).await?;
        }

        inner.generation += 1;
        let generation = inner.generation;
        let session = ReadingSession::new(generation, &units, &inner.config);

        // Publish the reset state before the loop can touch it.
        self.snapshots.send_replace(session.snapshot());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(session_loop(
            session,
            self.generator.clone(),
            command_rx,
            self.snapshots.clone(),
            inner.config.tick_interval(),
            cancel_token.clone(),
        ));

        inner.running = Some(RunningSession {
            generation,
            commands: command_tx,
            cancel_token,
            handle,
        });

        info!("Loaded {} content units (generation {})", units.len(), generation);
        Ok(generation)
    }

    /// Queues one batch of visibility changes; it is applied atomically.
    pub async fn push_visibility(&self, batch: Vec<VisibilityChange>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.send(SessionCommand::Visibility(batch)).await
    }

    pub async fn set_silenced(&self, silenced: bool) -> Result<bool> {
        self.request(|reply| SessionCommand::SetSilenced {
            silenced: Some(silenced),
            reply,
        })
        .await
    }

    pub async fn toggle_silenced(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::SetSilenced {
            silenced: None,
            reply,
        })
        .await
    }

    pub async fn answer_check(&self, selected: usize) -> Result<AnswerOutcome> {
        self.request(|reply| SessionCommand::Answer { selected, reply })
            .await?
    }

    /// Closes the check on screen. Returns false if nothing was shown.
    pub async fn dismiss_check(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::Dismiss { reply }).await
    }

    pub async fn current_generation(&self) -> Option<u64> {
        self.inner
            .lock()
            .await
            .running
            .as_ref()
            .map(|running| running.generation)
    }

    pub async fn shutdown(&self) -> Result<()> {
        let running = self.inner.lock().await.running.take();
        match running {
            Some(running) => stop_running(running).await,
            None => Ok(()),
        }
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        let inner = self.inner.lock().await;
        let running = inner
            .running
            .as_ref()
            .ok_or_else(|| anyhow!("no content loaded"))?;
        running
            .commands
            .send(command)
            .map_err(|_| anyhow!("session loop {} is not running", running.generation))
    }

    async fn request<T, F>(&self, build: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> SessionCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(build(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| anyhow!("session loop stopped before replying"))
    }
}

async fn stop_running(running: RunningSession) -> Result<()> {
    running.cancel_token.cancel();
    running
        .handle
        .await
        .with_context(|| format!("session loop {} failed to join", running.generation))
}
