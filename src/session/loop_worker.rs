use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinSet,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    quiz::{AnswerOutcome, CheckError, CheckGenerator, CheckRequest, ComprehensionCheck},
    tracker::{TickOutcome, VisibilityChange},
};

use super::{ReadingSession, SessionSnapshot};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

type Completion = (String, Result<ComprehensionCheck, CheckError>);

pub(crate) enum SessionCommand {
    Visibility(Vec<VisibilityChange>),
    SetSilenced {
        /// `None` toggles.
        silenced: Option<bool>,
        reply: oneshot::Sender<bool>,
    },
    Answer {
        selected: usize,
        reply: oneshot::Sender<Result<AnswerOutcome>>,
    },
    Dismiss {
        reply: oneshot::Sender<bool>,
    },
}

/// Single logical thread for one content-unit list. All stat store mutation
/// happens here.
///
/// The select is biased so that commands (visibility batches included) queued
/// before a tick are applied before that tick reads the active set.
pub(crate) async fn session_loop(
    mut session: ReadingSession,
    generator: Arc<dyn CheckGenerator>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight: JoinSet<Completion> = JoinSet::new();
    let generation = session.generation();

    log_info!(
        "session loop {} started with {} units",
        generation,
        session.store().len()
    );
    // The controller already published the reset snapshot.
    let mut published = session.revision();

    loop {
        let request = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("session loop {} shutting down", generation);
                break;
            }
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut session, command),
                None => {
                    log_info!("session loop {} lost its controller", generation);
                    break;
                }
            },
            Some(joined) = in_flight.join_next() => match joined {
                Ok((unit_id, result)) => session.complete_check(&unit_id, result),
                Err(err) => {
                    log_error!("check generation task failed: {err}");
                    let pending = session.orchestrator().in_flight_unit().map(str::to_string);
                    pending.and_then(|unit_id| {
                        session.complete_check(&unit_id, Err(CheckError::Aborted(err.to_string())))
                    })
                }
            },
            _ = ticker.tick() => {
                let (outcome, request) = session.tick();
                if let TickOutcome::Accrued { unit_id, dwell_seconds, became_stuck: true } = &outcome {
                    log_info!("unit {} stuck after {}s", unit_id, dwell_seconds);
                }
                request
            }
        };

        if let Some(request) = request {
            dispatch(&mut in_flight, generator.clone(), request);
        }
        if session.revision() != published {
            published = session.revision();
            snapshots.send_replace(session.snapshot());
        }
    }

    in_flight.abort_all();
}

fn handle_command(session: &mut ReadingSession, command: SessionCommand) -> Option<CheckRequest> {
    match command {
        SessionCommand::Visibility(batch) => {
            let (outcome, request) = session.apply_visibility(&batch);
            if outcome.ignored > 0 {
                log_warn!("ignored {} visibility changes for unknown units", outcome.ignored);
            }
            request
        }
        SessionCommand::SetSilenced { silenced, reply } => {
            let (silenced, request) = match silenced {
                Some(value) => (value, session.set_silenced(value)),
                None => session.toggle_silenced(),
            };
            let _ = reply.send(silenced);
            request
        }
        SessionCommand::Answer { selected, reply } => {
            let _ = reply.send(session.answer_check(selected));
            None
        }
        SessionCommand::Dismiss { reply } => {
            let (dismissed, request) = session.dismiss_check();
            let _ = reply.send(dismissed);
            request
        }
    }
}

fn dispatch(
    in_flight: &mut JoinSet<Completion>,
    generator: Arc<dyn CheckGenerator>,
    request: CheckRequest,
) {
    in_flight.spawn(async move {
        let result = generator.generate(&request).await;
        (request.unit_id, result)
    });
}
