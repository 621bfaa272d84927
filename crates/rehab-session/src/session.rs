//! Async exercise session loop.
//!
//! One session owns one frame loop: frames are pulled from a [`PoseSource`],
//! fed to an [`ExerciseTracker`], and optionally forwarded to a UI as
//! [`FrameUpdate`]s. The loop ends when the stream ends, the target rep
//! count is reached, the stop handle fires, the wall-clock ceiling passes,
//! or the source fails. The source is closed on every one of these paths.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

use rehab_core::{Error, ExerciseKind, OptimalRange, Result, SessionId, SessionResult};
use rehab_motion::{ExerciseTracker, FrameUpdate, Guidance, TrackerStats};

use crate::config::SessionConfig;
use crate::source::PoseSource;
use crate::store::{ExerciseStore, PatientStore};

/// Cooperative cancellation shared between a running loop and its controller.
///
/// The loop observes the flag between frames.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<RwLock<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stop(&self) {
        *self.stopped.write().await = true;
    }

    pub async fn is_stopped(&self) -> bool {
        *self.stopped.read().await
    }
}

/// Why a frame loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    StreamEnded,
    TargetReached,
    Stopped,
    TimeLimit,
    SourceLost,
}

/// Outcome of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub exercise: String,
    pub result: SessionResult,
    pub stop_reason: StopReason,
    pub frames: TrackerStats,
    pub guidance: Guidance,
}

/// A configured, ready-to-run exercise session
pub struct ExerciseSession {
    id: SessionId,
    config: SessionConfig,
    kind: ExerciseKind,
    optimal_range: Option<OptimalRange>,
    stop: StopHandle,
    updates: Option<mpsc::Sender<FrameUpdate>>,
}

impl ExerciseSession {
    /// Session without stored definitions or patient data
    pub fn new(config: SessionConfig) -> Result<Self> {
        let kind = ExerciseKind::resolve(&config.exercise, config.joint_limits.as_ref(), None)?;
        let optimal_range = OptimalRange::resolve(&config.exercise, config.optimal_range, None, None);
        Ok(Self::with_kind(config, kind, optimal_range))
    }

    /// Resolve the exercise, optimal range and target reps from storage.
    ///
    /// With a patient, an unset target is taken from their assignment.
    pub async fn prepare<S>(mut config: SessionConfig, store: &S, patient: Option<&str>) -> Result<Self>
    where
        S: ExerciseStore + PatientStore + ?Sized,
    {
        let definition = store.exercise(&config.exercise).await?;
        let kind = ExerciseKind::resolve(
            &config.exercise,
            config.joint_limits.as_ref(),
            definition.as_ref(),
        )?;

        let record = match patient {
            Some(username) => Some(store.patient(username).await?.ok_or_else(|| {
                Error::InvalidInput(format!("unknown patient '{username}'"))
            })?),
            None => None,
        };

        if let (Some(record), None) = (&record, config.target_reps) {
            config.target_reps = Some(record.target_reps(&config.exercise, kind.is_custom())?);
        }

        let optimal_range = OptimalRange::resolve(
            &config.exercise,
            config.optimal_range,
            record.as_ref().and_then(|r| r.optimal_range(&config.exercise)),
            definition.as_ref(),
        );

        Ok(Self::with_kind(config, kind, optimal_range))
    }

    fn with_kind(config: SessionConfig, kind: ExerciseKind, optimal_range: Option<OptimalRange>) -> Self {
        Self {
            id: SessionId::new(),
            config,
            kind,
            optimal_range,
            stop: StopHandle::new(),
            updates: None,
        }
    }

    /// Forward every frame update on `tx`; a full or closed channel drops updates
    pub fn with_updates(mut self, tx: mpsc::Sender<FrameUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn kind(&self) -> &ExerciseKind {
        &self.kind
    }

    pub fn optimal_range(&self) -> Option<OptimalRange> {
        self.optimal_range
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run the frame loop to completion.
    ///
    /// Fails only when the source cannot be opened; callers that need a
    /// record anyway can use [`SessionResult::empty`].
    pub async fn run<P>(&self, source: &mut P) -> Result<SessionReport>
    where
        P: PoseSource + ?Sized,
    {
        tracing::info!(
            session_id = %self.id,
            exercise = %self.config.exercise,
            joint = %self.kind.tracked_joint(),
            source = %source.describe(),
            source_index = self.config.source_index,
            target_reps = ?self.config.target_reps,
            "session starting"
        );

        if let Err(e) = source.open().await {
            tracing::error!(session_id = %self.id, "pose source unavailable: {}", e);
            return Err(match e {
                Error::SourceUnavailable(_) => e,
                other => Error::SourceUnavailable(other.to_string()),
            });
        }

        let (tracker, stop_reason) = self.drive(source).await;

        if let Err(e) = source.close().await {
            tracing::warn!(session_id = %self.id, "pose source close failed: {}", e);
        }

        let frames = tracker.stats();
        let result = tracker.finish();
        let guidance = Guidance::from_result(&result);

        tracing::info!(
            session_id = %self.id,
            exercise = %self.config.exercise,
            reps = result.reps,
            deviation = result.deviation_percent,
            ?stop_reason,
            "session finished"
        );

        Ok(SessionReport {
            session_id: self.id,
            exercise: self.config.exercise.clone(),
            result,
            stop_reason,
            frames,
            guidance,
        })
    }

    async fn drive<P>(&self, source: &mut P) -> (ExerciseTracker, StopReason)
    where
        P: PoseSource + ?Sized,
    {
        let mut tracker =
            ExerciseTracker::new(self.kind.clone(), self.optimal_range, self.config.tracker);
        let deadline = self
            .config
            .max_duration()
            .and_then(|d| Instant::now().checked_add(d));
        let mut updates = self.updates.clone();

        let reason = loop {
            if self.stop.is_stopped().await {
                break StopReason::Stopped;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::TimeLimit;
            }

            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, source.next_frame()).await {
                        Ok(next) => next,
                        Err(_) => break StopReason::TimeLimit,
                    }
                }
                None => source.next_frame().await,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::StreamEnded,
                Err(e) => {
                    tracing::error!(session_id = %self.id, "pose source read failed: {}", e);
                    break StopReason::SourceLost;
                }
            };

            let update = tracker.process(&frame);

            if let Some(tx) = &updates {
                match tx.try_send(update) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::trace!(session_id = %self.id, "update channel full, update dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::debug!(session_id = %self.id, "update receiver dropped");
                        updates = None;
                    }
                }
            }

            if self
                .config
                .target_reps
                .is_some_and(|target| tracker.reps() >= target)
            {
                break StopReason::TargetReached;
            }
        };

        (tracker, reason)
    }
}
