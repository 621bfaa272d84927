//! Calibration recording: a countdown, then a fixed demonstration window.

use std::time::Duration;

use tokio::time::Instant;

use rehab_core::{CalibrationResult, Error, ExerciseDefinition, Result, Timestamp};
use rehab_motion::CalibrationEngine;

use crate::config::CalibrationSettings;
use crate::session::StopHandle;
use crate::source::PoseSource;
use crate::store::ExerciseStore;

/// Records a demonstration and derives joint limits from it.
///
/// The countdown and window are measured on frame timestamps. The same span
/// also bounds wall-clock time so a stalled source cannot hang the
/// recording.
pub struct CalibrationRecorder {
    settings: CalibrationSettings,
    stop: StopHandle,
}

impl CalibrationRecorder {
    pub fn new(settings: CalibrationSettings) -> Self {
        Self {
            settings,
            stop: StopHandle::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn span_secs(&self) -> f64 {
        (self.settings.countdown_secs + self.settings.window_secs).max(0.0)
    }

    /// Record from `source` and return the derived limits.
    ///
    /// Fails with [`Error::SourceUnavailable`] when the source cannot be
    /// opened and [`Error::CalibrationEmpty`] when no joint was ever seen.
    pub async fn record<P>(&self, source: &mut P) -> Result<CalibrationResult>
    where
        P: PoseSource + ?Sized,
    {
        tracing::info!(
            source = %source.describe(),
            countdown_secs = self.settings.countdown_secs,
            window_secs = self.settings.window_secs,
            "calibration starting"
        );

        if let Err(e) = source.open().await {
            tracing::error!("pose source unavailable: {}", e);
            return Err(match e {
                Error::SourceUnavailable(_) => e,
                other => Error::SourceUnavailable(other.to_string()),
            });
        }

        let engine = self.collect(source).await;

        if let Err(e) = source.close().await {
            tracing::warn!("pose source close failed: {}", e);
        }

        engine.finish()
    }

    async fn collect<P>(&self, source: &mut P) -> CalibrationEngine
    where
        P: PoseSource + ?Sized,
    {
        let mut engine = CalibrationEngine::new();
        let deadline = Duration::try_from_secs_f64(self.span_secs())
            .ok()
            .and_then(|span| Instant::now().checked_add(span));
        let mut first: Option<Timestamp> = None;

        loop {
            if self.stop.is_stopped().await {
                tracing::debug!("calibration stopped");
                break;
            }

            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, source.next_frame()).await {
                        Ok(next) => next,
                        Err(_) => {
                            tracing::debug!("calibration wall-clock window elapsed");
                            break;
                        }
                    }
                }
                None => source.next_frame().await,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("pose source read failed: {}", e);
                    break;
                }
            };

            let start = *first.get_or_insert(frame.timestamp);
            let elapsed = frame.timestamp.seconds_since(start);
            if elapsed < self.settings.countdown_secs {
                continue;
            }
            if elapsed > self.span_secs() {
                break;
            }

            engine.observe_frame(&frame, self.settings.min_visibility);
        }

        engine
    }

    /// Record and persist the result as a named custom exercise.
    ///
    /// Nothing is stored when calibration fails.
    pub async fn record_exercise<P, S>(
        &self,
        name: &str,
        source: &mut P,
        store: &S,
    ) -> Result<ExerciseDefinition>
    where
        P: PoseSource + ?Sized,
        S: ExerciseStore + ?Sized,
    {
        let calibration = self.record(source).await?;
        let definition = ExerciseDefinition::from_calibration(name, &calibration);
        store.save_exercise(definition.clone()).await?;

        tracing::info!(
            exercise = name,
            primary = %calibration.primary_joint,
            "custom exercise saved"
        );
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehab_core::{Joint, JointPosition, Landmark, PoseFrame};

    use crate::source::ReplaySource;
    use crate::store::MemoryStore;

    fn elbow_frame(secs: f64, angle: f64) -> PoseFrame {
        let theta = angle.to_radians();
        let landmarks = [
            (Landmark::LeftShoulder, (0.5, 0.3)),
            (Landmark::LeftElbow, (0.5, 0.5)),
            (Landmark::LeftWrist, (0.5 + 0.2 * theta.sin(), 0.5 - 0.2 * theta.cos())),
        ]
        .iter()
        .map(|&(lm, (x, y))| (lm, JointPosition::new(x, y, 0.0, 1.0)))
        .collect();
        PoseFrame::new(Timestamp::from_secs_f64(secs), 1000, 1000, landmarks)
    }

    fn settings() -> CalibrationSettings {
        CalibrationSettings {
            countdown_secs: 1.0,
            window_secs: 2.0,
            min_visibility: 0.0,
        }
    }

    #[tokio::test]
    async fn test_countdown_and_window_bound_samples() {
        let frames = vec![
            elbow_frame(0.0, 10.0),  // countdown
            elbow_frame(0.5, 170.0), // countdown
            elbow_frame(1.0, 60.0),
            elbow_frame(2.0, 140.0),
            elbow_frame(3.0, 100.0),
            elbow_frame(3.5, 20.0), // past the window
        ];
        let recorder = CalibrationRecorder::new(settings());
        let result = recorder.record(&mut ReplaySource::new(frames)).await.unwrap();

        assert_eq!(result.primary_joint, Joint::LeftElbow);
        let limit = result.joints[&Joint::LeftElbow];
        assert_eq!((limit.min(), limit.max()), (60.0, 140.0));
    }

    #[tokio::test]
    async fn test_empty_calibration_stores_nothing() {
        let frames = vec![PoseFrame::no_detection(Timestamp::from_nanos(0), 640, 480)];
        let store = MemoryStore::new();
        let recorder = CalibrationRecorder::new(CalibrationSettings {
            countdown_secs: 0.0,
            ..settings()
        });

        let err = recorder
            .record_exercise("reach", &mut ReplaySource::new(frames), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CalibrationEmpty));
        assert!(store.exercises().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_exercise_persists_definition() {
        let frames = (0..20).map(|i| elbow_frame(i as f64 * 0.1, 40.0 + i as f64 * 5.0));
        let store = MemoryStore::new();
        let recorder = CalibrationRecorder::new(CalibrationSettings {
            countdown_secs: 0.0,
            ..settings()
        });

        let definition = recorder
            .record_exercise("reach", &mut ReplaySource::new(frames), &store)
            .await
            .unwrap();
        assert_eq!(definition.primary_joint(), Some(Joint::LeftElbow));
        assert_eq!(store.exercise("reach").await.unwrap(), Some(definition));
    }

    #[tokio::test]
    async fn test_huge_window_records_until_stream_end() {
        let recorder = CalibrationRecorder::new(CalibrationSettings {
            countdown_secs: 0.0,
            window_secs: 1e30,
            min_visibility: 0.0,
        });
        let frames = vec![elbow_frame(0.0, 50.0), elbow_frame(1.0, 130.0)];
        let result = recorder.record(&mut ReplaySource::new(frames)).await.unwrap();
        let limit = result.joints[&Joint::LeftElbow];
        assert_eq!((limit.min(), limit.max()), (50.0, 130.0));
    }

    #[tokio::test]
    async fn test_stopped_recorder_collects_nothing() {
        let recorder = CalibrationRecorder::new(settings());
        recorder.stop_handle().stop().await;
        let frames = vec![elbow_frame(2.0, 90.0)];
        let result = recorder.record(&mut ReplaySource::new(frames)).await;
        assert!(matches!(result, Err(Error::CalibrationEmpty)));
    }
}
