use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::models::{FrameLandmarks, SessionSummary};
use crate::session::engine::AnalysisSession;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Anything that yields landmark frames in order, e.g. a pose service client.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<FrameLandmarks>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = FrameLandmarks>,
{
    fn next_frame(&mut self) -> Option<FrameLandmarks> {
        self.next()
    }
}

/// What the drivers do with malformed or out-of-order frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Drop the frame (it is counted as rejected) and keep going.
    #[default]
    Skip,
    /// Stop and return the error.
    Abort,
}

fn feed(
    session: &mut AnalysisSession,
    frame: &FrameLandmarks,
    policy: MalformedPolicy,
) -> Result<(), EngineError> {
    match session.push_frame(frame) {
        Ok(_) => Ok(()),
        Err(err) if err.is_frame_local() && policy == MalformedPolicy::Skip => {
            log_warn!("skipping frame {}: {}", frame.index, err);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Drain the source to the end.
pub fn analyze<S: FrameSource>(
    mut session: AnalysisSession,
    mut source: S,
    policy: MalformedPolicy,
) -> Result<SessionSummary, EngineError> {
    while let Some(frame) = source.next_frame() {
        feed(&mut session, &frame, policy)?;
    }
    Ok(session.finish())
}

/// Like [`analyze`], but stops between frames once `cancel_token` fires and
/// returns the partial summary.
pub fn analyze_until<S: FrameSource>(
    mut session: AnalysisSession,
    mut source: S,
    policy: MalformedPolicy,
    cancel_token: &CancellationToken,
) -> Result<SessionSummary, EngineError> {
    loop {
        if cancel_token.is_cancelled() {
            return Ok(session.cancel());
        }
        match source.next_frame() {
            Some(frame) => feed(&mut session, &frame, policy)?,
            None => return Ok(session.finish()),
        }
    }
}

/// Consume frames as a decoder produces them. The summary is complete once
/// every sender is dropped, partial if `cancel_token` fires first.
pub async fn analyze_channel(
    mut session: AnalysisSession,
    mut frames: mpsc::Receiver<FrameLandmarks>,
    policy: MalformedPolicy,
    cancel_token: CancellationToken,
) -> Result<SessionSummary, EngineError> {
    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(frame) => feed(&mut session, &frame, policy)?,
                    None => break,
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("analysis of session {} cancelled", session.id());
                return Ok(session.cancel());
            }
        }
    }
    Ok(session.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{Landmark, LandmarkName};
    use crate::session::testing::{squat_frames, SquatShape};

    fn session() -> AnalysisSession {
        AnalysisSession::new(EngineConfig::default()).unwrap()
    }

    fn with_bad_frame() -> Vec<FrameLandmarks> {
        let mut frames = squat_frames(&[SquatShape::clean(90.0)], None);
        frames[10] = FrameLandmarks::new(10).with(LandmarkName::LeftHip, Landmark::new(f32::NAN, 0.5, 0.9));
        frames
    }

    #[test]
    fn iterator_source_runs_to_completion() {
        let frames = squat_frames(&[SquatShape::clean(90.0)], None);
        let summary = analyze(session(), frames.into_iter(), MalformedPolicy::Abort).unwrap();
        assert!(summary.completed);
        assert_eq!(summary.reps.len(), 1);
    }

    #[test]
    fn skip_policy_drops_malformed_frames() {
        let summary = analyze(session(), with_bad_frame().into_iter(), MalformedPolicy::Skip).unwrap();
        assert_eq!(summary.frames.rejected, 1);
        assert_eq!(summary.reps.len(), 1);
    }

    #[test]
    fn abort_policy_surfaces_the_error() {
        let err = analyze(session(), with_bad_frame().into_iter(), MalformedPolicy::Abort).unwrap_err();
        assert!(matches!(err, EngineError::MalformedLandmarkSet { frame_index: 10, .. }));
    }

    #[test]
    fn cancelled_token_stops_before_the_next_frame() {
        let token = CancellationToken::new();
        token.cancel();
        let frames = squat_frames(&[SquatShape::clean(90.0)], None);
        let summary = analyze_until(session(), frames.into_iter(), MalformedPolicy::Skip, &token).unwrap();
        assert!(!summary.completed);
        assert_eq!(summary.frames.received, 0);
    }

    #[tokio::test]
    async fn channel_session_completes_when_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let frames = squat_frames(&[SquatShape::clean(90.0), SquatShape::clean(95.0)], None);
        let expected = frames.len() as u64;
        let producer = tokio::spawn(async move {
            for frame in frames {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let summary = analyze_channel(session(), rx, MalformedPolicy::Skip, CancellationToken::new())
            .await
            .unwrap();
        producer.await.unwrap();

        assert!(summary.completed);
        assert_eq!(summary.frames.received, expected);
        assert_eq!(summary.reps.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_channel_session_returns_partial_summary() {
        let (tx, rx) = mpsc::channel(64);
        let token = CancellationToken::new();
        let frames = squat_frames(&[SquatShape::clean(90.0)], None);

        let producer_token = token.clone();
        let producer = tokio::spawn(async move {
            for frame in frames.into_iter().take(24) {
                tx.send(frame).await.ok();
            }
            producer_token.cancel();
            // Keep the channel open so only the token can end the session.
            producer_token.cancelled().await;
            drop(tx);
        });

        let summary = analyze_channel(session(), rx, MalformedPolicy::Skip, token)
            .await
            .unwrap();
        producer.await.unwrap();

        assert!(!summary.completed);
        assert!(summary.frames.received <= 24);
        assert!(summary.reps.is_empty());
    }
}
