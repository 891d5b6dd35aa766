use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::evaluation::FormEvaluator;
use crate::models::{
    AngleSample, Exercise, FrameLandmarks, FrameStats, IncompleteReason, IncompleteRep, Rep, RepFrame,
    RepOutcome, RepPhase, SessionSummary,
};
use crate::pose::normalizer::validate_frame;
use crate::pose::{AngleCalculator, LandmarkNormalizer, TemporalSmoother};
use crate::profile::ExerciseProfile;
use crate::segmentation::{RepTracker, SegmentationConfig};
use crate::session::aggregator::SessionAggregator;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_info, log_warn};

/// What happened to one pushed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameReport {
    /// Dropped by `frame_skip`.
    Skipped,
    /// Ran through the pipeline; carries the rep closed by this frame, if any.
    Analyzed {
        phase: RepPhase,
        valid_landmarks: bool,
        closed: Option<RepOutcome>,
    },
}

/// One video's worth of analysis state. Frames must arrive in index order.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    id: String,
    exercise: Exercise,
    config: EngineConfig,
    normalizer: LandmarkNormalizer,
    calculator: AngleCalculator,
    smoother: TemporalSmoother,
    tracker: RepTracker,
    evaluator: FormEvaluator,
    aggregator: SessionAggregator,
    outcomes: Vec<RepOutcome>,
    stats: FrameStats,
    last_index: Option<u64>,
}

impl AnalysisSession {
    /// Squat session. Fails if the configuration is out of range.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::for_exercise(config, Exercise::Squat)
    }

    pub fn for_exercise(config: EngineConfig, exercise: Exercise) -> Result<Self, EngineError> {
        config.validate()?;
        let profile = ExerciseProfile::for_exercise(exercise);
        let id = Uuid::new_v4().to_string();
        log_info!("[SESSION] Starting {} session {}", exercise.as_str(), id);

        Ok(Self {
            id,
            exercise,
            normalizer: LandmarkNormalizer::new(&config, profile.required_landmarks),
            calculator: AngleCalculator::new(profile.angles, config.use_depth),
            smoother: TemporalSmoother::new(config.smoothing_window, config.smoothing_min_samples),
            tracker: RepTracker::new(
                SegmentationConfig::from(&config),
                config.baseline_frames,
                config.smoothing_window,
            ),
            evaluator: FormEvaluator::new(&config, profile),
            aggregator: SessionAggregator::new(&config),
            outcomes: Vec::new(),
            stats: FrameStats::default(),
            last_index: None,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn outcomes(&self) -> &[RepOutcome] {
        &self.outcomes
    }

    /// Feed the next frame.
    ///
    /// Malformed and out-of-order frames are rejected without touching any
    /// state except the rejection counter; the caller decides whether to go on.
    pub fn push_frame(&mut self, frame: &FrameLandmarks) -> Result<FrameReport, EngineError> {
        if let Some(previous) = self.last_index {
            if frame.index <= previous {
                self.stats.rejected += 1;
                return Err(EngineError::FrameOutOfOrder {
                    previous,
                    got: frame.index,
                });
            }
        }
        if let Err(err) = validate_frame(frame) {
            self.stats.rejected += 1;
            log_warn!("[SESSION] {}", err);
            return Err(err);
        }

        let ordinal = self.stats.received;
        self.stats.received += 1;
        self.last_index = Some(frame.index);

        let stride = u64::from(self.config.frame_skip) + 1;
        if ordinal % stride != 0 {
            self.stats.skipped += 1;
            return Ok(FrameReport::Skipped);
        }
        self.stats.analyzed += 1;

        let (raw, valid_landmarks) = match self.normalizer.normalize(frame) {
            Ok(normalized) => (self.calculator.compute(&normalized), true),
            Err(insufficient) => {
                self.stats.insufficient += 1;
                log_debug!("[SESSION] {}", insufficient);
                (AngleSample::invalid(frame.index), false)
            }
        };
        let smoothed = self.smoother.push(&raw);
        let update = self.tracker.push(RepFrame { raw, smoothed });

        let closed = update.closed.map(|rep| self.record(&rep, frame.index));

        Ok(FrameReport::Analyzed {
            phase: self.tracker.phase(),
            valid_landmarks,
            closed,
        })
    }

    /// Summary of everything seen so far. The open cycle, if any, is reported
    /// as cancelled and the summary is marked not completed.
    pub fn snapshot(&self) -> SessionSummary {
        self.summarize(IncompleteReason::Cancelled, false)
    }

    /// End of input. A cycle already back at standing height is closed and
    /// scored; any other open cycle is reported as ended with the video.
    pub fn finish(mut self) -> SessionSummary {
        if let Some(rep) = self.tracker.flush() {
            let last = rep.range().end;
            self.record(&rep, last);
        }
        let summary = self.summarize(IncompleteReason::VideoEnded, true);
        log_info!(
            "[SESSION] Finished {}: {} reps ({} scored), {} incomplete",
            summary.session_id,
            summary.reps.len(),
            summary.scored_count(),
            summary.incomplete.len()
        );
        summary
    }

    /// The driver stopped early.
    pub fn cancel(self) -> SessionSummary {
        log_info!("[SESSION] Cancelled {} after {} frames", self.id, self.stats.received);
        self.snapshot()
    }

    fn record(&mut self, rep: &Rep, frame_index: u64) -> RepOutcome {
        let outcome = self.evaluator.evaluate(rep);
        match &outcome {
            RepOutcome::Scored(score) => log_info!(
                "[SESSION] Rep {} closed at frame {}: score {} ({} violations)",
                score.rep_index,
                frame_index,
                score.score,
                score.violations.len()
            ),
            RepOutcome::Unscored(unscored) => log_info!(
                "[SESSION] Rep {} closed at frame {} without enough landmarks",
                unscored.rep_index,
                frame_index
            ),
        }
        self.outcomes.push(outcome.clone());
        outcome
    }

    fn summarize(&self, reason: IncompleteReason, completed: bool) -> SessionSummary {
        let incomplete: Vec<IncompleteRep> = self.tracker.incomplete(reason).into_iter().collect();
        self.aggregator.summarize(
            &self.id,
            self.exercise,
            &self.outcomes,
            &incomplete,
            self.stats,
            completed,
        )
    }
}
