use chrono::Utc;

use crate::config::{AggregationMode, EngineConfig};
use crate::models::{
    Exercise, FrameStats, IncompleteRep, Joint, RepOutcome, SessionSummary, SymmetrySummary, Trend,
    UnscoredReason, UnscoredRep,
};

/// Slopes (points per rep) smaller than this are a stable trend.
const TREND_STABLE_SLOPE: f32 = 1.0;

/// Folds rep outcomes into a session summary.
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    mode: AggregationMode,
    symmetry_threshold_deg: f32,
}

impl SessionAggregator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            mode: config.aggregation,
            symmetry_threshold_deg: config.symmetry_threshold_deg,
        }
    }

    pub fn summarize(
        &self,
        session_id: &str,
        exercise: Exercise,
        reps: &[RepOutcome],
        incomplete: &[IncompleteRep],
        frames: FrameStats,
        completed: bool,
    ) -> SessionSummary {
        let mut reps = reps.to_vec();
        reps.sort_by_key(|r| r.rep_index());

        let scored: Vec<(usize, u32)> = reps
            .iter()
            .filter_map(|r| r.score().map(|s| (s.rep_index, s.score)))
            .collect();

        let mut unscored: Vec<UnscoredRep> = reps
            .iter()
            .filter_map(|r| match r {
                RepOutcome::Unscored(u) => Some(u.clone()),
                RepOutcome::Scored(_) => None,
            })
            .collect();
        unscored.extend(incomplete.iter().map(|rep| UnscoredRep {
            rep_index: rep.index,
            frames: rep.frames,
            reason: UnscoredReason::IncompleteCycle,
        }));
        unscored.sort_by_key(|u| u.rep_index);

        SessionSummary {
            session_id: session_id.to_string(),
            exercise,
            generated_at: Utc::now(),
            session_score: aggregate(&scored, self.mode),
            best_rep: best_rep(&scored),
            rep_to_review: rep_to_review(&scored),
            trend: trend(&scored),
            symmetry: self.symmetry(&reps),
            aggregation: self.mode,
            reps,
            incomplete: incomplete.to_vec(),
            unscored,
            frames,
            completed,
        }
    }

    fn symmetry(&self, reps: &[RepOutcome]) -> SymmetrySummary {
        let findings: Vec<_> = reps
            .iter()
            .filter_map(RepOutcome::score)
            .flat_map(|s| s.symmetry.iter().copied())
            .collect();

        let max_delta = |joint: Joint| {
            findings
                .iter()
                .filter(|f| f.joint == joint)
                .map(|f| f.delta_deg)
                .fold(None, |max: Option<f32>, d| Some(max.map_or(d, |m| m.max(d))))
        };

        let mut flagged: Vec<usize> = findings.iter().map(|f| f.rep_index).collect();
        flagged.dedup();

        SymmetrySummary {
            threshold_deg: self.symmetry_threshold_deg,
            reps_flagged: flagged.len(),
            max_knee_delta_deg: max_delta(Joint::Knee),
            max_hip_delta_deg: max_delta(Joint::Hip),
            findings,
        }
    }
}

/// Session score over `(rep_index, score)` pairs; `None` with nothing scored.
pub fn aggregate(scored: &[(usize, u32)], mode: AggregationMode) -> Option<f32> {
    if scored.is_empty() {
        return None;
    }
    let mut scores: Vec<u32> = scored.iter().map(|(_, s)| *s).collect();
    let picked: &[u32] = match mode {
        AggregationMode::Mean => &scores,
        AggregationMode::WorstOf { count } => {
            scores.sort_unstable();
            &scores[..count.clamp(1, scores.len())]
        }
    };
    Some(picked.iter().sum::<u32>() as f32 / picked.len() as f32)
}

/// Highest score; the earliest rep wins ties.
pub fn best_rep(scored: &[(usize, u32)]) -> Option<usize> {
    scored
        .iter()
        .fold(None, |best: Option<(usize, u32)>, &(index, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((index, score)),
        })
        .map(|(index, _)| index)
}

/// Lowest score; the earliest rep wins ties.
pub fn rep_to_review(scored: &[(usize, u32)]) -> Option<usize> {
    scored
        .iter()
        .fold(None, |worst: Option<(usize, u32)>, &(index, score)| match worst {
            Some((_, low)) if low <= score => worst,
            _ => Some((index, score)),
        })
        .map(|(index, _)| index)
}

/// Least-squares slope of score against rep order.
pub fn trend(scored: &[(usize, u32)]) -> Trend {
    if scored.len() < 2 {
        return Trend::Insufficient;
    }
    let n = scored.len() as f32;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = scored.iter().map(|(_, s)| *s as f32).sum::<f32>() / n;
    let (num, den) = scored
        .iter()
        .enumerate()
        .fold((0.0f32, 0.0f32), |(num, den), (x, (_, y))| {
            let dx = x as f32 - mean_x;
            (num + dx * (*y as f32 - mean_y), den + dx * dx)
        });
    let slope = num / den;

    if slope.abs() < TREND_STABLE_SLOPE {
        Trend::Stable
    } else if slope > 0.0 {
        Trend::Improving
    } else {
        Trend::Declining
    }
}
