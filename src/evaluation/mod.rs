//! Form evaluation of closed reps.
//!
//! A rep is first reduced to a `RepView` (the bottom-frame values every rule
//! reads), then every rule of the exercise profile runs against it. Rules
//! never see each other's results except through `suppressed_by`.

pub mod feedback;
pub mod rules;
pub mod scoring;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::log_debug;
use crate::models::{
    bilateral_mean, AngleName, DepthClass, FrameRange, Joint, Rep, RepFrame, RepOutcome, RepPhase, RepScore,
    RuleId, UnscoredReason, UnscoredRep, Violation,
};
use crate::profile::ExerciseProfile;
use rules::RuleSpec;

const ENABLE_LOGS: bool = false;

/// Bottom-of-rep measurements shared by every rule.
#[derive(Debug, Clone)]
pub struct RepView<'a> {
    pub rep: &'a Rep,
    pub bottom_frame: u64,
    pub knee: f32,
    pub hip: f32,
    pub back: f32,
    pub knee_sides: (Option<f32>, Option<f32>),
    pub hip_sides: (Option<f32>, Option<f32>),
    pub trunk_tibia: Option<f32>,
    pub knee_ankle_ratio: Option<f32>,
    /// Median smoothed back angle over the opening standing span.
    pub baseline_back: Option<f32>,
    /// Median smoothed trunk inclination over the same span.
    pub baseline_trunk: Option<f32>,
    pub depth: DepthClass,
}

impl<'a> RepView<'a> {
    /// Fails with the angles that were unusable at the bottom frame.
    pub fn build(rep: &'a Rep, config: &EngineConfig) -> Result<Self, Vec<AngleName>> {
        let Some(bottom) = rep.frame(rep.bottom_frame) else {
            return Err(required_sides().collect());
        };

        // Raw value at the bottom, smoothed value at the same frame as fallback.
        let value = |name: AngleName| bottom.raw.get(name).or_else(|| bottom.smoothed.get(name));
        let sides = |joint: Joint| {
            let (left, right) = joint.sides();
            (value(left), value(right))
        };

        let knee_sides = sides(Joint::Knee);
        let hip_sides = sides(Joint::Hip);
        let back_sides = sides(Joint::Back);

        let mut missing = Vec::new();
        for (joint, (left, right)) in [
            (Joint::Knee, knee_sides),
            (Joint::Hip, hip_sides),
            (Joint::Back, back_sides),
        ] {
            if left.is_none() && right.is_none() {
                let (l, r) = joint.sides();
                missing.extend([l, r]);
            }
        }

        match (
            bilateral_mean(knee_sides.0, knee_sides.1),
            bilateral_mean(hip_sides.0, hip_sides.1),
            bilateral_mean(back_sides.0, back_sides.1),
        ) {
            (Some(knee), Some(hip), Some(back)) => Ok(Self {
                rep,
                bottom_frame: rep.bottom_frame,
                knee,
                hip,
                back,
                knee_sides,
                hip_sides,
                trunk_tibia: value(AngleName::TrunkTibiaAngle),
                knee_ankle_ratio: bottom.raw.knee_ankle_ratio,
                baseline_back: standing_baseline(rep, |f| f.smoothed.joint(Joint::Back)),
                baseline_trunk: standing_baseline(rep, |f| f.smoothed.get(AngleName::TrunkInclination)),
                depth: classify_depth(knee, config),
            }),
            _ => Err(missing),
        }
    }
}

fn required_sides() -> impl Iterator<Item = AngleName> {
    [Joint::Knee, Joint::Hip, Joint::Back]
        .into_iter()
        .flat_map(|joint| {
            let (l, r) = joint.sides();
            [l, r]
        })
}

fn standing_baseline(rep: &Rep, value: impl Fn(&RepFrame) -> Option<f32>) -> Option<f32> {
    let opening = rep.opening_standing()?;
    let mut values: Vec<f32> = rep.frames_in(opening.range()).filter_map(value).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

pub fn classify_depth(knee: f32, config: &EngineConfig) -> DepthClass {
    if knee > config.acceptable_depth_deg {
        DepthClass::Shallow
    } else if knee >= config.medium_depth_deg {
        DepthClass::Medium
    } else {
        DepthClass::Deep
    }
}

#[derive(Debug, Clone)]
pub struct FormEvaluator {
    config: EngineConfig,
    rules: &'static [RuleSpec],
}

impl FormEvaluator {
    pub fn new(config: &EngineConfig, profile: &'static ExerciseProfile) -> Self {
        Self {
            config: config.clone(),
            rules: profile.rules,
        }
    }

    pub fn evaluate(&self, rep: &Rep) -> RepOutcome {
        let view = match RepView::build(rep, &self.config) {
            Ok(view) => view,
            Err(missing) => {
                log_debug!("[EVAL] Rep {} unscored, missing {:?}", rep.index, missing);
                return RepOutcome::Unscored(UnscoredRep {
                    rep_index: rep.index,
                    frames: rep.range(),
                    reason: UnscoredReason::InsufficientLandmarks { missing },
                });
            }
        };

        let fired: Vec<(&RuleSpec, rules::Finding)> = self
            .rules
            .iter()
            .filter_map(|spec| (spec.check)(&view, &self.config).map(|finding| (spec, finding)))
            .collect();
        let fired_ids: Vec<RuleId> = fired.iter().map(|(spec, _)| spec.id).collect();

        let mut violations: Vec<Violation> = fired
            .into_iter()
            .filter(|(spec, _)| !spec.suppressed_by.iter().any(|id| fired_ids.contains(id)))
            .map(|(spec, finding)| Violation {
                rule: spec.id,
                priority: spec.priority,
                severity: spec.severity,
                points: (spec.points)(&self.config),
                frames: finding.frames,
                message: finding.message,
                details: finding
                    .details
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect::<BTreeMap<_, _>>(),
            })
            .collect();
        violations.sort_by_key(|v| (v.priority, Reverse(v.points)));

        let score = scoring::rep_score(&violations);
        let passed = scoring::is_passing(score, &self.config);
        log_debug!(
            "[EVAL] Rep {} bottom {:.1}° at frame {} → {} ({} violations)",
            rep.index,
            view.knee,
            view.bottom_frame,
            score,
            violations.len()
        );

        RepOutcome::Scored(RepScore {
            rep_index: rep.index,
            score,
            depth: view.depth,
            bottom_frame: view.bottom_frame,
            bottom_knee_deg: view.knee,
            grade: scoring::grade(score),
            passed,
            counts: scoring::severity_counts(&violations, self.rules.len()),
            feedback: feedback::ranked(&violations, self.config.max_feedback_items),
            grouped_feedback: feedback::grouped(&violations),
            highlights: feedback::highlights(&view, &violations, &self.config),
            summary: feedback::summary(&violations, score),
            symmetry: rules::symmetry_findings(&view, &self.config),
            violations,
        })
    }
}

/// Frames of the descent and bottom phases, where sustained rules look.
pub(crate) fn loaded_range(rep: &Rep) -> Option<FrameRange> {
    let descent = rep.span(RepPhase::Descending)?;
    let bottom = rep.span(RepPhase::Bottom)?;
    Some(FrameRange::new(descent.start_frame, bottom.end_frame))
}
