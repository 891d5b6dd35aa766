//! The squat rule table.
//!
//! Each rule is a plain function over a `RepView`. The table fixes priority,
//! severity and the config field holding its point value; the evaluator
//! runs every entry and sorts what fires.

use std::fmt;

use crate::config::EngineConfig;
use crate::evaluation::{loaded_range, RepView};
use crate::models::{AngleName, FrameRange, Joint, RuleId, Severity, SymmetryFinding};

/// What a rule reports when it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub frames: FrameRange,
    pub message: String,
    pub details: Vec<(&'static str, f32)>,
}

pub type RuleCheck = fn(&RepView, &EngineConfig) -> Option<Finding>;

#[derive(Clone, Copy)]
pub struct RuleSpec {
    pub id: RuleId,
    /// 0 is most urgent.
    pub priority: u8,
    pub severity: Severity,
    pub points: fn(&EngineConfig) -> u32,
    /// Dropped when any of these rules fired on the same rep.
    pub suppressed_by: &'static [RuleId],
    pub check: RuleCheck,
}

impl fmt::Debug for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSpec")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("severity", &self.severity)
            .field("suppressed_by", &self.suppressed_by)
            .finish()
    }
}

pub const SQUAT_RULES: [RuleSpec; 7] = [
    RuleSpec {
        id: RuleId::ExcessiveDepth,
        priority: 0,
        severity: Severity::High,
        points: excessive_depth_points,
        suppressed_by: &[],
        check: excessive_depth,
    },
    RuleSpec {
        id: RuleId::LumbarFlexion,
        priority: 1,
        severity: Severity::Critical,
        points: lumbar_flexion_points,
        suppressed_by: &[],
        check: lumbar_flexion,
    },
    RuleSpec {
        id: RuleId::PosteriorPelvicTilt,
        priority: 2,
        severity: Severity::Critical,
        points: pelvic_tilt_points,
        suppressed_by: &[],
        check: posterior_pelvic_tilt,
    },
    RuleSpec {
        id: RuleId::KneeValgus,
        priority: 3,
        severity: Severity::High,
        points: knee_valgus_points,
        suppressed_by: &[],
        check: knee_valgus,
    },
    RuleSpec {
        id: RuleId::InsufficientDepth,
        priority: 4,
        severity: Severity::Medium,
        points: insufficient_depth_points,
        suppressed_by: &[RuleId::PosteriorPelvicTilt],
        check: insufficient_depth,
    },
    RuleSpec {
        id: RuleId::TrunkTibiaBias,
        priority: 5,
        severity: Severity::Low,
        points: trunk_tibia_points,
        suppressed_by: &[],
        check: trunk_tibia_bias,
    },
    RuleSpec {
        id: RuleId::Asymmetry,
        priority: 6,
        severity: Severity::Low,
        points: informational,
        suppressed_by: &[],
        check: asymmetry,
    },
];

fn excessive_depth_points(c: &EngineConfig) -> u32 {
    c.points_excessive_depth
}

fn lumbar_flexion_points(c: &EngineConfig) -> u32 {
    c.points_lumbar_flexion
}

fn pelvic_tilt_points(c: &EngineConfig) -> u32 {
    c.points_pelvic_tilt
}

fn knee_valgus_points(c: &EngineConfig) -> u32 {
    c.points_knee_valgus
}

fn insufficient_depth_points(c: &EngineConfig) -> u32 {
    c.points_insufficient_depth
}

fn trunk_tibia_points(c: &EngineConfig) -> u32 {
    c.points_trunk_tibia
}

fn informational(_: &EngineConfig) -> u32 {
    0
}

fn excessive_depth(view: &RepView, config: &EngineConfig) -> Option<Finding> {
    (view.knee < config.excessive_depth_deg).then(|| Finding {
        frames: FrameRange::single(view.bottom_frame),
        message: format!(
            "Squat too deep ({:.0}°) - risk of form breakdown and joint stress",
            view.knee
        ),
        details: vec![
            ("bottomKneeDeg", view.knee),
            ("thresholdDeg", config.excessive_depth_deg),
        ],
    })
}

/// Longest run of consecutive frames near the bottom whose smoothed back angle
/// sits at least the configured delta under the standing baseline.
///
/// Shoulder-hip-ankle closes as the torso leans forward, so the part of the
/// loss matched by trunk inclination gained since standing is not counted.
/// Without a trunk inclination the full loss counts.
fn lumbar_flexion(view: &RepView, config: &EngineConfig) -> Option<Finding> {
    let baseline = view.baseline_back?;
    let window = FrameRange::new(
        view.bottom_frame.saturating_sub(config.bottom_window_frames),
        view.bottom_frame + config.bottom_window_frames,
    );

    let mut best: Option<(FrameRange, usize, f32)> = None;
    let mut run: Option<(u64, u64, usize, f32)> = None;
    for frame in view.rep.frames_in(window) {
        let lean = match (view.baseline_trunk, frame.smoothed.get(AngleName::TrunkInclination)) {
            (Some(standing), Some(trunk)) => trunk - standing,
            _ => 0.0,
        };
        let loss = frame
            .smoothed
            .joint(Joint::Back)
            .map(|back| baseline - back - lean)
            .filter(|loss| *loss >= config.lumbar_flexion_delta_deg);
        run = match (run, loss) {
            (Some((start, _, len, worst)), Some(loss)) => Some((start, frame.index(), len + 1, worst.max(loss))),
            (None, Some(loss)) => Some((frame.index(), frame.index(), 1, loss)),
            (_, None) => None,
        };
        if let Some((start, end, len, worst)) = run {
            if best.map_or(true, |(_, best_len, _)| len > best_len) {
                best = Some((FrameRange::new(start, end), len, worst));
            }
        }
    }

    let (frames, len, worst) = best.filter(|(_, len, _)| *len >= config.lumbar_flexion_frames)?;
    Some(Finding {
        frames,
        message: format!(
            "Lower back rounding near the bottom ({:.0}° loss over {} frames) - brace and keep a neutral spine",
            worst, len
        ),
        details: vec![
            ("baselineBackDeg", baseline),
            ("maxLossDeg", worst),
            ("frames", len as f32),
        ],
    })
}

/// Hip closing past its floor while the knees are still bending: the pelvis
/// is tucking under to buy more depth.
fn posterior_pelvic_tilt(view: &RepView, config: &EngineConfig) -> Option<Finding> {
    let range = loaded_range(view.rep)?;
    let mut last_knee: Option<f32> = None;
    let mut hits: Vec<(u64, f32)> = Vec::new();
    for frame in view.rep.frames_in(range) {
        let knee = frame.smoothed.joint(Joint::Knee);
        let hip = frame.smoothed.joint(Joint::Hip);
        if let (Some(knee), Some(prev), Some(hip)) = (knee, last_knee, hip) {
            if hip < config.hip_floor_deg && knee < prev {
                hits.push((frame.index(), hip));
            }
        }
        if knee.is_some() {
            last_knee = knee;
        }
    }

    let first = hits.first()?.0;
    let last = hits.last()?.0;
    let min_hip = hits.iter().map(|(_, hip)| *hip).fold(f32::INFINITY, f32::min);
    Some(Finding {
        frames: FrameRange::new(first, last),
        message: format!(
            "Butt wink detected - squatting beyond hip mobility (hip: {:.0}°)",
            min_hip
        ),
        details: vec![("minHipDeg", min_hip), ("hipFloorDeg", config.hip_floor_deg)],
    })
}

fn knee_valgus(view: &RepView, config: &EngineConfig) -> Option<Finding> {
    let ratio = view.knee_ankle_ratio?;
    (ratio < config.valgus_min_ratio).then(|| Finding {
        frames: FrameRange::single(view.bottom_frame),
        message: format!(
            "Knees caving inward (knee/ankle width {:.2}) - push the knees out over the toes",
            ratio
        ),
        details: vec![("kneeAnkleRatio", ratio), ("minRatio", config.valgus_min_ratio)],
    })
}

fn insufficient_depth(view: &RepView, config: &EngineConfig) -> Option<Finding> {
    (view.knee > config.acceptable_depth_deg).then(|| Finding {
        frames: FrameRange::single(view.bottom_frame),
        message: format!(
            "Squat too shallow ({:.0}°) - aim for thighs parallel to the floor",
            view.knee
        ),
        details: vec![
            ("bottomKneeDeg", view.knee),
            ("thresholdDeg", config.acceptable_depth_deg),
        ],
    })
}

fn trunk_tibia_bias(view: &RepView, config: &EngineConfig) -> Option<Finding> {
    let angle = view.trunk_tibia?;
    let message = if angle > config.trunk_tibia_max_deg {
        format!(
            "Torso leaning further forward than the shins ({:+.0}°) - keep the chest up",
            angle
        )
    } else if angle < config.trunk_tibia_min_deg {
        format!(
            "Shins leaning further forward than the torso ({:+.0}°) - sit the hips back",
            angle
        )
    } else {
        return None;
    };
    Some(Finding {
        frames: FrameRange::single(view.bottom_frame),
        message,
        details: vec![
            ("trunkTibiaDeg", angle),
            ("minDeg", config.trunk_tibia_min_deg),
            ("maxDeg", config.trunk_tibia_max_deg),
        ],
    })
}

fn asymmetry(view: &RepView, config: &EngineConfig) -> Option<Finding> {
    let findings = symmetry_findings(view, config);
    let worst = findings
        .iter()
        .max_by(|a, b| a.delta_deg.total_cmp(&b.delta_deg))?;
    let mut details = Vec::new();
    for finding in &findings {
        match finding.joint {
            Joint::Knee => details.push(("kneeDeltaDeg", finding.delta_deg)),
            Joint::Hip => details.push(("hipDeltaDeg", finding.delta_deg)),
            Joint::Back => details.push(("backDeltaDeg", finding.delta_deg)),
        }
    }
    Some(Finding {
        frames: FrameRange::single(view.bottom_frame),
        message: format!(
            "Uneven {} angles at the bottom ({:.0}° difference) - check for a side-to-side shift",
            worst.joint.as_str(),
            worst.delta_deg
        ),
        details,
    })
}

/// Knee and hip left/right differences above the threshold at the bottom frame.
pub fn symmetry_findings(view: &RepView, config: &EngineConfig) -> Vec<SymmetryFinding> {
    [(Joint::Knee, view.knee_sides), (Joint::Hip, view.hip_sides)]
        .into_iter()
        .filter_map(|(joint, sides)| match sides {
            (Some(left), Some(right)) if (left - right).abs() > config.symmetry_threshold_deg => {
                Some(SymmetryFinding {
                    rep_index: view.rep.index,
                    joint,
                    frame: view.bottom_frame,
                    left_deg: left,
                    right_deg: right,
                    delta_deg: (left - right).abs(),
                })
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::testing::{rep_with, Pose};

    fn check(rule: RuleId, rep: &crate::models::Rep) -> Option<Finding> {
        let config = EngineConfig::default();
        let view = RepView::build(rep, &config).unwrap();
        let spec = SQUAT_RULES.iter().find(|r| r.id == rule).unwrap();
        (spec.check)(&view, &config)
    }

    #[test]
    fn point_values_come_from_config() {
        let config = EngineConfig {
            points_lumbar_flexion: 40,
            ..EngineConfig::default()
        };
        let spec = SQUAT_RULES.iter().find(|r| r.id == RuleId::LumbarFlexion).unwrap();
        assert_eq!((spec.points)(&config), 40);
        let info = SQUAT_RULES.iter().find(|r| r.id == RuleId::Asymmetry).unwrap();
        assert_eq!((info.points)(&config), 0);
    }

    #[test]
    fn brief_back_dip_is_not_flexion() {
        // Loss only on the single bottom frame.
        let mut rep = rep_with(Pose::sym(85.0, 95.0, 170.0, 0.0), 10, 1);
        let bottom = rep.bottom_frame;
        let frame = crate::evaluation::testing::frame(bottom, Some(Pose::sym(85.0, 95.0, 130.0, 0.0)));
        let pos = rep.frames.iter().position(|f| f.index() == bottom).unwrap();
        rep.frames[pos] = frame;

        assert_eq!(check(RuleId::LumbarFlexion, &rep), None);
    }

    #[test]
    fn back_closing_with_torso_lean_is_not_flexion() {
        // Back angle loses exactly what the torso gains in lean.
        let mut bottom = Pose::sym(90.0, 90.0, 135.0, 0.0);
        bottom.trunk_lean = Some(40.0);
        assert_eq!(check(RuleId::LumbarFlexion, &rep_with(bottom, 12, 4)), None);
    }

    #[test]
    fn back_loss_beyond_torso_lean_is_flexion() {
        let mut bottom = Pose::sym(90.0, 90.0, 125.0, 0.0);
        bottom.trunk_lean = Some(10.0);
        let finding = check(RuleId::LumbarFlexion, &rep_with(bottom, 12, 4)).unwrap();
        let loss = finding
            .details
            .iter()
            .find(|(key, _)| *key == "maxLossDeg")
            .map(|(_, value)| *value)
            .unwrap();
        assert!((loss - 40.0).abs() < 1e-3);
    }

    #[test]
    fn hip_under_floor_while_descending_is_pelvic_tilt() {
        let rep = rep_with(Pose::sym(70.0, 50.0, 170.0, 0.0), 12, 2);
        let finding = check(RuleId::PosteriorPelvicTilt, &rep).unwrap();
        assert!(finding.frames.end <= rep.bottom_frame);
        assert!(finding.message.contains("Butt wink"));
    }

    #[test]
    fn pelvic_tilt_suppresses_insufficient_depth() {
        let spec = SQUAT_RULES
            .iter()
            .find(|r| r.id == RuleId::InsufficientDepth)
            .unwrap();
        assert_eq!(spec.suppressed_by, &[RuleId::PosteriorPelvicTilt]);
    }

    #[test]
    fn trunk_tibia_band_is_inclusive() {
        let edge = rep_with(Pose::sym(85.0, 95.0, 170.0, 10.0), 10, 2);
        assert_eq!(check(RuleId::TrunkTibiaBias, &edge), None);

        let back = rep_with(Pose::sym(85.0, 95.0, 170.0, -15.0), 10, 2);
        let finding = check(RuleId::TrunkTibiaBias, &back).unwrap();
        assert!(finding.message.starts_with("Shins"));
    }

    #[test]
    fn valgus_needs_a_frontal_view() {
        let side = rep_with(Pose::sym(85.0, 95.0, 170.0, 0.0), 10, 2);
        assert_eq!(check(RuleId::KneeValgus, &side), None);

        let mut bottom = Pose::sym(85.0, 95.0, 170.0, 0.0);
        bottom.ratio = Some(0.9);
        assert_eq!(check(RuleId::KneeValgus, &rep_with(bottom, 10, 2)), None);
        bottom.ratio = Some(0.7);
        assert!(check(RuleId::KneeValgus, &rep_with(bottom, 10, 2)).is_some());
    }
}
