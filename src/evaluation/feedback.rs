//! Coaching text for a scored rep.

use crate::config::EngineConfig;
use crate::evaluation::RepView;
use crate::models::{GroupedFeedback, RuleId, Severity, Violation};

const MAX_HIGHLIGHTS: usize = 3;

/// Penalized messages in priority order, then informational ones, capped.
pub fn ranked(violations: &[Violation], max_items: usize) -> Vec<String> {
    let penalized = violations.iter().filter(|v| !v.is_informational());
    let informational = violations.iter().filter(|v| v.is_informational());
    penalized
        .chain(informational)
        .take(max_items)
        .map(|v| v.message.clone())
        .collect()
}

/// Critical issues, then high and medium as improvements, low as optimizations.
pub fn grouped(violations: &[Violation]) -> GroupedFeedback {
    let mut out = GroupedFeedback::default();
    for violation in violations {
        let bucket = match violation.severity {
            Severity::Critical => &mut out.critical_issues,
            Severity::High | Severity::Medium => &mut out.improvements,
            Severity::Low => &mut out.optimizations,
        };
        bucket.push(violation.message.clone());
    }
    out
}

pub fn summary(violations: &[Violation], score: u32) -> String {
    let critical = violations.iter().any(|v| v.severity == Severity::Critical);
    let text = if critical {
        "Critical safety issues detected - address immediately"
    } else if score >= 90 {
        "Excellent form! Keep it up."
    } else if score >= 75 {
        "Good form with room for improvement."
    } else if score >= 60 {
        "Fair form - address the issues below."
    } else {
        "Form needs significant improvement for safety."
    };
    text.to_string()
}

/// What went right, for the aspects that were measurable and did not fire.
pub fn highlights(view: &RepView, violations: &[Violation], config: &EngineConfig) -> Vec<String> {
    let fired = |rule: RuleId| violations.iter().any(|v| v.rule == rule);
    let mut out = Vec::new();

    if (config.ideal_depth_min_deg..=config.ideal_depth_max_deg).contains(&view.knee) {
        out.push(format!("Good depth ({:.0}°)", view.knee));
    }
    if view.baseline_back.is_some() && !fired(RuleId::LumbarFlexion) {
        out.push("Spine stayed neutral through the bottom".to_string());
    }
    if view.trunk_tibia.is_some() && !fired(RuleId::TrunkTibiaBias) {
        out.push("Torso and shins stayed balanced".to_string());
    }
    if view.knee_ankle_ratio.is_some() && !fired(RuleId::KneeValgus) {
        out.push("Knees tracked over the feet".to_string());
    }
    let both_sides = matches!(view.knee_sides, (Some(_), Some(_)));
    if both_sides && !fired(RuleId::Asymmetry) {
        out.push("Left and right sides moved evenly".to_string());
    }

    out.truncate(MAX_HIGHLIGHTS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrameRange;

    fn violation(rule: RuleId, severity: Severity, points: u32) -> Violation {
        Violation {
            rule,
            priority: 0,
            severity,
            points,
            frames: FrameRange::single(0),
            message: rule.as_str().to_string(),
            details: Default::default(),
        }
    }

    #[test]
    fn informational_messages_come_last() {
        let violations = vec![
            violation(RuleId::Asymmetry, Severity::Low, 0),
            violation(RuleId::KneeValgus, Severity::High, 20),
            violation(RuleId::TrunkTibiaBias, Severity::Low, 5),
        ];
        assert_eq!(
            ranked(&violations, 5),
            vec!["knee_valgus", "trunk_tibia_bias", "asymmetry"]
        );
        assert_eq!(ranked(&violations, 1), vec!["knee_valgus"]);
    }

    #[test]
    fn critical_violation_overrides_score_band() {
        let violations = vec![violation(RuleId::LumbarFlexion, Severity::Critical, 30)];
        assert_eq!(
            summary(&violations, 70),
            "Critical safety issues detected - address immediately"
        );
    }

    #[test]
    fn grouped_buckets_follow_severity() {
        let violations = vec![
            violation(RuleId::LumbarFlexion, Severity::Critical, 30),
            violation(RuleId::KneeValgus, Severity::High, 20),
            violation(RuleId::InsufficientDepth, Severity::Medium, 10),
            violation(RuleId::TrunkTibiaBias, Severity::Low, 5),
        ];
        let grouped = grouped(&violations);
        assert_eq!(grouped.critical_issues, vec!["lumbar_flexion"]);
        assert_eq!(grouped.improvements, vec!["knee_valgus", "insufficient_depth"]);
        assert_eq!(grouped.optimizations, vec!["trunk_tibia_bias"]);
    }

    #[test]
    fn summary_bands() {
        assert_eq!(summary(&[], 95), "Excellent form! Keep it up.");
        assert_eq!(summary(&[], 80), "Good form with room for improvement.");
        assert_eq!(summary(&[], 60), "Fair form - address the issues below.");
        assert_eq!(summary(&[], 40), "Form needs significant improvement for safety.");
    }
}
