use crate::config::EngineConfig;
use crate::models::{Grade, Severity, SeverityCounts, Violation};

const MAX_SCORE: u32 = 100;

/// Sum of deducted points across violations.
pub fn total_points(violations: &[Violation]) -> u32 {
    violations.iter().map(|v| v.points).sum()
}

/// 100 minus deducted points, floored at 0.
pub fn rep_score(violations: &[Violation]) -> u32 {
    MAX_SCORE.saturating_sub(total_points(violations))
}

pub fn grade(score: u32) -> Grade {
    if score >= 90 {
        Grade::A
    } else if score >= 80 {
        Grade::B
    } else if score >= 70 {
        Grade::C
    } else if score >= 60 {
        Grade::D
    } else {
        Grade::F
    }
}

pub fn is_passing(score: u32, config: &EngineConfig) -> bool {
    score >= config.passing_score
}

/// `rules_checked` is how many rules ran; the ones that did not fire count as passed.
pub fn severity_counts(violations: &[Violation], rules_checked: usize) -> SeverityCounts {
    let of = |severity: Severity| violations.iter().filter(|v| v.severity == severity).count();
    SeverityCounts {
        total: violations.len(),
        critical: of(Severity::Critical),
        high: of(Severity::High),
        medium: of(Severity::Medium),
        low: of(Severity::Low),
        passed: rules_checked.saturating_sub(violations.len()),
    }
}
