use crate::models::{PhaseSpan, RepPhase};
use crate::segmentation::config::SegmentationConfig;

/// What the segmenter sees of one analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub frame: u64,
    /// Smoothed knee angle, mean of the valid sides.
    pub knee: Option<f32>,
    /// Smoothed back angle, mean of the valid sides.
    pub back: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub frame: u64,
    pub value: f32,
}

/// Phase plus every counter the transitions depend on.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseState {
    Standing {
        /// First frame of the standing run, once one has started.
        since: Option<u64>,
        stable_run: u32,
        established: bool,
        descent_run: u32,
        descent_start: Option<u64>,
    },
    Descending {
        standing_since: u64,
        start: u64,
        min: Extremum,
        stall_run: u32,
        rise_run: u32,
        rise_start: Option<u64>,
    },
    Bottom {
        standing_since: u64,
        descent_start: u64,
        min: Extremum,
        rise_run: u32,
        rise_start: Option<u64>,
    },
    Ascending {
        standing_since: u64,
        descent_start: u64,
        bottom: Extremum,
        start: u64,
        above_run: u32,
        above_start: Option<u64>,
    },
}

impl PhaseState {
    pub fn phase(&self) -> RepPhase {
        match self {
            PhaseState::Standing { .. } => RepPhase::Standing,
            PhaseState::Descending { .. } => RepPhase::Descending,
            PhaseState::Bottom { .. } => RepPhase::Bottom,
            PhaseState::Ascending { .. } => RepPhase::Ascending,
        }
    }

    fn established_standing(since: u64, stable_run: u32) -> Self {
        PhaseState::Standing {
            since: Some(since),
            stable_run,
            established: true,
            descent_run: 0,
            descent_start: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterState {
    pub phase: PhaseState,
    /// Knee value of the last frame that was not ignored.
    pub last_knee: Option<f32>,
    /// Back value of the last frame that passed the jitter guard.
    pub last_back: Option<f32>,
    /// Consecutive frames rejected by the jitter guard.
    pub back_rejections: u32,
}

impl Default for SegmenterState {
    fn default() -> Self {
        Self {
            phase: PhaseState::Standing {
                since: None,
                stable_run: 0,
                established: false,
                descent_run: 0,
                descent_start: None,
            },
            last_knee: None,
            last_back: None,
            back_rejections: 0,
        }
    }
}

impl SegmenterState {
    /// Spans of a cycle that left STANDING but has not closed, the last one
    /// ending at `last_frame`. `None` while standing.
    pub fn open_cycle(&self, last_frame: u64) -> Option<Vec<PhaseSpan>> {
        match &self.phase {
            PhaseState::Standing { .. } => None,
            PhaseState::Descending {
                standing_since,
                start,
                ..
            } => Some(vec![
                span(RepPhase::Standing, *standing_since, *start),
                span_to(RepPhase::Descending, *start, last_frame),
            ]),
            PhaseState::Bottom {
                standing_since,
                descent_start,
                min,
                ..
            } => Some(vec![
                span(RepPhase::Standing, *standing_since, *descent_start),
                span(RepPhase::Descending, *descent_start, min.frame),
                span_to(RepPhase::Bottom, min.frame, last_frame),
            ]),
            PhaseState::Ascending {
                standing_since,
                descent_start,
                bottom,
                start,
                ..
            } => Some(vec![
                span(RepPhase::Standing, *standing_since, *descent_start),
                span(RepPhase::Descending, *descent_start, bottom.frame),
                span(RepPhase::Bottom, bottom.frame, *start),
                span_to(RepPhase::Ascending, *start, last_frame),
            ]),
        }
    }
}

/// Frame boundaries of a closed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleBounds {
    /// Standing, Descending, Bottom, Ascending, Standing.
    pub phases: Vec<PhaseSpan>,
    /// Smoothed knee minimum the Bottom phase is anchored at.
    pub bottom: Extremum,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    StandingEstablished { frame: u64 },
    PhaseEntered { phase: RepPhase, frame: u64 },
    /// A descent that never got deep enough to be a rep.
    DescentAborted { start: u64, min: Extremum },
    RepClosed(CycleBounds),
}

/// Span from `start` up to the frame before `next_start`.
fn span(phase: RepPhase, start: u64, next_start: u64) -> PhaseSpan {
    span_to(phase, start, next_start.saturating_sub(1))
}

fn span_to(phase: RepPhase, start: u64, end: u64) -> PhaseSpan {
    PhaseSpan {
        phase,
        start_frame: start,
        end_frame: end.max(start),
    }
}

/// Advance a run counter, remembering the frame it started on.
fn extend_run(run: &mut u32, start: &mut Option<u64>, frame: u64) {
    if *run == 0 {
        *start = Some(frame);
    }
    *run += 1;
}

fn reset_run(run: &mut u32, start: &mut Option<u64>) {
    *run = 0;
    *start = None;
}

/// Pure transition function of the rep phase machine.
///
/// Frames without a knee value, and frames whose back angle jumps more than
/// the jitter limit from the last accepted one, leave every counter
/// untouched. A jump that persists for `debounce_frames` is a new level and
/// is accepted.
pub fn step(
    state: &SegmenterState,
    obs: &Observation,
    config: &SegmentationConfig,
) -> (SegmenterState, Vec<SegmentEvent>) {
    let Some(knee) = obs.knee else {
        return (state.clone(), Vec::new());
    };

    let debounce = config.debounce_frames.max(1);
    let mut next = state.clone();
    if let Some(back) = obs.back {
        let jump = state
            .last_back
            .map_or(false, |previous| (back - previous).abs() > config.back_jitter_limit_deg);
        if jump && state.back_rejections + 1 < debounce {
            next.back_rejections += 1;
            return (next, Vec::new());
        }
        next.last_back = Some(back);
        next.back_rejections = 0;
    }

    let frame = obs.frame;
    let standing = knee >= config.standing_threshold_deg;
    let falling = state.last_knee.map_or(false, |last| knee < last);
    let mut events = Vec::new();

    next.phase = match state.phase.clone() {
        PhaseState::Standing {
            mut since,
            mut stable_run,
            mut established,
            mut descent_run,
            mut descent_start,
        } => {
            if standing {
                if stable_run == 0 && !established {
                    since = Some(frame);
                }
                stable_run = stable_run.saturating_add(1);
                reset_run(&mut descent_run, &mut descent_start);
                if !established && stable_run >= debounce {
                    established = true;
                    events.push(SegmentEvent::StandingEstablished { frame });
                }
            } else if !established {
                stable_run = 0;
                since = None;
            } else if falling {
                extend_run(&mut descent_run, &mut descent_start, frame);
            } else {
                reset_run(&mut descent_run, &mut descent_start);
            }

            match (established, since, descent_start) {
                (true, Some(standing_since), Some(start)) if descent_run >= debounce => {
                    events.push(SegmentEvent::PhaseEntered {
                        phase: RepPhase::Descending,
                        frame: start,
                    });
                    PhaseState::Descending {
                        standing_since,
                        start,
                        min: Extremum { frame, value: knee },
                        stall_run: 0,
                        rise_run: 0,
                        rise_start: None,
                    }
                }
                _ => PhaseState::Standing {
                    since,
                    stable_run,
                    established,
                    descent_run,
                    descent_start,
                },
            }
        }

        PhaseState::Descending {
            standing_since,
            start,
            mut min,
            mut stall_run,
            mut rise_run,
            mut rise_start,
        } => {
            if knee < min.value {
                min = Extremum { frame, value: knee };
                stall_run = 0;
                reset_run(&mut rise_run, &mut rise_start);
            } else {
                stall_run += 1;
                track_rise(&mut rise_run, &mut rise_start, state.last_knee, knee, min, frame, config);
            }

            if stall_run < debounce {
                PhaseState::Descending {
                    standing_since,
                    start,
                    min,
                    stall_run,
                    rise_run,
                    rise_start,
                }
            } else if min.value > config.rep_floor_deg() {
                events.push(SegmentEvent::DescentAborted { start, min });
                PhaseState::established_standing(standing_since, debounce)
            } else {
                events.push(SegmentEvent::PhaseEntered {
                    phase: RepPhase::Bottom,
                    frame: min.frame,
                });
                enter_ascent_if_rising(
                    standing_since,
                    start,
                    min,
                    rise_run,
                    rise_start,
                    debounce,
                    &mut events,
                )
            }
        }

        PhaseState::Bottom {
            standing_since,
            descent_start,
            mut min,
            mut rise_run,
            mut rise_start,
        } => {
            if knee < min.value {
                min = Extremum { frame, value: knee };
                reset_run(&mut rise_run, &mut rise_start);
            } else {
                track_rise(&mut rise_run, &mut rise_start, state.last_knee, knee, min, frame, config);
            }
            enter_ascent_if_rising(
                standing_since,
                descent_start,
                min,
                rise_run,
                rise_start,
                debounce,
                &mut events,
            )
        }

        PhaseState::Ascending {
            standing_since,
            descent_start,
            bottom,
            start,
            mut above_run,
            mut above_start,
        } => {
            if standing {
                extend_run(&mut above_run, &mut above_start, frame);
            } else {
                reset_run(&mut above_run, &mut above_start);
            }

            match above_start {
                Some(closing_start) if above_run >= debounce => {
                    let phases = vec![
                        span(RepPhase::Standing, standing_since, descent_start),
                        span(RepPhase::Descending, descent_start, bottom.frame),
                        span(RepPhase::Bottom, bottom.frame, start),
                        span(RepPhase::Ascending, start, closing_start),
                        span_to(RepPhase::Standing, closing_start, frame),
                    ];
                    events.push(SegmentEvent::PhaseEntered {
                        phase: RepPhase::Standing,
                        frame: closing_start,
                    });
                    events.push(SegmentEvent::RepClosed(CycleBounds { phases, bottom }));
                    PhaseState::established_standing(closing_start, above_run)
                }
                _ => PhaseState::Ascending {
                    standing_since,
                    descent_start,
                    bottom,
                    start,
                    above_run,
                    above_start,
                },
            }
        }
    };

    next.last_knee = Some(knee);
    (next, events)
}

/// Close a cycle cut off by the end of input while the lifter was already
/// back up: the smoothed knee has started a standing run, or the last raw
/// knee is at standing height. Returns the state after the close.
pub fn flush(
    state: &SegmenterState,
    last_frame: u64,
    last_raw_knee: Option<f32>,
    config: &SegmentationConfig,
) -> Option<(SegmenterState, CycleBounds)> {
    let PhaseState::Ascending {
        standing_since,
        descent_start,
        bottom,
        start,
        above_run,
        above_start,
    } = &state.phase
    else {
        return None;
    };

    let closing_start = match above_start {
        Some(frame) if *above_run >= 1 => *frame,
        _ if last_raw_knee.map_or(false, |knee| knee >= config.standing_threshold_deg) => last_frame,
        _ => return None,
    };
    if closing_start <= *start {
        return None;
    }

    let bounds = CycleBounds {
        phases: vec![
            span(RepPhase::Standing, *standing_since, *descent_start),
            span(RepPhase::Descending, *descent_start, bottom.frame),
            span(RepPhase::Bottom, bottom.frame, *start),
            span(RepPhase::Ascending, *start, closing_start),
            span_to(RepPhase::Standing, closing_start, last_frame),
        ],
        bottom: *bottom,
    };
    let next = SegmenterState {
        phase: PhaseState::established_standing(closing_start, (*above_run).max(1)),
        ..state.clone()
    };
    Some((next, bounds))
}

/// Count a frame as rising when it clears the minimum by more than the noise
/// band without falling back against the previous frame.
fn track_rise(
    rise_run: &mut u32,
    rise_start: &mut Option<u64>,
    last_knee: Option<f32>,
    knee: f32,
    min: Extremum,
    frame: u64,
    config: &SegmentationConfig,
) {
    let tol = config.noise_tolerance_deg;
    let rising = knee > min.value + tol && last_knee.map_or(true, |last| knee >= last - tol);
    if rising {
        extend_run(rise_run, rise_start, frame);
    } else {
        reset_run(rise_run, rise_start);
    }
}

fn enter_ascent_if_rising(
    standing_since: u64,
    descent_start: u64,
    min: Extremum,
    rise_run: u32,
    rise_start: Option<u64>,
    debounce: u32,
    events: &mut Vec<SegmentEvent>,
) -> PhaseState {
    match rise_start {
        Some(start) if rise_run >= debounce => {
            events.push(SegmentEvent::PhaseEntered {
                phase: RepPhase::Ascending,
                frame: start,
            });
            PhaseState::Ascending {
                standing_since,
                descent_start,
                bottom: min,
                start,
                above_run: 0,
                above_start: None,
            }
        }
        _ => PhaseState::Bottom {
            standing_since,
            descent_start,
            min,
            rise_run,
            rise_start,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(knees: &[Option<f32>]) -> (SegmenterState, Vec<SegmentEvent>) {
        let config = SegmentationConfig::default();
        let mut state = SegmenterState::default();
        let mut all = Vec::new();
        for (frame, knee) in knees.iter().enumerate() {
            let obs = Observation {
                frame: frame as u64,
                knee: *knee,
                back: Some(170.0),
            };
            let (next, events) = step(&state, &obs, &config);
            state = next;
            all.extend(events);
        }
        (state, all)
    }

    /// Standing, linear descent to `bottom`, linear ascent, standing again.
    fn cycle(bottom: f32, half: usize) -> Vec<Option<f32>> {
        let mut knees = vec![Some(170.0); 5];
        for i in 1..=half {
            knees.push(Some(170.0 - (170.0 - bottom) * i as f32 / half as f32));
        }
        for i in 1..=half {
            knees.push(Some(bottom + (170.0 - bottom) * i as f32 / half as f32));
        }
        knees.extend(vec![Some(170.0); 5]);
        knees
    }

    fn closed(events: &[SegmentEvent]) -> Vec<&CycleBounds> {
        events
            .iter()
            .filter_map(|e| match e {
                SegmentEvent::RepClosed(bounds) => Some(bounds),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn one_clean_cycle_closes_one_rep() {
        let (state, events) = run(&cycle(90.0, 15));
        let reps = closed(&events);
        assert_eq!(reps.len(), 1);

        let bounds = reps[0];
        let phases: Vec<RepPhase> = bounds.phases.iter().map(|s| s.phase).collect();
        assert_eq!(
            phases,
            vec![
                RepPhase::Standing,
                RepPhase::Descending,
                RepPhase::Bottom,
                RepPhase::Ascending,
                RepPhase::Standing
            ]
        );
        // Minimum sits at frame 5 + 15 - 1.
        assert_eq!(bounds.bottom.frame, 19);
        assert!((bounds.bottom.value - 90.0).abs() < 1e-4);
        assert_eq!(state.phase.phase(), RepPhase::Standing);
    }

    #[test]
    fn phase_spans_are_contiguous() {
        let (_, events) = run(&cycle(80.0, 12));
        let bounds = closed(&events)[0];
        for pair in bounds.phases.windows(2) {
            assert_eq!(pair[0].end_frame + 1, pair[1].start_frame);
        }
    }

    #[test]
    fn shallow_dip_is_aborted() {
        let (state, events) = run(&cycle(150.0, 10));
        assert!(closed(&events).is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, SegmentEvent::DescentAborted { .. })));
        assert_eq!(state.phase.phase(), RepPhase::Standing);
    }

    #[test]
    fn invalid_frames_do_not_move_counters() {
        let mut knees = cycle(90.0, 15);
        knees.insert(12, None);
        knees.insert(12, None);
        let (_, events) = run(&knees);
        assert_eq!(closed(&events).len(), 1);
    }

    #[test]
    fn never_standing_back_up_leaves_cycle_open() {
        let mut knees = vec![Some(170.0); 5];
        for i in 1..=15 {
            knees.push(Some(170.0 - 80.0 * i as f32 / 15.0));
        }
        knees.extend(vec![Some(90.0); 10]);
        let (state, events) = run(&knees);
        assert!(closed(&events).is_empty());
        assert_eq!(state.phase.phase(), RepPhase::Bottom);

        let spans = state.open_cycle(29).unwrap();
        assert_eq!(spans.last().unwrap().phase, RepPhase::Bottom);
        assert_eq!(spans.last().unwrap().end_frame, 29);
    }

    #[test]
    fn back_jitter_frame_is_ignored() {
        let config = SegmentationConfig::default();
        let state = SegmenterState {
            last_knee: Some(170.0),
            last_back: Some(170.0),
            ..SegmenterState::default()
        };
        let obs = Observation {
            frame: 7,
            knee: Some(120.0),
            back: Some(120.0),
        };
        let (next, events) = step(&state, &obs, &config);
        assert!(events.is_empty());
        assert_eq!(next.phase, state.phase);
        assert_eq!(next.last_knee, Some(170.0));
        assert_eq!(next.last_back, Some(170.0));
        assert_eq!(next.back_rejections, 1);
    }

    #[test]
    fn frame_after_a_back_spike_is_kept() {
        let config = SegmentationConfig::default();
        let state = SegmenterState {
            last_knee: Some(170.0),
            last_back: Some(170.0),
            ..SegmenterState::default()
        };
        let spike = Observation {
            frame: 7,
            knee: Some(165.0),
            back: Some(120.0),
        };
        let (state, _) = step(&state, &spike, &config);

        let normal = Observation {
            frame: 8,
            knee: Some(165.0),
            back: Some(168.0),
        };
        let (next, _) = step(&state, &normal, &config);
        assert_eq!(next.last_knee, Some(165.0));
        assert_eq!(next.last_back, Some(168.0));
        assert_eq!(next.back_rejections, 0);
    }

    #[test]
    fn sustained_back_shift_becomes_the_new_level() {
        let config = SegmentationConfig::default();
        let mut state = SegmenterState {
            last_knee: Some(170.0),
            last_back: Some(170.0),
            ..SegmenterState::default()
        };
        for frame in 0..3 {
            let obs = Observation {
                frame,
                knee: Some(170.0),
                back: Some(130.0),
            };
            state = step(&state, &obs, &config).0;
        }
        assert_eq!(state.last_back, Some(130.0));
        assert_eq!(state.back_rejections, 0);
    }

    #[test]
    fn input_ending_on_the_way_up_closes_the_rep() {
        // 170 -> 90 -> 170 with no trailing standing frames.
        let mut knees = vec![Some(170.0); 3];
        knees.extend((1..=30).map(|i| {
            let t = (if i <= 15 { i } else { 30 - i }) as f32;
            Some(170.0 - 80.0 * t / 15.0)
        }));
        let (state, events) = run(&knees);
        assert!(closed(&events).is_empty());
        assert_eq!(state.phase.phase(), RepPhase::Ascending);

        let (after, bounds) = flush(&state, 32, Some(170.0), &SegmentationConfig::default()).unwrap();
        assert_eq!(after.phase.phase(), RepPhase::Standing);
        assert_eq!(bounds.bottom.frame, 17);
        assert_eq!(bounds.phases.len(), 5);
        assert_eq!(bounds.phases.last().unwrap().end_frame, 32);
        for pair in bounds.phases.windows(2) {
            assert_eq!(pair[0].end_frame + 1, pair[1].start_frame);
        }
    }

    #[test]
    fn flush_leaves_a_rep_still_below_standing_open() {
        let mut knees = vec![Some(170.0); 5];
        for i in 1..=15 {
            knees.push(Some(170.0 - 80.0 * i as f32 / 15.0));
        }
        for i in 1..=6 {
            knees.push(Some(90.0 + 5.0 * i as f32));
        }
        let (state, _) = run(&knees);
        assert_eq!(state.phase.phase(), RepPhase::Ascending);
        assert!(flush(&state, 25, Some(120.0), &SegmentationConfig::default()).is_none());
    }

    #[test]
    fn no_descent_without_established_standing() {
        let knees: Vec<Option<f32>> = (0..20).map(|i| Some(150.0 - i as f32 * 3.0)).collect();
        let (state, events) = run(&knees);
        assert!(events.is_empty());
        assert_eq!(state.phase.phase(), RepPhase::Standing);
    }
}
