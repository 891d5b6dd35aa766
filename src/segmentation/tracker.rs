//! Rep assembly on top of the phase machine.
//!
//! The tracker owns the frames of the cycle in progress. While standing it
//! keeps only the most recent baseline frames; once a cycle closes it hands
//! the frames over to a `Rep` and keeps the closing standing frames, which
//! open the next cycle. A cycle that never closes holds at most
//! `max_cycle_frames` frames beyond the baseline; the oldest go first.

use std::collections::VecDeque;

use crate::log_debug;
use crate::models::{FrameRange, IncompleteReason, IncompleteRep, Joint, PhaseSpan, Rep, RepFrame, RepPhase};
use crate::segmentation::algorithm::{flush, step, CycleBounds, Observation, SegmentEvent, SegmenterState};
use crate::segmentation::config::SegmentationConfig;

const ENABLE_LOGS: bool = false;

#[derive(Debug, Default)]
pub struct TrackerUpdate {
    pub events: Vec<SegmentEvent>,
    pub closed: Option<Rep>,
}

#[derive(Debug, Clone)]
pub struct RepTracker {
    config: SegmentationConfig,
    state: SegmenterState,
    frames: VecDeque<RepFrame>,
    baseline_frames: usize,
    /// Span searched for the raw knee minimum behind the smoothed anchor.
    refine_window: u64,
    next_index: usize,
    last_frame: Option<u64>,
}

impl RepTracker {
    pub fn new(config: SegmentationConfig, baseline_frames: usize, smoothing_window: usize) -> Self {
        Self {
            config,
            state: SegmenterState::default(),
            frames: VecDeque::new(),
            baseline_frames: baseline_frames.max(1),
            refine_window: smoothing_window.max(1) as u64,
            next_index: 0,
            last_frame: None,
        }
    }

    pub fn phase(&self) -> RepPhase {
        self.state.phase.phase()
    }

    /// Reps closed or left open so far.
    pub fn reps_started(&self) -> usize {
        self.next_index
    }

    pub fn push(&mut self, frame: RepFrame) -> TrackerUpdate {
        let obs = Observation {
            frame: frame.index(),
            knee: frame.smoothed.joint(Joint::Knee),
            back: frame.smoothed.joint(Joint::Back),
        };
        self.last_frame = Some(obs.frame);
        self.frames.push_back(frame);

        let (next, events) = step(&self.state, &obs, &self.config);
        self.state = next;

        let mut closed = None;
        for event in &events {
            match event {
                SegmentEvent::RepClosed(bounds) => {
                    closed = Some(self.close(bounds));
                }
                SegmentEvent::DescentAborted { start, min } => {
                    log_debug!(
                        "[SEGMENT] Descent from frame {} aborted at {:.1}°",
                        start,
                        min.value
                    );
                }
                SegmentEvent::PhaseEntered { phase, frame } => {
                    log_debug!("[SEGMENT] {} from frame {}", phase.as_str(), frame);
                }
                SegmentEvent::StandingEstablished { frame } => {
                    log_debug!("[SEGMENT] Standing established at frame {}", frame);
                }
            }
        }

        let mut cap = self.baseline_frames + self.config.debounce_frames as usize;
        if self.phase() != RepPhase::Standing {
            cap += self.config.max_cycle_frames;
        }
        while self.frames.len() > cap {
            self.frames.pop_front();
        }

        TrackerUpdate { events, closed }
    }

    /// End of input. Closes the cycle in progress if the lifter was already
    /// back at standing height on the way up.
    pub fn flush(&mut self) -> Option<Rep> {
        let last_frame = self.last_frame?;
        let last_raw_knee = self.frames.back().and_then(|f| f.raw.joint(Joint::Knee));
        let (next, bounds) = flush(&self.state, last_frame, last_raw_knee, &self.config)?;
        self.state = next;
        log_debug!("[SEGMENT] Rep closed by end of input at frame {}", last_frame);
        Some(self.close(&bounds))
    }

    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    fn close(&mut self, bounds: &CycleBounds) -> Rep {
        let mut phases = bounds.phases.clone();
        self.clamp_opening(&mut phases);

        let descent_start = phases
            .iter()
            .find(|s| s.phase == RepPhase::Descending)
            .map(|s| s.start_frame)
            .unwrap_or(bounds.bottom.frame);
        let bottom_frame = self.refine_bottom(bounds.bottom.frame, descent_start);
        for span in phases.iter_mut() {
            match span.phase {
                RepPhase::Descending => span.end_frame = bottom_frame.saturating_sub(1).max(span.start_frame),
                RepPhase::Bottom => span.start_frame = bottom_frame,
                _ => {}
            }
        }

        let opening_start = phases.first().map(|s| s.start_frame).unwrap_or(bottom_frame);
        let closing_start = phases.last().map(|s| s.start_frame).unwrap_or(bottom_frame);
        let frames: Vec<RepFrame> = self
            .frames
            .iter()
            .filter(|f| f.index() >= opening_start)
            .cloned()
            .collect();
        while self.frames.front().map_or(false, |f| f.index() < closing_start) {
            self.frames.pop_front();
        }

        let rep = Rep {
            index: self.next_index,
            phases,
            bottom_frame,
            depth_deg: bounds.bottom.value,
            frames,
        };
        self.next_index += 1;
        rep
    }

    /// Limit the opening standing span to the retained baseline frames.
    fn clamp_opening(&self, phases: &mut [PhaseSpan]) {
        let Some(opening) = phases.first_mut().filter(|s| s.phase == RepPhase::Standing) else {
            return;
        };
        let retained = self.frames.front().map_or(opening.start_frame, |f| f.index());
        let baseline_start = (opening.end_frame + 1).saturating_sub(self.baseline_frames as u64);
        opening.start_frame = opening
            .start_frame
            .max(retained)
            .max(baseline_start)
            .min(opening.end_frame);
    }

    /// Raw knee minimum in the trailing window ending at the smoothed anchor.
    /// Stays after the descent start; falls back to the anchor without raw data.
    fn refine_bottom(&self, anchor: u64, descent_start: u64) -> u64 {
        let earliest = anchor.saturating_sub(self.refine_window - 1).max(descent_start + 1);
        self.frames
            .iter()
            .filter(|f| (earliest..=anchor).contains(&f.index()))
            .filter_map(|f| f.raw.joint(Joint::Knee).map(|knee| (f.index(), knee)))
            .fold(None, |best: Option<(u64, f32)>, (index, knee)| match best {
                Some((_, best_knee)) if best_knee <= knee => best,
                _ => Some((index, knee)),
            })
            .map(|(index, _)| index)
            .unwrap_or(anchor)
    }

    /// The cycle in progress as an incomplete rep, if the lifter has left standing.
    pub fn incomplete(&self, reason: IncompleteReason) -> Option<IncompleteRep> {
        let last_frame = self.last_frame?;
        let mut phases: Vec<PhaseSpan> = self.state.open_cycle(last_frame)?;
        self.clamp_opening(&mut phases);
        let start = phases.first().map(|s| s.start_frame).unwrap_or(last_frame);
        Some(IncompleteRep {
            index: self.next_index,
            last_phase: self.phase(),
            phases,
            frames: FrameRange::new(start, last_frame),
            reason,
        })
    }
}
