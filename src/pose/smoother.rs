//! Trailing-median smoothing of per-frame angle signals.
//!
//! Each angle owns an independent ring buffer of its last valid samples.
//! Invalid samples are never inserted; instead every stored sample carries
//! the ordinal of the frame it came from, and only samples inside the
//! trailing window count. A single dropped frame therefore barely matters,
//! while a run of dropped frames longer than the window empties it.

use std::collections::BTreeMap;

use super::ring::RingBuffer;
use crate::models::{AngleName, AngleSample, SmoothedAngleSample, SmoothedValue};

#[derive(Debug, Clone, Copy)]
struct Stamped {
    tick: u64,
    value: f32,
}

#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    window: usize,
    min_samples: usize,
    buffers: BTreeMap<AngleName, RingBuffer<Stamped>>,
    /// Frames pushed so far; the ordinal of the next frame.
    ticks: u64,
}

impl TemporalSmoother {
    pub fn new(window: usize, min_samples: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            min_samples: min_samples.clamp(1, window),
            buffers: AngleName::ALL
                .iter()
                .map(|name| (*name, RingBuffer::new(window)))
                .collect(),
            ticks: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Feed the next frame's raw angles; returns the smoothed view of the same frame.
    pub fn push(&mut self, raw: &AngleSample) -> SmoothedAngleSample {
        let tick = self.ticks;
        self.ticks += 1;
        let warming_up = self.ticks <= self.window as u64;
        let oldest_tick = (tick + 1).saturating_sub(self.window as u64);

        let mut values = BTreeMap::new();
        for (name, buffer) in self.buffers.iter_mut() {
            let current = raw.get(*name);
            if let Some(value) = current {
                buffer.push(Stamped { tick, value });
            }

            let mut eligible: Vec<f32> = buffer
                .iter()
                .filter(|s| s.tick >= oldest_tick)
                .map(|s| s.value)
                .collect();

            let smoothed = if eligible.len() >= self.min_samples {
                SmoothedValue {
                    value: Some(median(&mut eligible)),
                    samples: eligible.len(),
                    raw_fallback: false,
                }
            } else if warming_up && current.is_some() {
                SmoothedValue {
                    value: current,
                    samples: eligible.len(),
                    raw_fallback: true,
                }
            } else {
                SmoothedValue::invalid(eligible.len())
            };
            values.insert(*name, smoothed);
        }

        SmoothedAngleSample {
            frame_index: raw.frame_index,
            window: self.window,
            values,
        }
    }

    pub fn reset(&mut self) {
        for buffer in self.buffers.values_mut() {
            buffer.clear();
        }
        self.ticks = 0;
    }
}

/// Median of a non-empty slice; the mean of the two middle values for even lengths.
fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knee_sample(frame: u64, knee: Option<f32>) -> AngleSample {
        let mut sample = AngleSample::invalid(frame);
        sample.values.insert(AngleName::KneeAngleLeft, knee);
        sample
    }

    #[test]
    fn constant_signal_is_unchanged() {
        let mut smoother = TemporalSmoother::new(5, 3);
        let mut last = None;
        for frame in 0..8 {
            last = Some(smoother.push(&knee_sample(frame, Some(142.5))));
        }
        let last = last.unwrap();
        let value = last.values[&AngleName::KneeAngleLeft];
        assert_eq!(value.value, Some(142.5));
        assert_eq!(value.samples, 5);
        assert!(!value.raw_fallback);
    }

    #[test]
    fn single_spike_is_rejected() {
        let mut smoother = TemporalSmoother::new(5, 3);
        let signal = [120.0, 121.0, 30.0, 122.0, 123.0];
        let mut out = Vec::new();
        for (frame, v) in signal.iter().enumerate() {
            out.push(smoother.push(&knee_sample(frame as u64, Some(*v))));
        }
        let smoothed = out[4].get(AngleName::KneeAngleLeft).unwrap();
        assert_eq!(smoothed, 121.0);
    }

    #[test]
    fn warm_up_passes_raw_values_through() {
        let mut smoother = TemporalSmoother::new(5, 3);
        let first = smoother.push(&knee_sample(0, Some(170.0)));
        let value = first.values[&AngleName::KneeAngleLeft];
        assert_eq!(value.value, Some(170.0));
        assert!(value.raw_fallback);
        assert_eq!(first.get(AngleName::HipAngleLeft), None);
    }

    #[test]
    fn isolated_invalid_frame_keeps_output_valid() {
        let mut smoother = TemporalSmoother::new(5, 3);
        for frame in 0..6 {
            smoother.push(&knee_sample(frame, Some(150.0)));
        }
        let gap = smoother.push(&knee_sample(6, None));
        assert_eq!(gap.get(AngleName::KneeAngleLeft), Some(150.0));
    }

    #[test]
    fn sustained_invalid_run_invalidates_output() {
        let mut smoother = TemporalSmoother::new(5, 3);
        for frame in 0..6 {
            smoother.push(&knee_sample(frame, Some(150.0)));
        }
        let mut last = None;
        for frame in 6..9 {
            last = Some(smoother.push(&knee_sample(frame, None)));
        }
        // Only frames 4 and 5 remain inside the window.
        let value = last.unwrap().values[&AngleName::KneeAngleLeft];
        assert_eq!(value.value, None);
        assert_eq!(value.samples, 2);
    }

    #[test]
    fn even_count_median_averages_middle_pair() {
        let mut values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), 2.5);
    }
}
