//! Beat synthesis.
//!
//! Each beat is laid out on its own local timeline as a list of pulse windows
//! (P repetitions, then one Q/R/S triple per QRS complex, then T), stretched so
//! the whole beat lasts exactly one heart period. The synthesizer samples those
//! windows at one sample per sweep pixel.

use std::f64::consts::PI;

use log::debug;

use crate::monitor::params::{ParameterModel, WaveSegmentParams};
use crate::monitor::scheduler::{BeatOverrides, BeatScheduler};

/// Raised-cosine bump starting at `start`: 0 at both edges, `height` at the midpoint.
pub fn raised_cosine(t: f64, height: f64, breadth: f64, start: f64) -> f64 {
    if breadth == 0.0 || t < start || t > start + breadth {
        return 0.0;
    }
    (height / 2.0) * (1.0 - (2.0 * PI * (t - start) / breadth).cos())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    P,
    Q,
    R,
    S,
    T,
}

/// One pulse on the beat's local timeline. Owns the half-open span
/// `[start, start + breadth)`; a zero breadth owns nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulseWindow {
    pub segment: Segment,
    pub start: f64,
    pub breadth: f64,
    pub height: f64,
}

impl PulseWindow {
    pub fn contains(&self, t: f64) -> bool {
        self.breadth > 0.0 && t >= self.start && t < self.start + self.breadth
    }

    pub fn amplitude(&self, t: f64) -> f64 {
        raised_cosine(t, self.height, self.breadth, self.start)
    }
}

/// Scaled layout of a single beat.
#[derive(Clone, Debug, PartialEq)]
pub struct BeatLayout {
    /// Total scaled duration in seconds; equals the heart period.
    pub duration: f64,
    /// Windows in evaluation order.
    pub windows: Vec<PulseWindow>,
}

impl BeatLayout {
    pub fn new(params: &WaveSegmentParams, r_count: u32, p_count: u32, period: f64) -> Self {
        let r_count = r_count.max(1);
        let p_count = p_count.max(1);
        let nominal = f64::from(p_count) * (params.b_p + params.l_pq)
            + (params.b_q + params.b_r + params.b_s) * f64::from(r_count)
            + params.l_st
            + params.b_t
            + params.l_tp;
        if !nominal.is_finite() || nominal <= 0.0 {
            // Nothing has any length: a flat beat still has to fill the period.
            return Self {
                duration: period,
                windows: Vec::new(),
            };
        }

        let sf = period / nominal;
        let mut windows = Vec::with_capacity(p_count as usize + 3 * r_count as usize + 1);
        let mut t = 0.0;
        let mut push = |segment: Segment, t: &mut f64, height: f64, breadth: f64| {
            let breadth = breadth * sf;
            windows.push(PulseWindow {
                segment,
                start: *t,
                breadth,
                height,
            });
            *t += breadth;
        };

        for _ in 0..p_count {
            push(Segment::P, &mut t, params.h_p, params.b_p);
            t += params.l_pq * sf;
        }
        for _ in 0..r_count {
            push(Segment::Q, &mut t, params.h_q, params.b_q);
            push(Segment::R, &mut t, params.h_r, params.b_r);
            push(Segment::S, &mut t, params.h_s, params.b_s);
        }
        t += params.l_st * sf;
        push(Segment::T, &mut t, params.h_t, params.b_t);
        t += params.l_tp * sf;

        Self {
            duration: t,
            windows,
        }
    }

    /// Amplitude in mV at local time `t`: the first window that owns `t` wins.
    pub fn amplitude_at(&self, t: f64) -> f64 {
        self.windows
            .iter()
            .find(|w| w.contains(t))
            .map(|w| w.amplitude(t))
            .unwrap_or(0.0)
    }

    pub fn window_count(&self, segment: Segment) -> usize {
        self.windows.iter().filter(|w| w.segment == segment).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveSample {
    /// Seconds since the start of the sweep.
    pub time: f64,
    pub amplitude_mv: f64,
}

/// Turns a parameter snapshot plus the scheduler's decisions into samples.
#[derive(Clone, Copy, Debug)]
pub struct WaveformSynthesizer {
    sample_interval: f64,
}

impl WaveformSynthesizer {
    pub fn new(model: &ParameterModel) -> Self {
        Self {
            sample_interval: model.scale.sample_interval_secs(),
        }
    }

    #[cfg(test)]
    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    /// Layout of one beat with the scheduler's overrides applied.
    pub fn layout(&self, model: &ParameterModel, overrides: &BeatOverrides) -> BeatLayout {
        let current = match &overrides.params {
            Some(params) => model.segments.merged(params),
            None => model.segments,
        };
        BeatLayout::new(
            &current,
            overrides.r_count,
            overrides.p_count,
            model.heart_rate.period_secs(),
        )
    }

    /// Samples covering at least `duration_secs`, one beat per scheduler step.
    /// The last beat is always completed, so the output may run past the end.
    pub fn generate(
        &self,
        model: &ParameterModel,
        scheduler: &mut BeatScheduler,
        duration_secs: f64,
    ) -> Vec<WaveSample> {
        let mut samples = Vec::new();
        let mut elapsed = 0.0;
        let mut beats = 0usize;
        let mut custom = 0usize;
        let mut complexes = 0usize;
        while elapsed < duration_secs {
            let overrides = scheduler.advance();
            let layout = self.layout(model, &overrides);
            self.sample_beat(&layout, elapsed, &mut samples);
            elapsed += layout.duration;
            beats += 1;
            custom += usize::from(overrides.is_custom());
            complexes += layout.window_count(Segment::R);
        }
        debug!(
            "synthesized {} beats ({} custom, {} QRS complexes, {} samples) for {:.3}s",
            beats,
            custom,
            complexes,
            samples.len(),
            duration_secs
        );
        samples
    }

    /// One undecorated beat of `model`, starting at time 0.
    pub fn preview_beat(&self, model: &ParameterModel) -> Vec<WaveSample> {
        let overrides = BeatOverrides::plain(model.segments.nominal_p_count());
        let layout = self.layout(model, &overrides);
        let mut samples = Vec::new();
        self.sample_beat(&layout, 0.0, &mut samples);
        samples
    }

    fn sample_beat(&self, layout: &BeatLayout, offset: f64, out: &mut Vec<WaveSample>) {
        let mut k = 0u32;
        loop {
            let local = f64::from(k) * self.sample_interval;
            if local >= layout.duration {
                break;
            }
            out.push(WaveSample {
                time: offset + local,
                amplitude_mv: layout.amplitude_at(local),
            });
            k += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::monitor::params::{PatternRule, SegmentOverrides};

    const EPS: f64 = 1e-9;

    fn model_for(config: &MonitorConfig) -> ParameterModel {
        ParameterModel::commit(config).unwrap()
    }

    #[test]
    fn pulse_is_zero_at_edges_and_peaks_at_midpoint() {
        for &(h, b, t0) in &[(1.2, 0.05, 0.3), (-0.25, 0.025, 1.0), (0.2, 0.16, 0.0)] {
            assert_eq!(raised_cosine(t0, h, b, t0), 0.0);
            assert!(raised_cosine(t0 + b, h, b, t0).abs() < EPS);
            assert!((raised_cosine(t0 + b / 2.0, h, b, t0) - h).abs() < EPS);
            assert_eq!(raised_cosine(t0 - 1e-6, h, b, t0), 0.0);
            assert_eq!(raised_cosine(t0 + b + 1e-6, h, b, t0), 0.0);
        }
    }

    #[test]
    fn zero_breadth_contributes_nothing() {
        assert_eq!(raised_cosine(0.0, 1.0, 0.0, 0.0), 0.0);
        let window = PulseWindow {
            segment: Segment::R,
            start: 0.1,
            breadth: 0.0,
            height: 1.0,
        };
        assert!(!window.contains(0.1));
    }

    #[test]
    fn every_beat_lasts_one_period_whatever_the_counts() {
        let params = WaveSegmentParams::default();
        for &bpm in &[1.0, 45.0, 70.0, 180.0] {
            let period = 60.0 / bpm;
            for r in 1..=4 {
                for p in 1..=4 {
                    let layout = BeatLayout::new(&params, r, p, period);
                    assert!(
                        (layout.duration - period).abs() < 1e-9,
                        "bpm {bpm} r {r} p {p}: {}",
                        layout.duration
                    );
                    assert_eq!(layout.window_count(Segment::P), p as usize);
                    assert_eq!(layout.window_count(Segment::R), r as usize);
                    assert_eq!(layout.window_count(Segment::T), 1);
                }
            }
        }
    }

    #[test]
    fn layout_with_all_durations_zero_is_flat() {
        let mut params = WaveSegmentParams::default();
        for field in crate::monitor::params::SegmentField::ALL {
            if field.is_duration() {
                *params.get_mut(field) = 0.0;
            }
        }
        let layout = BeatLayout::new(&params, 1, 1, 0.8);
        assert_eq!(layout.duration, 0.8);
        assert!(layout.windows.is_empty());
        assert_eq!(layout.amplitude_at(0.4), 0.0);
    }

    #[test]
    fn windows_are_contiguous_and_first_match_wins() {
        let layout = BeatLayout::new(&WaveSegmentParams::default(), 1, 1, 1.0);
        let q = layout.windows[1];
        let r = layout.windows[2];
        assert_eq!(q.segment, Segment::Q);
        assert_eq!(r.segment, Segment::R);
        assert!((q.start + q.breadth - r.start).abs() < EPS);
        // The shared edge belongs to R, whose pulse is 0 there.
        assert!(!q.contains(r.start));
        assert!(r.contains(r.start));
        assert_eq!(layout.amplitude_at(r.start), 0.0);
        let mid_r = r.start + r.breadth / 2.0;
        assert!((layout.amplitude_at(mid_r) - r.height).abs() < EPS);
        // Gaps between pulses are flat.
        let t_gap = layout.windows[0].breadth + 1e-4;
        assert_eq!(layout.amplitude_at(t_gap), 0.0);
    }

    #[test]
    fn generate_covers_the_requested_duration() {
        let model = model_for(&MonitorConfig::default());
        let synth = WaveformSynthesizer::new(&model);
        let mut scheduler = BeatScheduler::new(&model);
        let duration = 1000.0 / 150.0;
        let samples = synth.generate(&model, &mut scheduler, duration);
        let period = model.heart_rate.period_secs();
        let expected_beats = (duration / period).ceil() as u64;
        assert_eq!(scheduler.beats_consumed(), expected_beats);
        let last = samples.last().unwrap();
        assert!(last.time >= duration - period);
        assert!(samples.windows(2).all(|w| w[1].time > w[0].time));
        assert!(samples.iter().any(|s| s.amplitude_mv > 1.0));
    }

    #[test]
    fn beats_repeat_when_patterns_are_disabled() {
        let model = model_for(&MonitorConfig::default());
        let synth = WaveformSynthesizer::new(&model);
        let mut scheduler = BeatScheduler::new(&model);
        let samples = synth.generate(&model, &mut scheduler, 5.0);
        let per_beat = synth.preview_beat(&model);
        let n = per_beat.len();
        let beats = samples.len() / n;
        assert!(beats >= 5);
        for beat in 0..beats {
            let chunk = &samples[beat * n..(beat + 1) * n];
            for (a, b) in chunk.iter().zip(&per_beat) {
                assert_eq!(a.amplitude_mv, b.amplitude_mv);
            }
        }
    }

    #[test]
    fn heart_rate_below_one_is_clamped() {
        let mut config = MonitorConfig::default();
        config.heart_rate_bpm = 0.0;
        let model = model_for(&config);
        let synth = WaveformSynthesizer::new(&model);
        let mut scheduler = BeatScheduler::new(&model);
        let samples = synth.generate(&model, &mut scheduler, 2.0);
        // One 60 s beat.
        assert_eq!(scheduler.beats_consumed(), 1);
        assert!((samples.len() as i64 - 60 * 150).abs() <= 1);
    }

    #[test]
    fn pattern_beats_keep_the_period() {
        let mut config = MonitorConfig::default();
        config.r_wave = PatternRule {
            enabled: true,
            override_count: 3,
            every_n_beats: 2,
        };
        config.p_wave = PatternRule {
            enabled: true,
            override_count: 2,
            every_n_beats: 3,
        };
        config.custom_beats_enabled = true;
        config.repeat_interval = 1;
        config.custom_beats = vec![SegmentOverrides {
            b_r: Some(0.12),
            l_tp: Some(0.5),
            ..Default::default()
        }];
        let model = model_for(&config);
        let synth = WaveformSynthesizer::new(&model);
        let mut scheduler = BeatScheduler::new(&model);
        let period = model.heart_rate.period_secs();
        for _ in 0..12 {
            let overrides = scheduler.advance();
            let layout = synth.layout(&model, &overrides);
            assert!((layout.duration - period).abs() < 1e-9);
            assert_eq!(layout.window_count(Segment::R), overrides.r_count as usize);
            assert_eq!(layout.window_count(Segment::P), overrides.p_count as usize);
        }
    }

    #[test]
    fn preview_is_one_plain_beat() {
        let mut config = MonitorConfig::default();
        config.r_wave = PatternRule {
            enabled: true,
            override_count: 3,
            every_n_beats: 1,
        };
        let model = model_for(&config);
        let synth = WaveformSynthesizer::new(&model);
        let preview = synth.preview_beat(&model);
        let period = model.heart_rate.period_secs();
        assert_eq!(preview[0].time, 0.0);
        assert!(preview.last().unwrap().time < period);
        assert!(preview.len() as f64 >= period / synth.sample_interval() - 1.0);
        // Patterns do not apply: the peak is the single nominal R wave.
        let peak = preview.iter().map(|s| s.amplitude_mv).fold(f64::MIN, f64::max);
        assert!(peak <= config.segments.h_r + EPS);
        assert!(peak > 1.0);
    }

    #[test]
    fn scheduler_state_carries_across_generations() {
        let mut config = MonitorConfig::default();
        config.r_wave = PatternRule {
            enabled: true,
            override_count: 2,
            every_n_beats: 5,
        };
        let model = model_for(&config);
        let synth = WaveformSynthesizer::new(&model);
        let mut scheduler = BeatScheduler::new(&model);
        synth.generate(&model, &mut scheduler, 3.0);
        let first = scheduler.beats_consumed();
        synth.generate(&model, &mut scheduler, 3.0);
        assert!(scheduler.beats_consumed() > first);
    }
}
