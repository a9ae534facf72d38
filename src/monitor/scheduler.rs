use log::trace;

use crate::monitor::params::{BeatPatternConfig, ParameterModel, PatternRule, SegmentOverrides};

/// What the scheduler decided for one beat.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeatOverrides {
    /// Custom-beat parameters to merge onto the base shape, if this beat is a custom one.
    pub params: Option<SegmentOverrides>,
    /// Position of the applied custom beat in the sequence.
    pub custom_index: Option<usize>,
    pub r_count: u32,
    pub p_count: u32,
}

impl BeatOverrides {
    /// A beat with no custom parameters and the given nominal P count.
    pub fn plain(p_count: u32) -> Self {
        Self {
            params: None,
            custom_index: None,
            r_count: 1,
            p_count: p_count.max(1),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.custom_index.is_some()
    }
}

/// Beat-by-beat counters for the R/P patterns and the custom-beat sequence.
///
/// Counters only move forward while beats are consumed. They survive sweep
/// regeneration and are cleared only by [`BeatScheduler::reset`], which the
/// renderer calls when a new parameter snapshot is applied.
#[derive(Clone, Debug)]
pub struct BeatScheduler {
    patterns: BeatPatternConfig,
    nominal_p: Option<u32>,
    r_counter: u32,
    p_counter: u32,
    normal_beats: u32,
    next_custom: usize,
    beats_consumed: u64,
}

impl BeatScheduler {
    pub fn new(model: &ParameterModel) -> Self {
        Self {
            patterns: model.patterns.clone(),
            nominal_p: model.segments.n_p,
            r_counter: 0,
            p_counter: 0,
            normal_beats: 0,
            next_custom: 0,
            beats_consumed: 0,
        }
    }

    pub fn reset(&mut self) {
        self.r_counter = 0;
        self.p_counter = 0;
        self.normal_beats = 0;
        self.next_custom = 0;
        self.beats_consumed = 0;
    }

    pub fn beats_consumed(&self) -> u64 {
        self.beats_consumed
    }

    /// Decide the overrides for the next beat and move every counter forward.
    pub fn advance(&mut self) -> BeatOverrides {
        self.beats_consumed += 1;

        let mut params = None;
        let mut custom_index = None;
        let custom = &self.patterns.custom;
        if custom.is_active() {
            if self.normal_beats >= custom.repeat_interval {
                // Guard against a sequence shorter than the stored index.
                let index = self.next_custom % custom.beats.len();
                params = Some(custom.beats[index]);
                custom_index = Some(index);
                self.next_custom = (index + 1) % custom.beats.len();
                self.normal_beats = 0;
            } else {
                self.normal_beats += 1;
            }
        }

        let r_count = step_rule(&self.patterns.r_wave, &mut self.r_counter, 1);

        let nominal_p = params
            .and_then(|p: SegmentOverrides| p.n_p)
            .or(self.nominal_p)
            .filter(|&n| n > 0)
            .unwrap_or(1);
        let p_count = step_rule(&self.patterns.p_wave, &mut self.p_counter, nominal_p);

        trace!(
            "beat {}: custom={:?} r_count={} p_count={}",
            self.beats_consumed,
            custom_index,
            r_count,
            p_count
        );

        BeatOverrides {
            params,
            custom_index,
            r_count,
            p_count,
        }
    }
}

fn step_rule(rule: &PatternRule, counter: &mut u32, default: u32) -> u32 {
    if !rule.is_active() {
        return default;
    }
    *counter += 1;
    if *counter >= rule.every_n_beats {
        *counter = 0;
        rule.override_count.max(1)
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    fn scheduler_for(config: &MonitorConfig) -> BeatScheduler {
        BeatScheduler::new(&ParameterModel::commit(config).unwrap())
    }

    #[test]
    fn disabled_patterns_emit_defaults() {
        let mut scheduler = scheduler_for(&MonitorConfig::default());
        for _ in 0..20 {
            assert_eq!(scheduler.advance(), BeatOverrides::plain(1));
        }
        assert_eq!(scheduler.beats_consumed(), 20);
    }

    #[test]
    fn r_pattern_hits_every_fifth_beat() {
        let mut config = MonitorConfig::default();
        config.r_wave = PatternRule {
            enabled: true,
            override_count: 2,
            every_n_beats: 5,
        };
        let mut scheduler = scheduler_for(&config);
        for beat in 1..=30u32 {
            let expected = if beat % 5 == 0 { 2 } else { 1 };
            assert_eq!(scheduler.advance().r_count, expected, "beat {beat}");
        }
    }

    #[test]
    fn zero_interval_disables_a_rule() {
        let mut config = MonitorConfig::default();
        config.r_wave = PatternRule {
            enabled: true,
            override_count: 3,
            every_n_beats: 0,
        };
        let mut scheduler = scheduler_for(&config);
        assert!((0..10).all(|_| scheduler.advance().r_count == 1));
    }

    #[test]
    fn p_pattern_defaults_to_nominal_count() {
        let mut config = MonitorConfig::default();
        config.segments.n_p = Some(2);
        config.p_wave = PatternRule {
            enabled: true,
            override_count: 4,
            every_n_beats: 3,
        };
        let mut scheduler = scheduler_for(&config);
        let counts: Vec<u32> = (0..6).map(|_| scheduler.advance().p_count).collect();
        assert_eq!(counts, vec![2, 2, 4, 2, 2, 4]);
    }

    #[test]
    fn unset_nominal_p_count_means_one() {
        let mut config = MonitorConfig::default();
        config.segments.n_p = None;
        let mut scheduler = scheduler_for(&config);
        assert_eq!(scheduler.advance().p_count, 1);
    }

    #[test]
    fn custom_beats_follow_repeat_interval() {
        let mut config = MonitorConfig::default();
        config.custom_beats_enabled = true;
        config.repeat_interval = 3;
        config.custom_beats = vec![
            SegmentOverrides {
                h_r: Some(2.0),
                ..Default::default()
            },
            SegmentOverrides {
                h_r: Some(3.0),
                ..Default::default()
            },
        ];
        let mut scheduler = scheduler_for(&config);
        let roles: Vec<Option<usize>> = (0..12).map(|_| scheduler.advance().custom_index).collect();
        assert_eq!(
            roles,
            vec![
                None,
                None,
                None,
                Some(0),
                None,
                None,
                None,
                Some(1),
                None,
                None,
                None,
                Some(0)
            ]
        );
    }

    #[test]
    fn custom_beat_carries_its_parameters() {
        let mut config = MonitorConfig::default();
        config.custom_beats_enabled = true;
        config.repeat_interval = 0;
        config.custom_beats = vec![SegmentOverrides {
            b_t: Some(0.2),
            n_p: Some(3),
            ..Default::default()
        }];
        let mut scheduler = scheduler_for(&config);
        let beat = scheduler.advance();
        assert!(beat.is_custom());
        assert_eq!(beat.params.and_then(|p| p.b_t), Some(0.2));
        // The custom beat's nominal P count wins over the base one.
        assert_eq!(beat.p_count, 3);
        // Interval 0: every beat is a custom beat.
        assert!(scheduler.advance().is_custom());
    }

    #[test]
    fn enabled_but_empty_sequence_is_a_no_op() {
        let mut config = MonitorConfig::default();
        config.custom_beats_enabled = true;
        config.repeat_interval = 0;
        let mut scheduler = scheduler_for(&config);
        for _ in 0..5 {
            let beat = scheduler.advance();
            assert!(!beat.is_custom());
            assert!(beat.params.is_none());
        }
    }

    #[test]
    fn reset_restarts_every_counter() {
        let mut config = MonitorConfig::default();
        config.r_wave = PatternRule {
            enabled: true,
            override_count: 2,
            every_n_beats: 3,
        };
        let mut scheduler = scheduler_for(&config);
        scheduler.advance();
        scheduler.advance();
        scheduler.reset();
        assert_eq!(scheduler.beats_consumed(), 0);
        assert_eq!(scheduler.advance().r_count, 1);
        assert_eq!(scheduler.advance().r_count, 1);
        assert_eq!(scheduler.advance().r_count, 2);
    }
}
