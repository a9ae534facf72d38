use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, MonitorConfig};

/// Sweep speed of the trace. Fixed, like the paper speed of a real monitor.
pub const SWEEP_PIXELS_PER_SECOND: f64 = 150.0;

/// Named numeric fields of [`WaveSegmentParams`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentField {
    HeightP,
    BreadthP,
    HeightQ,
    BreadthQ,
    HeightR,
    BreadthR,
    HeightS,
    BreadthS,
    HeightT,
    BreadthT,
    LengthPq,
    LengthSt,
    LengthTp,
}

impl SegmentField {
    pub const ALL: [SegmentField; 13] = [
        SegmentField::HeightP,
        SegmentField::BreadthP,
        SegmentField::HeightQ,
        SegmentField::BreadthQ,
        SegmentField::HeightR,
        SegmentField::BreadthR,
        SegmentField::HeightS,
        SegmentField::BreadthS,
        SegmentField::HeightT,
        SegmentField::BreadthT,
        SegmentField::LengthPq,
        SegmentField::LengthSt,
        SegmentField::LengthTp,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SegmentField::HeightP => "h_p",
            SegmentField::BreadthP => "b_p",
            SegmentField::HeightQ => "h_q",
            SegmentField::BreadthQ => "b_q",
            SegmentField::HeightR => "h_r",
            SegmentField::BreadthR => "b_r",
            SegmentField::HeightS => "h_s",
            SegmentField::BreadthS => "b_s",
            SegmentField::HeightT => "h_t",
            SegmentField::BreadthT => "b_t",
            SegmentField::LengthPq => "l_pq",
            SegmentField::LengthSt => "l_st",
            SegmentField::LengthTp => "l_tp",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SegmentField::HeightP => "P Wave Height",
            SegmentField::BreadthP => "P Wave Breadth",
            SegmentField::HeightQ => "Q Wave Height",
            SegmentField::BreadthQ => "Q Wave Breadth",
            SegmentField::HeightR => "R Wave Height",
            SegmentField::BreadthR => "R Wave Breadth",
            SegmentField::HeightS => "S Wave Height",
            SegmentField::BreadthS => "S Wave Breadth",
            SegmentField::HeightT => "T Wave Height",
            SegmentField::BreadthT => "T Wave Breadth",
            SegmentField::LengthPq => "PQ Segment Length",
            SegmentField::LengthSt => "ST Segment Length",
            SegmentField::LengthTp => "TP Segment Length",
        }
    }

    /// Editing step used by the parameter form.
    pub fn step(self) -> f64 {
        match self {
            SegmentField::BreadthQ | SegmentField::BreadthS => 0.005,
            SegmentField::HeightR => 0.1,
            _ => 0.01,
        }
    }

    /// Durations are in seconds and get stretched to fit the beat period;
    /// heights are in millivolts and may be negative.
    pub fn is_duration(self) -> bool {
        !matches!(
            self,
            SegmentField::HeightP
                | SegmentField::HeightQ
                | SegmentField::HeightR
                | SegmentField::HeightS
                | SegmentField::HeightT
        )
    }
}

/// Shape of one beat: height (mV) and breadth (s) per segment plus the gaps
/// between them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveSegmentParams {
    pub h_p: f64,
    pub b_p: f64,
    pub h_q: f64,
    pub b_q: f64,
    pub h_r: f64,
    pub b_r: f64,
    pub h_s: f64,
    pub b_s: f64,
    pub h_t: f64,
    pub b_t: f64,
    pub l_pq: f64,
    pub l_st: f64,
    pub l_tp: f64,
    /// Nominal number of P pulses per beat. Unset or 0 means one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_p: Option<u32>,
}

impl Default for WaveSegmentParams {
    fn default() -> Self {
        Self {
            h_p: 0.15,
            b_p: 0.08,
            h_q: -0.1,
            b_q: 0.025,
            h_r: 1.2,
            b_r: 0.05,
            h_s: -0.25,
            b_s: 0.025,
            h_t: 0.2,
            b_t: 0.16,
            l_pq: 0.08,
            l_st: 0.12,
            l_tp: 0.3,
            n_p: Some(1),
        }
    }
}

impl WaveSegmentParams {
    pub fn get(&self, field: SegmentField) -> f64 {
        match field {
            SegmentField::HeightP => self.h_p,
            SegmentField::BreadthP => self.b_p,
            SegmentField::HeightQ => self.h_q,
            SegmentField::BreadthQ => self.b_q,
            SegmentField::HeightR => self.h_r,
            SegmentField::BreadthR => self.b_r,
            SegmentField::HeightS => self.h_s,
            SegmentField::BreadthS => self.b_s,
            SegmentField::HeightT => self.h_t,
            SegmentField::BreadthT => self.b_t,
            SegmentField::LengthPq => self.l_pq,
            SegmentField::LengthSt => self.l_st,
            SegmentField::LengthTp => self.l_tp,
        }
    }

    pub fn get_mut(&mut self, field: SegmentField) -> &mut f64 {
        match field {
            SegmentField::HeightP => &mut self.h_p,
            SegmentField::BreadthP => &mut self.b_p,
            SegmentField::HeightQ => &mut self.h_q,
            SegmentField::BreadthQ => &mut self.b_q,
            SegmentField::HeightR => &mut self.h_r,
            SegmentField::BreadthR => &mut self.b_r,
            SegmentField::HeightS => &mut self.h_s,
            SegmentField::BreadthS => &mut self.b_s,
            SegmentField::HeightT => &mut self.h_t,
            SegmentField::BreadthT => &mut self.b_t,
            SegmentField::LengthPq => &mut self.l_pq,
            SegmentField::LengthSt => &mut self.l_st,
            SegmentField::LengthTp => &mut self.l_tp,
        }
    }

    pub fn nominal_p_count(&self) -> u32 {
        self.n_p.filter(|&n| n > 0).unwrap_or(1)
    }

    /// Copy of `self` with every field present in `overrides` replaced.
    pub fn merged(&self, overrides: &SegmentOverrides) -> Self {
        let mut out = *self;
        for field in SegmentField::ALL {
            if let Some(value) = overrides.get(field) {
                *out.get_mut(field) = value;
            }
        }
        if overrides.n_p.is_some() {
            out.n_p = overrides.n_p;
        }
        out
    }
}

/// Partial [`WaveSegmentParams`]; used for custom beats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_q: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_q: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_t: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_t: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_pq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_st: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_tp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_p: Option<u32>,
}

impl SegmentOverrides {
    pub fn get(&self, field: SegmentField) -> Option<f64> {
        *self.slot(field)
    }

    pub fn get_mut(&mut self, field: SegmentField) -> &mut Option<f64> {
        match field {
            SegmentField::HeightP => &mut self.h_p,
            SegmentField::BreadthP => &mut self.b_p,
            SegmentField::HeightQ => &mut self.h_q,
            SegmentField::BreadthQ => &mut self.b_q,
            SegmentField::HeightR => &mut self.h_r,
            SegmentField::BreadthR => &mut self.b_r,
            SegmentField::HeightS => &mut self.h_s,
            SegmentField::BreadthS => &mut self.b_s,
            SegmentField::HeightT => &mut self.h_t,
            SegmentField::BreadthT => &mut self.b_t,
            SegmentField::LengthPq => &mut self.l_pq,
            SegmentField::LengthSt => &mut self.l_st,
            SegmentField::LengthTp => &mut self.l_tp,
        }
    }

    fn slot(&self, field: SegmentField) -> &Option<f64> {
        match field {
            SegmentField::HeightP => &self.h_p,
            SegmentField::BreadthP => &self.b_p,
            SegmentField::HeightQ => &self.h_q,
            SegmentField::BreadthQ => &self.b_q,
            SegmentField::HeightR => &self.h_r,
            SegmentField::BreadthR => &self.b_r,
            SegmentField::HeightS => &self.h_s,
            SegmentField::BreadthS => &self.b_s,
            SegmentField::HeightT => &self.h_t,
            SegmentField::BreadthT => &self.b_t,
            SegmentField::LengthPq => &self.l_pq,
            SegmentField::LengthSt => &self.l_st,
            SegmentField::LengthTp => &self.l_tp,
        }
    }
}

impl From<WaveSegmentParams> for SegmentOverrides {
    fn from(params: WaveSegmentParams) -> Self {
        let mut out = SegmentOverrides {
            n_p: params.n_p,
            ..Default::default()
        };
        for field in SegmentField::ALL {
            *out.get_mut(field) = Some(params.get(field));
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeartRate {
    bpm: f64,
}

impl HeartRate {
    pub fn new(bpm: f64) -> Self {
        Self { bpm }
    }

    /// Rate actually used for timing: at least 1 bpm, 1 bpm for non-finite input.
    pub fn effective_bpm(&self) -> f64 {
        if self.bpm.is_finite() {
            self.bpm.max(1.0)
        } else {
            1.0
        }
    }

    pub fn period_secs(&self) -> f64 {
        60.0 / self.effective_bpm()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderScale {
    pub pixels_per_mv: f64,
}

impl RenderScale {
    /// One sample per horizontal pixel.
    pub fn sample_interval_secs(&self) -> f64 {
        1.0 / SWEEP_PIXELS_PER_SECOND
    }
}

/// Every `every_n_beats`-th beat uses `override_count` pulses instead of the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRule {
    pub enabled: bool,
    pub override_count: u32,
    pub every_n_beats: u32,
}

impl PatternRule {
    pub fn r_wave_default() -> Self {
        Self {
            enabled: false,
            override_count: 2,
            every_n_beats: 5,
        }
    }

    pub fn p_wave_default() -> Self {
        Self {
            enabled: false,
            override_count: 1,
            every_n_beats: 3,
        }
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.every_n_beats > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomBeatSequence {
    pub enabled: bool,
    pub beats: Vec<SegmentOverrides>,
    /// Normal beats between two custom insertions.
    pub repeat_interval: u32,
}

impl CustomBeatSequence {
    /// Enabled with an empty list behaves as disabled.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.beats.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BeatPatternConfig {
    pub r_wave: PatternRule,
    pub p_wave: PatternRule,
    pub custom: CustomBeatSequence,
}

/// Immutable snapshot the synthesizer and renderer work from. Only built by
/// [`ParameterModel::commit`], so every snapshot has passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterModel {
    pub segments: WaveSegmentParams,
    pub heart_rate: HeartRate,
    pub scale: RenderScale,
    pub patterns: BeatPatternConfig,
}

impl ParameterModel {
    pub fn commit(config: &MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            segments: config.segments,
            heart_rate: HeartRate::new(config.heart_rate_bpm),
            scale: RenderScale {
                pixels_per_mv: config.pixels_per_mv,
            },
            patterns: BeatPatternConfig {
                r_wave: config.r_wave,
                p_wave: config.p_wave,
                custom: CustomBeatSequence {
                    enabled: config.custom_beats_enabled,
                    beats: config.custom_beats.clone(),
                    repeat_interval: config.repeat_interval,
                },
            },
        })
    }
}
