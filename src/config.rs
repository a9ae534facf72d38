use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitor::params::{PatternRule, SegmentField, SegmentOverrides, WaveSegmentParams};

/// Highest heart rate accepted at the configuration boundary. Lower values,
/// including zero and negative ones, are clamped by the synthesizer instead.
pub const MAX_HEART_RATE_BPM: f64 = 600.0;
/// Largest pulse count (QRS complexes or P waves) one beat may carry.
pub const MAX_PULSE_COUNT: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("heart rate must not exceed 600 bpm, got {0}")]
    HeartRateTooHigh(f64),
    #[error("pixels per mV must be positive, got {0}")]
    InvalidScale(f64),
    #[error("{wave} wave pattern override count must be at least 1")]
    ZeroOverrideCount { wave: &'static str },
    #[error("nominal P-pulse count (n_p) must be at least 1")]
    ZeroNominalPCount,
    #[error("{field} must not exceed 10 pulses per beat, got {count}")]
    PulseCountTooHigh { field: &'static str, count: u32 },
    #[error("custom beat #{index}: {source}")]
    CustomBeat {
        index: usize,
        #[source]
        source: Box<ConfigError>,
    },
}

/// Everything the user can edit. Only read from disk, never written back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorConfig {
    pub heart_rate_bpm: f64,
    pub pixels_per_mv: f64,
    pub segments: WaveSegmentParams,
    pub r_wave: PatternRule,
    pub p_wave: PatternRule,
    pub custom_beats_enabled: bool,
    pub custom_beats: Vec<SegmentOverrides>,
    pub repeat_interval: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heart_rate_bpm: 70.0,
            pixels_per_mv: 100.0,
            segments: WaveSegmentParams::default(),
            r_wave: PatternRule::r_wave_default(),
            p_wave: PatternRule::p_wave_default(),
            custom_beats_enabled: false,
            custom_beats: Vec::new(),
            repeat_interval: 10,
        }
    }
}

impl MonitorConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heart_rate_bpm.is_finite() && self.heart_rate_bpm > MAX_HEART_RATE_BPM {
            return Err(ConfigError::HeartRateTooHigh(self.heart_rate_bpm));
        }
        if !self.pixels_per_mv.is_finite() || self.pixels_per_mv <= 0.0 {
            return Err(ConfigError::InvalidScale(self.pixels_per_mv));
        }
        for field in SegmentField::ALL {
            check_field(field, self.segments.get(field))?;
        }
        check_nominal_p(self.segments.n_p)?;
        check_rule("R", &self.r_wave)?;
        check_rule("P", &self.p_wave)?;
        for (index, beat) in self.custom_beats.iter().enumerate() {
            check_overrides(beat).map_err(|source| ConfigError::CustomBeat {
                index,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}

fn check_field(field: SegmentField, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite {
            field: field.key(),
            value,
        });
    }
    if field.is_duration() && value < 0.0 {
        return Err(ConfigError::Negative {
            field: field.key(),
            value,
        });
    }
    Ok(())
}

fn check_rule(wave: &'static str, rule: &PatternRule) -> Result<(), ConfigError> {
    if !rule.enabled {
        return Ok(());
    }
    if rule.override_count == 0 {
        return Err(ConfigError::ZeroOverrideCount { wave });
    }
    if rule.override_count > MAX_PULSE_COUNT {
        return Err(ConfigError::PulseCountTooHigh {
            field: if wave == "R" {
                "rWave.overrideCount"
            } else {
                "pWave.overrideCount"
            },
            count: rule.override_count,
        });
    }
    Ok(())
}

fn check_overrides(overrides: &SegmentOverrides) -> Result<(), ConfigError> {
    for field in SegmentField::ALL {
        if let Some(value) = overrides.get(field) {
            check_field(field, value)?;
        }
    }
    check_nominal_p(overrides.n_p)
}

fn check_nominal_p(n_p: Option<u32>) -> Result<(), ConfigError> {
    match n_p {
        Some(0) => Err(ConfigError::ZeroNominalPCount),
        Some(count) if count > MAX_PULSE_COUNT => Err(ConfigError::PulseCountTooHigh {
            field: "n_p",
            count,
        }),
        _ => Ok(()),
    }
}
