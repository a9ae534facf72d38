use log::{debug, info};

use crate::monitor::error::MonitorError;
use crate::monitor::params::{ParameterModel, SWEEP_PIXELS_PER_SECOND};
use crate::monitor::scheduler::BeatScheduler;
use crate::monitor::synth::{WaveSample, WaveformSynthesizer};
use crate::types::{DisplayGeometry, Point, Scene, SweepPhase, ERASE_WIDTH, GRID_PITCH, POINTER_RADIUS};

/// Turns measured frame timestamps into elapsed seconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    /// Seconds since the previous frame. The first frame after a reset is 0;
    /// timestamps that run backwards also give 0.
    pub fn delta(&mut self, timestamp_secs: f64) -> f64 {
        if !timestamp_secs.is_finite() {
            return 0.0;
        }
        let dt = match self.last {
            Some(prev) => (timestamp_secs - prev).max(0.0),
            None => 0.0,
        };
        self.last = Some(timestamp_secs);
        dt
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Permission to run one tick, tied to the renderer configuration that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameToken {
    generation: u64,
}

impl FrameToken {
    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub phase: SweepPhase,
    pub pointer_position: f64,
    /// The pointer went past the right edge and restarted at 0 during this tick.
    pub wrapped: bool,
    pub entered_steady_state: bool,
}

/// Pointer, buffers and phase of the sweeping trace.
#[derive(Clone, Debug)]
pub struct SweepState {
    pub pointer_position: f64,
    pub generated: Vec<Point>,
    /// Same length as `generated`; `None` slots are not drawn.
    pub revealed: Vec<Option<Point>>,
    pub phase: SweepPhase,
    pub marker: Option<Point>,
}

impl SweepState {
    fn fresh(generated: Vec<Point>) -> Self {
        Self {
            pointer_position: 0.0,
            revealed: vec![None; generated.len()],
            marker: generated.first().copied(),
            generated,
            phase: SweepPhase::FirstSweep,
        }
    }

    /// Index of the first sample at or past `x`, or the last sample.
    pub fn locate(&self, x: f64) -> Option<usize> {
        if self.generated.is_empty() {
            return None;
        }
        let idx = self.generated.partition_point(|p| p.x < x);
        Some(idx.min(self.generated.len() - 1))
    }

    fn reveal_through(&mut self, idx: usize) {
        let end = (idx + 1).min(self.generated.len());
        for (slot, point) in self.revealed[..end].iter_mut().zip(&self.generated[..end]) {
            *slot = Some(*point);
        }
    }

    /// Copy generated samples with `from <= x <= to` into the revealed buffer.
    fn refresh(&mut self, from: f64, to: f64) {
        let start = self.generated.partition_point(|p| p.x < from);
        let end = self.generated.partition_point(|p| p.x <= to);
        if start >= end {
            return;
        }
        for i in start..end {
            self.revealed[i] = Some(self.generated[i]);
        }
    }

    fn replace_generated(&mut self, generated: Vec<Point>) {
        self.revealed.resize(generated.len(), None);
        self.generated = generated;
    }

    /// Consecutive revealed samples grouped into runs; an empty slot ends a run.
    pub fn polyline(&self) -> Vec<Vec<Point>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for slot in &self.revealed {
            match slot {
                Some(point) => current.push(*point),
                None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    #[cfg(test)]
    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|p| p.is_some()).count()
    }
}

/// Per-frame controller for the sweeping trace.
///
/// Owns every piece of mutable animation state. Frames are only accepted with
/// a [`FrameToken`] from the current configuration, so a frame scheduled before
/// an apply or a teardown can never touch the buffers that replaced it.
pub struct SweepRenderer {
    geometry: DisplayGeometry,
    model: ParameterModel,
    scheduler: BeatScheduler,
    synth: WaveformSynthesizer,
    state: SweepState,
    clock: FrameClock,
    generation: u64,
    torn_down: bool,
    sweeps: u64,
}

impl SweepRenderer {
    pub fn new(model: ParameterModel, geometry: DisplayGeometry) -> Self {
        let mut scheduler = BeatScheduler::new(&model);
        let synth = WaveformSynthesizer::new(&model);
        let generated = sweep_points(&synth, &model, &mut scheduler, &geometry);
        info!(
            "sweep renderer ready: {:.0}x{:.0}px, {} samples per sweep",
            geometry.width,
            geometry.height,
            generated.len()
        );
        Self {
            geometry,
            state: SweepState::fresh(generated),
            model,
            scheduler,
            synth,
            clock: FrameClock::default(),
            generation: 0,
            torn_down: false,
            sweeps: 0,
        }
    }

    /// Replace the parameter snapshot and restart from an empty display.
    /// Frames requested before this call become stale.
    pub fn apply(&mut self, model: ParameterModel) -> Result<(), MonitorError> {
        if self.torn_down {
            return Err(MonitorError::TornDown);
        }
        self.scheduler = BeatScheduler::new(&model);
        self.synth = WaveformSynthesizer::new(&model);
        self.model = model;
        self.reset();
        info!(
            "applied new parameters ({:.0} bpm), generation {}",
            self.model.heart_rate.effective_bpm(),
            self.generation
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.scheduler.reset();
        let generated = self.generate();
        self.state = SweepState::fresh(generated);
        self.clock.reset();
        self.generation += 1;
        self.sweeps = 0;
    }

    pub fn request_frame(&self) -> Result<FrameToken, MonitorError> {
        if self.torn_down {
            return Err(MonitorError::TornDown);
        }
        Ok(FrameToken {
            generation: self.generation,
        })
    }

    /// Tick with the elapsed time measured from a frame timestamp in seconds.
    pub fn on_frame(
        &mut self,
        token: FrameToken,
        timestamp_secs: f64,
    ) -> Result<TickReport, MonitorError> {
        self.check_token(token)?;
        let elapsed = self.clock.delta(timestamp_secs);
        Ok(self.advance(elapsed))
    }

    /// Tick with an already measured elapsed time.
    #[cfg(test)]
    pub fn tick(&mut self, token: FrameToken, elapsed_secs: f64) -> Result<TickReport, MonitorError> {
        self.check_token(token)?;
        Ok(self.advance(elapsed_secs))
    }

    /// Stop accepting frames for good.
    pub fn teardown(&mut self) {
        if !self.torn_down {
            debug!("sweep renderer torn down at generation {}", self.generation);
        }
        self.torn_down = true;
    }

    #[cfg(test)]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> SweepPhase {
        self.state.phase
    }

    pub fn state(&self) -> &SweepState {
        &self.state
    }

    pub fn model(&self) -> &ParameterModel {
        &self.model
    }

    /// Completed wraps since the last apply.
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    pub fn beats_consumed(&self) -> u64 {
        self.scheduler.beats_consumed()
    }

    pub fn scene(&self) -> Scene {
        Scene {
            geometry: self.geometry,
            grid_pitch: GRID_PITCH,
            trace: self.state.polyline(),
            pointer: self.state.marker,
            pointer_radius: POINTER_RADIUS,
        }
    }

    fn check_token(&self, token: FrameToken) -> Result<(), MonitorError> {
        if self.torn_down {
            return Err(MonitorError::TornDown);
        }
        if token.generation != self.generation {
            return Err(MonitorError::StaleFrame {
                requested: token.generation,
                current: self.generation,
            });
        }
        Ok(())
    }

    fn generate(&mut self) -> Vec<Point> {
        sweep_points(&self.synth, &self.model, &mut self.scheduler, &self.geometry)
    }

    fn advance(&mut self, elapsed_secs: f64) -> TickReport {
        let elapsed = if elapsed_secs.is_finite() {
            elapsed_secs.max(0.0)
        } else {
            0.0
        };
        let width = self.geometry.width;
        let half = ERASE_WIDTH / 2.0;
        let previous = self.state.pointer_position;
        self.state.pointer_position += SWEEP_PIXELS_PER_SECOND * elapsed;

        let mut entered_steady_state = false;
        if self.state.phase == SweepPhase::FirstSweep {
            if let Some(idx) = self.state.locate(self.state.pointer_position) {
                self.state.reveal_through(idx);
            }
            if self.state.pointer_position > width {
                self.state.phase = SweepPhase::SteadyState;
                entered_steady_state = true;
                debug!("first sweep complete, entering steady state");
            }
        }

        let mut wrapped = false;
        if self.state.phase == SweepPhase::SteadyState {
            if self.state.pointer_position > width {
                // Finish the old sweep before its samples are replaced.
                self.state.refresh(previous - half, f64::INFINITY);
                self.state.pointer_position = 0.0;
                let generated = self.generate();
                self.state.replace_generated(generated);
                self.sweeps += 1;
                wrapped = true;
                debug!(
                    "sweep {} wrapped, {} beats consumed",
                    self.sweeps,
                    self.scheduler.beats_consumed()
                );
            }
            let pointer = self.state.pointer_position;
            // Under normal frame deltas this is the fixed 12 px window around the
            // pointer. A slow frame widens it back to the previous pointer so no
            // samples of the old sweep are left behind.
            let from = if wrapped { pointer } else { previous.min(pointer) };
            self.state.refresh(from - half, pointer + half);
        }

        if let Some(idx) = self.state.locate(self.state.pointer_position) {
            self.state.marker = Some(self.state.generated[idx]);
        }

        TickReport {
            phase: self.state.phase,
            pointer_position: self.state.pointer_position,
            wrapped,
            entered_steady_state,
        }
    }
}

/// One sweep-width of samples mapped to display space.
fn sweep_points(
    synth: &WaveformSynthesizer,
    model: &ParameterModel,
    scheduler: &mut BeatScheduler,
    geometry: &DisplayGeometry,
) -> Vec<Point> {
    let duration = geometry.width / SWEEP_PIXELS_PER_SECOND;
    let baseline = geometry.baseline();
    synth
        .generate(model, scheduler, duration)
        .into_iter()
        .map(|WaveSample { time, amplitude_mv }| {
            Point::new(
                time * SWEEP_PIXELS_PER_SECOND,
                baseline - amplitude_mv * model.scale.pixels_per_mv,
            )
        })
        .collect()
}
