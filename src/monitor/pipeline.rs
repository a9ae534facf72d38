use log::{error, warn};

use crate::monitor::error::MonitorError;
#[cfg(test)]
use crate::monitor::params::ParameterModel;
use crate::monitor::source::FrameSource;
use crate::monitor::sweep::{FrameToken, SweepRenderer, TickReport};
use crate::types::Scene;

/// Whatever finally draws a [`Scene`].
pub trait SceneSurface {
    fn present(&mut self, scene: &Scene) -> Result<(), MonitorError>;
}

/// Drives a [`SweepRenderer`] from a frame source and hands every frame to a surface.
///
/// The next frame is requested right after the current one is handled, the way
/// an animation-frame callback re-arms itself. An apply in between makes that
/// request stale; it is dropped and re-armed against the new configuration.
pub struct MonitorLoop<S: FrameSource> {
    source: S,
    renderer: SweepRenderer,
    pending: Option<FrameToken>,
    frames: u64,
}

impl<S: FrameSource> MonitorLoop<S> {
    pub fn new(source: S, renderer: SweepRenderer) -> Self {
        let pending = renderer.request_frame().ok();
        Self {
            source,
            renderer,
            pending,
            frames: 0,
        }
    }

    pub fn renderer(&self) -> &SweepRenderer {
        &self.renderer
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    pub fn apply(&mut self, model: ParameterModel) -> Result<(), MonitorError> {
        self.renderer.apply(model)
    }

    /// Handle one frame. `Ok(None)` once the source is drained or the loop is stopped.
    pub fn pump_once(
        &mut self,
        surface: &mut impl SceneSurface,
    ) -> Result<Option<TickReport>, MonitorError> {
        let Some(token) = self.pending else {
            return Ok(None);
        };
        let Some(timestamp) = self.source.next_frame()? else {
            return Ok(None);
        };
        let report = match self.renderer.on_frame(token, timestamp) {
            Ok(report) => report,
            Err(MonitorError::StaleFrame { requested, current }) => {
                warn!("dropping frame from generation {requested}, renderer is at {current}");
                self.pending = Some(self.renderer.request_frame()?);
                return self.pump_once(surface);
            }
            Err(err) => {
                self.pending = None;
                return Err(err);
            }
        };
        self.frames += 1;
        if let Err(err) = surface.present(&self.renderer.scene()) {
            error!("rendering surface failed, stopping: {err}");
            self.stop();
            return Err(err);
        }
        self.pending = Some(self.renderer.request_frame()?);
        Ok(Some(report))
    }

    /// Pump until the source runs dry. Returns the report of the last frame handled.
    pub fn run(
        &mut self,
        surface: &mut impl SceneSurface,
    ) -> Result<Option<TickReport>, MonitorError> {
        let mut last = None;
        while let Some(report) = self.pump_once(surface)? {
            last = Some(report);
        }
        Ok(last)
    }

    pub fn stop(&mut self) {
        self.pending = None;
        self.renderer.teardown();
    }
}
