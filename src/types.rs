// src/types.rs

/// Pointer marker radius in pixels.
pub const POINTER_RADIUS: f64 = 6.0;
/// Width of the window refreshed around the pointer once the trace wraps.
pub const ERASE_WIDTH: f64 = 12.0;
/// Pitch of the background grid in pixels.
pub const GRID_PITCH: f64 = 8.0;

/// A sample in display space. `x` grows along the sweep, `y` grows downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// 显示区域尺寸 (像素)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayGeometry {
    pub width: f64,
    pub height: f64,
}

impl DisplayGeometry {
    #[cfg(test)]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    /// Vertical position of 0 mV.
    pub fn baseline(&self) -> f64 {
        self.height / 2.0
    }
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        DisplayGeometry {
            width: 1000.0,
            height: 400.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepPhase {
    /// The trace is still being drawn onto an empty display.
    FirstSweep,
    /// The display is full; the pointer wraps and overwrites the previous sweep.
    SteadyState,
}

/// Everything a drawing surface needs for one frame.
#[derive(Clone, Debug)]
pub struct Scene {
    pub geometry: DisplayGeometry,
    pub grid_pitch: f64,
    /// Polyline runs; a gap in the revealed buffer starts a new run.
    pub trace: Vec<Vec<Point>>,
    pub pointer: Option<Point>,
    pub pointer_radius: f64,
}

impl Scene {
    #[cfg(test)]
    pub fn point_count(&self) -> usize {
        self.trace.iter().map(Vec::len).sum()
    }
}
