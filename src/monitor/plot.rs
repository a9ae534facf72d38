use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::monitor::error::MonitorError;
use crate::monitor::pipeline::SceneSurface;
use crate::types::Scene;

/// Largest bitmap edge the offscreen surface will allocate.
const MAX_EDGE_PX: u32 = 8192;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub background: RGBColor,
    pub grid: RGBColor,
    pub trace: RGBColor,
    pub trace_width: u32,
    pub pointer_fill: RGBColor,
    pub pointer_outline: RGBColor,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            background: WHITE,
            grid: RGBColor(0xee, 0xee, 0xee),
            trace: RGBColor(0x2c, 0x3e, 0x50),
            trace_width: 2,
            pointer_fill: WHITE,
            pointer_outline: BLACK,
        }
    }
}

fn bitmap_size(scene: &Scene) -> Result<(u32, u32), MonitorError> {
    let w = scene.geometry.width.round();
    let h = scene.geometry.height.round();
    if !(1.0..=f64::from(MAX_EDGE_PX)).contains(&w) || !(1.0..=f64::from(MAX_EDGE_PX)).contains(&h) {
        return Err(MonitorError::SurfaceUnavailable(format!(
            "cannot allocate a {w}x{h} bitmap"
        )));
    }
    Ok((w as u32, h as u32))
}

fn px(v: f64) -> i32 {
    v.round() as i32
}

/// Draw `scene` into a packed RGB buffer.
pub fn render_scene_rgb(scene: &Scene, style: &PlotStyle) -> Result<Vec<u8>, MonitorError> {
    let (width, height) = bitmap_size(scene)?;
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&style.background)?;

        let pitch = scene.grid_pitch.max(1.0);
        let grid = style.grid.stroke_width(1);
        let mut x = 0.0;
        while x <= f64::from(width) {
            root.draw(&PathElement::new(vec![(px(x), 0), (px(x), height as i32)], grid))?;
            x += pitch;
        }
        let mut y = 0.0;
        while y <= f64::from(height) {
            root.draw(&PathElement::new(vec![(0, px(y)), (width as i32, px(y))], grid))?;
            y += pitch;
        }

        let trace = style.trace.stroke_width(style.trace_width);
        for run in &scene.trace {
            let points: Vec<(i32, i32)> = run.iter().map(|p| (px(p.x), px(p.y))).collect();
            root.draw(&PathElement::new(points, trace))?;
        }

        if let Some(pointer) = scene.pointer {
            let center = (px(pointer.x), px(pointer.y));
            let radius = px(scene.pointer_radius);
            root.draw(&Circle::new(center, radius, style.pointer_fill.filled()))?;
            root.draw(&Circle::new(
                center,
                radius,
                style.pointer_outline.stroke_width(1),
            ))?;
        }
        root.present()?;
    }
    Ok(buffer)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MonitorError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| MonitorError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

/// Offscreen surface that keeps the most recently presented frame.
pub struct PngSurface {
    style: PlotStyle,
    last: Option<(Vec<u8>, u32, u32)>,
    frames: u64,
}

impl PngSurface {
    pub fn new(style: PlotStyle) -> Self {
        Self {
            style,
            last: None,
            frames: 0,
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// PNG of the last presented frame.
    pub fn encode(&self) -> Result<Vec<u8>, MonitorError> {
        let (buffer, width, height) = self
            .last
            .as_ref()
            .ok_or_else(|| MonitorError::SurfaceUnavailable("no frame has been presented".into()))?;
        encode_png(buffer, *width, *height)
    }
}

impl SceneSurface for PngSurface {
    fn present(&mut self, scene: &Scene) -> Result<(), MonitorError> {
        let (width, height) = bitmap_size(scene)?;
        let buffer = render_scene_rgb(scene, &self.style)?;
        self.last = Some((buffer, width, height));
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisplayGeometry, Point};

    fn scene() -> Scene {
        Scene {
            geometry: DisplayGeometry::new(120.0, 60.0),
            grid_pitch: 8.0,
            trace: vec![
                vec![Point::new(0.0, 30.0), Point::new(20.0, 10.0), Point::new(40.0, 30.0)],
                vec![Point::new(60.0, 30.0), Point::new(80.0, 30.0)],
            ],
            pointer: Some(Point::new(80.0, 30.0)),
            pointer_radius: 6.0,
        }
    }

    #[test]
    fn encodes_last_presented_frame_as_png() {
        let mut surface = PngSurface::new(PlotStyle::default());
        surface.present(&scene()).unwrap();
        surface.present(&scene()).unwrap();
        assert_eq!(surface.frames_presented(), 2);
        let png = surface.encode().unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn trace_is_drawn_over_the_background() {
        let style = PlotStyle::default();
        let rgb = render_scene_rgb(&scene(), &style).unwrap();
        // Midpoint of the flat second run, away from the pointer.
        let (x, y) = (66usize, 30usize);
        let i = (y * 120 + x) * 3;
        assert_ne!(&rgb[i..i + 3], &[0xff, 0xff, 0xff]);
        // A blank spot between the runs stays background.
        let j = (50 * 120 + 50) * 3;
        assert_eq!(&rgb[j..j + 3], &[0xff, 0xff, 0xff]);
    }

    #[test]
    fn surface_without_frames_cannot_encode() {
        let surface = PngSurface::new(PlotStyle::default());
        assert!(matches!(
            surface.encode(),
            Err(MonitorError::SurfaceUnavailable(_))
        ));
    }

    #[test]
    fn oversized_scene_is_refused() {
        let mut big = scene();
        big.geometry = DisplayGeometry::new(1.0e6, 60.0);
        let mut surface = PngSurface::new(PlotStyle::default());
        assert!(matches!(
            surface.present(&big),
            Err(MonitorError::SurfaceUnavailable(_))
        ));
        assert_eq!(surface.frames_presented(), 0);
    }
}
