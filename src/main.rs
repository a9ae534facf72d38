// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod gui;
mod monitor;
mod types;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use eframe::egui;
use log::{info, warn};

use crate::config::MonitorConfig;
use crate::monitor::{FixedRateFrames, MonitorLoop, ParameterModel, PlotStyle, PngSurface, SweepRenderer};
use crate::types::DisplayGeometry;

/// Sweeping ECG monitor simulator.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON file with monitor parameters (camelCase keys, all optional).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive monitor (default).
    Gui,
    /// Run the monitor headless at a fixed frame rate and save the final frame.
    Snapshot {
        /// Simulated run time in seconds.
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
        /// Simulated frames per second.
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        #[arg(long, short, default_value = "ecg_snapshot.png")]
        output: PathBuf,
    },
}

// 读取配置并校验，失败时直接报错退出
fn load_config(path: Option<&Path>) -> Result<(MonitorConfig, ParameterModel)> {
    let config = match path {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    let model = ParameterModel::commit(&config).map_err(|err| {
        warn!("rejected parameters: {err}");
        err
    })?;
    Ok((config, model))
}

fn run_gui(config: MonitorConfig, model: ParameterModel) -> Result<()> {
    let geometry = DisplayGeometry::default();
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1400.0, 820.0])
        .with_min_inner_size([1100.0, 600.0])
        .with_title("ECG Monitor");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let app = gui::MonitorApp::new(config, model, geometry);
    eframe::run_native("ecg-monitor", options, Box::new(|_cc| Box::new(app)))
        .map_err(|e| anyhow!("{e}"))
}

fn run_snapshot(model: ParameterModel, seconds: f64, fps: f64, output: &Path) -> Result<()> {
    let renderer = SweepRenderer::new(model, DisplayGeometry::default());
    let frames = FixedRateFrames::new(fps, seconds);
    info!("rendering {} frames headless", frames.remaining());
    let mut monitor = MonitorLoop::new(frames, renderer);
    let mut surface = PngSurface::new(PlotStyle::default());
    let last = monitor.run(&mut surface).context("running monitor loop")?;
    let png = surface.encode()?;
    fs::write(output, &png).with_context(|| format!("writing {}", output.display()))?;
    info!(
        "wrote {} ({} bytes) after {} frames ({} presented), {} sweeps",
        output.display(),
        png.len(),
        monitor.frames(),
        surface.frames_presented(),
        monitor.renderer().sweeps()
    );
    if let Some(report) = last {
        info!(
            "final frame: {:?} at {:.0}px{}",
            report.phase,
            report.pointer_position,
            if report.wrapped { ", just wrapped" } else { "" }
        );
    }
    monitor.stop();
    Ok(())
}

// 入口函数
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let (config, model) = load_config(cli.config.as_deref())?;
    match cli.command.unwrap_or(Command::Gui) {
        Command::Gui => run_gui(config, model),
        Command::Snapshot {
            seconds,
            fps,
            output,
        } => run_snapshot(model, seconds, fps, &output),
    }
}
