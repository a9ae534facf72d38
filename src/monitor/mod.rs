// src/monitor/mod.rs
// 心电监护仪核心：参数快照、节拍调度、波形合成、扫描渲染
pub mod error;
pub mod params;
pub mod pipeline;
pub mod plot;
pub mod scheduler;
pub mod source;
pub mod sweep;
pub mod synth;
// 公开导出 gui 与 main 用到的类型
pub use error::MonitorError;
pub use params::{ParameterModel, SegmentField, SegmentOverrides};
pub use pipeline::MonitorLoop;
pub use plot::{PlotStyle, PngSurface};
pub use source::FixedRateFrames;
pub use sweep::{FrameToken, SweepRenderer};
pub use synth::WaveformSynthesizer;
