//! 常驻桌面的资源占用显示小窗
//!
//! 每个刷新周期采集一次 CPU 负载、内存占用与硬件温度，并更新到面板上。

pub mod config;
pub mod display;
pub mod format;
pub mod input;
pub mod logging;
pub mod sampler;
pub mod screen;
pub mod sensors;
pub mod stats;

// 重新导出主要的公共类型
pub use config::{Config, LogLevel};
pub use display::{DisplayLoop, LoopState, Panel, RefreshTimer};
pub use format::{convert_size, format_timestamp};
pub use sampler::{FailureLog, HostSampler, Sample, Sampler};
pub use screen::{PlainScreen, Screen, TerminalScreen};
pub use sensors::{TemperatureSource, Temperatures, parse_sensors_output};
pub use stats::{SampleError, Usage};
