use crate::display::DEFAULT_REFRESH_INTERVAL;
use crate::sensors::TemperatureSource;
use crate::stats::UsageProbe;
use anyhow::{Result, bail};
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 日志级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// 对应的 `log` 过滤级别，CRITICAL 记为 error
    #[inline]
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => LevelFilter::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => bail!("未知的日志级别: {other}（可选 DEBUG/INFO/WARNING/ERROR/CRITICAL）"),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// 配置结构
#[derive(Debug, Clone)]
pub struct Config {
    /// 刷新间隔
    pub refresh_interval: Duration,
    /// CPU 测量窗口
    pub measure_window: Duration,
    /// 日志级别
    pub log_level: LogLevel,
    /// 温度工具
    pub sensors_command: String,
    /// 使用逐行文本输出代替终端面板
    pub plain: bool,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            measure_window: UsageProbe::DEFAULT_WINDOW,
            log_level: LogLevel::default(),
            sensors_command: TemperatureSource::DEFAULT_COMMAND.to_string(),
            plain: false,
        }
    }
}

impl Config {
    /// 允许的最短刷新间隔
    pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval < Self::MIN_REFRESH_INTERVAL {
            bail!(
                "刷新间隔过短: {} ms（至少 {} ms）",
                self.refresh_interval.as_millis(),
                Self::MIN_REFRESH_INTERVAL.as_millis()
            );
        }
        if self.sensors_command.trim().is_empty() {
            bail!("温度工具命令不能为空");
        }
        Ok(())
    }
}
