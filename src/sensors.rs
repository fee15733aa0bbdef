use crate::stats::{Result, SampleError};
use log::debug;
use regex::Regex;
use std::io;
use std::sync::LazyLock;
use std::time::Duration;
use sysinfo::Components;
use tokio::process::Command;

/// 匹配 `<label>: +<decimal>°C` 形式的整行
static TEMPERATURE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s:]+):\s+\+(\d+(?:\.\d+)?)°C$").expect("温度行正则表达式无效")
});

/// 传感器名称到摄氏温度的有序映射
///
/// 保持首次插入的顺序；重复插入同名传感器只替换读数。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Temperatures {
    entries: Vec<(String, f64)>,
}

impl Temperatures {
    #[inline]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 插入或更新一个传感器读数
    pub fn insert(&mut self, sensor: impl Into<String>, celsius: f64) {
        let sensor = sensor.into();
        match self.entries.iter_mut().find(|(name, _)| *name == sensor) {
            Some((_, value)) => *value = celsius,
            None => self.entries.push((sensor, celsius)),
        }
    }

    pub fn get(&self, sensor: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == sensor)
            .map(|(_, value)| *value)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), *value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Temperatures {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut temperatures = Temperatures::new();
        for (sensor, celsius) in iter {
            temperatures.insert(sensor, celsius);
        }
        temperatures
    }
}

/// 解析 `sensors` 的文本输出
///
/// 每行先去除首尾空白；不匹配的行直接跳过。
pub fn parse_sensors_output(output: &str) -> Temperatures {
    let mut temperatures = Temperatures::new();

    for line in output.lines() {
        let Some(caps) = TEMPERATURE_LINE.captures(line.trim()) else {
            continue;
        };
        if let Ok(celsius) = caps[2].parse::<f64>() {
            temperatures.insert(&caps[1], celsius);
        }
    }

    temperatures
}

/// 温度数据来源
///
/// 按平台能力选择实现；支持新平台时新增变体。
#[derive(Debug)]
pub enum TemperatureSource {
    /// 调用 lm-sensors 的 `sensors` 工具并解析输出
    LinuxSensors { command: String },
    /// 通过 sysinfo 读取硬件传感器
    Components,
    /// 当前平台无可用来源
    Unsupported,
}

impl TemperatureSource {
    /// 默认温度工具
    pub const DEFAULT_COMMAND: &'static str = "sensors";

    /// 根据编译目标平台选择温度来源
    pub fn detect(command: impl Into<String>) -> Self {
        if cfg!(target_os = "linux") {
            TemperatureSource::LinuxSensors {
                command: command.into(),
            }
        } else if cfg!(any(target_os = "macos", target_os = "freebsd")) {
            TemperatureSource::Components
        } else {
            TemperatureSource::Unsupported
        }
    }

    /// 来源名称，用于日志
    pub fn name(&self) -> &str {
        match self {
            TemperatureSource::LinuxSensors { command } => command.as_str(),
            TemperatureSource::Components => "sysinfo",
            TemperatureSource::Unsupported => "unsupported",
        }
    }

    /// 读取一次全部传感器温度
    pub async fn read(&self) -> Result<Temperatures> {
        match self {
            TemperatureSource::LinuxSensors { command } => read_sensors_command(command).await,
            TemperatureSource::Components => Ok(read_components()),
            TemperatureSource::Unsupported => {
                Err(SampleError::Unsupported(std::env::consts::OS))
            }
        }
    }
}

/// 温度工具的最长运行时间，超时后进程被终止
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// 执行温度工具并解析其标准输出
async fn read_sensors_command(command: &str) -> Result<Temperatures> {
    let running = Command::new(command).kill_on_drop(true).output();
    let output = match tokio::time::timeout(COMMAND_TIMEOUT, running).await {
        Err(_) => {
            return Err(SampleError::Unexpected(format!(
                "'{command}' 超过 {} 秒未返回",
                COMMAND_TIMEOUT.as_secs()
            )));
        }
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
            return Err(SampleError::UtilityMissing(command.to_string()));
        }
        Ok(Err(e)) => {
            return Err(SampleError::Unexpected(format!(
                "无法执行 '{command}': {e}"
            )));
        }
    };

    if !output.status.success() {
        return Err(SampleError::UtilityFailed {
            command: command.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8(output.stdout).map_err(|e| {
        SampleError::Unexpected(format!("'{command}' 的输出不是有效的 UTF-8: {e}"))
    })?;

    let temperatures = parse_sensors_output(&stdout);
    debug!("从 '{command}' 解析到 {} 个温度读数", temperatures.len());
    Ok(temperatures)
}

/// 读取 sysinfo 暴露的硬件传感器，没有读数的传感器被跳过
fn read_components() -> Temperatures {
    let components = Components::new_with_refreshed_list();
    components
        .list()
        .iter()
        .filter_map(|component| {
            component
                .temperature()
                .filter(|celsius| celsius.is_finite())
                .map(|celsius| (component.label().to_string(), f64::from(celsius)))
        })
        .collect()
}
