use crate::sensors::{TemperatureSource, Temperatures};
use crate::stats::{Result, SampleError, Usage, UsageProbe};
use chrono::Utc;
use log::{Level, log};
use std::time::Duration;

static NO_TEMPERATURES: Temperatures = Temperatures::new();

/// 一次采样的快照
///
/// 只在一个刷新周期内存在：生成、显示、丢弃。
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    usage: Result<Usage>,
    temperatures: Result<Temperatures>,
    taken_at: i64, // Unix 时间戳（秒，UTC）
}

impl Sample {
    #[inline]
    pub fn new(usage: Result<Usage>, temperatures: Result<Temperatures>, taken_at: i64) -> Self {
        Self {
            usage,
            temperatures,
            taken_at,
        }
    }

    #[inline]
    pub fn usage(&self) -> &Result<Usage> {
        &self.usage
    }

    /// CPU 负载，读取失败时为 `None`
    #[inline]
    pub fn cpu_percent(&self) -> Option<f64> {
        self.usage.as_ref().ok().map(|usage| usage.cpu_percent)
    }

    /// 已用内存 (MB)，读取失败时为 `None`
    #[inline]
    pub fn memory_mb(&self) -> Option<f64> {
        self.usage.as_ref().ok().map(|usage| usage.memory_mb)
    }

    /// 温度映射，读取失败时为空
    #[inline]
    pub fn temperatures(&self) -> &Temperatures {
        self.temperatures.as_ref().unwrap_or(&NO_TEMPERATURES)
    }

    #[inline]
    pub fn temperature_result(&self) -> &Result<Temperatures> {
        &self.temperatures
    }

    #[inline]
    pub fn taken_at(&self) -> i64 {
        self.taken_at
    }
}

/// 采样器
///
/// 两个读取方法以显式结果返回失败类型，[`Sampler::sample`] 负责记录日志并组装快照。
#[allow(async_fn_in_trait)]
pub trait Sampler {
    /// 读取 CPU 负载与已用内存
    async fn read_usage(&mut self) -> Result<Usage>;

    /// 读取全部温度传感器
    async fn read_temperatures(&mut self) -> Result<Temperatures>;

    /// 采集一个完整的快照，永不失败
    async fn sample(&mut self, failures: &mut FailureLog) -> Sample {
        let usage = self.read_usage().await;
        failures.record_usage(&usage);

        let temperatures = self.read_temperatures().await;
        failures.record_temperatures(&temperatures);

        Sample::new(usage, temperatures, Utc::now().timestamp())
    }
}

/// 采样失败的日志记录
///
/// 每次失败都会记录。warning 级别的失败（平台不支持、工具未安装）与上一次相同时降为 debug，
/// 避免每个刷新周期重复输出；读取成功后重新计数。
#[derive(Debug, Default)]
pub struct FailureLog {
    usage: Option<SampleError>,
    temperatures: Option<SampleError>,
}

impl FailureLog {
    /// 记录 CPU/内存读取结果，返回本次使用的日志级别
    pub fn record_usage<T>(&mut self, result: &Result<T>) -> Option<Level> {
        Self::record(&mut self.usage, "系统统计", result)
    }

    /// 记录温度读取结果，返回本次使用的日志级别
    pub fn record_temperatures<T>(&mut self, result: &Result<T>) -> Option<Level> {
        Self::record(&mut self.temperatures, "温度", result)
    }

    fn record<T>(
        last: &mut Option<SampleError>,
        what: &str,
        result: &Result<T>,
    ) -> Option<Level> {
        let error = match result {
            Ok(_) => {
                *last = None;
                return None;
            }
            Err(error) => error,
        };

        let mut level = error.severity();
        if level == Level::Warn && last.as_ref() == Some(error) {
            level = Level::Debug;
        }
        log!(level, "获取{what}数据失败: {error}");

        *last = Some(error.clone());
        Some(level)
    }
}

/// 读取本机数据的采样器
pub struct HostSampler {
    usage: UsageProbe,
    temperatures: TemperatureSource,
}

impl HostSampler {
    pub fn new(measure_window: Duration, temperatures: TemperatureSource) -> Self {
        Self {
            usage: UsageProbe::new(measure_window),
            temperatures,
        }
    }

    /// 温度来源
    #[inline]
    pub fn temperature_source(&self) -> &TemperatureSource {
        &self.temperatures
    }
}

impl Sampler for HostSampler {
    async fn read_usage(&mut self) -> Result<Usage> {
        self.usage.read().await
    }

    async fn read_temperatures(&mut self) -> Result<Temperatures> {
        self.temperatures.read().await
    }
}
