use crate::format::{bytes_to_mb, convert_size};
use log::{Level, debug};
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

/// CPU 与内存占用读数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    pub cpu_percent: f64, // CPU 负载 (0.0-100.0)
    pub memory_mb: f64,   // 已用内存，MB，两位小数
}

/// 采样失败类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    /// 平台接口不可用或返回了无效读数
    #[error("系统指标不可用: {0}")]
    MetricUnavailable(String),
    /// 当前平台没有温度数据来源
    #[error("当前平台 ({0}) 暂不支持温度采集")]
    Unsupported(&'static str),
    /// 温度工具未安装
    #[error("未找到温度工具 '{0}'，跳过温度采集")]
    UtilityMissing(String),
    /// 温度工具以非零状态退出
    #[error("温度工具 '{command}' 执行失败 ({status}): {stderr}")]
    UtilityFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("意外错误: {0}")]
    Unexpected(String),
}

impl SampleError {
    /// 记录日志时使用的级别
    ///
    /// “此处不支持”记为 warning，“本应成功却失败”记为 error。
    #[inline]
    pub fn severity(&self) -> Level {
        match self {
            SampleError::Unsupported(_) | SampleError::UtilityMissing(_) => Level::Warn,
            SampleError::MetricUnavailable(_)
            | SampleError::UtilityFailed { .. }
            | SampleError::Unexpected(_) => Level::Error,
        }
    }
}

pub type Result<T> = std::result::Result<T, SampleError>;

/// CPU 与内存读数采集器
///
/// CPU 使用率需要两次刷新之间间隔一个测量窗口才有意义，
/// 因此每次 [`UsageProbe::read`] 都会等待该窗口。
pub struct UsageProbe {
    system: System,
    window: Duration,
}

impl UsageProbe {
    /// 默认 CPU 测量窗口
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

    /// 创建采集器，测量窗口不会短于 sysinfo 要求的最小间隔
    pub fn new(window: Duration) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );

        Self {
            system,
            window: window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    /// 实际使用的测量窗口
    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// 读取一次 CPU 负载与已用内存
    ///
    /// 两项读数要么同时成功，要么同时失败。
    pub async fn read(&mut self) -> Result<Usage> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SampleError::MetricUnavailable(format!(
                "sysinfo 不支持当前平台 ({})",
                std::env::consts::OS
            )));
        }

        self.system.refresh_cpu_usage();
        tokio::time::sleep(self.window).await;
        self.system.refresh_cpu_usage();
        let cpu_percent = f64::from(self.system.global_cpu_usage());

        self.system.refresh_memory();
        let total = self.system.total_memory();
        let used = self.system.used_memory();

        let usage = usage_from_raw(cpu_percent, used, total)?;
        debug!(
            "CPU: {:.1}%，内存: {} / {}",
            usage.cpu_percent,
            convert_size(used),
            convert_size(total)
        );
        Ok(usage)
    }
}

/// 校验原始读数并换算为 [`Usage`]
fn usage_from_raw(cpu_percent: f64, used_bytes: u64, total_bytes: u64) -> Result<Usage> {
    if !cpu_percent.is_finite() {
        return Err(SampleError::MetricUnavailable(format!(
            "无效的 CPU 读数: {cpu_percent}"
        )));
    }
    if total_bytes == 0 {
        return Err(SampleError::MetricUnavailable(
            "无法读取内存信息".to_string(),
        ));
    }

    Ok(Usage {
        cpu_percent: cpu_percent.clamp(0.0, 100.0),
        memory_mb: bytes_to_mb(used_bytes.min(total_bytes)),
    })
}
