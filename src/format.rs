use chrono::DateTime;

/// 每兆字节的字节数
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 可读容量单位
const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// 时间戳显示格式
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 将字节数转换为兆字节，保留两位小数
#[inline]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_MB, 2)
}

/// 按指定小数位数四舍五入
#[inline]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// 将字节数转换为可读格式（Bytes、KB、MB、GB、TB）
///
/// 按 1024 进位，最大单位为 TB，固定两位小数。
pub fn convert_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    let mut idx = 0;
    while size >= 1024.0 && idx < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        idx += 1;
    }
    format!("{size:.2} {}", SIZE_UNITS[idx])
}

/// 将 Unix 时间戳（秒）格式化为 `YYYY-MM-DD HH:MM:SS`
///
/// 统一按 UTC 解释，与运行环境的时区无关。超出可表示范围时返回 `-`。
pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// CPU 负载文本，一位小数加百分号
#[inline]
pub fn format_cpu(percent: f64) -> String {
    format!("{percent:.1}%")
}

/// 内存占用文本
///
/// 直接使用已取整的浮点值，整数值也保留一位小数（`512.0 MB`）。
#[inline]
pub fn format_memory(memory_mb: f64) -> String {
    format!("{memory_mb:?} MB")
}

/// 单个传感器的温度文本
#[inline]
pub fn format_temperature(sensor: &str, celsius: f64) -> String {
    format!("{sensor}: {celsius:?}C")
}
