use crate::config::LogLevel;
use log::debug;
use std::io::Write;

/// 初始化日志系统
///
/// 只在启动时调用一次，输出到 stderr，格式为 `<时间> [<级别>]: <消息>`。
pub fn init(level: LogLevel) {
    let result = env_logger::Builder::new()
        .filter_level(level.filter())
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}]: {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .try_init();

    match result {
        Ok(()) => debug!("日志系统初始化成功，级别: {level}"),
        Err(e) => eprintln!("日志系统初始化失败: {e}，沿用已有的日志设置"),
    }
}
