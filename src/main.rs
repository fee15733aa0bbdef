use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::time::Duration;
use swb_desk_monitor::input::{self, Shutdown};
use swb_desk_monitor::{
    Config, DisplayLoop, HostSampler, LogLevel, PlainScreen, RefreshTimer, Sampler, Screen,
    TemperatureSource, TerminalScreen, logging,
};

/// 资源占用显示小窗
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 刷新间隔，毫秒 (默认: 1000)
    #[arg(short, long, default_value_t = 1000)]
    interval: u64,

    /// 日志级别 (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(short, long, env = "LOGLEVEL", default_value = "INFO")]
    log_level: String,

    /// 温度工具命令 (默认: sensors)
    #[arg(short, long, default_value = TemperatureSource::DEFAULT_COMMAND)]
    sensors_command: String,

    /// 逐行输出文本而不是全屏面板
    #[arg(short, long)]
    plain: bool,
}

impl Args {
    /// 从命令行参数创建配置
    fn into_config(self) -> Result<Config> {
        let config = Config {
            refresh_interval: Duration::from_millis(self.interval),
            log_level: self.log_level.parse::<LogLevel>()?,
            sensors_command: self.sensors_command,
            plain: self.plain,
            ..Config::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("配置无效: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.log_level);

    match run(config).await {
        Ok(()) => {
            info!("程序正常退出");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("[CRITICAL] 运行过程中发生意外错误: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    info!("资源占用显示小窗启动中...");
    info!(
        "配置信息 - 刷新间隔: {} ms, 温度工具: {}",
        config.refresh_interval.as_millis(),
        config.sensors_command
    );

    let shutdown = Shutdown::new();
    let signals = input::spawn_signal_watcher(shutdown.clone());

    let sampler = HostSampler::new(
        config.measure_window,
        TemperatureSource::detect(config.sensors_command.as_str()),
    );
    info!("温度来源: {}", sampler.temperature_source().name());
    let timer = RefreshTimer::new(config.refresh_interval, shutdown.subscribe());

    let result = if config.plain || !io::stdout().is_terminal() {
        drive(sampler, PlainScreen::new(io::stdout()), timer).await
    } else {
        let screen = TerminalScreen::enter(io::stdout()).context("无法初始化终端")?;
        let keys = input::spawn_key_watcher(shutdown.clone());
        let result = drive(sampler, screen, timer).await;

        // 终端已在 drive 返回前恢复；通知按键线程退出
        shutdown.trigger();
        let _ = keys.await;
        result
    };

    signals.abort();
    result
}

/// 立即刷新一次，然后运行到关闭
async fn drive<S: Sampler, V: Screen>(sampler: S, screen: V, timer: RefreshTimer) -> Result<()> {
    let mut display = DisplayLoop::start(sampler, screen, timer).await?;
    display.run().await
}
