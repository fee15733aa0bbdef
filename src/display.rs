use crate::format::{format_cpu, format_memory, format_temperature, format_timestamp};
use crate::sampler::{FailureLog, Sample, Sampler};
use crate::screen::Screen;
use anyhow::{Context, Result};
use log::{Level, debug, error, info};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

/// 默认刷新间隔
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// 采样失败时温度面板显示的固定文本
pub const TEMPERATURE_ERROR_TEXT: &str = "数据获取失败";

/// 面板上显示的文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub cpu: String,
    pub memory: String,
    pub temperature: String,
    pub updated: String,
}

impl Default for Panel {
    #[inline]
    fn default() -> Self {
        Self {
            cpu: "--%".to_string(),
            memory: "-- MB".to_string(),
            temperature: "Loading...".to_string(),
            updated: String::new(),
        }
    }
}

impl Panel {
    /// 用一次采样更新面板文本
    ///
    /// CPU/内存读取失败时保留上一次成功显示的值，温度面板改为错误提示。
    pub fn apply(&mut self, sample: &Sample) {
        match sample.usage() {
            Ok(usage) => {
                self.cpu = format_cpu(usage.cpu_percent);
                self.memory = format_memory(usage.memory_mb);
                self.temperature = sample
                    .temperatures()
                    .iter()
                    .map(|(sensor, celsius)| format_temperature(sensor, celsius))
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            Err(_) => self.temperature = TEMPERATURE_ERROR_TEXT.to_string(),
        }
        self.updated = format_timestamp(sample.taken_at());
    }
}

/// 刷新循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// 等待下一次定时
    Idle,
    /// 正在采样
    Sampling,
    /// 正在更新显示
    Rendering,
}

/// 固定周期的重复定时器
///
/// 每次等待从上一轮刷新结束时开始计时；收到关闭信号后不再触发。
pub struct RefreshTimer {
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl RefreshTimer {
    #[inline]
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { period, shutdown }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 等待一个周期，返回 `false` 表示已请求关闭
    pub async fn wait(&mut self) -> bool {
        let deadline = Instant::now() + self.period;

        loop {
            if *self.shutdown.borrow_and_update() {
                return false;
            }

            tokio::select! {
                _ = sleep_until(deadline) => return !*self.shutdown.borrow(),
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // 关闭信号的发送端已不存在，只剩定时
                        sleep_until(deadline).await;
                        return true;
                    }
                }
            }
        }
    }
}

/// 等待关闭信号；发送端不存在时永不返回
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|&stop| stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// 定时刷新循环
///
/// 单任务串行执行：采样、渲染、重新定时。采样失败不会中断循环。
pub struct DisplayLoop<S, V> {
    sampler: S,
    screen: V,
    timer: RefreshTimer,
    failures: FailureLog,
    panel: Panel,
    state: LoopState,
    ticks: u64,
}

impl<S: Sampler, V: Screen> DisplayLoop<S, V> {
    /// 创建循环并立即完成第一次刷新
    pub async fn start(sampler: S, screen: V, timer: RefreshTimer) -> Result<Self> {
        let mut display = Self {
            sampler,
            screen,
            timer,
            failures: FailureLog::default(),
            panel: Panel::default(),
            state: LoopState::Idle,
            ticks: 0,
        };

        display.tick().await?;
        info!(
            "显示循环已就绪，刷新间隔 {} ms",
            display.timer.period().as_millis()
        );
        Ok(display)
    }

    /// 执行一次完整的刷新
    ///
    /// 只有显示输出失败才会返回错误。
    pub async fn tick(&mut self) -> Result<()> {
        self.state = LoopState::Sampling;
        let sample = self.sampler.sample(&mut self.failures).await;

        self.state = LoopState::Rendering;
        match sample.usage() {
            // warning 级别的失败已由采样器按周期去重记录
            Err(e) if e.severity() == Level::Error => error!("更新显示数据失败: {e}"),
            _ => {}
        }
        self.panel.apply(&sample);
        let presented = self.screen.present(&self.panel);

        self.state = LoopState::Idle;
        self.ticks += 1;
        debug!("第 {} 次刷新完成", self.ticks);

        presented.context("刷新显示失败")
    }

    /// 按固定间隔持续刷新，直到收到关闭信号
    ///
    /// 关闭信号会中断正在进行的刷新，不等待采样结束。
    pub async fn run(&mut self) -> Result<()> {
        let mut shutdown = self.timer.shutdown.clone();

        while self.timer.wait().await {
            let interrupted = tokio::select! {
                ticked = self.tick() => {
                    ticked?;
                    false
                }
                _ = shutdown_requested(&mut shutdown) => true,
            };
            if interrupted {
                self.state = LoopState::Idle;
                debug!("刷新被关闭信号中断");
                break;
            }
        }

        info!("显示循环已停止，共刷新 {} 次", self.ticks);
        Ok(())
    }

    #[inline]
    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    #[inline]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub fn screen(&self) -> &V {
        &self.screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Temperatures;
    use crate::stats::{Result as SampleResult, SampleError, Usage};
    use std::collections::VecDeque;
    use std::io;

    /// 记录每次显示内容的屏幕
    #[derive(Default)]
    struct RecordingScreen {
        frames: Vec<Panel>,
        fail: bool,
    }

    impl Screen for RecordingScreen {
        fn present(&mut self, panel: &Panel) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "窗口已关闭"));
            }
            self.frames.push(panel.clone());
            Ok(())
        }
    }

    /// 按脚本依次返回读数的采样器，脚本用完后一直失败
    #[derive(Default)]
    struct ScriptedSampler {
        usage: VecDeque<SampleResult<Usage>>,
        calls: Vec<Instant>,
        delay: Duration,
    }

    impl Sampler for ScriptedSampler {
        async fn read_usage(&mut self) -> SampleResult<Usage> {
            self.calls.push(Instant::now());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.usage.pop_front().unwrap_or_else(|| {
                Err(SampleError::MetricUnavailable("permission denied".to_string()))
            })
        }

        async fn read_temperatures(&mut self) -> SampleResult<Temperatures> {
            Ok([("Tctl", 52.5), ("edge", 61.0)].into_iter().collect())
        }
    }

    fn usage(cpu_percent: f64, memory_mb: f64) -> SampleResult<Usage> {
        Ok(Usage {
            cpu_percent,
            memory_mb,
        })
    }

    fn test_timer(period: Duration) -> (watch::Sender<bool>, RefreshTimer) {
        let (tx, rx) = watch::channel(false);
        (tx, RefreshTimer::new(period, rx))
    }

    #[test]
    fn test_panel_default_placeholders() {
        let panel = Panel::default();
        assert_eq!(panel.cpu, "--%");
        assert_eq!(panel.memory, "-- MB");
        assert_eq!(panel.temperature, "Loading...");
    }

    #[test]
    fn test_panel_apply_sample() {
        let temps: Temperatures = [("coretemp-isa-0000", 45.0), ("edge", 61.25)]
            .into_iter()
            .collect();
        let sample = Sample::new(usage(42.0, 512.0), Ok(temps), 1638367200);

        let mut panel = Panel::default();
        panel.apply(&sample);

        assert_eq!(panel.cpu, "42.0%");
        assert_eq!(panel.memory, "512.0 MB");
        assert_eq!(panel.temperature, "coretemp-isa-0000: 45.0C\nedge: 61.25C");
        assert_eq!(panel.updated, "2021-12-01 14:00:00");
    }

    #[test]
    fn test_panel_apply_is_idempotent() {
        let temps: Temperatures = [("Tctl", 52.5)].into_iter().collect();
        let sample = Sample::new(usage(12.34, 2048.5), Ok(temps), 0);

        let mut panel = Panel::default();
        panel.apply(&sample);
        let first = panel.clone();
        panel.apply(&sample);
        assert_eq!(panel, first);
    }

    #[test]
    fn test_panel_keeps_usage_on_failure() {
        let mut panel = Panel::default();
        panel.apply(&Sample::new(usage(42.0, 512.0), Ok(Temperatures::new()), 0));

        let failed = Sample::new(
            Err(SampleError::MetricUnavailable("denied".to_string())),
            Ok([("Tctl", 52.5)].into_iter().collect()),
            0,
        );
        panel.apply(&failed);

        assert_eq!(panel.cpu, "42.0%");
        assert_eq!(panel.memory, "512.0 MB");
        assert_eq!(panel.temperature, TEMPERATURE_ERROR_TEXT);
    }

    #[test]
    fn test_panel_failure_before_first_success_keeps_placeholders() {
        let mut panel = Panel::default();
        panel.apply(&Sample::new(
            Err(SampleError::Unexpected("boom".to_string())),
            Ok(Temperatures::new()),
            0,
        ));
        assert_eq!(panel.cpu, "--%");
        assert_eq!(panel.memory, "-- MB");
        assert_eq!(panel.temperature, TEMPERATURE_ERROR_TEXT);
    }

    #[test]
    fn test_panel_degraded_temperatures_are_blank() {
        let mut panel = Panel::default();
        panel.apply(&Sample::new(
            usage(5.0, 100.0),
            Err(SampleError::UtilityMissing("sensors".to_string())),
            0,
        ));
        assert_eq!(panel.cpu, "5.0%");
        assert_eq!(panel.temperature, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_performs_eager_tick() {
        let sampler = ScriptedSampler {
            usage: VecDeque::from([usage(42.0, 512.0)]),
            ..Default::default()
        };
        let (_tx, timer) = test_timer(DEFAULT_REFRESH_INTERVAL);

        let display = DisplayLoop::start(sampler, RecordingScreen::default(), timer)
            .await
            .unwrap();

        assert_eq!(display.ticks(), 1);
        assert_eq!(display.state(), LoopState::Idle);
        assert_eq!(display.panel().cpu, "42.0%");
        assert_eq!(display.screen().frames.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_consecutive_failures() {
        let period = Duration::from_millis(1000);
        let sampler = ScriptedSampler {
            usage: VecDeque::from([usage(42.0, 512.0)]),
            ..Default::default()
        };
        let (tx, timer) = test_timer(period);

        let mut display = DisplayLoop::start(sampler, RecordingScreen::default(), timer)
            .await
            .unwrap();

        let stop = async {
            tokio::time::sleep(period * 10 + period / 2).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(display.run(), stop);
        result.unwrap();

        // 1 次立即刷新 + 10 次定时刷新，后 10 次全部失败
        assert_eq!(display.ticks(), 11);
        let calls = &display.sampler.calls;
        assert_eq!(calls.len(), 11);
        for pair in calls.windows(2) {
            assert_eq!(pair[1] - pair[0], period);
        }

        let last = display.panel();
        assert_eq!(last.cpu, "42.0%");
        assert_eq!(last.memory, "512.0 MB");
        assert_eq!(last.temperature, TEMPERATURE_ERROR_TEXT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_slow_tick() {
        let period = Duration::from_millis(1000);
        let sampler = ScriptedSampler {
            usage: VecDeque::from([usage(42.0, 512.0), usage(50.0, 600.0)]),
            delay: Duration::from_secs(5),
            ..Default::default()
        };
        let (tx, timer) = test_timer(period);

        let mut display = DisplayLoop::start(sampler, RecordingScreen::default(), timer)
            .await
            .unwrap();

        // 第二次刷新在 1 秒后开始，采样需要 5 秒
        let begin = Instant::now();
        let stop = async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(display.run(), stop);
        result.unwrap();

        assert_eq!(Instant::now() - begin, Duration::from_millis(1500));
        assert_eq!(display.sampler.calls.len(), 2);
        assert_eq!(display.ticks(), 1);
        assert_eq!(display.state(), LoopState::Idle);
        assert_eq!(display.screen().frames.len(), 1);
        assert_eq!(display.panel().cpu, "42.0%");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_immediately_when_already_stopped() {
        let (tx, timer) = test_timer(DEFAULT_REFRESH_INTERVAL);
        let mut display =
            DisplayLoop::start(ScriptedSampler::default(), RecordingScreen::default(), timer)
                .await
                .unwrap();

        tx.send(true).unwrap();
        let begin = Instant::now();
        display.run().await.unwrap();

        assert_eq!(Instant::now(), begin);
        assert_eq!(display.ticks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_sample_replaces_previous() {
        let sampler = ScriptedSampler {
            usage: VecDeque::from([usage(10.0, 100.0), usage(20.0, 200.0), usage(30.0, 300.0)]),
            ..Default::default()
        };
        let (_tx, timer) = test_timer(DEFAULT_REFRESH_INTERVAL);

        let mut display = DisplayLoop::start(sampler, RecordingScreen::default(), timer)
            .await
            .unwrap();
        display.tick().await.unwrap();
        display.tick().await.unwrap();

        let frames = &display.screen().frames;
        let cpus: Vec<_> = frames.iter().map(|frame| frame.cpu.as_str()).collect();
        assert_eq!(cpus, vec!["10.0%", "20.0%", "30.0%"]);
        assert_eq!(display.panel().memory, "300.0 MB");
    }

    #[tokio::test(start_paused = true)]
    async fn test_screen_failure_stops_loop() {
        let (_tx, timer) = test_timer(DEFAULT_REFRESH_INTERVAL);
        let screen = RecordingScreen {
            fail: true,
            ..Default::default()
        };

        let result = DisplayLoop::start(ScriptedSampler::default(), screen, timer).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_waits_full_period() {
        let period = Duration::from_millis(250);
        let (_tx, mut timer) = test_timer(period);

        let begin = Instant::now();
        assert!(timer.wait().await);
        assert_eq!(Instant::now() - begin, period);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_stops_on_shutdown() {
        let (tx, mut timer) = test_timer(Duration::from_secs(60));

        let begin = Instant::now();
        let stop = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(true).unwrap();
        };
        let (running, ()) = tokio::join!(timer.wait(), stop);

        assert!(!running);
        assert_eq!(Instant::now() - begin, Duration::from_secs(1));
        assert!(!timer.wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_without_shutdown_sender_keeps_ticking() {
        let (tx, mut timer) = test_timer(Duration::from_millis(100));
        drop(tx);

        assert!(timer.wait().await);
        assert!(timer.wait().await);
    }
}
