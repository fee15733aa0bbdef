use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// 键盘轮询间隔，也是按键线程响应关闭信号的最大延迟
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 关闭信号
///
/// 可在多个任务间共享；触发后所有订阅者都会看到 `true`。
#[derive(Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// 请求关闭，可重复调用
    #[inline]
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// 是否为退出按键：`q`、`Esc` 或 `Ctrl+C`
pub fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// 在阻塞线程中监听键盘，按下退出键时触发关闭
///
/// 关闭信号被其他来源触发后线程自行退出。
pub fn spawn_key_watcher(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !shutdown.is_triggered() {
            match event::poll(POLL_INTERVAL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if is_quit_key(&key) => {
                        info!("收到退出按键，正在关闭...");
                        shutdown.trigger();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("读取终端输入失败: {e}");
                        return;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("监听终端输入失败: {e}");
                    return;
                }
            }
        }
    })
}

/// 会请求关闭的进程信号
///
/// 在创建时立即注册，注册之后到达的信号不会丢失。
#[cfg(unix)]
struct TerminationSignals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn register() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// 等待任一信号，返回信号名称
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
        }
    }
}

#[cfg(windows)]
struct TerminationSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl TerminationSignals {
    fn register() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "Ctrl+C"
    }
}

/// 监听终止信号并触发关闭
///
/// Unix 上为 SIGINT、SIGTERM 和 SIGHUP，Windows 上为 Ctrl+C。
pub fn spawn_signal_watcher(shutdown: Shutdown) -> JoinHandle<()> {
    let signals = TerminationSignals::register();
    tokio::spawn(async move {
        match signals {
            Ok(mut signals) => {
                let name = signals.recv().await;
                info!("收到 {name} 信号，正在关闭...");
                shutdown.trigger();
            }
            Err(e) => warn!("无法监听中断信号: {e}"),
        }
    })
}
