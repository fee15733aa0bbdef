use crate::display::Panel;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use std::io::{self, Write};

/// 窗口标题
pub const TITLE: &str = "System Performance Monitor";

/// 面板最大宽度（列）
const MAX_WIDTH: usize = 40;

// 配色
const BG_COLOR: Color = Color::Rgb {
    r: 0x2B,
    g: 0x2B,
    b: 0x2B,
};
const FG_COLOR: Color = Color::Rgb {
    r: 0xFF,
    g: 0xFF,
    b: 0xFF,
};
const ACCENT_COLOR: Color = Color::Rgb {
    r: 0x4C,
    g: 0xAF,
    b: 0x50,
};
const MUTED_COLOR: Color = Color::Rgb {
    r: 0x9E,
    g: 0x9E,
    b: 0x9E,
};

/// 面板的显示面
pub trait Screen {
    /// 显示当前面板内容
    fn present(&mut self, panel: &Panel) -> io::Result<()>;
}

/// 行样式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    Title,
    Heading,
    Value,
    Blank,
    Footer,
}

/// 面板中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub text: String,
    pub style: RowStyle,
}

impl Row {
    #[inline]
    fn new(text: impl Into<String>, style: RowStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// 将面板排版为居中的文本行
pub fn render_rows(panel: &Panel, width: usize) -> Vec<Row> {
    let sections = [
        ("CPU Load", panel.cpu.as_str()),
        ("Memory Used", panel.memory.as_str()),
        ("Temperature", panel.temperature.as_str()),
    ];

    let mut rows = Vec::with_capacity(16);
    rows.push(Row::new(center(TITLE, width), RowStyle::Title));

    for (heading, value) in sections {
        rows.push(Row::new(String::new(), RowStyle::Blank));
        rows.push(Row::new(center(heading, width), RowStyle::Heading));
        if value.is_empty() {
            rows.push(Row::new(String::new(), RowStyle::Value));
        }
        for line in value.lines() {
            rows.push(Row::new(center(line, width), RowStyle::Value));
        }
    }

    rows.push(Row::new(String::new(), RowStyle::Blank));
    let footer = if panel.updated.is_empty() {
        "q: quit".to_string()
    } else {
        format!("{} UTC  q: quit", panel.updated)
    };
    rows.push(Row::new(center(&footer, width), RowStyle::Footer));

    rows
}

/// 在给定宽度内居中，超长文本按宽度截断
fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let left = (width - len) / 2;
    let right = width - len - left;
    format!("{}{text}{}", " ".repeat(left), " ".repeat(right))
}

/// 全屏终端面板
///
/// 创建时进入备用屏幕与 raw 模式，释放时恢复终端。
pub struct TerminalScreen<W: Write> {
    out: W,
    active: bool,
}

impl<W: Write> TerminalScreen<W> {
    /// 接管终端
    pub fn enter(mut out: W) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        if let Err(e) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(e);
        }
        Ok(Self { out, active: true })
    }

    /// 恢复终端，可重复调用
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.out, ResetColor, Show, LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }
}

impl<W: Write> Screen for TerminalScreen<W> {
    fn present(&mut self, panel: &Panel) -> io::Result<()> {
        let (cols, _) = terminal::size().unwrap_or((MAX_WIDTH as u16, 0));
        let width = usize::from(cols).clamp(1, MAX_WIDTH);

        queue!(
            self.out,
            SetBackgroundColor(BG_COLOR),
            Clear(ClearType::All)
        )?;

        for (y, row) in render_rows(panel, width).iter().enumerate() {
            let y = u16::try_from(y).unwrap_or(u16::MAX);
            queue!(self.out, MoveTo(0, y))?;
            match row.style {
                RowStyle::Title => queue!(
                    self.out,
                    SetBackgroundColor(ACCENT_COLOR),
                    SetForegroundColor(FG_COLOR),
                    SetAttribute(Attribute::Bold),
                    Print(&row.text),
                    SetAttribute(Attribute::Reset),
                    SetBackgroundColor(BG_COLOR)
                )?,
                RowStyle::Heading => queue!(
                    self.out,
                    SetForegroundColor(ACCENT_COLOR),
                    Print(&row.text)
                )?,
                RowStyle::Value | RowStyle::Blank => queue!(
                    self.out,
                    SetForegroundColor(FG_COLOR),
                    Print(&row.text)
                )?,
                RowStyle::Footer => queue!(
                    self.out,
                    SetForegroundColor(MUTED_COLOR),
                    Print(&row.text)
                )?,
            }
        }

        self.out.flush()
    }
}

impl<W: Write> Drop for TerminalScreen<W> {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// 逐行文本输出，用于非终端环境
pub struct PlainScreen<W: Write> {
    out: W,
}

impl<W: Write> PlainScreen<W> {
    #[inline]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[inline]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// 单行摘要
pub fn summary_line(panel: &Panel) -> String {
    let temperatures = panel.temperature.lines().collect::<Vec<_>>().join(", ");
    format!(
        "[{}] CPU Load: {} | Memory Used: {} | Temperature: {}",
        panel.updated, panel.cpu, panel.memory, temperatures
    )
}

impl<W: Write> Screen for PlainScreen<W> {
    fn present(&mut self, panel: &Panel) -> io::Result<()> {
        writeln!(self.out, "{}", summary_line(panel))?;
        self.out.flush()
    }
}
