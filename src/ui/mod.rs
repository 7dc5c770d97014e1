use chrono::Local;
use colored::*;
use lazy_static::lazy_static;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warn,
    Error,
    Debug,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Success => "success",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Debug => "debug",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Level::Info => "[INFO]",
            Level::Success => "[ OK ]",
            Level::Warn => "[WARN]",
            Level::Error => "[FAIL]",
            Level::Debug => "[DBUG]",
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Level::Error | Level::Warn)
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

lazy_static! {
    static ref RENDERER: RwLock<Renderer> = RwLock::new(Renderer::default());
}

static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_debug_mode(enabled: bool) {
    DEBUG_MODE.store(enabled, Ordering::Relaxed);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

pub fn init(format: OutputFormat, color: bool) {
    if let Ok(mut r) = RENDERER.write() {
        r.format = format;
        r.color = color;
    }
}

pub mod nerd_font;
pub use nerd_font::NerdFont;

pub const SEPARATOR_HEAVY: &str = "━";
pub const SEPARATOR_LIGHT: &str = "─";

#[derive(Serialize)]
struct Event<'a> {
    time: String,
    level: &'a str,
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

fn colorize_prefix(level: Level, enable: bool) -> String {
    let s = level.prefix();
    if !enable {
        return s.to_string();
    }
    match level {
        Level::Info => s.blue().bold().to_string(),
        Level::Success => s.green().bold().to_string(),
        Level::Warn => s.yellow().bold().to_string(),
        Level::Error => s.red().bold().to_string(),
        Level::Debug => s.cyan().to_string(),
    }
}

fn render_text(level: Level, message: &str, color: bool) -> String {
    let stamp = Local::now().format("%H:%M:%S").to_string();
    let stamp = if color {
        stamp.dimmed().to_string()
    } else {
        stamp
    };
    format!("{} {} {}", stamp, colorize_prefix(level, color), message)
}

/// Emit one log event. `code` is a stable dotted identifier (`step.locale.skip`)
/// that only shows up in JSON mode.
pub fn emit(level: Level, code: &str, message: &str, data: Option<serde_json::Value>) {
    if level == Level::Debug && !is_debug_enabled() {
        return;
    }
    let r = RENDERER.read().map(|r| r.clone()).unwrap_or_default();
    let line = match r.format {
        OutputFormat::Text => render_text(level, message, r.color),
        OutputFormat::Json => {
            let ev = Event {
                time: Local::now().to_rfc3339(),
                level: level.as_str(),
                code,
                message,
                data,
            };
            match serde_json::to_string(&ev) {
                Ok(s) => s,
                Err(_) => return,
            }
        }
    };
    let mut out: Box<dyn Write> = if level.to_stderr() {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };
    let _ = writeln!(out, "{}", line);
}

pub fn get_output_format() -> OutputFormat {
    RENDERER
        .read()
        .map(|r| r.format)
        .unwrap_or(OutputFormat::Text)
}

pub fn separator(light: bool) {
    let r = RENDERER.read().map(|r| r.clone()).unwrap_or_default();
    // JSON consumers expect one object per line
    if matches!(r.format, OutputFormat::Json) {
        return;
    }
    let glyph = if light {
        SEPARATOR_LIGHT
    } else {
        SEPARATOR_HEAVY
    };
    let line = glyph.repeat(80);
    let _ = writeln!(
        io::stdout(),
        "{}",
        if r.color { line.dimmed().to_string() } else { line }
    );
}

pub mod prelude {
    pub use super::{Level, NerdFont, OutputFormat, emit, get_output_format, separator};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn text_line_carries_timestamp_and_prefix() {
        let line = render_text(Level::Warn, "sudoers not found", false);
        let mut parts = line.splitn(3, ' ');
        let stamp = parts.next().unwrap();
        assert_eq!(stamp.len(), 8);
        assert_eq!(stamp.matches(':').count(), 2);
        assert_eq!(parts.next(), Some("[WARN]"));
        assert_eq!(parts.next(), Some("sudoers not found"));
    }

    #[test]
    fn every_level_has_a_distinct_prefix() {
        let levels = [
            Level::Info,
            Level::Success,
            Level::Warn,
            Level::Error,
            Level::Debug,
        ];
        let mut prefixes: Vec<_> = levels.iter().map(|l| l.prefix()).collect();
        prefixes.dedup();
        assert_eq!(prefixes.len(), levels.len());
        assert!(Level::Error.to_stderr());
        assert!(!Level::Success.to_stderr());
    }

    #[test]
    #[serial]
    fn init_switches_the_global_format() {
        init(OutputFormat::Json, false);
        assert_eq!(get_output_format(), OutputFormat::Json);
        init(OutputFormat::Text, true);
        assert_eq!(get_output_format(), OutputFormat::Text);
    }

    #[test]
    #[serial]
    fn debug_lines_follow_the_debug_flag() {
        set_debug_mode(true);
        assert!(is_debug_enabled());
        set_debug_mode(false);
        assert!(!is_debug_enabled());
    }
}
