//! In-app console backing the `log` facade

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Environment variable that turns on debug output
pub const DEBUG_ENV: &str = "SIGNAGE_PANEL_DEBUG";

const MAX_LINES: usize = 500;

/// Shared handle to the console lines; cheap to clone
#[derive(Clone, Default)]
pub struct ConsoleLog {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl ConsoleLog {
    pub fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push_back(line);
            // Keep last 500 lines
            while lines.len() > MAX_LINES {
                lines.pop_front();
            }
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
        log::info!("Console cleared");
    }
}

pub fn format_line(time: &str, level: Level, message: &str) -> String {
    format!("[{}] [{}] {}", time, level, message)
}

struct ConsoleLogger {
    console: ConsoleLog,
    level: LevelFilter,
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // Dependencies (ureq, eframe) are noisy below warn
        metadata.level() <= self.level
            && (metadata.target().starts_with(env!("CARGO_CRATE_NAME")) || metadata.level() <= Level::Warn)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        let line = format_line(&time, record.level(), &record.args().to_string());
        if record.level() <= Level::Warn {
            eprintln!("{}", line);
        }
        self.console.push(line);
    }

    fn flush(&self) {}
}

/// Install the console as the global logger and return its handle
pub fn init() -> ConsoleLog {
    let console = ConsoleLog::default();
    let level = if std::env::var_os(DEBUG_ENV).is_some() { LevelFilter::Debug } else { LevelFilter::Info };

    let logger = ConsoleLogger { console: console.clone(), level };
    match log::set_boxed_logger(Box::new(logger)) {
        Ok(()) => log::set_max_level(level),
        Err(e) => eprintln!("Logger already installed: {}", e),
    }
    console
}
