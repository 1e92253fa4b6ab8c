use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// 追加写入日志文件，warn 及以上同时输出到 stderr
pub struct Logger {
    file: Mutex<File>,
    level: LevelFilter,
}

impl Logger {
    pub fn new(log_path: &Path, level: LevelFilter) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Logger {
            file: Mutex::new(file),
            level,
        })
    }

    pub fn init(log_dir: &Path, level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(log_dir)?;
        let logger = Self::new(&log_dir.join("app.log"), level)?;
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(level);
        Ok(())
    }

    fn format_entry(record: &Record) -> String {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        format!(
            "[{}] [{}] [{}:{}] {}\n",
            timestamp,
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = Self::format_entry(record);
        if record.level() <= Level::Warn {
            eprint!("{}", entry);
        }
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(entry.as_bytes());
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}
