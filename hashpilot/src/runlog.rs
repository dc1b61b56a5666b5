//! 运行日志（run journal）。
//!
//! 驱动的每次状态转移与每次尝试都会写一行带时间戳的记录，
//! 同时回显到控制台并追加到日志文件（逐行 flush，从不轮转/截断）。
//! 日志是注入的协作对象：测试中用内存 sink 捕获行进行断言。
//! 写入失败只降级为 `log::warn!`，绝不中断运行。

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, Once};

enum Sink {
    /// 追加写入文件并回显 stdout。
    File(Mutex<File>),
    /// 仅在内存中捕获（测试用）。
    Memory(Mutex<Vec<String>>),
}

pub struct RunLog {
    sink: Sink,
}

impl RunLog {
    /// 打开（或创建）追加式日志文件。
    ///
    /// # Errors
    ///
    /// 当文件无法创建或打开时返回错误。
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("打开日志文件失败: {}", path.display()))?;
        Ok(Self {
            sink: Sink::File(Mutex::new(file)),
        })
    }

    /// 内存 sink：不落盘、不回显，行可通过 [`RunLog::lines`] 取回。
    #[must_use]
    pub fn memory() -> Self {
        Self {
            sink: Sink::Memory(Mutex::new(Vec::new())),
        }
    }

    /// 写一行带时间戳的记录。
    pub fn line(
        &self,
        message: &str,
    ) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{timestamp}] {message}");

        match &self.sink {
            Sink::File(file) => {
                println!("{line}");
                match file.lock() {
                    Ok(mut file) => {
                        if let Err(err) = writeln!(file, "{line}").and_then(|()| file.flush()) {
                            log::warn!("写入日志文件失败: {err}");
                        }
                    }
                    Err(_) => log::warn!("日志文件锁被污染，丢弃一行记录"),
                }
            }
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
        }
    }

    /// 取回内存 sink 捕获的所有行；文件 sink 返回空。
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match &self.sink {
            Sink::Memory(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            Sink::File(_) => Vec::new(),
        }
    }
}

struct SimpleStdoutLogger;

impl log::Log for SimpleStdoutLogger {
    fn enabled(
        &self,
        metadata: &log::Metadata<'_>,
    ) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(
        &self,
        record: &log::Record<'_>,
    ) {
        if !self.enabled(record.metadata()) {
            return;
        }
        println!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: SimpleStdoutLogger = SimpleStdoutLogger;
static LOGGER_INIT: Once = Once::new();

/// 初始化 `log` 门面到简单 stdout 输出（可重复调用）。
pub fn init_stdout_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(log::LevelFilter::Info));
    });
}
