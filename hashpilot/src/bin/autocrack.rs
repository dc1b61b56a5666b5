//! 自动发现破解入口：按 `PATH` 定位 hashcat，固定模式表 + 广域规则搜索。

use cmd_runner::SystemExecutor;
use hashpilot::runlog::init_stdout_logger;
use hashpilot::{AppConfig, AttackDriver, Outcome, RunLog};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    init_stdout_logger();

    let config = AppConfig::load_or_default(None);
    if let Err(err) = config.validate() {
        log::error!("配置无效: {err:#}");
        std::process::exit(1);
    }

    let journal = match RunLog::open(&config.autocrack.log_file) {
        Ok(journal) => journal,
        Err(err) => {
            log::error!("{err:#}");
            std::process::exit(1);
        }
    };

    let interrupt = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&interrupt);
    if let Err(err) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        log::warn!("注册中断处理器失败: {err}");
    }

    let executor = SystemExecutor;
    let driver = AttackDriver::new(
        &config.autocrack,
        &config.resources,
        &executor,
        &journal,
        &interrupt,
    );

    match driver.run(false) {
        Ok(Outcome::Cracked | Outcome::Exhausted) => {}
        Ok(Outcome::Interrupted) => std::process::exit(1),
        Err(err) => {
            log::error!("运行失败: {err:#}");
            std::process::exit(1);
        }
    }
}
