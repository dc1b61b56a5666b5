//! 哈希分析入口：对单个哈希或逐行文件输出分析报告。

use anyhow::Result;
use hashpilot::runlog::init_stdout_logger;
use hashpilot::{analyze, AppConfig};
use hashpilot_constraints::read_file_with_limit;
use std::path::Path;

fn main() {
    init_stdout_logger();

    let mut args = std::env::args().skip(1);
    let (Some(target), None) = (args.next(), args.next()) else {
        eprintln!("用法: analyze <哈希字符串或文件路径>");
        std::process::exit(1);
    };

    if let Err(err) = run(&target) {
        log::error!("分析失败: {err:#}");
        std::process::exit(1);
    }
}

fn run(target: &str) -> Result<()> {
    let config = AppConfig::load_or_default(None);
    let path = Path::new(target);

    if path.is_file() {
        // 文件输入：每个非空行一份报告
        let content = read_file_with_limit(path, config.resources.input_max_bytes)?;
        for line in String::from_utf8_lossy(&content).lines() {
            let hash = line.trim();
            if hash.is_empty() {
                continue;
            }
            print!("{}", analyze(hash).to_report());
        }
    } else {
        print!("{}", analyze(target.trim()).to_report());
    }

    Ok(())
}
