//! hashcat 集成：定位二进制、探测支持的模式、构建攻击命令行。
//!
//! 外部工具被视为黑盒，仅通过命令行参数与输出文件交互。
//! 命令行由固定 schema 的 [`HashcatAttack`] 生成，便于在不调用
//! 真实二进制的情况下单测参数契约。

use anyhow::{Context, Result};
use cmd_runner::{Executor, ToolCommand};
use hashpilot_constraints::{read_file_with_limit, ToolLimits};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const TOOL_NAME: &str = "hashcat";

/// 定位 hashcat 二进制：配置路径存在则直接使用，否则按 `PATH` 搜索。
///
/// # Errors
///
/// 当二进制不存在时返回错误（错误消息包含安装提示）。
pub fn locate(configured: &Path) -> Result<PathBuf> {
    cmd_runner::resolve_program(configured).with_context(|| {
        format!(
            "hashcat 不可用: {}（安装：Linux `apt install hashcat`；macOS `brew install hashcat`；Windows 从 hashcat.net 下载）",
            configured.display()
        )
    })
}

fn mode_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^\s*(\d+)\s+\|").unwrap()
    })
}

/// 从 hashcat 帮助输出解析模式表。
///
/// 匹配形如 `    900 | MD4                | Raw Hash` 的行，收集模式号集合。
#[must_use]
pub fn parse_mode_table(help_output: &str) -> BTreeSet<u32> {
    let mut modes = BTreeSet::new();
    for line in help_output.lines() {
        if let Some(caps) = mode_line_regex().captures(line) {
            if let Some(mode) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                modes.insert(mode);
            }
        }
    }
    modes
}

/// 调用 `hashcat -hh` 探测有效模式集合。
///
/// 任何执行失败都归结为空集合（由调用方决定是否致命）。
#[must_use]
pub fn probe_modes(
    exe: &Path,
    executor: &dyn Executor,
    limits: &ToolLimits,
) -> BTreeSet<u32> {
    let mut cmd = ToolCommand::new(exe);
    cmd.apply_limits(limits).arg("-hh");

    match executor.run(&cmd) {
        Ok(output) => parse_mode_table(&output.stdout_lossy()),
        Err(err) => {
            log::warn!("探测 hashcat 模式失败: {err}");
            BTreeSet::new()
        }
    }
}

/// 一次攻击尝试的完整命令 schema。
///
/// 攻击模式固定为字典直通（`-a 0`）；可选项仅覆盖本工具实际使用的子集。
#[derive(Debug, Clone)]
pub struct HashcatAttack {
    pub exe: PathBuf,
    pub mode: u32,
    pub rule: Option<PathBuf>,
    pub hash_file: PathBuf,
    pub wordlist: PathBuf,
    pub outfile: PathBuf,
    /// `--outfile-format` 值；`None` 则沿用 hashcat 默认格式。
    pub outfile_format: Option<u8>,
    pub potfile: Option<PathBuf>,
    /// `-w` 工作负载档位（1-4）。
    pub workload_profile: u8,
    pub optimized_kernel: bool,
    pub quiet: bool,
    pub force: bool,
}

impl HashcatAttack {
    /// 生成有序参数列表的可执行命令。
    #[must_use]
    pub fn to_command(
        &self,
        limits: &ToolLimits,
    ) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.exe.clone());
        cmd.apply_limits(limits);

        cmd.arg("-m").arg(self.mode.to_string());
        cmd.arg("-a").arg("0");
        cmd.arg("-w").arg(self.workload_profile.to_string());
        if self.optimized_kernel {
            cmd.arg("-O");
        }
        if self.force {
            cmd.arg("--force");
        }
        if self.quiet {
            cmd.arg("--quiet");
        }

        cmd.arg("--outfile").arg(&self.outfile);
        if let Some(format) = self.outfile_format {
            cmd.arg("--outfile-format").arg(format.to_string());
        }
        if let Some(ref potfile) = self.potfile {
            cmd.arg("--potfile-path").arg(potfile);
        }
        if let Some(ref rule) = self.rule {
            cmd.arg("-r").arg(rule);
        }

        cmd.arg(&self.hash_file);
        cmd.arg(&self.wordlist);

        cmd
    }
}

/// 成功标记检查：文件存在且去除空白后非空即视为已破解。
///
/// 读取失败（文件不存在、超限等）一律视为未破解。
#[must_use]
pub fn marker_is_set(
    path: &Path,
    max_bytes: u64,
) -> bool {
    match read_file_with_limit(path, max_bytes) {
        Ok(content) => !String::from_utf8_lossy(&content).trim().is_empty(),
        Err(err) => {
            log::debug!("读取成功标记失败（按未破解处理）: {err}");
            false
        }
    }
}

/// 运行开始前清空成功标记，避免上一轮残留内容造成假阳性。
///
/// # Errors
///
/// 当文件存在但无法写入时返回错误。
pub fn truncate_marker(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::write(path, b"")
            .with_context(|| format!("清空成功标记失败: {}", path.display()))?;
    }
    Ok(())
}
