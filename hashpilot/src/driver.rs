//! 攻击调度器：无规则阶段 → 规则阶段的顺序尝试状态机。
//!
//! 流程：前置检查（输入文件、二进制、可选的模式探测）→ 清空成功标记 →
//! 逐模式无规则尝试 → 模式 × 规则全组合尝试。每次尝试后检查成功标记，
//! 首个非空标记立即终止。单次尝试的失败（超时、非零退出、启动失败）
//! 只记录并继续，从不重试、从不致命。
//!
//! 协作对象全部注入：配置、执行器、运行日志、中断标志。

use anyhow::{bail, Result};
use cmd_runner::Executor;
use hashpilot_constraints::{ResourceLimits, ToolLimits};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::CrackSettings;
use crate::discovery::find_rule_files;
use crate::hashcat::{self, HashcatAttack};
use crate::runlog::RunLog;

/// 一次完整运行的终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 成功标记非空，已破解。
    Cracked,
    /// 组合空间耗尽，未破解。
    Exhausted,
    /// 收到中断信号，提前停止。
    Interrupted,
}

pub struct AttackDriver<'a> {
    settings: &'a CrackSettings,
    resources: &'a ResourceLimits,
    executor: &'a dyn Executor,
    journal: &'a RunLog,
    interrupt: &'a AtomicBool,
}

struct Counters {
    /// 已发起的攻击尝试次数（不含 `-hh` 探测）。
    attempts: u64,
    /// 其中以成功退出码结束的次数。
    successful: u64,
}

impl<'a> AttackDriver<'a> {
    #[must_use]
    pub const fn new(
        settings: &'a CrackSettings,
        resources: &'a ResourceLimits,
        executor: &'a dyn Executor,
        journal: &'a RunLog,
        interrupt: &'a AtomicBool,
    ) -> Self {
        Self {
            settings,
            resources,
            executor,
            journal,
            interrupt,
        }
    }

    /// 执行完整流程。`probe` 为真时先用 `-hh` 探测有效模式，
    /// 并跳过不在探测集合中的候选模式（探测结果为空则致命）。
    ///
    /// # Errors
    ///
    /// 当前置条件不满足（输入文件缺失、二进制不可用、探测结果为空）
    /// 或成功标记无法清空时返回错误；尝试阶段本身从不返回错误。
    pub fn run(
        &self,
        probe: bool,
    ) -> Result<Outcome> {
        let limits = self
            .resources
            .external_tools
            .for_tool(hashcat::TOOL_NAME);

        // 前置检查：两个输入文件都要报告后才失败
        let mut missing = false;
        if !self.settings.hash_file.exists() {
            self.journal.line(&format!(
                "错误: 哈希文件不存在: {}",
                self.settings.hash_file.display()
            ));
            missing = true;
        }
        if !self.settings.wordlist.exists() {
            self.journal.line(&format!(
                "错误: 字典文件不存在: {}",
                self.settings.wordlist.display()
            ));
            missing = true;
        }
        if missing {
            bail!("输入文件缺失，终止运行");
        }

        let exe = match hashcat::locate(&self.settings.hashcat_path) {
            Ok(exe) => exe,
            Err(err) => {
                self.journal.line(&format!("错误: {err:#}"));
                return Err(err);
            }
        };
        self.journal
            .line(&format!("使用 hashcat: {}", exe.display()));

        let rules = find_rule_files(
            &self.settings.expanded_rule_search_paths(),
            self.settings.sorted_rules,
        );
        if rules.is_empty() {
            self.journal.line("警告: 未发现任何规则文件，规则阶段将被跳过");
        } else {
            self.journal
                .line(&format!("发现 {} 个规则文件", rules.len()));
        }

        let probed = if probe {
            let modes = hashcat::probe_modes(&exe, self.executor, &limits);
            if modes.is_empty() {
                self.journal.line("错误: 未能从 hashcat 帮助输出探测到任何模式");
                bail!("hashcat 模式探测失败");
            }
            self.journal
                .line(&format!("探测到 {} 个有效 hashcat 模式", modes.len()));
            Some(modes)
        } else {
            None
        };

        // 清空上一轮残留的成功标记，避免假阳性
        let marker = self.settings.marker_path();
        hashcat::truncate_marker(marker)?;

        let mut counters = Counters {
            attempts: 0,
            successful: 0,
        };

        // 无规则阶段
        for &mode in &self.settings.candidate_modes {
            if let Some(outcome) =
                self.try_one(&exe, mode, None, &limits, probed.as_ref(), &mut counters)?
            {
                return Ok(outcome);
            }
        }

        // 规则阶段：模式 × 规则全组合
        for &mode in &self.settings.candidate_modes {
            for rule in &rules {
                if let Some(outcome) = self.try_one(
                    &exe,
                    mode,
                    Some(rule),
                    &limits,
                    probed.as_ref(),
                    &mut counters,
                )? {
                    return Ok(outcome);
                }
            }
        }

        self.journal.line(&format!(
            "组合空间已耗尽，未破解。共 {} 次尝试，{} 次成功退出",
            counters.attempts, counters.successful
        ));
        Ok(Outcome::Exhausted)
    }

    /// 执行一次尝试并检查成功标记。
    /// 返回 `Some(outcome)` 表示运行应当终止（破解成功或被中断）。
    fn try_one(
        &self,
        exe: &Path,
        mode: u32,
        rule: Option<&PathBuf>,
        limits: &ToolLimits,
        probed: Option<&std::collections::BTreeSet<u32>>,
        counters: &mut Counters,
    ) -> Result<Option<Outcome>> {
        if self.interrupt.load(Ordering::SeqCst) {
            self.journal.line(&format!(
                "收到中断信号，停止。共 {} 次尝试，{} 次成功退出",
                counters.attempts, counters.successful
            ));
            return Ok(Some(Outcome::Interrupted));
        }

        if let Some(valid) = probed {
            if !valid.contains(&mode) {
                self.journal
                    .line(&format!("模式 {mode} 不在探测集合中，跳过"));
                return Ok(None);
            }
        }

        counters.attempts += 1;
        match rule {
            Some(rule) => self.journal.line(&format!(
                "尝试 #{}: 模式 {mode} + 规则 {}",
                counters.attempts,
                rule.display()
            )),
            None => self
                .journal
                .line(&format!("尝试 #{}: 模式 {mode}（无规则）", counters.attempts)),
        }

        let attack = HashcatAttack {
            exe: exe.to_path_buf(),
            mode,
            rule: rule.cloned(),
            hash_file: self.settings.hash_file.clone(),
            wordlist: self.settings.wordlist.clone(),
            outfile: self.settings.output_file.clone(),
            outfile_format: self.settings.outfile_format,
            potfile: self.settings.potfile.clone(),
            workload_profile: self.settings.workload_profile,
            optimized_kernel: self.settings.optimized_kernel,
            quiet: self.settings.quiet,
            force: self.settings.force,
        };

        match self.executor.run(&attack.to_command(limits)) {
            Ok(output) if output.timed_out => {
                self.journal.line(&format!(
                    "尝试超时（{} 秒上限），继续下一组合",
                    limits.timeout_seconds
                ));
            }
            Ok(output) => {
                if output.success {
                    counters.successful += 1;
                } else {
                    self.journal.line(&format!(
                        "尝试失败（退出码 {}），继续下一组合",
                        output
                            .code
                            .map_or_else(|| "无".to_string(), |c| c.to_string())
                    ));
                }
            }
            Err(err) => {
                self.journal
                    .line(&format!("命令执行出错: {err:#}，继续下一组合"));
            }
        }

        // 成功标记独立于退出码：失败的退出码不代表没破解
        let marker = self.settings.marker_path();
        if hashcat::marker_is_set(marker, self.resources.input_max_bytes) {
            self.journal.line(&format!(
                "已破解！结果见 {}。共 {} 次尝试，{} 次成功退出",
                marker.display(),
                counters.attempts,
                counters.successful
            ));
            return Ok(Some(Outcome::Cracked));
        }

        Ok(None)
    }
}
