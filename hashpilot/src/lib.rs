//! `HashPilot` —— 哈希类型启发式识别与 hashcat 批量尝试调度。
//!
//! 三个入口：
//! - `analyze`：对哈希字符串（或逐行文件）做字符集/长度启发式分析，
//!   给出编码、位长、候选算法与建议的 hashcat 模式；
//! - `crack`：探测式破解流程，先用 `hashcat -hh` 确认有效模式再逐一尝试；
//! - `autocrack`：自动发现流程，固定模式表 + 更广的规则搜索路径。
//!
//! 核心调度在 [`driver::AttackDriver`]：无规则阶段 → 规则阶段，
//! 每次尝试后检查成功标记文件，首个非空标记立即终止。

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod analyzer;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod hashcat;
pub mod runlog;

pub use analyzer::{analyze, HashAnalysis, HashEncoding};
pub use config::{AppConfig, CrackSettings};
pub use driver::{AttackDriver, Outcome};
pub use runlog::RunLog;
