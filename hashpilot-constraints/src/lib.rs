//! `HashPilot` 全局资源与安全约束模型。
//!
//! 目标：
//! - 统一“输入文件大小、外部命令 timeout、stdout/stderr 截断”的语义与默认值
//! - 为所有子模块提供同一份可序列化/可配置的约束结构
//! - 提供通用的受限读取工具函数，避免局部散落的 `read_to_end` OOM 风险

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const MIB: u64 = 1024 * 1024;

#[derive(Debug)]
pub enum ResourceLimitError {
    TooLarge {
        what: &'static str,
        actual: u64,
        max: u64,
    },
}

impl std::fmt::Display for ResourceLimitError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::TooLarge { what, actual, max } => {
                write!(f, "{what} 超过上限: 实际 {actual} bytes > 上限 {max} bytes")
            }
        }
    }
}

impl std::error::Error for ResourceLimitError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolLimits {
    /// 0 表示不设置 timeout（允许长时间运行）。
    #[serde(default = "default_tool_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_tool_stdout_max_bytes")]
    pub stdout_max_bytes: u64,
    #[serde(default = "default_tool_stderr_max_bytes")]
    pub stderr_max_bytes: u64,
}

const fn default_tool_timeout_seconds() -> u64 {
    60
}

const fn default_tool_stdout_max_bytes() -> u64 {
    MIB
}

const fn default_tool_stderr_max_bytes() -> u64 {
    MIB
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            timeout_seconds: default_tool_timeout_seconds(),
            stdout_max_bytes: default_tool_stdout_max_bytes(),
            stderr_max_bytes: default_tool_stderr_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalToolsLimits {
    #[serde(default)]
    pub default: ToolLimits,
    #[serde(default)]
    pub overrides: HashMap<String, ToolLimits>,
}

impl Default for ExternalToolsLimits {
    fn default() -> Self {
        let mut overrides = HashMap::new();
        // 单次攻击尝试允许运行 5 分钟；--help 探测仍走 default（60s）。
        overrides.insert(
            "hashcat".to_string(),
            ToolLimits {
                timeout_seconds: 300,
                stdout_max_bytes: 4 * MIB,
                stderr_max_bytes: 4 * MIB,
            },
        );
        Self {
            default: ToolLimits::default(),
            overrides,
        }
    }
}

impl ExternalToolsLimits {
    #[must_use]
    pub fn for_tool(
        &self,
        tool_name: &str,
    ) -> ToolLimits {
        self.overrides
            .get(tool_name)
            .copied()
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default = "default_input_max_bytes")]
    pub input_max_bytes: u64,
    #[serde(default)]
    pub external_tools: ExternalToolsLimits,
}

const fn default_input_max_bytes() -> u64 {
    100 * MIB
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            input_max_bytes: default_input_max_bytes(),
            external_tools: ExternalToolsLimits::default(),
        }
    }
}

/// 从文件读取（硬上限：超过即报错）。
///
/// # Errors
///
/// - 当读取元数据或读取文件失败时返回错误。
/// - 当文件大小超过 `max_bytes` 时返回 [`ResourceLimitError::TooLarge`]。
pub fn read_file_with_limit(
    path: &Path,
    max_bytes: u64,
) -> anyhow::Result<Vec<u8>> {
    let meta = std::fs::metadata(path)?;
    let len = meta.len();
    if len > max_bytes {
        return Err(ResourceLimitError::TooLarge {
            what: "输入文件",
            actual: len,
            max: max_bytes,
        }
        .into());
    }
    Ok(std::fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_tool_returns_hashcat_override() {
        let limits = ExternalToolsLimits::default();
        let hashcat = limits.for_tool("hashcat");
        assert_eq!(hashcat.timeout_seconds, 300);
        assert_eq!(hashcat.stdout_max_bytes, 4 * MIB);
    }

    #[test]
    fn test_for_tool_falls_back_to_default() {
        let limits = ExternalToolsLimits::default();
        let other = limits.for_tool("john");
        assert_eq!(other, ToolLimits::default());
    }

    #[test]
    fn test_read_file_with_limit_rejects_large_file() {
        use std::time::{SystemTime, UNIX_EPOCH};

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "hashpilot_limit_test_{}_{}.txt",
            std::process::id(),
            nanos
        ));
        std::fs::write(&path, b"0123456789").unwrap();

        assert!(read_file_with_limit(&path, 4).is_err());
        assert_eq!(read_file_with_limit(&path, 10).unwrap(), b"0123456789");

        let _ = std::fs::remove_file(&path);
    }
}
