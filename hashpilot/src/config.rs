//! TOML 配置：两种破解流程的默认参数与全局资源约束。
//!
//! `[crack]` 对应探测式流程（先 `-hh` 探测有效模式），
//! `[autocrack]` 对应自动发现流程（固定模式表 + 更广的规则搜索路径）。
//! 两者共用同一个 [`CrackSettings`] 结构，仅默认值不同。

use anyhow::{bail, Result};
use hashpilot_constraints::ResourceLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "HASHPILOT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub crack: CrackSettings,
    #[serde(default = "CrackSettings::auto")]
    pub autocrack: CrackSettings,
    /// 全局资源与安全约束（输入文件大小、外部命令 timeout/截断等）。
    #[serde(default)]
    pub resources: ResourceLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            crack: CrackSettings::default(),
            autocrack: CrackSettings::auto(),
            resources: ResourceLimits::default(),
        }
    }
}

/// 一次完整破解流程的全部参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackSettings {
    #[serde(default = "default_hash_file")]
    pub hash_file: PathBuf,
    #[serde(default = "default_wordlist")]
    pub wordlist: PathBuf,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_hashcat_path")]
    pub hashcat_path: PathBuf,
    /// 候选模式，按此顺序逐一尝试。
    #[serde(default = "default_candidate_modes")]
    pub candidate_modes: Vec<u32>,
    #[serde(default = "default_rule_search_paths")]
    pub rule_search_paths: Vec<PathBuf>,
    /// 规则按字典序尝试；为假时保持发现顺序。
    #[serde(default)]
    pub sorted_rules: bool,
    /// 设置时以 potfile 作为成功标记文件，否则以 `output_file` 为准。
    #[serde(default = "default_potfile")]
    pub potfile: Option<PathBuf>,
    #[serde(default = "default_outfile_format")]
    pub outfile_format: Option<u8>,
    #[serde(default = "default_workload_profile")]
    pub workload_profile: u8,
    #[serde(default = "default_true")]
    pub optimized_kernel: bool,
    #[serde(default = "default_true")]
    pub quiet: bool,
    #[serde(default)]
    pub force: bool,
}

fn default_hash_file() -> PathBuf {
    PathBuf::from("hash.txt")
}
fn default_wordlist() -> PathBuf {
    PathBuf::from("rockyou.txt")
}
fn default_output_file() -> PathBuf {
    PathBuf::from("cracked.txt")
}
fn default_log_file() -> PathBuf {
    PathBuf::from("hashcrack.log")
}
fn default_hashcat_path() -> PathBuf {
    PathBuf::from("hashcat")
}
fn default_candidate_modes() -> Vec<u32> {
    vec![170, 6000, 4500, 4700, 18500, 100, 300]
}
fn default_rule_search_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/local/share/doc/hashcat/rules"),
        PathBuf::from("~/.hashcat/rules"),
        PathBuf::from("/opt/hashcat/rules"),
    ]
}
fn default_potfile() -> Option<PathBuf> {
    Some(PathBuf::from("hashcat.potfile"))
}
const fn default_outfile_format() -> Option<u8> {
    Some(2)
}
const fn default_workload_profile() -> u8 {
    4
}
const fn default_true() -> bool {
    true
}

impl Default for CrackSettings {
    fn default() -> Self {
        Self {
            hash_file: default_hash_file(),
            wordlist: default_wordlist(),
            output_file: default_output_file(),
            log_file: default_log_file(),
            hashcat_path: default_hashcat_path(),
            candidate_modes: default_candidate_modes(),
            rule_search_paths: default_rule_search_paths(),
            sorted_rules: false,
            potfile: default_potfile(),
            outfile_format: default_outfile_format(),
            workload_profile: default_workload_profile(),
            optimized_kernel: true,
            quiet: true,
            force: false,
        }
    }
}

impl CrackSettings {
    /// 自动发现流程的默认参数：固定模式表、更广的规则搜索、
    /// 规则按字典序、`--force`、不使用 potfile（以输出文件为成功标记）。
    #[must_use]
    pub fn auto() -> Self {
        Self {
            candidate_modes: vec![170, 6000, 300, 4500, 4700, 18500, 100],
            rule_search_paths: vec![
                PathBuf::from("/usr/share/hashcat"),
                PathBuf::from("/usr/local/share/hashcat"),
                PathBuf::from("/usr/local/share/doc/hashcat"),
                PathBuf::from("/usr/share/doc/hashcat"),
                PathBuf::from("~/.hashcat"),
                PathBuf::from("/opt/hashcat"),
            ],
            sorted_rules: true,
            potfile: None,
            outfile_format: None,
            quiet: false,
            force: true,
            ..Self::default()
        }
    }

    /// 成功标记文件：有 potfile 时为 potfile，否则为输出文件。
    #[must_use]
    pub fn marker_path(&self) -> &Path {
        self.potfile.as_deref().unwrap_or(&self.output_file)
    }

    /// 展开规则搜索路径中的 `~` 前缀（无 HOME 时原样保留）。
    #[must_use]
    pub fn expanded_rule_search_paths(&self) -> Vec<PathBuf> {
        self.rule_search_paths
            .iter()
            .map(|p| expand_home(p))
            .collect()
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// 从 TOML 配置文件加载配置。
    ///
    /// # Errors
    ///
    /// 当读取文件失败或 TOML 解析失败时返回错误。
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// 依次尝试：显式路径 → `HASHPILOT_CONFIG` → 默认路径 → 编译期默认值。
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> Self {
        path.and_then(|p| Self::load(p).ok())
            .or_else(|| {
                std::env::var_os(CONFIG_ENV_VAR)
                    .map(PathBuf::from)
                    .and_then(|p| Self::load(&p).ok())
            })
            .or_else(|| Self::load(&Self::default_config_path()).ok())
            .unwrap_or_default()
    }

    /// 将配置保存为 TOML 文件。
    ///
    /// # Errors
    ///
    /// 当创建父目录、序列化或写入文件失败时返回错误。
    pub fn save(
        &self,
        path: &Path,
    ) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        config_base_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hashpilot")
            .join("config.toml")
    }

    /// 基础配置校验（防止明显的无效值进入运行态）。
    ///
    /// # Errors
    ///
    /// 当配置字段不满足基本约束时返回错误。
    pub fn validate(&self) -> Result<()> {
        for (section, settings) in [("crack", &self.crack), ("autocrack", &self.autocrack)] {
            if settings.candidate_modes.is_empty() {
                bail!("{section}.candidate_modes 不能为空");
            }
            if !(1..=4).contains(&settings.workload_profile) {
                bail!("{section}.workload_profile 必须在 1~4 范围内");
            }
        }
        if self
            .resources
            .external_tools
            .for_tool(crate::hashcat::TOOL_NAME)
            .timeout_seconds
            == 0
        {
            bail!("hashcat 的 timeout_seconds 不能为 0（单次尝试必须有界）");
        }
        if self.resources.input_max_bytes == 0 {
            bail!("resources.input_max_bytes 不能为 0");
        }

        Ok(())
    }

    #[must_use]
    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn config_base_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(dir);
    }

    #[cfg(windows)]
    {
        if let Some(dir) = std::env::var_os("APPDATA").map(PathBuf::from) {
            return Some(dir);
        }
    }

    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(
            config.crack.candidate_modes,
            vec![170, 6000, 4500, 4700, 18500, 100, 300]
        );
        assert_eq!(
            config.autocrack.candidate_modes,
            vec![170, 6000, 300, 4500, 4700, 18500, 100]
        );
    }

    #[test]
    fn test_marker_path_prefers_potfile() {
        let probing = CrackSettings::default();
        assert_eq!(probing.marker_path(), Path::new("hashcat.potfile"));

        let auto = CrackSettings::auto();
        assert_eq!(auto.marker_path(), Path::new("cracked.txt"));
    }

    #[test]
    fn test_auto_variant_diverges_from_probing_defaults() {
        let auto = CrackSettings::auto();
        assert!(auto.sorted_rules);
        assert!(auto.force);
        assert!(!auto.quiet);
        assert!(auto.potfile.is_none());
        assert_eq!(auto.rule_search_paths.len(), 6);
    }

    #[test]
    fn test_validate_rejects_empty_mode_list() {
        let mut config = AppConfig::default();
        config.crack.candidate_modes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_hashcat_timeout() {
        let mut config = AppConfig::default();
        config
            .resources
            .external_tools
            .overrides
            .insert(
                crate::hashcat::TOOL_NAME.to_string(),
                hashpilot_constraints::ToolLimits {
                    timeout_seconds: 0,
                    ..hashpilot_constraints::ToolLimits::default()
                },
            );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_preserves_settings() {
        let mut config = AppConfig::default();
        config.crack.candidate_modes = vec![0, 1000];
        config.autocrack.force = false;

        let toml_text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_text).unwrap();
        assert_eq!(parsed.crack.candidate_modes, vec![0, 1000]);
        assert!(!parsed.autocrack.force);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
[crack]
hash_file = "ntlm.txt"
"#,
        )
        .unwrap();
        assert_eq!(parsed.crack.hash_file, PathBuf::from("ntlm.txt"));
        assert_eq!(parsed.crack.wordlist, PathBuf::from("rockyou.txt"));
        // 缺省的 [autocrack] 段回落到自动发现默认值
        assert!(parsed.autocrack.sorted_rules);
    }
}
