//! 哈希字符串启发式分析
//!
//! 根据字符集与长度推断编码、位长与候选算法，并映射到建议的 hashcat 模式。
//! 纯字符串匹配，不做基于内容的消歧；非法输入一律归为 `Unknown`，不报错。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::OnceLock;

/// 算法名 → hashcat 模式列表（盐前置/盐后置等变体一并列出）。
const ALGORITHM_MODES: &[(&str, &[u32])] = &[
    ("MD5", &[0, 20, 10]),
    ("NTLM", &[1000]),
    ("SHA-1", &[100, 110, 120, 170]),
    ("RIPEMD-160", &[6000]),
    ("SHA-256", &[1400, 1410, 1420, 1470]),
];

/// 字符串编码分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashEncoding {
    Hex,
    Base64,
    Unknown,
}

impl std::fmt::Display for HashEncoding {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Hex => write!(f, "hex"),
            Self::Base64 => write!(f, "base64"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// 单个哈希的分析结果（一旦计算即不可变）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashAnalysis {
    pub input: String,
    pub length: usize,
    pub encoding: HashEncoding,
    /// 位长估计；仅当编码为 hex 时可得（4 × 字符数）。
    pub bits: Option<usize>,
    /// 是否检测到 `:` 分隔符（简单盐格式）。
    pub salt_detected: bool,
    pub candidates: Vec<String>,
    /// 建议的 hashcat 模式（集合语义，已去重，不保证保持表内顺序）。
    pub suggested_modes: Vec<u32>,
}

fn hex_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[0-9a-fA-F]+$").unwrap()
    })
}

fn base64_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[A-Za-z0-9+/=]+$").unwrap()
    })
}

/// 分析一个哈希字符串。幂等：相同输入得到相同结果。
#[must_use]
pub fn analyze(input: &str) -> HashAnalysis {
    let length = input.len();

    let encoding = if hex_regex().is_match(input) {
        HashEncoding::Hex
    } else if base64_regex().is_match(input) {
        HashEncoding::Base64
    } else {
        HashEncoding::Unknown
    };

    let bits = match encoding {
        HashEncoding::Hex => Some(length * 4),
        _ => None,
    };

    let candidates: Vec<String> = if encoding == HashEncoding::Hex {
        match length {
            32 => vec!["MD5".to_string(), "NTLM".to_string()],
            40 => vec!["SHA-1".to_string(), "RIPEMD-160".to_string()],
            64 => vec!["SHA-256".to_string()],
            _ => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let mut modes: BTreeSet<u32> = BTreeSet::new();
    for algo in &candidates {
        if let Some((_, algo_modes)) = ALGORITHM_MODES.iter().find(|(name, _)| name == algo) {
            modes.extend(algo_modes.iter().copied());
        }
    }

    HashAnalysis {
        input: input.to_string(),
        length,
        encoding,
        bits,
        salt_detected: input.contains(':'),
        candidates,
        suggested_modes: modes.into_iter().collect(),
    }
}

impl HashAnalysis {
    /// 生成固定宽度的边框报告（每个哈希一份）。
    #[must_use]
    pub fn to_report(&self) -> String {
        let border = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(&mut out, "{border}");
        let _ = writeln!(&mut out, "哈希分析");
        let _ = writeln!(&mut out, "{border}");
        let _ = writeln!(&mut out, "哈希: {}", self.input);
        let _ = writeln!(&mut out, "  长度: {} 字符", self.length);
        let _ = writeln!(&mut out, "  编码: {}", self.encoding);
        match self.bits {
            Some(bits) => {
                let _ = writeln!(&mut out, "  位长: {bits}");
            }
            None => {
                let _ = writeln!(&mut out, "  位长: unknown");
            }
        }
        let _ = writeln!(
            &mut out,
            "  含盐分隔符: {}",
            if self.salt_detected { "是" } else { "否" }
        );
        let _ = writeln!(&mut out, "  候选算法: {}", self.candidates.join(", "));
        let modes: Vec<String> = self.suggested_modes.iter().map(u32::to_string).collect();
        let _ = writeln!(&mut out, "  建议 hashcat 模式: {}", modes.join(", "));
        let _ = writeln!(&mut out, "{border}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_length_hex() {
        let result = analyze("5d41402abc4b2a76b9719d911017c592");
        assert_eq!(result.encoding, HashEncoding::Hex);
        assert_eq!(result.bits, Some(128));
        assert!(!result.salt_detected);
        assert_eq!(result.candidates, vec!["MD5", "NTLM"]);

        let modes: std::collections::BTreeSet<u32> =
            result.suggested_modes.iter().copied().collect();
        let expected: std::collections::BTreeSet<u32> = [0, 10, 20, 1000].into_iter().collect();
        assert_eq!(modes, expected);
        // 去重：模式列表里没有重复项
        assert_eq!(modes.len(), result.suggested_modes.len());
    }

    #[test]
    fn test_sha1_length_has_two_candidates() {
        let result = analyze("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert_eq!(result.encoding, HashEncoding::Hex);
        assert_eq!(result.bits, Some(160));
        assert_eq!(result.candidates, vec!["SHA-1", "RIPEMD-160"]);
        assert!(result.suggested_modes.contains(&100));
        assert!(result.suggested_modes.contains(&6000));
    }

    #[test]
    fn test_sha256_length_single_candidate() {
        let result =
            analyze("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
        assert_eq!(result.candidates, vec!["SHA-256"]);
        assert_eq!(result.suggested_modes, vec![1400, 1410, 1420, 1470]);
    }

    #[test]
    fn test_base64_alphabet_no_candidates() {
        let result = analyze("SGVsbG8gV29ybGQ=");
        assert_eq!(result.encoding, HashEncoding::Base64);
        assert_eq!(result.bits, None);
        assert!(result.candidates.is_empty());
        assert!(result.suggested_modes.is_empty());
    }

    #[test]
    fn test_foreign_characters_are_unknown() {
        let result = analyze("not a hash!");
        assert_eq!(result.encoding, HashEncoding::Unknown);
        assert_eq!(result.bits, None);
        assert!(result.candidates.is_empty());
        assert!(result.suggested_modes.is_empty());
    }

    #[test]
    fn test_empty_string_is_unknown() {
        let result = analyze("");
        assert_eq!(result.encoding, HashEncoding::Unknown);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn test_salted_input_detected() {
        // 含 `:` 的输入无法匹配 hex 全字符集，编码归为 unknown（与长度表无交集）
        let result = analyze("5d41402abc4b2a76b9719d911017c592:1234");
        assert!(result.salt_detected);
        assert_eq!(result.encoding, HashEncoding::Unknown);
    }

    #[test]
    fn test_unusual_hex_length_has_no_candidates() {
        let result = analyze("abcdef012345");
        assert_eq!(result.encoding, HashEncoding::Hex);
        assert_eq!(result.bits, Some(48));
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let a = analyze("5d41402abc4b2a76b9719d911017c592");
        let b = analyze("5d41402abc4b2a76b9719d911017c592");
        assert_eq!(a, b);
    }

    #[test]
    fn test_report_contains_fields() {
        let report = analyze("5d41402abc4b2a76b9719d911017c592").to_report();
        assert!(report.contains("========"));
        assert!(report.contains("MD5, NTLM"));
        assert!(report.contains("128"));
    }
}
