//! 规则文件发现：递归扫描候选目录，收集 `.rule` 文件。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 在候选目录中递归收集规则文件。
///
/// - 不存在的目录静默跳过（不是错误）
/// - 按路径去重（保留首次发现的位置）
/// - `sorted` 为真时按字典序返回，否则保持发现顺序
#[must_use]
pub fn find_rule_files(
    dirs: &[PathBuf],
    sorted: bool,
) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut rules: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            log::debug!("规则目录不存在，跳过: {}", dir.display());
            continue;
        }

        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if !is_rule_file(entry.path()) {
                continue;
            }
            let path = entry.into_path();
            if seen.insert(path.clone()) {
                rules.push(path);
            }
        }
    }

    if sorted {
        rules.sort();
    }
    rules
}

fn is_rule_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rule")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "hashpilot_rules_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_finds_rules_recursively_and_ignores_other_files() {
        let dir = scratch_dir("recursive");
        fs::write(dir.join("best64.rule"), ":").unwrap();
        fs::write(dir.join("readme.txt"), "not a rule").unwrap();
        let sub = dir.join("extra");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("leetspeak.rule"), "sa4").unwrap();

        let rules = find_rule_files(&[dir.clone()], true);
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|p| is_rule_file(p)));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory_is_silently_skipped() {
        let missing = std::env::temp_dir().join("hashpilot_rules_definitely_missing");
        let rules = find_rule_files(&[missing], false);
        assert!(rules.is_empty());
    }

    #[test]
    fn test_duplicate_directories_deduplicate_paths() {
        let dir = scratch_dir("dedup");
        fs::write(dir.join("toggles.rule"), "t").unwrap();

        let rules = find_rule_files(&[dir.clone(), dir.clone()], false);
        assert_eq!(rules.len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sorted_order_is_lexicographic() {
        let dir = scratch_dir("sorted");
        fs::write(dir.join("b.rule"), "u").unwrap();
        fs::write(dir.join("a.rule"), "l").unwrap();

        let rules = find_rule_files(&[dir.clone()], true);
        let names: Vec<_> = rules
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.rule", "b.rule"]);

        let _ = fs::remove_dir_all(&dir);
    }
}
