//! # 任务目录收集器
//!
//! 找出运行目录下含 OUTCAR 且名字匹配模式的任务目录。
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配目录名

use crate::error::{Result, TwinflowError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 任务目录收集器
pub struct TaskDirCollector {
    root: PathBuf,
    patterns: Vec<glob::Pattern>,
    recursive: bool,
}

impl TaskDirCollector {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            patterns: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    TwinflowError::InvalidArgument(format!("Invalid pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的任务目录（按路径排序）
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(TwinflowError::DirectoryNotFound {
                path: self.root.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut dirs: Vec<PathBuf> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter(|e| e.path().join("OUTCAR").is_file())
            .filter(|e| self.matches_patterns(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        dirs.sort();
        Ok(dirs)
    }

    fn matches_patterns(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn task(root: &Path, name: &str, with_outcar: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if with_outcar {
            fs::write(dir.join("OUTCAR"), "").unwrap();
        }
    }

    #[test]
    fn test_collect_task_dirs() {
        let root = tempfile::tempdir().unwrap();
        task(root.path(), "rlx_shear_001", true);
        task(root.path(), "rlx_shear_000", true);
        task(root.path(), "ph_shear_000", true);
        task(root.path(), "structures", false);

        let all = TaskDirCollector::new(root.path().to_path_buf()).collect().unwrap();
        assert_eq!(all.len(), 3);

        let relax = TaskDirCollector::new(root.path().to_path_buf())
            .with_pattern("rlx_*")
            .unwrap()
            .collect()
            .unwrap();
        let names: Vec<_> = relax
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["rlx_shear_000", "rlx_shear_001"]);
    }

    #[test]
    fn test_recursive_and_invalid_pattern() {
        let root = tempfile::tempdir().unwrap();
        task(&root.path().join("tb"), "relax_twinboundary", true);

        let flat = TaskDirCollector::new(root.path().to_path_buf()).collect().unwrap();
        assert!(flat.is_empty());
        let deep = TaskDirCollector::new(root.path().to_path_buf())
            .recursive(true)
            .collect()
            .unwrap();
        assert_eq!(deep.len(), 1);

        assert!(TaskDirCollector::new(root.path().to_path_buf())
            .with_pattern("rlx_[")
            .is_err());
        assert!(TaskDirCollector::new(root.path().join("missing")).collect().is_err());
    }
}
