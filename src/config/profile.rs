//! # 计算机配置
//!
//! 每台计算机一个 `[computers.<name>]` 表：调度器类型、Slurm 资源、
//! 模块列表、POTCAR 根目录以及代码名到可执行文件的映射。
//! 在命令层加载一次，随运行上下文传入工作流。
//!
//! ## 依赖关系
//! - 被 `scheduler/`, `workflow/context.rs`, `commands/workflow.rs` 使用

use super::load_toml;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 默认配置文件名
pub const DEFAULT_PROFILE: &str = "twinflow-profile.toml";

/// 调度器类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    #[default]
    Slurm,
    Local,
}

/// 单台计算机配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ComputerProfile {
    pub scheduler: SchedulerKind,
    pub partition: String,
    pub constraint: String,
    pub nodes: u32,
    pub mem_per_cpu: String,
    pub modules: Vec<String>,
    pub mpirun: String,
    pub potcar_root: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub codes: BTreeMap<String, String>,
}

impl Default for ComputerProfile {
    fn default() -> Self {
        ComputerProfile {
            scheduler: SchedulerKind::Slurm,
            partition: String::new(),
            constraint: String::new(),
            nodes: 1,
            mem_per_cpu: "3G".to_string(),
            modules: vec![],
            mpirun: "mpirun".to_string(),
            potcar_root: None,
            poll_interval_secs: 30,
            codes: BTreeMap::new(),
        }
    }
}

impl ComputerProfile {
    /// 代码名对应的可执行文件，未配置时直接使用代码名
    pub fn executable(&self, code: &str) -> String {
        self.codes
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

/// 配置文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    #[serde(default)]
    pub computers: BTreeMap<String, ComputerProfile>,
}

impl Profile {
    /// 读取配置；未指定路径时尝试当前目录下的默认文件，否则使用内置默认值
    pub fn load_or_default(path: Option<&Path>) -> Result<Profile> {
        match path {
            Some(p) => load_toml(p),
            None => {
                let default_path = Path::new(DEFAULT_PROFILE);
                if default_path.exists() {
                    load_toml(default_path)
                } else {
                    Ok(Profile::default())
                }
            }
        }
    }

    /// 取指定计算机的配置
    pub fn computer(&self, name: &str) -> Option<&ComputerProfile> {
        self.computers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile() {
        let text = r#"
[computers.stern]
scheduler = "slurm"
partition = "cpu"
modules = ["vasp/5.4.4"]
potcar_root = "/opt/potcars"

[computers.stern.codes]
vasp544mpi = "vasp_std"

[computers.laptop]
scheduler = "local"
"#;
        let profile: Profile = toml::from_str(text).unwrap();
        let stern = profile.computer("stern").unwrap();
        assert_eq!(stern.partition, "cpu");
        assert_eq!(stern.nodes, 1);
        assert_eq!(stern.executable("vasp544mpi"), "vasp_std");
        assert_eq!(stern.executable("phonopy"), "phonopy");

        let laptop = profile.computer("laptop").unwrap();
        assert_eq!(laptop.scheduler, SchedulerKind::Local);
        assert_eq!(laptop.poll_interval_secs, 30);
        assert!(profile.computer("missing").is_none());
    }

    #[test]
    fn test_load_missing_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Profile::load_or_default(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
