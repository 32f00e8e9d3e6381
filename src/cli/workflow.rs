//! # 工作流子命令 CLI 定义
//!
//! 四个工作流子命令共用一组参数。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/workflow.rs`

use crate::config::SchedulerKind;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 调度器选择
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SchedulerArg {
    /// Submit through sbatch and poll squeue
    Slurm,
    /// Run each task's run.sh as a child process
    Local,
}

impl From<SchedulerArg> for SchedulerKind {
    fn from(arg: SchedulerArg) -> Self {
        match arg {
            SchedulerArg::Slurm => SchedulerKind::Slurm,
            SchedulerArg::Local => SchedulerKind::Local,
        }
    }
}

/// 工作流子命令参数
#[derive(Args, Debug)]
pub struct WorkflowArgs {
    /// Workflow input file (TOML)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Computer profile file (TOML); falls back to ./twinflow-profile.toml
    #[arg(long, env = "TWINFLOW_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Run directory for task folders, structures and outputs
    #[arg(short, long, default_value = "twinflow-run")]
    pub workdir: PathBuf,

    /// Override the scheduler configured for the computer
    #[arg(long, value_enum)]
    pub scheduler: Option<SchedulerArg>,

    /// Stop after generating structures
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
