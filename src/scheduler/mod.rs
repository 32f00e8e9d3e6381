//! # 作业调度
//!
//! `Scheduler` 是工作流与外部计算资源之间唯一的接缝：
//! 提交一个已写好输入文件的任务目录，并等待一组任务结束。
//!
//! ## 依赖关系
//! - 被 `workflow/context.rs`, `commands/workflow.rs` 使用
//! - 使用 `builder/`, `config/profile.rs`
//! - 子模块: staging, slurm, local

pub mod local;
pub mod slurm;
pub mod staging;

#[cfg(test)]
pub mod mock;

pub use local::LocalScheduler;
pub use slurm::SlurmScheduler;
pub use staging::{stage_task, StagedTask};

use crate::config::{ComputerProfile, SchedulerKind};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 已提交任务的句柄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub label: String,
    pub dir: PathBuf,
    /// Slurm 作业号（本地运行时为进程号）
    pub job_id: Option<String>,
}

/// 调度器接口
pub trait Scheduler {
    fn name(&self) -> &str;

    /// 提交任务
    fn submit(&mut self, task: &StagedTask) -> Result<TaskHandle>;

    /// 阻塞直到所有任务结束
    fn wait(&mut self, handles: &[TaskHandle]) -> Result<()>;
}

/// 按类型创建调度器
pub fn create_scheduler(kind: SchedulerKind, profile: &ComputerProfile) -> Box<dyn Scheduler> {
    match kind {
        SchedulerKind::Slurm => Box::new(SlurmScheduler::new(profile.clone())),
        SchedulerKind::Local => Box::new(LocalScheduler::new()),
    }
}
