//! # 批量处理模块
//!
//! 在运行目录中收集任务目录，并行解析其输出。
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::TaskDirCollector;
pub use runner::{BatchResult, BatchRunner, ProcessResult};
