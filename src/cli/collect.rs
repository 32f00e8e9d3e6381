//! # collect 子命令 CLI 定义
//!
//! 汇总运行目录中已完成任务的能量、受力和体积。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/collect.rs`

use clap::Args;
use std::path::PathBuf;

/// collect 子命令参数
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Run directory containing task folders
    pub run_dir: PathBuf,

    /// Task directory name patterns, comma separated (e.g. 'rlx_*')
    #[arg(long)]
    pub pattern: Option<String>,

    /// Search task folders recursively
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Filename for the CSV output
    #[arg(long)]
    pub output_csv: Option<PathBuf>,

    /// Filename for the energy plot (PNG)
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Number of parallel parsing jobs (0 = all CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}
