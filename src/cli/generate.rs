//! # generate 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/generate.rs`

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// generate 主命令参数
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(subcommand)]
    pub command: GenerateCommands,
}

/// generate 子命令
#[derive(Subcommand, Debug)]
pub enum GenerateCommands {
    /// Sheared structures from a shear workflow input
    Shear(GenerateTarget),

    /// Twin boundary structures from a twinboundary-relax workflow input
    Twinboundary(GenerateTarget),
}

/// 输入文件与输出目录
#[derive(Args, Debug)]
pub struct GenerateTarget {
    /// Workflow input file (TOML)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the generated POSCAR files
    #[arg(short, long, default_value = "structures")]
    pub output: PathBuf,
}
