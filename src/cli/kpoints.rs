//! # kpoints 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/kpoints.rs`

use crate::config::DecimalHandling;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 网格取整方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DecimalArg {
    Round,
    Floor,
    Ceil,
}

impl From<DecimalArg> for DecimalHandling {
    fn from(arg: DecimalArg) -> Self {
        match arg {
            DecimalArg::Round => DecimalHandling::Round,
            DecimalArg::Floor => DecimalHandling::Floor,
            DecimalArg::Ceil => DecimalHandling::Ceil,
        }
    }
}

/// kpoints 子命令参数
#[derive(Args, Debug)]
pub struct KpointsArgs {
    /// Structure file (POSCAR/CONTCAR)
    #[arg(short, long)]
    pub structure: PathBuf,

    /// Reciprocal-space interval between k-points
    #[arg(long)]
    pub interval: f64,

    /// Use reciprocal vectors without the 2π factor
    #[arg(long, default_value_t = false)]
    pub no_two_pi: bool,

    /// How fractional mesh sizes are turned into integers
    #[arg(long, value_enum, default_value_t = DecimalArg::Round)]
    pub decimal_handling: DecimalArg,

    /// Skip the hexagonal mesh adjustment
    #[arg(long, default_value_t = false)]
    pub no_symmetry: bool,
}
