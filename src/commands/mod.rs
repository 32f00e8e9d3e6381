//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `workflow/`, `crystal/`, `batch/`, `utils/`
//! - 子模块: workflow, kpoints, generate, collect

pub mod collect;
pub mod generate;
pub mod kpoints;
pub mod workflow;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Shear(args) => workflow::shear(args),
        Commands::TwinboundaryRelax(args) => workflow::twinboundary_relax(args),
        Commands::TwinboundaryShear(args) => workflow::twinboundary_shear(args),
        Commands::Modulation(args) => workflow::modulation(args),
        Commands::Kpoints(args) => kpoints::execute(args),
        Commands::Generate(args) => generate::execute(args),
        Commands::Collect(args) => collect::execute(args),
    }
}
