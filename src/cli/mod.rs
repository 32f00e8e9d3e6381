//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `shear`: 孪晶剪切工作流
//! - `twinboundary-relax`: 孪晶界弛豫工作流
//! - `twinboundary-shear`: 孪晶界剪切工作流
//! - `modulation`: 声子调制工作流
//! - `kpoints`: 由 k 点间距推导网格
//! - `generate`: 只生成结构，不提交任务
//! - `collect`: 汇总运行目录中的计算结果
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: workflow, kpoints, generate, collect

pub mod collect;
pub mod generate;
pub mod kpoints;
pub mod workflow;

use clap::{Parser, Subcommand};

/// Twinflow - 六方金属孪晶计算工作流
#[derive(Parser)]
#[command(name = "twinflow")]
#[command(version)]
#[command(about = "Twinning workflows for hexagonal metals on VASP and phonopy", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Relax (and optionally phonon) a series of twinning-sheared structures
    Shear(workflow::WorkflowArgs),

    /// Build a twin boundary supercell and relax atomic positions
    TwinboundaryRelax(workflow::WorkflowArgs),

    /// Shear a relaxed twin boundary step by step, restarting from each relaxation
    TwinboundaryShear(workflow::WorkflowArgs),

    /// Run fixed-cell VASP calculations on phonon-modulated supercells
    Modulation(workflow::WorkflowArgs),

    /// Derive a k-point mesh from a reciprocal-space interval
    Kpoints(kpoints::KpointsArgs),

    /// Write generated structures as POSCAR files without submitting jobs
    Generate(generate::GenerateArgs),

    /// Collect energies and forces from finished task directories
    Collect(collect::CollectArgs),
}
