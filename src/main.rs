//! # Twinflow - 六方金属孪晶计算工作流
//!
//! 生成孪晶剪切、孪晶界与声子调制结构，写出 VASP / phonopy 任务目录，
//! 通过 Slurm 或本地进程提交，并汇总计算结果。
//!
//! ## 子命令
//! - `shear` - 孪晶剪切工作流
//! - `twinboundary-relax` - 孪晶界弛豫工作流
//! - `twinboundary-shear` - 孪晶界剪切工作流
//! - `modulation` - 声子调制工作流
//! - `kpoints` - k 点网格推导
//! - `generate` - 只生成结构
//! - `collect` - 汇总计算结果
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── workflow/  (工作流解释器与四个工作流)
//!   │     ├── builder/   (计算任务请求)
//!   │     ├── scheduler/ (任务目录与调度器)
//!   │     ├── crystal/   (结构生成)
//!   │     └── batch/     (并行汇总)
//!   ├── config/     (输入与计算机配置)
//!   ├── parsers/    (VASP 文件解析)
//!   ├── models/     (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod builder;
mod cli;
mod collector;
mod commands;
mod config;
mod crystal;
mod error;
mod kpoints;
mod models;
mod parsers;
mod scheduler;
mod utils;
mod workflow;

use clap::Parser;
use cli::Cli;

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
