//! # Slurm 脚本生成工具
//!
//! 生成 sbatch 提交脚本，实际计算命令由任务目录中的 `run.sh` 承担。
//!
//! ## 依赖关系
//! - 被 `scheduler/slurm.rs` 使用
//! - 无外部模块依赖

use std::path::Path;

/// Slurm 作业配置
#[derive(Debug, Clone)]
pub struct SlurmConfig {
    pub job_name: String,
    pub partition: String,
    pub constraint: String,
    pub nodes: u32,
    pub ntasks: u32,
    pub cpus_per_task: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        SlurmConfig {
            job_name: "job".to_string(),
            partition: String::new(),
            constraint: String::new(),
            nodes: 1,
            ntasks: 16,
            cpus_per_task: 1,
            mem_per_cpu: "3G".to_string(),
            time_limit: format_walltime(100 * 3600),
            modules: vec![],
        }
    }
}

/// 秒数转 Slurm 时间格式 `H:MM:SS`（小时可超过 24）
pub fn format_walltime(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// 生成 sbatch 脚本内容
pub fn generate_sbatch_script(config: &SlurmConfig, workdir: &Path, exec_cmd: &str) -> String {
    let mut directives = Vec::new();
    if !config.constraint.is_empty() {
        directives.push(format!("#SBATCH --constraint \"{}\"", config.constraint));
    }
    if !config.partition.is_empty() {
        directives.push(format!("#SBATCH --partition {}", config.partition));
    }

    let module_loads = config
        .modules
        .iter()
        .map(|m| format!("module load {}", m))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"#!/bin/bash
{}
#SBATCH --nodes={}
#SBATCH --mem-per-cpu {}
#SBATCH --time {}
#SBATCH -c {}
#SBATCH -n {}
#SBATCH -J {}
#SBATCH -o %x.out
#SBATCH -e %x.err

set -euo pipefail

module purge 2>&1
{}
echo "Loaded modules"

cd "{}"
echo "PWD=$(pwd)"
echo "Running: {}"
{}

echo "Timings:"
sacct -o JobID,Submit,Start,End,CPUTime,State -j $SLURM_JOBID
"#,
        directives.join("\n"),
        config.nodes,
        config.mem_per_cpu,
        config.time_limit,
        config.cpus_per_task,
        config.ntasks,
        config.job_name,
        module_loads,
        workdir.display(),
        exec_cmd,
        exec_cmd,
    )
}
