//! # Slurm 调度器
//!
//! 每个任务目录写出 `submit.sbatch` 并用 `sbatch` 提交，
//! 用 `squeue` 轮询直到所有作业离开队列。
//!
//! ## 依赖关系
//! - 使用 `utils/slurm.rs`, `utils/progress.rs`
//! - 使用 `regex` 解析作业号

use super::{Scheduler, StagedTask, TaskHandle};
use crate::config::ComputerProfile;
use crate::error::{Result, TwinflowError};
use crate::utils::progress::create_spinner;
use crate::utils::slurm::{format_walltime, generate_sbatch_script, SlurmConfig};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;

const SBATCH_FILE: &str = "submit.sbatch";

pub struct SlurmScheduler {
    profile: ComputerProfile,
}

impl SlurmScheduler {
    pub fn new(profile: ComputerProfile) -> Self {
        SlurmScheduler { profile }
    }

    /// 由计算请求与计算机配置组装 sbatch 设置
    pub fn slurm_config(&self, task: &StagedTask) -> SlurmConfig {
        let options = &task.request.options;
        let partition = if options.queue_name.is_empty() {
            self.profile.partition.clone()
        } else {
            options.queue_name.clone()
        };

        SlurmConfig {
            job_name: task.label.clone(),
            partition,
            constraint: self.profile.constraint.clone(),
            nodes: self.profile.nodes,
            ntasks: options.resources.tot_num_mpiprocs,
            cpus_per_task: 1,
            mem_per_cpu: self.profile.mem_per_cpu.clone(),
            time_limit: format_walltime(options.max_wallclock_seconds),
            modules: self.profile.modules.clone(),
        }
    }
}

fn spawn_command(command: &mut Command, name: &str) -> Result<Output> {
    command.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            TwinflowError::CommandNotFound {
                command: name.to_string(),
            }
        } else {
            TwinflowError::CommandFailed {
                command: name.to_string(),
                stderr: e.to_string(),
            }
        }
    })
}

fn run_command(command: &mut Command, name: &str) -> Result<Output> {
    let output = spawn_command(command, name)?;
    if !output.status.success() {
        return Err(TwinflowError::CommandFailed {
            command: name.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(output)
}

/// squeue 输出中仍在队列的作业数
///
/// 已结束的作业会被 Slurm 清出，`squeue -j` 随即以 "Invalid job id specified" 失败，
/// 视为这些作业已离开队列。
pub fn remaining_jobs(success: bool, stdout: &str, stderr: &str) -> Result<usize> {
    if !success {
        if stderr.contains("Invalid job id") {
            return Ok(0);
        }
        return Err(TwinflowError::CommandFailed {
            command: "squeue".to_string(),
            stderr: stderr.to_string(),
        });
    }
    Ok(stdout.lines().filter(|l| !l.trim().is_empty()).count())
}

/// 从 sbatch 输出中提取作业号
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let re = Regex::new(r"Submitted batch job (\d+)").ok()?;
    re.captures(stdout)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

impl Scheduler for SlurmScheduler {
    fn name(&self) -> &str {
        "slurm"
    }

    fn submit(&mut self, task: &StagedTask) -> Result<TaskHandle> {
        let script = generate_sbatch_script(&self.slurm_config(task), &task.dir, "bash run.sh");
        let path = task.dir.join(SBATCH_FILE);
        fs::write(&path, script).map_err(|e| TwinflowError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;

        let output = run_command(
            Command::new("sbatch").arg(SBATCH_FILE).current_dir(&task.dir),
            "sbatch",
        )?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_job_id(&stdout).ok_or_else(|| TwinflowError::CommandFailed {
            command: "sbatch".to_string(),
            stderr: format!("unexpected output: {}", stdout.trim()),
        })?;

        Ok(TaskHandle {
            label: task.label.clone(),
            dir: task.dir.clone(),
            job_id: Some(job_id),
        })
    }

    fn wait(&mut self, handles: &[TaskHandle]) -> Result<()> {
        let ids: Vec<&str> = handles.iter().filter_map(|h| h.job_id.as_deref()).collect();
        if ids.is_empty() {
            return Ok(());
        }

        let spinner = create_spinner(&format!("Waiting for {} Slurm job(s)", ids.len()));
        let joined = ids.join(",");
        loop {
            let output = spawn_command(
                Command::new("squeue").args(["-h", "-o", "%i", "-j", &joined]),
                "squeue",
            )?;
            let remaining = remaining_jobs(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            )?;
            if remaining == 0 {
                break;
            }
            spinner.set_message(format!("Waiting for {} Slurm job(s)", remaining));
            thread::sleep(Duration::from_secs(self.profile.poll_interval_secs.max(1)));
        }
        spinner.finish_and_clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::get_calcjob_builder;
    use crate::config::calculator::tests::settings;
    use crate::crystal::tests::hcp_mg;
    use std::path::PathBuf;

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("Submitted batch job 123456\n"), Some("123456".to_string()));
        assert_eq!(parse_job_id("sbatch: error"), None);
    }

    #[test]
    fn test_remaining_jobs() {
        assert_eq!(remaining_jobs(true, "1001\n1002\n\n", "").unwrap(), 2);
        assert_eq!(remaining_jobs(true, "", "").unwrap(), 0);
        assert_eq!(
            remaining_jobs(false, "", "slurm_load_jobs error: Invalid job id specified\n").unwrap(),
            0
        );
        assert!(matches!(
            remaining_jobs(false, "", "slurm_load_jobs error: Unable to contact slurm controller"),
            Err(TwinflowError::CommandFailed { .. })
        ));
    }

    #[test]
    fn test_slurm_config_prefers_queue_name() {
        let mut profile = ComputerProfile::default();
        profile.partition = "cpu".to_string();
        let scheduler = SlurmScheduler::new(profile);

        let request = get_calcjob_builder("rlx_shear_000", "d", "relax", "stern", &hcp_mg(), &settings()).unwrap();
        let task = StagedTask {
            label: request.label.clone(),
            dir: PathBuf::from("/tmp/rlx_shear_000"),
            request,
        };

        let config = scheduler.slurm_config(&task);
        assert_eq!(config.partition, "debug");
        assert_eq!(config.job_name, "rlx_shear_000");
        assert_eq!(config.ntasks, 16);
        assert_eq!(config.time_limit, "1000:00:00");
    }
}
