//! # 本地调度器
//!
//! 直接在本机以子进程运行 `bash run.sh`，输出写入任务目录的 `run.log`。
//!
//! ## 依赖关系
//! - 使用 `utils/progress.rs`

use super::{Scheduler, StagedTask, TaskHandle};
use crate::error::{Result, TwinflowError};
use crate::utils::output::print_warning;
use crate::utils::progress::create_spinner;
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::process::{Child, Command, Stdio};

#[derive(Default)]
pub struct LocalScheduler {
    children: HashMap<String, Child>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for LocalScheduler {
    fn name(&self) -> &str {
        "local"
    }

    fn submit(&mut self, task: &StagedTask) -> Result<TaskHandle> {
        let log_path = task.dir.join("run.log");
        let log = File::create(&log_path).map_err(|e| TwinflowError::FileWriteError {
            path: log_path.display().to_string(),
            source: e,
        })?;
        let err_log = log.try_clone().map_err(|e| TwinflowError::FileWriteError {
            path: log_path.display().to_string(),
            source: e,
        })?;

        let child = Command::new("bash")
            .arg("run.sh")
            .current_dir(&task.dir)
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log))
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    TwinflowError::CommandNotFound {
                        command: "bash".to_string(),
                    }
                } else {
                    TwinflowError::CommandFailed {
                        command: "bash run.sh".to_string(),
                        stderr: e.to_string(),
                    }
                }
            })?;

        let pid = child.id().to_string();
        self.children.insert(task.label.clone(), child);
        Ok(TaskHandle {
            label: task.label.clone(),
            dir: task.dir.clone(),
            job_id: Some(pid),
        })
    }

    fn wait(&mut self, handles: &[TaskHandle]) -> Result<()> {
        let spinner = create_spinner(&format!("Running {} local task(s)", handles.len()));
        for handle in handles {
            let Some(mut child) = self.children.remove(&handle.label) else {
                continue;
            };
            spinner.set_message(format!("Running {}", handle.label));
            let status = child.wait().map_err(|e| TwinflowError::CommandFailed {
                command: format!("bash run.sh ({})", handle.label),
                stderr: e.to_string(),
            })?;
            if !status.success() {
                print_warning(&format!(
                    "{} exited with {}, see {}",
                    handle.label,
                    status,
                    handle.dir.join("run.log").display()
                ));
            }
        }
        spinner.finish_and_clear();
        Ok(())
    }
}
