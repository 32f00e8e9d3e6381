//! 测试用调度器：提交时立即写出伪造的 OUTCAR 与 CONTCAR

use super::{Scheduler, StagedTask, TaskHandle};
use crate::error::{Result, TwinflowError};
use crate::parsers::poscar;
use std::fs;

/// 伪造输出的最大原子受力
pub const MOCK_FORCE: f64 = 0.002;

#[derive(Default)]
pub struct MockScheduler {
    pub submitted: Vec<String>,
    pub waited: Vec<String>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 第 i 个提交任务的能量
    pub fn energy(i: usize) -> f64 {
        -3.0 - 0.01 * i as f64
    }
}

impl Scheduler for MockScheduler {
    fn name(&self) -> &str {
        "mock"
    }

    fn submit(&mut self, task: &StagedTask) -> Result<TaskHandle> {
        let structure = &task.request.structure;
        let energy = Self::energy(self.submitted.len());

        let mut outcar = format!(
            "   NIONS = {:7}\n  volume of cell : {:14.4}\n POSITION                                       TOTAL-FORCE (eV/Angst)\n -----------\n",
            structure.atoms.len(),
            structure.lattice.volume()
        );
        for p in structure.cartesian_positions() {
            outcar.push_str(&format!(
                "  {:12.5} {:12.5} {:12.5}   {:12.6} {:12.6} {:12.6}\n",
                p.x, p.y, p.z, 0.0, 0.0, MOCK_FORCE
            ));
        }
        outcar.push_str(&format!(
            " -----------\n  energy  without entropy= {:16.8}  energy(sigma->0) = {:16.8}\n General timing and accounting informations for this job:\n",
            energy, energy
        ));
        let path = task.dir.join("OUTCAR");
        fs::write(&path, outcar).map_err(|e| TwinflowError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        poscar::write_poscar(&task.dir.join("CONTCAR"), structure)?;

        self.submitted.push(task.label.clone());
        Ok(TaskHandle {
            label: task.label.clone(),
            dir: task.dir.clone(),
            job_id: Some(format!("{}", 1000 + self.submitted.len())),
        })
    }

    fn wait(&mut self, handles: &[TaskHandle]) -> Result<()> {
        self.waited.extend(handles.iter().map(|h| h.label.clone()));
        Ok(())
    }
}
