//! # 运行上下文
//!
//! 一次工作流运行的全部可变状态：运行目录、计算机配置、调度器、
//! 按标签索引的任务、待等待的任务、输出与报告。
//!
//! ```text
//! <workdir>/
//!   outputs.json   工作流输出
//!   report.log     报告
//!   structures/    生成的结构（POSCAR）
//!   <label>/       任务目录
//! ```
//!
//! ## 依赖关系
//! - 被 `workflow/` 各工作流使用
//! - 使用 `scheduler/`, `parsers/outcar.rs`, `parsers/poscar.rs`

use crate::builder::CalcJobRequest;
use crate::config::ComputerProfile;
use crate::error::{Result, TwinflowError};
use crate::models::{Crystal, TaskOutputs};
use crate::parsers::{outcar, poscar};
use crate::scheduler::{stage_task, Scheduler, TaskHandle};
use crate::utils::output::print_report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 输出文件名
pub const OUTPUTS_FILE: &str = "outputs.json";
/// 报告文件名
pub const REPORT_FILE: &str = "report.log";

/// 工作流输出值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OutputValue {
    Structure(Crystal),
    Float(f64),
    Int(i64),
    Dict(serde_json::Value),
}

impl OutputValue {
    pub fn as_structure(&self) -> Option<&Crystal> {
        match self {
            OutputValue::Structure(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OutputValue::Float(v) => Some(*v),
            OutputValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&serde_json::Value> {
        match self {
            OutputValue::Dict(v) => Some(v),
            _ => None,
        }
    }
}

fn write_error(path: &Path, source: std::io::Error) -> TwinflowError {
    TwinflowError::FileWriteError {
        path: path.display().to_string(),
        source,
    }
}

/// 运行上下文
pub struct RunContext {
    pub workdir: PathBuf,
    pub computer: String,
    pub profile: ComputerProfile,
    scheduler: Box<dyn Scheduler>,
    tasks: BTreeMap<String, TaskHandle>,
    pending: Vec<TaskHandle>,
    outputs: BTreeMap<String, OutputValue>,
    reports: Vec<String>,
}

impl RunContext {
    /// 创建上下文并建立运行目录
    pub fn new(
        workdir: &Path,
        computer: &str,
        profile: ComputerProfile,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self> {
        fs::create_dir_all(workdir).map_err(|e| write_error(workdir, e))?;
        Ok(RunContext {
            workdir: workdir.to_path_buf(),
            computer: computer.to_string(),
            profile,
            scheduler,
            tasks: BTreeMap::new(),
            pending: Vec::new(),
            outputs: BTreeMap::new(),
            reports: Vec::new(),
        })
    }

    pub fn scheduler_name(&self) -> &str {
        self.scheduler.name()
    }

    // ─────────────────────────────────────────────────────────────
    // 报告
    // ─────────────────────────────────────────────────────────────

    /// 写一行报告
    pub fn report(&mut self, workchain: &str, msg: &str) {
        print_report(workchain, msg);
        self.reports.push(format!("[{}] {}", workchain, msg));
    }

    /// 带 `# ---` 上下框线的报告
    pub fn report_framed(&mut self, workchain: &str, msg: &str) {
        let frame = format!("# {}", "-".repeat(msg.chars().count().saturating_sub(2)));
        self.report(workchain, &frame);
        self.report(workchain, msg);
        self.report(workchain, &frame);
    }

    pub fn reports(&self) -> &[String] {
        &self.reports
    }

    // ─────────────────────────────────────────────────────────────
    // 任务
    // ─────────────────────────────────────────────────────────────

    /// 写出任务目录并提交
    pub fn submit(&mut self, request: &CalcJobRequest) -> Result<TaskHandle> {
        let dir = self.workdir.join(&request.label);
        let staged = stage_task(request, &dir, &self.profile)?;
        let handle = self.scheduler.submit(&staged)?;

        self.tasks.insert(handle.label.clone(), handle.clone());
        self.pending.push(handle.clone());
        Ok(handle)
    }

    /// 等待当前步骤提交的全部任务
    pub fn await_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        self.scheduler.wait(&pending)
    }

    /// 按标签取任务
    pub fn task(&self, label: &str) -> Result<&TaskHandle> {
        self.tasks.get(label).ok_or_else(|| TwinflowError::MissingTask {
            label: label.to_string(),
        })
    }

    /// 读取任务输出
    pub fn task_outputs(&self, label: &str) -> Result<TaskOutputs> {
        let handle = self.task(label)?;
        outcar::parse_task_dir(&handle.dir, label)
    }

    /// 按标签读取一组任务输出
    pub fn collect_outputs(&self, labels: &[String]) -> Result<BTreeMap<String, TaskOutputs>> {
        labels
            .iter()
            .map(|label| Ok((label.clone(), self.task_outputs(label)?)))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // 输出
    // ─────────────────────────────────────────────────────────────

    /// 登记输出
    pub fn out(&mut self, name: &str, value: OutputValue) {
        self.outputs.insert(name.to_string(), value);
    }

    pub fn output(&self, name: &str) -> Option<&OutputValue> {
        self.outputs.get(name)
    }

    pub fn outputs(&self) -> &BTreeMap<String, OutputValue> {
        &self.outputs
    }

    /// 把生成的结构写到 `structures/<name>.POSCAR`
    pub fn write_structure(&self, crystal: &Crystal) -> Result<PathBuf> {
        let dir = self.workdir.join("structures");
        fs::create_dir_all(&dir).map_err(|e| write_error(&dir, e))?;
        let path = dir.join(format!("{}.POSCAR", crystal.name));
        poscar::write_poscar(&path, crystal)?;
        Ok(path)
    }

    /// 写出 outputs.json 与 report.log
    pub fn finish(&self) -> Result<()> {
        let path = self.workdir.join(OUTPUTS_FILE);
        let json = serde_json::to_string_pretty(&self.outputs).map_err(|e| TwinflowError::JsonError {
            path: path.display().to_string(),
            source: e,
        })?;
        fs::write(&path, json).map_err(|e| write_error(&path, e))?;

        let path = self.workdir.join(REPORT_FILE);
        let mut log = self.reports.join("\n");
        log.push('\n');
        fs::write(&path, log).map_err(|e| write_error(&path, e))
    }
}

/// 读取已完成运行的 outputs.json
pub fn load_outputs(workdir: &Path) -> Result<BTreeMap<String, OutputValue>> {
    let path = workdir.join(OUTPUTS_FILE);
    let content = fs::read_to_string(&path).map_err(|e| TwinflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| TwinflowError::JsonError {
        path: path.display().to_string(),
        source: e,
    })
}
