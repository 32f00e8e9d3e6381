//! # 孪晶界剪切工作流
//!
//! 对已弛豫的孪晶界依次施加一组切变比例。每一步都从上一次弛豫续算：
//! 取上一次 CONTCAR 的原子位置，映射回原始坐标系后施加新的切变，
//! 再以上一次的最大受力作为收敛判据弛豫原子位置。
//!
//! ```text
//! initialize → while count < len(ratios) {
//!     create_twinboundary_shear_structure → run_relax → update_vals
//! } → terminate
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/workflow.rs` 使用
//! - 读取 `workflow/twinboundary_relax.rs` 的运行目录
//! - 使用 `crystal/twinboundary.rs`, `builder/restart.rs`, `kpoints.rs`

use super::twinboundary_relax::RELAX_LABEL;
use super::{load_outputs, Outline, OutputValue, RunContext, WorkChain};
use crate::builder::get_calcjob_builder_for_twinboundary_shear;
use crate::config::{KpointsSettings, TwinBoundaryShearConf, TwinBoundaryShearInput};
use crate::crystal::{
    get_twinboundary_shear_structure, relaxed_positions_in_original_frame, standardize, StandardizedCell,
    SYMPREC,
};
use crate::error::{Result, TwinflowError};
use crate::kpoints::convert_kpoints;
use crate::models::{Crystal, TaskOutputs};
use crate::parsers::outcar::parse_task_dir;
use crate::scheduler::staging::read_request;
use serde_json::json;
use std::path::{Path, PathBuf};

fn task_outputs(dir: &Path) -> Result<TaskOutputs> {
    let label = dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("previous");
    parse_task_dir(dir, label)
}

/// 当前步骤的剪切结构
struct ShearStep {
    structure: Crystal,
    frame: StandardizedCell,
    kpoints: KpointsSettings,
}

pub struct TwinBoundaryShearWorkChain {
    conf: TwinBoundaryShearConf,
    ratios: Vec<f64>,
    count: usize,
    twinboundary_orig: Option<Crystal>,
    twinning_shear: f64,
    /// 上一次弛豫的任务目录
    previous_dir: PathBuf,
    /// 上一次弛豫结构所在的标准化晶胞
    previous_frame: Option<StandardizedCell>,
    step: Option<ShearStep>,
}

impl TwinBoundaryShearWorkChain {
    pub fn new(input: TwinBoundaryShearInput) -> Self {
        let conf = input.twinboundary_shear_conf;
        TwinBoundaryShearWorkChain {
            ratios: conf.shear_strain_ratios.clone(),
            previous_dir: conf.twinboundary_relax_dir.join(RELAX_LABEL),
            conf,
            count: 0,
            twinboundary_orig: None,
            twinning_shear: 0.0,
            previous_frame: None,
            step: None,
        }
    }

    fn relax_dir(&self) -> String {
        self.conf.twinboundary_relax_dir.display().to_string()
    }

    fn missing(&self, field: &str) -> TwinflowError {
        TwinflowError::MissingOutput {
            label: self.relax_dir(),
            field: field.to_string(),
        }
    }

    fn is_run_next_step(&self, ctx: &mut RunContext) -> bool {
        ctx.report_framed(Self::NAME, "# Check all relax calculations have finished.");
        let next = self.count < self.ratios.len();
        if next {
            ctx.report(Self::NAME, "# Not have finished.");
            ctx.report(Self::NAME, &format!("# Start relax (count: {}).", self.count + 1));
        } else {
            ctx.report(Self::NAME, "# All relax calculations have finished.");
        }
        next
    }

    fn initialize(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Start TwinBoundaryShearWorkChain.");

        let outputs = load_outputs(&self.conf.twinboundary_relax_dir)?;
        let orig = outputs
            .get("twinboundary_orig")
            .and_then(OutputValue::as_structure)
            .cloned()
            .ok_or_else(|| self.missing("twinboundary_orig"))?;
        self.twinning_shear = outputs
            .get("twinboundary_parameters")
            .and_then(OutputValue::as_dict)
            .and_then(|p| p["twinning_shear"].as_f64())
            .ok_or_else(|| self.missing("twinboundary_parameters.twinning_shear"))?;

        match self.conf.additional_relax_dirs.last() {
            Some(dir) => self.previous_dir = dir.clone(),
            None => ctx.report(Self::NAME, "# There is no additional_relax_dirs."),
        }

        self.previous_frame = Some(standardize(&orig, false, SYMPREC)?);
        self.twinboundary_orig = Some(orig);

        ctx.out(
            "shear_strain_ratios",
            OutputValue::Dict(json!({ "shear_strain_ratios": self.ratios })),
        );
        ctx.report(Self::NAME, &format!("# Shear strain ratios: {:?}", self.ratios));
        Ok(())
    }

    fn create_twinboundary_shear_structure(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Create twinboundary shear structure.");
        let orig = self
            .twinboundary_orig
            .as_ref()
            .ok_or_else(|| self.missing("twinboundary_orig"))?;
        let frame = self
            .previous_frame
            .as_ref()
            .ok_or_else(|| TwinflowError::Other("previous relax frame is unknown".to_string()))?;

        let previous = task_outputs(&self.previous_dir)?;
        let relaxed = previous
            .final_structure
            .ok_or_else(|| TwinflowError::MissingOutput {
                label: previous.label.clone(),
                field: "final_structure".to_string(),
            })?;
        let positions = relaxed_positions_in_original_frame(frame, &relaxed)?;

        let ratio = self.ratios[self.count];
        let (_, std) = get_twinboundary_shear_structure(orig, ratio * self.twinning_shear, Some(positions.as_slice()))?;

        // k 点网格始终由孪晶界弛豫的网格换算
        let reference = read_request(&self.conf.twinboundary_relax_dir.join(RELAX_LABEL))?;
        let mesh = reference
            .vasp_inputs()
            .map(|v| v.kpoints.mesh)
            .ok_or_else(|| self.missing("kpoints"))?;
        let info = convert_kpoints(mesh, &reference.structure.lattice, &std.crystal.lattice)?;
        ctx.report(Self::NAME, "# Kpoints fixed from:");
        ctx.report(Self::NAME, &format!("# {:?}", mesh));
        ctx.report(Self::NAME, "# To:");
        ctx.report(Self::NAME, &format!("# {:?}", info.mesh));

        let name = format!("twinboundary_shear_{:03}", self.count + 1);
        let structure = std
            .crystal
            .clone()
            .labelled(name.clone(), format!("{}, ratio: {:.6}", name, ratio));
        ctx.write_structure(&structure)?;

        self.step = Some(ShearStep {
            structure,
            frame: std,
            kpoints: info.to_settings(),
        });
        Ok(())
    }

    fn run_relax(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Run relax.");
        let step = self
            .step
            .take()
            .ok_or_else(|| TwinflowError::Other("shear structure has not been created".to_string()))?;

        let label = format!("rlx_twinboundary_shear_{:03}", self.count + 1);
        let description = format!("{}, ratio: {:.6}", label, self.ratios[self.count]);

        let previous = read_request(&self.previous_dir)?;
        let previous_max_force = task_outputs(&self.previous_dir)?
            .max_force
            .ok_or_else(|| TwinflowError::MissingOutput {
                label: previous.label.clone(),
                field: "max_force".to_string(),
            })?;

        let request = get_calcjob_builder_for_twinboundary_shear(
            &label,
            &description,
            &ctx.computer,
            &step.structure,
            &step.kpoints,
            &self.conf.options,
            &previous,
            previous_max_force,
        )?;
        let handle = ctx.submit(&request)?;
        ctx.report(
            Self::NAME,
            &format!(
                "{} relax workflow has submitted, job: {}",
                label,
                handle.job_id.as_deref().unwrap_or("-")
            ),
        );

        self.previous_dir = handle.dir;
        self.previous_frame = Some(step.frame);
        Ok(())
    }

    fn update_vals(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Update latest calculation.");
        self.count += 1;
        Ok(())
    }

    fn terminate(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# TwinBoundaryShearWorkChain has finished successfully.");
        ctx.report(Self::NAME, "# Terminate TwinBoundaryShearWorkChain.");
        Ok(())
    }
}

impl WorkChain for TwinBoundaryShearWorkChain {
    const NAME: &'static str = "TwinBoundaryShearWorkChain";

    fn outline() -> Vec<Outline<Self>> {
        vec![
            Outline::Step("initialize", Self::initialize),
            Outline::While {
                name: "is_run_next_step",
                predicate: Self::is_run_next_step,
                body: vec![
                    Outline::Step(
                        "create_twinboundary_shear_structure",
                        Self::create_twinboundary_shear_structure,
                    ),
                    Outline::Step("run_relax", Self::run_relax),
                    Outline::Step("update_vals", Self::update_vals),
                ],
            },
            Outline::Step("terminate", Self::terminate),
        ]
    }
}
