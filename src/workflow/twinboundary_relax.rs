//! # 孪晶界弛豫工作流
//!
//! 生成孪晶界结构并以固定晶胞（ISIF = 2）弛豫原子位置。
//! `twinboundary_orig` 一并输出，供后续的孪晶界剪切工作流使用。
//!
//! ## 依赖关系
//! - 被 `commands/workflow.rs` 使用
//! - 使用 `crystal/twinboundary.rs`, `builder/`, `kpoints.rs`

use super::{Outline, OutputValue, RunContext, WorkChain};
use crate::builder::{get_calcjob_builder, get_relax_attribute};
use crate::config::{CalculatorSettings, TwinBoundaryRelaxInput};
use crate::crystal::get_twinboundary_structure;
use crate::error::{Result, TwinflowError};
use crate::kpoints::fix_kpoints;
use crate::models::Crystal;
use crate::parsers::poscar;

/// 弛豫任务标签
pub const RELAX_LABEL: &str = "relax_twinboundary";

pub struct TwinBoundaryRelaxWorkChain {
    input: TwinBoundaryRelaxInput,
    structure: Crystal,
    calculator_settings: CalculatorSettings,
    twinboundary: Option<Crystal>,
}

impl TwinBoundaryRelaxWorkChain {
    pub fn new(input: TwinBoundaryRelaxInput) -> Result<Self> {
        let structure = poscar::parse_poscar_file(&input.structure)?;
        Ok(Self::with_structure(input, structure))
    }

    pub fn with_structure(input: TwinBoundaryRelaxInput, structure: Crystal) -> Self {
        let calculator_settings = input.calculator_settings.clone();
        TwinBoundaryRelaxWorkChain {
            input,
            structure,
            calculator_settings,
            twinboundary: None,
        }
    }

    fn initialize(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Start TwinBoundaryRelaxWorkChain.");
        Ok(())
    }

    fn terminate(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# TwinBoundaryRelaxWorkChain has finished successfully.");
        ctx.report(Self::NAME, "All jobs have finished.");
        ctx.report(Self::NAME, "Terminate TwinBoundaryRelaxWorkChain.");
        Ok(())
    }

    /// 只允许原子位置弛豫；不满足时仅报告警告
    fn check_initial_isif_is_two(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Check initial ISIF is 2.");
        let relax_conf = self
            .calculator_settings
            .relax
            .as_ref()
            .and_then(|r| r.relax_conf.as_ref())
            .ok_or_else(|| TwinflowError::MissingSetting {
                section: "relax".to_string(),
                key: "relax_conf".to_string(),
            })?;

        let relax = get_relax_attribute(relax_conf);
        let dofs = (
            relax.positions.unwrap_or(true),
            relax.volume.unwrap_or(false),
            relax.shape.unwrap_or(false),
        );
        if dofs == (true, false, false) {
            ctx.report(Self::NAME, "OK.");
        } else {
            ctx.report(Self::NAME, "+++++++++++++++++++++++++");
            ctx.report(Self::NAME, "(WARNING): ISIF IS NOT 2.");
            ctx.report(Self::NAME, "+++++++++++++++++++++++++");
        }
        Ok(())
    }

    fn create_twinboundary_structure(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Create twinboundary structure.");
        let tb = get_twinboundary_structure(&self.structure, &self.input.twinboundary_conf)?;

        ctx.write_structure(&tb.original)?;
        ctx.write_structure(&tb.standardized)?;
        ctx.out("twinboundary_parameters", OutputValue::Dict(tb.parameters));
        ctx.out("twinboundary_orig", OutputValue::Structure(tb.original));
        self.twinboundary = Some(tb.standardized);
        ctx.report(Self::NAME, "# Finish create twinboundary structure.");
        Ok(())
    }

    fn run_relax(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Run relax calculations.");
        let structure = self
            .twinboundary
            .clone()
            .ok_or_else(|| TwinflowError::Other("twin boundary structure has not been created".to_string()))?;

        if self.input.use_kpoints_interval {
            let kpoints_conf = self
                .input
                .kpoints_conf
                .as_ref()
                .ok_or_else(|| TwinflowError::MissingSetting {
                    section: "input".to_string(),
                    key: "kpoints_conf".to_string(),
                })?;
            let (settings, _) = fix_kpoints(&self.calculator_settings, &structure, kpoints_conf, false)?;
            self.calculator_settings = settings;
        }

        let request = get_calcjob_builder(
            RELAX_LABEL,
            RELAX_LABEL,
            "relax",
            &ctx.computer,
            &structure,
            &self.calculator_settings,
        )?;
        let handle = ctx.submit(&request)?;
        ctx.report(
            Self::NAME,
            &format!(
                "{} relax workflow has submitted, job: {}",
                RELAX_LABEL,
                handle.job_id.as_deref().unwrap_or("-")
            ),
        );
        Ok(())
    }

    fn extract_final_structure(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Extract final structure.");
        let structure = ctx
            .task_outputs(RELAX_LABEL)?
            .final_structure
            .ok_or_else(|| TwinflowError::MissingOutput {
                label: RELAX_LABEL.to_string(),
                field: "final_structure".to_string(),
            })?;
        ctx.out("final_structure", OutputValue::Structure(structure));
        ctx.report(Self::NAME, "Finish extract final structure.");
        Ok(())
    }
}

impl WorkChain for TwinBoundaryRelaxWorkChain {
    const NAME: &'static str = "TwinBoundaryRelaxWorkChain";

    fn outline() -> Vec<Outline<Self>> {
        vec![
            Outline::Step("initialize", Self::initialize),
            Outline::Step("check_initial_isif_is_two", Self::check_initial_isif_is_two),
            Outline::Step("create_twinboundary_structure", Self::create_twinboundary_structure),
            Outline::Step("run_relax", Self::run_relax),
            Outline::Step("extract_final_structure", Self::extract_final_structure),
            Outline::Step("terminate", Self::terminate),
        ]
    }
}
