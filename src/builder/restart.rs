//! # 续算与调制构建器
//!
//! 孪晶界剪切的每一步都从上一次弛豫的请求续算；
//! 调制结构使用 `vasp` 段并固定 ISIF = 2。
//!
//! ## 依赖关系
//! - 被 `workflow/twinboundary_shear.rs`, `workflow/modulation.rs` 使用

use super::{code_string, get_calcjob_builder, CalcJobRequest, CalcOptions, Payload};
use crate::config::{CalcSettings, CalculatorSettings, IncarValue, KpointsSettings, ModulationConf, OptionsConf};
use crate::error::{Result, TwinflowError};
use crate::models::Crystal;

const RESTART_CODE: &str = "vasp544mpi";

/// 由上一次弛豫请求构建孪晶界剪切弛豫
#[allow(clippy::too_many_arguments)]
pub fn get_calcjob_builder_for_twinboundary_shear(
    label: &str,
    description: &str,
    computer: &str,
    structure: &Crystal,
    kpoints: &KpointsSettings,
    options: &OptionsConf,
    previous: &CalcJobRequest,
    previous_max_force: f64,
) -> Result<CalcJobRequest> {
    let Payload::Relax { vasp, relax } = &previous.payload else {
        return Err(TwinflowError::InvalidArgument(format!(
            "task '{}' is a {} calculation, restart needs a relax calculation",
            previous.label,
            previous.calc_type()
        )));
    };

    let mut vasp = vasp.clone();
    vasp.kpoints = kpoints.clone();

    let mut relax = relax.clone();
    relax.convergence_max_iterations = Some(40);
    relax.positions = Some(true);
    relax.shape = Some(false);
    relax.volume = Some(false);
    relax.convergence_positions = Some(1e-4);
    relax.force_cutoff = Some(previous_max_force);

    Ok(CalcJobRequest {
        label: label.to_string(),
        description: description.to_string(),
        code: code_string(RESTART_CODE, computer),
        options: CalcOptions::from(options),
        structure: structure.clone(),
        payload: Payload::Relax { vasp, relax },
    })
}

/// 构建调制结构的单点 VASP 计算
pub fn get_calcjob_builder_for_modulation(
    label: &str,
    description: &str,
    computer: &str,
    structure: &Crystal,
    modulation_conf: &ModulationConf,
    vasp_settings: &CalcSettings,
) -> Result<CalcJobRequest> {
    let mut settings = vasp_settings.clone();
    settings
        .incar_settings
        .extend(modulation_conf.incar_update_settings.clone());
    settings
        .incar_settings
        .insert("isif".to_string(), IncarValue::Int(2));

    let calculator_settings = CalculatorSettings {
        vasp: Some(settings),
        ..Default::default()
    };
    get_calcjob_builder(label, description, "vasp", computer, structure, &calculator_settings)
}
