//! # 计算请求构建器
//!
//! 把计算器设置组装成可落地的计算请求 `CalcJobRequest`：
//! 计算类型、代码、调度选项、结构以及 VASP/phonopy 输入。
//! 构建器不做任何 I/O，任务目录由 `scheduler/staging.rs` 写出。
//!
//! ## 依赖关系
//! - 被 `workflow/`, `scheduler/staging.rs` 使用
//! - 使用 `config/calculator.rs`, `models/structure.rs`
//! - 子模块: relax, phonon, restart

pub mod phonon;
pub mod relax;
pub mod restart;

pub use phonon::{ForcesConfig, PhononInputs};
pub use relax::{get_relax_attribute, RelaxAttribute};
pub use restart::{get_calcjob_builder_for_modulation, get_calcjob_builder_for_twinboundary_shear};

use crate::config::{CalcSettings, CalculatorSettings, IncarValue, KpointsSettings, OptionsConf};
use crate::error::{Result, TwinflowError};
use crate::models::Crystal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 计算类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcType {
    Vasp,
    Relax,
    Phonon,
}

impl CalcType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalcType::Vasp => "vasp",
            CalcType::Relax => "relax",
            CalcType::Phonon => "phonon",
        }
    }
}

impl fmt::Display for CalcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CalcType {
    type Err = TwinflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vasp" => Ok(CalcType::Vasp),
            "relax" => Ok(CalcType::Relax),
            "phonon" => Ok(CalcType::Phonon),
            other => Err(TwinflowError::UnsupportedCalcType(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 调度选项
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub tot_num_mpiprocs: u32,
    pub parallel_env: String,
}

/// 作业调度选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcOptions {
    pub account: String,
    pub qos: String,
    pub resources: Resources,
    pub queue_name: String,
    pub max_wallclock_seconds: u64,
}

/// 组装调度选项
pub fn get_options(queue_name: &str, max_wallclock_seconds: u64) -> CalcOptions {
    CalcOptions {
        account: String::new(),
        qos: String::new(),
        resources: Resources {
            tot_num_mpiprocs: 16,
            parallel_env: "mpi*".to_string(),
        },
        queue_name: queue_name.to_string(),
        max_wallclock_seconds,
    }
}

impl From<&OptionsConf> for CalcOptions {
    fn from(conf: &OptionsConf) -> Self {
        get_options(&conf.queue_name, conf.max_wallclock_seconds)
    }
}

// ─────────────────────────────────────────────────────────────
// 计算请求
// ─────────────────────────────────────────────────────────────

/// 单次 VASP 计算的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaspInputs {
    pub clean_workdir: bool,
    pub verbose: bool,
    pub incar: BTreeMap<String, IncarValue>,
    pub parser_settings: BTreeMap<String, bool>,
    pub kpoints: KpointsSettings,
    pub potential_family: String,
    pub potential_mapping: BTreeMap<String, String>,
}

impl VaspInputs {
    fn from_settings(settings: &CalcSettings) -> Self {
        VaspInputs {
            clean_workdir: settings.clean_workdir,
            verbose: true,
            incar: settings.incar_settings.clone(),
            parser_settings: settings.parser_settings.clone(),
            kpoints: settings.kpoints.clone(),
            potential_family: settings.potential_family.clone(),
            potential_mapping: settings.potential_mapping.clone(),
        }
    }
}

/// 按计算类型区分的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "calc_type", rename_all = "lowercase")]
pub enum Payload {
    Vasp(VaspInputs),
    Relax {
        vasp: VaspInputs,
        relax: RelaxAttribute,
    },
    Phonon(PhononInputs),
}

/// 计算请求，对应一个任务目录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcJobRequest {
    pub label: String,
    pub description: String,
    /// `<code>@<computer>`
    pub code: String,
    pub options: CalcOptions,
    pub structure: Crystal,
    pub payload: Payload,
}

impl CalcJobRequest {
    pub fn calc_type(&self) -> CalcType {
        match self.payload {
            Payload::Vasp(_) => CalcType::Vasp,
            Payload::Relax { .. } => CalcType::Relax,
            Payload::Phonon(_) => CalcType::Phonon,
        }
    }

    /// VASP 输入（声子计算为受力计算的输入）
    pub fn vasp_inputs(&self) -> Option<&VaspInputs> {
        match &self.payload {
            Payload::Vasp(vasp) | Payload::Relax { vasp, .. } => Some(vasp),
            Payload::Phonon(_) => None,
        }
    }

    pub fn relax(&self) -> Option<&RelaxAttribute> {
        match &self.payload {
            Payload::Relax { relax, .. } => Some(relax),
            _ => None,
        }
    }

    /// 代码名（去掉 `@computer`）
    pub fn code_name(&self) -> &str {
        self.code.split('@').next().unwrap_or(&self.code)
    }
}

/// 代码字符串 `<code>@<computer>`
pub fn code_string(code: &str, computer: &str) -> String {
    format!("{}@{}", code, computer)
}

fn section<'a>(settings: &'a CalculatorSettings, calc_type: CalcType) -> Result<&'a CalcSettings> {
    settings
        .get(calc_type.as_str())
        .ok_or_else(|| TwinflowError::MissingSetting {
            section: "calculator_settings".to_string(),
            key: calc_type.as_str().to_string(),
        })
}

/// 构建计算请求
///
/// `calc_type` 为 "vasp"、"relax" 或 "phonon"，其余值返回
/// `UnsupportedCalcType`。
pub fn get_calcjob_builder(
    label: &str,
    description: &str,
    calc_type: &str,
    computer: &str,
    structure: &Crystal,
    calculator_settings: &CalculatorSettings,
) -> Result<CalcJobRequest> {
    let calc_type: CalcType = calc_type.parse()?;
    let settings = section(calculator_settings, calc_type)?;

    let (code, payload) = match calc_type {
        CalcType::Vasp => (
            code_string(&settings.vasp_code, computer),
            Payload::Vasp(VaspInputs::from_settings(settings)),
        ),
        CalcType::Relax => {
            let relax_conf = settings
                .relax_conf
                .as_ref()
                .ok_or_else(|| TwinflowError::MissingSetting {
                    section: "relax".to_string(),
                    key: "relax_conf".to_string(),
                })?;
            (
                code_string(&settings.vasp_code, computer),
                Payload::Relax {
                    vasp: VaspInputs::from_settings(settings),
                    relax: get_relax_attribute(relax_conf),
                },
            )
        }
        CalcType::Phonon => (
            code_string("phonopy", computer),
            Payload::Phonon(phonon::get_phonon_vasp_settings(computer, settings)?),
        ),
    };

    Ok(CalcJobRequest {
        label: label.to_string(),
        description: description.to_string(),
        code,
        options: CalcOptions::from(&settings.options),
        structure: structure.clone(),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::calculator::tests::settings;
    use crate::crystal::tests::hcp_mg;

    #[test]
    fn test_calc_type_parse() {
        assert_eq!("relax".parse::<CalcType>().unwrap(), CalcType::Relax);
        let err = "md".parse::<CalcType>().unwrap_err();
        assert_eq!(err.to_string(), "calc_type: md is not supported");
    }

    #[test]
    fn test_get_options_defaults() {
        let options = get_options("", 100 * 3600);
        assert_eq!(options.resources.tot_num_mpiprocs, 16);
        assert_eq!(options.resources.parallel_env, "mpi*");
        assert_eq!(options.max_wallclock_seconds, 360000);
        assert!(options.account.is_empty());
    }

    #[test]
    fn test_relax_builder() {
        let request = get_calcjob_builder(
            "rlx_shear_000",
            "rlx_shear_000, ratio: 0.000000",
            "relax",
            "stern",
            &hcp_mg(),
            &settings(),
        )
        .unwrap();

        assert_eq!(request.code, "vasp544mpi@stern");
        assert_eq!(request.code_name(), "vasp544mpi");
        assert_eq!(request.calc_type(), CalcType::Relax);
        assert_eq!(request.options.queue_name, "debug");

        let vasp = request.vasp_inputs().unwrap();
        assert!(vasp.verbose);
        assert_eq!(vasp.kpoints.mesh, [17, 17, 10]);
        assert_eq!(vasp.potential_mapping["Mg"], "Mg_pv");

        let relax = request.relax().unwrap();
        assert_eq!(relax.perform, Some(true));
        assert_eq!(relax.convergence_max_iterations, Some(2));
        assert_eq!(relax.energy_cutoff, None);
    }

    #[test]
    fn test_request_json_is_tagged() {
        let request = get_calcjob_builder("x", "x", "vasp", "stern", &hcp_mg(), &{
            let mut s = settings();
            s.vasp = s.relax.clone();
            s
        })
        .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["payload"]["calc_type"], "vasp");

        let back: CalcJobRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.calc_type(), CalcType::Vasp);
    }

    #[test]
    fn test_missing_section_and_unknown_type() {
        assert!(matches!(
            get_calcjob_builder("x", "x", "vasp", "stern", &hcp_mg(), &settings()),
            Err(TwinflowError::MissingSetting { .. })
        ));
        assert!(matches!(
            get_calcjob_builder("x", "x", "md", "stern", &hcp_mg(), &settings()),
            Err(TwinflowError::UnsupportedCalcType(_))
        ));

        let mut no_relax_conf = settings();
        if let Some(relax) = no_relax_conf.relax.as_mut() {
            relax.relax_conf = None;
        }
        assert!(matches!(
            get_calcjob_builder("x", "x", "relax", "stern", &hcp_mg(), &no_relax_conf),
            Err(TwinflowError::MissingSetting { .. })
        ));
    }
}
