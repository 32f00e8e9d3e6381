//! # 计算器设置
//!
//! `relax` / `phonon` / `vasp` 三个计算段的类型化表示，
//! 取代原先松散的字典式配置。未知键直接报错。
//!
//! ## 依赖关系
//! - 被 `builder/`, `kpoints.rs`, `scheduler/staging.rs` 使用

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// INCAR 标签值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<IncarValue>),
}

impl std::fmt::Display for IncarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncarValue::Bool(true) => write!(f, ".TRUE."),
            IncarValue::Bool(false) => write!(f, ".FALSE."),
            IncarValue::Int(v) => write!(f, "{}", v),
            IncarValue::Float(v) => write!(f, "{}", v),
            IncarValue::Str(s) => write!(f, "{}", s),
            IncarValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

/// k 点网格设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KpointsSettings {
    pub mesh: [u32; 3],
    #[serde(default)]
    pub offset: [f64; 3],
}

/// 调度选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsConf {
    #[serde(default)]
    pub queue_name: String,
    #[serde(default = "default_wallclock")]
    pub max_wallclock_seconds: u64,
}

fn default_wallclock() -> u64 {
    100 * 3600
}

impl Default for OptionsConf {
    fn default() -> Self {
        OptionsConf {
            queue_name: String::new(),
            max_wallclock_seconds: default_wallclock(),
        }
    }
}

/// 弛豫设置，所有键可选；未给出的键不会被补默认值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaxConf {
    pub perform: Option<bool>,
    pub algo: Option<String>,
    pub energy_cutoff: Option<f64>,
    pub force_cutoff: Option<f64>,
    pub steps: Option<u32>,
    pub positions: Option<bool>,
    pub shape: Option<bool>,
    pub volume: Option<bool>,
    pub convergence_on: Option<bool>,
    pub convergence_absolute: Option<bool>,
    pub convergence_max_iterations: Option<u32>,
    pub convergence_volume: Option<f64>,
    pub convergence_positions: Option<f64>,
    pub convergence_shape_lengths: Option<f64>,
    pub convergence_shape_angles: Option<f64>,
}

/// phonopy 设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhononConf {
    pub distance: f64,
    #[serde(alias = "phonopy_mesh", skip_serializing_if = "Option::is_none")]
    pub mesh: Option<[u32; 3]>,
    pub supercell_matrix: [u32; 3],
    #[serde(default = "default_symprec")]
    pub symmetry_tolerance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_nac: Option<bool>,
}

fn default_symprec() -> f64 {
    1e-5
}

fn default_true() -> bool {
    true
}

/// 单个计算段（relax / phonon / vasp）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalcSettings {
    pub vasp_code: String,
    #[serde(default = "default_true")]
    pub clean_workdir: bool,
    #[serde(default)]
    pub incar_settings: BTreeMap<String, IncarValue>,
    pub kpoints: KpointsSettings,
    #[serde(default)]
    pub options: OptionsConf,
    #[serde(default)]
    pub parser_settings: BTreeMap<String, bool>,
    pub potential_family: String,
    #[serde(default)]
    pub potential_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relax_conf: Option<RelaxConf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonon_conf: Option<PhononConf>,
}

/// 计算器设置全集
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalculatorSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relax: Option<CalcSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonon: Option<CalcSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vasp: Option<CalcSettings>,
}

impl CalculatorSettings {
    /// 按段名取设置
    pub fn get(&self, section: &str) -> Option<&CalcSettings> {
        match section {
            "relax" => self.relax.as_ref(),
            "phonon" => self.phonon.as_ref(),
            "vasp" => self.vasp.as_ref(),
            _ => None,
        }
    }

    /// 按段名取可变设置
    pub fn get_mut(&mut self, section: &str) -> Option<&mut CalcSettings> {
        match section {
            "relax" => self.relax.as_mut(),
            "phonon" => self.phonon.as_mut(),
            "vasp" => self.vasp.as_mut(),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const SETTINGS: &str = r#"
[relax]
vasp_code = "vasp544mpi"
potential_family = "PBE.54"

[relax.potential_mapping]
Mg = "Mg_pv"

[relax.incar_settings]
addgrid = true
ediff = 1e-06
encut = 300
ismear = 1
prec = "Accurate"

[relax.kpoints]
mesh = [17, 17, 10]
offset = [0.0, 0.0, 0.5]

[relax.options]
queue_name = "debug"
max_wallclock_seconds = 3600000

[relax.parser_settings]
add_energies = true
add_forces = true

[relax.relax_conf]
algo = "rd"
steps = 20
force_cutoff = 0.001
positions = true
shape = true
volume = true
convergence_max_iterations = 2

[phonon]
vasp_code = "vasp544mpi"
potential_family = "PBE.54"

[phonon.potential_mapping]
Mg = "Mg_pv"

[phonon.incar_settings]
encut = 300

[phonon.kpoints]
mesh = [7, 7, 6]
offset = [0.0, 0.0, 0.5]

[phonon.phonon_conf]
distance = 0.03
mesh = [18, 18, 10]
supercell_matrix = [2, 2, 2]
symmetry_tolerance = 1e-05
"#;

    pub fn settings() -> CalculatorSettings {
        toml::from_str(SETTINGS).unwrap()
    }

    #[test]
    fn test_parse_calculator_settings() {
        let s = settings();
        let relax = s.relax.as_ref().unwrap();

        assert_eq!(relax.vasp_code, "vasp544mpi");
        assert!(relax.clean_workdir);
        assert_eq!(relax.kpoints.mesh, [17, 17, 10]);
        assert_eq!(relax.options.queue_name, "debug");
        assert_eq!(relax.incar_settings["encut"], IncarValue::Int(300));
        assert_eq!(relax.incar_settings["ediff"], IncarValue::Float(1e-6));
        assert_eq!(relax.incar_settings["addgrid"], IncarValue::Bool(true));
        assert_eq!(relax.relax_conf.as_ref().unwrap().steps, Some(20));
        assert_eq!(relax.relax_conf.as_ref().unwrap().perform, None);

        let phonon = s.get("phonon").unwrap();
        assert_eq!(phonon.options.max_wallclock_seconds, 360000);
        assert_eq!(phonon.phonon_conf.as_ref().unwrap().supercell_matrix, [2, 2, 2]);
        assert!(s.get("vasp").is_none());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let text = SETTINGS.replace("vasp_code = \"vasp544mpi\"\npotential_family = \"PBE.54\"\n\n[relax.potential_mapping]",
            "vasp_code = \"vasp544mpi\"\npotential_famly = \"PBE.54\"\n\n[relax.potential_mapping]");
        assert!(toml::from_str::<CalculatorSettings>(&text).is_err());
    }

    #[test]
    fn test_incar_value_display() {
        assert_eq!(IncarValue::Bool(false).to_string(), ".FALSE.");
        assert_eq!(IncarValue::Float(0.5).to_string(), "0.5");
        assert_eq!(
            IncarValue::List(vec![IncarValue::Int(1), IncarValue::Int(2)]).to_string(),
            "1 2"
        );
    }
}
