//! # 工作流输入
//!
//! 每次工作流运行对应一个 TOML 输入文件。结构文件路径相对输入文件解析。
//!
//! ## 依赖关系
//! - 被 `workflow/`, `commands/workflow.rs`, `commands/generate.rs` 使用
//! - 使用 `config/calculator.rs`

use super::calculator::{CalculatorSettings, IncarValue, OptionsConf};
use super::load_toml;
use crate::error::{Result, TwinflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn default_expansion() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

fn default_true() -> bool {
    true
}

/// 相对路径以输入文件所在目录为基准
fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.parent()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|| path.to_path_buf())
    }
}

// ─────────────────────────────────────────────────────────────
// k 点
// ─────────────────────────────────────────────────────────────

/// 网格取整方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalHandling {
    #[default]
    Round,
    Floor,
    Ceil,
}

impl FromStr for DecimalHandling {
    type Err = TwinflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "round" => Ok(DecimalHandling::Round),
            "floor" => Ok(DecimalHandling::Floor),
            "ceil" => Ok(DecimalHandling::Ceil),
            other => Err(TwinflowError::InvalidArgument(format!(
                "decimal_handling must be round, floor or ceil, got '{}'",
                other
            ))),
        }
    }
}

/// 由 k 点间距导出网格的设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KpointsConf {
    pub interval: f64,
    #[serde(default)]
    pub decimal_handling: DecimalHandling,
    #[serde(default = "default_true")]
    pub use_symmetry: bool,
    #[serde(default = "default_true")]
    pub include_two_pi: bool,
}

impl KpointsConf {
    pub fn new(interval: f64) -> Self {
        KpointsConf {
            interval,
            decimal_handling: DecimalHandling::Round,
            use_symmetry: true,
            include_two_pi: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 剪切
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShearConf {
    pub twinmode: String,
    pub grids: usize,
    #[serde(default = "default_expansion")]
    pub expansion_ratios: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShearInput {
    pub computer: String,
    pub structure: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub is_phonon: bool,
    #[serde(default)]
    pub use_kpoints_interval: bool,
    pub kpoints_conf: Option<KpointsConf>,
    pub shear_conf: ShearConf,
    #[serde(default)]
    pub calculator_settings: CalculatorSettings,
}

impl ShearInput {
    pub fn load(path: &Path) -> Result<Self> {
        let mut input: ShearInput = load_toml(path)?;
        input.structure = resolve(path, &input.structure);
        Ok(input)
    }
}

// ─────────────────────────────────────────────────────────────
// 孪晶界弛豫
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwinBoundaryConf {
    pub twinmode: String,
    pub twintype: u8,
    pub layers: usize,
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub xshift: f64,
    #[serde(default)]
    pub yshift: f64,
    #[serde(default)]
    pub shear_strain_ratio: f64,
    #[serde(default = "default_expansion")]
    pub expansion_ratios: [f64; 3],
    #[serde(default = "default_true")]
    pub make_tb_flat: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwinBoundaryRelaxInput {
    pub computer: String,
    pub structure: PathBuf,
    #[serde(alias = "twinboundary_relax_conf")]
    pub twinboundary_conf: TwinBoundaryConf,
    #[serde(default)]
    pub use_kpoints_interval: bool,
    pub kpoints_conf: Option<KpointsConf>,
    #[serde(default)]
    pub calculator_settings: CalculatorSettings,
}

impl TwinBoundaryRelaxInput {
    pub fn load(path: &Path) -> Result<Self> {
        let mut input: TwinBoundaryRelaxInput = load_toml(path)?;
        input.structure = resolve(path, &input.structure);
        Ok(input)
    }
}

// ─────────────────────────────────────────────────────────────
// 孪晶界剪切
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwinBoundaryShearConf {
    /// 孪晶界弛豫工作流的运行目录
    pub twinboundary_relax_dir: PathBuf,
    /// 追加弛豫的任务目录，按时间顺序
    #[serde(default)]
    pub additional_relax_dirs: Vec<PathBuf>,
    pub shear_strain_ratios: Vec<f64>,
    #[serde(default)]
    pub options: OptionsConf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwinBoundaryShearInput {
    pub computer: String,
    pub twinboundary_shear_conf: TwinBoundaryShearConf,
}

impl TwinBoundaryShearInput {
    pub fn load(path: &Path) -> Result<Self> {
        let mut input: TwinBoundaryShearInput = load_toml(path)?;
        let conf = &mut input.twinboundary_shear_conf;
        conf.twinboundary_relax_dir = resolve(path, &conf.twinboundary_relax_dir);
        conf.additional_relax_dirs = conf
            .additional_relax_dirs
            .iter()
            .map(|d| resolve(path, d))
            .collect();
        Ok(input)
    }
}

// ─────────────────────────────────────────────────────────────
// 调制
// ─────────────────────────────────────────────────────────────

/// 单个声子模式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhononMode {
    pub qpoint: [f64; 3],
    pub band_index: usize,
    pub amplitude: f64,
    /// 相位（度）
    #[serde(default)]
    pub phase: f64,
    pub frequency: Option<f64>,
    /// 原胞内每个原子的笛卡尔本征矢
    pub eigenvector: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModulationConf {
    pub dimension: [u32; 3],
    pub phonon_modes: Vec<PhononMode>,
    #[serde(default)]
    pub incar_update_settings: BTreeMap<String, IncarValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModulationInput {
    pub computer: String,
    pub structure: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    pub modulation_conf: ModulationConf,
    #[serde(default)]
    pub calculator_settings: CalculatorSettings,
}

impl ModulationInput {
    pub fn load(path: &Path) -> Result<Self> {
        let mut input: ModulationInput = load_toml(path)?;
        input.structure = resolve(path, &input.structure);
        Ok(input)
    }
}
