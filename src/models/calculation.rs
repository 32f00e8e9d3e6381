//! # 计算结果数据模型
//!
//! 存储单个 VASP 任务目录中提取出的信息（能量、受力、最终结构）。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs` 构造
//! - 被 `collector.rs`, `workflow/`, `commands/collect.rs` 使用

use super::Crystal;
use serde::{Deserialize, Serialize};

/// 可被收集器提取的标量字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarField {
    /// energy(sigma->0)
    Energy,
    /// 焓（恒压计算）
    Enthalpy,
    /// 最后一步的最大原子受力
    MaxForce,
    /// 晶胞体积
    Volume,
}

impl std::fmt::Display for ScalarField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarField::Energy => write!(f, "energy"),
            ScalarField::Enthalpy => write!(f, "enthalpy"),
            ScalarField::MaxForce => write!(f, "max_force"),
            ScalarField::Volume => write!(f, "volume"),
        }
    }
}

/// 单个任务的输出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutputs {
    /// 任务标签
    pub label: String,

    /// 计算是否完成
    pub is_finished: bool,

    /// 能量 (eV)
    pub energy_ev: Option<f64>,

    /// 焓 (eV)
    pub enthalpy_ev: Option<f64>,

    /// 最大原子受力 (eV/Å)
    pub max_force: Option<f64>,

    /// 体积 (Å³)
    pub volume: Option<f64>,

    /// 原子数
    pub num_atoms: Option<usize>,

    /// 最终结构（CONTCAR）
    pub final_structure: Option<Crystal>,
}

impl TaskOutputs {
    pub fn new(label: impl Into<String>) -> Self {
        TaskOutputs {
            label: label.into(),
            ..Default::default()
        }
    }

    /// 提取标量字段
    pub fn scalar(&self, field: ScalarField) -> Option<f64> {
        match field {
            ScalarField::Energy => self.energy_ev,
            ScalarField::Enthalpy => self.enthalpy_ev,
            ScalarField::MaxForce => self.max_force,
            ScalarField::Volume => self.volume,
        }
    }

    /// 计算每原子能量
    pub fn energy_per_atom(&self) -> Option<f64> {
        match (self.energy_ev, self.num_atoms) {
            (Some(e), Some(n)) if n > 0 => Some(e / n as f64),
            _ => None,
        }
    }
}
