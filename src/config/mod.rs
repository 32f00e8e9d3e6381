//! # 配置模块
//!
//! 所有 TOML 配置的类型化表示：计算器设置、工作流输入与计算机配置。
//!
//! ## 依赖关系
//! - 被 `builder/`, `kpoints.rs`, `workflow/`, `commands/` 使用
//! - 使用 `serde` + `toml`
//! - 子模块: calculator, workflow, profile

pub mod calculator;
pub mod profile;
pub mod workflow;

pub use calculator::{
    CalcSettings, CalculatorSettings, IncarValue, KpointsSettings, OptionsConf, PhononConf,
    RelaxConf,
};
pub use profile::{ComputerProfile, Profile, SchedulerKind};
pub use workflow::{
    DecimalHandling, KpointsConf, ModulationConf, ModulationInput, PhononMode, ShearConf,
    ShearInput, TwinBoundaryConf, TwinBoundaryRelaxInput, TwinBoundaryShearConf,
    TwinBoundaryShearInput,
};

use crate::error::{Result, TwinflowError};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// 读取并反序列化 TOML 文件
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| TwinflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| TwinflowError::ConfigError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
