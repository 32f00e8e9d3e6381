//! # 数据模型模块
//!
//! 定义统一的晶体结构和任务输出数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `crystal/`, `builder/`, `workflow/` 使用
//! - 子模块: structure, calculation

pub mod calculation;
pub mod structure;

pub use calculation::{ScalarField, TaskOutputs};
pub use structure::{wrap_fraction, Atom, Crystal, Lattice};
