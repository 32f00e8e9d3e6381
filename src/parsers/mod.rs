//! # 解析器模块
//!
//! VASP 输入文件的写出与输出文件的读取。
//!
//! ## 依赖关系
//! - 被 `scheduler/`, `workflow/`, `commands/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, outcar, incar, kpoints

pub mod incar;
pub mod kpoints;
pub mod outcar;
pub mod poscar;
