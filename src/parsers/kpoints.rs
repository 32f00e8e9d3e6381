//! # KPOINTS 写出
//!
//! 自动网格格式（Gamma 中心 + 偏移）。
//!
//! ## 依赖关系
//! - 被 `scheduler/staging.rs` 使用

use crate::config::KpointsSettings;
use crate::error::{Result, TwinflowError};
use std::fs;
use std::path::Path;

/// 生成 KPOINTS 文本
pub fn to_kpoints_string(kpoints: &KpointsSettings) -> String {
    let [n1, n2, n3] = kpoints.mesh;
    let [s1, s2, s3] = kpoints.offset;
    format!(
        "Automatic mesh\n0\nGamma\n  {} {} {}\n  {} {} {}\n",
        n1, n2, n3, s1, s2, s3
    )
}

/// 写出 KPOINTS 文件
pub fn write_kpoints(path: &Path, kpoints: &KpointsSettings) -> Result<()> {
    fs::write(path, to_kpoints_string(kpoints)).map_err(|e| TwinflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
