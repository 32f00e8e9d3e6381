//! # INCAR 写出
//!
//! 标签名统一大写，按字母序输出。
//!
//! ## 依赖关系
//! - 被 `scheduler/staging.rs` 使用
//! - 使用 `config/calculator.rs` 中的 `IncarValue`

use crate::config::IncarValue;
use crate::error::{Result, TwinflowError};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 生成 INCAR 文本
pub fn to_incar_string(tags: &BTreeMap<String, IncarValue>) -> String {
    let mut upper: BTreeMap<String, &IncarValue> = BTreeMap::new();
    for (key, value) in tags {
        upper.insert(key.to_uppercase(), value);
    }

    upper
        .iter()
        .map(|(key, value)| format!("{} = {}\n", key, value))
        .collect()
}

/// 写出 INCAR 文件
pub fn write_incar(path: &Path, tags: &BTreeMap<String, IncarValue>) -> Result<()> {
    fs::write(path, to_incar_string(tags)).map_err(|e| TwinflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
