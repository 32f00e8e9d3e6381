//! # 结果收集
//!
//! 按标签顺序从任务输出中提取标量，组成与形变比例序列一一对应的结果。
//! 任何标签或字段缺失都直接报错，不返回部分结果。
//!
//! ## 依赖关系
//! - 被 `workflow/shear.rs`, `workflow/modulation.rs` 使用
//! - 使用 `models/calculation.rs`

use crate::error::{Result, TwinflowError};
use crate::models::{ScalarField, TaskOutputs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 弛豫结果，顺序与标签一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaxResults {
    pub labels: Vec<String>,
    pub energies: Vec<f64>,
    pub max_forces: Vec<f64>,
    pub volumes: Vec<f64>,
}

/// 按标签顺序提取标量
pub fn collect_scalar(
    outputs: &BTreeMap<String, TaskOutputs>,
    labels: &[String],
    field: ScalarField,
) -> Result<Vec<f64>> {
    labels
        .iter()
        .map(|label| {
            let task = outputs.get(label).ok_or_else(|| TwinflowError::MissingTask {
                label: label.clone(),
            })?;
            task.scalar(field).ok_or_else(|| TwinflowError::MissingOutput {
                label: label.clone(),
                field: field.to_string(),
            })
        })
        .collect()
}

/// 收集弛豫结果
pub fn collect_relax_results(outputs: &BTreeMap<String, TaskOutputs>, labels: &[String]) -> Result<RelaxResults> {
    Ok(RelaxResults {
        labels: labels.to_vec(),
        energies: collect_scalar(outputs, labels, ScalarField::Energy)?,
        max_forces: collect_scalar(outputs, labels, ScalarField::MaxForce)?,
        volumes: collect_scalar(outputs, labels, ScalarField::Volume)?,
    })
}
