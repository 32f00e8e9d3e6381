//! # 弛豫属性
//!
//! `relax_conf` 到弛豫属性的转换，以及弛豫属性对应的 INCAR 标签。
//!
//! ## 依赖关系
//! - 被 `builder/mod.rs`, `builder/restart.rs`, `scheduler/staging.rs` 使用

use crate::config::{IncarValue, RelaxConf};
use crate::error::{Result, TwinflowError};
use crate::utils::output::print_warning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 弛豫属性，只携带配置中出现过的键
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelaxAttribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perform: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_cutoff: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_cutoff: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_absolute: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_positions: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_shape_lengths: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_shape_angles: Option<f64>,
}

/// 由 `relax_conf` 生成弛豫属性，`perform` 强制为 true
pub fn get_relax_attribute(relax_conf: &RelaxConf) -> RelaxAttribute {
    if let Some(perform) = relax_conf.perform {
        if !perform {
            print_warning("key perform in 'relax_conf' is overwritten to true");
        }
    }

    RelaxAttribute {
        perform: Some(true),
        algo: relax_conf.algo.clone(),
        energy_cutoff: relax_conf.energy_cutoff,
        force_cutoff: relax_conf.force_cutoff,
        steps: relax_conf.steps,
        positions: relax_conf.positions,
        shape: relax_conf.shape,
        volume: relax_conf.volume,
        convergence_on: relax_conf.convergence_on,
        convergence_absolute: relax_conf.convergence_absolute,
        convergence_max_iterations: relax_conf.convergence_max_iterations,
        convergence_volume: relax_conf.convergence_volume,
        convergence_positions: relax_conf.convergence_positions,
        convergence_shape_lengths: relax_conf.convergence_shape_lengths,
        convergence_shape_angles: relax_conf.convergence_shape_angles,
    }
}

impl RelaxAttribute {
    /// 由自由度组合确定 ISIF
    pub fn isif(&self) -> Result<i64> {
        let positions = self.positions.unwrap_or(true);
        let shape = self.shape.unwrap_or(false);
        let volume = self.volume.unwrap_or(false);

        match (positions, shape, volume) {
            (true, false, false) => Ok(2),
            (true, true, true) => Ok(3),
            (true, true, false) => Ok(4),
            (false, true, false) => Ok(5),
            (false, true, true) => Ok(6),
            (false, false, true) => Ok(7),
            _ => Err(TwinflowError::InvalidArgument(format!(
                "no ISIF relaxes positions={}, shape={}, volume={}",
                positions, shape, volume
            ))),
        }
    }

    /// 弛豫对应的 INCAR 标签（小写键）
    pub fn incar_tags(&self) -> Result<BTreeMap<String, IncarValue>> {
        let mut tags = BTreeMap::new();
        if !self.perform.unwrap_or(false) {
            return Ok(tags);
        }

        tags.insert("isif".to_string(), IncarValue::Int(self.isif()?));

        let ibrion = match self.algo.as_deref() {
            None | Some("cg") => 2,
            Some("rd") => 1,
            Some(other) => {
                return Err(TwinflowError::InvalidArgument(format!(
                    "relax algo must be 'cg' or 'rd', got '{}'",
                    other
                )))
            }
        };
        tags.insert("ibrion".to_string(), IncarValue::Int(ibrion));

        if let Some(steps) = self.steps {
            tags.insert("nsw".to_string(), IncarValue::Int(steps as i64));
        }

        match (self.force_cutoff, self.energy_cutoff) {
            (Some(force), _) => {
                tags.insert("ediffg".to_string(), IncarValue::Float(-force));
            }
            (None, Some(energy)) => {
                tags.insert("ediffg".to_string(), IncarValue::Float(energy));
            }
            (None, None) => {}
        }

        Ok(tags)
    }

    /// 外层弛豫循环次数
    pub fn max_iterations(&self) -> u32 {
        if self.convergence_on == Some(false) {
            1
        } else {
            self.convergence_max_iterations.unwrap_or(5).max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relax_attribute_copies_present_keys_only() {
        let conf = RelaxConf {
            algo: Some("rd".to_string()),
            steps: Some(20),
            force_cutoff: Some(0.001),
            ..Default::default()
        };
        let attr = get_relax_attribute(&conf);

        assert_eq!(attr.perform, Some(true));
        assert_eq!(attr.algo.as_deref(), Some("rd"));
        assert_eq!(attr.steps, Some(20));
        assert_eq!(attr.energy_cutoff, None);
        assert_eq!(attr.shape, None);

        let json = serde_json::to_value(&attr).unwrap();
        assert!(json.get("shape").is_none());
        assert_eq!(json["perform"], true);
    }

    #[test]
    fn test_perform_is_overwritten() {
        let conf = RelaxConf {
            perform: Some(false),
            ..Default::default()
        };
        assert_eq!(get_relax_attribute(&conf).perform, Some(true));
    }

    #[test]
    fn test_isif_table() {
        let cases = [
            ((true, false, false), 2),
            ((true, true, true), 3),
            ((true, true, false), 4),
            ((false, true, false), 5),
            ((false, true, true), 6),
            ((false, false, true), 7),
        ];
        for ((positions, shape, volume), isif) in cases {
            let attr = RelaxAttribute {
                positions: Some(positions),
                shape: Some(shape),
                volume: Some(volume),
                ..Default::default()
            };
            assert_eq!(attr.isif().unwrap(), isif);
        }

        let frozen = RelaxAttribute {
            positions: Some(false),
            ..Default::default()
        };
        assert!(frozen.isif().is_err());
        assert_eq!(RelaxAttribute::default().isif().unwrap(), 2);
    }

    #[test]
    fn test_incar_tags() {
        let attr = RelaxAttribute {
            perform: Some(true),
            algo: Some("rd".to_string()),
            steps: Some(20),
            force_cutoff: Some(0.001),
            energy_cutoff: Some(1e-4),
            positions: Some(true),
            shape: Some(true),
            volume: Some(true),
            ..Default::default()
        };
        let tags = attr.incar_tags().unwrap();
        assert_eq!(tags["isif"], IncarValue::Int(3));
        assert_eq!(tags["ibrion"], IncarValue::Int(1));
        assert_eq!(tags["nsw"], IncarValue::Int(20));
        assert_eq!(tags["ediffg"], IncarValue::Float(-0.001));

        let energy_only = RelaxAttribute {
            perform: Some(true),
            energy_cutoff: Some(1e-4),
            ..Default::default()
        };
        let tags = energy_only.incar_tags().unwrap();
        assert_eq!(tags["ibrion"], IncarValue::Int(2));
        assert_eq!(tags["ediffg"], IncarValue::Float(1e-4));

        assert!(RelaxAttribute::default().incar_tags().unwrap().is_empty());
    }
}
