//! # phonopy 计算输入
//!
//! 声子计算由 phonopy 生成位移超胞、VASP 计算受力、phonopy 汇总 FORCE_SETS。
//!
//! ## 依赖关系
//! - 被 `builder/mod.rs`, `scheduler/staging.rs` 使用

use super::{code_string, CalcOptions};
use crate::config::{CalcSettings, IncarValue, PhononConf};
use crate::error::{Result, TwinflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 受力计算设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcesConfig {
    pub code_string: String,
    pub kpoints_mesh: [u32; 3],
    pub kpoints_offset: [f64; 3],
    pub potential_family: String,
    pub potential_mapping: BTreeMap<String, String>,
    pub options: CalcOptions,
    pub parser_settings: BTreeMap<String, bool>,
    pub incar: BTreeMap<String, IncarValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhononInputs {
    pub run_phonopy: bool,
    pub remote_phonopy: bool,
    pub phonon_settings: PhononConf,
    pub forces: ForcesConfig,
}

/// 由 phonon 段组装 phonopy 输入，`is_nac` 固定为 false
pub fn get_phonon_vasp_settings(computer: &str, settings: &CalcSettings) -> Result<PhononInputs> {
    let mut phonon_settings = settings
        .phonon_conf
        .clone()
        .ok_or_else(|| TwinflowError::MissingSetting {
            section: "phonon".to_string(),
            key: "phonon_conf".to_string(),
        })?;
    phonon_settings.is_nac = Some(false);

    let parser_settings = ["add_energies", "add_forces", "add_stress"]
        .iter()
        .map(|k| (k.to_string(), true))
        .collect();

    let forces = ForcesConfig {
        code_string: code_string(&settings.vasp_code, computer),
        kpoints_mesh: settings.kpoints.mesh,
        kpoints_offset: settings.kpoints.offset,
        potential_family: settings.potential_family.clone(),
        potential_mapping: settings.potential_mapping.clone(),
        options: CalcOptions::from(&settings.options),
        parser_settings,
        incar: settings.incar_settings.clone(),
    };

    Ok(PhononInputs {
        run_phonopy: true,
        remote_phonopy: false,
        phonon_settings,
        forces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{get_calcjob_builder, CalcType, Payload};
    use crate::config::calculator::tests::settings;
    use crate::crystal::tests::hcp_mg;

    #[test]
    fn test_phonon_builder() {
        let request =
            get_calcjob_builder("ph_shear_000", "ph_shear_000", "phonon", "stern", &hcp_mg(), &settings())
                .unwrap();

        assert_eq!(request.code, "phonopy@stern");
        assert_eq!(request.calc_type(), CalcType::Phonon);
        assert!(request.vasp_inputs().is_none());

        let Payload::Phonon(inputs) = &request.payload else {
            panic!("expected phonon payload");
        };
        assert!(inputs.run_phonopy);
        assert!(!inputs.remote_phonopy);
        assert_eq!(inputs.phonon_settings.is_nac, Some(false));
        assert_eq!(inputs.phonon_settings.supercell_matrix, [2, 2, 2]);
        assert_eq!(inputs.forces.code_string, "vasp544mpi@stern");
        assert_eq!(inputs.forces.kpoints_mesh, [7, 7, 6]);
        assert_eq!(inputs.forces.parser_settings.len(), 3);
        assert!(inputs.forces.parser_settings.values().all(|&v| v));
    }

    #[test]
    fn test_missing_phonon_conf() {
        let mut s = settings();
        if let Some(phonon) = s.phonon.as_mut() {
            phonon.phonon_conf = None;
        }
        assert!(matches!(
            get_phonon_vasp_settings("stern", s.phonon.as_ref().unwrap()),
            Err(TwinflowError::MissingSetting { .. })
        ));
    }
}
