//! # 声子调制结构
//!
//! 对每个声子模式 `{q, band, A, φ, ê}`，在 `dimension` 超胞中把原胞原子 j
//! 在晶格平移 t 处的像位移 `A · ê_j · cos(2π q·t + φ)`。
//! 本征矢按整体归一化（所有原子分量平方和为 1）。
//!
//! ## 依赖关系
//! - 被 `workflow/modulation.rs` 使用
//! - 使用 `crystal/supercell.rs`

use super::supercell::{diagonal, make_supercell};
use crate::config::{ModulationConf, PhononMode};
use crate::error::{Result, TwinflowError};
use crate::models::{wrap_fraction, Atom, Crystal};
use nalgebra::Vector3;
use serde_json::json;
use std::f64::consts::PI;

/// 调制结构及其频率
#[derive(Debug, Clone)]
pub struct ModulationStructures {
    /// modulation_%03d（从 1 开始）
    pub structures: Vec<Crystal>,
    pub frequencies: Vec<Option<f64>>,
}

impl ModulationStructures {
    /// `modulation_summary` 输出
    pub fn summary(&self) -> serde_json::Value {
        json!({ "frequencies": self.frequencies })
    }
}

fn normalized_eigenvector(mode: &PhononMode, num_atoms: usize) -> Result<Vec<Vector3<f64>>> {
    if mode.eigenvector.len() != num_atoms {
        return Err(TwinflowError::InvalidArgument(format!(
            "eigenvector of band {} has {} components, unit cell has {} atoms",
            mode.band_index,
            mode.eigenvector.len(),
            num_atoms
        )));
    }

    let vectors: Vec<Vector3<f64>> = mode.eigenvector.iter().map(|v| Vector3::from(*v)).collect();
    let norm = vectors.iter().map(|v| v.norm_squared()).sum::<f64>().sqrt();
    if norm < 1e-12 {
        return Err(TwinflowError::InvalidArgument(format!(
            "eigenvector of band {} is zero",
            mode.band_index
        )));
    }
    Ok(vectors.into_iter().map(|v| v / norm).collect())
}

/// 生成调制结构
pub fn get_modulation_structures(unitcell: &Crystal, conf: &ModulationConf) -> Result<ModulationStructures> {
    if conf.dimension.iter().any(|&d| d == 0) {
        return Err(TwinflowError::InvalidArgument(
            "modulation dimension must be positive".to_string(),
        ));
    }

    let supercell = make_supercell(unitcell, &diagonal(conf.dimension))?;
    let lattice = &supercell.crystal.lattice;
    let base_positions = supercell.crystal.cartesian_positions();

    let mut structures = Vec::with_capacity(conf.phonon_modes.len());
    for (i, mode) in conf.phonon_modes.iter().enumerate() {
        let eigenvector = normalized_eigenvector(mode, unitcell.atoms.len())?;
        let phase = mode.phase.to_radians();

        let mut atoms = Vec::with_capacity(base_positions.len());
        for ((origin, atom), r) in supercell
            .origins
            .iter()
            .zip(&supercell.crystal.atoms)
            .zip(&base_positions)
        {
            let (j, t) = *origin;
            let q_dot_t: f64 = (0..3).map(|k| mode.qpoint[k] * t[k] as f64).sum();
            let u = eigenvector[j] * (mode.amplitude * (2.0 * PI * q_dot_t + phase).cos());

            let f = lattice.to_fractional(&(r + u)).ok_or_else(|| {
                TwinflowError::InvalidStructure("singular modulation supercell".to_string())
            })?;
            atoms.push(Atom::new(
                atom.element.clone(),
                [wrap_fraction(f[0]), wrap_fraction(f[1]), wrap_fraction(f[2])],
            ));
        }

        let label = format!("modulation_{:03}", i + 1);
        structures.push(Crystal::new(label.clone(), lattice.clone(), atoms).labelled(label.clone(), label));
    }

    Ok(ModulationStructures {
        structures,
        frequencies: conf.phonon_modes.iter().map(|m| m.frequency).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crystal::tests::hcp_mg;
    use std::collections::BTreeMap;

    fn mode(qpoint: [f64; 3], amplitude: f64, eigenvector: Vec<[f64; 3]>) -> PhononMode {
        PhononMode {
            qpoint,
            band_index: 1,
            amplitude,
            phase: 0.0,
            frequency: Some(2.5),
            eigenvector,
        }
    }

    fn displacements(modulated: &Crystal, reference: &Crystal) -> Vec<Vector3<f64>> {
        let m = modulated.lattice.to_matrix();
        modulated
            .atoms
            .iter()
            .zip(&reference.atoms)
            .map(|(a, b)| {
                let d = Vector3::from(a.position) - Vector3::from(b.position);
                m.transpose() * d.map(|x| x - x.round())
            })
            .collect()
    }

    #[test]
    fn test_gamma_mode_shifts_every_image_equally() {
        let conf = ModulationConf {
            dimension: [2, 1, 1],
            phonon_modes: vec![mode([0.0; 3], 0.1, vec![[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]])],
            incar_update_settings: BTreeMap::new(),
        };
        let result = get_modulation_structures(&hcp_mg(), &conf).unwrap();
        assert_eq!(result.structures.len(), 1);
        assert_eq!(result.structures[0].name, "modulation_001");
        assert_eq!(result.frequencies, vec![Some(2.5)]);

        let reference = make_supercell(&hcp_mg(), &diagonal([2, 1, 1])).unwrap();
        let du = displacements(&result.structures[0], &reference.crystal);
        let amp = 0.1 / 2f64.sqrt();
        for ((j, _), u) in reference.origins.iter().zip(&du) {
            let expected = if *j == 0 { amp } else { -amp };
            assert!((u.z - expected).abs() < 1e-9);
            assert!(u.x.abs() < 1e-9 && u.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_zone_boundary_mode_alternates_sign() {
        let conf = ModulationConf {
            dimension: [2, 1, 1],
            phonon_modes: vec![
                mode([0.5, 0.0, 0.0], 0.2, vec![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]]),
                mode([0.0; 3], 0.0, vec![[1.0, 0.0, 0.0], [0.0, 0.0, 0.0]]),
            ],
            incar_update_settings: BTreeMap::new(),
        };
        let result = get_modulation_structures(&hcp_mg(), &conf).unwrap();
        assert_eq!(result.structures[1].name, "modulation_002");

        let reference = make_supercell(&hcp_mg(), &diagonal([2, 1, 1])).unwrap();
        let du = displacements(&result.structures[0], &reference.crystal);
        let amp = 0.2 / 2f64.sqrt();
        for ((_, t), u) in reference.origins.iter().zip(&du) {
            let expected = if t[0] % 2 == 0 { amp } else { -amp };
            assert!((u.x - expected).abs() < 1e-9, "t = {:?}", t);
        }

        let unchanged = displacements(&result.structures[1], &reference.crystal);
        assert!(unchanged.iter().all(|u| u.norm() < 1e-9));
    }

    #[test]
    fn test_eigenvector_length_mismatch() {
        let conf = ModulationConf {
            dimension: [1, 1, 1],
            phonon_modes: vec![mode([0.0; 3], 0.1, vec![[1.0, 0.0, 0.0]])],
            incar_update_settings: BTreeMap::new(),
        };
        assert!(matches!(
            get_modulation_structures(&hcp_mg(), &conf),
            Err(TwinflowError::InvalidArgument(_))
        ));
    }
}
