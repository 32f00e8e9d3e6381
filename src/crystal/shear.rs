//! # 剪切结构族
//!
//! 在剪切坐标系晶胞上施加均匀切变 `v → v + s (v·n̂) ê1`，
//! 其中 s = ratio × 孪晶切变量。分数坐标保持不变。
//!
//! ## 依赖关系
//! - 被 `workflow/shear.rs`, `crystal/twinboundary.rs`, `commands/generate.rs` 使用
//! - 使用 `crystal/twinmode.rs`, `crystal/supercell.rs`, `crystal/standardize.rs`

use super::standardize::standardize;
use super::supercell::make_supercell;
use super::twinmode::TwinMode;
use super::{check_hexagonal, SYMPREC};
use crate::config::ShearConf;
use crate::error::{Result, TwinflowError};
use crate::models::{Crystal, Lattice};
use nalgebra::Matrix3;
use serde_json::json;

/// 剪切结构族
#[derive(Debug, Clone)]
pub struct ShearStructures {
    pub ratios: Vec<f64>,
    /// 孪晶切变量（绝对值）
    pub gamma: f64,
    /// 未标准化结构 shear_orig_%03d
    pub originals: Vec<Crystal>,
    /// 标准化原胞 shear_%03d
    pub structures: Vec<Crystal>,
}

impl ShearStructures {
    pub fn total_structures(&self) -> usize {
        self.structures.len()
    }

    /// `shear_settings` 输出
    pub fn shear_settings(&self) -> serde_json::Value {
        json!({ "shear_strain_ratios": self.ratios })
    }
}

/// 剪切比例序列 i/(grids-1)
pub fn get_shear_ratios(grids: usize) -> Result<Vec<f64>> {
    if grids < 2 {
        return Err(TwinflowError::InvalidArgument(format!(
            "grids must be at least 2, got {}",
            grids
        )));
    }
    let last = (grids - 1) as f64;
    Ok((0..grids).map(|i| i as f64 / last).collect())
}

/// 以前两行张成的面为切变面、第一行为切变方向施加均匀切变
pub fn shear_lattice(lattice: &Lattice, s: f64) -> Lattice {
    let e1 = lattice.vector(0);
    let n = e1.cross(&lattice.vector(1)).normalize();
    let e1 = e1.normalize();

    let mut matrix = lattice.matrix;
    for row in matrix.iter_mut() {
        let v = nalgebra::Vector3::from(*row);
        let sheared = v + e1 * (s * v.dot(&n));
        *row = [sheared.x, sheared.y, sheared.z];
    }
    Lattice::from_vectors(matrix)
}

/// 剪切坐标系晶胞：行向量为 e1, e2, e3，并按 expansion_ratios 缩放
pub fn shear_frame_cell(parent: &Crystal, mode: TwinMode, expansion_ratios: [f64; 3]) -> Result<Crystal> {
    let frame = make_supercell(parent, &mode.shear_basis())?.crystal;
    let scale = Matrix3::from_diagonal(&nalgebra::Vector3::from(expansion_ratios));
    let lattice = Lattice::from_matrix(&(scale * frame.lattice.to_matrix()));

    let mut cell = Crystal::new(parent.name.clone(), lattice, frame.atoms);
    cell.wrap_positions();
    Ok(cell)
}

/// 生成剪切结构族
pub fn get_shear_structures(structure: &Crystal, conf: &ShearConf) -> Result<ShearStructures> {
    let mode: TwinMode = conf.twinmode.parse()?;
    let r = check_hexagonal(structure)?;
    let ratios = get_shear_ratios(conf.grids)?;
    let signed_gamma = mode.signed_shear(r);

    let frame = shear_frame_cell(structure, mode, conf.expansion_ratios)?;

    let mut originals = Vec::with_capacity(ratios.len());
    let mut structures = Vec::with_capacity(ratios.len());
    for (i, &ratio) in ratios.iter().enumerate() {
        let mut orig = frame.clone();
        orig.lattice = shear_lattice(&frame.lattice, ratio * signed_gamma);
        orig.wrap_positions();
        let orig = orig.labelled(
            format!("shear_orig_{:03}", i),
            format!("shear_orig_{:03} ratio: {}", i, ratio),
        );

        let std = standardize(&orig, true, SYMPREC)?.crystal.labelled(
            format!("shear_{:03}", i),
            format!("shear_{:03} ratio: {}", i, ratio),
        );

        originals.push(orig);
        structures.push(std);
    }

    Ok(ShearStructures {
        ratios,
        gamma: signed_gamma.abs(),
        originals,
        structures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crystal::tests::hcp_mg;

    fn conf(twinmode: &str, grids: usize) -> ShearConf {
        ShearConf {
            twinmode: twinmode.to_string(),
            grids,
            expansion_ratios: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn test_shear_ratios() {
        let ratios = get_shear_ratios(5).unwrap();
        assert_eq!(ratios, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(get_shear_ratios(2).unwrap(), vec![0.0, 1.0]);
        assert!(matches!(
            get_shear_ratios(1),
            Err(TwinflowError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_shear_preserves_volume() {
        let lattice = Lattice::from_parameters(3.0, 4.0, 5.0, 90.0, 90.0, 90.0);
        let sheared = shear_lattice(&lattice, 0.3);
        assert!((sheared.volume() - lattice.volume()).abs() < 1e-10);
        // 切变面内的行向量不变
        assert_eq!(sheared.matrix[0], lattice.matrix[0]);
        assert_eq!(sheared.matrix[1], lattice.matrix[1]);
    }

    #[test]
    fn test_shear_structures_labels_and_parent() {
        let result = get_shear_structures(&hcp_mg(), &conf("10-12", 3)).unwrap();

        assert_eq!(result.total_structures(), 3);
        assert!((result.gamma - 0.1301).abs() < 1e-3);
        assert_eq!(result.structures[0].name, "shear_000");
        assert_eq!(result.originals[2].name, "shear_orig_002");
        assert_eq!(result.structures[1].description, "shear_001 ratio: 0.5");

        // ratio 0 的标准化原胞即母相六方晶胞
        let (a, b, c, _, _, gamma) = result.structures[0].lattice.parameters();
        assert!((a - 3.21).abs() < 1e-8);
        assert!((b - 3.21).abs() < 1e-8);
        assert!((c - 5.21).abs() < 1e-8);
        assert!((gamma - 120.0).abs() < 1e-6);
        assert_eq!(result.structures[0].atoms.len(), 2);

        for s in &result.structures {
            assert!((s.lattice.volume() - hcp_mg().lattice.volume()).abs() < 1e-8);
        }
        assert_eq!(
            result.shear_settings()["shear_strain_ratios"][2],
            serde_json::json!(1.0)
        );
    }

    #[test]
    fn test_full_twinning_shear_restores_hexagonal_cell() {
        // 11-21 模式只需格点切变即可复原晶格
        let result = get_shear_structures(&hcp_mg(), &conf("11-21", 2)).unwrap();
        let last = result.structures.last().unwrap();
        let (a, b, c, _, _, gamma) = last.lattice.parameters();
        let mut lengths = [a, b, c];
        lengths.sort_by(|x, y| x.total_cmp(y));
        assert!((lengths[0] - 3.21).abs() < 1e-6);
        assert!((lengths[1] - 3.21).abs() < 1e-6);
        assert!((lengths[2] - 5.21).abs() < 1e-6);
        assert!((gamma - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_expansion_ratios_scale_volume() {
        let mut c = conf("10-12", 2);
        c.expansion_ratios = [1.0, 1.0, 1.1];
        let result = get_shear_structures(&hcp_mg(), &c).unwrap();
        let v0 = hcp_mg().lattice.volume();
        assert!((result.originals[0].lattice.volume() - 1.1 * v0).abs() < 1e-8);
    }

    #[test]
    fn test_non_hexagonal_parent_rejected() {
        let mut parent = hcp_mg();
        parent.lattice = Lattice::from_parameters(3.21, 3.21, 5.21, 90.0, 90.0, 90.0);
        assert!(get_shear_structures(&parent, &conf("10-12", 3)).is_err());
    }
}
