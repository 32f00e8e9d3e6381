//! # 超胞构造
//!
//! 以整数矩阵 M 构造超胞：新晶格行向量 = M · L。
//! 同时记录每个超胞原子来自哪个原胞原子以及所在的晶格平移。
//!
//! ## 依赖关系
//! - 被 `crystal/shear.rs`, `crystal/twinboundary.rs`, `crystal/modulation.rs`, `kpoints.rs` 使用

use crate::error::{Result, TwinflowError};
use crate::models::{wrap_fraction, Atom, Crystal, Lattice};
use nalgebra::{Matrix3, Vector3};

const EPS: f64 = 1e-8;

/// 超胞及原子来源映射
#[derive(Debug, Clone)]
pub struct Supercell {
    pub crystal: Crystal,
    /// (原胞原子序号, 晶格平移)
    pub origins: Vec<(usize, [i32; 3])>,
}

/// 整数矩阵转 nalgebra 矩阵
pub fn int_matrix(m: &[[i32; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| m[i][j] as f64)
}

/// 对角超胞矩阵
pub fn diagonal(dim: [u32; 3]) -> [[i32; 3]; 3] {
    [
        [dim[0] as i32, 0, 0],
        [0, dim[1] as i32, 0],
        [0, 0, dim[2] as i32],
    ]
}

/// 仅变换晶格（不处理原子）
pub fn supercell_lattice(lattice: &Lattice, matrix: &[[i32; 3]; 3]) -> Lattice {
    Lattice::from_matrix(&(int_matrix(matrix) * lattice.to_matrix()))
}

/// 构造超胞
pub fn make_supercell(crystal: &Crystal, matrix: &[[i32; 3]; 3]) -> Result<Supercell> {
    let m = int_matrix(matrix);
    let det = m.determinant().round() as i64;
    if det == 0 {
        return Err(TwinflowError::InvalidArgument(
            "supercell matrix is singular".to_string(),
        ));
    }
    let m_inv = m.try_inverse().ok_or_else(|| {
        TwinflowError::InvalidArgument("supercell matrix is singular".to_string())
    })?;

    // 新晶胞八个角点在旧分数坐标下的范围
    let mut lo = [0i32; 3];
    let mut hi = [0i32; 3];
    for corner in 0..8 {
        let c = Vector3::new(
            (corner & 1) as f64,
            ((corner >> 1) & 1) as f64,
            ((corner >> 2) & 1) as f64,
        );
        let old = m.transpose() * c;
        for k in 0..3 {
            lo[k] = lo[k].min(old[k].floor() as i32);
            hi[k] = hi[k].max(old[k].ceil() as i32);
        }
    }

    let lattice = supercell_lattice(&crystal.lattice, matrix);
    let mut atoms = Vec::new();
    let mut origins = Vec::new();

    for i in lo[0]..=hi[0] {
        for j in lo[1]..=hi[1] {
            for k in lo[2]..=hi[2] {
                for (idx, atom) in crystal.atoms.iter().enumerate() {
                    let f = Vector3::new(
                        atom.position[0] + i as f64,
                        atom.position[1] + j as f64,
                        atom.position[2] + k as f64,
                    );
                    // 行向量约定：f_new = f_old · M⁻¹
                    let f_new = m_inv.transpose() * f;
                    if f_new.iter().all(|&x| x > -EPS && x < 1.0 - EPS) {
                        let new_atom = Atom::new(
                            atom.element.clone(),
                            [
                                wrap_fraction(f_new[0]),
                                wrap_fraction(f_new[1]),
                                wrap_fraction(f_new[2]),
                            ],
                        );
                        atoms.push(new_atom);
                        origins.push((idx, [i, j, k]));
                    }
                }
            }
        }
    }

    let expected = crystal.atoms.len() * det.unsigned_abs() as usize;
    if atoms.len() != expected {
        return Err(TwinflowError::InvalidStructure(format!(
            "supercell has {} atoms, expected {}",
            atoms.len(),
            expected
        )));
    }

    let mut supercell = Crystal::new(crystal.name.clone(), lattice, atoms);
    supercell.description = crystal.description.clone();
    Ok(Supercell {
        crystal: supercell,
        origins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crystal::tests::hcp_mg;

    #[test]
    fn test_diagonal_supercell() {
        let hcp = hcp_mg();
        let sc = make_supercell(&hcp, &diagonal([2, 2, 1])).unwrap();

        assert_eq!(sc.crystal.atoms.len(), 8);
        assert!((sc.crystal.lattice.volume() - 4.0 * hcp.lattice.volume()).abs() < 1e-8);
        assert_eq!(sc.origins.len(), 8);
        assert!(sc.origins.iter().any(|&(idx, t)| idx == 1 && t == [1, 1, 0]));
    }

    #[test]
    fn test_non_diagonal_supercell() {
        let hcp = hcp_mg();
        // {10-11} 剪切坐标系，行列式为 2
        let matrix = [[2, 1, -2], [0, 1, 0], [0, 0, 1]];
        let sc = make_supercell(&hcp, &matrix).unwrap();
        assert_eq!(sc.crystal.atoms.len(), 4);
        for atom in &sc.crystal.atoms {
            assert!(atom.position.iter().all(|&x| (0.0..1.0).contains(&x)));
        }
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let hcp = hcp_mg();
        let matrix = [[1, 0, 0], [2, 0, 0], [0, 0, 1]];
        assert!(make_supercell(&hcp, &matrix).is_err());
    }
}
