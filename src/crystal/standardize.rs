//! # 晶胞标准化
//!
//! 不依赖外部对称性库的简化标准化：
//! 1. 可选的原胞搜索（仅纯平移对称）
//! 2. 晶格约化（逐行减去其余两行的 ±1 组合，直到不再变短）
//! 3. 按长度排序，符号约定 a·b ≤ 0, a·c ≤ 0 且右手系
//! 4. 规范取向：a 沿 x，b 在 xy 平面
//!
//! 返回标准化晶胞与变换矩阵 P，满足 `f_orig = f_std · P`。
//! 原子保持输入顺序（原胞搜索时去除重复原子）。
//!
//! ## 依赖关系
//! - 被 `crystal/shear.rs`, `crystal/twinboundary.rs`, `workflow/twinboundary_shear.rs` 使用
//! - 使用 `nalgebra`

use crate::error::{Result, TwinflowError};
use crate::models::{wrap_fraction, Atom, Crystal, Lattice};
use nalgebra::{Matrix3, RowVector3, Vector3};

const MAX_REDUCTION_ROUNDS: usize = 1000;
const MAX_CANDIDATES: usize = 40;
const LENGTH_EPS: f64 = 1e-8;

/// 标准化结果
#[derive(Debug, Clone)]
pub struct StandardizedCell {
    pub crystal: Crystal,
    /// f_orig = f_std · P
    pub transformation: Matrix3<f64>,
}

impl StandardizedCell {
    /// 把标准化晶胞中的分数坐标映射回原始晶胞
    pub fn to_original_frame(&self, f_std: [f64; 3]) -> [f64; 3] {
        let f = RowVector3::new(f_std[0], f_std[1], f_std[2]) * self.transformation;
        [wrap_fraction(f[0]), wrap_fraction(f[1]), wrap_fraction(f[2])]
    }
}

fn frac_diff_cartesian(lattice: &Matrix3<f64>, d: Vector3<f64>) -> f64 {
    let reduced = d.map(|x| x - x.round());
    (lattice.transpose() * reduced).norm()
}

/// 纯平移对称操作（分数坐标，含零平移）
pub fn find_pure_translations(crystal: &Crystal, symprec: f64) -> Vec<Vector3<f64>> {
    let lattice = crystal.lattice.to_matrix();
    let frac: Vec<Vector3<f64>> = crystal
        .atoms
        .iter()
        .map(|a| Vector3::from(a.position))
        .collect();

    let mut translations = vec![Vector3::zeros()];
    let Some(first) = crystal.atoms.first() else {
        return translations;
    };

    for (j, atom) in crystal.atoms.iter().enumerate().skip(1) {
        if atom.element != first.element {
            continue;
        }
        let t = (frac[j] - frac[0]).map(|x| x - x.round());
        if frac_diff_cartesian(&lattice, t) < symprec {
            continue;
        }
        if translations
            .iter()
            .any(|u| frac_diff_cartesian(&lattice, t - u) < symprec)
        {
            continue;
        }

        let maps_all = crystal.atoms.iter().enumerate().all(|(i, ai)| {
            crystal.atoms.iter().enumerate().any(|(k, ak)| {
                ak.element == ai.element
                    && frac_diff_cartesian(&lattice, frac[i] + t - frac[k]) < symprec
            })
        });
        if maps_all {
            translations.push(t);
        }
    }

    translations
}

/// 由纯平移构造原胞基矢（分数坐标行向量）
fn primitive_basis(
    lattice: &Matrix3<f64>,
    translations: &[Vector3<f64>],
) -> Result<Matrix3<f64>> {
    let n = translations.len() as f64;
    let mut candidates: Vec<(RowVector3<f64>, f64)> = Vec::new();
    for t in translations {
        for m0 in -1..=1 {
            for m1 in -1..=1 {
                for m2 in -1..=1 {
                    let v = RowVector3::new(t[0] + m0 as f64, t[1] + m1 as f64, t[2] + m2 as f64);
                    let len = (v * lattice).norm();
                    if len > LENGTH_EPS {
                        candidates.push((v, len));
                    }
                }
            }
        }
    }
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
    candidates.truncate(MAX_CANDIDATES);

    let target = 1.0 / n;
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            for k in (j + 1)..candidates.len() {
                let f = Matrix3::from_rows(&[candidates[i].0, candidates[j].0, candidates[k].0]);
                if (f.determinant().abs() - target).abs() < 1e-3 * target {
                    return Ok(f);
                }
            }
        }
    }

    Err(TwinflowError::InvalidStructure(
        "failed to find a primitive basis".to_string(),
    ))
}

/// 晶格约化：每行减去其余两行的 ±1 组合，直至不再变短
pub fn reduce_basis(basis: &Matrix3<f64>) -> Matrix3<f64> {
    let mut rows = [basis.row(0).into_owned(), basis.row(1).into_owned(), basis.row(2).into_owned()];

    for _ in 0..MAX_REDUCTION_ROUNDS {
        let mut changed = false;
        for i in 0..3 {
            let (j, k) = ((i + 1) % 3, (i + 2) % 3);
            let mut best = rows[i];
            for mj in -1..=1 {
                for mk in -1..=1 {
                    let cand = rows[i] + rows[j] * mj as f64 + rows[k] * mk as f64;
                    if cand.norm() < best.norm() - LENGTH_EPS {
                        best = cand;
                    }
                }
            }
            if best != rows[i] {
                rows[i] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    rows.sort_by(|a, b| a.norm().total_cmp(&b.norm()));

    if rows[0].dot(&rows[1]) > LENGTH_EPS {
        rows[1] = -rows[1];
    }
    if rows[0].dot(&rows[2]) > LENGTH_EPS {
        rows[2] = -rows[2];
    }
    let mut reduced = Matrix3::from_rows(&rows);
    if reduced.determinant() < 0.0 {
        reduced = -reduced;
    }
    reduced
}

/// 标准化晶胞
pub fn standardize(crystal: &Crystal, to_primitive: bool, symprec: f64) -> Result<StandardizedCell> {
    let lattice = crystal.lattice.to_matrix();
    let lattice_inv = lattice
        .try_inverse()
        .ok_or_else(|| TwinflowError::InvalidStructure("singular lattice".to_string()))?;

    let mut basis = lattice;
    let mut deduplicate = false;
    if to_primitive {
        let translations = find_pure_translations(crystal, symprec);
        if translations.len() > 1 {
            basis = primitive_basis(&lattice, &translations)? * lattice;
            deduplicate = true;
        }
    }

    let basis = reduce_basis(&basis);
    let transformation = basis * lattice_inv;
    let transformation_inv = transformation
        .try_inverse()
        .ok_or_else(|| TwinflowError::InvalidStructure("singular transformation".to_string()))?;

    let mut atoms: Vec<Atom> = Vec::with_capacity(crystal.atoms.len());
    for atom in &crystal.atoms {
        let p = atom.position;
        let f = RowVector3::new(p[0], p[1], p[2]) * transformation_inv;
        let position = [wrap_fraction(f[0]), wrap_fraction(f[1]), wrap_fraction(f[2])];

        if deduplicate
            && atoms.iter().any(|a| {
                a.element == atom.element
                    && frac_diff_cartesian(
                        &basis,
                        Vector3::from(a.position) - Vector3::from(position),
                    ) < symprec
            })
        {
            continue;
        }

        let new_atom = Atom::new(atom.element.clone(), position);
        atoms.push(new_atom);
    }

    let reduced = Lattice::from_matrix(&basis);
    let [a, b, c] = reduced.abc();
    let [alpha, beta, gamma] = reduced.angles();
    let std_lattice = Lattice::from_parameters(a, b, c, alpha, beta, gamma);

    let mut std = Crystal::new(crystal.name.clone(), std_lattice, atoms);
    std.description = crystal.description.clone();
    std.energy = crystal.energy;

    Ok(StandardizedCell {
        crystal: std,
        transformation,
    })
}
