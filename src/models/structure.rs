//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示 (晶格 + 分数坐标 + 元素)，是结构生成器、
//! 构建器与调度器之间传递的唯一结构类型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `crystal/`, `kpoints.rs`, `builder/` 使用
//! - 使用 `nalgebra` 做矩阵运算

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度。a 沿 x 轴，b 位于 xy 平面
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 从 nalgebra 矩阵创建（行向量为晶格向量）
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        let mut matrix = [[0.0; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = m[(i, j)];
            }
        }
        Lattice { matrix }
    }

    /// 转换为 nalgebra 矩阵（行向量为晶格向量）
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|i, j| self.matrix[i][j])
    }

    /// 第 i 个晶格向量
    pub fn vector(&self, i: usize) -> Vector3<f64> {
        Vector3::from(self.matrix[i])
    }

    /// 晶格常数 (|a|, |b|, |c|)
    pub fn abc(&self) -> [f64; 3] {
        [
            self.vector(0).norm(),
            self.vector(1).norm(),
            self.vector(2).norm(),
        ]
    }

    /// 晶格夹角 (alpha, beta, gamma)，单位：度
    pub fn angles(&self) -> [f64; 3] {
        let angle = |u: Vector3<f64>, v: Vector3<f64>| {
            (u.dot(&v) / (u.norm() * v.norm()))
                .clamp(-1.0, 1.0)
                .acos()
                .to_degrees()
        };
        let (a, b, c) = (self.vector(0), self.vector(1), self.vector(2));
        [angle(b, c), angle(a, c), angle(a, b)]
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a, b, c] = self.abc();
        let [alpha, beta, gamma] = self.angles();
        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号，右手系为正）
    pub fn volume(&self) -> f64 {
        self.to_matrix().determinant()
    }

    /// 倒易晶格，满足 a_i · b_j = δ_ij（`two_pi` 为真时乘以 2π）
    pub fn reciprocal(&self, two_pi: bool) -> Option<Lattice> {
        let inv = self.to_matrix().try_inverse()?;
        let factor = if two_pi { 2.0 * std::f64::consts::PI } else { 1.0 };
        Some(Lattice::from_matrix(&(inv.transpose() * factor)))
    }

    /// 分数坐标转笛卡尔坐标
    pub fn to_cartesian(&self, frac: [f64; 3]) -> Vector3<f64> {
        self.to_matrix().transpose() * Vector3::from(frac)
    }

    /// 笛卡尔坐标转分数坐标
    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Option<[f64; 3]> {
        let inv = self.to_matrix().transpose().try_inverse()?;
        let f = inv * cart;
        Some([f.x, f.y, f.z])
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称（工作流中即确定性标签，如 shear_003）
    pub name: String,

    /// 描述
    #[serde(default)]
    pub description: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,

    /// 能量 (eV)
    pub energy: Option<f64>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            description: String::new(),
            lattice,
            atoms,
            energy: None,
        }
    }

    /// 设置名称与描述
    pub fn labelled(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 按出现顺序列出元素种类
    pub fn species(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for atom in &self.atoms {
            if !order.contains(&atom.element) {
                order.push(atom.element.clone());
            }
        }
        order
    }

    /// 原子笛卡尔坐标
    pub fn cartesian_positions(&self) -> Vec<Vector3<f64>> {
        self.atoms
            .iter()
            .map(|a| self.lattice.to_cartesian(a.position))
            .collect()
    }

    /// 将所有分数坐标移入 [0, 1)
    pub fn wrap_positions(&mut self) {
        for atom in &mut self.atoms {
            for x in atom.position.iter_mut() {
                *x = wrap_fraction(*x);
            }
        }
    }
}

/// 分数坐标移入 [0, 1)
pub fn wrap_fraction(x: f64) -> f64 {
    let w = x - x.floor();
    if (1.0 - w).abs() < 1e-10 {
        0.0
    } else {
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_from_parameters_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let (a, b, c, alpha, beta, gamma) = lattice.parameters();

        assert!((a - 5.0).abs() < 1e-6);
        assert!((b - 5.0).abs() < 1e-6);
        assert!((c - 5.0).abs() < 1e-6);
        assert!((alpha - 90.0).abs() < 1e-6);
        assert!((beta - 90.0).abs() < 1e-6);
        assert!((gamma - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_lattice_volume_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        // 5^3 = 125
        assert!((lattice.volume() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_lattice_hexagonal() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let (a, b, c, _, _, gamma) = lattice.parameters();

        assert!((a - 3.0).abs() < 1e-9);
        assert!((b - 3.0).abs() < 1e-9);
        assert!((c - 5.0).abs() < 1e-9);
        assert!((gamma - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_reciprocal_of_hexagonal_has_sixty_degrees() {
        let lattice = Lattice::from_parameters(2.93, 2.93, 4.65, 90.0, 90.0, 120.0);
        let recip = lattice.reciprocal(true).unwrap();
        let [alpha, beta, gamma] = recip.angles();

        assert!((alpha - 90.0).abs() < 1e-9);
        assert!((beta - 90.0).abs() < 1e-9);
        assert!((gamma - 60.0).abs() < 1e-9);

        // a_i · b_j = 2π δ_ij
        let dot = lattice.vector(0).dot(&recip.vector(0));
        assert!((dot - 2.0 * std::f64::consts::PI).abs() < 1e-9);
        assert!(lattice.vector(0).dot(&recip.vector(1)).abs() < 1e-9);
    }

    #[test]
    fn test_cartesian_fractional_conversion() {
        let lattice = Lattice::from_parameters(3.2, 3.2, 5.2, 90.0, 90.0, 120.0);
        let frac = [1.0 / 3.0, 2.0 / 3.0, 0.25];
        let cart = lattice.to_cartesian(frac);
        let back = lattice.to_fractional(&cart).unwrap();
        for i in 0..3 {
            assert!((back[i] - frac[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_crystal_formula_and_species() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let atoms = vec![
            Atom::new("Ti", [0.0, 0.0, 0.0]),
            Atom::new("O", [0.5, 0.5, 0.0]),
            Atom::new("O", [0.5, 0.0, 0.5]),
        ];
        let crystal = Crystal::new("TiO2", lattice, atoms);

        assert_eq!(crystal.formula(), "O2Ti");
        assert_eq!(crystal.species(), vec!["Ti".to_string(), "O".to_string()]);
    }

    #[test]
    fn test_wrap_fraction() {
        assert!((wrap_fraction(1.25) - 0.25).abs() < 1e-12);
        assert!((wrap_fraction(-0.25) - 0.75).abs() < 1e-12);
        assert_eq!(wrap_fraction(1.0), 0.0);
        assert_eq!(wrap_fraction(-1e-14), 0.0);
    }
}
