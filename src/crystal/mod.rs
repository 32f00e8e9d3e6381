//! # 结构生成模块
//!
//! 由母相 HCP 结构生成剪切结构族、孪晶界结构、孪晶界剪切结构与声子调制结构，
//! 并提供不依赖外部对称性库的晶胞标准化。
//!
//! ## 依赖关系
//! - 被 `workflow/`, `commands/generate.rs` 使用
//! - 使用 `models/`, `config/workflow.rs`
//! - 子模块: twinmode, supercell, standardize, shear, twinboundary, modulation

pub mod modulation;
pub mod shear;
pub mod standardize;
pub mod supercell;
pub mod twinboundary;
pub mod twinmode;

pub use modulation::{get_modulation_structures, ModulationStructures};
pub use shear::{get_shear_ratios, get_shear_structures, shear_lattice, ShearStructures};
pub use standardize::{standardize, StandardizedCell};
pub use supercell::{make_supercell, Supercell};
pub use twinboundary::{
    get_twinboundary_shear_structure, get_twinboundary_structure, relaxed_positions_in_original_frame,
    TwinBoundary,
};
pub use twinmode::TwinMode;

use crate::error::{Result, TwinflowError};
use crate::models::Crystal;

/// 标准化默认容差
pub const SYMPREC: f64 = 1e-5;

const LENGTH_TOL: f64 = 1e-3;
const ANGLE_TOL: f64 = 1e-2;

/// 检查母相为六方晶胞 (a = b, α = β = 90°, γ = 120°)，返回 c/a
pub fn check_hexagonal(crystal: &Crystal) -> Result<f64> {
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.parameters();

    let is_hexagonal = (a - b).abs() < LENGTH_TOL * a
        && (alpha - 90.0).abs() < ANGLE_TOL
        && (beta - 90.0).abs() < ANGLE_TOL
        && (gamma - 120.0).abs() < ANGLE_TOL;

    if !is_hexagonal {
        return Err(TwinflowError::InvalidStructure(format!(
            "parent must be hexagonal (a = b, alpha = beta = 90, gamma = 120), got \
             a={:.4} b={:.4} c={:.4} alpha={:.3} beta={:.3} gamma={:.3}",
            a, b, c, alpha, beta, gamma
        )));
    }

    Ok(c / a)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    /// HCP Mg，a = 3.21 Å, c = 5.21 Å
    pub fn hcp_mg() -> Crystal {
        let lattice = Lattice::from_parameters(3.21, 3.21, 5.21, 90.0, 90.0, 120.0);
        let atoms = vec![
            Atom::new("Mg", [1.0 / 3.0, 2.0 / 3.0, 0.25]),
            Atom::new("Mg", [2.0 / 3.0, 1.0 / 3.0, 0.75]),
        ];
        Crystal::new("Mg", lattice, atoms)
    }

    #[test]
    fn test_check_hexagonal() {
        let ratio = check_hexagonal(&hcp_mg()).unwrap();
        assert!((ratio - 5.21 / 3.21).abs() < 1e-12);

        let cubic = Crystal::new(
            "Fe",
            Lattice::from_parameters(2.87, 2.87, 2.87, 90.0, 90.0, 90.0),
            vec![Atom::new("Fe", [0.0, 0.0, 0.0])],
        );
        assert!(matches!(
            check_hexagonal(&cubic),
            Err(TwinflowError::InvalidStructure(_))
        ));
    }
}
