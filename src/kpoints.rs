//! # k 点网格
//!
//! 由实空间晶格与 k 点间距导出 Monkhorst-Pack/Γ 网格与偏移。
//! 六方倒易晶格 (90°, 90°, 60°) 使用 Γ 中心的面内奇数网格，其余晶格使用偶数网格与 1/2 偏移。
//!
//! ## 依赖关系
//! - 被 `workflow/shear.rs`, `workflow/twinboundary_relax.rs`, `workflow/twinboundary_shear.rs`,
//!   `commands/kpoints.rs` 使用
//! - 使用 `models/structure.rs`, `config/`

use crate::config::{CalculatorSettings, DecimalHandling, KpointsConf, KpointsSettings};
use crate::crystal::supercell::{diagonal, supercell_lattice};
use crate::error::{Result, TwinflowError};
use crate::models::{Crystal, Lattice};
use serde::Serialize;

const HEXAGONAL_ATOL: f64 = 1e-5;

/// 网格推导结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshInfo {
    /// 倒易晶格常数
    pub abc: [f64; 3],
    pub mesh: [u32; 3],
    pub offset: [f64; 3],
    pub is_hexagonal: bool,
}

impl MeshInfo {
    pub fn to_settings(&self) -> KpointsSettings {
        KpointsSettings {
            mesh: self.mesh,
            offset: self.offset,
        }
    }
}

/// 四舍五入（0.5 进位）
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// abc / interval 取整，零分量修正为 1
pub fn get_mesh_from_interval(
    lattice: &Lattice,
    interval: f64,
    handling: DecimalHandling,
) -> Result<([f64; 3], [u32; 3])> {
    if interval.is_nan() || interval <= 0.0 {
        return Err(TwinflowError::InvalidArgument(format!(
            "kpoints interval must be positive, got {}",
            interval
        )));
    }

    let abc = lattice.abc();
    let mut mesh = [1u32; 3];
    for (m, length) in mesh.iter_mut().zip(abc) {
        let x = length / interval;
        let n = match handling {
            DecimalHandling::Round => round_half_up(x),
            DecimalHandling::Floor => x.floor(),
            DecimalHandling::Ceil => x.ceil(),
        };
        *m = (n as u32).max(1);
    }
    Ok((abc, mesh))
}

fn is_hexagonal_reciprocal(recip: &Lattice) -> bool {
    let [alpha, beta, gamma] = recip.angles();
    let [a, b, _] = recip.abc();
    (alpha - 90.0).abs() <= HEXAGONAL_ATOL
        && (beta - 90.0).abs() <= HEXAGONAL_ATOL
        && (gamma - 60.0).abs() <= HEXAGONAL_ATOL
        && (a - b).abs() <= HEXAGONAL_ATOL
}

/// 按 `KpointsConf` 推导网格与偏移
pub fn derive_mesh(lattice: &Lattice, conf: &KpointsConf) -> Result<MeshInfo> {
    let recip = lattice
        .reciprocal(conf.include_two_pi)
        .ok_or_else(|| TwinflowError::InvalidStructure("singular lattice".to_string()))?;

    let (abc, mut mesh) = get_mesh_from_interval(&recip, conf.interval, conf.decimal_handling)?;
    let is_hexagonal = conf.use_symmetry && is_hexagonal_reciprocal(&recip);

    let offset = if is_hexagonal {
        for m in mesh.iter_mut().take(2) {
            if *m % 2 == 0 {
                *m += 1;
            }
        }
        if mesh[2] != 1 && mesh[2] % 2 == 1 {
            mesh[2] += 1;
        }
        [0.0, 0.0, 0.5]
    } else {
        for m in mesh.iter_mut() {
            if *m != 1 && *m % 2 == 1 {
                *m += 1;
            }
        }
        [0.5, 0.5, 0.5]
    };

    Ok(MeshInfo {
        abc,
        mesh,
        offset,
        is_hexagonal,
    })
}

/// 由实空间晶格与间距推导网格（默认取整与对称性处理）
pub fn get_mesh_offset_from_direct_lattice(
    lattice: &Lattice,
    interval: f64,
    include_two_pi: bool,
) -> Result<MeshInfo> {
    let mut conf = KpointsConf::new(interval);
    conf.include_two_pi = include_two_pi;
    derive_mesh(lattice, &conf)
}

/// 为结构重新设置 relax（或 phonon）段的 k 点
///
/// 声子计算的网格基于 `phonon_conf.supercell_matrix` 超胞。
pub fn fix_kpoints(
    calculator_settings: &CalculatorSettings,
    structure: &Crystal,
    kpoints_conf: &KpointsConf,
    is_phonon: bool,
) -> Result<(CalculatorSettings, MeshInfo)> {
    let section = if is_phonon { "phonon" } else { "relax" };
    let mut settings = calculator_settings.clone();
    let target = settings
        .get_mut(section)
        .ok_or_else(|| TwinflowError::MissingSetting {
            section: "calculator_settings".to_string(),
            key: section.to_string(),
        })?;

    let lattice = if is_phonon {
        let phonon_conf = target
            .phonon_conf
            .as_ref()
            .ok_or_else(|| TwinflowError::MissingSetting {
                section: section.to_string(),
                key: "phonon_conf".to_string(),
            })?;
        supercell_lattice(&structure.lattice, &diagonal(phonon_conf.supercell_matrix))
    } else {
        structure.lattice.clone()
    };

    let info = derive_mesh(&lattice, kpoints_conf)?;
    target.kpoints = info.to_settings();
    Ok((settings, info))
}

/// 保持最细的 k 点间距，把网格换算到另一个晶胞
pub fn convert_kpoints(mesh: [u32; 3], from_lattice: &Lattice, to_lattice: &Lattice) -> Result<MeshInfo> {
    let recip = from_lattice
        .reciprocal(true)
        .ok_or_else(|| TwinflowError::InvalidStructure("singular lattice".to_string()))?;

    let interval = recip
        .abc()
        .iter()
        .zip(mesh)
        .map(|(length, m)| length / m.max(1) as f64)
        .fold(f64::INFINITY, f64::min);

    derive_mesh(to_lattice, &KpointsConf::new(interval))
}
