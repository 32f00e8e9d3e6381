//! # 孪晶界结构
//!
//! 母相区由 `layers` 个剪切坐标系晶胞沿 e3 堆垛而成；孪晶区是母相区关于
//! K1 面的镜像 (twintype 1) 或绕 η1 旋转 180° 的像 (twintype 2)。
//! 界面位于母相原子层之间最大间隙的中央，两个界面各留 `delta`（以 K1 面间距为单位）的间隙，
//! 孪晶区可沿 e1/e2 平移 `xshift`/`yshift`。
//!
//! ## 依赖关系
//! - 被 `workflow/twinboundary_relax.rs`, `workflow/twinboundary_shear.rs`, `commands/generate.rs` 使用
//! - 使用 `crystal/shear.rs`, `crystal/standardize.rs`

use super::shear::{shear_frame_cell, shear_lattice};
use super::standardize::{standardize, StandardizedCell};
use super::twinmode::TwinMode;
use super::{check_hexagonal, SYMPREC};
use crate::config::TwinBoundaryConf;
use crate::error::{Result, TwinflowError};
use crate::models::{wrap_fraction, Atom, Crystal, Lattice};
use crate::parsers::poscar::species_grouped_order;
use nalgebra::{Matrix3, Vector3};
use serde_json::Value;

/// 孪晶界生成结果
#[derive(Debug, Clone)]
pub struct TwinBoundary {
    /// twinboundary_orig
    pub original: Crystal,
    /// twinboundary（常规胞，不做原胞搜索）
    pub standardized: Crystal,
    /// twinboundary_parameters
    pub parameters: Value,
    /// 带符号的孪晶切变量
    pub twinning_shear: f64,
}

/// 把剪切坐标系晶胞的原点移到原子层间最大间隙的中央（沿 e3）
fn center_on_largest_gap(cell: &mut Crystal) {
    let mut heights: Vec<f64> = cell.atoms.iter().map(|a| wrap_fraction(a.position[2])).collect();
    heights.sort_by(|a, b| a.total_cmp(b));
    heights.dedup_by(|a, b| (*a - *b).abs() < 1e-8);

    let Some(&lowest) = heights.first() else {
        return;
    };
    let mut best_gap = -1.0;
    let mut best_mid = 0.0;
    for (i, &h) in heights.iter().enumerate() {
        let next = heights.get(i + 1).copied().unwrap_or(lowest + 1.0);
        let gap = next - h;
        if gap > best_gap + 1e-9 {
            best_gap = gap;
            best_mid = h + gap / 2.0;
        }
    }

    for atom in &mut cell.atoms {
        atom.position[2] = wrap_fraction(atom.position[2] - best_mid);
    }
}

/// 孪晶操作：镜像或绕 η1 的二次旋转
fn twin_operation(twintype: u8, e1: &Vector3<f64>, n: &Vector3<f64>) -> Result<Matrix3<f64>> {
    match twintype {
        1 => Ok(Matrix3::identity() - 2.0 * n * n.transpose()),
        2 => Ok(2.0 * e1 * e1.transpose() - Matrix3::identity()),
        other => Err(TwinflowError::InvalidArgument(format!(
            "twintype must be 1 or 2, got {}",
            other
        ))),
    }
}

/// 把堆垛矢量的面内分量减到最小
fn flatten_stacking(c: Vector3<f64>, e1: &Vector3<f64>, e2: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    let in_plane = c - n * c.dot(n);
    let g11 = e1.dot(e1);
    let g12 = e1.dot(e2);
    let g22 = e2.dot(e2);
    let b1 = in_plane.dot(e1);
    let b2 = in_plane.dot(e2);
    let det = g11 * g22 - g12 * g12;
    let x = (b1 * g22 - b2 * g12) / det;
    let y = (g11 * b2 - g12 * b1) / det;
    c - e1 * x.round() - e2 * y.round()
}

/// 生成孪晶界结构
pub fn get_twinboundary_structure(structure: &Crystal, conf: &TwinBoundaryConf) -> Result<TwinBoundary> {
    let mode: TwinMode = conf.twinmode.parse()?;
    let r = check_hexagonal(structure)?;
    if conf.layers == 0 {
        return Err(TwinflowError::InvalidArgument(
            "layers must be at least 1".to_string(),
        ));
    }

    let mut unit = shear_frame_cell(structure, mode, conf.expansion_ratios)?;
    center_on_largest_gap(&mut unit);

    let e1 = unit.lattice.vector(0);
    let e2 = unit.lattice.vector(1);
    let e3 = unit.lattice.vector(2);
    let e1_hat = e1.normalize();
    let n = e1.cross(&e2).normalize();
    let d = e3.dot(&n);

    let rot = twin_operation(conf.twintype, &e1_hat, &n)?;
    let w3 = -(rot * e3);
    let layers = conf.layers as f64;

    let origin_twin = e3 * layers + n * (conf.delta * d) + e1 * conf.xshift + e2 * conf.yshift;
    let unit_cart = unit.cartesian_positions();

    let mut positions: Vec<(String, Vector3<f64>)> = Vec::with_capacity(2 * conf.layers * unit.atoms.len());
    for k in 0..conf.layers {
        for (atom, r_cart) in unit.atoms.iter().zip(&unit_cart) {
            positions.push((atom.element.clone(), r_cart + e3 * k as f64));
        }
    }
    for k in 0..conf.layers {
        for (atom, r_cart) in unit.atoms.iter().zip(&unit_cart) {
            let p = origin_twin + rot * r_cart + w3 * (k + 1) as f64;
            positions.push((atom.element.clone(), p));
        }
    }

    let mut stacking = (e3 + w3) * layers + n * (2.0 * conf.delta * d);
    if conf.make_tb_flat {
        stacking = flatten_stacking(stacking, &e1, &e2, &n);
    }

    let lattice = Lattice::from_vectors([
        [e1.x, e1.y, e1.z],
        [e2.x, e2.y, e2.z],
        [stacking.x, stacking.y, stacking.z],
    ]);

    let mut atoms = Vec::with_capacity(positions.len());
    for (element, p) in positions {
        let f = lattice
            .to_fractional(&p)
            .ok_or_else(|| TwinflowError::InvalidStructure("singular twin boundary cell".to_string()))?;
        atoms.push(Atom::new(element, [wrap_fraction(f[0]), wrap_fraction(f[1]), wrap_fraction(f[2])]));
    }

    let twinning_shear = mode.signed_shear(r);
    let lattice = shear_lattice(&lattice, conf.shear_strain_ratio * twinning_shear);

    let original = Crystal::new("twinboundary_orig", lattice, atoms).labelled(
        "twinboundary_orig",
        "twinboundary not standardized original structure",
    );
    let standardized = standardize(&original, false, SYMPREC)?
        .crystal
        .labelled("twinboundary", "twinboundary standardized structure");

    let mut parameters = serde_json::to_value(conf).map_err(|e| TwinflowError::Other(e.to_string()))?;
    if let Value::Object(map) = &mut parameters {
        map.insert("to_primitive".to_string(), Value::Bool(false));
        map.insert("symprec".to_string(), serde_json::json!(SYMPREC));
        map.insert("move_atoms_into_unitcell".to_string(), Value::Bool(true));
        map.insert("no_sort".to_string(), Value::Bool(true));
        map.insert("get_lattice".to_string(), Value::Bool(false));
        map.insert("twinning_shear".to_string(), serde_json::json!(twinning_shear));
    }

    Ok(TwinBoundary {
        original,
        standardized,
        parameters,
        twinning_shear,
    })
}

/// 对弛豫后的孪晶界施加切变
///
/// `positions` 为原始（未标准化）坐标系下的分数坐标，缺省时沿用 `twinboundary_orig`。
pub fn get_twinboundary_shear_structure(
    twinboundary_orig: &Crystal,
    shear: f64,
    positions: Option<&[[f64; 3]]>,
) -> Result<(Crystal, StandardizedCell)> {
    let mut orig = twinboundary_orig.clone();
    orig.lattice = shear_lattice(&twinboundary_orig.lattice, shear);

    if let Some(positions) = positions {
        if positions.len() != orig.atoms.len() {
            return Err(TwinflowError::InvalidStructure(format!(
                "relaxed structure has {} atoms, twin boundary has {}",
                positions.len(),
                orig.atoms.len()
            )));
        }
        for (atom, p) in orig.atoms.iter_mut().zip(positions) {
            atom.position = *p;
        }
    }
    orig.wrap_positions();

    let std = standardize(&orig, false, SYMPREC)?;
    Ok((orig, std))
}

/// 把弛豫后的 CONTCAR 坐标映射回原始坐标系
///
/// CONTCAR 的原子按元素分组（`species_grouped_order`），晶胞为 `frame` 的标准化晶胞；
/// 返回值按 `frame` 对应原始结构的原子顺序排列。
pub fn relaxed_positions_in_original_frame(frame: &StandardizedCell, relaxed: &Crystal) -> Result<Vec<[f64; 3]>> {
    let order = species_grouped_order(&frame.crystal);
    if relaxed.atoms.len() != order.len() {
        return Err(TwinflowError::InvalidStructure(format!(
            "relaxed structure has {} atoms, expected {}",
            relaxed.atoms.len(),
            order.len()
        )));
    }

    let mut positions = vec![[0.0; 3]; order.len()];
    for (atom, &idx) in relaxed.atoms.iter().zip(&order) {
        if atom.element != frame.crystal.atoms[idx].element {
            return Err(TwinflowError::InvalidStructure(format!(
                "relaxed atom {} is {}, expected {}",
                idx, atom.element, frame.crystal.atoms[idx].element
            )));
        }
        positions[idx] = frame.to_original_frame(atom.position);
    }
    Ok(positions)
}
