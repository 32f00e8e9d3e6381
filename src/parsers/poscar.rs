//! # VASP POSCAR 格式读写
//!
//! 解析 POSCAR/CONTCAR 文件，并把生成的结构写回 POSCAR。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `scheduler/staging.rs`, `commands/`, `parsers/outcar.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{Result, TwinflowError};
use crate::models::{Atom, Crystal, Lattice};
use nalgebra::Vector3;
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| TwinflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

fn parse_error(name: &str, reason: impl Into<String>) -> TwinflowError {
    TwinflowError::ParseError {
        format: "poscar".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(default_name, "File too short"));
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();
    let name = if name.is_empty() {
        default_name.to_string()
    } else {
        name
    };

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_error(&name, "Invalid scaling factor"))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                &name,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        *row = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols (VASP 5+) or atom counts (VASP 4)
    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    if line5_parts.is_empty() {
        return Err(parse_error(&name, "Missing species line"));
    }
    let (elements, counts, atom_line_start) = if line5_parts[0].parse::<usize>().is_ok() {
        // VASP 4 format: no element line, only counts
        let counts: Vec<usize> = line5_parts.iter().filter_map(|s| s.parse().ok()).collect();
        let elements: Vec<String> = (0..counts.len()).map(|i| format!("X{}", i + 1)).collect();
        (elements, counts, 6)
    } else {
        let elements: Vec<String> = line5_parts.iter().map(|s| s.to_string()).collect();
        let counts: Vec<usize> = lines[6]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        (elements, counts, 7)
    };

    if elements.len() != counts.len() {
        return Err(parse_error(&name, "Species and count lines differ in length"));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = atom_line_start;
    if lines.len() > coord_line
        && lines[coord_line]
            .trim()
            .to_lowercase()
            .starts_with('s')
    {
        coord_line += 1;
    }

    if lines.len() <= coord_line {
        return Err(parse_error(&name, "Missing coordinate type line"));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let mut atoms: Vec<Atom> = Vec::new();
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .map(|l| {
                    l.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();

            if parts.len() < 3 {
                return Err(parse_error(
                    &name,
                    format!("Invalid atom position at line {}", line_idx + 1),
                ));
            }

            let position = if is_cartesian {
                let cart = Vector3::new(parts[0], parts[1], parts[2]) * scale;
                lattice
                    .to_fractional(&cart)
                    .ok_or_else(|| parse_error(&name, "Singular lattice"))?
            } else {
                [parts[0], parts[1], parts[2]]
            };
            atoms.push(Atom::new(elem.clone(), position));
            line_idx += 1;
        }
    }

    Ok(Crystal::new(name, lattice, atoms))
}

/// POSCAR 中的原子顺序：按元素首次出现的顺序分组，组内保持原顺序
///
/// 返回值第 k 项是 POSCAR 第 k 个原子在 `crystal.atoms` 中的序号。
/// VASP 写出的 CONTCAR 沿用该顺序，映射回原结构时需要它。
pub fn species_grouped_order(crystal: &Crystal) -> Vec<usize> {
    let mut order = Vec::with_capacity(crystal.atoms.len());
    for elem in crystal.species() {
        order.extend(
            crystal
                .atoms
                .iter()
                .enumerate()
                .filter(|(_, a)| a.element == elem)
                .map(|(i, _)| i),
        );
    }
    order
}

/// 将 Crystal 转换为 POSCAR 格式字符串
pub fn to_poscar_string(crystal: &Crystal) -> String {
    let species = crystal.species();
    let mut result = String::new();

    result.push_str(&format!("{}\n", crystal.name));
    result.push_str("1.0\n");

    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "  {:20.14}  {:20.14}  {:20.14}\n",
            row[0], row[1], row[2]
        ));
    }

    result.push_str(&format!("   {}\n", species.join("   ")));

    let counts: Vec<String> = species
        .iter()
        .map(|e| {
            crystal
                .atoms
                .iter()
                .filter(|a| &a.element == e)
                .count()
                .to_string()
        })
        .collect();
    result.push_str(&format!("   {}\n", counts.join("   ")));

    result.push_str("Direct\n");

    for idx in species_grouped_order(crystal) {
        let pos = crystal.atoms[idx].position;
        result.push_str(&format!(
            "  {:18.14}  {:18.14}  {:18.14}\n",
            pos[0], pos[1], pos[2]
        ));
    }

    result
}

/// 写出 POSCAR 文件
pub fn write_poscar(path: &Path, crystal: &Crystal) -> Result<()> {
    fs::write(path, to_poscar_string(crystal)).map_err(|e| TwinflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HCP_MG: &str = r#"HCP_Mg
1.0
3.1900000000 0.0000000000 0.0000000000
-1.5950000000 2.7626210381 0.0000000000
0.0000000000 0.0000000000 5.1800000000
Mg
2
Direct
0.3333333333 0.6666666667 0.2500000000
0.6666666667 0.3333333333 0.7500000000
"#;

    #[test]
    fn test_parse_poscar_hcp() {
        let crystal = parse_poscar_content(HCP_MG, "Mg").unwrap();
        assert_eq!(crystal.name, "HCP_Mg");
        assert_eq!(crystal.atoms.len(), 2);

        let (a, b, c, _, _, gamma) = crystal.lattice.parameters();
        assert!((a - 3.19).abs() < 1e-6);
        assert!((b - 3.19).abs() < 1e-6);
        assert!((c - 5.18).abs() < 1e-6);
        assert!((gamma - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_parse_poscar_with_scale() {
        let content = r#"Si
2.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Si
2
Direct
0.0 0.0 0.0
0.5 0.5 0.5
"#;
        let crystal = parse_poscar_content(content, "Si").unwrap();
        let (a, _, _, _, _, _) = crystal.lattice.parameters();
        assert!((a - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_poscar_cartesian_selective_dynamics() {
        let content = r#"Fe with selective
1.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Fe
2
Selective dynamics
Cartesian
0.0 0.0 0.0 T T T
1.0 1.0 1.0 F F F
"#;
        let crystal = parse_poscar_content(content, "Fe").unwrap();
        assert_eq!(crystal.atoms.len(), 2);
        assert!((crystal.atoms[1].position[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_poscar_groups_species() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let atoms = vec![
            Atom::new("Ti", [0.0, 0.0, 0.0]),
            Atom::new("O", [0.5, 0.5, 0.0]),
            Atom::new("Ti", [0.5, 0.5, 0.5]),
        ];
        let crystal = Crystal::new("TiO", lattice, atoms);

        let text = to_poscar_string(&crystal);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[5].split_whitespace().collect::<Vec<_>>(), vec!["Ti", "O"]);
        assert_eq!(lines[6].split_whitespace().collect::<Vec<_>>(), vec!["2", "1"]);

        let parsed = parse_poscar_content(&text, "TiO").unwrap();
        assert_eq!(parsed.atoms[1].element, "Ti");
        assert!((parsed.atoms[1].position[0] - 0.5).abs() < 1e-12);

        assert_eq!(species_grouped_order(&crystal), vec![0, 2, 1]);
    }

    #[test]
    fn test_parse_poscar_too_short() {
        assert!(parse_poscar_content("x\n1.0\n", "x").is_err());
    }
}
