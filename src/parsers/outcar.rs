//! # VASP OUTCAR 解析器
//!
//! 解析 VASP 计算输出文件 OUTCAR，提取能量、焓、体积与最大受力，
//! 并结合 CONTCAR 组装任务输出。
//!
//! ## 依赖关系
//! - 被 `workflow/context.rs`, `commands/collect.rs` 使用
//! - 使用 `models/calculation.rs`, `parsers/poscar.rs`

use crate::error::{Result, TwinflowError};
use crate::models::TaskOutputs;
use crate::parsers::poscar;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const FINISH_MARKER: &str = "General timing and accounting informations for this job";

/// 解析 VASP OUTCAR 文件
pub fn parse_outcar(path: &Path, label: &str) -> Result<TaskOutputs> {
    let file = File::open(path).map_err(|e| TwinflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_outcar_lines(BufReader::new(file).lines().map_while(|l| l.ok()), label)
}

/// 从行迭代器解析 OUTCAR 内容
pub fn parse_outcar_lines<I>(lines: I, label: &str) -> Result<TaskOutputs>
where
    I: IntoIterator<Item = String>,
{
    let mut result = TaskOutputs::new(label);

    // 受力块状态：剩余待读行数
    let mut force_rows_left: Option<usize> = None;
    let mut block_max: f64 = 0.0;

    for line in lines {
        if let Some(left) = force_rows_left {
            // 跳过表头下方的分隔线
            if line.trim_start().starts_with("---") {
                continue;
            }
            let values: Vec<f64> = line
                .split_whitespace()
                .filter_map(|w| w.parse().ok())
                .collect();
            if values.len() >= 6 {
                let f = (values[3].powi(2) + values[4].powi(2) + values[5].powi(2)).sqrt();
                block_max = block_max.max(f);
            }
            let left = left.saturating_sub(1);
            if left == 0 {
                result.max_force = Some(block_max);
                force_rows_left = None;
            } else {
                force_rows_left = Some(left);
            }
            continue;
        }

        if line.contains(FINISH_MARKER) {
            result.is_finished = true;
        }

        // "POSITION                                       TOTAL-FORCE (eV/Angst)"
        if line.contains("TOTAL-FORCE") {
            let n = result.num_atoms.ok_or_else(|| TwinflowError::ParseError {
                format: "outcar".to_string(),
                path: label.to_string(),
                reason: "TOTAL-FORCE block found before NIONS".to_string(),
            })?;
            force_rows_left = Some(n);
            block_max = 0.0;
            continue;
        }

        // "enthalpy is  TOTEN    =      -123.456789 eV"
        if line.contains("enthalpy is  TOTEN") {
            if let Some(val) = extract_number_before(&line, "eV") {
                result.enthalpy_ev = Some(val);
            }
        }

        // "energy  without entropy=     -123.456789  energy(sigma->0) =     -123.456789"
        if line.contains("energy  without entropy") {
            if let Some(pos) = line.find("energy(sigma->0)") {
                if let Some(val) = extract_number_after(&line[pos..], "=") {
                    result.energy_ev = Some(val);
                }
            }
        }

        // "  volume of cell :      123.456789"
        if line.contains("volume of cell") {
            if let Some(val) = extract_last_number(&line) {
                result.volume = Some(val);
            }
        }

        // "   NIONS =       8"
        if line.contains("NIONS =") {
            if let Some(val) = extract_last_number(&line) {
                result.num_atoms = Some(val as usize);
            }
        }
    }

    Ok(result)
}

/// 读取任务目录：OUTCAR + CONTCAR
pub fn parse_task_dir(dir: &Path, label: &str) -> Result<TaskOutputs> {
    let outcar = dir.join("OUTCAR");
    if !outcar.exists() {
        return Err(TwinflowError::FileNotFound {
            path: outcar.display().to_string(),
        });
    }

    let mut outputs = parse_outcar(&outcar, label)?;

    let contcar = dir.join("CONTCAR");
    if contcar.exists() && contcar.metadata().map(|m| m.len() > 0).unwrap_or(false) {
        let mut crystal = poscar::parse_poscar_file(&contcar)?;
        crystal.name = label.to_string();
        crystal.energy = outputs.energy_ev;
        outputs.final_structure = Some(crystal);
    }

    Ok(outputs)
}

/// 从字符串中提取指定标记之前的数字
fn extract_number_before(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    s[..pos].split_whitespace().last()?.parse().ok()
}

/// 从字符串中提取指定标记之后的数字
fn extract_number_after(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    s[pos + marker.len()..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// 提取字符串中最后一个数字
fn extract_last_number(s: &str) -> Option<f64> {
    s.split_whitespace()
        .filter_map(|w| w.parse::<f64>().ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTCAR: &str = r#"
   NIONS =       2
  volume of cell :       45.6500
 POSITION                                       TOTAL-FORCE (eV/Angst)
 -----------------------------------------------------------------------------------
      1.06333      0.61391      1.29500         0.300000      0.400000      0.000000
      2.12667      1.22782      3.88500        -0.300000     -0.400000      0.000000
 -----------------------------------------------------------------------------------
  energy  without entropy=       -3.10000000  energy(sigma->0) =       -3.20000000
  volume of cell :       45.7000
 POSITION                                       TOTAL-FORCE (eV/Angst)
 -----------------------------------------------------------------------------------
      1.06333      0.61391      1.29500         0.000060      0.000080      0.000000
      2.12667      1.22782      3.88500        -0.000060     -0.000080      0.000000
 -----------------------------------------------------------------------------------
  energy  without entropy=       -3.30000000  energy(sigma->0) =       -3.40000000
  enthalpy is  TOTEN    =        -3.35000000 eV   P V=        0.00000000
 General timing and accounting informations for this job:
"#;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_parse_outcar_takes_last_values() {
        let out = parse_outcar_lines(lines(OUTCAR), "rlx_shear_000").unwrap();

        assert!(out.is_finished);
        assert_eq!(out.num_atoms, Some(2));
        assert!((out.energy_ev.unwrap() - (-3.4)).abs() < 1e-12);
        assert!((out.enthalpy_ev.unwrap() - (-3.35)).abs() < 1e-12);
        assert!((out.volume.unwrap() - 45.7).abs() < 1e-12);
        // 最后一个受力块：|(6e-5, 8e-5, 0)| = 1e-4
        assert!((out.max_force.unwrap() - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_parse_outcar_unfinished() {
        let text = "   NIONS =       1\n  energy  without entropy=  -1.0  energy(sigma->0) =  -1.5\n";
        let out = parse_outcar_lines(lines(text), "x").unwrap();
        assert!(!out.is_finished);
        assert_eq!(out.max_force, None);
        assert!((out.energy_ev.unwrap() + 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_task_dir_reads_contcar() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("OUTCAR"), OUTCAR).unwrap();
        std::fs::write(
            dir.path().join("CONTCAR"),
            "Mg\n1.0\n3.2 0 0\n-1.6 2.77128129 0\n0 0 5.2\nMg\n2\nDirect\n0.333 0.667 0.25\n0.667 0.333 0.75\n",
        )
        .unwrap();

        let out = parse_task_dir(dir.path(), "relax_twinboundary").unwrap();
        let structure = out.final_structure.unwrap();
        assert_eq!(structure.name, "relax_twinboundary");
        assert_eq!(structure.atoms.len(), 2);
        assert_eq!(structure.energy, Some(-3.4));
    }

    #[test]
    fn test_parse_task_dir_without_outcar() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            parse_task_dir(dir.path(), "x"),
            Err(TwinflowError::FileNotFound { .. })
        ));
    }
}
