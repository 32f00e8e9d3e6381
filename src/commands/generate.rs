//! # generate 命令实现
//!
//! 只生成剪切结构或孪晶界结构并写为 POSCAR，不涉及调度器。
//!
//! ## 依赖关系
//! - 使用 `cli/generate.rs` 定义的参数
//! - 使用 `config/workflow.rs`, `crystal/`, `parsers/poscar.rs`

use crate::cli::generate::{GenerateArgs, GenerateCommands, GenerateTarget};
use crate::config::{ShearInput, TwinBoundaryRelaxInput};
use crate::crystal::{get_shear_structures, get_twinboundary_structure};
use crate::error::{Result, TwinflowError};
use crate::models::Crystal;
use crate::parsers::poscar;
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 执行 generate 命令
pub fn execute(args: GenerateArgs) -> Result<()> {
    match args.command {
        GenerateCommands::Shear(target) => shear(&target),
        GenerateCommands::Twinboundary(target) => twinboundary(&target),
    }
}

fn shear(target: &GenerateTarget) -> Result<()> {
    let input = ShearInput::load(&target.input)?;
    let parent = poscar::parse_poscar_file(&input.structure)?;
    let shear = get_shear_structures(&parent, &input.shear_conf)?;

    output::print_header(&format!("Shear structures ({})", input.shear_conf.twinmode));
    output::print_field("gamma", &format!("{:.6}", shear.gamma));
    for (crystal, ratio) in shear.structures.iter().zip(&shear.ratios) {
        let path = write_into(&target.output, crystal)?;
        println!("  {:.4}  {:<8} {}", ratio, crystal.formula(), path.display());
    }
    output::print_success(&format!(
        "{} structures written to '{}'",
        shear.total_structures(),
        target.output.display()
    ));
    Ok(())
}

fn twinboundary(target: &GenerateTarget) -> Result<()> {
    let input = TwinBoundaryRelaxInput::load(&target.input)?;
    let parent = poscar::parse_poscar_file(&input.structure)?;
    let tb = get_twinboundary_structure(&parent, &input.twinboundary_conf)?;

    output::print_header(&format!("Twin boundary ({})", input.twinboundary_conf.twinmode));
    output::print_field("twinning shear", &format!("{:.6}", tb.twinning_shear));
    for crystal in [&tb.original, &tb.standardized] {
        let path = write_into(&target.output, crystal)?;
        println!("  {:<10} {}", crystal.formula(), path.display());
    }
    output::print_success(&format!("Structures written to '{}'", target.output.display()));
    Ok(())
}

/// 写到 `<dir>/<name>.POSCAR`
fn write_into(dir: &Path, crystal: &Crystal) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| TwinflowError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })?;
    let path = dir.join(format!("{}.POSCAR", crystal.name));
    poscar::write_poscar(&path, crystal)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crystal::tests::hcp_mg;

    #[test]
    fn test_generate_shear_structures() {
        let dir = tempfile::tempdir().unwrap();
        poscar::write_poscar(&dir.path().join("POSCAR"), &hcp_mg()).unwrap();
        let input = dir.path().join("shear.toml");
        fs::write(
            &input,
            r#"
computer = "stern"
structure = "POSCAR"

[shear_conf]
twinmode = "10-12"
grids = 3
"#,
        )
        .unwrap();

        let out = dir.path().join("structures");
        let target = GenerateTarget {
            input,
            output: out.clone(),
        };
        shear(&target).unwrap();

        let expected = get_shear_structures(&hcp_mg(), &ShearInput::load(&target.input).unwrap().shear_conf).unwrap();
        for (i, s) in expected.structures.iter().enumerate() {
            let path = out.join(format!("shear_{:03}.POSCAR", i));
            let crystal = poscar::parse_poscar_file(&path).unwrap();
            assert_eq!(crystal.atoms.len(), s.atoms.len());
            assert!((crystal.lattice.volume() - s.lattice.volume()).abs() < 1e-6);
        }
    }
}
