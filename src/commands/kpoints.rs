//! # kpoints 命令实现
//!
//! 读取结构，按间距推导 k 点网格并打印。
//!
//! ## 依赖关系
//! - 使用 `cli/kpoints.rs` 定义的参数
//! - 使用 `kpoints.rs`, `parsers/poscar.rs`

use crate::cli::kpoints::KpointsArgs;
use crate::config::KpointsConf;
use crate::error::{Result, TwinflowError};
use crate::kpoints::derive_mesh;
use crate::parsers::poscar;
use crate::utils::output;

/// 执行 kpoints 命令
pub fn execute(args: KpointsArgs) -> Result<()> {
    if args.interval <= 0.0 {
        return Err(TwinflowError::InvalidArgument(format!(
            "interval must be positive, got {}",
            args.interval
        )));
    }

    let crystal = poscar::parse_poscar_file(&args.structure)?;
    let conf = KpointsConf {
        interval: args.interval,
        decimal_handling: args.decimal_handling.into(),
        use_symmetry: !args.no_symmetry,
        include_two_pi: !args.no_two_pi,
    };
    let info = derive_mesh(&crystal.lattice, &conf)?;

    output::print_header(&format!("K-points for {}", args.structure.display()));
    output::print_field(
        "reciprocal abc",
        &format!("{:.6} {:.6} {:.6}", info.abc[0], info.abc[1], info.abc[2]),
    );
    output::print_field(
        "mesh",
        &format!("{} {} {}", info.mesh[0], info.mesh[1], info.mesh[2]),
    );
    output::print_field(
        "offset",
        &format!("{} {} {}", info.offset[0], info.offset[1], info.offset[2]),
    );
    output::print_field("hexagonal", &info.is_hexagonal.to_string());
    Ok(())
}
