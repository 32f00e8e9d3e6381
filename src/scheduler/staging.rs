//! # 任务目录准备
//!
//! 把计算请求落地为任务目录：
//! ```text
//! <label>/
//!   request.json   计算请求（续算时读回）
//!   POSCAR INCAR KPOINTS POTCAR
//!   run.sh         计算脚本（弛豫循环或 phonopy 流程）
//! ```
//!
//! ## 依赖关系
//! - 被 `workflow/context.rs` 使用
//! - 使用 `builder/`, `parsers/`, `config/profile.rs`

use crate::builder::{CalcJobRequest, Payload, PhononInputs, VaspInputs};
use crate::config::{ComputerProfile, IncarValue, KpointsSettings};
use crate::error::{Result, TwinflowError};
use crate::models::Crystal;
use crate::parsers::{incar, kpoints, poscar};
use crate::utils::output::print_warning;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 请求文件名
pub const REQUEST_FILE: &str = "request.json";
/// 计算脚本名
pub const RUN_SCRIPT: &str = "run.sh";

/// 已写好输入文件的任务
#[derive(Debug, Clone)]
pub struct StagedTask {
    pub label: String,
    pub dir: PathBuf,
    pub request: CalcJobRequest,
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| TwinflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 读取任务目录中的计算请求
pub fn read_request(dir: &Path) -> Result<CalcJobRequest> {
    let path = dir.join(REQUEST_FILE);
    let content = fs::read_to_string(&path).map_err(|e| TwinflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| TwinflowError::JsonError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 写出任务目录
pub fn stage_task(request: &CalcJobRequest, dir: &Path, profile: &ComputerProfile) -> Result<StagedTask> {
    fs::create_dir_all(dir).map_err(|e| TwinflowError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })?;

    let json = serde_json::to_string_pretty(request).map_err(|e| TwinflowError::JsonError {
        path: dir.join(REQUEST_FILE).display().to_string(),
        source: e,
    })?;
    write_file(&dir.join(REQUEST_FILE), &json)?;
    poscar::write_poscar(&dir.join("POSCAR"), &request.structure)?;

    let executable = profile.executable(request.code_name());
    let nprocs = request.options.resources.tot_num_mpiprocs;
    let launcher = format!("{} -np {} {}", profile.mpirun, nprocs, executable);

    let script = match &request.payload {
        Payload::Vasp(vasp) => {
            write_vasp_inputs(dir, &request.structure, vasp, &vasp.incar, &vasp.kpoints, profile)?;
            vasp_script(&launcher, 1, vasp.clean_workdir)
        }
        Payload::Relax { vasp, relax } => {
            let mut tags = vasp.incar.clone();
            tags.extend(relax.incar_tags()?);
            write_vasp_inputs(dir, &request.structure, vasp, &tags, &vasp.kpoints, profile)?;
            vasp_script(&launcher, relax.max_iterations(), vasp.clean_workdir)
        }
        Payload::Phonon(inputs) => {
            let forces = &inputs.forces;
            let kpts = KpointsSettings {
                mesh: forces.kpoints_mesh,
                offset: forces.kpoints_offset,
            };
            incar::write_incar(&dir.join("INCAR"), &forces.incar)?;
            kpoints::write_kpoints(&dir.join("KPOINTS"), &kpts)?;
            write_potcar(dir, &request.structure, &forces.potential_family, &forces.potential_mapping, profile)?;

            let vasp_code = forces.code_string.split('@').next().unwrap_or(&forces.code_string);
            let vasp_launcher = format!("{} -np {} {}", profile.mpirun, nprocs, profile.executable(vasp_code));
            phonon_script(&executable, &vasp_launcher, inputs)
        }
    };
    write_file(&dir.join(RUN_SCRIPT), &script)?;

    Ok(StagedTask {
        label: request.label.clone(),
        dir: dir.to_path_buf(),
        request: request.clone(),
    })
}

fn write_vasp_inputs(
    dir: &Path,
    structure: &Crystal,
    vasp: &VaspInputs,
    tags: &BTreeMap<String, IncarValue>,
    kpts: &KpointsSettings,
    profile: &ComputerProfile,
) -> Result<()> {
    incar::write_incar(&dir.join("INCAR"), tags)?;
    kpoints::write_kpoints(&dir.join("KPOINTS"), kpts)?;
    write_potcar(dir, structure, &vasp.potential_family, &vasp.potential_mapping, profile)
}

/// 按 POSCAR 元素顺序拼接 POTCAR；找不到时只给出警告
fn write_potcar(
    dir: &Path,
    structure: &Crystal,
    family: &str,
    mapping: &BTreeMap<String, String>,
    profile: &ComputerProfile,
) -> Result<()> {
    let Some(root) = &profile.potcar_root else {
        print_warning(&format!(
            "No potcar_root configured, provide POTCAR in {} manually",
            dir.display()
        ));
        return Ok(());
    };

    let mut content = String::new();
    for element in structure.species() {
        let name = mapping.get(&element).cloned().unwrap_or_else(|| element.clone());
        let path = root.join(family).join(&name).join("POTCAR");
        match fs::read_to_string(&path) {
            Ok(text) => content.push_str(&text),
            Err(_) => {
                print_warning(&format!("POTCAR not found: {}, job may fail", path.display()));
                return Ok(());
            }
        }
    }
    write_file(&dir.join("POTCAR"), &content)
}

fn vasp_script(launcher: &str, iterations: u32, clean_workdir: bool) -> String {
    let mut script = String::from("#!/bin/bash\nset -e\n\n");
    if iterations > 1 {
        script.push_str(&format!(
            "for i in $(seq 1 {}); do\n  {} > vasp.out\n  if grep -q \"reached required accuracy\" OUTCAR; then\n    break\n  fi\n  cp CONTCAR POSCAR\ndone\n",
            iterations, launcher
        ));
    } else {
        script.push_str(&format!("{} > vasp.out\n", launcher));
    }
    if clean_workdir {
        script.push_str("rm -f WAVECAR CHGCAR CHG\n");
    }
    script
}

fn phonon_script(phonopy: &str, vasp_launcher: &str, inputs: &PhononInputs) -> String {
    let conf = &inputs.phonon_settings;
    let [d1, d2, d3] = conf.supercell_matrix;
    let dim = format!("--dim=\"{} {} {}\"", d1, d2, d3);

    let mut script = String::from("#!/bin/bash\nset -e\n\n");
    script.push_str(&format!(
        "{} -d {} --amplitude={} --tolerance={} -c POSCAR\n",
        phonopy, dim, conf.distance, conf.symmetry_tolerance
    ));
    script.push_str(&format!(
        "for disp in POSCAR-*; do\n  n=${{disp#POSCAR-}}\n  mkdir -p disp-$n\n  cp $disp disp-$n/POSCAR\n  cp INCAR KPOINTS POTCAR disp-$n/ 2>/dev/null || true\n  (cd disp-$n && {} > vasp.out)\ndone\n",
        vasp_launcher
    ));
    script.push_str(&format!("{} -f disp-*/vasprun.xml\n", phonopy));
    if let Some([m1, m2, m3]) = conf.mesh {
        script.push_str(&format!(
            "{} {} --mesh=\"{} {} {}\" --nac={} -c POSCAR\n",
            phonopy,
            dim,
            m1,
            m2,
            m3,
            if conf.is_nac.unwrap_or(false) { ".TRUE." } else { ".FALSE." }
        ));
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::get_calcjob_builder;
    use crate::config::calculator::tests::settings;
    use crate::crystal::tests::hcp_mg;

    #[test]
    fn test_stage_relax_task() {
        let dir = tempfile::tempdir().unwrap();
        let request = get_calcjob_builder("rlx_shear_000", "d", "relax", "stern", &hcp_mg(), &settings()).unwrap();

        let task_dir = dir.path().join("rlx_shear_000");
        let staged = stage_task(&request, &task_dir, &ComputerProfile::default()).unwrap();
        assert_eq!(staged.label, "rlx_shear_000");

        let incar = fs::read_to_string(task_dir.join("INCAR")).unwrap();
        assert!(incar.contains("ENCUT = 300"));
        assert!(incar.contains("ISIF = 3"));
        assert!(incar.contains("IBRION = 1"));
        assert!(incar.contains("NSW = 20"));
        assert!(incar.contains("EDIFFG = -0.001"));

        let script = fs::read_to_string(task_dir.join(RUN_SCRIPT)).unwrap();
        assert!(script.contains("seq 1 2"));
        assert!(script.contains("mpirun -np 16 vasp544mpi"));

        assert!(task_dir.join("POSCAR").exists());
        assert!(task_dir.join("KPOINTS").exists());
        assert!(!task_dir.join("POTCAR").exists());

        let back = read_request(&task_dir).unwrap();
        assert_eq!(back.label, request.label);
        assert_eq!(back.relax(), request.relax());
        assert_eq!(back.vasp_inputs().unwrap().kpoints, request.vasp_inputs().unwrap().kpoints);
    }

    #[test]
    fn test_stage_phonon_task_with_potcar() {
        let dir = tempfile::tempdir().unwrap();
        let potcar_dir = dir.path().join("potcars").join("PBE.54").join("Mg_pv");
        fs::create_dir_all(&potcar_dir).unwrap();
        fs::write(potcar_dir.join("POTCAR"), "PAW_PBE Mg_pv\n").unwrap();

        let mut profile = ComputerProfile::default();
        profile.potcar_root = Some(dir.path().join("potcars"));
        profile.codes.insert("vasp544mpi".to_string(), "vasp_std".to_string());

        let request = get_calcjob_builder("ph_shear_000", "d", "phonon", "stern", &hcp_mg(), &settings()).unwrap();
        let task_dir = dir.path().join("ph_shear_000");
        stage_task(&request, &task_dir, &profile).unwrap();

        assert_eq!(fs::read_to_string(task_dir.join("POTCAR")).unwrap(), "PAW_PBE Mg_pv\n");
        let script = fs::read_to_string(task_dir.join(RUN_SCRIPT)).unwrap();
        assert!(script.contains("phonopy -d --dim=\"2 2 2\" --amplitude=0.03"));
        assert!(script.contains("mpirun -np 16 vasp_std"));
        assert!(script.contains("--mesh=\"18 18 10\""));
        assert!(script.contains("--nac=.FALSE."));
    }
}
