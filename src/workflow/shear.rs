//! # 剪切工作流
//!
//! 对六方母相沿孪晶模式施加一系列切变，逐个弛豫，收集能量；可选地对弛豫结构做声子计算。
//!
//! ```text
//! initialize → create_shear_structures → if dry_run { terminate_dry_run }
//!     else { run_relax → create_energies → if is_phonon { run_phonon } → terminate }
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/workflow.rs` 使用
//! - 使用 `crystal/shear.rs`, `builder/`, `kpoints.rs`, `collector.rs`

use super::{Outline, OutputValue, RunContext, WorkChain};
use crate::builder::get_calcjob_builder;
use crate::collector::collect_relax_results;
use crate::config::{CalculatorSettings, KpointsConf, ShearInput};
use crate::crystal::get_shear_structures;
use crate::error::{Result, TwinflowError};
use crate::kpoints::fix_kpoints;
use crate::models::Crystal;
use crate::parsers::poscar;
use crate::utils::progress::create_progress_bar;

pub struct ShearWorkChain {
    input: ShearInput,
    structure: Crystal,
    calculator_settings: CalculatorSettings,
    ratios: Vec<f64>,
    shears: Vec<Crystal>,
}

impl ShearWorkChain {
    /// 从输入文件中的结构路径读取母相
    pub fn new(input: ShearInput) -> Result<Self> {
        let structure = poscar::parse_poscar_file(&input.structure)?;
        Ok(Self::with_structure(input, structure))
    }

    pub fn with_structure(input: ShearInput, structure: Crystal) -> Self {
        let calculator_settings = input.calculator_settings.clone();
        ShearWorkChain {
            input,
            structure,
            calculator_settings,
            ratios: Vec::new(),
            shears: Vec::new(),
        }
    }

    fn relax_label(i: usize) -> String {
        format!("rlx_shear_{:03}", i)
    }

    fn relax_labels(&self) -> Vec<String> {
        (0..self.ratios.len()).map(Self::relax_label).collect()
    }

    fn kpoints_conf(&self) -> Result<&KpointsConf> {
        self.input
            .kpoints_conf
            .as_ref()
            .ok_or_else(|| TwinflowError::MissingSetting {
                section: "input".to_string(),
                key: "kpoints_conf".to_string(),
            })
    }

    /// use_kpoints_interval 为真时按结构重新设置 k 点
    fn settings_for(&mut self, structure: &Crystal, is_phonon: bool) -> Result<()> {
        if self.input.use_kpoints_interval {
            let (settings, _) = fix_kpoints(&self.calculator_settings, structure, self.kpoints_conf()?, is_phonon)?;
            self.calculator_settings = settings;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 条件
    // ─────────────────────────────────────────────────────────────

    fn dry_run(&self, _: &mut RunContext) -> bool {
        self.input.dry_run
    }

    fn is_phonon(&self, _: &mut RunContext) -> bool {
        self.input.is_phonon
    }

    // ─────────────────────────────────────────────────────────────
    // 步骤
    // ─────────────────────────────────────────────────────────────

    fn initialize(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Start ShearWorkChain.");
        Ok(())
    }

    fn terminate_dry_run(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Dry run has activated.");
        ctx.report(Self::NAME, "Terminate ShearWorkChain.");
        Ok(())
    }

    fn terminate(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# ShearWorkChain has finished successfully.");
        ctx.report(Self::NAME, "All jobs have finished.");
        ctx.report(Self::NAME, "Terminate ShearWorkChain.");
        Ok(())
    }

    fn create_shear_structures(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Create shear structures.");
        let shear = get_shear_structures(&self.structure, &self.input.shear_conf)?;

        ctx.out("gamma", OutputValue::Float(shear.gamma));
        ctx.out("shear_ratios", OutputValue::Dict(shear.shear_settings()));
        if let Some(parent) = shear.structures.first() {
            ctx.out("parent", OutputValue::Structure(parent.clone()));
        }
        for s in &shear.structures {
            ctx.write_structure(s)?;
        }

        self.ratios = shear.ratios;
        self.shears = shear.structures;
        Ok(())
    }

    fn run_relax(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Run relax calculations.");
        let shears = self.shears.clone();
        let pb = create_progress_bar(shears.len() as u64, "submitting relax");

        for (i, (structure, ratio)) in shears.iter().zip(self.ratios.clone()).enumerate() {
            let label = Self::relax_label(i);
            let description = format!("{}, ratio: {:.6}", label, ratio);
            self.settings_for(structure, false)?;

            let request = get_calcjob_builder(
                &label,
                &description,
                "relax",
                &ctx.computer,
                structure,
                &self.calculator_settings,
            )?;
            let handle = ctx.submit(&request)?;
            ctx.report(
                Self::NAME,
                &format!(
                    "{} relax workflow has submitted, job: {}",
                    label,
                    handle.job_id.as_deref().unwrap_or("-")
                ),
            );
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(())
    }

    fn create_energies(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# Collect results.");
        let labels = self.relax_labels();
        let outputs = ctx.collect_outputs(&labels)?;
        let results = collect_relax_results(&outputs, &labels)?;

        let value = serde_json::to_value(&results).map_err(|e| TwinflowError::Other(e.to_string()))?;
        ctx.out("relax_results", OutputValue::Dict(value));
        Ok(())
    }

    fn run_phonon(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# run phonon");
        self.calculator_settings = self.input.calculator_settings.clone();

        for (i, ratio) in self.ratios.clone().into_iter().enumerate() {
            let relax_label = Self::relax_label(i);
            let label = format!("ph_shear_{:03}", i);
            let description = format!("{}, ratio: {:.6}", label, ratio);

            let structure = ctx
                .task_outputs(&relax_label)?
                .final_structure
                .ok_or_else(|| TwinflowError::MissingOutput {
                    label: relax_label.clone(),
                    field: "final_structure".to_string(),
                })?;
            self.settings_for(&structure, true)?;

            let request = get_calcjob_builder(
                &label,
                &description,
                "phonon",
                &ctx.computer,
                &structure,
                &self.calculator_settings,
            )?;
            let handle = ctx.submit(&request)?;
            ctx.report(
                Self::NAME,
                &format!(
                    "{} phonopy workflow has submitted, job: {}",
                    label,
                    handle.job_id.as_deref().unwrap_or("-")
                ),
            );
        }
        Ok(())
    }
}

impl WorkChain for ShearWorkChain {
    const NAME: &'static str = "ShearWorkChain";

    fn outline() -> Vec<Outline<Self>> {
        vec![
            Outline::Step("initialize", Self::initialize),
            Outline::Step("create_shear_structures", Self::create_shear_structures),
            Outline::If {
                name: "dry_run",
                predicate: Self::dry_run,
                then: vec![Outline::Step("terminate_dry_run", Self::terminate_dry_run)],
                otherwise: vec![
                    Outline::Step("run_relax", Self::run_relax),
                    Outline::Step("create_energies", Self::create_energies),
                    Outline::If {
                        name: "is_phonon",
                        predicate: Self::is_phonon,
                        then: vec![Outline::Step("run_phonon", Self::run_phonon)],
                        otherwise: vec![],
                    },
                    Outline::Step("terminate", Self::terminate),
                ],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CalcType;
    use crate::config::calculator::tests::settings;
    use crate::config::{ComputerProfile, ShearConf};
    use crate::crystal::tests::hcp_mg;
    use crate::scheduler::mock::MockScheduler;
    use crate::scheduler::staging::read_request;
    use crate::workflow::{load_outputs, run};
    use std::path::Path;

    fn input(dry_run: bool, is_phonon: bool) -> ShearInput {
        ShearInput {
            computer: "stern".to_string(),
            structure: "POSCAR".into(),
            dry_run,
            is_phonon,
            use_kpoints_interval: false,
            kpoints_conf: None,
            shear_conf: ShearConf {
                twinmode: "10-12".to_string(),
                grids: 3,
                expansion_ratios: [1.0, 1.0, 1.0],
            },
            calculator_settings: settings(),
        }
    }

    fn context(dir: &Path) -> RunContext {
        RunContext::new(dir, "stern", ComputerProfile::default(), Box::new(MockScheduler::new())).unwrap()
    }

    #[test]
    fn test_dry_run_only_creates_structures() {
        let dir = tempfile::tempdir().unwrap();
        let mut wc = ShearWorkChain::with_structure(input(true, false), hcp_mg());
        let trace = run(&mut wc, &mut context(dir.path())).unwrap();

        assert_eq!(trace, vec!["initialize", "create_shear_structures", "terminate_dry_run"]);
        let outputs = load_outputs(dir.path()).unwrap();
        assert!(outputs.contains_key("gamma"));
        assert!(outputs.contains_key("parent"));
        assert!(!outputs.contains_key("relax_results"));
        assert!(dir.path().join("structures/shear_002.POSCAR").exists());
        assert!(!dir.path().join("rlx_shear_000").exists());
    }

    #[test]
    fn test_relax_and_collect() {
        let dir = tempfile::tempdir().unwrap();
        let mut wc = ShearWorkChain::with_structure(input(false, false), hcp_mg());
        let trace = run(&mut wc, &mut context(dir.path())).unwrap();

        assert_eq!(
            trace,
            vec!["initialize", "create_shear_structures", "run_relax", "create_energies", "terminate"]
        );

        let request = read_request(&dir.path().join("rlx_shear_001")).unwrap();
        assert_eq!(request.description, "rlx_shear_001, ratio: 0.500000");
        assert_eq!(request.calc_type(), CalcType::Relax);

        let outputs = load_outputs(dir.path()).unwrap();
        let results = outputs["relax_results"].as_dict().unwrap();
        assert_eq!(results["labels"][2], "rlx_shear_002");
        let energies = results["energies"].as_array().unwrap();
        assert_eq!(energies.len(), 3);
        assert!((energies[1].as_f64().unwrap() - MockScheduler::energy(1)).abs() < 1e-8);

        let ratios = outputs["shear_ratios"].as_dict().unwrap();
        assert_eq!(ratios["shear_strain_ratios"][1], 0.5);

        let log = std::fs::read_to_string(dir.path().join("report.log")).unwrap();
        assert!(log.contains("rlx_shear_000 relax workflow has submitted, job: 1001"));
        assert!(log.contains("# ShearWorkChain has finished successfully."));
    }

    #[test]
    fn test_phonon_uses_relaxed_structures() {
        let dir = tempfile::tempdir().unwrap();
        let mut wc = ShearWorkChain::with_structure(input(false, true), hcp_mg());
        let trace = run(&mut wc, &mut context(dir.path())).unwrap();

        assert!(trace.contains(&"run_phonon"));
        let request = read_request(&dir.path().join("ph_shear_002")).unwrap();
        assert_eq!(request.calc_type(), CalcType::Phonon);
        assert_eq!(request.structure.name, "rlx_shear_002");
    }

    #[test]
    fn test_kpoints_interval_requires_conf() {
        let dir = tempfile::tempdir().unwrap();
        let mut inp = input(false, false);
        inp.use_kpoints_interval = true;
        let mut wc = ShearWorkChain::with_structure(inp.clone(), hcp_mg());
        let err = run(&mut wc, &mut context(dir.path())).unwrap_err();
        assert!(matches!(err, TwinflowError::MissingSetting { .. }));

        inp.kpoints_conf = Some(KpointsConf::new(0.15));
        let mut wc = ShearWorkChain::with_structure(inp, hcp_mg());
        run(&mut wc, &mut context(dir.path())).unwrap();
        let request = read_request(&dir.path().join("rlx_shear_000")).unwrap();
        // shear_000 为 Mg 六方原胞：|a*| = 2.2602, |c*| = 1.2060（含 2π）
        let kpoints = &request.vasp_inputs().unwrap().kpoints;
        assert_eq!(kpoints.mesh, [15, 15, 8]);
        assert_eq!(kpoints.offset, [0.0, 0.0, 0.5]);
    }
}
