//! # 声子调制工作流
//!
//! 按声子模式生成调制超胞，对每个超胞做一次固定晶胞的 VASP 计算并收集能量。
//!
//! ## 依赖关系
//! - 被 `commands/workflow.rs` 使用
//! - 使用 `crystal/modulation.rs`, `builder/restart.rs`, `collector.rs`

use super::{Outline, OutputValue, RunContext, WorkChain};
use crate::builder::get_calcjob_builder_for_modulation;
use crate::collector::collect_scalar;
use crate::config::ModulationInput;
use crate::crystal::get_modulation_structures;
use crate::error::{Result, TwinflowError};
use crate::models::{Crystal, ScalarField};
use crate::parsers::poscar;
use serde_json::json;

pub struct ModulationWorkChain {
    input: ModulationInput,
    unitcell: Crystal,
    modulations: Vec<Crystal>,
}

impl ModulationWorkChain {
    pub fn new(input: ModulationInput) -> Result<Self> {
        let unitcell = poscar::parse_poscar_file(&input.structure)?;
        Ok(Self::with_structure(input, unitcell))
    }

    pub fn with_structure(input: ModulationInput, unitcell: Crystal) -> Self {
        ModulationWorkChain {
            input,
            unitcell,
            modulations: Vec::new(),
        }
    }

    fn vasp_labels(&self) -> Vec<String> {
        self.modulations
            .iter()
            .map(|m| format!("vasp_{}", m.name))
            .collect()
    }

    fn dry_run(&self, _: &mut RunContext) -> bool {
        self.input.dry_run
    }

    fn terminate_dry_run(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# dry run has activated");
        ctx.report(Self::NAME, "terminate ModulationWorkChain");
        Ok(())
    }

    fn terminate(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# ModulationWorkChain has finished successfully");
        ctx.report(Self::NAME, "all jobs have finished");
        ctx.report(Self::NAME, "terminate ModulationWorkChain");
        Ok(())
    }

    fn create_modulation_structures(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# create modulation structures");
        let modulations = get_modulation_structures(&self.unitcell, &self.input.modulation_conf)?;
        for s in &modulations.structures {
            ctx.write_structure(s)?;
        }
        ctx.out("modulation_summary", OutputValue::Dict(modulations.summary()));
        self.modulations = modulations.structures;
        Ok(())
    }

    fn run_vasp(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# run vasp calculations");
        let vasp_settings = self
            .input
            .calculator_settings
            .vasp
            .clone()
            .ok_or_else(|| TwinflowError::MissingSetting {
                section: "calculator_settings".to_string(),
                key: "vasp".to_string(),
            })?;

        for (structure, label) in self.modulations.iter().zip(self.vasp_labels()) {
            let request = get_calcjob_builder_for_modulation(
                &label,
                &label,
                &ctx.computer,
                structure,
                &self.input.modulation_conf,
                &vasp_settings,
            )?;
            let handle = ctx.submit(&request)?;
            ctx.report(
                Self::NAME,
                &format!(
                    "{} vasp calcfunction has submitted, job: {}",
                    label,
                    handle.job_id.as_deref().unwrap_or("-")
                ),
            );
        }
        Ok(())
    }

    fn create_energies(&mut self, ctx: &mut RunContext) -> Result<()> {
        ctx.report_framed(Self::NAME, "# collect results");
        let labels = self.vasp_labels();
        let outputs = ctx.collect_outputs(&labels)?;
        let energies = collect_scalar(&outputs, &labels, ScalarField::Energy)?;
        ctx.out(
            "vasp_results",
            OutputValue::Dict(json!({ "labels": labels, "energies": energies })),
        );
        Ok(())
    }
}

impl WorkChain for ModulationWorkChain {
    const NAME: &'static str = "ModulationWorkChain";

    fn outline() -> Vec<Outline<Self>> {
        vec![
            Outline::Step("create_modulation_structures", Self::create_modulation_structures),
            Outline::If {
                name: "dry_run",
                predicate: Self::dry_run,
                then: vec![Outline::Step("terminate_dry_run", Self::terminate_dry_run)],
                otherwise: vec![
                    Outline::Step("run_vasp", Self::run_vasp),
                    Outline::Step("create_energies", Self::create_energies),
                    Outline::Step("terminate", Self::terminate),
                ],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::calculator::tests::settings;
    use crate::config::{ComputerProfile, IncarValue, ModulationConf, PhononMode};
    use crate::crystal::tests::hcp_mg;
    use crate::scheduler::mock::MockScheduler;
    use crate::scheduler::staging::read_request;
    use crate::workflow::{load_outputs, run};
    use std::collections::BTreeMap;
    use std::path::Path;

    fn input(dry_run: bool) -> ModulationInput {
        let mut calculator_settings = settings();
        calculator_settings.vasp = calculator_settings.relax.clone();

        let mode = |band_index, frequency| PhononMode {
            qpoint: [0.5, 0.0, 0.0],
            band_index,
            amplitude: 0.1,
            phase: 0.0,
            frequency,
            eigenvector: vec![[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]],
        };

        ModulationInput {
            computer: "stern".to_string(),
            structure: "POSCAR".into(),
            dry_run,
            modulation_conf: ModulationConf {
                dimension: [2, 1, 1],
                phonon_modes: vec![mode(4, Some(2.5)), mode(5, None)],
                incar_update_settings: BTreeMap::from([("nelm".to_string(), IncarValue::Int(120))]),
            },
            calculator_settings,
        }
    }

    fn context(dir: &Path) -> RunContext {
        RunContext::new(dir, "stern", ComputerProfile::default(), Box::new(MockScheduler::new())).unwrap()
    }

    #[test]
    fn test_modulation_runs_vasp() {
        let dir = tempfile::tempdir().unwrap();
        let mut wc = ModulationWorkChain::with_structure(input(false), hcp_mg());
        let trace = run(&mut wc, &mut context(dir.path())).unwrap();
        assert_eq!(
            trace,
            vec!["create_modulation_structures", "run_vasp", "create_energies", "terminate"]
        );

        let request = read_request(&dir.path().join("vasp_modulation_002")).unwrap();
        assert_eq!(request.description, "vasp_modulation_002");
        let incar = &request.vasp_inputs().unwrap().incar;
        assert_eq!(incar["isif"], IncarValue::Int(2));
        assert_eq!(incar["nelm"], IncarValue::Int(120));
        assert_eq!(request.structure.atoms.len(), 4);

        let outputs = load_outputs(dir.path()).unwrap();
        let summary = outputs["modulation_summary"].as_dict().unwrap();
        assert_eq!(summary["frequencies"][0], 2.5);
        assert!(summary["frequencies"][1].is_null());
        let results = outputs["vasp_results"].as_dict().unwrap();
        assert_eq!(results["labels"][0], "vasp_modulation_001");
        assert!((results["energies"][1].as_f64().unwrap() - MockScheduler::energy(1)).abs() < 1e-8);
    }

    #[test]
    fn test_dry_run_and_missing_vasp_section() {
        let dir = tempfile::tempdir().unwrap();
        let mut wc = ModulationWorkChain::with_structure(input(true), hcp_mg());
        let trace = run(&mut wc, &mut context(dir.path())).unwrap();
        assert_eq!(trace, vec!["create_modulation_structures", "terminate_dry_run"]);
        assert!(dir.path().join("structures/modulation_001.POSCAR").exists());

        let mut inp = input(false);
        inp.calculator_settings.vasp = None;
        let mut wc = ModulationWorkChain::with_structure(inp, hcp_mg());
        assert!(matches!(
            run(&mut wc, &mut context(dir.path())),
            Err(TwinflowError::MissingSetting { .. })
        ));
    }
}
