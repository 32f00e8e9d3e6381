//! # collect 命令实现
//!
//! 并行解析运行目录中的任务目录，汇总能量、最大受力和体积。
//!
//! ## 功能
//! - 按名字模式收集含 OUTCAR 的任务目录
//! - 用 `rayon` 并行解析 OUTCAR / CONTCAR
//! - 从 request.json 的描述中读取剪切比例
//! - 生成终端表格、CSV 和能量曲线
//!
//! ## 依赖关系
//! - 使用 `cli/collect.rs` 定义的参数
//! - 使用 `batch/`, `parsers/outcar.rs`, `scheduler/staging.rs`
//! - 使用 `utils/output.rs`

use crate::batch::{BatchRunner, ProcessResult, TaskDirCollector};
use crate::cli::collect::CollectArgs;
use crate::error::{Result, TwinflowError};
use crate::parsers::outcar;
use crate::scheduler::staging::read_request;
use crate::utils::output;

use regex::Regex;
use std::path::Path;
use tabled::{Table, Tabled};

/// 一个已完成任务的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub label: String,
    pub ratio: Option<f64>,
    pub energy: f64,
    pub max_force: Option<f64>,
    pub volume: Option<f64>,
    pub num_atoms: Option<usize>,
}

/// 表格行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Task")]
    label: String,
    #[tabled(rename = "Ratio")]
    ratio: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "ΔE (eV)")]
    delta_e: String,
    #[tabled(rename = "Max force (eV/Å)")]
    max_force: String,
    #[tabled(rename = "Volume (Å³)")]
    volume: String,
}

/// 执行 collect 命令
pub fn execute(args: CollectArgs) -> Result<()> {
    output::print_header("Collecting Task Results");

    let mut collector = TaskDirCollector::new(args.run_dir.clone()).recursive(args.recursive);
    if let Some(ref pattern) = args.pattern {
        collector = collector.with_pattern(pattern)?;
    }
    let dirs = collector.collect()?;
    if dirs.is_empty() {
        return Err(TwinflowError::NoFilesFound {
            pattern: args.pattern.unwrap_or_else(|| "*/OUTCAR".to_string()),
        });
    }
    output::print_info(&format!(
        "Found {} task directories in '{}'",
        dirs.len(),
        args.run_dir.display()
    ));

    let ratio_re = ratio_regex()?;
    let result = BatchRunner::new(args.jobs).run(dirs, |dir| summarize_task(dir, &ratio_re))?;

    for path in &result.skipped {
        output::print_skip(&format!("{} (not finished)", path));
    }
    for (path, err) in &result.failures {
        output::print_warning(&format!("{}: {}", path, err));
    }
    if result.items.is_empty() {
        output::print_warning("No finished tasks found to collect.");
        return Ok(());
    }

    let summaries = result.items;
    let min_energy = summaries.iter().map(|s| s.energy).fold(f64::INFINITY, f64::min);

    let rows: Vec<SummaryRow> = summaries
        .iter()
        .map(|s| SummaryRow {
            label: s.label.clone(),
            ratio: fmt_opt(s.ratio, 4),
            energy: format!("{:.6}", s.energy),
            delta_e: format!("{:.6}", s.energy - min_energy),
            max_force: fmt_opt(s.max_force, 6),
            volume: fmt_opt(s.volume, 4),
        })
        .collect();
    println!("{}", Table::new(&rows));

    if let Some(ref path) = args.output_csv {
        save_summary_csv(&summaries, path)?;
        output::print_success(&format!("Summary saved to '{}'", path.display()));
    }
    if let Some(ref path) = args.plot {
        plot_energies(&summaries, path)?;
        output::print_success(&format!("Energy plot saved to '{}'", path.display()));
    }

    output::print_done(&format!(
        "{} finished, {} skipped, {} failed",
        summaries.len(),
        result.skipped.len(),
        result.failures.len()
    ));
    Ok(())
}

fn ratio_regex() -> Result<Regex> {
    Regex::new(r"ratio:\s*([-+0-9.eE]+)").map_err(|e| TwinflowError::Other(e.to_string()))
}

fn fmt_opt(value: Option<f64>, digits: usize) -> String {
    value
        .map(|v| format!("{:.*}", digits, v))
        .unwrap_or_else(|| "-".to_string())
}

/// 解析单个任务目录
fn summarize_task(dir: &Path, ratio_re: &Regex) -> ProcessResult<TaskSummary> {
    let label = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.display().to_string());

    let outputs = match outcar::parse_task_dir(dir, &label) {
        Ok(o) => o,
        Err(e) => return ProcessResult::Failed(dir.display().to_string(), e.to_string()),
    };
    let energy = match outputs.energy_ev {
        Some(e) if outputs.is_finished => e,
        _ => return ProcessResult::Skipped(dir.display().to_string()),
    };

    let ratio = read_request(dir).ok().and_then(|request| {
        ratio_re
            .captures(&request.description)
            .and_then(|c| c[1].parse::<f64>().ok())
    });

    ProcessResult::Success(TaskSummary {
        label,
        ratio,
        energy,
        max_force: outputs.max_force,
        volume: outputs.volume,
        num_atoms: outputs.num_atoms,
    })
}

/// 保存汇总到 CSV
fn save_summary_csv(summaries: &[TaskSummary], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["task", "ratio", "energy_eV", "max_force", "volume", "num_atoms"])?;

    for s in summaries {
        wtr.write_record(&[
            s.label.clone(),
            s.ratio.map(|r| r.to_string()).unwrap_or_default(),
            format!("{:.10}", s.energy),
            s.max_force.map(|f| format!("{:.6}", f)).unwrap_or_default(),
            s.volume.map(|v| format!("{:.6}", v)).unwrap_or_default(),
            s.num_atoms.map(|n| n.to_string()).unwrap_or_default(),
        ])?;
    }

    wtr.flush().map_err(|e| TwinflowError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

/// 横轴：全部任务都有剪切比例时用比例，否则用序号
fn plot_points(summaries: &[TaskSummary]) -> (Vec<(f64, f64)>, &'static str) {
    if summaries.iter().all(|s| s.ratio.is_some()) {
        let mut points: Vec<(f64, f64)> = summaries
            .iter()
            .filter_map(|s| s.ratio.map(|r| (r, s.energy)))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        (points, "Shear strain ratio")
    } else {
        let points = summaries
            .iter()
            .enumerate()
            .map(|(i, s)| (i as f64, s.energy))
            .collect();
        (points, "Task index")
    }
}

/// 绘制能量曲线
fn plot_energies(summaries: &[TaskSummary], output_path: &Path) -> Result<()> {
    use plotters::prelude::*;

    let (points, x_desc) = plot_points(summaries);
    if points.is_empty() {
        return Err(TwinflowError::Other("No data to plot".to_string()));
    }

    let x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let x_margin = ((x_max - x_min) * 0.05).max(0.05);
    let y_margin = ((y_max - y_min) * 0.1).max(1e-3);

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| TwinflowError::Other(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Energy", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(
            (x_min - x_margin)..(x_max + x_margin),
            (y_min - y_margin)..(y_max + y_margin),
        )
        .map_err(|e| TwinflowError::Other(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Energy (eV)")
        .draw()
        .map_err(|e| TwinflowError::Other(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))
        .map_err(|e| TwinflowError::Other(e.to_string()))?;
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 5, BLUE.filled())))
        .map_err(|e| TwinflowError::Other(e.to_string()))?;

    root.present()
        .map_err(|e| TwinflowError::Other(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::calculator::tests::settings;
    use crate::config::{ComputerProfile, ShearConf, ShearInput};
    use crate::crystal::tests::hcp_mg;
    use crate::scheduler::mock::{MockScheduler, MOCK_FORCE};
    use crate::workflow::{run, RunContext, ShearWorkChain};

    fn shear_run(dir: &Path) {
        let input = ShearInput {
            computer: "stern".to_string(),
            structure: "POSCAR".into(),
            dry_run: false,
            is_phonon: false,
            use_kpoints_interval: false,
            kpoints_conf: None,
            shear_conf: ShearConf {
                twinmode: "10-12".to_string(),
                grids: 3,
                expansion_ratios: [1.0, 1.0, 1.0],
            },
            calculator_settings: settings(),
        };
        let mut ctx = RunContext::new(dir, "stern", ComputerProfile::default(), Box::new(MockScheduler::new())).unwrap();
        let mut wc = ShearWorkChain::with_structure(input, hcp_mg());
        run(&mut wc, &mut ctx).unwrap();
    }

    #[test]
    fn test_summarize_shear_run() {
        let dir = tempfile::tempdir().unwrap();
        shear_run(dir.path());

        let dirs = TaskDirCollector::new(dir.path().to_path_buf())
            .with_pattern("rlx_*")
            .unwrap()
            .collect()
            .unwrap();
        let re = ratio_regex().unwrap();
        let result = BatchRunner::new(2).run(dirs, |d| summarize_task(d, &re)).unwrap();

        assert_eq!(result.items.len(), 3);
        let second = &result.items[1];
        assert_eq!(second.label, "rlx_shear_001");
        assert_eq!(second.ratio, Some(0.5));
        assert!((second.energy - MockScheduler::energy(1)).abs() < 1e-8);
        assert!((second.max_force.unwrap() - MOCK_FORCE).abs() < 1e-6);

        let (points, x_desc) = plot_points(&result.items);
        assert_eq!(x_desc, "Shear strain ratio");
        assert_eq!(points[2].0, 1.0);

        let csv_path = dir.path().join("summary.csv");
        save_summary_csv(&result.items, &csv_path).unwrap();
        let mut rdr = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(rdr.records().count(), 3);
    }

    #[test]
    fn test_unfinished_task_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("rlx_shear_000");
        std::fs::create_dir_all(&task).unwrap();
        std::fs::write(task.join("OUTCAR"), "   NIONS =       2\n").unwrap();

        let re = ratio_regex().unwrap();
        assert!(matches!(summarize_task(&task, &re), ProcessResult::Skipped(_)));
        assert!(matches!(
            summarize_task(&dir.path().join("missing"), &re),
            ProcessResult::Failed(..)
        ));
    }
}
