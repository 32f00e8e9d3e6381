//! # 工作流命令实现
//!
//! 读取输入与计算机配置，建立运行上下文并执行对应工作流。
//!
//! ## 依赖关系
//! - 使用 `cli/workflow.rs` 定义的参数
//! - 使用 `config/`, `scheduler/`, `workflow/`
//! - 使用 `utils/output.rs`

use crate::cli::workflow::WorkflowArgs;
use crate::config::{
    ComputerProfile, ModulationInput, Profile, SchedulerKind, ShearInput, TwinBoundaryRelaxInput,
    TwinBoundaryShearInput,
};
use crate::error::Result;
use crate::scheduler::create_scheduler;
use crate::utils::output;
use crate::workflow::{
    self, ModulationWorkChain, RunContext, ShearWorkChain, TwinBoundaryRelaxWorkChain,
    TwinBoundaryShearWorkChain, WorkChain,
};

/// 孪晶剪切工作流
pub fn shear(args: WorkflowArgs) -> Result<()> {
    let mut input = ShearInput::load(&args.input)?;
    input.dry_run |= args.dry_run;
    let mut ctx = context(&args, &input.computer)?;
    let mut wc = ShearWorkChain::new(input)?;
    execute(&mut wc, &mut ctx)
}

/// 孪晶界弛豫工作流
pub fn twinboundary_relax(args: WorkflowArgs) -> Result<()> {
    let input = TwinBoundaryRelaxInput::load(&args.input)?;
    warn_no_dry_run(&args, TwinBoundaryRelaxWorkChain::NAME);
    let mut ctx = context(&args, &input.computer)?;
    let mut wc = TwinBoundaryRelaxWorkChain::new(input)?;
    execute(&mut wc, &mut ctx)
}

/// 孪晶界剪切工作流
pub fn twinboundary_shear(args: WorkflowArgs) -> Result<()> {
    let input = TwinBoundaryShearInput::load(&args.input)?;
    warn_no_dry_run(&args, TwinBoundaryShearWorkChain::NAME);
    let mut ctx = context(&args, &input.computer)?;
    let mut wc = TwinBoundaryShearWorkChain::new(input);
    execute(&mut wc, &mut ctx)
}

/// 声子调制工作流
pub fn modulation(args: WorkflowArgs) -> Result<()> {
    let mut input = ModulationInput::load(&args.input)?;
    input.dry_run |= args.dry_run;
    let mut ctx = context(&args, &input.computer)?;
    let mut wc = ModulationWorkChain::new(input)?;
    execute(&mut wc, &mut ctx)
}

fn warn_no_dry_run(args: &WorkflowArgs, name: &str) {
    if args.dry_run {
        output::print_warning(&format!("{} has no dry run; --dry-run is ignored", name));
    }
}

/// 按计算机名取配置并建立运行上下文
fn context(args: &WorkflowArgs, computer: &str) -> Result<RunContext> {
    let profile = Profile::load_or_default(args.profile.as_deref())?;
    let computer_profile = match profile.computer(computer) {
        Some(p) => p.clone(),
        None => {
            output::print_warning(&format!(
                "Computer '{}' not found in profile, using defaults",
                computer
            ));
            ComputerProfile::default()
        }
    };

    let kind: SchedulerKind = args
        .scheduler
        .map(Into::into)
        .unwrap_or(computer_profile.scheduler);
    let scheduler = create_scheduler(kind, &computer_profile);
    RunContext::new(&args.workdir, computer, computer_profile, scheduler)
}

fn execute<W: WorkChain>(wc: &mut W, ctx: &mut RunContext) -> Result<()> {
    output::print_header(&format!("{} ({})", W::NAME, ctx.scheduler_name()));
    output::print_info(&format!("Run directory: {}", ctx.workdir.display()));

    let trace = workflow::run(wc, ctx)?;

    output::print_separator();
    output::print_done(&format!(
        "{} finished after {} steps, outputs in '{}'",
        W::NAME,
        trace.len(),
        ctx.workdir.join(workflow::context::OUTPUTS_FILE).display()
    ));
    Ok(())
}
