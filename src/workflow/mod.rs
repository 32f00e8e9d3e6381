//! # 工作流
//!
//! 工作流以声明式大纲 `Outline` 描述（步骤、条件分支、循环），
//! 编译为由 `Call` / `JumpUnless` / `Jump` 组成的平坦程序，再由程序计数器解释执行。
//! 每个步骤结束后等待该步骤提交的全部任务完成，下一步骤即可读取其输出。
//!
//! ## 依赖关系
//! - 被 `commands/workflow.rs` 使用
//! - 使用 `workflow/context.rs`
//! - 子模块: context, shear, twinboundary_relax, twinboundary_shear, modulation

pub mod context;
pub mod modulation;
pub mod shear;
pub mod twinboundary_relax;
pub mod twinboundary_shear;

pub use context::{load_outputs, OutputValue, RunContext};
pub use modulation::ModulationWorkChain;
pub use shear::ShearWorkChain;
pub use twinboundary_relax::TwinBoundaryRelaxWorkChain;
pub use twinboundary_shear::TwinBoundaryShearWorkChain;

use crate::error::Result;

/// 步骤函数
pub type StepFn<W> = fn(&mut W, &mut RunContext) -> Result<()>;
/// 条件函数（可以写报告）
pub type PredicateFn<W> = fn(&W, &mut RunContext) -> bool;

/// 工作流大纲
pub enum Outline<W> {
    Step(&'static str, StepFn<W>),
    If {
        name: &'static str,
        predicate: PredicateFn<W>,
        then: Vec<Outline<W>>,
        otherwise: Vec<Outline<W>>,
    },
    While {
        name: &'static str,
        predicate: PredicateFn<W>,
        body: Vec<Outline<W>>,
    },
}

/// 编译后的指令
enum Instruction<W> {
    Call(&'static str, StepFn<W>),
    /// 条件为假时跳转
    JumpUnless(PredicateFn<W>, usize),
    Jump(usize),
}

fn compile<W>(outline: &[Outline<W>], program: &mut Vec<Instruction<W>>) {
    for node in outline {
        match node {
            Outline::Step(name, f) => program.push(Instruction::Call(*name, *f)),
            Outline::If {
                predicate,
                then,
                otherwise,
                ..
            } => {
                let branch = program.len();
                program.push(Instruction::JumpUnless(*predicate, 0));
                compile(then, program);
                let skip = program.len();
                program.push(Instruction::Jump(0));
                let else_start = program.len();
                compile(otherwise, program);
                let end = program.len();
                program[branch] = Instruction::JumpUnless(*predicate, else_start);
                program[skip] = Instruction::Jump(end);
            }
            Outline::While { predicate, body, .. } => {
                let start = program.len();
                program.push(Instruction::JumpUnless(*predicate, 0));
                compile(body, program);
                program.push(Instruction::Jump(start));
                let end = program.len();
                program[start] = Instruction::JumpUnless(*predicate, end);
            }
        }
    }
}

/// 工作流
pub trait WorkChain: Sized {
    /// 报告中使用的名字
    const NAME: &'static str;

    fn outline() -> Vec<Outline<Self>>;
}

/// 执行工作流，返回依次执行过的步骤名
pub fn run<W: WorkChain>(workchain: &mut W, ctx: &mut RunContext) -> Result<Vec<&'static str>> {
    let mut program = Vec::new();
    compile(&W::outline(), &mut program);

    let mut trace = Vec::new();
    let mut execute = || -> Result<()> {
        let mut pc = 0;
        while pc < program.len() {
            match &program[pc] {
                Instruction::Call(name, step) => {
                    trace.push(*name);
                    step(workchain, ctx)?;
                    ctx.await_pending()?;
                    pc += 1;
                }
                Instruction::JumpUnless(predicate, target) => {
                    pc = if predicate(workchain, ctx) { pc + 1 } else { *target };
                }
                Instruction::Jump(target) => pc = *target,
            }
        }
        Ok(())
    };
    let result = execute();

    // 失败时也写出报告与已有输出
    let finished = ctx.finish();
    result?;
    finished?;
    Ok(trace)
}
