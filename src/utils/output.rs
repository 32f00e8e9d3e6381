//! # 美化输出工具
//!
//! 提供统一的终端输出样式。工作流报告行按内容着色：
//! 框线变暗，标题加粗，警告行标黄。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 与 `workflow/context.rs` 使用
//! - 使用 `colored` crate

use colored::{ColoredString, Colorize};

const RULE_WIDTH: usize = 60;

fn tagged(tag: ColoredString, msg: &str) {
    println!("{} {}", tag, msg);
}

/// 打印成功消息
pub fn print_success(msg: &str) {
    tagged("[OK]".green().bold(), msg);
}

/// 打印错误消息（stderr）
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    tagged("[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    tagged("[*]".blue().bold(), msg);
}

/// 打印跳过消息（未完成的任务）
pub fn print_skip(msg: &str) {
    tagged("[SKIP]".dimmed(), msg);
}

pub fn print_done(msg: &str) {
    tagged("[DONE]".green().bold(), msg);
}

/// 打印对齐的键值行
pub fn print_field(key: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", key).cyan(), value);
}

/// 打印工作流报告行
pub fn print_report(workchain: &str, msg: &str) {
    let styled = if msg.starts_with("# -") {
        msg.dimmed()
    } else if msg.starts_with('+') || msg.contains("(WARNING)") {
        msg.yellow()
    } else if msg.starts_with("# ") {
        msg.bold()
    } else {
        msg.normal()
    };
    tagged(format!("[{}]", workchain).magenta(), &styled.to_string());
}

/// 打印标题栏
pub fn print_header(title: &str) {
    println!();
    print_separator();
    println!("  {}", title.bold());
    print_separator();
    println!();
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}
