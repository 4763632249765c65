use owo_colors::OwoColorize;
use std::path::Path;

/// Small wrapper around stdout/stderr printing to provide consistent, colored
/// user-facing messages. Colors are enabled only when output is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {}", msg);
    }
}

/// Print a plain user-facing line (no prefix). Use this for primary outputs
/// such as the lister's `path\tbranches` lines which users may script against.
pub fn print_user(msg: &str) {
    println!("{}", msg);
}

/// Join branch copies the way the lister reports them: colon-separated.
pub fn join_copies(copies: &[std::path::PathBuf]) -> String {
    copies
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// One lister output line: `absolute<TAB>copy1:copy2:...`.
///
/// Lines for paths present on more than one branch are highlighted in red on
/// a TTY; `quiet` suppresses colour entirely.
pub fn print_branch_line(abs: &Path, copies: &[std::path::PathBuf], quiet: bool) {
    let line = format!("{}\t{}", abs.display(), join_copies(copies));
    if copies.len() > 1 && !quiet && is_tty() {
        println!("{}", line.red());
    } else {
        println!("{}", line);
    }
}
