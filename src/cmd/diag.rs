use crate::cmd::progress::{create_spinner, finish_spinner_success};
use crate::cmd::write_output;
use crate::diag::capture::{capture as run_capture, platform_plan, ProcessRunner, DEFAULT_TARGET};
use crate::diag::netlog::{analyze_file, render_report, DEFAULT_TOP_N};
use crate::error::Result;
use chrono::Local;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Host used for ping, traceroute and nslookup
    #[arg(long, default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Output file (defaults to network-diagnostics-<timestamp>.txt)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Network log file to analyze
    pub logfile: PathBuf,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Entries to show per section
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N)]
    pub top: usize,
}

pub async fn capture(args: CaptureArgs) -> Result<()> {
    let started = Local::now();
    let plan = platform_plan(&args.target);
    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "network-diagnostics-{}.txt",
            started.format("%Y%m%d-%H%M%S")
        ))
    });

    println!(
        "{} network diagnostics ({} commands, target {})",
        "Capturing".cyan().bold(),
        plan.len(),
        args.target
    );

    let spinner = create_spinner("Running diagnostics...");
    let report = run_capture(&ProcessRunner, &plan, &args.target, started).await;
    finish_spinner_success(&spinner, "Diagnostics complete");

    write_output(Some(output.as_path()), &report)
}

pub async fn parse(args: ParseArgs) -> Result<()> {
    let analysis = analyze_file(&args.logfile).await?;
    eprintln!(
        "{} Loaded {} lines from {}",
        "→".cyan(),
        analysis.total_lines,
        args.logfile.display()
    );

    let report = render_report(&analysis, args.top, Local::now());
    write_output(args.output.as_deref(), &report)
}
