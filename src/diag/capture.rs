//! Network diagnostics capture
//!
//! Runs a fixed sequence of platform diagnostics and writes their raw output, in
//! order, into one text report. Nothing is parsed.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::io;

pub const DEFAULT_TARGET: &str = "www.microsoft.com";

/// One diagnostic command, with an optional replacement when it cannot be spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagCommand {
    pub program: String,
    pub args: Vec<String>,
    pub fallback: Option<Box<DiagCommand>>,
}

impl DiagCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            fallback: None,
        }
    }

    pub fn or_else(mut self, fallback: DiagCommand) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn windows_plan(target: &str) -> Vec<DiagCommand> {
    vec![
        DiagCommand::new("ipconfig", &["/all"]),
        DiagCommand::new("ping", &[target]),
        DiagCommand::new("tracert", &[target]),
        DiagCommand::new("nslookup", &[target]),
        DiagCommand::new("netstat", &["-an"]),
        DiagCommand::new("arp", &["-a"]),
    ]
}

pub fn unix_plan(target: &str) -> Vec<DiagCommand> {
    vec![
        DiagCommand::new("ip", &["addr"]).or_else(DiagCommand::new("ifconfig", &["-a"])),
        DiagCommand::new("ping", &["-c", "4", target]),
        DiagCommand::new("traceroute", &[target]),
        DiagCommand::new("nslookup", &[target]),
        DiagCommand::new("netstat", &["-an"]),
        DiagCommand::new("arp", &["-a"]),
    ]
}

/// Command sequence for the platform this binary was built for
pub fn platform_plan(target: &str) -> Vec<DiagCommand> {
    if cfg!(windows) {
        windows_plan(target)
    } else {
        unix_plan(target)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
}

/// Process spawning seam
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &DiagCommand) -> io::Result<CommandOutput>;
}

/// Runs commands with `tokio::process`
#[derive(Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &DiagCommand) -> io::Result<CommandOutput> {
        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .output()
            .await?;
        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code(),
        })
    }
}

fn section(out: &mut String, command_line: &str, body: &str) {
    out.push_str(&format!("==== {} ====\n", command_line));
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
}

/// Run every command in order and collect the raw output
///
/// A command that cannot be spawned (and has no working fallback) contributes a
/// section holding the spawn error; the remaining commands still run.
pub async fn capture(
    runner: &dyn CommandRunner,
    plan: &[DiagCommand],
    target: &str,
    started_at: DateTime<Local>,
) -> String {
    let mut report = format!(
        "Network diagnostics capture\nTarget: {}\nStarted: {}\n\n",
        target,
        started_at.format("%Y-%m-%d %H:%M:%S %z")
    );

    for planned in plan {
        let mut command = planned;
        loop {
            tracing::debug!("Running {}", command.command_line());
            match runner.run(command).await {
                Ok(output) => {
                    let mut body = String::from_utf8_lossy(&output.stdout).into_owned();
                    body.push_str(&String::from_utf8_lossy(&output.stderr));
                    section(&mut report, &command.command_line(), &body);
                    break;
                }
                Err(e) => match command.fallback.as_deref() {
                    Some(fallback) => {
                        tracing::debug!(
                            "{} unavailable ({}), trying {}",
                            command.program,
                            e,
                            fallback.program
                        );
                        command = fallback;
                    }
                    None => {
                        tracing::warn!("Could not run {}: {}", command.command_line(), e);
                        section(
                            &mut report,
                            &command.command_line(),
                            &format!("failed to run: {}", e),
                        );
                        break;
                    }
                },
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct FakeRunner {
        missing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &DiagCommand) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(command.command_line());
            if self.missing.contains(&command.program.as_str()) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "program not found"));
            }
            Ok(CommandOutput {
                stdout: format!("output of {}", command.program).into_bytes(),
                stderr: Vec::new(),
                exit_code: Some(0),
            })
        }
    }

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_plans_are_ordered() {
        let windows: Vec<String> = windows_plan("contoso.com")
            .iter()
            .map(DiagCommand::command_line)
            .collect();
        assert_eq!(
            windows,
            vec![
                "ipconfig /all",
                "ping contoso.com",
                "tracert contoso.com",
                "nslookup contoso.com",
                "netstat -an",
                "arp -a",
            ]
        );

        let unix = unix_plan("contoso.com");
        assert_eq!(unix[0].command_line(), "ip addr");
        assert_eq!(unix[0].fallback.as_ref().unwrap().program, "ifconfig");
        assert_eq!(unix[1].command_line(), "ping -c 4 contoso.com");
    }

    #[tokio::test]
    async fn test_spawn_failure_becomes_section_and_capture_continues() {
        let runner = FakeRunner {
            missing: vec!["traceroute"],
            calls: Mutex::new(Vec::new()),
        };
        let report = capture(&runner, &unix_plan("contoso.com"), "contoso.com", started()).await;

        assert!(report.contains("==== traceroute contoso.com ====\nfailed to run: program not found\n"));
        assert!(report.contains("==== arp -a ====\noutput of arp\n"));
        assert_eq!(runner.calls.lock().unwrap().len(), 6);

        let ping = report.find("==== ping -c 4").unwrap();
        let trace = report.find("==== traceroute").unwrap();
        let netstat = report.find("==== netstat").unwrap();
        assert!(ping < trace && trace < netstat);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_missing() {
        let runner = FakeRunner {
            missing: vec!["ip"],
            calls: Mutex::new(Vec::new()),
        };
        let report = capture(&runner, &unix_plan("contoso.com"), "contoso.com", started()).await;

        assert!(report.contains("==== ifconfig -a ====\noutput of ifconfig\n"));
        assert!(!report.contains("==== ip addr ===="));
        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(calls[0], "ip addr");
        assert_eq!(calls[1], "ifconfig -a");
    }
}
