//! REPL – Read-Eval-Print Loop for the tillsight console.
//!
//! Supported slash-commands:
//!   /status             – status table for every capability
//!   /devices            – Bluetooth / camera / location readiness
//!   /health             – health verdict with warnings and errors
//!   /export             – current snapshot as JSON
//!   /refresh            – re-probe network and proximity capabilities
//!   /watch  /unwatch    – start / stop background monitoring
//!   /battery <level>    – set the simulated battery level (0.42 or 42%)
//!   /lowpower on|off    – toggle simulated low power mode
//!   /offline  /online   – drop / restore the simulated network
//!   /fail <capability>  – make a simulated provider fail
//!   /heal <capability>  – clear an injected fault
//!   /help               – show this list
//!   /quit | /exit       – gracefully exit the console

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tillsight_hal::{DeviceCapabilities, SimHandle};
use tillsight_middleware::{EventBus, Listener, Subscription, Topic};
use tillsight_runtime::SystemMonitor;
use tillsight_types::{
    Alert, AlertSeverity, Capability, EventPayload, ProbeError, UnifiedStatus,
};
use tokio::runtime::Runtime;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    Devices,
    Health,
    Export,
    Refresh,
    Watch,
    Unwatch,
    Battery(f32),
    LowPower(bool),
    Offline,
    Online,
    Fail(Capability),
    Heal(Capability),
    Help,
    Quit,
}

/// Parse one input line.  Errors are user-facing messages.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default();
    let arg = words.next();

    let command = match (head, arg) {
        ("/status", None) => Command::Status,
        ("/devices", None) => Command::Devices,
        ("/health", None) => Command::Health,
        ("/export", None) => Command::Export,
        ("/refresh", None) => Command::Refresh,
        ("/watch", None) => Command::Watch,
        ("/unwatch", None) => Command::Unwatch,
        ("/battery", Some(level)) => Command::Battery(parse_level(level)?),
        ("/battery", None) => return Err("usage: /battery <level>, e.g. /battery 0.12".into()),
        ("/lowpower", Some("on")) => Command::LowPower(true),
        ("/lowpower", Some("off")) => Command::LowPower(false),
        ("/lowpower", _) => return Err("usage: /lowpower on|off".into()),
        ("/offline", None) => Command::Offline,
        ("/online", None) => Command::Online,
        ("/fail", Some(cap)) => Command::Fail(cap.parse().map_err(|e| format!("{e}"))?),
        ("/heal", Some(cap)) => Command::Heal(cap.parse().map_err(|e| format!("{e}"))?),
        ("/fail" | "/heal", None) => return Err(format!("usage: {head} <capability>")),
        ("/help", None) => Command::Help,
        ("/quit" | "/exit", None) => Command::Quit,
        _ => return Err(format!("Unknown command '{}'", line.trim())),
    };
    if words.next().is_some() {
        return Err(format!("too many arguments for {head}"));
    }
    Ok(command)
}

/// `0.42`, `42` and `42%` all mean 42 %.
fn parse_level(raw: &str) -> Result<f32, String> {
    let (digits, percent) = match raw.strip_suffix('%') {
        Some(digits) => (digits, true),
        None => (raw, false),
    };
    let value: f32 = digits
        .parse()
        .map_err(|_| format!("'{raw}' is not a battery level"))?;
    let level = if percent || value > 1.0 { value / 100.0 } else { value };
    if (0.0..=1.0).contains(&level) {
        Ok(level)
    } else {
        Err(format!("'{raw}' is outside 0–100%"))
    }
}

/// Console state: the monitor under inspection plus, for the simulated
/// backend, the handle that drives the simulated hardware.
pub struct Console {
    runtime: Runtime,
    monitor: SystemMonitor,
    sim: Option<SimHandle>,
    bus: EventBus,
    _alerts: Subscription<Alert>,
}

impl Console {
    pub fn new(runtime: Runtime, monitor: SystemMonitor, sim: Option<SimHandle>) -> Self {
        let bus = EventBus::default();
        let alerts = monitor.bridge_to(&bus);
        let console = Self {
            runtime,
            monitor,
            sim,
            bus,
            _alerts: alerts,
        };
        console.spawn_alert_printer();
        console
    }

    /// Run the initial full probe and print a one-line summary.
    pub fn boot(&self) {
        let status = self.runtime.block_on(self.monitor.initialize());
        println!(
            "  {} {}/{} capabilities available",
            "✓".green().bold(),
            status.available_count(),
            Capability::ALL.len()
        );
        for err in &status.initialization_errors {
            println!("    {} {}", "!".yellow(), err.dimmed());
        }
        self.monitor.log_status();
    }

    fn spawn_alert_printer(&self) {
        let mut alerts = self.bus.subscribe_to(Topic::Alerts);
        self.runtime.spawn(async move {
            while let Some(event) = alerts.recv().await {
                if let EventPayload::Alert(alert) = event.payload {
                    print_alert(&alert);
                }
            }
        });
    }

    /// Execute one command.  Returns `false` when the console should exit.
    pub fn execute(&self, command: Command) -> bool {
        match command {
            Command::Status => self.cmd_status(),
            Command::Devices => self.cmd_devices(),
            Command::Health => self.cmd_health(),
            Command::Export => println!("{}", self.monitor.export_status()),
            Command::Refresh => self.cmd_refresh(),
            Command::Watch => self.cmd_watch(),
            Command::Unwatch => self.cmd_unwatch(),
            Command::Battery(level) => self.with_sim(|sim| {
                sim.set_battery_level(level);
                println!("  Battery set to {:.0}%", level * 100.0);
            }),
            Command::LowPower(enabled) => self.with_sim(|sim| {
                sim.set_low_power_mode(enabled);
                println!("  Low power mode {}", if enabled { "on" } else { "off" });
            }),
            Command::Offline => self.with_sim(|sim| {
                sim.set_connected(false);
                println!("  Network dropped; run /refresh to observe it");
            }),
            Command::Online => self.with_sim(|sim| {
                sim.set_connected(true);
                println!("  Network restored; run /refresh to observe it");
            }),
            Command::Fail(capability) => self.with_sim(|sim| {
                sim.fail(
                    capability,
                    ProbeError::Unavailable {
                        capability,
                        reason: "fault injected from console".to_string(),
                    },
                );
                println!("  {} probes now fail", capability.label());
            }),
            Command::Heal(capability) => self.with_sim(|sim| {
                sim.heal(capability);
                println!("  {} probes restored", capability.label());
            }),
            Command::Help => cmd_help(),
            Command::Quit => {
                self.monitor.stop_monitoring();
                println!("{}", "Goodbye.".green());
                return false;
            }
        }
        true
    }

    fn with_sim(&self, f: impl FnOnce(&SimHandle)) {
        match &self.sim {
            Some(sim) => f(sim),
            None => println!(
                "  {} this command needs the simulated backend (backend = \"sim\")",
                "Unavailable:".yellow()
            ),
        }
    }

    fn cmd_status(&self) {
        println!("{}", "Terminal Status".bold().underline());
        for line in self.monitor.get_status_table() {
            println!("  {line}");
        }
    }

    fn cmd_devices(&self) {
        let facade = self.monitor.device_capabilities();
        let status = self.runtime.block_on(facade.status());
        println!("{}", "Proximity Capabilities".bold().underline());
        println!("  {}", status.summary());
        for line in DeviceCapabilities::format_for_logging(&status) {
            println!("    {}", line.dimmed());
        }
    }

    fn cmd_health(&self) {
        let report = self.monitor.perform_health_check();
        let verdict = if report.healthy {
            "HEALTHY".green().bold()
        } else {
            "UNHEALTHY".red().bold()
        };
        println!("  Terminal is {verdict}");
        for warning in &report.warnings {
            println!("    {} {}", "warning:".yellow(), warning);
        }
        for error in &report.errors {
            println!("    {} {}", "error:".red(), error);
        }
    }

    fn cmd_refresh(&self) {
        let before = self.monitor.get_current_status();
        let after = self.runtime.block_on(self.monitor.refresh_status());
        match before {
            Some(before) => {
                let changed = after.changed_capabilities(&before);
                if changed.is_empty() {
                    println!("  Refreshed; no availability changes");
                }
                for cap in changed {
                    println!("  {} {}", cap.label().bold(), availability(after.is_available(cap)));
                }
            }
            None => println!("  Not initialized yet"),
        }
    }

    fn cmd_watch(&self) {
        if self.monitor.is_monitoring() {
            println!("  Already watching");
            return;
        }
        let _guard = self.runtime.enter();
        let listener: Listener<UnifiedStatus> = Arc::new(print_watch_line);
        self.monitor.start_monitoring(Some(listener), None);
        let interval = self.monitor.monitoring_interval().unwrap_or_default();
        println!("  Watching every {:.1}s; /unwatch to stop", interval.as_secs_f64());
    }

    fn cmd_unwatch(&self) {
        if !self.monitor.is_monitoring() {
            println!("  Not watching");
            return;
        }
        self.monitor.stop_monitoring();
        println!("  Stopped watching");
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(console: &Console, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            console.execute(Command::Quit);
            break;
        }

        print!("{} ", "tillsight>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(command) => {
                if !console.execute(command) {
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
            Err(msg) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                msg,
                "/help".bold()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "tillsight Commands".bold().underline());
    let rows = [
        ("/status", "status table for every capability"),
        ("/devices", "Bluetooth / camera / location readiness"),
        ("/health", "health verdict"),
        ("/export", "current snapshot as JSON"),
        ("/refresh", "re-probe network and proximity capabilities"),
        ("/watch  /unwatch", "start / stop background monitoring"),
        ("/battery <level>", "set simulated battery level"),
        ("/lowpower on|off", "toggle simulated low power mode"),
        ("/offline  /online", "drop / restore simulated network"),
        ("/fail <capability>", "make a simulated provider fail"),
        ("/heal <capability>", "clear an injected fault"),
        ("/quit  /exit", "exit the console"),
    ];
    for (cmd, what) in rows {
        println!("  {:<20} – {}", cmd.bold().cyan(), what);
    }
    println!(
        "  capabilities: {}",
        Capability::ALL.map(|c| c.name()).join(", ").dimmed()
    );
    println!();
}

fn availability(available: bool) -> colored::ColoredString {
    if available {
        "available".green()
    } else {
        "unavailable".red()
    }
}

fn print_watch_line(status: &UnifiedStatus) {
    println!(
        "\n  {} {} {}/{} available, network {}",
        "[watch]".dimmed(),
        status.last_updated.format("%H:%M:%S"),
        status.available_count(),
        Capability::ALL.len(),
        if status.network.is_connected {
            "online".green()
        } else {
            "offline".red()
        }
    );
}

fn print_alert(alert: &Alert) {
    let tag = match alert.kind.severity() {
        AlertSeverity::Critical => "[CRITICAL]".red().bold(),
        AlertSeverity::Warning => "[warning]".yellow().bold(),
    };
    println!("\n  {} {}", tag, alert.message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_command("/status"), Ok(Command::Status));
        assert_eq!(parse_command("  /health \n"), Ok(Command::Health));
        assert_eq!(parse_command("/exit"), Ok(Command::Quit));
        assert_eq!(parse_command("/lowpower on"), Ok(Command::LowPower(true)));
    }

    #[test]
    fn parses_capability_arguments() {
        assert_eq!(parse_command("/fail print"), Ok(Command::Fail(Capability::Print)));
        assert_eq!(
            parse_command("/heal device_info"),
            Ok(Command::Heal(Capability::DeviceInfo))
        );
        assert!(parse_command("/fail toaster").is_err());
        assert!(parse_command("/fail").is_err());
    }

    #[test]
    fn battery_level_accepts_fractions_and_percentages() {
        assert_eq!(parse_command("/battery 0.12"), Ok(Command::Battery(0.12)));
        assert_eq!(parse_command("/battery 12%"), Ok(Command::Battery(0.12)));
        assert_eq!(parse_command("/battery 50"), Ok(Command::Battery(0.5)));
        assert!(parse_command("/battery 150%").is_err());
        assert!(parse_command("/battery low").is_err());
    }

    #[test]
    fn rejects_unknown_and_extra_arguments() {
        assert!(parse_command("/reboot").is_err());
        assert!(parse_command("/status now").is_err());
        assert!(parse_command("/lowpower maybe").is_err());
    }
}
