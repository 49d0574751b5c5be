//! `tillsight-cli` – tillsight console
//!
//! This binary is an operator console for the terminal status monitor.  It:
//!
//! 1. Checks for `~/.tillsight/config.toml`; runs a **First-Run Wizard**
//!    when the file is absent.
//! 2. Builds the capability providers (simulated or host-bound) and runs the
//!    initial full probe.
//! 3. Drops the user into an **interactive REPL** with slash-commands
//!    (`/status`, `/health`, `/watch`, `/fail`, `/help`, …).
//! 4. Intercepts **Ctrl-C** to stop monitoring and exit cleanly.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use tillsight_hal::{SimProviders, host};
use tillsight_runtime::{SystemMonitor, init_tracing};

use crate::config::{Backend, Config};

fn main() {
    // Structured logs go to stderr via tracing; the console's own output
    // uses println!.  RUST_LOG and TILLSIGHT_LOG_FORMAT=json apply.
    let _tracing = init_tracing("tillsight-cli");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – press Enter to stop monitoring and exit …"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Runtime and monitor ───────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tillsight-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let (providers, sim) = match cfg.backend {
        Backend::Sim => {
            let (providers, handle) = SimProviders::builder().build();
            (providers, Some(handle))
        }
        Backend::Host => (host::host_providers(), None),
    };
    info!(terminal_id = %cfg.terminal_id, backend = %cfg.backend, "starting monitor");
    let monitor = SystemMonitor::new(providers, cfg.monitor_config());

    println!(
        "\n  Terminal {} ({} backend) – probing capabilities …",
        cfg.terminal_id.bold(),
        cfg.backend.to_string().yellow()
    );
    let console = repl::Console::new(runtime, monitor, sim);
    console.boot();

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&console, shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║     tillsight First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up this terminal.\n");

    let mut cfg = Config::default();

    cfg.terminal_id = prompt_line(
        &format!("  Terminal id [{}]: ", cfg.terminal_id),
        &cfg.terminal_id,
    );

    println!("  Which providers should the console use?");
    println!("    1) Simulated terminal  (default, supports fault injection)");
    println!("    2) This machine");
    cfg.backend = match prompt_line("  Enter choice [1]: ", "1").trim() {
        "2" => Backend::Host,
        _ => Backend::Sim,
    };

    let interval = prompt_line(
        &format!("  Refresh interval in ms [{}]: ", cfg.refresh_interval_ms),
        &cfg.refresh_interval_ms.to_string(),
    );
    if let Ok(ms) = interval.trim().parse::<u64>() {
        cfg.refresh_interval_ms = ms;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"  _   _ _ _     _       _     _   "#.bold().cyan());
    println!("{}", r#" | |_(_) | |___(_) __ _| |__ | |_ "#.bold().cyan());
    println!("{}", r#" | __| | | / __| |/ _` | '_ \| __|"#.bold().cyan());
    println!("{}", r#" | |_| | | \__ \ | (_| | | | | |_ "#.bold().cyan());
    println!("{}", r#"  \__|_|_|_|___/_|\__, |_| |_|\__|"#.bold().cyan());
    println!("{}", r#"                  |___/           "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "tillsight".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Point-of-sale terminal capability monitor");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
