//! intake-runner: headless driver for the complaint intake engine.
//!
//! Usage:
//!   intake-runner --db intake.db --ipc-mode
//!   intake-runner --db intake.db --config intake.json auto-close --dry-run
//!   intake-runner --db intake.db summary --station NDLS

use anyhow::Result;
use chrono::Utc;
use railclean_core::{
    clock::SystemClock,
    command::IntakeCommand,
    config::IntakeConfig,
    engine::IntakeEngine,
    notify::LogNotifier,
    rng::CodeRng,
    store::IntakeStore,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Serialize)]
struct IpcReply {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let station = flag_value(&args, "--station");

    let config = match flag_value(&args, "--config") {
        Some(path) => IntakeConfig::load(path)?,
        None => IntakeConfig::default(),
    };

    let store = if db == ":memory:" {
        IntakeStore::in_memory()?
    } else {
        IntakeStore::open(db)?
    };
    store.migrate()?;

    let mut engine = IntakeEngine::new(
        store,
        config,
        Box::new(SystemClock),
        Box::new(LogNotifier),
        CodeRng::from_entropy(),
    )?;

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else if args.iter().any(|a| a == "auto-close") {
        run_auto_close(&engine, dry_run)?;
    } else if args.iter().any(|a| a == "summary") {
        print_summary(&engine, station)?;
    } else {
        eprintln!("nothing to do: pass --ipc-mode, auto-close [--dry-run] or summary");
        std::process::exit(2);
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut IntakeEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }
        let line: serde_json::Value = match serde_json::from_str(&buffer) {
            Ok(v) => v,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "ok": false, "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if line["cmd"] == "quit" {
            break;
        }

        let reply = match serde_json::from_value::<IntakeCommand>(line) {
            Ok(cmd) => match cmd.apply(engine) {
                Ok(result) => IpcReply {
                    ok: true,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    log::debug!("command failed: {e}");
                    IpcReply {
                        ok: false,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            },
            Err(e) => IpcReply {
                ok: false,
                result: None,
                error: Some(e.to_string()),
            },
        };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn run_auto_close(engine: &IntakeEngine, dry_run: bool) -> Result<()> {
    let report = engine.auto_close_stale(dry_run)?;
    let verb = if dry_run { "would close" } else { "closed" };
    println!(
        "auto-close: {verb} {} complaint(s) created before {}",
        report.closed.len(),
        report.cutoff.format("%Y-%m-%d %H:%M UTC")
    );
    for c in &report.closed {
        let complaint = engine.store().get_complaint(c.complaint_id)?;
        let reference = complaint.map(|c| c.reference).unwrap_or_default();
        println!("  {reference:<28} {}", c.frozen_status);
    }
    Ok(())
}

fn print_summary(engine: &IntakeEngine, station: Option<&str>) -> Result<()> {
    let queue = engine.triage_queue(station)?;
    let offset = engine
        .config()
        .reporting_offset()
        .ok_or_else(|| anyhow::anyhow!("reporting offset out of range"))?;

    let open = queue.iter().filter(|c| !c.closed).count();
    let children = queue.iter().filter(|c| !c.is_root()).count();

    println!("=== TRIAGE SUMMARY ===");
    println!("  generated:   {}", Utc::now().with_timezone(&offset).format("%Y-%m-%d %H:%M"));
    println!("  station:     {}", station.unwrap_or("(all)"));
    println!("  complaints:  {}", engine.store().complaint_count()?);
    println!("  verified:    {}", queue.len());
    println!("  open:        {open}");
    println!("  escalations: {children}");
    println!();
    for c in queue.iter().take(20) {
        let state = if c.closed { "closed" } else { c.status.as_str() };
        println!(
            "  {}  {:<28} p{:<3} {:<12} {}",
            c.created_at.with_timezone(&offset).format("%d %b %H:%M"),
            c.reference,
            c.platform_number,
            state,
            c.assigned_worker.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
