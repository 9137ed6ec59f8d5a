//! Standalone viewer binary.
//!
//! Usage:
//!   cargo run -p engine_viewer -- [--config viewer.json] [--root .] [--cache-dir cache]
//!                                 [--tick-hz 30] [--reclaim same_tick|next_tick]
//!
//! Console commands:
//!   load <name>     - Hold an asset (.btx, .bmt, .bmh)
//!   release <name>  - Drop a held asset
//!   find <name>     - Inspect a cached asset without holding it
//!   status          - Show viewer status
//!   resident        - List cached assets
//!   stats           - Cache statistics as JSON
//!   quit            - Shut down and print the leak report

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use engine_core::config::{EngineConfig, ReclaimPolicy};
use engine_viewer::viewer::{AssetViewer, ViewerState};
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_reclaim(value: &str) -> anyhow::Result<ReclaimPolicy> {
    match value {
        "same_tick" => Ok(ReclaimPolicy::SameTick),
        "next_tick" => Ok(ReclaimPolicy::NextTick),
        other => anyhow::bail!("unknown reclaim policy {other:?}"),
    }
}

fn parse_args() -> anyhow::Result<EngineConfig> {
    let args: Vec<String> = env::args().collect();

    // A config file, if given, is the base the other flags override.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            EngineConfig::from_json_str(&text).with_context(|| format!("parse {path}"))?
        }
        _ => EngineConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--root" if i + 1 < args.len() => {
                cfg.root_dir = args[i + 1].clone();
                i += 2;
            }
            "--cache-dir" if i + 1 < args.len() => {
                cfg.cache_dir = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(30);
                i += 2;
            }
            "--reclaim" if i + 1 < args.len() => {
                cfg.reclaim = parse_reclaim(&args[i + 1])?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(
        root = %cfg.root_dir,
        cache_dir = %cfg.cache_dir,
        tick_hz = cfg.tick_hz,
        reclaim = ?cfg.reclaim,
        "Starting viewer"
    );

    let mut viewer = AssetViewer::new(cfg.clone()).context("create viewer")?;

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    viewer.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => {
                    let _ = console_tx.blocking_send("quit".to_string());
                    break;
                }
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Viewer ready. Type 'load <name>' to hold an asset, 'status' for info, 'quit' to exit.");
    println!();

    // Main viewer loop.
    let tick_interval = std::time::Duration::from_secs_f32(1.0 / cfg.tick_hz.max(1) as f32);
    let mut next_tick = tokio::time::Instant::now();

    while viewer.state() == ViewerState::Running {
        for line in viewer.step()? {
            println!("{line}");
        }

        // Wait for next tick.
        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }

    let report = viewer.shutdown();
    if report.is_clean() {
        println!("No leaked resources.");
    } else {
        warn!(count = report.leaked.len(), "Viewer exited with leaked resources");
        for leak in &report.leaked {
            println!(
                "leaked {} {} ({:?}, {} refs)",
                leak.kind,
                leak.label(),
                leak.state,
                leak.ref_count
            );
        }
    }
    Ok(())
}
