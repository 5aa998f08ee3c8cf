use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use compass_fusion::config::EngineConfig;
use compass_fusion::logging;
use compass_fusion::replay::ReplayScript;
use compass_fusion::SensorFusionEngine;

const USAGE: &str = "usage: compass-replay <script.toml> [--config <engine.toml>]";

struct Args {
    script: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut script = None;
    let mut config = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if script.is_none() => script = Some(PathBuf::from(other)),
            other => bail!("unexpected argument '{other}'\n{USAGE}"),
        }
    }

    let script = script.context(USAGE)?;
    Ok(Args { script, config })
}

fn main() -> Result<()> {
    logging::init();
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default(&EngineConfig::default_path()),
    };
    let script = ReplayScript::load(&args.script)?;

    let platform = Arc::new(script.platform());
    let engine = SensorFusionEngine::new(platform.clone(), config);
    let report = script.run(&engine, &platform);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in &report.events {
        serde_json::to_writer(&mut out, event)?;
        writeln!(out)?;
    }

    info!(
        events = report.events.len(),
        undelivered = report.undelivered,
        "replay finished"
    );
    Ok(())
}
