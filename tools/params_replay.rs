// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Params assembly replay.
//!
//! Runs one producer thread per condition against an ISP params assembler,
//! drains it from the main thread the way an ISP-facing consumer would, and
//! prints the final assembler stats as JSON.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use camparams::config::{load_config, validate_config, AssemblerSection, CamParamsConfig};
use camparams::observability::{debug_flags_help, init_console_logging, parse_debug_flags};
use camparams::{
    assembler_from_section, log_options, register_conditions, FrameId, ParamsAssembler,
    ParamsSink, PartialResult, ReadyParams,
};

type Cond = u8;

struct Args {
    frames: u32,
    conditions: u8,
    drop_every: u32,
    config: Option<PathBuf>,
    cam_id: Option<i32>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: params_replay [--frames <n>] [--conditions <n>] [--drop-every <k>]\n\
         \x20                    [--config <path>] [--cam-id <id>] [--debug-<crate>]\n\n\
         Defaults:\n\
         - frames: 30\n\
         - conditions: 3 (ignored when the config lists isp.conditions)\n\
         - drop-every: 0 (the last condition skips every k-th frame when k > 0)\n\
         - config: built-in defaults\n\n\
         {}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> T {
    let value = value.unwrap_or_else(|| usage_and_exit());
    value.parse().unwrap_or_else(|_| {
        eprintln!("Invalid value for {flag}: {value}");
        usage_and_exit();
    })
}

fn parse_args() -> Args {
    let mut parsed = Args {
        frames: 30,
        conditions: 3,
        drop_every: 0,
        config: None,
        cam_id: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => parsed.frames = parse_value(&arg, args.next()),
            "--conditions" => parsed.conditions = parse_value(&arg, args.next()),
            "--drop-every" => parsed.drop_every = parse_value(&arg, args.next()),
            "--cam-id" => parsed.cam_id = Some(parse_value(&arg, args.next())),
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                parsed.config = Some(PathBuf::from(v));
            }
            "-h" | "--help" => usage_and_exit(),
            other if other.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }

    parsed
}

/// Consumer side: checks frame order and counts what reached the "hardware"
#[derive(Default)]
struct ReplaySink {
    last_frame: Option<FrameId>,
    applied: usize,
    results: usize,
}

impl ParamsSink<Cond, [u8]> for ReplaySink {
    type Error = anyhow::Error;

    fn apply(&mut self, params: ReadyParams<Cond, [u8]>) -> Result<()> {
        if let Some(last) = self.last_frame {
            if params.frame_id <= last {
                bail!("frame {} applied after frame {}", params.frame_id, last);
            }
        }
        self.last_frame = Some(params.frame_id);
        self.applied += 1;
        self.results += params.len();
        Ok(())
    }
}

fn payload(frame_id: FrameId, condition: Cond) -> Arc<[u8]> {
    let mut bytes = frame_id.to_le_bytes().to_vec();
    bytes.push(condition);
    Arc::from(bytes)
}

/// Conditions listed in the config, resolved by position, or `synthetic`
/// numbered ids when the config lists none
fn setup_conditions(
    assembler: &ParamsAssembler<Cond, [u8]>,
    section: &AssemblerSection,
    synthetic: u8,
) -> Result<Vec<Cond>> {
    if section.conditions.is_empty() {
        let conditions: Vec<Cond> = (0..synthetic).collect();
        for &condition in &conditions {
            assembler.add_condition(condition)?;
        }
        return Ok(conditions);
    }

    let count = register_conditions(assembler, section, |name| {
        section
            .conditions
            .iter()
            .position(|n| n == name)
            .and_then(|i| Cond::try_from(i).ok())
    })?;
    Ok((0..count).filter_map(|i| Cond::try_from(i).ok()).collect())
}

fn main() -> Result<()> {
    let args = parse_args();

    let config = match &args.config {
        Some(path) => load_config(Some(path.as_path()), None)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => CamParamsConfig::default(),
    };
    validate_config(&config).context("Invalid configuration")?;

    let debug_flags = parse_debug_flags();
    init_console_logging(&debug_flags, &log_options(&config.logging))?;

    let section = &config.isp;
    let assembler: Arc<ParamsAssembler<Cond, [u8]>> = Arc::new(assembler_from_section(section)?);
    if let Some(cam_id) = args.cam_id {
        assembler.set_cam_phy_id(cam_id);
    }

    let conditions = setup_conditions(&assembler, section, args.conditions)?;
    let Some(&dropping) = conditions.last() else {
        bail!("at least one condition is required");
    };

    info!(
        target: "camparams",
        "Replaying {} frames over {} conditions (drop every {})",
        args.frames,
        conditions.len(),
        args.drop_every
    );
    assembler.start();

    let producers: Vec<_> = conditions
        .iter()
        .map(|&condition| {
            let assembler = Arc::clone(&assembler);
            let frames = args.frames;
            let drop_every = args.drop_every;
            thread::spawn(move || {
                for frame in 0..frames {
                    if condition == dropping && drop_every > 0 && frame % drop_every == 0 {
                        continue;
                    }
                    let frame_id = FrameId::try_from(frame).unwrap_or(FrameId::MAX);
                    let bytes = payload(frame_id, condition);
                    assembler.queue(PartialResult::new(frame_id, condition, bytes));
                    thread::yield_now();
                }
            })
        })
        .collect();

    let mut sink = ReplaySink::default();
    while producers.iter().any(|p| !p.is_finished()) {
        assembler.drain_into(&mut sink)?;
        thread::yield_now();
    }
    for producer in producers {
        if producer.join().is_err() {
            bail!("producer thread panicked");
        }
    }

    // Frames that lost a result never complete on their own
    let last_frame = FrameId::try_from(args.frames).unwrap_or(FrameId::MAX);
    let slack = FrameId::try_from(assembler.max_pending()).unwrap_or(0);
    let horizon = last_frame.saturating_add(slack);
    for frame_id in 0..=horizon {
        if assembler.pending_len() == 0 {
            break;
        }
        if assembler.force_ready(frame_id) {
            assembler.drain_into(&mut sink)?;
        }
    }
    assembler.drain_into(&mut sink)?;
    if assembler.pending_len() > 0 {
        warn!(target: "camparams", "{} params bundles left pending", assembler.pending_len());
    }

    info!(
        target: "camparams",
        "Applied {} frames carrying {} results",
        sink.applied, sink.results
    );
    let stats = assembler.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    assembler.stop();
    Ok(())
}
