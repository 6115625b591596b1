use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;

use chordmap::args::Args;
use chordmap::combo::ComboTable;
use chordmap::config;
use chordmap::device;
use chordmap::engine::{man_in_the_middle, EngineOptions};
use chordmap::input::{DeviceReader, LogReader};
use chordmap::output::{CsvWriter, UinputWriter};
use chordmap::timing::TimingPolicy;

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match config::load_config(&args.config) {
        Ok(config) => config,
        Err(e) => abort(&format!("Failed to load config '{}': {e:#}", args.config.display())),
    };
    let combos = match ComboTable::from_config(&config) {
        Ok(combos) => combos,
        Err(e) => abort(&format!("Bad combo in '{}': {e:#}", args.config.display())),
    };

    let result = match &args.replay {
        Some(log) => replay(log, &combos),
        None => run_devices(&args, &combos),
    };
    if let Err(e) = result {
        abort(&format!("Error: {e:#}"));
    }
}

fn replay(log: &Path, combos: &ComboTable) -> Result<()> {
    let file = File::open(log).with_context(|| format!("failed to open {}", log.display()))?;
    let mut reader = LogReader::new(BufReader::new(file));
    let stdout = io::stdout();
    let mut writer = CsvWriter::new(stdout.lock());
    man_in_the_middle(
        &mut reader,
        &mut writer,
        combos,
        TimingPolicy::default(),
        EngineOptions::default(),
    )
}

fn run_devices(args: &Args, combos: &ComboTable) -> Result<()> {
    loop {
        let output_device = device::output_device().context("failed to prepare an output device")?;
        let input_devices = device::get_input_devices(&args.device, &args.ignore)?;
        let mut reader = DeviceReader::new(input_devices);
        let mut writer = UinputWriter::new(output_device);
        match man_in_the_middle(
            &mut reader,
            &mut writer,
            combos,
            TimingPolicy::default(),
            EngineOptions::default(),
        ) {
            // device streams don't normally end, but be clean about it
            Ok(()) => return Ok(()),
            Err(e) if e.to_string().starts_with("No such device") => {
                println!("Found a removed device. Reselecting devices.");
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

fn abort(message: &str) -> ! {
    eprintln!("{message}");
    exit(1)
}
