use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Args {
    /// Include a device name or path
    #[clap(long, use_value_delimiter = true)]
    pub device: Vec<String>,
    /// Exclude a device name or path
    #[clap(long, use_value_delimiter = true)]
    pub ignore: Vec<String>,
    /// Re-run a captured event log through the engine and print the resulting
    /// stream as CSV, instead of touching any device
    #[clap(long, value_name = "LOG")]
    pub replay: Option<PathBuf>,
    /// Combo config file
    pub config: PathBuf,
}
