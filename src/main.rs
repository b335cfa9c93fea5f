use anyhow::{anyhow, Result};

use hrsim::{cli, core::logs};

fn main() -> Result<()> {
    let matches = cli::parse_args();

    let level = matches
        .get_one::<String>("log")
        .map(String::as_str)
        .unwrap_or("INFO");
    let level = logs::parse_level(level).ok_or_else(|| anyhow!("Unknown log level: {level}"))?;
    logs::init_logger(level)?;

    cli::actions::run(&matches)
}
