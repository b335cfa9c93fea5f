use anyhow::{anyhow, Result};
use clap::ArgMatches;
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use super::{
    config::SimConfig,
    handlers::FlumeSink,
    modbus::serve_port,
    watch::{spawn_watcher, MapWatcher},
};
use crate::{
    api::{utils::available_ports, NoOpSink, StoreBuilder, StoreHandle},
    core::logs::DiagnosticEvent,
    protocol::regmap::{CompileResult, RegisterMap},
};

const WATCH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub address: u16,
    pub value: u16,
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewError {
    pub line: usize,
    pub message: String,
}

/// Registers of `map` in ascending address order.
pub fn preview_entries(map: &RegisterMap) -> Vec<PreviewEntry> {
    map.iter()
        .map(|(address, value)| PreviewEntry {
            address,
            value,
            hex: format!("0x{value:04X}"),
        })
        .collect()
}

pub fn preview_line(entry: &PreviewEntry) -> String {
    format!("{:>5}  {:>5}  {}", entry.address, entry.value, entry.hex)
}

fn preview_errors(result: &CompileResult) -> Vec<PreviewError> {
    result
        .errors()
        .iter()
        .map(|err| PreviewError {
            line: err.line,
            message: err.kind.to_string(),
        })
        .collect()
}

/// Compile the map and print it. Fails when any row is rejected.
pub fn run_preview(config: &SimConfig, json: bool) -> Result<()> {
    let compiler = StoreBuilder::new()
        .with_compile_options(config.compile_options())
        .with_sink(Arc::new(NoOpSink))
        .compiler();
    let result = compiler.compile_path(&config.map.csv_path)?;

    if let Some(map) = result.map() {
        let entries = preview_entries(map);
        if json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for entry in &entries {
                println!("{}", preview_line(entry));
            }
        }
        return Ok(());
    }

    let errors = preview_errors(&result);
    if json {
        println!("{}", serde_json::to_string_pretty(&errors)?);
    } else {
        for err in &errors {
            eprintln!("line {}: {}", err.line, err.message);
        }
    }
    Err(anyhow!(
        "{} row(s) of {} failed to compile",
        errors.len(),
        config.map.csv_path.display()
    ))
}

pub fn run_list_ports(json: bool) -> Result<()> {
    let ports = available_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else {
        for port in &ports {
            println!("{port}");
        }
    }
    Ok(())
}

fn print_event(event: &DiagnosticEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => log::warn!("Failed to serialize event: {err}"),
        }
    } else {
        log::log!(
            target: "hrsim::diagnostics",
            log::Level::from(event.level),
            "{}",
            event.kind
        );
    }
}

/// Compile the map and serve it on the configured serial port until Ctrl-C.
pub fn run_serve(config: &SimConfig, json: bool) -> Result<()> {
    let (sink, events) = FlumeSink::new();
    let printer = thread::spawn(move || {
        for event in events.iter() {
            print_event(&event, json);
        }
    });

    let builder = StoreBuilder::new()
        .with_compile_options(config.compile_options())
        .with_store_options(config.store_options())
        .with_sink(Arc::new(sink));
    let store = match builder.build_from_path(&config.map.csv_path) {
        Ok(store) => store,
        Err(err) => {
            drop(builder);
            let _ = printer.join();
            return Err(anyhow!(
                "Register map {}: {err}",
                config.map.csv_path.display()
            ));
        }
    };
    log::info!(
        "Loaded {} register(s) from {}",
        store.map().len(),
        config.map.csv_path.display()
    );
    let handle = StoreHandle::with_store(store);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            log::info!("Stopping");
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|err| anyhow!("Failed to install Ctrl-C handler: {err}"))?;
    }

    let watcher = config.map.watch.then(|| {
        spawn_watcher(
            MapWatcher::new(&config.map.csv_path, builder.clone(), handle.clone()),
            WATCH_INTERVAL,
            running.clone(),
        )
    });

    let served = serve_port(&config.serial, &handle, &running);
    running.store(false, Ordering::SeqCst);

    if let Some(watcher) = watcher {
        if watcher.join().is_err() {
            log::warn!("Map watcher thread panicked");
        }
    }
    drop(handle);
    drop(builder);
    if printer.join().is_err() {
        log::warn!("Event printer thread panicked");
    }
    served
}

/// Dispatch the command line to the matching action.
pub fn run(matches: &ArgMatches) -> Result<()> {
    let json = matches.get_flag("json");
    if matches.get_flag("list-ports") {
        return run_list_ports(json);
    }

    let config = SimConfig::load(matches)?;
    log::debug!("Effective configuration: {config:?}");
    if matches.get_flag("preview") {
        return run_preview(&config, json);
    }
    run_serve(&config, json)
}
