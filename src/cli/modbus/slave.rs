use anyhow::{anyhow, Result};
use std::{
    io::{self, Read, Write},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    api::{utils::open_serial_port, StoreHandle},
    cli::config::SerialConfig,
    protocol::modbus::{read_request, respond_to_request},
};

/// Answer requests on `port` until `running` is cleared or the input ends.
///
/// Each request is served from the store installed at the time it arrives.
pub fn serve<P: Read + Write + ?Sized>(
    port: &mut P,
    handle: &StoreHandle,
    station_id: u8,
    running: &AtomicBool,
) -> Result<()> {
    while running.load(Ordering::SeqCst) {
        let request = match read_request(port) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                log::info!("Serial input closed");
                break;
            }
            Err(err) => return Err(anyhow!("Failed to read request: {err}")),
        };

        let Some(store) = handle.snapshot() else {
            log::warn!("No register map loaded, dropping request");
            continue;
        };
        if let Some(response) = respond_to_request(&store, station_id, &request) {
            port.write_all(&response)?;
            port.flush()?;
        }
    }
    Ok(())
}

/// Open the configured serial port and serve it.
pub fn serve_port(config: &SerialConfig, handle: &StoreHandle, running: &AtomicBool) -> Result<()> {
    let mut port = open_serial_port(
        &config.port,
        config.baud_rate,
        config.framing(),
        config.timeout(),
    )?;
    log::info!(
        "Serving station {} on {} @ {} {}",
        config.station_id,
        config.port,
        config.baud_rate,
        config.framing()
    );
    serve(&mut *port, handle, config.station_id, running)
}
