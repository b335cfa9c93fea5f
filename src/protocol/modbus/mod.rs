//! Modbus RTU slave side for the register store.
//!
//! Only holding registers are served. Reads (0x03) come from the current
//! store; single (0x06) and multiple (0x10) writes are answered normally but
//! never change anything. Every other function gets an exception.
mod frame;

pub use frame::read_request;

use crate::protocol::regmap::SparseRegisterStore;

pub const READ_HOLDINGS: u8 = 0x03;
pub const WRITE_SINGLE_HOLDING: u8 = 0x06;
pub const WRITE_MULTIPLE_HOLDINGS: u8 = 0x10;

pub const ILLEGAL_FUNCTION: u8 = 0x01;
pub const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
pub const ILLEGAL_DATA_VALUE: u8 = 0x03;

pub const MAX_READ_COUNT: u16 = 125;
pub const MAX_WRITE_COUNT: u16 = 123;

pub const BROADCAST_UNIT: u8 = 0;

/// CRC-16/MODBUS over `data`
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in data {
        crc ^= b as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC, low byte first.
pub fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = crc16_modbus(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Whether the trailing two bytes are the CRC of everything before them.
pub fn check_crc(frame: &[u8]) -> bool {
    match frame.len().checked_sub(2) {
        Some(split) if split > 0 => {
            let (body, crc) = frame.split_at(split);
            crc16_modbus(body) == u16::from_le_bytes([crc[0], crc[1]])
        }
        _ => false,
    }
}

/// A decoded request PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadHoldings { address: u16, count: u16 },
    WriteSingle { address: u16, value: u16 },
    WriteMultiple { address: u16, values: Vec<u16> },
}

fn be_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

/// Decode a PDU (function code onwards, no unit id or CRC).
/// Failures carry the exception code to answer with.
pub fn decode_request(pdu: &[u8]) -> Result<Request, u8> {
    let Some(&function) = pdu.first() else {
        return Err(ILLEGAL_FUNCTION);
    };
    match function {
        READ_HOLDINGS => {
            if pdu.len() != 5 {
                return Err(ILLEGAL_DATA_VALUE);
            }
            let count = be_u16(pdu, 3);
            if count == 0 || count > MAX_READ_COUNT {
                return Err(ILLEGAL_DATA_VALUE);
            }
            Ok(Request::ReadHoldings {
                address: be_u16(pdu, 1),
                count,
            })
        }
        WRITE_SINGLE_HOLDING => {
            if pdu.len() != 5 {
                return Err(ILLEGAL_DATA_VALUE);
            }
            Ok(Request::WriteSingle {
                address: be_u16(pdu, 1),
                value: be_u16(pdu, 3),
            })
        }
        WRITE_MULTIPLE_HOLDINGS => {
            if pdu.len() < 6 {
                return Err(ILLEGAL_DATA_VALUE);
            }
            let count = be_u16(pdu, 3);
            let byte_count = usize::from(pdu[5]);
            if count == 0
                || count > MAX_WRITE_COUNT
                || byte_count != usize::from(count) * 2
                || pdu.len() != 6 + byte_count
            {
                return Err(ILLEGAL_DATA_VALUE);
            }
            let values = pdu[6..].chunks_exact(2).map(|c| be_u16(c, 0)).collect();
            Ok(Request::WriteMultiple {
                address: be_u16(pdu, 1),
                values,
            })
        }
        _ => Err(ILLEGAL_FUNCTION),
    }
}

fn exception(unit: u8, function: u8, code: u8) -> Vec<u8> {
    with_crc(vec![unit, function | 0x80, code])
}

/// Answer one RTU frame from `store`.
///
/// Frames with a bad CRC or for another unit are dropped. Broadcasts are
/// processed but never answered. Returns the response frame, if any.
pub fn respond_to_request(
    store: &SparseRegisterStore,
    station_id: u8,
    frame: &[u8],
) -> Option<Vec<u8>> {
    if frame.len() < 4 || !check_crc(frame) {
        log::debug!("Dropping frame with bad CRC: {frame:02X?}");
        return None;
    }
    let unit = frame[0];
    let broadcast = unit == BROADCAST_UNIT;
    if unit != station_id && !broadcast {
        log::debug!("Ignoring frame for unit {unit}");
        return None;
    }

    let pdu = &frame[1..frame.len() - 2];
    let function = pdu[0];
    let response = match decode_request(pdu) {
        Ok(Request::ReadHoldings { address, count }) => {
            if broadcast {
                return None;
            }
            // a strict-gap miss is recorded on the store's sink by `read`
            match store.read(address, count) {
                Ok(values) => {
                    let mut response = vec![unit, function, (values.len() * 2) as u8];
                    for value in values {
                        response.extend_from_slice(&value.to_be_bytes());
                    }
                    with_crc(response)
                }
                Err(err) => {
                    log::debug!("Answering read with illegal address: {err}");
                    exception(unit, function, ILLEGAL_DATA_ADDRESS)
                }
            }
        }
        Ok(Request::WriteSingle { address, value }) => {
            store.write(address, &[value]);
            with_crc(frame[..6].to_vec())
        }
        Ok(Request::WriteMultiple { address, values }) => {
            let ack = store.write(address, &values);
            let mut response = vec![unit, function];
            response.extend_from_slice(&ack.address.to_be_bytes());
            response.extend_from_slice(&(ack.count as u16).to_be_bytes());
            with_crc(response)
        }
        Err(code) => {
            log::debug!("Rejecting function 0x{function:02X} with exception 0x{code:02X}");
            exception(unit, function, code)
        }
    };

    if broadcast {
        return None;
    }
    log::debug!("Send Modbus response: {response:02X?}");
    Some(response)
}
