use std::io::{self, Read};

use rmodbus::{guess_request_frame_len, ModbusProto};

const HEADER_LEN: usize = 6;
const MAX_FRAME_LEN: usize = 256;
const BULK_WRITES: [u8; 2] = [0x0F, 0x10];

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Read one RTU request frame from `port`.
///
/// Returns `Ok(None)` when the line stays quiet or a frame is cut short by a
/// timeout. End of input is returned as an `UnexpectedEof` error.
/// Frames whose length cannot be guessed from the header are collected until
/// the line goes quiet.
pub fn read_request<P: Read + ?Sized>(port: &mut P) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_LEN];
    match port.read_exact(&mut header) {
        Ok(()) => {}
        Err(err) if is_timeout(&err) => return Ok(None),
        Err(err) => return Err(err),
    }

    let mut frame = header.to_vec();
    if BULK_WRITES.contains(&header[1]) {
        // byte count follows the header
        let mut byte_count = [0u8; 1];
        match port.read_exact(&mut byte_count) {
            Ok(()) => frame.push(byte_count[0]),
            Err(err) if is_timeout(&err) => return Ok(None),
            Err(err) => return Err(err),
        }
    }

    match guess_request_frame_len(&frame, ModbusProto::Rtu) {
        Ok(len) => {
            let len = usize::from(len).min(MAX_FRAME_LEN);
            if len > frame.len() {
                let mut rest = vec![0u8; len - frame.len()];
                match port.read_exact(&mut rest) {
                    Ok(()) => frame.extend_from_slice(&rest),
                    Err(err) if is_timeout(&err) => {
                        log::warn!("Request body read timed out after header {header:02X?}");
                        return Ok(None);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Err(_) => drain_until_quiet(port, &mut frame)?,
    }

    log::debug!("Received Modbus request: {frame:02X?}");
    Ok(Some(frame))
}

fn drain_until_quiet<P: Read + ?Sized>(port: &mut P, frame: &mut Vec<u8>) -> io::Result<()> {
    let mut chunk = [0u8; 64];
    while frame.len() < MAX_FRAME_LEN {
        match port.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => frame.extend_from_slice(&chunk[..n]),
            Err(err) if is_timeout(&err) => break,
            Err(err) => return Err(err),
        }
    }
    frame.truncate(MAX_FRAME_LEN);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::modbus::with_crc;
    use std::io::Cursor;

    #[test]
    fn test_reads_back_to_back_frames() {
        let read = with_crc(vec![0x01, 0x03, 0x00, 0x10, 0x00, 0x02]);
        let write = with_crc(vec![0x01, 0x10, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x07]);
        let mut input = Cursor::new([read.clone(), write.clone()].concat());

        assert_eq!(read_request(&mut input).unwrap(), Some(read));
        assert_eq!(read_request(&mut input).unwrap(), Some(write));
        let err = read_request(&mut input).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
