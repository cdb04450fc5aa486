// Length-delimited framing for snapshot broadcast.
//
// Wire format: a 4-byte big-endian length prefix followed by the payload
// (JSON-serialized snapshot types). The caller serializes separately; this
// module only frames raw bytes, which keeps it format-agnostic.
//
// `MAX_FRAME_SIZE` bounds allocation against malformed length prefixes. A
// full `ColonyUpdate` for a busy desktop is a few hundred kilobytes at
// most, so 4 MB is generous headroom.

use std::io::{self, Read, Write};

/// Maximum allowed frame size (4 MB).
pub const MAX_FRAME_SIZE: u32 = 4 * 1024 * 1024;

/// Write one frame: 4-byte big-endian length, then the payload.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = payload.len();
    if len > MAX_FRAME_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    writer.write_all(&(len as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame.
///
/// Returns `UnexpectedEof` if the stream ends before or inside a frame and
/// `InvalidData` if the prefix exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
