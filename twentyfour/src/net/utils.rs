use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum allowed message size (1MB) to prevent unbounded allocation.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Read one frame: a little-endian `u32` length followed by that many
/// bytes of UTF-8 text.
pub async fn read_prefixed<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<String> {
    let mut len_bytes = [0; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message size {len} exceeds maximum allowed size of {MAX_MESSAGE_SIZE} bytes"),
        ));
    }

    let mut buf = vec![0; len];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
}

pub async fn write_prefixed<W: AsyncWrite + Unpin>(writer: &mut W, payload: &str) -> io::Result<()> {
    let bytes = payload.as_bytes();
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "message size {} exceeds maximum allowed size of {MAX_MESSAGE_SIZE} bytes",
                bytes.len()
            ),
        ));
    }

    // Size and body go out as one write so a reader never sees a
    // length without its body because of an interleaved send.
    let size = bytes.len() as u32;
    let mut buf = Vec::with_capacity(4 + bytes.len());
    buf.extend(size.to_le_bytes());
    buf.extend(bytes);
    writer.write_all(&buf).await?;
    writer.flush().await
}
