//! Packet framing: 3-byte length, 1-byte sequence id, payload

use bytes::{BufMut, BytesMut};
use coshard_core::{CoshardError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::consts::MAX_PAYLOAD_LEN;

/// Framed packet reader/writer over one client stream
pub struct PacketIo<S> {
    stream: S,
    /// Sequence id expected on the next read and used for the next write
    sequence: u8,
}

impl<S> PacketIo<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            sequence: 0,
        }
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Start a new command phase
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// Read one logical packet, joining frames split at the 16 MiB limit
    pub async fn read_packet(&mut self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let mut header = [0u8; 4];
            self.stream.read_exact(&mut header).await?;

            let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
            if header[3] != self.sequence {
                return Err(CoshardError::Protocol(format!(
                    "invalid packet sequence {} (expected {})",
                    header[3], self.sequence
                )));
            }
            self.sequence = self.sequence.wrapping_add(1);

            let start = payload.len();
            payload.resize(start + len, 0);
            self.stream.read_exact(&mut payload[start..]).await?;

            if len < MAX_PAYLOAD_LEN {
                return Ok(payload);
            }
        }
    }

    /// Write one logical packet, splitting it into frames as needed
    pub async fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(payload.len() + 4);
        let mut rest = payload;
        loop {
            let len = rest.len().min(MAX_PAYLOAD_LEN);
            buf.put_uint_le(len as u64, 3);
            buf.put_u8(self.sequence);
            buf.put_slice(&rest[..len]);
            self.sequence = self.sequence.wrapping_add(1);

            rest = &rest[len..];
            // A payload of exactly the frame limit is terminated by an empty frame.
            if len < MAX_PAYLOAD_LEN {
                break;
            }
        }

        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Append a length-encoded integer
pub fn put_lenenc_int(buf: &mut BytesMut, value: u64) {
    if value < 251 {
        buf.put_u8(value as u8);
    } else if value < 1 << 16 {
        buf.put_u8(0xfc);
        buf.put_u16_le(value as u16);
    } else if value < 1 << 24 {
        buf.put_u8(0xfd);
        buf.put_uint_le(value, 3);
    } else {
        buf.put_u8(0xfe);
        buf.put_u64_le(value);
    }
}

/// Decode a length-encoded integer, returning the value and bytes consumed
pub fn read_lenenc_int(data: &[u8]) -> Option<(u64, usize)> {
    let (&first, rest) = data.split_first()?;
    let width = match first {
        0..=250 => return Some((u64::from(first), 1)),
        0xfc => 2,
        0xfd => 3,
        0xfe => 8,
        // 0xfb is NULL, 0xff an error header
        _ => return None,
    };
    let bytes = rest.get(..width)?;
    let value = bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    Some((value, width + 1))
}
