/// Size of the wire header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Receive lane the frame is routed to on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lane {
    /// Group bookkeeping: rendezvous, mesh handshakes and barriers.
    Control = 0,
    /// Topology payloads.
    Data = 1,
}

impl Lane {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Lane::Control),
            1 => Some(Lane::Data),
            _ => None,
        }
    }
}

/// 8-byte wire header prepended to every frame.
///
/// ```text
/// [0..4] payload_length: u32 LE
/// [4]    lane: u8
/// [5..8] reserved (must be 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_length: u32,
    pub lane: Lane,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4] = self.lane as u8;
        buf
    }

    /// Returns `None` if the lane byte is unknown.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Option<Self> {
        let payload_length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let lane = Lane::from_u8(buf[4])?;
        Some(Self {
            payload_length,
            lane,
        })
    }
}
