// lib.rs — World packet value type and length-prefixed wire framing

use thiserror::Error;

// =============================== Common =====================================

pub const MAX_PACKET_SIZE: usize = 1024 * 1024; // 1MB
pub const DEFAULT_WORLD_PORT: u16 = 8085;

/// Frame prefix: body length (u32 BE) followed by the opcode (u32 BE).
pub const FRAME_HEADER_SIZE: usize = 8;

pub mod opcodes {
    pub const CMSG_PING: u32 = 0x01DC;
    pub const SMSG_PONG: u32 = 0x01DD;
}

// ================================ Packet ====================================

/// One application-level message: an opcode plus its raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorldPacket {
    opcode: u32,
    payload: Vec<u8>,
}

impl WorldPacket {
    pub fn new(opcode: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    pub fn empty(opcode: u32) -> Self {
        Self::new(opcode, Vec::new())
    }

    #[inline]
    pub fn opcode(&self) -> u32 {
        self.opcode
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

// ================================ Framing ===================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("insufficient data: expected {needed} bytes, got {available}")]
    Short { needed: usize, available: usize },
    #[error("frame too large: {0} bytes")]
    TooLarge(usize),
    #[error("frame body of {0} bytes cannot hold an opcode")]
    MissingOpcode(usize),
}

/// Encode a packet as `[len u32 BE][opcode u32 BE][payload]`, where `len`
/// covers the opcode and the payload.
pub fn encode_frame(packet: &WorldPacket) -> Result<Vec<u8>, FrameError> {
    let body = 4 + packet.len();
    if body > MAX_PACKET_SIZE {
        return Err(FrameError::TooLarge(body));
    }
    let mut out = Vec::with_capacity(4 + body);
    out.extend_from_slice(&(body as u32).to_be_bytes());
    out.extend_from_slice(&packet.opcode.to_be_bytes());
    out.extend_from_slice(&packet.payload);
    Ok(out)
}

/// Decode **one complete frame** from the front of `buf`, returning the packet
/// and the number of bytes consumed.
pub fn decode_frame(buf: &[u8]) -> Result<(WorldPacket, usize), FrameError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::Short {
            needed: FRAME_HEADER_SIZE,
            available: buf.len(),
        });
    }
    let body = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if body > MAX_PACKET_SIZE {
        return Err(FrameError::TooLarge(body));
    }
    if body < 4 {
        return Err(FrameError::MissingOpcode(body));
    }
    let total = 4 + body;
    if buf.len() < total {
        return Err(FrameError::Short {
            needed: total,
            available: buf.len(),
        });
    }
    let opcode = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let packet = WorldPacket::new(opcode, &buf[FRAME_HEADER_SIZE..total]);
    Ok((packet, total))
}

// ================================ Tests =====================================
