// logging/record.rs — capture file layout
//
// All multi-byte integers are little-endian.
//
// header (58 bytes, once per file):
//   magic "PKT" | version u16 | sniffer id u8 | build u32 | locale [u8; 4]
//   | session key [u8; 40] | optional header length u32
//
// record:
//   timestamp_us i64 | direction u8 | addr_len u8 | addr [u8; addr_len]
//   | port u16 | opcode u32 | payload_len u32 | payload

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::errors::{CaptureError, DecodeError};

pub const MAGIC: [u8; 3] = *b"PKT";
pub const FORMAT_VERSION: u16 = 0x0301;
pub const SNIFFER_ID: u8 = b'R';
pub const SESSION_KEY_LEN: usize = 40;
pub const HEADER_SIZE: usize = 3 + 2 + 1 + 4 + 4 + SESSION_KEY_LEN + 4;

/// Bytes in a record before the address and after it, excluding the payload.
const RECORD_PREFIX: usize = 8 + 1 + 1;
const RECORD_SUFFIX: usize = 2 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            Direction::ClientToServer => 0,
            Direction::ServerToClient => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Direction::ClientToServer),
            1 => Ok(Direction::ServerToClient),
            other => Err(DecodeError::UnknownDirection(other)),
        }
    }
}

// ================================ Header ====================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub sniffer_id: u8,
    pub build: u32,
    pub locale: [u8; 4],
}

impl Header {
    /// `locale` is truncated to four bytes and zero padded.
    pub fn new(build: u32, locale: &str) -> Self {
        let mut loc = [0u8; 4];
        let src = locale.as_bytes();
        let n = src.len().min(loc.len());
        loc[..n].copy_from_slice(&src[..n]);
        Self {
            version: FORMAT_VERSION,
            sniffer_id: SNIFFER_ID,
            build,
            locale: loc,
        }
    }

    pub fn locale_str(&self) -> &str {
        let end = self.locale.iter().position(|&b| b == 0).unwrap_or(self.locale.len());
        std::str::from_utf8(&self.locale[..end]).unwrap_or("")
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..3].copy_from_slice(&MAGIC);
        out[3..5].copy_from_slice(&self.version.to_le_bytes());
        out[5] = self.sniffer_id;
        out[6..10].copy_from_slice(&self.build.to_le_bytes());
        out[10..14].copy_from_slice(&self.locale);
        // session key and optional header length stay zero
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(buf);
        let bytes = r.take(HEADER_SIZE)?;
        if bytes[0..3] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = u16::from_le_bytes([bytes[3], bytes[4]]);
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let mut locale = [0u8; 4];
        locale.copy_from_slice(&bytes[10..14]);
        Ok(Self {
            version,
            sniffer_id: bytes[5],
            build: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            locale,
        })
    }
}

// ================================ Record ====================================

/// A decoded record. The append path never builds one of these; it encodes
/// straight from the packet into the write buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub timestamp_us: i64,
    pub direction: Direction,
    pub addr: IpAddr,
    pub port: u16,
    pub opcode: u32,
    pub payload: Vec<u8>,
}

impl PacketRecord {
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), CaptureError> {
        encode_record(
            out,
            self.timestamp_us,
            self.direction,
            self.addr,
            self.port,
            self.opcode,
            &self.payload,
        )
    }

    /// Decode one record from the front of `buf`; returns it with the number
    /// of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        let mut r = Reader::new(buf);
        let timestamp_us = r.i64()?;
        let direction = Direction::from_tag(r.u8()?)?;
        let addr = match r.u8()? {
            4 => {
                let b = r.take(4)?;
                IpAddr::V4(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(r.take(16)?);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            other => return Err(DecodeError::BadAddressLength(other)),
        };
        let port = r.u16()?;
        let opcode = r.u32()?;
        let len = r.u32()? as usize;
        let payload = r.take(len)?.to_vec();
        Ok((
            Self {
                timestamp_us,
                direction,
                addr,
                port,
                opcode,
                payload,
            },
            r.pos,
        ))
    }
}

/// Exact encoded size of a record carrying `payload_len` bytes.
pub fn record_len(addr: IpAddr, payload_len: usize) -> usize {
    let addr_len = match addr {
        IpAddr::V4(_) => 4,
        IpAddr::V6(_) => 16,
    };
    RECORD_PREFIX + addr_len + RECORD_SUFFIX + payload_len
}

/// Append one encoded record to `out`. Nothing is written when the payload
/// length does not fit the u32 length field.
pub fn encode_record(
    out: &mut Vec<u8>,
    timestamp_us: i64,
    direction: Direction,
    addr: IpAddr,
    port: u16,
    opcode: u32,
    payload: &[u8],
) -> Result<(), CaptureError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CaptureError::PayloadTooLarge(payload.len()))?;

    out.reserve(record_len(addr, payload.len()));
    out.extend_from_slice(&timestamp_us.to_le_bytes());
    out.push(direction.tag());
    match addr {
        IpAddr::V4(v4) => {
            out.push(4);
            out.extend_from_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            out.push(16);
            out.extend_from_slice(&v6.octets());
        }
    }
    out.extend_from_slice(&port.to_le_bytes());
    out.extend_from_slice(&opcode.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// Decode a whole capture: the header followed by records up to the end of
/// `buf`. A trailing partial record is reported as `Truncated`.
pub fn decode_capture(buf: &[u8]) -> Result<(Header, Vec<PacketRecord>), DecodeError> {
    let header = Header::decode(buf)?;
    let mut rest = &buf[HEADER_SIZE..];
    let mut records = Vec::new();
    while !rest.is_empty() {
        let (record, used) = PacketRecord::decode(rest)?;
        records.push(record);
        rest = &rest[used..];
    }
    Ok((header, records))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(DecodeError::Truncated { needed: n, available });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(b))
    }
}
