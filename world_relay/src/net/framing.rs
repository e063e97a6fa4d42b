use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use world_protocol::{decode_frame, encode_frame, FrameError, WorldPacket};

/// `[len u32 BE][opcode u32 BE][payload]` frames over a byte stream.
#[derive(Default, Clone)]
pub struct WorldCodec;

impl Decoder for WorldCodec {
    type Item = WorldPacket;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> anyhow::Result<Option<WorldPacket>> {
        match decode_frame(src) {
            Ok((packet, used)) => {
                src.advance(used);
                Ok(Some(packet))
            }
            Err(FrameError::Short { needed, available }) => {
                src.reserve(needed - available);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Encoder<WorldPacket> for WorldCodec {
    type Error = anyhow::Error;

    fn encode(&mut self, item: WorldPacket, dst: &mut BytesMut) -> anyhow::Result<()> {
        dst.extend_from_slice(&encode_frame(&item)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_across_partial_reads() {
        let frame = encode_frame(&WorldPacket::new(0x1DC, vec![1, 2, 3, 4])).unwrap();
        let mut codec = WorldCodec;
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&frame[..5]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[5..]);
        let pkt = codec.decode(&mut buf).unwrap().expect("complete frame");
        assert_eq!(pkt.opcode(), 0x1DC);
        assert_eq!(pkt.payload(), &[1, 2, 3, 4]);
        assert!(buf.is_empty());
    }

    #[test]
    fn malformed_frame_is_an_error() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 1, 0, 0, 0, 0][..]);
        assert!(WorldCodec.decode(&mut buf).is_err());
    }
}
