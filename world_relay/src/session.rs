use std::net::SocketAddr;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use packet_log::{Direction, PacketLog};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;
use world_protocol::{opcodes, WorldPacket};

use crate::net::framing::WorldCodec;

/// Accept connections forever, one task per client.
pub async fn accept_loop(listener: TcpListener, log: &'static PacketLog) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let span = info_span!("session", id = %Uuid::new_v4(), %peer);
        tokio::spawn(
            async move {
                debug!("client connected");
                match serve(stream, peer, log).await {
                    Ok(()) => debug!("client disconnected"),
                    Err(e) => warn!("session error: {e:#}"),
                }
            }
            .instrument(span),
        );
    }
}

async fn serve(stream: TcpStream, peer: SocketAddr, log: &PacketLog) -> Result<()> {
    let mut framed = Framed::new(stream, WorldCodec);

    while let Some(packet) = framed.next().await {
        let packet = packet?;
        trace!(opcode = packet.opcode(), preview = %hex::encode(&packet.payload()[..packet.len().min(16)]), "recv");
        capture(log, &packet, Direction::ClientToServer, peer);

        let reply = respond(packet);
        capture(log, &reply, Direction::ServerToClient, peer);
        framed.send(reply).await?;
    }
    Ok(())
}

/// The append takes a blocking lock and writes to a file, so it runs via
/// `block_in_place` to keep the worker's other tasks moving.
fn capture(log: &PacketLog, packet: &WorldPacket, direction: Direction, peer: SocketAddr) {
    if log.can_log_packet() {
        tokio::task::block_in_place(|| log.log_packet(packet, direction, peer.ip(), peer.port()));
    }
}

/// Pings get a pong carrying the same payload; everything else is echoed.
fn respond(packet: WorldPacket) -> WorldPacket {
    match packet.opcode() {
        opcodes::CMSG_PING => {
            info!(len = packet.len(), "ping");
            WorldPacket::new(opcodes::SMSG_PONG, packet.into_payload())
        }
        _ => packet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet_log::{decode_capture, CaptureConfig};

    #[test]
    fn ping_becomes_pong() {
        let reply = respond(WorldPacket::new(opcodes::CMSG_PING, vec![0, 0, 0, 7]));
        assert_eq!(reply.opcode(), opcodes::SMSG_PONG);
        assert_eq!(reply.payload(), &[0, 0, 0, 7]);

        let echo = respond(WorldPacket::new(0x42, vec![1]));
        assert_eq!(echo, WorldPacket::new(0x42, vec![1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn both_directions_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.pkt");
        let log: &'static PacketLog = Box::leak(Box::new(PacketLog::new(CaptureConfig {
            enabled: true,
            file: path.clone(),
            ..Default::default()
        })));
        log.initialize();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(accept_loop(listener, log));

        let stream = TcpStream::connect(addr).await.unwrap();
        let local = stream.local_addr().unwrap();
        let mut client = Framed::new(stream, WorldCodec);
        client.send(WorldPacket::new(opcodes::CMSG_PING, vec![0, 0, 0, 1])).await.unwrap();
        let pong = client.next().await.expect("reply").unwrap();
        assert_eq!(pong.opcode(), opcodes::SMSG_PONG);

        server.abort();
        log.shutdown();

        let (_, records) = decode_capture(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::ClientToServer);
        assert_eq!(records[0].opcode, opcodes::CMSG_PING);
        assert_eq!(records[1].direction, Direction::ServerToClient);
        assert_eq!(records[1].opcode, opcodes::SMSG_PONG);
        assert!(records.iter().all(|r| r.port == local.port() && r.addr == local.ip()));
    }
}
