//! `tokio_util` codec over the stream reassembler (`async` feature).

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::packet::Packet;
use crate::reassembler::StreamReassembler;

/// Decodes sealed [`Packet`]s from a receiver byte stream and encodes building ones.
///
/// Use with `tokio_util::codec::Framed` (or `FramedRead`/`FramedWrite`) over a
/// `tokio::net::TcpStream`. Frames failing checksum verification are dropped.
#[derive(Debug)]
pub struct DeviceCodec {
    reassembler: StreamReassembler,
    ready: VecDeque<Packet>,
    verify_checksum: bool,
}

impl Default for DeviceCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCodec {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            reassembler: StreamReassembler::with_max_frame_size(config.max_frame_size),
            ready: VecDeque::new(),
            verify_checksum: config.verify_checksum,
        }
    }
}

impl Decoder for DeviceCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if !src.is_empty() && !self.reassembler.has_failed() {
            let data = src.split();
            for frame in self.reassembler.feed(&data)? {
                if self.verify_checksum {
                    if let Err(err) = frame.verify_checksum() {
                        warn!(opcode = frame.opcode(), error = %err, "dropping frame");
                        continue;
                    }
                }
                self.ready.push_back(Packet::from_frame(&frame)?);
            }
        }
        if let Some(packet) = self.ready.pop_front() {
            return Ok(Some(packet));
        }
        match self.reassembler.take_error() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if self.reassembler.buffered() == 0 => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Packet> for DeviceCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        let max = self.reassembler.max_frame_size();
        if item.wire_size() > max {
            return Err(FrameError::FrameTooLarge {
                size: item.wire_size(),
                max,
            });
        }
        item.serialize_into(dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::opcode;
    use crate::port;

    #[tokio::test]
    async fn test_sink_to_stream_roundtrip() {
        let (client, server) = tokio::io::duplex(4096);
        let mut sink = FramedWrite::new(client, DeviceCodec::new());
        let mut stream = FramedRead::new(server, DeviceCodec::new());

        for seq in 0..3u16 {
            let mut packet = Packet::new(opcode::BESTPOS, port::ETH1_ALL);
            packet.set_sequence(seq).unwrap();
            packet.write_f64(37.422).unwrap();
            sink.send(packet).await.unwrap();
        }
        drop(sink);

        for seq in 0..3u16 {
            let mut packet = stream.next().await.unwrap().unwrap();
            assert!(packet.is_sealed());
            assert_eq!(packet.sequence(), seq);
            assert_eq!(packet.read_f64().unwrap().to_bits(), 37.422f64.to_bits());
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fragmented_stream() {
        let mut wire = Vec::new();
        for payload in [&b"first"[..], &b"second"[..]] {
            let packet = Packet::with_payload(opcode::TIME, port::ETH1_ALL, payload);
            wire.extend_from_slice(&packet.serialize().unwrap());
        }

        let (mut client, server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            for chunk in wire.chunks(3) {
                client.write_all(chunk).await.unwrap();
            }
        });

        let mut stream = FramedRead::new(server, DeviceCodec::new());
        assert_eq!(stream.next().await.unwrap().unwrap().payload(), b"first");
        assert_eq!(stream.next().await.unwrap().unwrap().payload(), b"second");
        writer.await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_bad_checksum_dropped() {
        let mut corrupt = Packet::with_payload(opcode::BESTPOS, port::ETH1_ALL, b"bad")
            .serialize()
            .unwrap()
            .to_vec();
        corrupt[28] ^= 0xFF;
        let good = Packet::with_payload(opcode::TIME, port::ETH1_ALL, b"good")
            .serialize()
            .unwrap();

        let mut src = BytesMut::new();
        src.extend_from_slice(&corrupt);
        src.extend_from_slice(&good);

        let mut codec = DeviceCodec::new();
        let packet = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(packet.opcode(), opcode::TIME);
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_packet_before_garbage_is_delivered() {
        let good = Packet::with_payload(opcode::TIME, port::ETH1_ALL, b"good")
            .serialize()
            .unwrap();
        let mut src = BytesMut::new();
        src.extend_from_slice(&good);
        src.extend_from_slice(&[0u8; 16]);

        let mut codec = DeviceCodec::new();
        let packet = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(packet.payload(), b"good");
        assert!(matches!(
            codec.decode(&mut src),
            Err(FrameError::InvalidSync { .. })
        ));
    }

    #[test]
    fn test_eof_mid_frame() {
        let wire = Packet::with_payload(opcode::BESTPOS, port::ETH1_ALL, b"cut")
            .serialize()
            .unwrap();
        let mut src = BytesMut::from(&wire[..12]);

        let mut codec = DeviceCodec::new();
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert!(matches!(
            codec.decode_eof(&mut src),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let cfg = FrameConfig {
            max_frame_size: 40,
            ..FrameConfig::default()
        };
        let mut codec = DeviceCodec::with_config(&cfg);
        let mut dst = BytesMut::new();
        let packet = Packet::with_payload(opcode::LOG, port::ETH1_ALL, &[0u8; 32]);
        assert!(matches!(
            codec.encode(packet, &mut dst),
            Err(FrameError::FrameTooLarge { .. })
        ));
        assert!(dst.is_empty());
    }
}
