//! Test data builders for frames, waveforms and graphs

use scopeflow::graph::nodes::ethernet::crc32;
use scopeflow::graph::nodes::{AcquisitionChannel, EthernetDecoder};
use scopeflow::graph::{AnyWaveform, ChannelKind, InstrumentId, NodeId, StreamType, Unit, Waveform};
use scopeflow::{Capabilities, FlowGraph, Instrument};

/// Femtoseconds per byte on the wire in every test capture.
pub const BYTE_TIME_FS: i64 = 8_000_000;

/// Builder for Ethernet frames as they appear on the wire.
pub struct FrameBuilder {
    dst: [u8; 6],
    src: [u8; 6],
    vlan: Option<u16>,
    ethertype: u16,
    payload: Vec<u8>,
    preamble: usize,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            dst: [0xff; 6],
            src: [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
            vlan: None,
            ethertype: 0x0800,
            payload: Vec::new(),
            preamble: 7,
        }
    }

    pub fn dst(mut self, mac: [u8; 6]) -> Self {
        self.dst = mac;
        self
    }

    pub fn src(mut self, mac: [u8; 6]) -> Self {
        self.src = mac;
        self
    }

    /// Insert an 802.1q tag with the given VLAN id and priority.
    pub fn vlan(mut self, id: u16, pcp: u8) -> Self {
        self.vlan = Some(((pcp as u16) << 13) | (id & 0xfff));
        self
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn preamble(mut self, bytes: usize) -> Self {
        self.preamble = bytes;
        self
    }

    /// Header and payload, without preamble, SFD or FCS.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.dst);
        body.extend_from_slice(&self.src);
        if let Some(tag) = self.vlan {
            body.extend_from_slice(&0x8100u16.to_be_bytes());
            body.extend_from_slice(&tag.to_be_bytes());
        }
        body.extend_from_slice(&self.ethertype.to_be_bytes());
        body.extend_from_slice(&self.payload);
        body
    }

    /// Full wire image with preamble, SFD and a valid FCS.
    pub fn build(&self) -> Vec<u8> {
        let body = self.body();
        let mut wire = vec![0x55; self.preamble];
        wire.push(0xd5);
        wire.extend_from_slice(&body);
        wire.extend_from_slice(&crc32(&body).to_le_bytes());
        wire
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One byte per sample, uniformly spaced.
pub fn byte_capture(bytes: Vec<u8>) -> AnyWaveform {
    AnyWaveform::Bytes(Waveform::from_samples(BYTE_TIME_FS, bytes))
}

pub fn analog_capture(timescale: i64, samples: Vec<f32>) -> AnyWaveform {
    AnyWaveform::Analog(Waveform::from_samples(timescale, samples))
}

pub fn scope(id: u32, caps: Capabilities) -> Instrument {
    Instrument::new(InstrumentId(id), format!("scope{}", id), caps)
}

/// Byte-capture channel feeding an Ethernet decoder.
pub struct DecoderGraph {
    pub graph: FlowGraph,
    pub channel: NodeId,
    pub decoder: NodeId,
}

impl DecoderGraph {
    pub fn new() -> Self {
        let mut graph = FlowGraph::new();
        let channel = graph.add_node(AcquisitionChannel::new(
            "RX",
            None,
            ChannelKind::DigitalInput,
            StreamType::DigitalBus,
            Unit::HexNumber,
        ));
        let decoder = graph.add_node(EthernetDecoder::new());
        graph
            .connect(channel, 0, decoder, 0)
            .expect("byte channel should be accepted by the decoder");
        Self {
            graph,
            channel,
            decoder,
        }
    }

    /// Ingest `bytes` and run one cycle.
    pub fn decode(&mut self, bytes: Vec<u8>) {
        self.graph
            .ingest(self.channel, 0, byte_capture(bytes))
            .expect("channel accepts data");
        self.graph.run_cycle(false);
    }
}

impl Default for DecoderGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder_layout() {
        let wire = FrameBuilder::new().vlan(5, 1).payload(&[1, 2]).build();
        // 7 preamble + SFD + 12 MAC + 4 tag + 2 type + 2 payload + 4 FCS
        assert_eq!(wire.len(), 32);
        assert_eq!(wire[7], 0xd5);
        assert_eq!(&wire[20..22], &[0x81, 0x00]);
    }
}
