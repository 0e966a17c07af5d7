//! Ethernet MAC-layer decoder.
//!
//! Turns a stream of bytes (one sample per byte, as produced by a PHY-layer
//! decoder or a byte-capture channel) into frame segments and packets.
//! PHY decoders that already split their input into frames call
//! [`EthernetDecoder::bytes_to_frames`] once per frame.

mod crc;
mod segment;

pub use crc::crc32;
pub use segment::{ethertype_name, format_mac, EthernetFrameSegment, SegmentType};

use crate::graph::node::{NodeCategory, NodeCore, NodePlugin, RefreshContext};
use crate::graph::packet::{Packet, PacketDecoder, ProtocolColor, BLACK, WHITE};
use crate::graph::parameter::FilterParameter;
use crate::graph::stream::{Stream, StreamDescriptor, StreamFlags, StreamType};
use crate::graph::unit::Unit;
use crate::graph::waveform::{AnyWaveform, Waveform};

pub const PARAM_STRIPPED: &str = "Preamble/FCS stripped";

const HEADERS: &[&str] = &["Dest MAC", "Src MAC", "VLAN", "Ethertype"];

/// Decoder state, named after the segment currently being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Preamble,
    DstMac,
    SrcMac,
    TypeLen,
    VlanTag,
    Payload,
    Checksum,
}

pub struct EthernetDecoder {
    core: NodeCore,
    packets: Vec<Packet>,
}

impl EthernetDecoder {
    pub fn new() -> Self {
        let mut core = NodeCore::new("Ethernet");
        core.create_input("din");
        core.add_stream(
            Stream::new("data", Unit::Counts, StreamType::Protocol).with_flags(StreamFlags {
                do_not_interpolate: true,
                ..Default::default()
            }),
        );
        core.add_parameter(PARAM_STRIPPED, FilterParameter::bool(false));
        Self {
            core,
            packets: Vec::new(),
        }
    }

    fn stripped(&self) -> bool {
        self.core
            .parameter(PARAM_STRIPPED)
            .map(FilterParameter::as_bool)
            .unwrap_or(false)
    }

    /// Decode one burst of bytes into `cap`, appending at most one packet.
    ///
    /// `starts[i]` / `ends[i]` are the boundaries of byte `i` in femtoseconds
    /// from the trigger. Segments are placed relative to `cap`'s timescale
    /// and trigger phase. With `stripped` set the input has no preamble, SFD
    /// or FCS and the frame runs to the last byte. A frame that is still
    /// open when the input runs out is dropped.
    pub fn bytes_to_frames(
        &mut self,
        bytes: &[u8],
        starts: &[i64],
        ends: &[i64],
        cap: &mut Waveform<EthernetFrameSegment>,
        stripped: bool,
    ) {
        let len = bytes.len().min(starts.len()).min(ends.len());
        if len == 0 {
            return;
        }

        let mut state = if stripped { State::DstMac } else { State::Idle };
        let mut packet = Packet::new(if stripped { starts[0] } else { 0 });
        let mut data: Vec<u8> = Vec::new();
        let mut start = 0i64;
        let mut crc_start = 0usize;
        let mut crc_expected = 0u32;
        let mut crc_actual = 0u32;

        for i in 0..len {
            let b = bytes[i];
            match state {
                State::Idle => {
                    if b == 0x55 {
                        start = starts[i];
                        data.clear();
                        data.push(b);
                        packet.offset = starts[i];
                        state = State::Preamble;
                    }
                }

                State::Preamble => match b {
                    0xd5 => {
                        emit(cap, start, starts[i], segment(SegmentType::Preamble, &mut data));
                        emit(cap, starts[i], ends[i], EthernetFrameSegment::new(SegmentType::Sfd, vec![b]));
                        crc_start = i + 1;
                        state = State::DstMac;
                    }
                    0x55 => data.push(b),
                    _ => {}
                },

                State::DstMac | State::SrcMac => {
                    if data.is_empty() {
                        start = starts[i];
                    }
                    data.push(b);
                    if data.len() == 6 {
                        let (kind, header, next) = if state == State::DstMac {
                            (SegmentType::DstMac, "Dest MAC", State::SrcMac)
                        } else {
                            (SegmentType::SrcMac, "Src MAC", State::TypeLen)
                        };
                        if let Some(mac) = format_mac(&data) {
                            packet.set_header(header, mac);
                        }
                        emit(cap, start, ends[i], segment(kind, &mut data));
                        state = next;
                    }
                }

                State::TypeLen => {
                    if data.is_empty() {
                        start = starts[i];
                    }
                    data.push(b);
                    if data.len() == 2 {
                        let ethertype = u16::from_be_bytes([data[0], data[1]]);
                        let next_byte = bytes.get(i + 1).copied().filter(|_| i + 1 < len);
                        classify_ethertype(&mut packet, ethertype, next_byte);
                        emit(cap, start, ends[i], segment(SegmentType::Ethertype, &mut data));

                        state = if ethertype == 0x8100 {
                            State::VlanTag
                        } else if !stripped && i + 5 == len {
                            // Empty payload: only the FCS is left.
                            State::Checksum
                        } else {
                            State::Payload
                        };
                    }
                }

                State::VlanTag => {
                    if data.is_empty() {
                        start = starts[i];
                    }
                    data.push(b);
                    if data.len() == 2 {
                        let tag = u16::from_be_bytes([data[0], data[1]]);
                        packet.set_header("VLAN", (tag & 0xfff).to_string());
                        emit(cap, start, ends[i], segment(SegmentType::VlanTag, &mut data));
                        state = State::TypeLen;
                    }
                }

                State::Payload => {
                    emit(cap, starts[i], ends[i], EthernetFrameSegment::new(SegmentType::Payload, vec![b]));
                    packet.data.push(b);

                    if stripped {
                        if i == len - 1 {
                            packet.len = ends[i] - packet.offset;
                            self.packets.push(packet);
                            return;
                        }
                    } else if i + 5 == len {
                        state = State::Checksum;
                    }
                }

                State::Checksum => {
                    if data.is_empty() {
                        crc_expected = crc32(&bytes[crc_start.min(i)..i]).swap_bytes();
                        start = starts[i];
                    }
                    data.push(b);
                    crc_actual = (crc_actual << 8) | b as u32;

                    if data.len() == 4 {
                        let kind = if crc_actual == crc_expected {
                            SegmentType::FcsGood
                        } else {
                            tracing::trace!(
                                "Frame CRC is {:08x}, expected {:08x}",
                                crc_actual,
                                crc_expected
                            );
                            packet.set_colors(ProtocolColor::Error.hex(), WHITE);
                            SegmentType::FcsBad
                        };
                        emit(cap, start, ends[i], segment(kind, &mut data));
                        packet.len = ends[i] - packet.offset;
                        self.packets.push(packet);
                        return;
                    }
                }
            }
        }

        if state != State::Idle {
            tracing::debug!("Input ended mid-frame in state {:?}, frame discarded", state);
        }
    }
}

impl Default for EthernetDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a segment spanning `start..end` femtoseconds.
fn emit(cap: &mut Waveform<EthernetFrameSegment>, start: i64, end: i64, seg: EthernetFrameSegment) {
    let timescale = cap.timescale.max(1);
    let offset = (start - cap.trigger_phase) / timescale;
    cap.push_sparse(offset, (end - start) / timescale, seg);
}

/// Finish the segment being assembled, leaving `data` empty for the next one.
fn segment(kind: SegmentType, data: &mut Vec<u8>) -> EthernetFrameSegment {
    EthernetFrameSegment::new(kind, std::mem::take(data))
}

fn classify_ethertype(packet: &mut Packet, ethertype: u16, next_byte: Option<u8>) {
    let name = ethertype_name(ethertype, next_byte);
    let (background, foreground) = match name.as_str() {
        "LLC" => ("#33a02c", BLACK),
        "STP" => ("#fdbf6f", BLACK),
        "IPv4" => ("#a6cee3", BLACK),
        "ARP" => ("#ffff99", BLACK),
        "802.1q" => ("#b2df8a", BLACK),
        "IPv6" => ("#1f78b4", WHITE),
        "LLDP" => ("#5e4fa2", WHITE),
        "PTP" => ("#cab2d6", BLACK),
        _ => ("#fb9a99", BLACK),
    };
    // Unknown types show as bare hex in the packet table.
    let header = match name.strip_prefix("0x") {
        Some(hex) => hex.to_string(),
        None => name,
    };
    packet.set_header("Ethertype", header);
    packet.set_colors(background, foreground);
}

/// Byte values and per-byte time spans of an input waveform. Analog
/// samples are rounded and clamped into a byte.
fn extract_bytes(input: &AnyWaveform) -> Option<(Vec<u8>, Vec<i64>, Vec<i64>)> {
    let bytes: Vec<u8> = match input {
        AnyWaveform::Bytes(wf) => wf.samples().to_vec(),
        AnyWaveform::Analog(wf) => wf
            .samples()
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect(),
        _ => return None,
    };
    let starts = (0..bytes.len()).map(|i| input.offset_scaled(i)).collect();
    let ends = (0..bytes.len()).map(|i| input.end_scaled(i)).collect();
    Some((bytes, starts, ends))
}

impl PacketDecoder for EthernetDecoder {
    fn headers(&self) -> &'static [&'static str] {
        HEADERS
    }

    fn packets(&self) -> &[Packet] {
        &self.packets
    }

    fn clear_packets(&mut self) {
        self.packets.clear();
    }
}

impl NodePlugin for EthernetDecoder {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn protocol_name(&self) -> &str {
        "Ethernet"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Protocol
    }

    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        index == 0
            && !stream.is_null()
            && matches!(
                stream.stream_type(),
                StreamType::Analog | StreamType::DigitalBus
            )
    }

    fn refresh(&mut self, ctx: &mut RefreshContext) {
        self.clear_packets();

        let Some(input) = ctx.input_waveform(0) else {
            tracing::debug!("Ethernet: no input data");
            ctx.set_data(0, None);
            return;
        };
        if input.timescale() <= 0 {
            tracing::debug!("Ethernet: input has no valid timescale");
            ctx.set_data(0, None);
            return;
        }
        let Some((bytes, starts, ends)) = extract_bytes(input) else {
            tracing::debug!("Ethernet: unsupported input waveform type");
            ctx.set_data(0, None);
            return;
        };

        let mut cap: Waveform<EthernetFrameSegment> = Waveform::new_sparse(input.timescale());
        match input {
            AnyWaveform::Bytes(wf) => cap.copy_timing_from(wf),
            AnyWaveform::Analog(wf) => cap.copy_timing_from(wf),
            _ => {}
        }

        let stripped = self.stripped();
        self.bytes_to_frames(&bytes, &starts, &ends, &mut cap, stripped);
        cap.mark_modified_from_cpu();
        ctx.set_data(0, Some(cap.into()));
    }
}
