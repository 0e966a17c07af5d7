//! Decoded Ethernet frame segments.

use crate::graph::packet::ProtocolColor;
use crate::graph::waveform::Waveform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SegmentType {
    #[default]
    Invalid,
    Preamble,
    Sfd,
    DstMac,
    SrcMac,
    Ethertype,
    VlanTag,
    Payload,
    FcsGood,
    FcsBad,
    /// Link status byte sent between frames on some PHY interfaces.
    InbandStatus,
    NoCarrier,
    TxError,
    LocalFault,
    RemoteFault,
    LinkInterruption,
}

/// One run of bytes belonging to the same part of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EthernetFrameSegment {
    pub kind: SegmentType,
    pub data: Vec<u8>,
}

impl EthernetFrameSegment {
    pub fn new(kind: SegmentType, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    fn word(&self) -> Option<u16> {
        match self.data.as_slice() {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Display text. `next` is the following segment, used to tell STP
    /// apart from other LLC traffic.
    pub fn text(&self, next: Option<&EthernetFrameSegment>) -> String {
        match self.kind {
            SegmentType::TxError => "ERROR".to_string(),
            SegmentType::Preamble => "PREAMBLE".to_string(),
            SegmentType::Sfd => "SFD".to_string(),
            SegmentType::NoCarrier => "NO CARRIER".to_string(),
            SegmentType::DstMac => match format_mac(&self.data) {
                Some(mac) => format!("To {}", mac),
                None => "[invalid dest MAC length]".to_string(),
            },
            SegmentType::SrcMac => match format_mac(&self.data) {
                Some(mac) => format!("From {}", mac),
                None => "[invalid src MAC length]".to_string(),
            },
            SegmentType::VlanTag => match self.word() {
                Some(tag) => {
                    let mut s = format!("VLAN {}, PCP {}", tag & 0xfff, tag >> 13);
                    if tag & 0x1000 != 0 {
                        s.push_str(", DE");
                    }
                    s
                }
                None => "[invalid VLAN tag length]".to_string(),
            },
            SegmentType::Ethertype => {
                if self.data.len() != 2 {
                    return "[invalid Ethertype length]".to_string();
                }
                let ethertype = self.word().unwrap_or_default();
                let next_byte = next.and_then(|n| n.data.first().copied());
                format!("Type: {}", ethertype_name(ethertype, next_byte))
            }
            SegmentType::Payload => self.data.iter().map(|b| format!("{:02x} ", b)).collect(),
            SegmentType::InbandStatus => match self.data.first() {
                Some(&status) => inband_status_text(status),
                None => String::new(),
            },
            SegmentType::FcsGood | SegmentType::FcsBad => match self.data.as_slice() {
                [a, b, c, d] => format!("CRC: {:02x}{:02x}{:02x}{:02x}", a, b, c, d),
                _ => "[invalid FCS length]".to_string(),
            },
            SegmentType::LocalFault => "Local Fault".to_string(),
            SegmentType::RemoteFault => "Remote Fault".to_string(),
            SegmentType::LinkInterruption => "Link Interruption".to_string(),
            SegmentType::Invalid => String::new(),
        }
    }

    pub fn color(&self) -> ProtocolColor {
        match self.kind {
            SegmentType::InbandStatus | SegmentType::Preamble | SegmentType::Sfd => {
                ProtocolColor::Preamble
            }
            SegmentType::DstMac | SegmentType::SrcMac => ProtocolColor::Address,
            SegmentType::Ethertype | SegmentType::VlanTag => ProtocolColor::Control,
            SegmentType::FcsGood => ProtocolColor::ChecksumOk,
            SegmentType::FcsBad => ProtocolColor::ChecksumBad,
            SegmentType::NoCarrier
            | SegmentType::TxError
            | SegmentType::RemoteFault
            | SegmentType::LocalFault
            | SegmentType::LinkInterruption => ProtocolColor::Error,
            SegmentType::Payload | SegmentType::Invalid => ProtocolColor::Data,
        }
    }
}

impl Waveform<EthernetFrameSegment> {
    /// Display text of segment `i`.
    pub fn text(&self, i: usize) -> String {
        match self.sample(i) {
            Some(seg) => seg.text(self.sample(i + 1)),
            None => String::new(),
        }
    }

    pub fn color(&self, i: usize) -> ProtocolColor {
        self.sample(i)
            .map(EthernetFrameSegment::color)
            .unwrap_or(ProtocolColor::Data)
    }
}

/// Lowercase colon-separated MAC, or `None` if not six bytes.
pub fn format_mac(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    Some(
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

/// Human-readable protocol for a type/length field. Values below 1500 are
/// lengths; the first payload byte then distinguishes STP from other LLC.
pub fn ethertype_name(ethertype: u16, next_byte: Option<u8>) -> String {
    if ethertype < 1500 {
        return if next_byte == Some(0x42) { "STP" } else { "LLC" }.to_string();
    }
    match ethertype {
        0x0800 => "IPv4".to_string(),
        0x0806 => "ARP".to_string(),
        0x8100 => "802.1q".to_string(),
        0x86dd => "IPv6".to_string(),
        0x88cc => "LLDP".to_string(),
        0x88f7 => "PTP".to_string(),
        other => format!("0x{:04x}", other),
    }
}

fn inband_status_text(status: u8) -> String {
    let up = status & 1 != 0;
    let speed = match (status >> 1) & 3 {
        1 => 100,
        2 => 1000,
        _ => 10,
    };
    let full = (status >> 3) & 1 != 0;
    format!(
        "{}, {} duplex, {} Mbps",
        if up { "up" } else { "down" },
        if full { "full" } else { "half" },
        speed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(kind: SegmentType, data: &[u8]) -> EthernetFrameSegment {
        EthernetFrameSegment::new(kind, data.to_vec())
    }

    #[test]
    fn test_mac_text() {
        let mac = [0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22];
        assert_eq!(
            seg(SegmentType::DstMac, &mac).text(None),
            "To aa:bb:cc:00:11:22"
        );
        assert_eq!(
            seg(SegmentType::SrcMac, &mac).text(None),
            "From aa:bb:cc:00:11:22"
        );
        assert_eq!(
            seg(SegmentType::SrcMac, &mac[..3]).text(None),
            "[invalid src MAC length]"
        );
    }

    #[test]
    fn test_ethertype_text() {
        assert_eq!(
            seg(SegmentType::Ethertype, &[0x08, 0x00]).text(None),
            "Type: IPv4"
        );
        assert_eq!(
            seg(SegmentType::Ethertype, &[0x88, 0xf7]).text(None),
            "Type: PTP"
        );
        assert_eq!(
            seg(SegmentType::Ethertype, &[0x12, 0x34]).text(None),
            "Type: 0x1234"
        );
        let stp = seg(SegmentType::Payload, &[0x42]);
        assert_eq!(
            seg(SegmentType::Ethertype, &[0x00, 0x26]).text(Some(&stp)),
            "Type: STP"
        );
        assert_eq!(
            seg(SegmentType::Ethertype, &[0x00, 0x26]).text(None),
            "Type: LLC"
        );
    }

    #[test]
    fn test_vlan_text() {
        // PCP 3, DE clear, VID 100
        let tag = (3u16 << 13) | 100;
        assert_eq!(
            seg(SegmentType::VlanTag, &tag.to_be_bytes()).text(None),
            "VLAN 100, PCP 3"
        );
        let tag = tag | 0x1000;
        assert_eq!(
            seg(SegmentType::VlanTag, &tag.to_be_bytes()).text(None),
            "VLAN 100, PCP 3, DE"
        );
    }

    #[test]
    fn test_inband_status_text() {
        // up, 1000 Mbps, full duplex
        let status = 1 | (2 << 1) | (1 << 3);
        assert_eq!(
            seg(SegmentType::InbandStatus, &[status]).text(None),
            "up, full duplex, 1000 Mbps"
        );
        assert_eq!(
            seg(SegmentType::InbandStatus, &[0]).text(None),
            "down, half duplex, 10 Mbps"
        );
    }

    #[test]
    fn test_fcs_and_payload_text() {
        assert_eq!(
            seg(SegmentType::FcsGood, &[0x1a, 0x2b, 0x3c, 0x4d]).text(None),
            "CRC: 1a2b3c4d"
        );
        assert_eq!(seg(SegmentType::Payload, &[0x0f]).text(None), "0f ");
    }

    #[test]
    fn test_colors() {
        assert_eq!(seg(SegmentType::Sfd, &[]).color(), ProtocolColor::Preamble);
        assert_eq!(seg(SegmentType::DstMac, &[]).color(), ProtocolColor::Address);
        assert_eq!(seg(SegmentType::VlanTag, &[]).color(), ProtocolColor::Control);
        assert_eq!(seg(SegmentType::FcsBad, &[]).color(), ProtocolColor::ChecksumBad);
        assert_eq!(seg(SegmentType::LocalFault, &[]).color(), ProtocolColor::Error);
        assert_eq!(seg(SegmentType::Payload, &[]).color(), ProtocolColor::Data);
    }
}
