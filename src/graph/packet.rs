//! Packets emitted by protocol decoders.
//!
//! A decoder produces two views of the same traffic: a sparse waveform of
//! segments for drawing on the time axis, and a list of `Packet`s for a
//! tabular protocol analyzer view. Packets are rebuilt on every refresh.

use std::collections::BTreeMap;

/// Standard palette shared by all protocol decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolColor {
    Data,
    Control,
    Address,
    Preamble,
    ChecksumOk,
    ChecksumBad,
    Error,
    Idle,
}

impl ProtocolColor {
    pub fn hex(self) -> &'static str {
        match self {
            ProtocolColor::Data => "#336699",
            ProtocolColor::Control => "#c000a0",
            ProtocolColor::Address => "#ffff00",
            ProtocolColor::Preamble => "#808080",
            ProtocolColor::ChecksumOk => "#00ff00",
            ProtocolColor::ChecksumBad => "#ff0000",
            ProtocolColor::Error => "#ff0000",
            ProtocolColor::Idle => "#404040",
        }
    }
}

pub const WHITE: &str = "#ffffff";
pub const BLACK: &str = "#000000";

/// One decoded protocol unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Start, femtoseconds from the trigger.
    pub offset: i64,
    /// Length in femtoseconds.
    pub len: i64,
    pub data: Vec<u8>,
    pub headers: BTreeMap<String, String>,
    pub display_foreground: String,
    pub display_background: String,
}

impl Packet {
    pub fn new(offset: i64) -> Self {
        Self {
            offset,
            len: 0,
            data: Vec::new(),
            headers: BTreeMap::new(),
            display_foreground: BLACK.to_string(),
            display_background: ProtocolColor::Data.hex().to_string(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_string(), value.into());
    }

    pub fn set_colors(&mut self, background: &str, foreground: &str) {
        self.display_background = background.to_string();
        self.display_foreground = foreground.to_string();
    }
}

/// Implemented by nodes that emit packets.
pub trait PacketDecoder {
    /// Column names of the packet table, in display order.
    fn headers(&self) -> &'static [&'static str];

    fn packets(&self) -> &[Packet];

    fn clear_packets(&mut self);
}
