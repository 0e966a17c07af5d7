//! scopeflow demo binary
//!
//! Usage: `scopeflow [engine.toml]`
//!
//! Builds a byte channel feeding an Ethernet decoder, pushes one synthetic
//! frame through the engine thread and logs the decoded packets.

use scopeflow::graph::nodes::ethernet::crc32;
use scopeflow::graph::nodes::{AcquisitionChannel, EthernetDecoder};
use scopeflow::graph::packet::PacketDecoder;
use scopeflow::graph::{AnyWaveform, ChannelKind, QueueHandle, StreamType, Unit, Waveform};
use scopeflow::error::ResultExt;
use scopeflow::{Engine, EngineConfig, FlowGraph, GraphEvent};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// One byte per 8 ns, as on a gigabit GMII bus.
const BYTE_TIME_FS: i64 = 8_000_000;

fn main() -> scopeflow::Result<()> {
    let config_path = std::env::args().nth(1);
    let loaded = config_path.as_deref().map(EngineConfig::load);
    let config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => EngineConfig::default(),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(Err(e)) = &loaded {
        tracing::warn!("Failed to load engine config, using defaults: {}", e);
    }
    tracing::info!("Starting scopeflow demo");

    let mut graph = if config.gpu_enabled {
        FlowGraph::with_gpu(QueueHandle::new(config.queue_family))
    } else {
        FlowGraph::new()
    };
    let rx = graph.add_node(AcquisitionChannel::new(
        "RX",
        None,
        ChannelKind::DigitalInput,
        StreamType::DigitalBus,
        Unit::HexNumber,
    ));
    let decoder = graph.add_node(EthernetDecoder::new());
    graph.connect(rx, 0, decoder, 0).context("Wiring demo graph")?;

    let (bridge, handle) = Engine::spawn(graph, config)?;
    bridge.ingest(rx, 0, AnyWaveform::Bytes(Waveform::from_samples(BYTE_TIME_FS, demo_frame())));
    bridge.run_cycle(false);

    while let Some(event) = bridge.recv() {
        match event {
            GraphEvent::CycleComplete(report) => {
                tracing::info!("Cycle {:?} refreshed {} node(s)", report.cycle, report.refreshed.len());
                bridge.shutdown();
            }
            GraphEvent::WiringRejected { node, input, reason } => {
                tracing::warn!("Wiring rejected on {:?} input {}: {}", node, input, reason);
            }
            GraphEvent::Shutdown => break,
        }
    }

    let graph = handle
        .join()
        .map_err(|_| scopeflow::ScopeFlowError::Channel("Engine thread panicked".to_string()))?;

    if let Some(eth) = graph.node(decoder)?.as_ethernet() {
        for packet in eth.packets() {
            let headers: Vec<String> = eth
                .headers()
                .iter()
                .filter_map(|h| packet.header(h).map(|v| format!("{}={}", h, v)))
                .collect();
            tracing::info!(
                "Packet @{} fs, {} payload bytes, {} [{}]",
                packet.offset,
                packet.data.len(),
                headers.join(" "),
                packet.display_background
            );
        }
    }
    if let Some(AnyWaveform::Ethernet(segments)) = graph.output(decoder, 0).as_deref() {
        for i in 0..segments.len() {
            tracing::debug!("{:>12} fs  {}", segments.offset_scaled(i), segments.text(i));
        }
    }

    Ok(())
}

/// Minimum-size broadcast IPv4 frame with a valid FCS.
fn demo_frame() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0xff; 6]);
    body.extend_from_slice(&[0x02, 0x00, 0x5e, 0x10, 0x20, 0x30]);
    body.extend_from_slice(&0x0800u16.to_be_bytes());
    body.extend((0..46u8).map(|b| b.wrapping_mul(7)));

    let mut wire = vec![0x55; 7];
    wire.push(0xd5);
    wire.extend_from_slice(&body);
    wire.extend_from_slice(&crc32(&body).to_le_bytes());
    wire
}
