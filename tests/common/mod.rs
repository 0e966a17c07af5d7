//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use scopeflow::graph::nodes::ethernet::SegmentType;
use scopeflow::graph::AnyWaveform;
use std::sync::Arc;

/// Segment kinds of a decoder output, in order.
pub fn segment_kinds(output: Option<Arc<AnyWaveform>>) -> Vec<SegmentType> {
    output
        .as_deref()
        .and_then(AnyWaveform::as_ethernet)
        .map(|wf| wf.samples().iter().map(|s| s.kind).collect())
        .unwrap_or_default()
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
