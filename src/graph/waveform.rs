//! Waveform storage.
//!
//! A `Waveform<T>` is a sample buffer plus the timing metadata needed to
//! place each sample on the acquisition time axis. Uniform waveforms have
//! one sample per timebase tick; sparse waveforms carry an explicit offset
//! and duration per sample.
//!
//! All times are integer femtoseconds. Offsets and durations are in units
//! of `timescale`; `trigger_phase` shifts the whole waveform.

use crate::graph::nodes::ethernet::EthernetFrameSegment;
use chrono::{DateTime, Utc};

/// Sample placement.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// offset(i) = i, duration(i) = 1.
    Uniform,
    /// Per-sample offsets (non-decreasing) and durations.
    Sparse { offsets: Vec<i64>, durations: Vec<i64> },
}

/// Hints attached to a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaveformFlags {
    /// Front-end overranged somewhere in this capture.
    pub clipping: bool,
}

#[derive(Debug, Clone)]
pub struct Waveform<T> {
    /// Femtoseconds per offset unit.
    pub timescale: i64,
    /// Femtoseconds from the trigger to the start of sample 0.
    pub trigger_phase: i64,
    /// Capture start, whole seconds since the Unix epoch.
    pub start_timestamp: i64,
    /// Sub-second part of the capture start.
    pub start_femtoseconds: i64,
    pub flags: WaveformFlags,
    revision: u64,
    gpu_revision: Option<u64>,
    samples: Vec<T>,
    layout: Layout,
}

impl<T> Waveform<T> {
    pub fn new_uniform(timescale: i64) -> Self {
        Self::with_layout(timescale, Layout::Uniform)
    }

    pub fn new_sparse(timescale: i64) -> Self {
        Self::with_layout(
            timescale,
            Layout::Sparse {
                offsets: Vec::new(),
                durations: Vec::new(),
            },
        )
    }

    fn with_layout(timescale: i64, layout: Layout) -> Self {
        Self {
            timescale,
            trigger_phase: 0,
            start_timestamp: 0,
            start_femtoseconds: 0,
            flags: WaveformFlags::default(),
            revision: 1,
            gpu_revision: None,
            samples: Vec::new(),
            layout,
        }
    }

    /// Uniform waveform from existing samples.
    pub fn from_samples(timescale: i64, samples: Vec<T>) -> Self {
        let mut wf = Self::new_uniform(timescale);
        wf.samples = samples;
        wf
    }

    /// Copy timing metadata (not samples) from another waveform.
    pub fn copy_timing_from<U>(&mut self, other: &Waveform<U>) {
        self.timescale = other.timescale;
        self.trigger_phase = other.trigger_phase;
        self.start_timestamp = other.start_timestamp;
        self.start_femtoseconds = other.start_femtoseconds;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.layout, Layout::Sparse { .. })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Mutable access for in-place CPU processing. Callers must follow up
    /// with `mark_modified_from_cpu` before publishing.
    pub fn samples_mut(&mut self) -> &mut [T] {
        &mut self.samples
    }

    pub fn sample(&self, i: usize) -> Option<&T> {
        self.samples.get(i)
    }

    /// Append to a uniform waveform.
    pub fn push(&mut self, sample: T) {
        if let Layout::Sparse { offsets, durations } = &mut self.layout {
            let offset = offsets.last().zip(durations.last()).map_or(0, |(o, d)| o + d);
            offsets.push(offset);
            durations.push(1);
        }
        self.samples.push(sample);
    }

    /// Append to a sparse waveform. On a uniform waveform the timing is
    /// implied and the arguments are ignored.
    pub fn push_sparse(&mut self, offset: i64, duration: i64, sample: T) {
        if let Layout::Sparse { offsets, durations } = &mut self.layout {
            offsets.push(offset);
            durations.push(duration);
        }
        self.samples.push(sample);
    }

    /// Extend the duration of the last sample so it ends at `end` (offset units).
    pub fn stretch_last(&mut self, end: i64) {
        if let Layout::Sparse { offsets, durations } = &mut self.layout {
            if let (Some(o), Some(d)) = (offsets.last(), durations.last_mut()) {
                *d = (end - o).max(0);
            }
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        if let Layout::Sparse { offsets, durations } = &mut self.layout {
            offsets.clear();
            durations.clear();
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.samples.reserve(additional);
        if let Layout::Sparse { offsets, durations } = &mut self.layout {
            offsets.reserve(additional);
            durations.reserve(additional);
        }
    }

    /// Offset of sample `i` in timescale units.
    pub fn offset(&self, i: usize) -> i64 {
        match &self.layout {
            Layout::Uniform => i as i64,
            Layout::Sparse { offsets, .. } => offsets.get(i).copied().unwrap_or(0),
        }
    }

    /// Duration of sample `i` in timescale units.
    pub fn duration(&self, i: usize) -> i64 {
        match &self.layout {
            Layout::Uniform => 1,
            Layout::Sparse { durations, .. } => durations.get(i).copied().unwrap_or(0),
        }
    }

    /// Start of sample `i` in femtoseconds relative to the trigger.
    #[inline]
    pub fn offset_scaled(&self, i: usize) -> i64 {
        self.offset(i) * self.timescale + self.trigger_phase
    }

    #[inline]
    pub fn duration_scaled(&self, i: usize) -> i64 {
        self.duration(i) * self.timescale
    }

    #[inline]
    pub fn end_scaled(&self, i: usize) -> i64 {
        self.offset_scaled(i) + self.duration_scaled(i)
    }

    /// Wall-clock start of the capture.
    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        let nanos = (self.start_femtoseconds / 1_000_000).clamp(0, 999_999_999) as u32;
        DateTime::from_timestamp(self.start_timestamp, nanos)
    }

    /// Sparse arrays match the sample count and offsets never go backwards.
    pub fn is_consistent(&self) -> bool {
        match &self.layout {
            Layout::Uniform => true,
            Layout::Sparse { offsets, durations } => {
                offsets.len() == self.samples.len()
                    && durations.len() == self.samples.len()
                    && offsets.windows(2).all(|w| w[0] <= w[1])
            }
        }
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record that the CPU copy changed. Any GPU copy becomes stale.
    pub fn mark_modified_from_cpu(&mut self) {
        self.revision += 1;
    }

    /// Record that the GPU copy was refreshed from the CPU copy.
    pub fn mark_gpu_copy_current(&mut self) {
        self.gpu_revision = Some(self.revision);
    }

    pub fn gpu_copy_is_current(&self) -> bool {
        self.gpu_revision == Some(self.revision)
    }
}

/// Closed set of sample payloads carried between nodes.
#[derive(Debug, Clone)]
pub enum AnyWaveform {
    Analog(Waveform<f32>),
    Digital(Waveform<bool>),
    Bytes(Waveform<u8>),
    Ethernet(Waveform<EthernetFrameSegment>),
}

macro_rules! each_waveform {
    ($self:expr, $wf:ident => $body:expr) => {
        match $self {
            AnyWaveform::Analog($wf) => $body,
            AnyWaveform::Digital($wf) => $body,
            AnyWaveform::Bytes($wf) => $body,
            AnyWaveform::Ethernet($wf) => $body,
        }
    };
}

impl AnyWaveform {
    pub fn len(&self) -> usize {
        each_waveform!(self, wf => wf.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn timescale(&self) -> i64 {
        each_waveform!(self, wf => wf.timescale)
    }

    pub fn trigger_phase(&self) -> i64 {
        each_waveform!(self, wf => wf.trigger_phase)
    }

    pub fn revision(&self) -> u64 {
        each_waveform!(self, wf => wf.revision())
    }

    pub fn is_sparse(&self) -> bool {
        each_waveform!(self, wf => wf.is_sparse())
    }

    pub fn is_consistent(&self) -> bool {
        each_waveform!(self, wf => wf.is_consistent())
    }

    pub fn offset_scaled(&self, i: usize) -> i64 {
        each_waveform!(self, wf => wf.offset_scaled(i))
    }

    pub fn end_scaled(&self, i: usize) -> i64 {
        each_waveform!(self, wf => wf.end_scaled(i))
    }

    pub fn gpu_copy_is_current(&self) -> bool {
        each_waveform!(self, wf => wf.gpu_copy_is_current())
    }

    pub fn as_analog(&self) -> Option<&Waveform<f32>> {
        match self {
            AnyWaveform::Analog(wf) => Some(wf),
            _ => None,
        }
    }

    pub fn as_digital(&self) -> Option<&Waveform<bool>> {
        match self {
            AnyWaveform::Digital(wf) => Some(wf),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Waveform<u8>> {
        match self {
            AnyWaveform::Bytes(wf) => Some(wf),
            _ => None,
        }
    }

    pub fn as_ethernet(&self) -> Option<&Waveform<EthernetFrameSegment>> {
        match self {
            AnyWaveform::Ethernet(wf) => Some(wf),
            _ => None,
        }
    }
}

impl From<Waveform<f32>> for AnyWaveform {
    fn from(wf: Waveform<f32>) -> Self {
        AnyWaveform::Analog(wf)
    }
}

impl From<Waveform<bool>> for AnyWaveform {
    fn from(wf: Waveform<bool>) -> Self {
        AnyWaveform::Digital(wf)
    }
}

impl From<Waveform<u8>> for AnyWaveform {
    fn from(wf: Waveform<u8>) -> Self {
        AnyWaveform::Bytes(wf)
    }
}

impl From<Waveform<EthernetFrameSegment>> for AnyWaveform {
    fn from(wf: Waveform<EthernetFrameSegment>) -> Self {
        AnyWaveform::Ethernet(wf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uniform_timing() {
        let mut wf = Waveform::from_samples(1000, vec![0.0f32, 1.0, 2.0]);
        wf.trigger_phase = 250;
        assert_eq!(wf.offset(2), 2);
        assert_eq!(wf.duration(2), 1);
        assert_eq!(wf.offset_scaled(2), 2250);
        assert_eq!(wf.end_scaled(2), 3250);
        assert!(wf.is_consistent());
    }

    #[test]
    fn test_sparse_push() {
        let mut wf: Waveform<u8> = Waveform::new_sparse(10);
        wf.push_sparse(0, 4, 0x55);
        wf.push_sparse(4, 8, 0xd5);
        assert_eq!(wf.offset_scaled(1), 40);
        assert_eq!(wf.duration_scaled(1), 80);
        assert!(wf.is_consistent());

        wf.push_sparse(2, 1, 0x00);
        assert!(!wf.is_consistent());
    }

    #[test]
    fn test_revision_tracking() {
        let mut wf = Waveform::from_samples(1, vec![1.0f32]);
        assert!(!wf.gpu_copy_is_current());
        wf.mark_gpu_copy_current();
        assert!(wf.gpu_copy_is_current());

        wf.samples_mut()[0] = 2.0;
        wf.mark_modified_from_cpu();
        assert!(!wf.gpu_copy_is_current());
    }

    #[test]
    fn test_start_datetime() {
        let mut wf: Waveform<bool> = Waveform::new_uniform(1);
        wf.start_timestamp = 1_700_000_000;
        wf.start_femtoseconds = 500_000_000_000_000;
        let dt = wf.start_datetime().unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_any_waveform_accessors() {
        let any = AnyWaveform::from(Waveform::from_samples(5, vec![1u8, 2, 3]));
        assert_eq!(any.len(), 3);
        assert_eq!(any.timescale(), 5);
        assert!(any.as_bytes().is_some());
        assert!(any.as_analog().is_none());
    }

    proptest! {
        #[test]
        fn prop_sparse_stays_consistent(steps in prop::collection::vec((0i64..100, 1i64..50), 0..64)) {
            let mut wf: Waveform<u8> = Waveform::new_sparse(1);
            let mut offset = 0;
            for (gap, duration) in steps {
                offset += gap;
                wf.push_sparse(offset, duration, 0);
                offset += duration;
            }
            prop_assert!(wf.is_consistent());
        }
    }
}
