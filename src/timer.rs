use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use criterion::{
    measurement::{Measurement, ValueFormatter},
    Throughput,
};
use wgpu::QuerySet;

use crate::{BenchError, GPUHandle, Result};

pub const MAX_QUERIES: u32 = 4096;

lazy_static::lazy_static! {
    static ref EPOCH: Instant = Instant::now();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    Host,
    Device,
}

impl std::fmt::Display for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Clock::Host => write!(f, "host"),
            Clock::Device => write!(f, "device"),
        }
    }
}

/// Start and end of one phase, in nanoseconds on `clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub clock: Clock,
    pub start_ns: u64,
    pub end_ns: u64,
}

impl TimingSample {
    /// Offsets are taken from a process-wide epoch. A `start` earlier than
    /// the epoch clamps to 0, the elapsed time is kept exact.
    pub fn host(start: Instant, end: Instant) -> Self {
        let start_ns = start.saturating_duration_since(*EPOCH).as_nanos() as u64;
        let elapsed = end.saturating_duration_since(start).as_nanos() as u64;
        Self {
            clock: Clock::Host,
            start_ns,
            end_ns: start_ns + elapsed,
        }
    }

    /// Raw timestamp ticks scaled by the queue's timestamp period.
    pub fn device(start_ticks: u64, end_ticks: u64, period_ns: f32) -> Self {
        let scale = |ticks: u64| (ticks as f64 * period_ns as f64) as u64;
        Self {
            clock: Clock::Device,
            start_ns: scale(start_ticks),
            end_ns: scale(end_ticks),
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.end_ns.saturating_sub(self.start_ns))
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1e3
    }
}

/// Runs `f` and brackets it with host timestamps.
pub fn time_host<T>(f: impl FnOnce() -> T) -> (T, TimingSample) {
    let start = Instant::now();
    let out = f();
    let end = Instant::now();
    (out, TimingSample::host(start, end))
}

/// Start and end index in the counter sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPair {
    pub start: u32,
    pub end: u32,
}

impl QueryPair {
    pub fn first() -> Self {
        Self { start: 0, end: 1 }
    }

    pub fn size(&self) -> wgpu::BufferAddress {
        ((self.end - self.start + 1) as usize * std::mem::size_of::<u64>()) as wgpu::BufferAddress
    }

}

impl From<QueryPair> for Range<u32> {
    fn from(val: QueryPair) -> Self {
        val.start..val.end + 1
    }
}

/// Sums `end - start` over consecutive timestamp pairs.
pub fn hardware_elapsed(timestamps: &[u64]) -> u64 {
    timestamps
        .chunks_exact(2)
        .map(|pair| pair[1].saturating_sub(pair[0]))
        .sum()
}

/// # WgpuTimer
///
/// Device-side timestamps written at the beginning and end of each compute
/// pass. Every pass consumes one [`QueryPair`].
pub struct WgpuTimer {
    handle: GPUHandle,
    query_set: QuerySet,
    resolve_buffer: wgpu::Buffer,
    destination_buffer: wgpu::Buffer,
    current_start: AtomicU32,
}

impl std::fmt::Debug for WgpuTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuTimer")
            .field("current_query", &self.current_query())
            .finish()
    }
}

impl WgpuTimer {
    /// `None` when the device was created without timestamp support.
    pub fn new(handle: GPUHandle) -> Option<Self> {
        if !handle.supports_timestamps() {
            return None;
        }
        let query_set = handle.device().create_query_set(&wgpu::QuerySetDescriptor {
            count: MAX_QUERIES,
            ty: wgpu::QueryType::Timestamp,
            label: Some("timestamps"),
        });

        let size = MAX_QUERIES as u64 * std::mem::size_of::<u64>() as u64;

        let resolve_buffer = handle.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("timestamps-resolve"),
            size,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::QUERY_RESOLVE,
            mapped_at_creation: false,
        });

        let destination_buffer = handle.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("timestamps-readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Some(Self {
            handle,
            query_set,
            resolve_buffer,
            destination_buffer,
            current_start: AtomicU32::new(0),
        })
    }

    pub fn handle(&self) -> &GPUHandle {
        &self.handle
    }

    pub fn current_query(&self) -> QueryPair {
        let start = self.current_start.load(Ordering::Relaxed);
        QueryPair {
            start,
            end: start + 1,
        }
    }

    pub fn increment_query(&self) {
        let pair = self.current_query();
        if pair.end + 2 >= MAX_QUERIES {
            panic!("Number of queries exceeds MAX_QUERIES, reduce duration of benchmark");
        }
        self.current_start.store(pair.start + 2, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.current_start.store(0, Ordering::Relaxed);
    }

    //Fetches the current query as ComputePassTimestampWrites
    pub fn timestamp_writes(&self) -> wgpu::ComputePassTimestampWrites {
        let pair = self.current_query();
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(pair.start),
            end_of_pass_write_index: Some(pair.end),
        }
    }

    /// Resolves `pass_query` and blocks until the raw ticks are on the host.
    pub fn read_ticks(&self, pass_query: QueryPair) -> Result<Vec<u64>> {
        let mut encoder = self
            .handle
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        log::debug!("Resolving timestamp queries {:?}", pass_query);
        encoder.resolve_query_set(&self.query_set, pass_query.into(), &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &self.resolve_buffer,
            0,
            &self.destination_buffer,
            0,
            pass_query.size(),
        );
        self.handle.queue().submit(Some(encoder.finish()));

        let slice = self.destination_buffer.slice(..pass_query.size());
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.handle.device().poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| BenchError::Timestamp(e.to_string()))?
            .map_err(|e| BenchError::Timestamp(e.to_string()))?;

        let timestamps: Vec<u64> = {
            let timestamp_view = slice.get_mapped_range();
            bytemuck::cast_slice(&timestamp_view).to_vec()
        };
        self.destination_buffer.unmap();
        log::debug!("Timestamps: {:?}", timestamps);
        Ok(timestamps)
    }

    /// Single-shot sample for the pass that used the first query pair.
    pub fn sample(&self) -> Result<TimingSample> {
        let ticks = self.read_ticks(QueryPair::first())?;
        self.reset();
        match ticks.as_slice() {
            [start, end, ..] => Ok(TimingSample::device(
                *start,
                *end,
                self.handle.queue().get_timestamp_period(),
            )),
            _ => Err(BenchError::Timestamp(format!(
                "expected 2 timestamps, got {}",
                ticks.len()
            ))),
        }
    }
}

impl Measurement for &WgpuTimer {
    type Intermediate = u32; // Index of the start query

    type Value = u64; // Raw unscaled GPU counter
                      // Must be multiplied by the timestamp period to get nanoseconds

    fn start(&self) -> Self::Intermediate {
        log::trace!("Query at start of pass: {:?}", self.current_query());
        0
    }

    fn end(&self, start_index: Self::Intermediate) -> Self::Value {
        log::trace!("Query at end of pass: {:?}", self.current_query());
        //Large window, eg 0..512
        let pass_query = QueryPair {
            start: start_index,
            end: self.current_query().end - 2, //decrement here to counteract last iter
        };
        let timestamps = match self.read_ticks(pass_query) {
            Ok(t) => t,
            Err(e) => panic!("Failed to read timestamps: {}", e),
        };
        self.reset();
        hardware_elapsed(&timestamps)
    }

    fn add(&self, v1: &Self::Value, v2: &Self::Value) -> Self::Value {
        v1 + v2
    }

    fn zero(&self) -> Self::Value {
        0
    }

    fn to_f64(&self, value: &Self::Value) -> f64 {
        (self.handle.queue().get_timestamp_period() as f64) * (*value as f64)
    }

    fn formatter(&self) -> &dyn ValueFormatter {
        &WgpuTimerFormatter
    }
}

struct WgpuTimerFormatter;

impl ValueFormatter for WgpuTimerFormatter {
    fn format_value(&self, value: f64) -> String {
        format!("{:.4} ns", value)
    }

    fn format_throughput(&self, throughput: &Throughput, value: f64) -> String {
        match throughput {
            Throughput::Bytes(b) => format!(
                "{:.4} GiB/s",
                (*b as f64) / (1024.0 * 1024.0 * 1024.0) / (value * 1e-9)
            ),
            Throughput::Elements(e) => format!("{:.4} GFLOP/s", (*e as f64) / (value * 1e-9)),
            _ => unreachable!(),
        }
    }

    fn scale_values(&self, _typical_value: f64, _values: &mut [f64]) -> &'static str {
        "ns"
    }

    fn scale_throughputs(
        &self,
        _typical_value: f64,
        throughput: &Throughput,
        _values: &mut [f64],
    ) -> &'static str {
        match throughput {
            Throughput::Bytes(_) => "GiB/s",
            Throughput::Elements(_) => "elements/s",
            _ => unreachable!(),
        }
    }

    fn scale_for_machines(&self, _values: &mut [f64]) -> &'static str {
        "ns"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn pair_size() {
        let query = QueryPair::first();
        assert_eq!(query.size(), 16);
        assert_eq!(Range::<u32>::from(query), 0..2);
    }

    #[test]
    pub fn device_sample_scales_ticks() {
        let sample = TimingSample::device(1_000, 3_000, 2.0);
        assert_eq!(sample.clock, Clock::Device);
        assert_eq!(sample.elapsed(), Duration::from_nanos(4_000));
        assert!((sample.elapsed_ms() - 0.004).abs() < 1e-12);
    }

    #[test]
    pub fn host_sample_is_monotonic() {
        let ((), sample) = time_host(|| std::thread::sleep(Duration::from_millis(2)));
        assert_eq!(sample.clock, Clock::Host);
        assert!(sample.end_ns >= sample.start_ns);
        assert!(sample.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    pub fn reversed_sample_saturates() {
        let sample = TimingSample::device(10, 5, 1.0);
        assert_eq!(sample.elapsed(), Duration::ZERO);
    }

    #[test]
    pub fn elapsed_over_pairs() {
        assert_eq!(hardware_elapsed(&[10, 15, 100, 130]), 35);
        assert_eq!(hardware_elapsed(&[]), 0);
    }
}
