//! In-memory producer backends for tests and benchmarks
//!
//! [`ProducerImage`] lays out the bytes iRacing would publish: header, buffer
//! descriptors, variable table, session info and buffer payloads.
//! [`MemorySegment`] and [`ScriptedEvent`] implement the shared-memory traits
//! over it so the reader and polling loop can run on any platform.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::schema::header::{HEADER_SIZE, IRSDK_MAX_BUFS, IRSDK_VER, TelemetryHeader};
use crate::schema::variables::{IRSDK_MAX_DESC, IRSDK_MAX_STRING, VAR_HEADER_SIZE};
use crate::shm::{DataEvent, SharedSegment, WaitResult, check_range};
use crate::{Result, TelemetryError};

/// Where the variable table goes unless [`ProducerImage::var_header_offset`] moves it.
pub const DEFAULT_VAR_HEADER_OFFSET: usize = 512;

/// Builder for a producer-side segment image.
///
/// The segment grows past the requested size when the variable table, the
/// session info string or a [`fill`](Self::fill) would not fit.
#[derive(Debug, Clone)]
pub struct ProducerImage {
    size: usize,
    version: i32,
    status: i32,
    tick_rate: i32,
    session_info_update: i32,
    session_info: Option<String>,
    var_header_offset: usize,
    buf_len: i32,
    buffers: Vec<(i32, i32)>,
    variables: Vec<[u8; VAR_HEADER_SIZE]>,
    fills: Vec<(usize, Vec<u8>)>,
}

impl ProducerImage {
    /// Connected, version 2, 60 Hz producer with no buffers or variables.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            version: IRSDK_VER,
            status: 1,
            tick_rate: 60,
            session_info_update: 0,
            session_info: None,
            var_header_offset: DEFAULT_VAR_HEADER_OFFSET,
            buf_len: 0,
            buffers: Vec::new(),
            variables: Vec::new(),
            fills: Vec::new(),
        }
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn tick_rate(mut self, tick_rate: i32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn buffer_len(mut self, buf_len: i32) -> Self {
        self.buf_len = buf_len;
        self
    }

    /// Append a buffer descriptor. Extra descriptors past four are ignored.
    pub fn buffer(mut self, tick_count: i32, buffer_offset: i32) -> Self {
        if self.buffers.len() < IRSDK_MAX_BUFS {
            self.buffers.push((tick_count, buffer_offset));
        }
        self
    }

    pub fn var_header_offset(mut self, offset: usize) -> Self {
        self.var_header_offset = offset;
        self
    }

    pub fn variable(self, name: &str, type_tag: i32, offset: i32, count: i32) -> Self {
        self.variable_with_meta(name, type_tag, offset, count, "", "")
    }

    pub fn variable_with_meta(
        self,
        name: &str,
        type_tag: i32,
        offset: i32,
        count: i32,
        description: &str,
        unit: &str,
    ) -> Self {
        let mut name_bytes = [0u8; IRSDK_MAX_STRING];
        copy_truncated(&mut name_bytes, name.as_bytes());
        self.entry(name_bytes, type_tag, offset, count, description, unit)
    }

    /// Append a table entry with the name field exactly as given.
    pub fn raw_variable_name(
        self,
        name: [u8; IRSDK_MAX_STRING],
        type_tag: i32,
        offset: i32,
        count: i32,
    ) -> Self {
        self.entry(name, type_tag, offset, count, "", "")
    }

    pub fn session_info(mut self, yaml: &str) -> Self {
        self.session_info = Some(yaml.to_string());
        self
    }

    pub fn session_info_update(mut self, update: i32) -> Self {
        self.session_info_update = update;
        self
    }

    /// Write raw bytes at `offset` after everything else is laid out.
    pub fn fill(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.fills.push((offset, bytes.to_vec()));
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let table_len = self.variables.len() * VAR_HEADER_SIZE;
        let session_offset = self.var_header_offset + table_len;
        let session_bytes = self.session_info.as_ref().map(|yaml| {
            let mut bytes = yaml.as_bytes().to_vec();
            bytes.push(0);
            bytes
        });
        let session_len = session_bytes.as_ref().map_or(0, Vec::len);

        let mut size = self.size.max(HEADER_SIZE).max(session_offset + session_len);
        for (offset, bytes) in &self.fills {
            size = size.max(offset + bytes.len());
        }
        let mut image = vec![0u8; size];

        let fields = [
            self.version,
            self.status,
            self.tick_rate,
            self.session_info_update,
            session_len as i32,
            if session_len > 0 { session_offset as i32 } else { 0 },
            self.variables.len() as i32,
            self.var_header_offset as i32,
            self.buffers.len() as i32,
            self.buf_len,
        ];
        for (index, value) in fields.iter().enumerate() {
            put_i32(&mut image, index * 4, *value);
        }
        for (index, &(tick_count, buffer_offset)) in self.buffers.iter().enumerate() {
            let at = TelemetryHeader::tick_count_offset(index);
            put_i32(&mut image, at, tick_count);
            put_i32(&mut image, at + 4, buffer_offset);
        }

        for (index, entry) in self.variables.iter().enumerate() {
            let at = self.var_header_offset + index * VAR_HEADER_SIZE;
            image[at..at + VAR_HEADER_SIZE].copy_from_slice(entry);
        }
        if let Some(bytes) = session_bytes {
            image[session_offset..session_offset + bytes.len()].copy_from_slice(&bytes);
        }
        for (offset, bytes) in self.fills {
            image[offset..offset + bytes.len()].copy_from_slice(&bytes);
        }

        image
    }

    pub fn into_segment(self) -> MemorySegment {
        MemorySegment::new(self.into_bytes())
    }

    fn entry(
        mut self,
        name: [u8; IRSDK_MAX_STRING],
        type_tag: i32,
        offset: i32,
        count: i32,
        description: &str,
        unit: &str,
    ) -> Self {
        let mut entry = [0u8; VAR_HEADER_SIZE];
        put_i32(&mut entry, 0, type_tag);
        put_i32(&mut entry, 4, offset);
        put_i32(&mut entry, 8, count);
        entry[16..16 + IRSDK_MAX_STRING].copy_from_slice(&name);
        copy_truncated(&mut entry[48..48 + IRSDK_MAX_DESC], description.as_bytes());
        copy_truncated(&mut entry[112..112 + IRSDK_MAX_STRING], unit.as_bytes());
        self.variables.push(entry);
        self
    }
}

fn put_i32(bytes: &mut [u8], offset: usize, value: i32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Copy `src` into `dst`, leaving at least one trailing NUL.
fn copy_truncated(dst: &mut [u8], src: &[u8]) {
    let len = src.len().min(dst.len().saturating_sub(1));
    dst[..len].copy_from_slice(&src[..len]);
}

/// Counts effective `close` calls on a test backend.
#[derive(Debug, Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Segment over a shared byte vector.
///
/// A [`SegmentWriter`] obtained from [`writer`](Self::writer) plays the
/// producer while the segment is owned by a polling loop.
#[derive(Debug)]
pub struct MemorySegment {
    bytes: Arc<Mutex<Vec<u8>>>,
    closes: CloseCounter,
    closed: bool,
}

impl MemorySegment {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: Arc::new(Mutex::new(bytes)), closes: CloseCounter::default(), closed: false }
    }

    pub fn writer(&self) -> SegmentWriter {
        SegmentWriter { bytes: Arc::clone(&self.bytes), closes: self.closes.clone() }
    }

    pub fn closes(&self) -> CloseCounter {
        self.closes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SharedSegment for MemorySegment {
    fn size(&self) -> usize {
        self.lock().len()
    }

    fn read_at(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        let bytes = self.lock();
        check_range(offset, length, bytes.len())?;
        Ok(bytes[offset..offset + length].to_vec())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.record();
        }
    }
}

/// Producer-side handle onto a [`MemorySegment`].
#[derive(Debug, Clone)]
pub struct SegmentWriter {
    bytes: Arc<Mutex<Vec<u8>>>,
    closes: CloseCounter,
}

impl SegmentWriter {
    pub fn write(&self, offset: usize, data: &[u8]) {
        let mut bytes = self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn set_status(&self, status: i32) {
        self.write(4, &status.to_le_bytes());
    }

    pub fn set_session_info_update(&self, update: i32) {
        self.write(12, &update.to_le_bytes());
    }

    pub fn set_tick(&self, index: usize, tick_count: i32) {
        self.write(TelemetryHeader::tick_count_offset(index), &tick_count.to_le_bytes());
    }

    pub fn closes(&self) -> CloseCounter {
        self.closes.clone()
    }
}

/// Scripted wait outcome for [`ScriptedEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedWait {
    Signaled,
    Timeout,
    Error,
}

/// Data-valid event that replays a queue of outcomes.
///
/// Once the queue is empty every wait returns the fallback outcome.
#[derive(Debug)]
pub struct ScriptedEvent {
    script: Mutex<VecDeque<ScriptedWait>>,
    fallback: ScriptedWait,
    waits: AtomicUsize,
    closes: CloseCounter,
    closed: bool,
}

impl ScriptedEvent {
    /// Event that signals whenever nothing else is scripted.
    pub fn signaled() -> Self {
        Self::with_fallback(ScriptedWait::Signaled)
    }

    /// Event that never signals.
    pub fn timing_out() -> Self {
        Self::with_fallback(ScriptedWait::Timeout)
    }

    fn with_fallback(fallback: ScriptedWait) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            waits: AtomicUsize::new(0),
            closes: CloseCounter::default(),
            closed: false,
        }
    }

    pub fn then_timeout(self) -> Self {
        self.then(ScriptedWait::Timeout)
    }

    pub fn then_error(self) -> Self {
        self.then(ScriptedWait::Error)
    }

    pub fn then(self, outcome: ScriptedWait) -> Self {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push_back(outcome);
        self
    }

    /// Number of waits performed so far.
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> CloseCounter {
        self.closes.clone()
    }
}

#[async_trait::async_trait]
impl DataEvent for ScriptedEvent {
    async fn wait(&self, _timeout: Duration) -> Result<WaitResult> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(self.fallback);

        match outcome {
            ScriptedWait::Signaled => Ok(WaitResult::Signaled),
            ScriptedWait::Timeout => Ok(WaitResult::Timeout),
            ScriptedWait::Error => Err(TelemetryError::connection_failed("scripted wait failure")),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.record();
        }
    }
}
