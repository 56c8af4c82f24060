//! Bounded hand-off of finished records from the decoder to the aggregator.
//!
//! The channel only smooths out rate differences between the two sides:
//! a full channel blocks the producer, an empty one blocks the consumer,
//! and closing the sender is the consumer's only termination signal.

use super::record::Record;
use crate::utils::error::DecodeError;
use std::sync::mpsc::{self, Receiver, SyncSender};

/// Destination of finished records
pub trait RecordSink {
    /// Hand over one closed record
    fn emit(&mut self, record: Record) -> Result<(), DecodeError>;

    /// Signal that no more records follow
    fn close(&mut self) {}
}

impl RecordSink for Vec<Record> {
    fn emit(&mut self, record: Record) -> Result<(), DecodeError> {
        self.push(record);
        Ok(())
    }
}

/// Producer half of a record stream
#[derive(Debug)]
pub struct RecordSender {
    inner: Option<SyncSender<Record>>,
}

/// Consumer half of a record stream
#[derive(Debug)]
pub struct RecordReceiver {
    inner: Receiver<Record>,
}

/// Create a record stream buffering at most `capacity` records
///
/// **Public** - one stream per analysis; streams are never shared
pub fn record_stream(capacity: usize) -> (RecordSender, RecordReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (RecordSender { inner: Some(tx) }, RecordReceiver { inner: rx })
}

impl RecordSender {
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl RecordSink for RecordSender {
    /// Blocks while the stream is full
    fn emit(&mut self, record: Record) -> Result<(), DecodeError> {
        let tx = self.inner.as_ref().ok_or(DecodeError::StreamClosed)?;
        tx.send(record).map_err(|_| DecodeError::StreamClosed)
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

impl RecordReceiver {
    /// Wait for the next record; `None` once the sender is closed and drained
    pub fn recv(&self) -> Option<Record> {
        self.inner.recv().ok()
    }
}

impl Iterator for RecordReceiver {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.recv()
    }
}
