use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::LedBus;
use crate::error::{StripError, StripResult};

#[derive(Debug, Clone)]
pub struct Transfer {
    pub at: Instant,
    pub bytes: Vec<u8>,
}

/// In-memory bus that records every transfer
#[derive(Clone, Default)]
pub struct RecordingBus {
    transfers: Arc<Mutex<Vec<Transfer>>>,
    failures: Arc<Mutex<usize>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` transfers fail
    pub fn fail_next(&self, count: usize) {
        *self.failures.lock().unwrap() = count;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().unwrap().clone()
    }

    /// Transfers that carry frame data, skipping single-byte latches
    pub fn frames(&self) -> Vec<Transfer> {
        self.transfers()
            .into_iter()
            .filter(|t| t.bytes.len() > 1)
            .collect()
    }
}

impl LedBus for RecordingBus {
    fn transfer(&mut self, bytes: &[u8]) -> StripResult<()> {
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(StripError::bus("injected failure"));
            }
        }
        self.transfers.lock().unwrap().push(Transfer {
            at: Instant::now(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}
