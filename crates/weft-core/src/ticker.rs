//! Background epoch advancement.
//!
//! Instances turn their timeout into an epoch deadline of
//! `timeout / EPOCH_TICK` ticks. Those deadlines only mean anything while
//! something advances the engine epoch, which is what [`EpochTicker`] does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::SharedEngine;
use crate::error::{EngineError, EngineResult};

/// Interval between epoch increments.
pub const EPOCH_TICK: Duration = Duration::from_millis(10);

/// Advances the engine epoch every [`EPOCH_TICK`] on a background thread.
///
/// The thread stops when the ticker is dropped.
pub struct EpochTicker {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EpochTicker {
    /// Start ticking `engine`.
    pub fn start(engine: SharedEngine) -> EngineResult<Self> {
        if !engine.epoch_enabled() {
            return Err(EngineError::InvalidConfig(
                "epoch interruption is disabled".to_string(),
            ));
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("weft-epoch-ticker".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    thread::sleep(EPOCH_TICK);
                    engine.increment_epoch();
                }
            })
            .map_err(|e| EngineError::InvalidConfig(format!("cannot spawn epoch ticker: {e}")))?;

        info!(tick_ms = EPOCH_TICK.as_millis() as u64, "Started epoch ticker");

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Epoch ticker thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for EpochTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochTicker")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{IntoShared, WeftEngine};

    #[test]
    fn test_ticker_advances_epoch() {
        let engine = WeftEngine::new(EngineConfig::default()).unwrap().into_shared();
        let ticker = EpochTicker::start(engine.clone()).unwrap();

        thread::sleep(EPOCH_TICK * 10);
        drop(ticker);

        assert!(engine.current_epoch() > 0);
    }

    #[test]
    fn test_ticker_requires_epochs() {
        let engine = WeftEngine::new(EngineConfig::unmetered()).unwrap().into_shared();
        assert!(EpochTicker::start(engine).is_err());
    }
}
