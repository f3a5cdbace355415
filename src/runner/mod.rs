pub mod events;
pub mod executor;
pub mod resolver;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use events::*;
pub use executor::ReplayExecutor;
pub use resolver::{LocatorResolver, ResolverConfig};
pub use state::*;

/// Cooperative cancellation flag shared between a replay and its caller
///
/// The executor polls it between steps only, so a cancelled replay always
/// leaves the page after some whole prefix of steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a stale request before the next run
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
