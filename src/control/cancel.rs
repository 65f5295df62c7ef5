use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag checked by every polling loop.
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken{
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken{
    pub fn new() -> Self{
        Self::default()
    }

    pub fn cancel(&self){
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool{
        self.cancelled.load(Ordering::SeqCst)
    }
}
