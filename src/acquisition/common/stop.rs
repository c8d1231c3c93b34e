use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared interrupt flag checked by the acquisition loop before every poll.
///
/// Clones share the same flag, so a `ctrlc` handler or the terminal display
/// can raise it while the loop owns its own copy.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Installs a process-wide Ctrl+C handler that raises this signal.
    pub fn install_ctrlc_handler(&self) -> std::result::Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.raise())
    }
}

#[cfg(test)]
mod tests {
    use super::StopSignal;

    #[test]
    fn test_clones_share_flag() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_raised());
        handle.raise();
        assert!(signal.is_raised());
    }
}
