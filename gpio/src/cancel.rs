use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative stop request shared between the scan loop and whoever wants it to end.
///
/// Clones share the same flag. Setting it is a single atomic store, so it is safe to do from a
/// signal handler.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_the_flag() {
        let token = StopToken::new();
        let other = token.clone();
        assert!(!token.is_stopped());
        other.stop();
        assert!(token.is_stopped());
        assert!(other.is_stopped());
    }

    #[test]
    fn stop_from_another_thread() {
        let token = StopToken::new();
        let handle = {
            let token = token.clone();
            thread::spawn(move || token.stop())
        };
        handle.join().unwrap();
        assert!(token.is_stopped());
    }
}
