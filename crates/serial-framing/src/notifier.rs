//! Completion callback

use std::fmt;

/// Callback fired after a poll that completed at least one frame
pub type CompletionCallback = Box<dyn FnMut() + Send>;

/// Holds the single user-settable completion callback
#[derive(Default)]
pub struct CompletionNotifier {
    callback: Option<CompletionCallback>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, replacing any previous one
    pub fn set<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear(&mut self) {
        self.callback = None;
    }

    pub fn is_set(&self) -> bool {
        self.callback.is_some()
    }

    /// Invoke the callback if `completed` frames is non-zero
    pub fn notify(&mut self, completed: usize) -> bool {
        match self.callback.as_mut() {
            Some(callback) if completed > 0 => {
                callback();
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("is_set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fires_only_on_completion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut notifier = CompletionNotifier::new();
        notifier.set(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!notifier.notify(0));
        assert!(notifier.notify(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        notifier.clear();
        assert!(!notifier.notify(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
