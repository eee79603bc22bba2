//! In-process signals between the runtime and input components

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Shared "all inputs valid" flag.
///
/// The validation pass sets it before broadcasting [`Signal::ValidateInputs`];
/// any listener may clear it. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct ValidityFlag(Arc<AtomicBool>);

impl ValidityFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn reset(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn invalidate(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_valid(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for ValidityFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum Signal {
    /// Ask every mounted input to validate itself
    ValidateInputs { flag: ValidityFlag },
    /// A validation pass finished
    ValidationSettled { valid: bool },
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::ValidateInputs { .. } => "validate-inputs",
            Signal::ValidationSettled { .. } => "validation-settled",
        }
    }
}

pub trait SignalBus: Send + Sync {
    fn emit(&self, signal: &Signal);
}

pub type Listener = Arc<dyn Fn(&Signal) + Send + Sync>;

/// Synchronous fan-out bus; listeners run in subscription order
#[derive(Default, Clone)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(Arc::new(listener)),
            Err(poisoned) => poisoned.into_inner().push(Arc::new(listener)),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }
}

impl SignalBus for EventBus {
    fn emit(&self, signal: &Signal) {
        // Snapshot so a listener may subscribe while being notified
        let listeners: Vec<Listener> = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        log::trace!("emit {} to {} listeners", signal.name(), listeners.len());
        for listener in listeners {
            listener(signal);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_listener_can_clear_flag() {
        let bus = EventBus::new();
        bus.subscribe(|signal| {
            if let Signal::ValidateInputs { flag } = signal {
                flag.invalidate();
            }
        });

        let flag = ValidityFlag::new();
        bus.emit(&Signal::ValidateInputs { flag: flag.clone() });
        assert!(!flag.is_valid());
        flag.reset();
        assert!(flag.is_valid());
    }

    #[test]
    fn test_every_listener_is_notified() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            bus.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit(&Signal::ValidationSettled { valid: true });
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(bus.listener_count(), 3);
    }
}
