//! Cooperative cancellation token.
//!
//! An [`Interrupt`] is a cheaply cloneable handle to one shared flag. The submitting side
//! keeps a clone and raises it; the evaluator checks it once per visited node and fails
//! with [`Error::Interrupted`](crate::Error::Interrupted) while it is raised. The flag
//! stays raised until explicitly cleared.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of any evaluation observing this token
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// True if both handles share the same flag
    pub fn same_token(&self, other: &Interrupt) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
