//! Metrics and structured logs emitted by the pacer.

mod adaptive_pacing;

pub use adaptive_pacing::*;

/// An event that records metrics and logs about itself when emitted.
pub trait InternalEvent: Sized {
    fn emit(self);
}

pub(crate) fn emit(event: impl InternalEvent) {
    event.emit();
}
