//! # Audio Session Module
//!
//! The detector does not own any platform audio state. Whatever must be
//! configured before capture starts (an OS audio session, a device handle,
//! permissions) is reached through an [`AudioSession`] handed to the
//! detector at construction, so tests can substitute a fake.

/// Platform audio resources activated for the lifetime of a detection run.
pub trait AudioSession: Send + Sync {
    /// Called by `start()` before any sample is accepted.
    fn activate(&self) -> Result<(), String>;

    /// Called by `stop()` after analysis has been torn down.
    fn deactivate(&self);
}

/// Session for hosts with nothing to set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSession;

impl AudioSession for NullSession {
    fn activate(&self) -> Result<(), String> {
        Ok(())
    }

    fn deactivate(&self) {}
}
