//! Sticky PPE compliance tracking per identity.

mod ppe;
mod state;

pub use ppe::{Observations, PpeStates};
pub use state::{ComplianceState, RawObservation, UnknownStatus};
