//! The registration conversation: states, sessions, validators and the
//! machine that drives them.

pub mod machine;
pub mod record;
pub mod session;
pub mod state;
pub mod validators;

pub use machine::{HandleOutcome, MachineConfig, RegistrationMachine};
pub use record::{RegistrationRecord, StoredRegistration};
pub use session::{RegistrationSession, SessionStore, spawn_prune_task};
pub use state::RegistrationState;
pub use validators::{AgeRange, PhoneNumber};
