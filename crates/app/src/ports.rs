//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the reactive core and the outside world.
//! They are defined here (in `app`) so that both the core and the adapter
//! layer can depend on them without creating circular dependencies.

pub mod clock;
pub mod dispatcher;
pub mod storage;

pub use clock::{Clock, SystemClock};
pub use dispatcher::{ActionDispatcher, ExecutionContext};
pub use storage::PersistentVariableStorage;
