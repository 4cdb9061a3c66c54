//! # screenstate-app
//!
//! Application layer — the reactive core and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `PersistentVariableStorage` — durable mirror of the variable store
//!   - `ActionDispatcher` — executes actions emitted by fired triggers
//!   - `Clock` — time source for TTLs and guard windows
//! - Provide the **use-cases**:
//!   - `VariableStore` — scoped, TTL-bound state with a change signal and
//!     periodic reconciliation
//!   - `ConditionEvaluator` — resolves and evaluates trigger conditions
//!   - `TriggerEngine` — fires triggers on variable changes and screen events
//!
//! ## Dependency rule
//! Depends on `screenstate-domain` only (plus `tokio` for tasks, locks and
//! channels). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod change_signal;
pub mod condition_evaluator;
pub mod config;
pub mod ports;
pub mod trigger_engine;
pub mod variable_store;
