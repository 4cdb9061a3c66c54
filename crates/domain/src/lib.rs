//! # screenstate-domain
//!
//! Pure domain model for the screenstate reactive state core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **variable values** (string / number / bool / object)
//! - Define **stored variables** (scope, write policy, TTL) and their slot keys
//! - Define **bindings** and **conditions** (declarative boolean tests)
//! - Define **triggers** (source → condition → actions) and their execution guards
//! - Contain all pure decision logic: TTL expiry, conflict resolution,
//!   condition outcomes, guard verdicts
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod condition;
pub mod trigger;
pub mod value;
pub mod variable;
