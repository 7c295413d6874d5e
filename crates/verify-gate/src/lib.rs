//! Verification gate: the predicate DSL used to gate step progress.
//!
//! A plan step carries a list of [`PredicateSpec`] nodes. Specs are validated
//! for shape (arity and argument types) before any step executes, compiled
//! into the typed recursive [`Predicate`] tree, and evaluated against an
//! [`waypoint_core_types::Observation`] supplied by the caller. Evaluation is
//! pure: it never takes a snapshot of its own.

mod errors;
mod evaluator;
mod selector;
mod spec;

pub use errors::GateError;
pub use evaluator::evaluate;
pub use selector::Selector;
pub use spec::{validate_spec, Predicate, PredicateSpec, SpecIssue};
