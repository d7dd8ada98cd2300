//! Service layer for the observation accounting engine.
//!
//! The modules below are storage-agnostic: classification and reconciliation
//! are pure functions, and [`block_visit_status`] sequences them over a
//! transaction-scoped [`crate::db::repository::VisitLedger`].

pub mod block_counters;
pub mod block_visit_status;
pub mod night_accounting;
pub mod transition;

pub use block_counters::reconcile_block_counters;
pub use block_visit_status::{
    apply_status_change, parse_requested_state, StatusChangeRequest, TransitionOutcome,
};
pub use night_accounting::reconcile_night_totals;
pub use transition::{classify_transition, StatusTransition, TransitionCategory};
