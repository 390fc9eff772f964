use auto_impl::auto_impl;
use mockall::automock;

/// Answer of the constraint solver for one query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// Timeout or solver unavailable. Never an answer.
    Unknown,
}

/// Constraint terms a detector adds on top of the engine's current path
/// constraints for a single query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathConstraint {
    /// The call carries no value.
    CallValueZero,
    /// The call carries a strictly positive value.
    CallValuePositive,
}

/// Decision procedure owned by the driving engine.
///
/// Queries are synchronous. The collaborator enforces its own timeout and
/// reports it as [`SatResult::Unknown`]; callers never retry.
#[auto_impl(&mut, Box)]
#[automock]
pub trait ConstraintSolver: Send {
    /// Check the engine's current path constraints extended with `extra`.
    fn check(&mut self, extra: &[PathConstraint]) -> SatResult;
}
