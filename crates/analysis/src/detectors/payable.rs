use libsigil_core::{
    engine::{
        opcode,
        solver::{ConstraintSolver, PathConstraint, SatResult},
        state::MachineState,
    },
    error::Result,
};
use libsigil_utils::log::debug;

use crate::{
    detector::{Detector, Reported},
    finding::Finding,
};

const PRE_HOOKS: &[u8] = &[
    opcode::STOP,
    opcode::RETURN,
    opcode::REVERT,
    opcode::SELFDESTRUCT,
];

/// Flags functions whose terminating paths are feasible neither with nor
/// without attached value.
///
/// At every path terminal the current constraints are checked twice,
/// once under `callvalue == 0` and once under `callvalue > 0`. A path
/// infeasible under zero value requires payment; one infeasible under
/// positive value rejects it. Both at once contradict any payability the
/// dispatcher could have enforced, and that is the reported ambiguity.
pub struct PayableAmbiguity {
    solver: Box<dyn ConstraintSolver>,
    reported: Reported,
}

impl PayableAmbiguity {
    pub fn new(solver: Box<dyn ConstraintSolver>) -> Self {
        Self {
            solver,
            reported: Reported::default(),
        }
    }
}

impl Detector for PayableAmbiguity {
    fn name(&self) -> &'static str {
        "PayableAmbiguity"
    }

    fn pre_hooks(&self) -> &'static [u8] {
        PRE_HOOKS
    }

    fn analyze(
        &mut self,
        state: &mut MachineState,
        _prev: Option<&MachineState>,
    ) -> Result<Option<Finding>> {
        if self.reported.contains(&state.env.function) {
            return Ok(None);
        }
        let under_zero = self.solver.check(&[PathConstraint::CallValueZero]);
        let under_value =
            self.solver.check(&[PathConstraint::CallValuePositive]);
        match (under_zero, under_value) {
            (SatResult::Unknown, _) | (_, SatResult::Unknown) => {
                debug!(
                    function = state.env.function.as_str(),
                    "payability check inconclusive"
                );
                Ok(None)
            }
            (SatResult::Unsat, SatResult::Unsat) => {
                self.reported.mark(&state.env.function);
                Ok(Some(Finding::new(state, "PayableAmbiguity")))
            }
            (_, SatResult::Unsat) => {
                debug!(
                    function = state.env.function.as_str(),
                    "terminating path is non-payable"
                );
                Ok(None)
            }
            _ => {
                debug!(
                    function = state.env.function.as_str(),
                    "terminating path is payable"
                );
                Ok(None)
            }
        }
    }

    fn reset(&mut self) {
        self.reported.clear();
    }
}

#[cfg(test)]
mod tests {
    use libsigil_core::engine::{
        replay::{replay, Trace, TraceBuilder},
        solver::MockConstraintSolver,
    };

    use super::*;
    use crate::registry::Registry;

    fn terminal_trace(function: &str) -> Trace {
        TraceBuilder::new("Wallet")
            .function(function)
            .op(opcode::STOP)
            .build()
    }

    fn registry(solver: MockConstraintSolver) -> Registry {
        let mut registry = Registry::default();
        registry
            .register(Box::new(PayableAmbiguity::new(Box::new(solver))))
            .unwrap();
        registry
    }

    #[test]
    fn test_contradictory_path_reports() {
        let mut solver = MockConstraintSolver::new();
        solver
            .expect_check()
            .times(2)
            .returning(|_| SatResult::Unsat);
        let mut registry = registry(solver);
        replay(&terminal_trace("deposit()"), &mut registry).unwrap();

        let results = registry.results();
        assert_eq!(
            results["PayableAmbiguity"],
            vec![Finding {
                contract: "Wallet".to_string(),
                function: "deposit()".to_string(),
                pattern: "PayableAmbiguity".to_string(),
                storage_address: None,
            }]
        );
    }

    #[test]
    fn test_feasible_zero_value_path_is_silent() {
        let mut solver = MockConstraintSolver::new();
        solver.expect_check().times(2).returning(|constraints| {
            match constraints {
                [PathConstraint::CallValueZero] => SatResult::Sat,
                _ => SatResult::Unsat,
            }
        });
        let mut registry = registry(solver);
        replay(&terminal_trace("transfer()"), &mut registry).unwrap();
        assert!(registry.results()["PayableAmbiguity"].is_empty());
    }

    #[test]
    fn test_unknown_is_inconclusive_not_an_error() {
        let mut solver = MockConstraintSolver::new();
        solver.expect_check().times(2).returning(|constraints| {
            match constraints {
                [PathConstraint::CallValueZero] => SatResult::Unsat,
                _ => SatResult::Unknown,
            }
        });
        let mut registry = registry(solver);
        replay(&terminal_trace("deposit()"), &mut registry).unwrap();

        // no finding, and the detector stays healthy
        assert!(registry.results()["PayableAmbiguity"].is_empty());
    }

    #[test]
    fn test_both_queries_always_run() {
        // a path that requires payment: unsat under zero, sat under value.
        // the second query must still be issued.
        let mut solver = MockConstraintSolver::new();
        solver.expect_check().times(2).returning(|constraints| {
            match constraints {
                [PathConstraint::CallValueZero] => SatResult::Unsat,
                _ => SatResult::Sat,
            }
        });
        let mut registry = registry(solver);
        replay(&terminal_trace("deposit()"), &mut registry).unwrap();
        assert!(registry.results()["PayableAmbiguity"].is_empty());
    }

    #[test]
    fn test_reported_function_skips_solver() {
        let mut solver = MockConstraintSolver::new();
        solver
            .expect_check()
            .times(2)
            .returning(|_| SatResult::Unsat);
        let mut registry = registry(solver);

        // second pass over the same function: no further solver calls
        replay(&terminal_trace("deposit()"), &mut registry).unwrap();
        replay(&terminal_trace("deposit()"), &mut registry).unwrap();
        assert_eq!(registry.results()["PayableAmbiguity"].len(), 1);
    }
}
