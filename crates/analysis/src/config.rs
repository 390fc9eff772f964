use libsigil_core::error::Result;
use libsigil_utils::config::Config;

use crate::registry::Registry;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisConfig {
    /// Allow-list of detector names to dispatch. Absent runs every
    /// registered detector.
    pub detectors: Option<Vec<String>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { detectors: None }
    }
}

impl Config for AnalysisConfig {
    fn section_name() -> &'static str {
        "analysis"
    }
}

impl AnalysisConfig {
    /// Restrict the registry to the configured allow-list, if any. A
    /// name that matches no registered detector is a setup error.
    pub fn apply(&self, registry: &mut Registry) -> Result<()> {
        if let Some(names) = &self.detectors {
            registry.enable_only(names)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use libsigil_core::{
        engine::{
            opcode,
            replay::{replay, TraceBuilder},
            solver::{MockConstraintSolver, SatResult},
            types::U256,
        },
        error::SigilError,
    };

    use super::*;

    fn registry() -> Registry {
        let mut solver = MockConstraintSolver::new();
        solver.expect_check().returning(|_| SatResult::Sat);
        Registry::with_builtin(Box::new(solver)).unwrap()
    }

    #[test]
    fn test_missing_section_keys_default_to_all() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.detectors, None);

        let mut registry = registry();
        config.apply(&mut registry).unwrap();
        let trace = TraceBuilder::new("Token")
            .function("balanceOf(address)")
            .push(opcode::PUSH1, U256::from(2))
            .op(opcode::DUP1)
            .op(opcode::SLOAD)
            .build();
        replay(&trace, &mut registry).unwrap();
        assert_eq!(registry.results()["Getter"].len(), 1);
    }

    #[test]
    fn test_allow_list_restricts_dispatch() {
        let config = AnalysisConfig {
            detectors: Some(vec!["Setter".to_string()]),
        };
        let mut registry = registry();
        config.apply(&mut registry).unwrap();

        let trace = TraceBuilder::new("Token")
            .function("balanceOf(address)")
            .push(opcode::PUSH1, U256::from(2))
            .op(opcode::DUP1)
            .op(opcode::SLOAD)
            .build();
        replay(&trace, &mut registry).unwrap();
        assert!(registry.results()["Getter"].is_empty());
    }

    #[test]
    fn test_unknown_name_is_fatal_at_setup() {
        let config = AnalysisConfig {
            detectors: Some(vec!["NoSuchDetector".to_string()]),
        };
        let mut registry = registry();
        assert!(matches!(
            config.apply(&mut registry),
            Err(SigilError::DetectorNotFound(_))
        ));
    }
}
