use libsigil_core::engine::state::MachineState;

/// One pattern match, addressed at the function the matched trace
/// executed in.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    /// Contract under analysis, as labeled by the driving engine.
    pub contract: String,

    /// Function (or entry point label) of the matched occurrence.
    pub function: String,

    /// Pattern identifier. Detector variants that recognize the same
    /// shape report the same pattern.
    pub pattern: String,

    /// Storage slot index involved in the match, when one was tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_address: Option<u64>,
}

impl Finding {
    /// A finding addressed at the state's current call environment.
    pub fn new(state: &MachineState, pattern: impl Into<String>) -> Self {
        Self {
            contract: state.env.contract.clone(),
            function: state.env.function.clone(),
            pattern: pattern.into(),
            storage_address: None,
        }
    }

    pub fn with_storage_address(mut self, index: u64) -> Self {
        self.storage_address = Some(index);
        self
    }
}
