use std::collections::{BTreeMap, BTreeSet, HashMap};

use libsigil_core::{
    engine::{
        inspector::Inspector, solver::ConstraintSolver, state::MachineState,
    },
    error::{Result, SigilError},
};
use libsigil_utils::log::{debug, error};

use crate::{
    detector::Detector,
    detectors::{
        getter::Getter, payable::PayableAmbiguity, setter::Setter,
        storage_caller_check::StorageCallerCheck,
    },
    finding::Finding,
};

/// Hook phase relative to opcode execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

struct Entry {
    detector: Box<dyn Detector>,
    findings: Vec<Finding>,
    failed: bool,
    enabled: bool,
}

/// Owns the registered detectors and routes engine hooks to them.
///
/// One registry serves one execution path at a time. The embedding
/// engine asks [`Registry::hooked_opcodes`] for the opcodes worth
/// instrumenting and then drives the registry as an [`Inspector`];
/// detectors run in registration order. A detector returning an error is
/// taken out of the run, never the whole pass.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
    pre: HashMap<u8, Vec<usize>>,
    post: HashMap<u8, Vec<usize>>,
}

impl Registry {
    /// Register a detector. The name must be non-empty and not taken.
    pub fn register(&mut self, detector: Box<dyn Detector>) -> Result<()> {
        let name = detector.name();
        if name.is_empty() {
            return Err(SigilError::InvalidDetector(
                "empty detector name".to_string(),
            ));
        }
        if self.entries.iter().any(|e| e.detector.name() == name) {
            return Err(SigilError::InvalidDetector(format!(
                "duplicate detector name: {}",
                name
            )));
        }
        let index = self.entries.len();
        for &op in detector.pre_hooks() {
            self.pre.entry(op).or_default().push(index);
        }
        for &op in detector.post_hooks() {
            self.post.entry(op).or_default().push(index);
        }
        self.entries.push(Entry {
            detector,
            findings: Vec::new(),
            failed: false,
            enabled: true,
        });
        Ok(())
    }

    /// A registry holding the shipped detector set. The sequential
    /// caller-check variant is opt-in and not part of it.
    pub fn with_builtin(solver: Box<dyn ConstraintSolver>) -> Result<Self> {
        let mut registry = Self::default();
        registry.register(Box::new(Getter::default()))?;
        registry.register(Box::new(Setter::default()))?;
        registry.register(Box::new(StorageCallerCheck::default()))?;
        registry.register(Box::new(PayableAmbiguity::new(solver)))?;
        Ok(registry)
    }

    /// The registered detectors, or the named subset in the given order.
    /// Unknown names are an error, never silently dropped.
    pub fn active_detectors<S: AsRef<str>>(
        &self,
        filter: Option<&[S]>,
    ) -> Result<Vec<&dyn Detector>> {
        match filter {
            None => Ok(self.entries.iter().map(|e| &*e.detector).collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    let name = name.as_ref();
                    self.entries
                        .iter()
                        .find(|e| e.detector.name() == name)
                        .map(|e| &*e.detector)
                        .ok_or_else(|| {
                            SigilError::DetectorNotFound(name.to_string())
                        })
                })
                .collect(),
        }
    }

    /// Restrict dispatch to the named detectors. Validates every name
    /// before touching any state.
    pub fn enable_only<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            if !self.entries.iter().any(|e| e.detector.name() == name) {
                return Err(SigilError::DetectorNotFound(name.to_string()));
            }
        }
        for entry in self.entries.iter_mut() {
            entry.enabled = names
                .iter()
                .any(|name| name.as_ref() == entry.detector.name());
        }
        Ok(())
    }

    /// Clear findings, failure flags, and every detector's own state.
    /// Registrations and the enabled set survive.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.detector.reset();
            entry.findings.clear();
            entry.failed = false;
        }
    }

    /// Findings per registered detector since the last reset. Every
    /// registered detector appears, reported or not.
    pub fn results(&self) -> BTreeMap<String, Vec<Finding>> {
        self.entries
            .iter()
            .map(|e| (e.detector.name().to_string(), e.findings.clone()))
            .collect()
    }

    /// Opcodes any enabled detector wants to observe in `phase`.
    pub fn hooked_opcodes(&self, phase: Phase) -> BTreeSet<u8> {
        let table = match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        };
        table
            .iter()
            .filter(|(_, indexes)| {
                indexes.iter().any(|&i| self.entries[i].enabled)
            })
            .map(|(&op, _)| op)
            .collect()
    }

    fn dispatch(
        &mut self,
        phase: Phase,
        state: &mut MachineState,
        prev: Option<&MachineState>,
    ) {
        let table = match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        };
        let Some(indexes) = table.get(&state.instruction.op) else {
            return;
        };
        for index in indexes.clone() {
            let entry = &mut self.entries[index];
            if !entry.enabled || entry.failed {
                continue;
            }
            match entry.detector.analyze(state, prev) {
                Ok(Some(finding)) => {
                    debug!(
                        detector = entry.detector.name(),
                        contract = finding.contract.as_str(),
                        function = finding.function.as_str(),
                        "reported {}",
                        finding.pattern
                    );
                    entry.findings.push(finding);
                }
                Ok(None) => {}
                Err(err) => {
                    error!(
                        detector = entry.detector.name(),
                        err = ?err,
                        "detector failed, disabling for this run"
                    );
                    entry.failed = true;
                }
            }
        }
    }
}

impl Inspector for Registry {
    fn step(&mut self, state: &mut MachineState) {
        self.dispatch(Phase::Pre, state, None);
    }

    fn step_end(&mut self, state: &mut MachineState, prev: &MachineState) {
        self.dispatch(Phase::Post, state, Some(prev));
    }
}
