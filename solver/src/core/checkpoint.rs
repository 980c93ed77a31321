//! Append-only, in-memory checkpoint log keyed by lineage id.
//!
//! A checkpoint is an immutable snapshot of [`SolveState`] taken after a
//! stage transition. Branching constructs a new state by structural
//! copy-with-patch from a chosen snapshot; history itself is never mutated.
//! Storage is run-local: nothing persists across processes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::state::{SolveState, StatePatch};
use crate::core::types::Stage;

/// Where execution goes after a checkpointed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Next {
    Stage(Stage),
    End,
}

/// Stable reference to one checkpoint within one lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointHandle {
    pub lineage: String,
    pub seq: u64,
}

/// Immutable snapshot recorded after a stage completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub lineage: String,
    /// Monotonic sequence number within the lineage, starting at 1.
    pub seq: u64,
    /// Stage that just completed.
    pub stage: Stage,
    /// Stage about to run, or `End`.
    pub next: Next,
    pub state: SolveState,
}

impl Checkpoint {
    pub fn handle(&self) -> CheckpointHandle {
        CheckpointHandle {
            lineage: self.lineage.clone(),
            seq: self.seq,
        }
    }
}

/// A resume referenced a checkpoint that does not exist.
///
/// This must fail closed: a bad handle never silently creates a fresh run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCheckpointError {
    pub lineage: String,
    pub seq: u64,
}

impl fmt::Display for UnknownCheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown checkpoint: lineage '{}' seq {}",
            self.lineage, self.seq
        )
    }
}

impl std::error::Error for UnknownCheckpointError {}

/// In-memory checkpoint log for any number of independent lineages.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    lineages: HashMap<String, Vec<Checkpoint>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot, assigning the next sequence number for the lineage.
    pub fn append(
        &mut self,
        lineage: &str,
        stage: Stage,
        next: Next,
        state: SolveState,
    ) -> CheckpointHandle {
        let log = self.lineages.entry(lineage.to_string()).or_default();
        let seq = log.last().map(|cp| cp.seq + 1).unwrap_or(1);
        let checkpoint = Checkpoint {
            lineage: lineage.to_string(),
            seq,
            stage,
            next,
            state,
        };
        let handle = checkpoint.handle();
        log.push(checkpoint);
        handle
    }

    /// Checkpoints for a lineage in chronological order. Empty for unknown
    /// lineages.
    pub fn history(&self, lineage: &str) -> &[Checkpoint] {
        self.lineages.get(lineage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, handle: &CheckpointHandle) -> Result<&Checkpoint, UnknownCheckpointError> {
        self.lineages
            .get(&handle.lineage)
            .and_then(|log| log.iter().find(|cp| cp.seq == handle.seq))
            .ok_or_else(|| UnknownCheckpointError {
                lineage: handle.lineage.clone(),
                seq: handle.seq,
            })
    }

    /// Branch from a checkpoint: clone its snapshot, apply the patch, and
    /// return the patched state together with the stage it was about to run.
    ///
    /// The stored history is left untouched; the caller appends new
    /// checkpoints as the branch executes.
    pub fn branch(
        &self,
        handle: &CheckpointHandle,
        patch: &StatePatch,
    ) -> Result<(SolveState, Next), UnknownCheckpointError> {
        let checkpoint = self.get(handle)?;
        let mut state = checkpoint.state.clone();
        patch.apply(&mut state);
        Ok((state, checkpoint.next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(problem: &str) -> SolveState {
        SolveState::new(problem)
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let mut store = CheckpointStore::new();
        let first = store.append("run-a", Stage::AnalyzeTests, Next::Stage(Stage::CheckCorrectness), snapshot("p"));
        let second = store.append("run-a", Stage::CheckCorrectness, Next::Stage(Stage::Retrieve), snapshot("p"));
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(store.history("run-a").len(), 2);
    }

    #[test]
    fn lineages_are_independent() {
        let mut store = CheckpointStore::new();
        store.append("run-a", Stage::AnalyzeTests, Next::End, snapshot("a"));
        store.append("run-b", Stage::AnalyzeTests, Next::End, snapshot("b"));
        assert_eq!(store.history("run-a").len(), 1);
        assert_eq!(store.history("run-b").len(), 1);
        assert!(store.history("run-c").is_empty());
    }

    #[test]
    fn get_fails_closed_on_unknown_handle() {
        let store = CheckpointStore::new();
        let handle = CheckpointHandle {
            lineage: "missing".to_string(),
            seq: 1,
        };
        let err = store.get(&handle).unwrap_err();
        assert_eq!(err.lineage, "missing");
    }

    #[test]
    fn branch_patches_a_copy_without_mutating_history() {
        let mut store = CheckpointStore::new();
        let handle = store.append(
            "run-a",
            Stage::Execute,
            Next::Stage(Stage::Code),
            snapshot("p"),
        );

        let patch = StatePatch {
            cur_plan: Some(1),
            taken_feedback: Some(true),
            ..StatePatch::default()
        };
        let (state, next) = store.branch(&handle, &patch).expect("branch");

        assert_eq!(state.cur_plan, 1);
        assert!(state.taken_feedback);
        assert_eq!(next, Next::Stage(Stage::Code));
        // Stored snapshot is unchanged.
        let stored = store.get(&handle).expect("get");
        assert_eq!(stored.state.cur_plan, 0);
        assert!(!stored.state.taken_feedback);
    }
}
