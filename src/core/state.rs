//! Per-document lifecycle state.
//!
//! ```text
//! Discovered → Parsed → DependenciesResolved → Compiled
//!                ↑                                 │ (write event)
//!                └─────────────────────────────────┘
//! any state ──(delete event)──→ Removed
//! ```

use thiserror::Error;

/// Lifecycle state of one source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentState {
    Discovered,
    Parsed,
    DependenciesResolved,
    Compiled,
    Removed,
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid document transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: DocumentState,
    pub to: DocumentState,
}

impl DocumentState {
    /// Whether `self → next` is a legal transition.
    pub const fn can_transition(self, next: Self) -> bool {
        use DocumentState::*;
        matches!(
            (self, next),
            (_, Removed)
                | (Discovered, Parsed)
                | (Parsed, DependenciesResolved)
                | (DependenciesResolved, Compiled)
                // failed compile: dependencies stay resolved, retry later
                | (DependenciesResolved, DependenciesResolved)
                // write event re-enters the pipeline
                | (Compiled, Parsed)
                // a dependency changed: edges still valid, output stale
                | (Compiled, DependenciesResolved)
                | (DependenciesResolved, Parsed)
                // re-created after deletion
                | (Removed, Discovered)
        )
    }

    /// Validated transition.
    pub fn advance(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentState::*;

    #[test]
    fn test_forward_pipeline() {
        let state = Discovered
            .advance(Parsed)
            .and_then(|s| s.advance(DependenciesResolved))
            .and_then(|s| s.advance(Compiled))
            .unwrap();
        assert_eq!(state, Compiled);
    }

    #[test]
    fn test_write_event_reenters_parsed() {
        assert_eq!(Compiled.advance(Parsed), Ok(Parsed));
    }

    #[test]
    fn test_dependency_change_invalidates_output() {
        assert_eq!(Compiled.advance(DependenciesResolved), Ok(DependenciesResolved));
        assert!(Parsed.advance(Parsed).is_err());
    }

    #[test]
    fn test_delete_from_any_state() {
        for state in [Discovered, Parsed, DependenciesResolved, Compiled] {
            assert_eq!(state.advance(Removed), Ok(Removed));
        }
    }

    #[test]
    fn test_skipping_stages_rejected() {
        assert!(Discovered.advance(Compiled).is_err());
        assert!(Parsed.advance(Compiled).is_err());
        assert!(Removed.advance(Compiled).is_err());
    }
}
