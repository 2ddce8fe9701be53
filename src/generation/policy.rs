//! Back-end selection and confidence scoring.

use std::collections::HashMap;

use super::ReasoningMode;
use crate::error::{GenerationError, GenerationResult};

/// Logical back-end name every mode routes to by default.
pub const DEFAULT_BACKEND: &str = "primary";

/// Pure routing policy.
///
/// Maps a reasoning mode to the logical name of a registered back end and
/// scores outputs. Holds configuration only; no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    routes: HashMap<ReasoningMode, String>,
}

impl Policy {
    /// Route every mode to the same back end.
    pub fn single(backend: impl Into<String>) -> Self {
        let backend = backend.into();
        Self {
            routes: ReasoningMode::ALL
                .iter()
                .map(|mode| (*mode, backend.clone()))
                .collect(),
        }
    }

    /// Build a policy from an explicit, possibly partial, route table.
    pub fn from_routes(routes: HashMap<ReasoningMode, String>) -> Self {
        Self { routes }
    }

    /// Name of the back end that serves `mode`.
    pub fn select_backend(&self, mode: ReasoningMode) -> GenerationResult<&str> {
        self.routes
            .get(&mode)
            .map(String::as_str)
            .ok_or_else(|| GenerationError::Policy {
                message: format!("no back end routed for mode '{}'", mode),
            })
    }

    /// Heuristic confidence from the raw output length.
    ///
    /// A placeholder scoring law: the breakpoints are fixed at 1500, 800 and
    /// 300 bytes and are exclusive.
    pub fn estimate_confidence(&self, _mode: ReasoningMode, text: &str) -> f64 {
        match text.len() {
            l if l > 1500 => 0.95,
            l if l > 800 => 0.85,
            l if l > 300 => 0.70,
            _ => 0.50,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::single(DEFAULT_BACKEND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_routes_all_modes_to_primary() {
        let policy = Policy::default();
        for mode in ReasoningMode::ALL {
            assert_eq!(policy.select_backend(mode).unwrap(), "primary");
        }
    }

    #[test]
    fn test_partial_routes_fail_with_policy_error() {
        let mut routes = HashMap::new();
        routes.insert(ReasoningMode::Reasoning, "primary".to_string());
        let policy = Policy::from_routes(routes);

        assert!(policy.select_backend(ReasoningMode::Reasoning).is_ok());
        let err = policy.select_backend(ReasoningMode::Planning).unwrap_err();
        assert!(matches!(err, GenerationError::Policy { .. }));
    }

    #[test]
    fn test_confidence_breakpoints() {
        let policy = Policy::default();
        let score = |n: usize| policy.estimate_confidence(ReasoningMode::Default, &"a".repeat(n));

        assert_eq!(score(0), 0.50);
        assert_eq!(score(50), 0.50);
        assert_eq!(score(300), 0.50);
        assert_eq!(score(301), 0.70);
        assert_eq!(score(800), 0.70);
        assert_eq!(score(801), 0.85);
        assert_eq!(score(1500), 0.85);
        assert_eq!(score(1501), 0.95);
    }

    #[test]
    fn test_confidence_ignores_mode() {
        let policy = Policy::default();
        let text = "x".repeat(900);
        let scores: Vec<f64> = ReasoningMode::ALL
            .iter()
            .map(|m| policy.estimate_confidence(*m, &text))
            .collect();
        assert!(scores.iter().all(|s| *s == 0.85));
    }
}
