//! Pod Security Standards level suggestion.
//!
//! A pod gets the most restrictive level it satisfies. A namespace gets the
//! most permissive of its pods' levels, since a namespace label stricter than
//! any one pod would reject that pod.

use super::types::{Level, NamespaceSuggestion, PodFailure, PodLevel};
use k8s_openapi::api::core::v1::Pod;

/// Error raised by a [`LevelEvaluator`] for one pod.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("pod {0} has no spec")]
    MissingSpec(String),

    #[error("cannot evaluate pod {pod} at level {level}: {reason}")]
    Failed {
        pod: String,
        level: Level,
        reason: String,
    },
}

/// Decides whether a pod satisfies one level.
///
/// Implementations must be deterministic for a given pod and level.
pub trait LevelEvaluator {
    fn evaluate(&self, pod: &Pod, level: Level) -> Result<bool, EvaluationError>;
}

impl<F> LevelEvaluator for F
where
    F: Fn(&Pod, Level) -> Result<bool, EvaluationError>,
{
    fn evaluate(&self, pod: &Pod, level: Level) -> Result<bool, EvaluationError> {
        self(pod, level)
    }
}

/// Most restrictive level the pod satisfies.
///
/// Restricted is probed first, then Baseline. Privileged is the fallback and
/// is never probed.
pub fn suggest_level<E>(pod: &Pod, evaluator: &E) -> Result<Level, EvaluationError>
where
    E: LevelEvaluator + ?Sized,
{
    for level in Level::PROBE_ORDER {
        if evaluator.evaluate(pod, level)? {
            return Ok(level);
        }
    }
    Ok(Level::Privileged)
}

/// Most permissive level of the set, or `None` when it is empty.
pub fn aggregate<I>(levels: I) -> Option<Level>
where
    I: IntoIterator<Item = Level>,
{
    levels.into_iter().max()
}

/// Suggest a level for every pod of a namespace and aggregate them.
///
/// Pods whose evaluation fails are recorded in `failures` and left out of the
/// aggregate.
pub fn suggest_namespace<'a, I, E>(namespace: &str, pods: I, evaluator: &E) -> NamespaceSuggestion
where
    I: IntoIterator<Item = &'a Pod>,
    E: LevelEvaluator + ?Sized,
{
    let mut suggestion = NamespaceSuggestion {
        namespace: namespace.to_string(),
        level: None,
        pods: Vec::new(),
        failures: Vec::new(),
    };

    for pod in pods {
        let name = pod.metadata.name.clone().unwrap_or_default();
        match suggest_level(pod, evaluator) {
            Ok(level) => suggestion.pods.push(PodLevel { pod: name, level }),
            Err(e) => suggestion.failures.push(PodFailure {
                pod: name,
                error: e.to_string(),
            }),
        }
    }

    suggestion.level = aggregate(suggestion.pods.iter().map(|p| p.level));
    suggestion
}
