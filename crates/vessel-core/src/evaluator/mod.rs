mod change;
mod compare;
mod dynamic;
mod geofence;
pub mod template;
pub mod wildcard;

pub use change::evaluate as evaluate_change;
pub use compare::evaluate as evaluate_compare;
pub use dynamic::evaluate as evaluate_dynamic;
pub use geofence::evaluate as evaluate_geofence;

use std::collections::BTreeMap;

/// The uniform output of every evaluator family: whether the rule fired,
/// an optional transition tag (used by geofence for `enter`/`exit`), the
/// rendering/payload context, and the evaluator's updated opaque state (when
/// the rule has state tracking enabled).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluatorOutput {
    pub triggered: bool,
    pub transition: Option<&'static str>,
    pub context: BTreeMap<String, String>,
    pub new_state: Option<crate::state::RuleState>,
}
