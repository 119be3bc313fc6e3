//! Manifest constraint relaxation.
//!
//! Dependency bots update the lockfile, but a strict clause in the manifest
//! (an exact pin, a compatible-release operator) can make the package manager
//! reject that lockfile. An ordered rule table widens such clauses.

pub mod relax;
pub mod rules;

pub use relax::{ConstraintRelaxer, RelaxOutcome, Relaxation};
pub use rules::{RelaxError, RelaxationRule, RuleSpec, RuleTable, default_rules};
