//! Composable predicates that veto or down-weight activity execution.
//!
//! A constraint list evaluates to `min(p_i)` over its items; the first
//! item returning exactly `0` short-circuits the rest. Each item is
//! either an expression over domain variables (stand/site/activity,
//! dotted names folded to underscored keys) or a script callable.

pub mod constraint;
pub mod error;
pub mod node;

pub use constraint::{is_truthy, ConstraintContext, ConstraintLeaf};
pub use error::ConstraintError;
pub use node::{ConstraintList, ConstraintNode};

/// Rewrites a dotted domain variable name (`"site.slope"`) into the
/// underscore-joined form the expression engine expects (`"site_slope"`),
/// per the component design's expression-engine note.
pub fn fold_dotted_name(name: &str) -> String {
    name.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_dotted_names_to_underscored_keys() {
        assert_eq!(fold_dotted_name("site.slope"), "site_slope");
        assert_eq!(fold_dotted_name("activity.name"), "activity_name");
        assert_eq!(fold_dotted_name("stand"), "stand");
    }
}
