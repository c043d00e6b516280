//! Leaf constraints: expressions and script callables.
//!
//! Unlike an interval-set constraint, a leaf here evaluates to a single
//! suitability score for the stand under evaluation right now: `0.0`
//! vetoes, anything `> 0.0` passes (and is used verbatim as a
//! down-weighting factor by the caller).

use std::fmt;

use crate::engine::ids::StandId;
use crate::host::ScriptHost;

/// Evaluation inputs shared by every leaf in a tree: the stand the
/// constraint runs against, and the domain variables (stand/site/activity,
/// with dotted names already folded to underscored keys) available to
/// expression leaves.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintContext<'a> {
    pub stand: StandId,
    pub variables: &'a [(String, f64)],
}

/// A single constraint: either an expression evaluated against the
/// context variables, or an opaque script callable resolved by the host.
#[derive(Debug, Clone)]
pub enum ConstraintLeaf<H> {
    /// Source text such as `"site.slope < 30"`; `>0` passes.
    Expression(String),
    /// A callable looked up from the user's STP object; its string
    /// result is interpreted as truthy/falsy.
    Callable(H),
}

impl<H> ConstraintLeaf<H> {
    pub fn expression(source: impl Into<String>) -> Self {
        ConstraintLeaf::Expression(source.into())
    }

    pub fn callable(handle: H) -> Self {
        ConstraintLeaf::Callable(handle)
    }
}

impl<H: Clone + fmt::Debug> ConstraintLeaf<H> {
    /// Evaluates the leaf, returning `0.0` on a script error (a
    /// misbehaving constraint should veto, not panic the stand loop).
    pub fn evaluate<S>(&self, host: &mut S, ctx: &ConstraintContext<'_>) -> f64
    where
        S: ScriptHost<Handle = H>,
    {
        match self {
            ConstraintLeaf::Expression(source) => {
                host.evaluate(source, ctx.variables).unwrap_or_else(|err| {
                    log::warn!("constraint expression '{source}' failed: {err}");
                    0.0
                })
            }
            ConstraintLeaf::Callable(handle) => match host.call(handle, ctx.stand) {
                Ok(result) => {
                    if is_truthy(&result) {
                        1.0
                    } else {
                        0.0
                    }
                }
                Err(err) => {
                    log::warn!("constraint callable failed: {err}");
                    0.0
                }
            },
        }
    }
}

/// Mirrors the scripting engine's truthiness for string results: empty,
/// `"0"` and the literal `"false"` are falsy, everything else is truthy.
pub fn is_truthy(result: &str) -> bool {
    !(result.is_empty() || result == "0" || result == "false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullScriptHost;

    #[test]
    fn expression_leaf_evaluates_via_host() {
        let leaf: ConstraintLeaf<String> = ConstraintLeaf::expression("site_slope");
        let mut host = NullScriptHost::with_expression_value(0.8);
        let ctx = ConstraintContext {
            stand: StandId::new(0),
            variables: &[],
        };
        assert_eq!(leaf.evaluate(&mut host, &ctx), 0.8);
    }

    #[test]
    fn callable_leaf_truthy_result_passes() {
        let leaf: ConstraintLeaf<String> = ConstraintLeaf::callable("ranking".to_string());
        let mut host = NullScriptHost::with_call_result("true");
        let ctx = ConstraintContext {
            stand: StandId::new(0),
            variables: &[],
        };
        assert_eq!(leaf.evaluate(&mut host, &ctx), 1.0);
    }

    #[test]
    fn callable_leaf_falsy_result_vetoes() {
        let leaf: ConstraintLeaf<String> = ConstraintLeaf::callable("ranking".to_string());
        let mut host = NullScriptHost::with_call_result("false");
        let ctx = ConstraintContext {
            stand: StandId::new(0),
            variables: &[],
        };
        assert_eq!(leaf.evaluate(&mut host, &ctx), 0.0);
    }

    #[test]
    fn is_truthy_matches_scripting_conventions() {
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
    }
}
