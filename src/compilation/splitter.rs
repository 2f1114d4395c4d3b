//! Splitting of a prenex quantifier prefix at the first change of quantifier
//! kind. Each maximal same-kind group becomes one monitor level; existential
//! groups are rewritten universally and their polarity is pushed into the
//! link between the levels.

use crate::preprocessing::hnl_formula::Quantifier;
use crate::preprocessing::operator_enums::QuantifierKind;

/// Split a quantifier prefix into its maximal leading same-kind group and the
/// rest. The prefix must not be empty.
pub fn split_same_kind(quantifiers: &[Quantifier]) -> (&[Quantifier], &[Quantifier]) {
    assert!(!quantifiers.is_empty(), "Empty quantifier prefix");
    let first = &quantifiers[0].kind;
    let end = quantifiers
        .iter()
        .position(|q| !q.kind.same_group(first))
        .unwrap_or(quantifiers.len());
    quantifiers.split_at(end)
}

/// Whether a group (all of one kind) is existential, in which case the monitor
/// of the rewritten universal group computes the negation of the group's
/// semantics.
pub fn group_is_existential(group: &[Quantifier]) -> bool {
    matches!(group[0].kind, QuantifierKind::Exists)
}

/// Rewrite an existential group universally (`∃P·S ≡ ¬∀P·¬S`); universal
/// groups are returned unchanged.
pub fn universalized(group: &[Quantifier]) -> Vec<Quantifier> {
    group
        .iter()
        .map(|q| match q.kind {
            QuantifierKind::Exists => q.swapped(),
            _ => q.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::compilation::splitter::{group_is_existential, split_same_kind, universalized};
    use crate::preprocessing::hnl_formula::Quantifier;
    use crate::preprocessing::operator_enums::QuantifierKind;
    use crate::preprocessing::trace_expr::{FunctionTerm, TraceVariable};

    fn forall(name: &str) -> Quantifier {
        Quantifier::mk_forall(TraceVariable::new(name))
    }

    fn exists(name: &str) -> Quantifier {
        Quantifier::mk_exists(TraceVariable::new(name))
    }

    #[test]
    /// Test splitting at kind changes.
    fn split_points() {
        let qs = vec![forall("a"), forall("b"), exists("c"), forall("d")];
        let (prefix, rest) = split_same_kind(&qs);
        assert_eq!(prefix.len(), 2);
        assert_eq!(rest.len(), 2);
        assert!(!group_is_existential(prefix));

        let (prefix, rest) = split_same_kind(rest);
        assert_eq!(prefix.len(), 1);
        assert_eq!(rest.len(), 1);
        assert!(group_is_existential(prefix));

        // a homogeneous prefix does not split
        let qs = vec![forall("a"), forall("b")];
        let (prefix, rest) = split_same_kind(&qs);
        assert_eq!(prefix.len(), 2);
        assert!(rest.is_empty());
    }

    #[test]
    /// Test that function-sourced quantifiers form their own group.
    fn function_quantifiers_split() {
        let fun = FunctionTerm::new("f", vec![TraceVariable::new("a")]);
        let qs = vec![
            forall("a"),
            Quantifier::mk_forall_from_fun(TraceVariable::new("b"), fun),
        ];
        let (prefix, rest) = split_same_kind(&qs);
        assert_eq!(prefix.len(), 1);
        assert_eq!(rest.len(), 1);
        assert!(!group_is_existential(rest));
    }

    #[test]
    /// Test the universal rewriting of existential groups.
    fn existential_rewriting() {
        let group = vec![exists("a"), exists("b")];
        let rewritten = universalized(&group);
        for q in &rewritten {
            assert_eq!(q.kind, QuantifierKind::ForAll);
        }
        assert_eq!(rewritten[0].var, TraceVariable::new("a"));
    }
}
