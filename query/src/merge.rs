//! Combining queries and removing redundant nesting.

use tracing::debug;

use crate::ast::{BooleanOperator, ConditionGroup, ConditionNode, SearchExpression};

/// Combines the WHERE clauses of two queries with `op`.
///
/// The result keeps the SELECT, FROM and ORDER_BY of `a`. Its WHERE clause
/// holds `a`'s conditions as one group followed by `b`'s as another joined
/// by `op`, then simplified. A query without WHERE adds no group: merging it
/// yields the other side's conditions, negated if `op` carries a `NOT`.
///
/// # Examples
///
/// ```
/// use catalog_query::*;
///
/// let a = SearchExpression::parse(r#"SELECT * FROM SI WHERE A = "x" OR A = "y""#).unwrap();
/// let b = SearchExpression::parse(r#"SELECT * FROM SI WHERE B = "z""#).unwrap();
/// let merged = merge(&a, &b, BooleanOperator::And);
/// assert_eq!(
///     merged.to_string(),
///     r#"SELECT * FROM [SI] WHERE ([A] = "x" OR [A] = "y") AND [B] = "z""#
/// );
/// ```
pub fn merge(a: &SearchExpression, b: &SearchExpression, op: BooleanOperator) -> SearchExpression {
    let mut where_clause = ConditionGroup::new();
    if !a.where_clause.is_empty() {
        let mut left = a.where_clause.clone();
        left.combinator = None;
        where_clause.push(left);
    }
    if !b.where_clause.is_empty() {
        let mut right = b.where_clause.clone();
        right.combinator = if where_clause.is_empty() {
            leading(Some(op))
        } else {
            Some(op)
        };
        where_clause.push(right);
    }

    let mut merged = SearchExpression {
        select: a.select.clone(),
        source: a.source.clone(),
        where_clause,
        order_by: a.order_by.clone(),
    };
    merged.simplify();
    debug!(source = %merged.source, operator = %op, "Merged queries");
    merged
}

/// Operator that keeps the negation of `op` on a group's first child.
fn leading(op: Option<BooleanOperator>) -> Option<BooleanOperator> {
    match op {
        Some(BooleanOperator::Not | BooleanOperator::AndNot | BooleanOperator::OrNot) => {
            Some(BooleanOperator::Not)
        }
        _ => None,
    }
}

impl SearchExpression {
    /// Collapses every group with exactly one child into that child.
    ///
    /// The group's operator moves onto the child, combined with a `NOT` the
    /// child may carry. A root holding a single group takes over that
    /// group's children unless the group is negated.
    pub fn simplify(&mut self) {
        simplify_group(&mut self.where_clause);
        loop {
            let [ConditionNode::Group(only)] = self.where_clause.children.as_mut_slice() else {
                break;
            };
            if only.combinator == Some(BooleanOperator::Not) {
                break;
            }
            let mut children = std::mem::take(&mut only.children);
            if let Some(first) = children.first_mut() {
                let combinator = BooleanOperator::compose(None, first.combinator());
                first.set_combinator(combinator);
            }
            self.where_clause.children = children;
        }
    }
}

/// Simplifies `group` in place, bottom-up.
///
/// Empty nested groups are dropped; if that leaves a joining operator on
/// the first child, only its `NOT` is kept.
pub fn simplify_group(group: &mut ConditionGroup) {
    for child in &mut group.children {
        if let ConditionNode::Group(nested) = child {
            simplify_group(nested);
        }
    }

    group
        .children
        .retain(|child| !matches!(child, ConditionNode::Group(nested) if nested.is_empty()));
    if let Some(first) = group.children.first_mut()
        && !BooleanOperator::is_leading(first.combinator())
    {
        first.set_combinator(leading(first.combinator()));
    }

    for child in &mut group.children {
        while let ConditionNode::Group(nested) = child
            && nested.children.len() == 1
        {
            let outer = nested.combinator;
            let Some(mut inner) = nested.children.pop() else {
                break;
            };
            inner.set_combinator(BooleanOperator::compose(outer, inner.combinator()));
            *child = inner;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Comparator, Condition};

    fn parse(text: &str) -> SearchExpression {
        SearchExpression::parse(text).unwrap()
    }

    fn cond(field: &str) -> Condition {
        Condition::new(field, Comparator::Equal, "1")
    }

    #[test]
    fn test_merge_shape() {
        let a = parse(r#"SELECT * FROM SI WHERE A = "x" OR A = "y" ORDER_BY A"#);
        let b = parse(r#"SELECT * FROM SI WHERE B = "z""#);
        let merged = merge(&a, &b, BooleanOperator::And);

        let children = &merged.where_clause.children;
        assert_eq!(children.len(), 2);
        assert!(matches!(&children[0], ConditionNode::Group(g) if g.children.len() == 2 && g.combinator.is_none()));
        assert_eq!(
            children[1],
            ConditionNode::Condition(
                Condition::new("B", Comparator::Equal, "z").with_combinator(BooleanOperator::And)
            )
        );
        assert_eq!(merged.order_by, a.order_by);
        assert!(!merged.where_clause.has_redundant_group());
    }

    #[test]
    fn test_merge_does_not_touch_inputs() {
        let a = parse(r#"SELECT * FROM SI WHERE A = "x""#);
        let b = parse(r#"SELECT * FROM SI WHERE B = "z""#);
        let before = (a.clone(), b.clone());
        let _ = merge(&a, &b, BooleanOperator::Or);
        assert_eq!((a, b), before);
    }

    #[test]
    fn test_merge_with_not_operator() {
        let a = parse(r#"SELECT * FROM SI WHERE A = "x""#);
        let b = parse(r#"SELECT * FROM SI WHERE NOT B = "z""#);
        let merged = merge(&a, &b, BooleanOperator::And);
        assert_eq!(
            merged.to_string(),
            r#"SELECT * FROM [SI] WHERE [A] = "x" AND NOT [B] = "z""#
        );
    }

    #[test]
    fn test_merge_with_missing_where_clauses() {
        let none = parse("SELECT * FROM SI ORDER_BY A");
        let a = parse(r#"SELECT * FROM SI WHERE A = "x""#);
        let b = parse(r#"SELECT * FROM SI WHERE B = "z" OR C = "w""#);

        for op in [BooleanOperator::And, BooleanOperator::Or] {
            let merged = merge(&none, &b, op);
            assert_eq!(
                merged.to_string(),
                r#"SELECT * FROM [SI] WHERE [B] = "z" OR [C] = "w" ORDER_BY [A] ASC"#
            );
            assert_eq!(parse(&merged.to_string()), merged);

            let merged = merge(&a, &none, op);
            assert_eq!(merged.to_string(), r#"SELECT * FROM [SI] WHERE [A] = "x""#);
            assert_eq!(parse(&merged.to_string()), merged);

            let merged = merge(&none, &none, op);
            assert!(merged.where_clause.is_empty());
            assert_eq!(merged.to_string(), "SELECT * FROM [SI] ORDER_BY [A] ASC");
        }
    }

    #[test]
    fn test_merge_negated_into_missing_where_clause() {
        let none = parse("SELECT * FROM SI");
        let b = parse(r#"SELECT * FROM SI WHERE B = "z""#);
        let merged = merge(&none, &b, BooleanOperator::AndNot);
        assert_eq!(merged.to_string(), r#"SELECT * FROM [SI] WHERE NOT [B] = "z""#);
        assert_eq!(parse(&merged.to_string()), merged);
    }

    #[test]
    fn test_simplify_drops_empty_groups() {
        let mut group = ConditionGroup::new()
            .with_child(cond("A"))
            .with_child(ConditionGroup::new().with_combinator(BooleanOperator::Or));
        simplify_group(&mut group);
        assert_eq!(group.children, vec![ConditionNode::Condition(cond("A"))]);

        let mut group = ConditionGroup::new()
            .with_child(ConditionGroup::new())
            .with_child(cond("B").with_combinator(BooleanOperator::AndNot));
        simplify_group(&mut group);
        assert_eq!(
            group.children,
            vec![ConditionNode::Condition(
                cond("B").with_combinator(BooleanOperator::Not)
            )]
        );
    }

    #[test]
    fn test_simplify_nested_chains() {
        let mut expr = SearchExpression::new("SI");
        expr.where_clause.push(cond("A"));
        expr.where_clause.push(
            ConditionGroup::new()
                .with_combinator(BooleanOperator::Or)
                .with_child(ConditionGroup::new().with_child(
                    ConditionGroup::new()
                        .with_child(cond("B").with_combinator(BooleanOperator::Not)),
                )),
        );
        expr.simplify();
        assert_eq!(
            expr.where_clause.children,
            vec![
                ConditionNode::Condition(cond("A")),
                ConditionNode::Condition(cond("B").with_combinator(BooleanOperator::OrNot)),
            ]
        );
    }

    #[test]
    fn test_simplify_unwraps_root_group() {
        let mut expr = parse(r#"SELECT * FROM SI WHERE ((A = "1" AND B = "1"))"#);
        expr.simplify();
        assert_eq!(expr.where_clause.children.len(), 2);
        assert!(!expr.where_clause.has_redundant_group());

        let mut negated = parse(r#"SELECT * FROM SI WHERE NOT (A = "1" AND B = "1")"#);
        let before = negated.clone();
        negated.simplify();
        assert_eq!(negated, before);
    }

    #[test]
    fn test_double_negation_cancels() {
        let mut group = ConditionGroup::new().with_child(
            ConditionGroup::new()
                .with_combinator(BooleanOperator::Not)
                .with_child(cond("A").with_combinator(BooleanOperator::Not)),
        );
        simplify_group(&mut group);
        assert_eq!(group.children, vec![ConditionNode::Condition(cond("A"))]);
    }
}
