//! Expression tree of the query language.
//!
//! A [`SearchExpression`] is `SELECT <fields> FROM <document type>
//! [WHERE <conditions>] [ORDER_BY <fields>]`. The WHERE clause is a
//! [`ConditionGroup`] whose children are evaluated left to right, each one
//! joined to the running result by its own [`BooleanOperator`].
//!
//! `Display` renders the canonical text form, which parses back to an equal
//! expression:
//!
//! ```
//! use catalog_query::*;
//!
//! let mut expr = SearchExpression::new("SI");
//! expr.select = vec!["NCTN".into()];
//! expr.where_clause.push(Condition::new("OGTD", Comparator::Like, "villa"));
//! expr.where_clause.push(
//!     Condition::new("NCTN", Comparator::Equal, "2").with_combinator(BooleanOperator::AndNot),
//! );
//! expr.order_by.push(OrderingTerm::descending("NCTN"));
//!
//! let text = expr.to_string();
//! assert_eq!(
//!     text,
//!     r#"SELECT [NCTN] FROM [SI] WHERE [OGTD] LIKE "villa" AND NOT [NCTN] = "2" ORDER_BY [NCTN] DESC"#
//! );
//! assert_eq!(SearchExpression::parse(&text).unwrap(), expr);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a condition or group joins the result of its preceding siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BooleanOperator {
    And,
    Or,
    /// Only valid on the first child of a group: negates it.
    Not,
    AndNot,
    OrNot,
}

impl BooleanOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::AndNot => "AND NOT",
            Self::OrNot => "OR NOT",
        }
    }

    /// Returns `true` if `op` may lead a group (no operator, or `NOT`).
    pub fn is_leading(op: Option<Self>) -> bool {
        matches!(op, None | Some(Self::Not))
    }

    /// Applies a following `NOT` keyword to a pending operator.
    pub fn negated(op: Option<Self>) -> Option<Self> {
        Some(match op {
            None => Self::Not,
            Some(Self::And) => Self::AndNot,
            Some(Self::Or) => Self::OrNot,
            Some(Self::Not) => return None,
            Some(Self::AndNot) => Self::And,
            Some(Self::OrNot) => Self::Or,
        })
    }

    /// Operator equivalent to a group joined by `outer` whose only child
    /// carries `inner`.
    ///
    /// The child leads its group, so only a `NOT` on it matters; any other
    /// leading operator is ignored, as in evaluation.
    pub fn compose(outer: Option<Self>, inner: Option<Self>) -> Option<Self> {
        match inner {
            Some(Self::Not) => Self::negated(outer),
            _ => outer,
        }
    }
}

impl fmt::Display for BooleanOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison between a field and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparator {
    Equal,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    /// Case-insensitive substring match.
    Like,
}

impl Comparator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::Like => "LIKE",
        }
    }

    /// Parses a comparator symbol or the `LIKE` keyword (any case).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Equal),
            "<" => Some(Self::Less),
            ">" => Some(Self::Greater),
            "<=" => Some(Self::LessOrEqual),
            ">=" => Some(Self::GreaterOrEqual),
            s if s.eq_ignore_ascii_case("LIKE") => Some(Self::Like),
            _ => None,
        }
    }

    /// `<`, `>`, `<=` and `>=`.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::Less | Self::Greater | Self::LessOrEqual | Self::GreaterOrEqual
        )
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `field comparator "literal"` test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combinator: Option<BooleanOperator>,
    /// Field reference: a sid or partial path, optionally followed by
    /// `._metafield`.
    pub field: String,
    pub comparator: Comparator,
    pub literal: String,
}

impl Condition {
    pub fn new(field: &str, comparator: Comparator, literal: &str) -> Self {
        Self {
            combinator: None,
            field: field.to_string(),
            comparator,
            literal: literal.to_string(),
        }
    }

    pub fn with_combinator(mut self, combinator: BooleanOperator) -> Self {
        self.combinator = Some(combinator);
        self
    }
}

/// A parenthesized list of conditions and nested groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combinator: Option<BooleanOperator>,
    #[serde(default)]
    pub children: Vec<ConditionNode>,
}

impl ConditionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_combinator(mut self, combinator: BooleanOperator) -> Self {
        self.combinator = Some(combinator);
        self
    }

    pub fn with_child(mut self, child: impl Into<ConditionNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn push(&mut self, child: impl Into<ConditionNode>) {
        self.children.push(child.into());
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every condition in this group and its nested groups, depth-first.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        collect_conditions(self, &mut out);
        out
    }

    /// Returns `true` if a nested group at any depth has exactly one child,
    /// or this group's only child is a group that could be unwrapped (one not
    /// negated with `NOT`).
    pub fn has_redundant_group(&self) -> bool {
        if let [ConditionNode::Group(only)] = self.children.as_slice()
            && only.combinator != Some(BooleanOperator::Not)
        {
            return true;
        }
        self.children.iter().any(|child| match child {
            ConditionNode::Group(group) => group.children.len() == 1 || group.has_redundant_group(),
            ConditionNode::Condition(_) => false,
        })
    }
}

fn collect_conditions<'a>(group: &'a ConditionGroup, out: &mut Vec<&'a Condition>) {
    for child in &group.children {
        match child {
            ConditionNode::Condition(condition) => out.push(condition),
            ConditionNode::Group(nested) => collect_conditions(nested, out),
        }
    }
}

/// A child of a [`ConditionGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionNode {
    Condition(Condition),
    Group(ConditionGroup),
}

impl ConditionNode {
    pub fn combinator(&self) -> Option<BooleanOperator> {
        match self {
            Self::Condition(c) => c.combinator,
            Self::Group(g) => g.combinator,
        }
    }

    pub fn set_combinator(&mut self, combinator: Option<BooleanOperator>) {
        match self {
            Self::Condition(c) => c.combinator = combinator,
            Self::Group(g) => g.combinator = combinator,
        }
    }
}

impl From<Condition> for ConditionNode {
    fn from(condition: Condition) -> Self {
        Self::Condition(condition)
    }
}

impl From<ConditionGroup> for ConditionNode {
    fn from(group: ConditionGroup) -> Self {
        Self::Group(group)
    }
}

/// One ORDER_BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingTerm {
    pub field: String,
    pub ascending: bool,
}

impl OrderingTerm {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: true,
        }
    }

    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: false,
        }
    }
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchExpression {
    /// Selected field references; `"*"` selects everything.
    #[serde(default)]
    pub select: Vec<String>,
    /// Sid of the queried document type.
    pub source: String,
    #[serde(default, rename = "where")]
    pub where_clause: ConditionGroup,
    #[serde(default)]
    pub order_by: Vec<OrderingTerm>,
}

impl SearchExpression {
    /// Creates `SELECT * FROM <source>` with no conditions.
    pub fn new(source: &str) -> Self {
        Self {
            select: vec!["*".to_string()],
            source: source.to_string(),
            where_clause: ConditionGroup::new(),
            order_by: Vec::new(),
        }
    }

    /// Every field reference in SELECT (except `*`), WHERE and ORDER_BY.
    pub fn field_refs(&self) -> Vec<&str> {
        self.select
            .iter()
            .map(String::as_str)
            .filter(|s| *s != "*")
            .chain(
                self.where_clause
                    .conditions()
                    .into_iter()
                    .map(|c| c.field.as_str()),
            )
            .chain(self.order_by.iter().map(|o| o.field.as_str()))
            .collect()
    }
}

/// Escapes `\` and `"` so the literal survives a round trip through text.
pub fn escape_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn write_combinator(f: &mut fmt::Formatter<'_>, op: Option<BooleanOperator>) -> fmt::Result {
    match op {
        Some(op) => write!(f, "{op} "),
        None => Ok(()),
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, children: &[ConditionNode]) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_combinator(f, self.combinator)?;
        write!(
            f,
            "[{}] {} \"{}\"",
            self.field,
            self.comparator,
            escape_literal(&self.literal)
        )
    }
}

impl fmt::Display for ConditionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_combinator(f, self.combinator)?;
        f.write_str("(")?;
        write_children(f, &self.children)?;
        f.write_str(")")
    }
}

impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(c) => c.fmt(f),
            Self::Group(g) => g.fmt(f),
        }
    }
}

impl fmt::Display for OrderingTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "ASC" } else { "DESC" };
        write!(f, "[{}] {direction}", self.field)
    }
}

impl fmt::Display for SearchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT")?;
        for (i, field) in self.select.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            if field == "*" {
                f.write_str("*")?;
            } else {
                write!(f, "[{field}]")?;
            }
        }
        write!(f, " FROM [{}]", self.source)?;
        if !self.where_clause.is_empty() {
            f.write_str(" WHERE ")?;
            write_children(f, &self.where_clause.children)?;
        }
        for (i, term) in self.order_by.iter().enumerate() {
            f.write_str(if i == 0 { " ORDER_BY " } else { ", " })?;
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_combinators() {
        use BooleanOperator::*;
        assert_eq!(BooleanOperator::compose(Some(And), None), Some(And));
        assert_eq!(BooleanOperator::compose(Some(And), Some(Not)), Some(AndNot));
        assert_eq!(BooleanOperator::compose(Some(Or), Some(Not)), Some(OrNot));
        assert_eq!(BooleanOperator::compose(None, Some(Not)), Some(Not));
        assert_eq!(BooleanOperator::compose(Some(Not), Some(Not)), None);
        assert_eq!(BooleanOperator::compose(Some(AndNot), Some(Not)), Some(And));
        assert_eq!(BooleanOperator::compose(None, None), None);
    }

    #[test]
    fn test_comparator_symbols() {
        assert_eq!(Comparator::from_symbol("<="), Some(Comparator::LessOrEqual));
        assert_eq!(Comparator::from_symbol("like"), Some(Comparator::Like));
        assert_eq!(Comparator::from_symbol("=="), None);
        assert!(Comparator::Greater.is_ordering());
        assert!(!Comparator::Like.is_ordering());
    }

    #[test]
    fn test_display_nested_groups_and_escapes() {
        let mut expr = SearchExpression::new("SI");
        expr.where_clause.push(Condition::new("A", Comparator::Equal, r#"say "hi" \ bye"#));
        expr.where_clause.push(
            ConditionGroup::new()
                .with_combinator(BooleanOperator::Or)
                .with_child(Condition::new("B", Comparator::Greater, "1"))
                .with_child(Condition::new("C._count", Comparator::Less, "3").with_combinator(BooleanOperator::And)),
        );
        assert_eq!(
            expr.to_string(),
            r#"SELECT * FROM [SI] WHERE [A] = "say \"hi\" \\ bye" OR ([B] > "1" AND [C._count] < "3")"#
        );
    }

    #[test]
    fn test_field_refs() {
        let mut expr = SearchExpression::new("SI");
        expr.select = vec!["*".into(), "NCTN".into()];
        expr.where_clause.push(
            ConditionGroup::new().with_child(Condition::new("OGTD", Comparator::Equal, "x")),
        );
        expr.order_by.push(OrderingTerm::ascending("SI._id"));
        assert_eq!(expr.field_refs(), vec!["NCTN", "OGTD", "SI._id"]);
    }

    #[test]
    fn test_redundant_group_detection() {
        let flat = ConditionGroup::new()
            .with_child(Condition::new("A", Comparator::Equal, "1"))
            .with_child(Condition::new("B", Comparator::Equal, "2").with_combinator(BooleanOperator::Or));
        assert!(!flat.has_redundant_group());
        let nested = flat
            .clone()
            .with_child(ConditionGroup::new().with_child(Condition::new("C", Comparator::Equal, "3")));
        assert!(nested.has_redundant_group());

        let root_with_one_condition =
            ConditionGroup::new().with_child(Condition::new("A", Comparator::Equal, "1"));
        assert!(!root_with_one_condition.has_redundant_group());
        let root_with_one_group = ConditionGroup::new().with_child(flat);
        assert!(root_with_one_group.has_redundant_group());
    }

    #[test]
    fn test_serde_shape() {
        let condition = Condition::new("NCTN", Comparator::GreaterOrEqual, "2")
            .with_combinator(BooleanOperator::OrNot);
        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["combinator"], "OR_NOT");
        assert_eq!(json["comparator"], "GREATER_OR_EQUAL");
    }
}
