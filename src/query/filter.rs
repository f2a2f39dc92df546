//! Tag filter expressions
//!
//! A [`FilterExpression`] is a tree of tag-equality tests joined by `and` /
//! `or`. Construction never fails; everything is checked when the tree is
//! rendered into a Flux `filter()` call.
//!
//! ```text
//! And[{building: X}, Or[{trait: A}, {trait: B}]]
//!   => filter(fn: (r) => r["building"] == "X" and (r["trait"] == "A" or r["trait"] == "B"))
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Boolean combinator applied among the children of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    /// Flux keyword for this operator
    pub fn keyword(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            _ => Err(Error::Validation(format!(
                "Unknown operator: '{}'. Valid operators are: and, or",
                s
            ))),
        }
    }
}

/// Ordered tag key → value mapping
///
/// Every pair becomes one `r["key"] == "value"` test. Insertion order is
/// kept; setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagConstraint {
    pairs: Vec<(String, String)>,
}

impl TagConstraint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`TagConstraint::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for TagConstraint
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = TagConstraint::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for TagConstraint
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// One child of a [`FilterExpression`]
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Tag equality tests, joined with the parent's operator
    Leaf(TagConstraint),
    /// Nested expression, parenthesised when it has more than one term
    Group(FilterExpression),
    /// A value from a filter document that is neither of the above.
    /// Kept as-is so the error surfaces at render time.
    Unsupported(Value),
}

impl From<TagConstraint> for FilterNode {
    fn from(tags: TagConstraint) -> Self {
        FilterNode::Leaf(tags)
    }
}

impl From<FilterExpression> for FilterNode {
    fn from(expr: FilterExpression) -> Self {
        FilterNode::Group(expr)
    }
}

impl From<Value> for FilterNode {
    /// Classify a JSON value: an object carrying `operator` is a nested
    /// expression, an object of strings is a tag mapping.
    fn from(value: Value) -> Self {
        let Value::Object(map) = &value else {
            return FilterNode::Unsupported(value);
        };

        if map.contains_key("operator") {
            return match FilterExpression::from_document(value.clone()) {
                Ok(expr) => FilterNode::Group(expr),
                Err(_) => FilterNode::Unsupported(value),
            };
        }

        let mut tags = TagConstraint::new();
        for (key, v) in map {
            match v {
                Value::String(s) => tags.insert(key.as_str(), s.as_str()),
                _ => return FilterNode::Unsupported(value),
            }
        }
        FilterNode::Leaf(tags)
    }
}

/// Boolean combination of tag constraints and nested expressions
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    operator: Operator,
    children: Vec<FilterNode>,
}

impl FilterExpression {
    pub fn new<I, C>(operator: Operator, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<FilterNode>,
    {
        Self {
            operator,
            children: children.into_iter().map(Into::into).collect(),
        }
    }

    /// Expression over a single tag mapping
    pub fn tags(operator: Operator, tags: impl Into<TagConstraint>) -> Self {
        Self::new(operator, [FilterNode::Leaf(tags.into())])
    }

    pub fn and<I, C>(children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<FilterNode>,
    {
        Self::new(Operator::And, children)
    }

    pub fn or<I, C>(children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<FilterNode>,
    {
        Self::new(Operator::Or, children)
    }

    /// Build from an operator and an untyped value: an array is a list of
    /// children, anything else is a single child.
    pub fn from_value(operator: Operator, children: Value) -> Self {
        match children {
            Value::Array(items) => Self::new(operator, items),
            other => Self::new(operator, [other]),
        }
    }

    /// Parse a filter document
    ///
    /// ```json
    /// {"operator": "and", "children": [{"building": "b1"}, {"operator": "or", "children": [...]}]}
    /// ```
    ///
    /// Only the top-level shape is checked here; children are classified
    /// and validated when rendered.
    pub fn from_document(document: Value) -> Result<Self> {
        let Value::Object(mut map) = document else {
            return Err(Error::Validation(
                "filter document must be a JSON object".to_string(),
            ));
        };

        let operator = match map.get("operator") {
            Some(Value::String(op)) => op.parse::<Operator>()?,
            _ => {
                return Err(Error::Validation(
                    "filter document requires a string 'operator'".to_string(),
                ))
            }
        };

        let children = map.remove("children").ok_or_else(|| {
            Error::Validation("filter document requires 'children'".to_string())
        })?;

        Ok(Self::from_value(operator, children))
    }

    /// Parse a filter document from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| Error::Validation(format!("invalid filter JSON: {}", e)))?;
        Self::from_document(document)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn children(&self) -> &[FilterNode] {
        &self.children
    }

    /// Append a child
    pub fn push(&mut self, child: impl Into<FilterNode>) {
        self.children.push(child.into());
    }

    /// Render as a Flux `filter()` call
    pub fn render(&self) -> Result<String> {
        Ok(format!("filter(fn: (r) => {})", self.predicate()?))
    }

    /// Render only the boolean expression inside the filter function
    pub fn predicate(&self) -> Result<String> {
        Ok(self.terms()?.join(&self.joiner()))
    }

    fn joiner(&self) -> String {
        format!(" {} ", self.operator.keyword())
    }

    /// Top-level terms of this node, in child order
    fn terms(&self) -> Result<Vec<String>> {
        if self.children.is_empty() {
            return Err(Error::EmptyFilter(
                "filter expression has no children".to_string(),
            ));
        }

        let mut terms = Vec::new();
        for (index, child) in self.children.iter().enumerate() {
            match child {
                FilterNode::Leaf(tags) => {
                    if tags.is_empty() {
                        return Err(Error::EmptyFilter(format!(
                            "tag mapping at position {} has no key/value pairs",
                            index
                        )));
                    }
                    terms.extend(tags.iter().map(|(k, v)| equality(k, v)));
                }
                FilterNode::Group(expr) => {
                    let mut inner = expr.terms()?;
                    if inner.len() == 1 {
                        terms.append(&mut inner);
                    } else {
                        terms.push(format!("({})", inner.join(&expr.joiner())));
                    }
                }
                FilterNode::Unsupported(value) => {
                    return Err(Error::UnsupportedChild(format!(
                        "child at position {} is {}, expected a tag mapping or a filter expression",
                        index,
                        describe(value)
                    )));
                }
            }
        }

        Ok(terms)
    }
}

fn equality(key: &str, value: &str) -> String {
    format!("r[\"{}\"] == \"{}\"", key, value)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("a boolean ({})", b),
        Value::Number(n) => format!("a number ({})", n),
        Value::String(s) => format!("a string ({:?})", s),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object with non-string values".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_single_pair() {
        let filter = FilterExpression::tags(Operator::And, [("asd", "dsa")]);
        assert_eq!(filter.render().unwrap(), r#"filter(fn: (r) => r["asd"] == "dsa")"#);

        let filter = FilterExpression::tags(Operator::And, [("dsa", "asd")]);
        assert_eq!(filter.render().unwrap(), r#"filter(fn: (r) => r["dsa"] == "asd")"#);
    }

    #[test]
    fn test_list_with_single_mapping() {
        let filter = FilterExpression::and([TagConstraint::from([("asd", "dsa")])]);
        assert_eq!(filter.render().unwrap(), r#"filter(fn: (r) => r["asd"] == "dsa")"#);
    }

    #[test]
    fn test_mapping_pairs_use_node_operator() {
        let filter = FilterExpression::tags(Operator::And, [("asd", "dsa"), ("dsa", "asd")]);
        assert_eq!(
            filter.render().unwrap(),
            r#"filter(fn: (r) => r["asd"] == "dsa" and r["dsa"] == "asd")"#
        );

        let filter = FilterExpression::tags(Operator::Or, [("asd", "dsa"), ("dsa", "asd")]);
        assert_eq!(
            filter.render().unwrap(),
            r#"filter(fn: (r) => r["asd"] == "dsa" or r["dsa"] == "asd")"#
        );
    }

    #[test]
    fn test_nested_expression_is_parenthesised() {
        let filter = FilterExpression::and([
            FilterNode::from(TagConstraint::from([("asd", "dsa")])),
            FilterExpression::tags(Operator::Or, [("asd", "dsa"), ("dsa", "asd")]).into(),
        ]);
        assert_eq!(
            filter.render().unwrap(),
            r#"filter(fn: (r) => r["asd"] == "dsa" and (r["asd"] == "dsa" or r["dsa"] == "asd"))"#
        );
    }

    #[test]
    fn test_single_term_group_is_spliced() {
        let filter = FilterExpression::and([
            FilterExpression::tags(Operator::And, [("asd", "dsa")]),
            FilterExpression::tags(Operator::Or, [("asd", "dsa"), ("dsa", "asd")]),
        ]);
        assert_eq!(
            filter.render().unwrap(),
            r#"filter(fn: (r) => r["asd"] == "dsa" and (r["asd"] == "dsa" or r["dsa"] == "asd"))"#
        );
    }

    #[test]
    fn test_realistic_nesting() {
        let filter = FilterExpression::and([
            FilterNode::from(TagConstraint::from([(
                "building",
                "c2c1bf16-bab9-4ca9-bd21-dad5084e1193",
            )])),
            FilterExpression::or([
                TagConstraint::from([("trait", "b5734a99-7737-4c39-bfe8-f7dcad33dc8c")]),
                TagConstraint::from([("trait", "57da1fa3-2742-43b0-9975-c234043a380d")]),
            ])
            .into(),
        ]);
        assert_eq!(
            filter.render().unwrap(),
            concat!(
                r#"filter(fn: (r) => r["building"] == "c2c1bf16-bab9-4ca9-bd21-dad5084e1193""#,
                r#" and (r["trait"] == "b5734a99-7737-4c39-bfe8-f7dcad33dc8c""#,
                r#" or r["trait"] == "57da1fa3-2742-43b0-9975-c234043a380d"))"#
            )
        );
    }

    #[test]
    fn test_deep_nesting_keeps_inner_parentheses() {
        let inner = FilterExpression::tags(Operator::And, [("a", "1"), ("b", "2")]);
        let middle = FilterExpression::or([
            FilterNode::from(inner),
            TagConstraint::from([("c", "3")]).into(),
        ]);
        let outer = FilterExpression::and([
            FilterNode::from(TagConstraint::from([("d", "4")])),
            middle.into(),
        ]);
        assert_eq!(
            outer.predicate().unwrap(),
            r#"r["d"] == "4" and ((r["a"] == "1" and r["b"] == "2") or r["c"] == "3")"#
        );
    }

    #[test]
    fn test_values_are_not_escaped() {
        let filter = FilterExpression::tags(Operator::And, [("Key", r#"Va"lue"#)]);
        assert_eq!(filter.predicate().unwrap(), r#"r["Key"] == "Va"lue""#);
    }

    #[test]
    fn test_string_child_fails_at_render() {
        let filter = FilterExpression::from_value(Operator::And, json!("this is bullshit."));
        let err = filter.render().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_number_child_fails_after_valid_children() {
        let filter = FilterExpression::from_value(Operator::Or, json!([{"a": "b"}, 42]));
        let err = filter.render().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn test_empty_filters() {
        let filter = FilterExpression::and(Vec::<FilterNode>::new());
        assert_eq!(filter.render().unwrap_err().kind(), ErrorKind::EmptyFilter);

        let filter = FilterExpression::tags(Operator::And, TagConstraint::new());
        assert_eq!(filter.render().unwrap_err().kind(), ErrorKind::EmptyFilter);

        let filter = FilterExpression::and([
            FilterNode::from(TagConstraint::from([("a", "b")])),
            FilterExpression::or(Vec::<FilterNode>::new()).into(),
        ]);
        assert_eq!(filter.render().unwrap_err().kind(), ErrorKind::EmptyFilter);
    }

    #[test]
    fn test_from_document() {
        let filter = FilterExpression::from_json(
            r#"{"operator": "and", "children": [
                {"building": "b1"},
                {"operator": "or", "children": [{"trait": "t1"}, {"trait": "t2"}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(filter.operator(), Operator::And);
        assert_eq!(
            filter.predicate().unwrap(),
            r#"r["building"] == "b1" and (r["trait"] == "t1" or r["trait"] == "t2")"#
        );
    }

    #[test]
    fn test_document_mapping_keeps_key_order() {
        let filter =
            FilterExpression::from_json(r#"{"operator": "OR", "children": {"z": "1", "a": "2"}}"#)
                .unwrap();
        assert_eq!(filter.predicate().unwrap(), r#"r["z"] == "1" or r["a"] == "2""#);
    }

    #[test]
    fn test_document_shape_errors() {
        assert!(FilterExpression::from_json("[1, 2]").is_err());
        assert!(FilterExpression::from_json(r#"{"operator": "xor", "children": []}"#).is_err());
        assert!(FilterExpression::from_json(r#"{"operator": "and"}"#).is_err());

        // A mapping with a non-string value is only rejected when rendered
        let filter =
            FilterExpression::from_json(r#"{"operator": "and", "children": [{"n": 1}]}"#).unwrap();
        assert_eq!(filter.render().unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn test_malformed_json_is_a_validation_error() {
        let err = FilterExpression::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("invalid filter JSON"));
    }

    #[test]
    fn test_tag_constraint_insert_replaces_in_place() {
        let tags = TagConstraint::new()
            .with("a", "1")
            .with("b", "2")
            .with("a", "3");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("a"), Some("3"));
        assert_eq!(
            tags.iter().collect::<Vec<_>>(),
            vec![("a", "3"), ("b", "2")]
        );
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!("AND".parse::<Operator>().unwrap(), Operator::And);
        assert_eq!("or".parse::<Operator>().unwrap(), Operator::Or);
        assert!("not".parse::<Operator>().is_err());
    }
}
