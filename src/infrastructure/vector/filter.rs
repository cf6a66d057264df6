//! Attribute filter predicates
//!
//! A small boolean predicate tree over index properties, serializable
//! to the index's native `where` grammar (JSON for the REST surface,
//! inline arguments for GraphQL) and evaluatable locally for the
//! embedded backend.

use serde_json::{json, Map, Value};

use crate::domain::document::props;
use crate::domain::SearchCriteria;

/// A typed predicate operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Number(f64),
    Bool(bool),
}

impl FilterValue {
    /// Key the value is serialized under in the `where` grammar.
    fn type_key(&self) -> &'static str {
        match self {
            FilterValue::Text(_) => "valueText",
            FilterValue::Int(_) => "valueInt",
            FilterValue::Number(_) => "valueNumber",
            FilterValue::Bool(_) => "valueBoolean",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FilterValue::Text(v) => Value::String(v.clone()),
            FilterValue::Int(v) => Value::from(*v),
            FilterValue::Number(v) => Value::from(*v),
            FilterValue::Bool(v) => Value::Bool(*v),
        }
    }

    fn to_graphql(&self) -> String {
        match self {
            FilterValue::Text(v) => format!("\"{}\"", escape_graphql(v)),
            FilterValue::Int(v) => v.to_string(),
            FilterValue::Number(v) => v.to_string(),
            FilterValue::Bool(v) => v.to_string(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::Int(v as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Number(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

/// Comparison operators, named as the index grammar names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThanEqual,
    LessThanEqual,
    Like,
}

impl Operator {
    fn name(&self) -> &'static str {
        match self {
            Operator::Equal => "Equal",
            Operator::NotEqual => "NotEqual",
            Operator::GreaterThanEqual => "GreaterThanEqual",
            Operator::LessThanEqual => "LessThanEqual",
            Operator::Like => "Like",
        }
    }
}

/// One leaf comparison on a property path.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub path: Vec<String>,
    pub operator: Operator,
    pub value: FilterValue,
}

impl Predicate {
    pub fn new(property: &str, operator: Operator, value: impl Into<FilterValue>) -> Self {
        Self {
            path: vec![property.to_string()],
            operator,
            value: value.into(),
        }
    }
}

/// A boolean tree of predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Leaf(Predicate),
}

/// Equality leaf shorthand.
pub fn eq(property: &str, value: impl Into<FilterValue>) -> FilterNode {
    FilterNode::Leaf(Predicate::new(property, Operator::Equal, value))
}

impl FilterNode {
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::And(children)
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Or(children)
    }

    /// Serialize to the REST `where` grammar.
    pub fn to_where_json(&self) -> Value {
        match self {
            FilterNode::And(children) => json!({
                "operator": "And",
                "operands": children.iter().map(|c| c.to_where_json()).collect::<Vec<_>>(),
            }),
            FilterNode::Or(children) => json!({
                "operator": "Or",
                "operands": children.iter().map(|c| c.to_where_json()).collect::<Vec<_>>(),
            }),
            FilterNode::Leaf(predicate) => {
                let mut object = Map::new();
                object.insert("path".to_string(), json!(predicate.path));
                object.insert(
                    "operator".to_string(),
                    Value::String(predicate.operator.name().to_string()),
                );
                object.insert(
                    predicate.value.type_key().to_string(),
                    predicate.value.to_json(),
                );
                Value::Object(object)
            }
        }
    }

    /// Serialize to an inline GraphQL `where` argument.
    pub fn to_graphql(&self) -> String {
        match self {
            FilterNode::And(children) => format!(
                "{{operator: And, operands: [{}]}}",
                children
                    .iter()
                    .map(|c| c.to_graphql())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            FilterNode::Or(children) => format!(
                "{{operator: Or, operands: [{}]}}",
                children
                    .iter()
                    .map(|c| c.to_graphql())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            FilterNode::Leaf(predicate) => {
                let path = predicate
                    .path
                    .iter()
                    .map(|p| format!("\"{}\"", escape_graphql(p)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{{path: [{}], operator: {}, {}: {}}}",
                    path,
                    predicate.operator.name(),
                    predicate.value.type_key(),
                    predicate.value.to_graphql()
                )
            }
        }
    }

    /// Evaluate against a stored property map.
    ///
    /// Null or absent properties never match, whatever the operator.
    pub fn matches(&self, properties: &Map<String, Value>) -> bool {
        match self {
            FilterNode::And(children) => children.iter().all(|c| c.matches(properties)),
            FilterNode::Or(children) => children.iter().any(|c| c.matches(properties)),
            FilterNode::Leaf(predicate) => {
                let Some(first) = predicate.path.first() else {
                    return false;
                };
                match properties.get(first) {
                    None | Some(Value::Null) => false,
                    Some(stored) => predicate_matches(predicate, stored),
                }
            }
        }
    }
}

fn predicate_matches(predicate: &Predicate, stored: &Value) -> bool {
    match predicate.operator {
        Operator::Equal => values_equal(&predicate.value, stored),
        Operator::NotEqual => !values_equal(&predicate.value, stored),
        Operator::GreaterThanEqual => compare(stored, &predicate.value)
            .map(|ordering| ordering.is_ge())
            .unwrap_or(false),
        Operator::LessThanEqual => compare(stored, &predicate.value)
            .map(|ordering| ordering.is_le())
            .unwrap_or(false),
        Operator::Like => match (&predicate.value, stored) {
            (FilterValue::Text(pattern), Value::String(text)) => like_matches(pattern, text),
            _ => false,
        },
    }
}

fn values_equal(wanted: &FilterValue, stored: &Value) -> bool {
    match (wanted, stored) {
        (FilterValue::Text(w), Value::String(s)) => w == s,
        (FilterValue::Int(w), Value::Number(s)) => s.as_i64() == Some(*w),
        (FilterValue::Number(w), Value::Number(s)) => s.as_f64() == Some(*w),
        (FilterValue::Bool(w), Value::Bool(s)) => w == s,
        _ => false,
    }
}

fn compare(stored: &Value, wanted: &FilterValue) -> Option<std::cmp::Ordering> {
    match (stored, wanted) {
        (Value::Number(s), FilterValue::Int(w)) => s.as_i64().map(|s| s.cmp(w)),
        (Value::Number(s), FilterValue::Number(w)) => {
            s.as_f64().and_then(|s| s.partial_cmp(w))
        }
        (Value::String(s), FilterValue::Text(w)) => Some(s.as_str().cmp(w.as_str())),
        _ => None,
    }
}

/// Glob match with `*` wildcards, as the index `Like` operator does it.
fn like_matches(pattern: &str, text: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == text;
    }

    let mut position = 0;
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if index == 0 {
            if !text.starts_with(segment) {
                return false;
            }
            position = segment.len();
        } else if index == segments.len() - 1 {
            return text.len() >= position && text[position..].ends_with(segment);
        } else {
            match text[position..].find(segment) {
                Some(found) => position += found + segment.len(),
                None => return false,
            }
        }
    }
    true
}

fn escape_graphql(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Translate structured search criteria into the index predicate tree.
///
/// Present, non-empty fields become equality predicates; absent fields
/// contribute nothing. A `resolved == false` predicate is always
/// appended, so closed reports can never surface in similarity search.
pub fn search_filter(criteria: &SearchCriteria) -> FilterNode {
    let mut predicates = Vec::new();

    if let Some(report_type) = criteria.report_type {
        predicates.push(eq(props::TYPE, report_type.to_string()));
    }
    push_text(&mut predicates, props::NAME, criteria.name.as_deref());
    push_text(&mut predicates, props::BREED, criteria.breed.as_deref());
    push_text(&mut predicates, props::COLOR, criteria.color.as_deref());
    push_text(&mut predicates, props::SIZE, criteria.size.as_deref());
    if let Some(sex) = criteria.sex {
        predicates.push(eq(props::SEX, sex.to_string()));
    }
    if let Some(age_group) = criteria.age_group {
        predicates.push(eq(props::AGE_GROUP, age_group.to_string()));
    }
    push_text(
        &mut predicates,
        props::CHIP_NUMBER,
        criteria.chip_number.as_deref(),
    );
    push_text(&mut predicates, props::LOCATION, criteria.location.as_deref());

    predicates.push(eq(props::RESOLVED, false));

    FilterNode::and(predicates)
}

fn push_text(predicates: &mut Vec<FilterNode>, property: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !value.is_empty() {
            predicates.push(eq(property, value));
        }
    }
}
