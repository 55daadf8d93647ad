//! Structural filters over folder-hierarchy attributes.
//!
//! A [`FilterSpec`] holds at most one [`FilterCondition`] per [`FilterField`].
//! [`FilterSpec::compile`] type-checks it into a [`CompiledFilter`], which can
//! be rendered as a SQLite `WHERE` predicate or evaluated directly against a
//! [`FolderHierarchy`]. Both forms always agree.
//!
//! The JSON form mirrors the dictionary filters accepted by the query API:
//!
//! ```json
//! {"folder_depth": {"$lte": 3}, "root_folder": "docs"}
//! ```

use super::hierarchy::FolderHierarchy;
use crate::error::{RetrievalError, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    FolderDepth,
    RootFolder,
    ParentFolder,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [
        FilterField::FolderDepth,
        FilterField::RootFolder,
        FilterField::ParentFolder,
    ];

    /// Column name in the `documents` table
    pub fn column(self) -> &'static str {
        match self {
            FilterField::FolderDepth => "folder_depth",
            FilterField::RootFolder => "root_folder",
            FilterField::ParentFolder => "parent_folder",
        }
    }

    /// Accepts the snake_case column name or its camelCase spelling.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "folder_depth" | "folderDepth" => Some(FilterField::FolderDepth),
            "root_folder" | "rootFolder" => Some(FilterField::RootFolder),
            "parent_folder" | "parentFolder" => Some(FilterField::ParentFolder),
            _ => None,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, FilterField::FolderDepth)
    }

    fn value_of(self, hierarchy: &FolderHierarchy) -> FilterValue {
        match self {
            FilterField::FolderDepth => FilterValue::Integer(hierarchy.folder_depth as i64),
            FilterField::RootFolder => FilterValue::Text(hierarchy.root_folder.clone()),
            FilterField::ParentFolder => FilterValue::Text(hierarchy.parent_folder.clone()),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
}

impl FilterValue {
    fn type_name(&self) -> &'static str {
        match self {
            FilterValue::Integer(_) => "integer",
            FilterValue::Text(_) => "text",
        }
    }

    fn to_sql_literal(&self) -> String {
        match self {
            FilterValue::Integer(n) => n.to_string(),
            FilterValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Integer(a), FilterValue::Integer(b)) => Some(a.cmp(b)),
            // Byte order, same as SQLite's BINARY collation
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(value.into())
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Integer(value as i64)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCondition {
    Equals(FilterValue),
    LessThan(FilterValue),
    LessOrEqual(FilterValue),
    GreaterThan(FilterValue),
    GreaterOrEqual(FilterValue),
}

impl FilterCondition {
    pub fn eq(value: impl Into<FilterValue>) -> Self {
        FilterCondition::Equals(value.into())
    }

    pub fn lt(value: impl Into<FilterValue>) -> Self {
        FilterCondition::LessThan(value.into())
    }

    pub fn lte(value: impl Into<FilterValue>) -> Self {
        FilterCondition::LessOrEqual(value.into())
    }

    pub fn gt(value: impl Into<FilterValue>) -> Self {
        FilterCondition::GreaterThan(value.into())
    }

    pub fn gte(value: impl Into<FilterValue>) -> Self {
        FilterCondition::GreaterOrEqual(value.into())
    }

    pub fn value(&self) -> &FilterValue {
        match self {
            FilterCondition::Equals(v)
            | FilterCondition::LessThan(v)
            | FilterCondition::LessOrEqual(v)
            | FilterCondition::GreaterThan(v)
            | FilterCondition::GreaterOrEqual(v) => v,
        }
    }

    fn sql_operator(&self) -> &'static str {
        match self {
            FilterCondition::Equals(_) => "=",
            FilterCondition::LessThan(_) => "<",
            FilterCondition::LessOrEqual(_) => "<=",
            FilterCondition::GreaterThan(_) => ">",
            FilterCondition::GreaterOrEqual(_) => ">=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            FilterCondition::Equals(_) => ordering == Ordering::Equal,
            FilterCondition::LessThan(_) => ordering == Ordering::Less,
            FilterCondition::LessOrEqual(_) => ordering != Ordering::Greater,
            FilterCondition::GreaterThan(_) => ordering == Ordering::Greater,
            FilterCondition::GreaterOrEqual(_) => ordering != Ordering::Less,
        }
    }

    fn from_operator(operator: &str, value: FilterValue) -> Option<Self> {
        match operator {
            "$lt" => Some(FilterCondition::LessThan(value)),
            "$lte" => Some(FilterCondition::LessOrEqual(value)),
            "$gt" => Some(FilterCondition::GreaterThan(value)),
            "$gte" => Some(FilterCondition::GreaterOrEqual(value)),
            _ => None,
        }
    }
}

/// Per-query structural constraints, one condition per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    conditions: BTreeMap<FilterField, FilterCondition>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the condition for `field`, replacing any previous one.
    pub fn with(mut self, field: FilterField, condition: FilterCondition) -> Self {
        self.conditions.insert(field, condition);
        self
    }

    pub fn folder_depth(self, condition: FilterCondition) -> Self {
        self.with(FilterField::FolderDepth, condition)
    }

    pub fn root_folder(self, condition: FilterCondition) -> Self {
        self.with(FilterField::RootFolder, condition)
    }

    pub fn parent_folder(self, condition: FilterCondition) -> Self {
        self.with(FilterField::ParentFolder, condition)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn get(&self, field: FilterField) -> Option<&FilterCondition> {
        self.conditions.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &FilterCondition)> {
        self.conditions.iter().map(|(field, cond)| (*field, cond))
    }

    /// Parse the JSON dictionary form.
    ///
    /// Keys are field names; values are either a bare scalar (equality) or a
    /// single-entry object keyed by `$lt`, `$lte`, `$gt` or `$gte`. `null`
    /// is an empty filter.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(object) => object,
            other => {
                return Err(RetrievalError::filter(format!(
                    "filter must be a JSON object, got {other}"
                )));
            }
        };

        let mut spec = Self::new();
        for (key, raw) in object {
            let field = FilterField::parse(key)
                .ok_or_else(|| RetrievalError::filter(format!("unknown filter field '{key}'")))?;
            if spec.conditions.contains_key(&field) {
                return Err(RetrievalError::filter(format!(
                    "field '{field}' is given more than once"
                )));
            }

            let condition = match raw {
                Value::Object(ops) => {
                    let mut entries = ops.iter();
                    let (Some((operator, operand)), None) = (entries.next(), entries.next()) else {
                        return Err(RetrievalError::filter(format!(
                            "condition on '{field}' must have exactly one operator"
                        )));
                    };
                    let operand = json_value(field, operand)?;
                    FilterCondition::from_operator(operator, operand).ok_or_else(|| {
                        RetrievalError::filter(format!(
                            "unknown operator '{operator}' on '{field}'"
                        ))
                    })?
                }
                scalar => FilterCondition::Equals(json_value(field, scalar)?),
            };
            spec.conditions.insert(field, condition);
        }
        Ok(spec)
    }

    /// Type-check the conditions into an executable predicate.
    pub fn compile(&self) -> Result<CompiledFilter> {
        let mut clauses = Vec::with_capacity(self.conditions.len());
        for (field, condition) in &self.conditions {
            let value = condition.value();
            let type_ok = match value {
                FilterValue::Integer(_) => field.is_integer(),
                FilterValue::Text(_) => !field.is_integer(),
            };
            if !type_ok {
                return Err(RetrievalError::filter(format!(
                    "'{field}' cannot be compared with a {} value",
                    value.type_name()
                )));
            }
            // SQLite stops tokenizing at NUL, so such a literal cannot be rendered
            if matches!(value, FilterValue::Text(text) if text.contains('\0')) {
                return Err(RetrievalError::filter(format!(
                    "'{field}' value contains a NUL character"
                )));
            }
            clauses.push((*field, condition.clone()));
        }
        Ok(CompiledFilter { clauses })
    }
}

fn json_value(field: FilterField, value: &Value) -> Result<FilterValue> {
    let parsed = if field.is_integer() {
        value.as_i64().map(FilterValue::Integer)
    } else {
        value.as_str().map(FilterValue::from)
    };
    parsed.ok_or_else(|| {
        let expected = if field.is_integer() { "an integer" } else { "a string" };
        RetrievalError::filter(format!("'{field}' expects {expected}, got {value}"))
    })
}

/// A validated conjunction of field conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledFilter {
    clauses: Vec<(FilterField, FilterCondition)>,
}

impl CompiledFilter {
    /// The filter that accepts every document
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn is_match_all(&self) -> bool {
        self.clauses.is_empty()
    }

    /// SQLite predicate over the `documents` columns.
    pub fn to_sql(&self) -> String {
        if self.clauses.is_empty() {
            return "1 = 1".to_string();
        }
        self.clauses
            .iter()
            .map(|(field, condition)| {
                format!(
                    "{} {} {}",
                    field.column(),
                    condition.sql_operator(),
                    condition.value().to_sql_literal()
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Evaluate the predicate in memory.
    pub fn matches(&self, hierarchy: &FolderHierarchy) -> bool {
        self.clauses.iter().all(|(field, condition)| {
            field
                .value_of(hierarchy)
                .compare(condition.value())
                .is_some_and(|ordering| condition.accepts(ordering))
        })
    }
}

impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hierarchy(depth: u32, root: &str, parent: &str) -> FolderHierarchy {
        FolderHierarchy {
            folder_depth: depth,
            root_folder: root.to_string(),
            parent_folder: parent.to_string(),
            full_path: String::new(),
        }
    }

    #[test]
    fn test_depth_and_root_filter() {
        let compiled = FilterSpec::new()
            .folder_depth(FilterCondition::lte(3))
            .root_folder(FilterCondition::eq("docs"))
            .compile()
            .unwrap();

        assert!(compiled.matches(&hierarchy(2, "docs", "a")));
        assert!(compiled.matches(&hierarchy(3, "docs", "a")));
        assert!(!compiled.matches(&hierarchy(4, "docs", "a")));
        assert!(!compiled.matches(&hierarchy(2, "other", "a")));
        assert_eq!(compiled.to_sql(), "folder_depth <= 3 AND root_folder = 'docs'");
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        let compiled = FilterSpec::new().compile().unwrap();
        assert!(compiled.is_match_all());
        assert_eq!(compiled, CompiledFilter::match_all());
        assert_eq!(compiled.to_sql(), "1 = 1");
        assert!(compiled.matches(&hierarchy(0, "", "")));
        assert!(compiled.matches(&hierarchy(9, "x", "y")));
    }

    #[test]
    fn test_all_operators() {
        let h = hierarchy(2, "docs", "b");
        let check = |cond: FilterCondition| {
            FilterSpec::new()
                .folder_depth(cond)
                .compile()
                .unwrap()
                .matches(&h)
        };

        assert!(check(FilterCondition::eq(2)));
        assert!(!check(FilterCondition::eq(1)));
        assert!(check(FilterCondition::lt(3)));
        assert!(!check(FilterCondition::lt(2)));
        assert!(check(FilterCondition::lte(2)));
        assert!(check(FilterCondition::gt(1)));
        assert!(!check(FilterCondition::gt(2)));
        assert!(check(FilterCondition::gte(2)));
        assert!(!check(FilterCondition::gte(3)));
    }

    #[test]
    fn test_quotes_are_escaped() {
        let compiled = FilterSpec::new()
            .parent_folder(FilterCondition::eq("o'brien"))
            .compile()
            .unwrap();
        assert_eq!(compiled.to_sql(), "parent_folder = 'o''brien'");
        assert_eq!(compiled.to_string(), compiled.to_sql());
        assert!(compiled.matches(&hierarchy(1, "x", "o'brien")));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let err = FilterSpec::new()
            .folder_depth(FilterCondition::eq("two"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, RetrievalError::FilterCompile(_)));

        let err = FilterSpec::new()
            .root_folder(FilterCondition::gt(3))
            .compile()
            .unwrap_err();
        assert!(matches!(err, RetrievalError::FilterCompile(_)));
    }

    #[test]
    fn test_with_replaces_condition() {
        let spec = FilterSpec::new()
            .folder_depth(FilterCondition::lte(3))
            .folder_depth(FilterCondition::gte(1));
        assert_eq!(spec.len(), 1);
        assert_eq!(
            spec.get(FilterField::FolderDepth),
            Some(&FilterCondition::gte(1))
        );
    }

    #[test]
    fn test_from_json() {
        let spec = FilterSpec::from_json(&json!({
            "folder_depth": {"$lte": 3},
            "rootFolder": "docs",
        }))
        .unwrap();

        assert_eq!(
            spec,
            FilterSpec::new()
                .folder_depth(FilterCondition::lte(3))
                .root_folder(FilterCondition::eq("docs"))
        );
        assert!(FilterSpec::from_json(&Value::Null).unwrap().is_empty());
        assert!(FilterSpec::from_json(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_from_json_all_operators() {
        for (op, expected) in [
            ("$lt", FilterCondition::lt(2)),
            ("$lte", FilterCondition::lte(2)),
            ("$gt", FilterCondition::gt(2)),
            ("$gte", FilterCondition::gte(2)),
        ] {
            let spec = FilterSpec::from_json(&json!({ "folder_depth": { op: 2 } })).unwrap();
            assert_eq!(spec.get(FilterField::FolderDepth), Some(&expected));
        }
    }

    #[test]
    fn test_unknown_operator_is_error() {
        let err = FilterSpec::from_json(&json!({"folder_depth": {"$ne": 3}})).unwrap_err();
        assert!(matches!(err, RetrievalError::FilterCompile(_)));
        assert!(err.to_string().contains("$ne"));
    }

    #[test]
    fn test_malformed_json_filters() {
        let cases = [
            json!({"depth": 3}),
            json!({"folder_depth": {"$lt": 3, "$gt": 1}}),
            json!({"folder_depth": {}}),
            json!({"folder_depth": "3"}),
            json!({"root_folder": 7}),
            json!({"folder_depth": 1, "folderDepth": 2}),
            json!(["folder_depth"]),
        ];
        for case in cases {
            let result = FilterSpec::from_json(&case);
            assert!(
                matches!(result, Err(RetrievalError::FilterCompile(_))),
                "expected error for {case}"
            );
        }
    }

    #[test]
    fn test_text_ordering_is_bytewise() {
        let compiled = FilterSpec::new()
            .root_folder(FilterCondition::lt("b"))
            .compile()
            .unwrap();
        assert!(compiled.matches(&hierarchy(1, "a", "a")));
        assert!(compiled.matches(&hierarchy(1, "B", "B")));
        assert!(!compiled.matches(&hierarchy(1, "c", "c")));
    }

    #[test]
    fn test_integer_literals_convert() {
        assert_eq!(
            FilterCondition::lte(3),
            FilterCondition::LessOrEqual(FilterValue::Integer(3))
        );
        assert_eq!(FilterCondition::gt(-1).value(), &FilterValue::Integer(-1));
        assert_eq!(FilterCondition::eq(2u32), FilterCondition::eq(2i64));
    }

    #[test]
    fn test_nul_in_text_rejected() {
        let err = FilterSpec::new()
            .parent_folder(FilterCondition::eq("do\0cs"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, RetrievalError::FilterCompile(_)));

        let spec = FilterSpec::from_json(&json!({"root_folder": "do\0cs"})).unwrap();
        assert!(matches!(
            spec.compile(),
            Err(RetrievalError::FilterCompile(_))
        ));
    }
}
