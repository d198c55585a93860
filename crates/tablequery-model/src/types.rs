//! Shared enums and structs of the query request model.
//!
//! All types follow the JSON wire format with `PascalCase` field names.
//! Enum variants use idiomatic Rust `PascalCase` naming with `#[serde(rename)]`
//! attributes mapping to the `SCREAMING_SNAKE_CASE` wire names. Every enum also
//! implements [`FromStr`] so string-typed callers go through a single parse
//! step at the boundary.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;
use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Aliases
// ---------------------------------------------------------------------------

/// An item: attribute name to value, in no particular order.
pub type Item = HashMap<String, AttributeValue>;

/// A primary key: the key attributes of an item.
pub type Key = HashMap<String, AttributeValue>;

/// `#name` placeholder to attribute name.
pub type ExpressionAttributeNames = HashMap<String, String>;

/// `:value` placeholder to attribute value.
pub type ExpressionAttributeValues = HashMap<String, AttributeValue>;

// ---------------------------------------------------------------------------
// Enum parsing
// ---------------------------------------------------------------------------

/// A wire name that does not belong to the expected enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    /// Parameter the value was supplied for.
    pub parameter: &'static str,
    /// The rejected value.
    pub value: String,
    /// Accepted wire names.
    pub allowed: &'static [&'static str],
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "1 validation error detected: Value '{}' at '{}' failed to satisfy constraint: \
             Member must satisfy enum value set: [{}]",
            self.value,
            self.parameter,
            self.allowed.join(", ")
        )
    }
}

impl std::error::Error for ParseEnumError {}

impl From<ParseEnumError> for QueryError {
    fn from(e: ParseEnumError) -> Self {
        QueryError::invalid_spec(e.to_string())
    }
}

fn parse_wire<T: Copy>(
    parameter: &'static str,
    value: &str,
    table: &[(&'static str, T)],
    allowed: &'static [&'static str],
) -> Result<T, ParseEnumError> {
    table
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, v)| *v)
        .ok_or_else(|| ParseEnumError {
            parameter,
            value: value.to_owned(),
            allowed,
        })
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Scalar attribute types allowed for key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    /// String type.
    S,
    /// Number type.
    N,
    /// Binary type.
    B,
}

impl ScalarAttributeType {
    /// Returns the wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
        }
    }

    /// Returns `true` if `value` has this type.
    #[must_use]
    pub fn matches(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (Self::S, AttributeValue::S(_))
                | (Self::N, AttributeValue::N(_))
                | (Self::B, AttributeValue::B(_))
        )
    }
}

impl fmt::Display for ScalarAttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projection type of a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProjectionType {
    /// All attributes from the table are projected into the index.
    #[default]
    #[serde(rename = "ALL")]
    All,
    /// Only the index and primary keys are projected.
    #[serde(rename = "KEYS_ONLY")]
    KeysOnly,
    /// Only specified non-key attributes are projected alongside keys.
    #[serde(rename = "INCLUDE")]
    Include,
}

impl ProjectionType {
    /// Returns the wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::KeysOnly => "KEYS_ONLY",
            Self::Include => "INCLUDE",
        }
    }
}

impl fmt::Display for ProjectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls whether consumed capacity information is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnConsumedCapacity {
    /// Return consumed capacity for the table and any indexes involved.
    #[serde(rename = "INDEXES")]
    Indexes,
    /// Return only the total consumed capacity.
    #[serde(rename = "TOTAL")]
    Total,
    /// Do not return consumed capacity (default).
    #[default]
    #[serde(rename = "NONE")]
    None,
}

impl ReturnConsumedCapacity {
    const NAMES: &'static [&'static str] = &["INDEXES", "TOTAL", "NONE"];

    /// Returns the wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexes => "INDEXES",
            Self::Total => "TOTAL",
            Self::None => "NONE",
        }
    }

    /// Returns `true` if capacity should be reported at all.
    #[must_use]
    pub fn should_report(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns `true` if per-table and per-index capacity should be reported.
    #[must_use]
    pub fn should_report_indexes(&self) -> bool {
        matches!(self, Self::Indexes)
    }
}

impl FromStr for ReturnConsumedCapacity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_wire(
            "returnConsumedCapacity",
            s,
            &[
                ("INDEXES", Self::Indexes),
                ("TOTAL", Self::Total),
                ("NONE", Self::None),
            ],
            Self::NAMES,
        )
    }
}

impl fmt::Display for ReturnConsumedCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes to retrieve in a `Query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Select {
    /// All attributes of the item.
    #[serde(rename = "ALL_ATTRIBUTES")]
    AllAttributes,
    /// All attributes projected into the queried index.
    #[serde(rename = "ALL_PROJECTED_ATTRIBUTES")]
    AllProjectedAttributes,
    /// Only the attributes named by the projection list.
    #[serde(rename = "SPECIFIC_ATTRIBUTES")]
    SpecificAttributes,
    /// Only the count of matching items (no item data).
    #[serde(rename = "COUNT")]
    Count,
}

impl Select {
    const NAMES: &'static [&'static str] = &[
        "ALL_ATTRIBUTES",
        "ALL_PROJECTED_ATTRIBUTES",
        "SPECIFIC_ATTRIBUTES",
        "COUNT",
    ];

    /// Returns the wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllAttributes => "ALL_ATTRIBUTES",
            Self::AllProjectedAttributes => "ALL_PROJECTED_ATTRIBUTES",
            Self::SpecificAttributes => "SPECIFIC_ATTRIBUTES",
            Self::Count => "COUNT",
        }
    }
}

impl FromStr for Select {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_wire(
            "select",
            s,
            &[
                ("ALL_ATTRIBUTES", Self::AllAttributes),
                ("ALL_PROJECTED_ATTRIBUTES", Self::AllProjectedAttributes),
                ("SPECIFIC_ATTRIBUTES", Self::SpecificAttributes),
                ("COUNT", Self::Count),
            ],
            Self::NAMES,
        )
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical operator combining the conditions of a legacy `QueryFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConditionalOperator {
    /// All conditions must be true.
    #[default]
    #[serde(rename = "AND")]
    And,
    /// At least one condition must be true.
    #[serde(rename = "OR")]
    Or,
}

impl ConditionalOperator {
    const NAMES: &'static [&'static str] = &["AND", "OR"];

    /// Returns the wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl FromStr for ConditionalOperator {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_wire(
            "conditionalOperator",
            s,
            &[("AND", Self::And), ("OR", Self::Or)],
            Self::NAMES,
        )
    }
}

impl fmt::Display for ConditionalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a legacy [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// Equal to.
    #[serde(rename = "EQ")]
    Eq,
    /// Not equal to.
    #[serde(rename = "NE")]
    Ne,
    /// Less than or equal to.
    #[serde(rename = "LE")]
    Le,
    /// Less than.
    #[serde(rename = "LT")]
    Lt,
    /// Greater than or equal to.
    #[serde(rename = "GE")]
    Ge,
    /// Greater than.
    #[serde(rename = "GT")]
    Gt,
    /// Attribute exists.
    #[serde(rename = "NOT_NULL")]
    NotNull,
    /// Attribute does not exist.
    #[serde(rename = "NULL")]
    Null,
    /// Attribute value contains the operand as substring or set member.
    #[serde(rename = "CONTAINS")]
    Contains,
    /// Attribute value does not contain the operand.
    #[serde(rename = "NOT_CONTAINS")]
    NotContains,
    /// Attribute value begins with the operand.
    #[serde(rename = "BEGINS_WITH")]
    BeginsWith,
    /// Attribute value equals one of the operands.
    #[serde(rename = "IN")]
    In,
    /// Attribute value is between two operands (inclusive).
    #[serde(rename = "BETWEEN")]
    Between,
}

impl ComparisonOperator {
    const NAMES: &'static [&'static str] = &[
        "EQ",
        "NE",
        "LE",
        "LT",
        "GE",
        "GT",
        "NOT_NULL",
        "NULL",
        "CONTAINS",
        "NOT_CONTAINS",
        "BEGINS_WITH",
        "IN",
        "BETWEEN",
    ];

    /// Returns the wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Le => "LE",
            Self::Lt => "LT",
            Self::Ge => "GE",
            Self::Gt => "GT",
            Self::NotNull => "NOT_NULL",
            Self::Null => "NULL",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::BeginsWith => "BEGINS_WITH",
            Self::In => "IN",
            Self::Between => "BETWEEN",
        }
    }

    /// Returns `true` if `count` operands are acceptable for this operator.
    #[must_use]
    pub fn accepts_operand_count(&self, count: usize) -> bool {
        match self {
            Self::NotNull | Self::Null => count == 0,
            Self::Between => count == 2,
            Self::In => count >= 1,
            _ => count == 1,
        }
    }

    /// Returns `true` if the operator may constrain a key attribute.
    #[must_use]
    pub fn is_key_operator(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Le | Self::Lt | Self::Ge | Self::Gt | Self::BeginsWith | Self::Between
        )
    }
}

impl FromStr for ComparisonOperator {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_wire(
            "comparisonOperator",
            s,
            &[
                ("EQ", Self::Eq),
                ("NE", Self::Ne),
                ("LE", Self::Le),
                ("LT", Self::Lt),
                ("GE", Self::Ge),
                ("GT", Self::Gt),
                ("NOT_NULL", Self::NotNull),
                ("NULL", Self::Null),
                ("CONTAINS", Self::Contains),
                ("NOT_CONTAINS", Self::NotContains),
                ("BEGINS_WITH", Self::BeginsWith),
                ("IN", Self::In),
                ("BETWEEN", Self::Between),
            ],
            Self::NAMES,
        )
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Structs - Legacy Condition
// ---------------------------------------------------------------------------

/// A legacy condition, used by `KeyConditions` and `QueryFilter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    /// The comparison operator.
    pub comparison_operator: ComparisonOperator,
    /// The operands, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_value_list: Vec<AttributeValue>,
}

impl Condition {
    /// Create a condition from an operator and its operands.
    #[must_use]
    pub fn new(
        comparison_operator: ComparisonOperator,
        attribute_value_list: impl IntoIterator<Item = AttributeValue>,
    ) -> Self {
        Self {
            comparison_operator,
            attribute_value_list: attribute_value_list.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Structs - Projection
// ---------------------------------------------------------------------------

/// Projection settings of a secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    /// The set of attributes projected into the index.
    #[serde(default)]
    pub projection_type: ProjectionType,
    /// The non-key attributes to project when `projection_type` is `INCLUDE`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_key_attributes: Vec<String>,
}

impl Projection {
    /// A projection that copies every attribute.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A projection of the table and index keys only.
    #[must_use]
    pub fn keys_only() -> Self {
        Self {
            projection_type: ProjectionType::KeysOnly,
            non_key_attributes: Vec::new(),
        }
    }

    /// A projection of the keys plus the given attributes.
    #[must_use]
    pub fn include(attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            projection_type: ProjectionType::Include,
            non_key_attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Structs - Consumed Capacity
// ---------------------------------------------------------------------------

/// Capacity units consumed by an individual table or index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capacity {
    /// The read capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_capacity_units: Option<f64>,
    /// The total capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_units: Option<f64>,
}

/// Capacity consumed by a query, as reported by the storage collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsumedCapacity {
    /// The name of the table that was queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// The total capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_units: Option<f64>,
    /// The read capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_capacity_units: Option<f64>,
    /// The capacity consumed by the table itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Capacity>,
    /// The capacity consumed by each local secondary index.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub local_secondary_indexes: HashMap<String, Capacity>,
    /// The capacity consumed by each global secondary index.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub global_secondary_indexes: HashMap<String, Capacity>,
}
