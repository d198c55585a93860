//! The `Query` request.
//!
//! `QueryInput` uses `PascalCase` JSON field naming. Collections are
//! `Option`s so an absent parameter and an empty one stay distinguishable:
//! `"ExclusiveStartKey": {}` and `"AttributesToGet": []` are rejected by the
//! engine, while leaving them out is fine.
//!
//! Requests are immutable once built. Use the generated builder:
//!
//! ```
//! use tablequery_model::QueryInput;
//!
//! let input = QueryInput::builder()
//!     .table_name("orders")
//!     .key_condition_expression("pk = :pk")
//!     .limit(10)
//!     .build();
//! assert_eq!(input.limit, Some(10));
//! assert!(input.scan_forward());
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::types::{
    Condition, ConditionalOperator, ExpressionAttributeNames, ExpressionAttributeValues, Key,
    ReturnConsumedCapacity, Select,
};

/// Input for the `Query` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "PascalCase")]
pub struct QueryInput {
    /// The name of the table to query.
    #[builder(setter(into))]
    pub table_name: String,

    /// The name of a secondary index to query.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// The attributes to be returned in the result.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,

    /// Legacy projection list.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_to_get: Option<Vec<String>>,

    /// The maximum number of items to evaluate (not necessarily the number of
    /// matching items).
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    /// If `true`, a strongly consistent read is used.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,

    /// Legacy key conditions, one per key attribute.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_conditions: Option<HashMap<String, Condition>>,

    /// Legacy filter conditions on non-key attributes.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_filter: Option<HashMap<String, Condition>>,

    /// How the `QueryFilter` conditions combine. Defaults to `AND`.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_operator: Option<ConditionalOperator>,

    /// Order of index traversal. `true` (default) for ascending, `false` for
    /// descending.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,

    /// The key after which this page starts, as returned in a previous page's
    /// `LastEvaluatedKey`.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Key>,

    /// Level of detail about consumed capacity to return.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Attributes to retrieve, as a comma-separated list of names.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    /// Post-read condition the returned items must satisfy.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// The condition selecting the partition and sort key range.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_condition_expression: Option<String>,

    /// Substitution tokens for attribute names in an expression.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_attribute_names: Option<ExpressionAttributeNames>,

    /// Substitution tokens for attribute values in an expression.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_attribute_values: Option<ExpressionAttributeValues>,
}

impl QueryInput {
    /// Scan direction; ascending unless `ScanIndexForward` is `false`.
    #[must_use]
    pub fn scan_forward(&self) -> bool {
        self.scan_index_forward.unwrap_or(true)
    }

    /// Whether a strongly consistent read was requested.
    #[must_use]
    pub fn consistent(&self) -> bool {
        self.consistent_read.unwrap_or(false)
    }

    /// Names of the legacy parameters present on this request.
    #[must_use]
    pub fn legacy_parameters(&self) -> Vec<&'static str> {
        let mut params = Vec::new();
        if self.attributes_to_get.is_some() {
            params.push("AttributesToGet");
        }
        if self.key_conditions.is_some() {
            params.push("KeyConditions");
        }
        if self.query_filter.is_some() {
            params.push("QueryFilter");
        }
        if self.conditional_operator.is_some() {
            params.push("ConditionalOperator");
        }
        params
    }

    /// Names of the expression parameters present on this request.
    #[must_use]
    pub fn expression_parameters(&self) -> Vec<&'static str> {
        let mut params = Vec::new();
        if self.projection_expression.is_some() {
            params.push("ProjectionExpression");
        }
        if self.filter_expression.is_some() {
            params.push("FilterExpression");
        }
        if self.key_condition_expression.is_some() {
            params.push("KeyConditionExpression");
        }
        params
    }
}
