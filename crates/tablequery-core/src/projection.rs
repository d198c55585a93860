//! Attribute projection.
//!
//! Two layers: [`IndexView`] narrows an item to what a secondary index
//! stores, and [`AttributeProjection`] narrows it further to what the caller
//! asked for with `AttributesToGet` or `ProjectionExpression`.

use std::collections::{BTreeSet, HashSet};

use tablequery_model::error::QueryError;
use tablequery_model::types::{ExpressionAttributeNames, Item, Projection, ProjectionType};

use crate::error::expression_error_to_query;
use crate::expression::NameRef;
use crate::storage::KeySchema;

/// The attributes a caller asked to get back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeProjection {
    attributes: Vec<String>,
}

impl AttributeProjection {
    /// Build from legacy `AttributesToGet`, which must be non-empty and free
    /// of duplicates.
    pub fn from_attributes_to_get(attributes: &[String]) -> Result<Self, QueryError> {
        if attributes.is_empty() {
            return Err(QueryError::invalid_spec(
                "One or more parameter values are not valid. The AttributesToGet parameter must \
                 contain at least one element",
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = attributes.iter().find(|a| !seen.insert(a.as_str())) {
            return Err(QueryError::invalid_spec(format!(
                "One or more parameter values were invalid: Duplicate value in attribute name: \
                 {dup}"
            )));
        }
        Ok(Self {
            attributes: attributes.to_vec(),
        })
    }

    /// Build from parsed `ProjectionExpression` paths.
    pub fn from_expression(
        paths: &[NameRef],
        names: &ExpressionAttributeNames,
    ) -> Result<Self, QueryError> {
        let mut attributes: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .resolve(names)
                .map_err(|e| expression_error_to_query("ProjectionExpression", e))?;
            if attributes.contains(&name) {
                return Err(QueryError::invalid_spec(format!(
                    "Invalid ProjectionExpression: Two document paths overlap with each other; \
                     must remove or rewrite one of these paths; path one: [{name}], path two: \
                     [{name}]"
                )));
            }
            attributes.push(name);
        }
        Ok(Self { attributes })
    }

    /// The requested attribute names, in request order.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Keep only the requested attributes that `item` carries.
    #[must_use]
    pub fn apply(&self, item: &Item) -> Item {
        self.attributes
            .iter()
            .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}

/// The attributes stored by a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexView {
    /// `None` when the index projects every attribute.
    attributes: Option<BTreeSet<String>>,
}

impl IndexView {
    /// The view of an index with `projection` over a table keyed by
    /// `table_keys`. Table keys and index keys are always projected.
    #[must_use]
    pub fn new(table_keys: &KeySchema, index_keys: &KeySchema, projection: &Projection) -> Self {
        let attributes = match projection.projection_type {
            ProjectionType::All => None,
            ProjectionType::KeysOnly | ProjectionType::Include => {
                let mut set: BTreeSet<String> = table_keys
                    .attributes()
                    .chain(index_keys.attributes())
                    .map(|attr| attr.name.clone())
                    .collect();
                if projection.projection_type == ProjectionType::Include {
                    set.extend(projection.non_key_attributes.iter().cloned());
                }
                Some(set)
            }
        };
        Self { attributes }
    }

    /// A view that keeps everything.
    #[must_use]
    pub fn all() -> Self {
        Self { attributes: None }
    }

    /// Returns `true` if the index projects every attribute.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.attributes.is_none()
    }

    /// Narrow `item` to the projected attributes.
    #[must_use]
    pub fn apply(&self, mut item: Item) -> Item {
        if let Some(keep) = &self.attributes {
            item.retain(|name, _| keep.contains(name));
        }
        item
    }
}
