//! The query orchestrator.
//!
//! [`QueryEngine::execute`] validates the whole request, resolves the key
//! range, then drives one page through the [`Paginator`]. Every validation
//! failure is returned before the storage collaborator is touched.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use tablequery_model::error::QueryError;
use tablequery_model::types::{
    Capacity, ConsumedCapacity, ExpressionAttributeNames, ExpressionAttributeValues, Item, Key,
    ProjectionType, ReturnConsumedCapacity, Select,
};
use tablequery_model::{QueryInput, QueryPage};

use crate::catalog::{IndexDefinition, IndexKind, TableCatalog, TableDefinition};
use crate::condition::validate_attribute_value;
use crate::config::EngineConfig;
use crate::error::{expression_error_to_query, storage_error_to_query};
use crate::expression::ast::{
    collect_names_from_expr, collect_names_from_projection, collect_values_from_expr,
};
use crate::expression::{Expr, NameRef, parse_condition, parse_projection};
use crate::filter::FilterSpec;
use crate::pagination::{PageOutcome, Paginator};
use crate::planner::{KeyConditionSet, KeyPlan, plan_key_condition};
use crate::projection::{AttributeProjection, IndexView};
use crate::storage::{ItemSource, KeyAttribute, KeySchema, ScanDirection, ScanRequest};

/// Executes queries against the tables of a [`TableCatalog`].
///
/// The engine holds no per-query state; one instance can serve any number of
/// concurrent callers.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
///
/// use tablequery_core::{EngineConfig, KeySchema, MemoryTable, QueryEngine, TableCatalog};
/// use tablequery_model::types::ScalarAttributeType;
/// use tablequery_model::{AttributeValue, QueryInput};
///
/// let table = MemoryTable::new(KeySchema::composite(
///     "pk", ScalarAttributeType::S, "sk", ScalarAttributeType::N,
/// ));
/// for sk in ["1", "2", "3"] {
///     table.put_item(HashMap::from([
///         ("pk".to_owned(), AttributeValue::S("a".into())),
///         ("sk".to_owned(), AttributeValue::N(sk.into())),
///     ])).unwrap();
/// }
/// let catalog = Arc::new(TableCatalog::new());
/// catalog.register(table.definition("events"));
///
/// let engine = QueryEngine::new(catalog, EngineConfig::default());
/// let page = engine
///     .execute(
///         &QueryInput::builder()
///             .table_name("events")
///             .key_condition_expression("pk = :pk")
///             .expression_attribute_values(HashMap::from([(
///                 ":pk".to_owned(),
///                 AttributeValue::S("a".into()),
///             )]))
///             .limit(2)
///             .build(),
///     )
///     .unwrap();
/// assert_eq!(page.count, 2);
/// assert!(page.has_more());
/// ```
#[derive(Debug, Clone)]
pub struct QueryEngine {
    catalog: Arc<TableCatalog>,
    config: EngineConfig,
}

/// The part of a table a query reads: the table itself or one index.
#[derive(Debug)]
struct Target<'t> {
    index: Option<&'t IndexDefinition>,
    key_schema: &'t KeySchema,
    source: &'t Arc<dyn ItemSource>,
    view: IndexView,
}

impl Target<'_> {
    fn is_global_index(&self) -> bool {
        self.index.is_some_and(|index| index.kind == IndexKind::Global)
    }
}

/// A fully validated request, ready to scan.
#[derive(Debug)]
struct PreparedQuery<'t> {
    table: &'t TableDefinition,
    target: Target<'t>,
    plan: KeyPlan,
    filter: Option<FilterSpec>,
    select: Select,
    projection: Option<AttributeProjection>,
    key_attributes: Vec<String>,
    exclusive_start_key: Option<Key>,
    direction: ScanDirection,
    consistent_read: bool,
    limit: Option<usize>,
    return_consumed_capacity: ReturnConsumedCapacity,
}

/// Parsed forms of the three expression parameters.
#[derive(Debug, Default)]
struct ParsedExpressions {
    key_condition: Option<Expr>,
    filter: Option<Expr>,
    projection: Option<Vec<NameRef>>,
}

impl QueryEngine {
    /// Create an engine over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<TableCatalog>, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// The catalog queries are resolved against.
    #[must_use]
    pub fn catalog(&self) -> &Arc<TableCatalog> {
        &self.catalog
    }

    /// The engine limits.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one page of a query.
    pub fn execute(&self, input: &QueryInput) -> Result<QueryPage, QueryError> {
        validate_name("tableName", &input.table_name)?;
        if let Some(index_name) = &input.index_name {
            validate_name("indexName", index_name)?;
        }
        let table = self.catalog.require_table(&input.table_name)?;
        let query = self.prepare(&table, input)?;
        debug!(
            table = %table.name,
            index = query.target.index.map(|i| i.name.as_str()),
            partition = %query.plan.partition,
            sort = ?query.plan.sort,
            "resolved key condition"
        );
        self.run(&query)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    fn prepare<'t>(
        &self,
        table: &'t TableDefinition,
        input: &QueryInput,
    ) -> Result<PreparedQuery<'t>, QueryError> {
        let limit = match input.limit {
            Some(limit) if limit < 1 => {
                return Err(QueryError::invalid_spec(format!(
                    "1 validation error detected: Value '{limit}' at 'limit' failed to satisfy \
                     constraint: Member must have value greater than or equal to 1"
                )));
            }
            Some(limit) => Some(usize::try_from(limit).unwrap_or(usize::MAX)),
            None => None,
        };

        validate_parameter_families(input)?;

        let target = resolve_target(table, input.index_name.as_deref())?;
        let select = resolve_select(input, &target)?;

        if target.is_global_index() && input.consistent() {
            return Err(QueryError::invalid_spec(
                "Consistent reads are not supported on global secondary indexes",
            ));
        }

        let names = input.expression_attribute_names.clone().unwrap_or_default();
        let values = input.expression_attribute_values.clone().unwrap_or_default();
        let parsed = self.parse_expressions(input, &names, &values)?;

        let plan = match (&input.key_conditions, &parsed.key_condition) {
            (Some(conditions), None) if !conditions.is_empty() => {
                plan_key_condition(KeyConditionSet::Conditions(conditions), target.key_schema)?
            }
            (None, Some(expr)) => plan_key_condition(
                KeyConditionSet::Expression {
                    expr,
                    names: &names,
                    values: &values,
                },
                target.key_schema,
            )?,
            _ => {
                return Err(QueryError::invalid_spec(
                    "Either the KeyConditions or KeyConditionExpression parameter must be \
                     specified in the request.",
                ));
            }
        };

        let key_attributes: Vec<String> = item_key_attributes(table, &target)
            .into_iter()
            .map(|attr| attr.name.clone())
            .collect();
        let filter = match (&input.query_filter, &parsed.filter) {
            (Some(conditions), None) => {
                let filter = FilterSpec::from_conditions(
                    conditions,
                    input.conditional_operator.unwrap_or_default(),
                )?;
                // Only the legacy form is restricted to non-key attributes.
                let keys: Vec<&str> = key_attributes.iter().map(String::as_str).collect();
                filter.reject_key_attributes(&keys)?;
                Some(filter)
            }
            (None, Some(expr)) => Some(FilterSpec::from_expression(expr, &names, &values)?),
            _ => None,
        };

        let projection = match (&input.attributes_to_get, &parsed.projection) {
            (Some(attributes), None) => {
                Some(AttributeProjection::from_attributes_to_get(attributes)?)
            }
            (None, Some(paths)) => Some(AttributeProjection::from_expression(paths, &names)?),
            _ => None,
        };

        let exclusive_start_key = match &input.exclusive_start_key {
            Some(key) => {
                validate_start_key(key, table, &target, &plan)?;
                Some(key.clone())
            }
            None => None,
        };

        Ok(PreparedQuery {
            table,
            target,
            plan,
            filter,
            select,
            projection,
            key_attributes,
            exclusive_start_key,
            direction: ScanDirection::from_scan_forward(input.scan_forward()),
            consistent_read: input.consistent(),
            limit,
            return_consumed_capacity: input.return_consumed_capacity.unwrap_or_default(),
        })
    }

    fn parse_expressions(
        &self,
        input: &QueryInput,
        names: &ExpressionAttributeNames,
        values: &ExpressionAttributeValues,
    ) -> Result<ParsedExpressions, QueryError> {
        let uses_expressions = !input.expression_parameters().is_empty();
        for (parameter, present, empty) in [
            (
                "ExpressionAttributeNames",
                input.expression_attribute_names.is_some(),
                names.is_empty(),
            ),
            (
                "ExpressionAttributeValues",
                input.expression_attribute_values.is_some(),
                values.is_empty(),
            ),
        ] {
            if present && !uses_expressions {
                return Err(QueryError::invalid_spec(format!(
                    "{parameter} can only be specified when using expressions"
                )));
            }
            if present && empty {
                return Err(QueryError::invalid_spec(format!("{parameter} must not be empty")));
            }
        }
        for value in values.values() {
            validate_attribute_value(value)?;
        }

        let mut parsed = ParsedExpressions::default();
        if let Some(text) = &input.key_condition_expression {
            self.check_expression_text("KeyConditionExpression", text)?;
            parsed.key_condition = Some(
                parse_condition(text, self.config.max_expression_depth)
                    .map_err(|e| expression_error_to_query("KeyConditionExpression", e))?,
            );
        }
        if let Some(text) = &input.filter_expression {
            self.check_expression_text("FilterExpression", text)?;
            parsed.filter = Some(
                parse_condition(text, self.config.max_expression_depth)
                    .map_err(|e| expression_error_to_query("FilterExpression", e))?,
            );
        }
        if let Some(text) = &input.projection_expression {
            self.check_expression_text("ProjectionExpression", text)?;
            parsed.projection = Some(
                parse_projection(text)
                    .map_err(|e| expression_error_to_query("ProjectionExpression", e))?,
            );
        }

        let mut used_names = HashSet::new();
        let mut used_values = HashSet::new();
        for expr in parsed.key_condition.iter().chain(&parsed.filter) {
            collect_names_from_expr(expr, &mut used_names);
            collect_values_from_expr(expr, &mut used_values);
        }
        if let Some(paths) = &parsed.projection {
            collect_names_from_projection(paths, &mut used_names);
        }
        check_placeholders(names, values, &used_names, &used_values)?;

        Ok(parsed)
    }

    fn check_expression_text(&self, parameter: &str, text: &str) -> Result<(), QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::invalid_spec(format!(
                "Invalid {parameter}: The expression can not be empty;"
            )));
        }
        if text.len() > self.config.max_expression_length {
            return Err(QueryError::invalid_spec(format!(
                "Invalid {parameter}: Expression size has exceeded the maximum allowed size; \
                 expression size: {}, limit: {}",
                text.len(),
                self.config.max_expression_length
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    fn run(&self, query: &PreparedQuery<'_>) -> Result<QueryPage, QueryError> {
        let request = ScanRequest {
            partition: &query.plan.partition,
            range: query.plan.sort.as_ref(),
            direction: query.direction,
            after: query.exclusive_start_key.as_ref(),
            consistent_read: query.consistent_read,
        };
        let source = query.target.source;
        let stream = source.scan(request).map_err(|e| {
            warn!(table = %query.table.name, error = %e, "storage scan failed");
            storage_error_to_query(e)
        })?;

        let paginator = Paginator::builder()
            .limit(query.limit)
            .page_size_limit(self.config.page_size_limit)
            .key_attributes(query.key_attributes.clone())
            .build();
        let outcome = paginator
            .run(stream, |item| accept_item(query, item))
            .map_err(|e| {
                warn!(table = %query.table.name, error = %e, "storage failed mid-page");
                storage_error_to_query(e)
            })?;

        debug!(
            table = %query.table.name,
            scanned = outcome.scanned,
            matched = outcome.matched,
            bytes = outcome.bytes,
            stop = ?outcome.stop,
            "emitting page"
        );
        Ok(build_page(query, outcome))
    }
}

/// Filter and project one scanned item.
fn accept_item(query: &PreparedQuery<'_>, item: &Item) -> Option<Item> {
    // A global index only holds its projected attributes.
    let visible = if query.target.is_global_index() && !query.target.view.is_all() {
        query.target.view.apply(item.clone())
    } else {
        item.clone()
    };
    if let Some(filter) = &query.filter {
        if !filter.matches(&visible) {
            return None;
        }
    }
    Some(match query.select {
        Select::Count => Item::new(),
        Select::SpecificAttributes => match &query.projection {
            Some(projection) => projection.apply(&visible),
            None => visible,
        },
        Select::AllProjectedAttributes => query.target.view.apply(visible),
        Select::AllAttributes => visible,
    })
}

fn build_page(query: &PreparedQuery<'_>, outcome: PageOutcome) -> QueryPage {
    let consumed_capacity = query
        .return_consumed_capacity
        .should_report()
        .then(|| {
            query
                .target
                .source
                .read_capacity(outcome.bytes, query.consistent_read)
        })
        .flatten()
        .map(|units| capacity_report(query, units));

    QueryPage {
        items: (query.select != Select::Count).then_some(outcome.items),
        count: saturating_i32(outcome.matched),
        scanned_count: saturating_i32(outcome.scanned),
        last_evaluated_key: outcome.last_evaluated_key,
        consumed_capacity,
    }
}

fn capacity_report(query: &PreparedQuery<'_>, units: f64) -> ConsumedCapacity {
    let mut consumed = ConsumedCapacity {
        table_name: Some(query.table.name.clone()),
        capacity_units: Some(units),
        read_capacity_units: Some(units),
        ..ConsumedCapacity::default()
    };
    if query.return_consumed_capacity.should_report_indexes() {
        let share = |units: f64| Capacity {
            read_capacity_units: Some(units),
            capacity_units: Some(units),
        };
        match query.target.index {
            None => consumed.table = Some(share(units)),
            Some(index) => {
                consumed.table = Some(share(0.0));
                let breakdown = match index.kind {
                    IndexKind::Global => &mut consumed.global_secondary_indexes,
                    IndexKind::Local => &mut consumed.local_secondary_indexes,
                };
                breakdown.insert(index.name.clone(), share(units));
            }
        }
    }
    consumed
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Table and index names: 3 to 255 characters from `[A-Za-z0-9_.-]`.
fn validate_name(parameter: &str, name: &str) -> Result<(), QueryError> {
    if name.len() < 3 || name.len() > 255 {
        return Err(QueryError::invalid_spec(format!(
            "1 validation error detected: Value '{name}' at '{parameter}' failed to satisfy \
             constraint: Member must have length between 3 and 255"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
    {
        return Err(QueryError::invalid_spec(format!(
            "1 validation error detected: Value '{name}' at '{parameter}' failed to satisfy \
             constraint: Member must satisfy regular expression pattern: [a-zA-Z0-9_.-]+"
        )));
    }
    Ok(())
}

/// Legacy and expression parameters are two syntaxes for the same request
/// parts and may not be mixed.
fn validate_parameter_families(input: &QueryInput) -> Result<(), QueryError> {
    let legacy = input.legacy_parameters();
    let expression = input.expression_parameters();
    if !legacy.is_empty() && !expression.is_empty() {
        return Err(QueryError::invalid_spec(format!(
            "Can not use both expression and non-expression parameters in the same request: \
             Non-expression parameters: {{{}}} Expression parameters: {{{}}}",
            legacy.join(", "),
            expression.join(", ")
        )));
    }

    let filter_is_empty = input.query_filter.as_ref().is_none_or(HashMap::is_empty);
    if let Some(operator) = input.conditional_operator {
        if filter_is_empty {
            return Err(QueryError::invalid_spec(format!(
                "ConditionalOperator {operator} requires a non-empty QueryFilter"
            )));
        }
    }
    if input.query_filter.is_some() && filter_is_empty {
        return Err(QueryError::invalid_spec("QueryFilter must not be empty"));
    }
    Ok(())
}

fn resolve_target<'t>(
    table: &'t TableDefinition,
    index_name: Option<&str>,
) -> Result<Target<'t>, QueryError> {
    match index_name {
        None => Ok(Target {
            index: None,
            key_schema: &table.key_schema,
            source: &table.source,
            view: IndexView::all(),
        }),
        Some(name) => {
            let index = table.index(name).ok_or_else(|| {
                QueryError::invalid_spec(format!(
                    "The table does not have the specified index: {name}"
                ))
            })?;
            Ok(Target {
                index: Some(index),
                key_schema: &index.key_schema,
                source: &index.source,
                view: IndexView::new(&table.key_schema, &index.key_schema, &index.projection),
            })
        }
    }
}

fn resolve_select(input: &QueryInput, target: &Target<'_>) -> Result<Select, QueryError> {
    let projection_parameter = if input.attributes_to_get.is_some() {
        Some("AttributesToGet")
    } else if input.projection_expression.is_some() {
        Some("ProjectionExpression")
    } else {
        None
    };

    let select = match (input.select, projection_parameter) {
        (None, Some(_)) => Select::SpecificAttributes,
        (None, None) if target.index.is_some() => Select::AllProjectedAttributes,
        (None, None) => Select::AllAttributes,
        (Some(Select::SpecificAttributes), None) => {
            return Err(QueryError::invalid_spec(
                "SPECIFIC_ATTRIBUTES requires either ProjectionExpression or AttributesToGet",
            ));
        }
        (
            Some(select @ (Select::AllAttributes | Select::AllProjectedAttributes | Select::Count)),
            Some(parameter),
        ) => {
            return Err(QueryError::invalid_spec(format!(
                "Cannot specify the {parameter} when choosing to get {select} results"
            )));
        }
        (Some(select), _) => select,
    };

    if select == Select::AllProjectedAttributes && target.index.is_none() {
        return Err(QueryError::invalid_spec(
            "ALL_PROJECTED_ATTRIBUTES is only supported for queries on secondary indexes",
        ));
    }
    if let Some(index) = target.index {
        if select == Select::AllAttributes
            && index.kind == IndexKind::Global
            && index.projection.projection_type != ProjectionType::All
        {
            return Err(QueryError::invalid_spec(format!(
                "One or more parameter values were invalid: Select type ALL_ATTRIBUTES is not \
                 supported for global secondary index {} because its projection type is not ALL",
                index.name
            )));
        }
    }
    Ok(select)
}

/// The keys identifying an item of `target`: the index keys, then any table
/// keys not already among them.
fn item_key_attributes<'t>(
    table: &'t TableDefinition,
    target: &Target<'t>,
) -> Vec<&'t KeyAttribute> {
    let mut attrs: Vec<&KeyAttribute> = Vec::new();
    for attr in target.key_schema.attributes().chain(table.key_schema.attributes()) {
        if attrs.iter().all(|a| a.name != attr.name) {
            attrs.push(attr);
        }
    }
    attrs
}

fn check_placeholders(
    names: &ExpressionAttributeNames,
    values: &ExpressionAttributeValues,
    used_names: &HashSet<String>,
    used_values: &HashSet<String>,
) -> Result<(), QueryError> {
    let sorted = |set: &HashSet<String>| set.iter().cloned().collect::<BTreeSet<_>>();

    if let Some(name) = sorted(used_names).into_iter().find(|n| !names.contains_key(n)) {
        return Err(QueryError::invalid_spec(format!(
            "An expression attribute name used in the document path is not defined; attribute \
             name: {name}"
        )));
    }
    if let Some(value) = sorted(used_values).into_iter().find(|v| !values.contains_key(v)) {
        return Err(QueryError::invalid_spec(format!(
            "An expression attribute value used in expression is not defined; attribute value: \
             {value}"
        )));
    }

    let unused_names: BTreeSet<&str> = names
        .keys()
        .filter(|k| !used_names.contains(*k))
        .map(String::as_str)
        .collect();
    if !unused_names.is_empty() {
        return Err(QueryError::invalid_spec(format!(
            "Value provided in ExpressionAttributeNames unused in expressions: keys: {{{}}}",
            unused_names.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }
    let unused_values: BTreeSet<&str> = values
        .keys()
        .filter(|k| !used_values.contains(*k))
        .map(String::as_str)
        .collect();
    if !unused_values.is_empty() {
        return Err(QueryError::invalid_spec(format!(
            "Value provided in ExpressionAttributeValues unused in expressions: keys: {{{}}}",
            unused_values.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(())
}

/// `ExclusiveStartKey` must name exactly the key attributes of the target,
/// with values of the schema types, inside the planned key range.
fn validate_start_key(
    key: &Key,
    table: &TableDefinition,
    target: &Target<'_>,
    plan: &KeyPlan,
) -> Result<(), QueryError> {
    let invalid = |detail: &str| {
        QueryError::invalid_spec(format!("The provided starting key is invalid: {detail}"))
    };
    if key.is_empty() {
        return Err(invalid("The ExclusiveStartKey must not be empty"));
    }

    let expected = item_key_attributes(table, target);
    if key.len() != expected.len() {
        return Err(invalid("The provided key element does not match the schema"));
    }
    for attr in &expected {
        let value = key
            .get(&attr.name)
            .ok_or_else(|| invalid("The provided key element does not match the schema"))?;
        if !attr.attr_type.matches(value) {
            return Err(invalid("The provided key element does not match the schema"));
        }
        validate_attribute_value(value)?;
    }

    let outside = || {
        QueryError::invalid_spec(
            "The provided starting key is outside query boundaries based on provided conditions",
        )
    };
    if key.get(&target.key_schema.partition_key.name) != Some(&plan.partition) {
        return Err(outside());
    }
    if let (Some(range), Some(sort_key)) = (&plan.sort, &target.key_schema.sort_key) {
        let in_range = key.get(&sort_key.name).is_some_and(|v| range.contains(v));
        if !in_range {
            return Err(outside());
        }
    }
    Ok(())
}
