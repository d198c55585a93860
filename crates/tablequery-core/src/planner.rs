//! Key condition planning.
//!
//! Both surface syntaxes reduce to a list of `(attribute, operator, operands)`
//! clauses, which are then checked against the key schema and turned into a
//! [`KeyPlan`]: one partition value and at most one sort range.

use std::cmp::Ordering;
use std::collections::HashMap;

use tablequery_model::AttributeValue;
use tablequery_model::error::QueryError;
use tablequery_model::types::{
    ComparisonOperator, Condition, ExpressionAttributeNames, ExpressionAttributeValues,
    ScalarAttributeType,
};

use crate::condition::{check_arity, validate_attribute_value};
use crate::error::expression_error_to_query;
use crate::expression::{CompareOp, Expr, ExpressionError, FunctionName, LogicalOp, Operand};
use crate::storage::{KeySchema, SortRange};

/// A key condition in either surface syntax.
#[derive(Debug, Clone, Copy)]
pub enum KeyConditionSet<'a> {
    /// Legacy `KeyConditions` map.
    Conditions(&'a HashMap<String, Condition>),
    /// Parsed `KeyConditionExpression` with its placeholder maps.
    Expression {
        /// The parsed expression.
        expr: &'a Expr,
        /// `#name` substitutions.
        names: &'a ExpressionAttributeNames,
        /// `:value` substitutions.
        values: &'a ExpressionAttributeValues,
    },
}

/// The resolved key range of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPlan {
    /// Value of the partition key.
    pub partition: AttributeValue,
    /// Optional sort key constraint.
    pub sort: Option<SortRange>,
}

#[derive(Debug)]
struct KeyClause {
    attribute: String,
    operator: ComparisonOperator,
    operands: Vec<AttributeValue>,
}

/// Resolve a key condition against `schema`.
///
/// Exactly one clause must test the partition key with equality, and at most
/// one clause may constrain the sort key with a key operator.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// use tablequery_core::expression::parse_condition;
/// use tablequery_core::planner::{KeyConditionSet, plan_key_condition};
/// use tablequery_core::storage::{KeySchema, SortRange};
/// use tablequery_model::AttributeValue;
/// use tablequery_model::types::ScalarAttributeType;
///
/// let schema = KeySchema::composite("pk", ScalarAttributeType::N, "sk", ScalarAttributeType::N);
/// let expr = parse_condition("pk = :p AND sk BETWEEN :lo AND :hi", 16).unwrap();
/// let values = HashMap::from([
///     (":p".to_owned(), AttributeValue::N("1".into())),
///     (":lo".to_owned(), AttributeValue::N("2".into())),
///     (":hi".to_owned(), AttributeValue::N("4".into())),
/// ]);
/// let names = HashMap::new();
/// let plan = plan_key_condition(
///     KeyConditionSet::Expression { expr: &expr, names: &names, values: &values },
///     &schema,
/// )
/// .unwrap();
/// assert_eq!(plan.partition, AttributeValue::N("1".into()));
/// assert!(matches!(plan.sort, Some(SortRange::Between(_, _))));
/// ```
pub fn plan_key_condition(
    set: KeyConditionSet<'_>,
    schema: &KeySchema,
) -> Result<KeyPlan, QueryError> {
    let clauses = match set {
        KeyConditionSet::Conditions(conditions) => legacy_clauses(conditions)?,
        KeyConditionSet::Expression { expr, names, values } => {
            let mut flat = Vec::new();
            flatten_and(expr, &mut flat)?;
            flat.into_iter()
                .map(|clause| expression_clause(clause, names, values))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    plan_clauses(clauses, schema)
}

// ---------------------------------------------------------------------------
// Legacy form
// ---------------------------------------------------------------------------

fn legacy_clauses(conditions: &HashMap<String, Condition>) -> Result<Vec<KeyClause>, QueryError> {
    let mut names: Vec<&String> = conditions.keys().collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let condition = &conditions[name];
            let operator = condition.comparison_operator;
            check_arity(operator, condition.attribute_value_list.len())?;
            if !operator.is_key_operator() {
                return Err(QueryError::invalid_key_condition(format!(
                    "Attempted conditional constraint is not an indexable operation: {operator}"
                )));
            }
            Ok(KeyClause {
                attribute: name.clone(),
                operator,
                operands: condition.attribute_value_list.clone(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Expression form
// ---------------------------------------------------------------------------

fn unsupported(what: impl std::fmt::Display) -> QueryError {
    QueryError::invalid_key_condition(format!(
        "Invalid KeyConditionExpression: Unsupported operator in KeyConditionExpression: {what}"
    ))
}

fn flatten_and<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) -> Result<(), QueryError> {
    match expr {
        Expr::Logical {
            op: LogicalOp::And,
            left,
            right,
        } => {
            flatten_and(left, out)?;
            flatten_and(right, out)
        }
        Expr::Logical {
            op: LogicalOp::Or, ..
        } => Err(unsupported("OR")),
        Expr::Not(_) => Err(unsupported("NOT")),
        Expr::In { .. } => Err(unsupported("IN")),
        Expr::Compare {
            op: CompareOp::Ne, ..
        } => Err(unsupported("<>")),
        Expr::Function { name, .. } if *name != FunctionName::BeginsWith => {
            Err(unsupported(name))
        }
        _ => {
            out.push(expr);
            Ok(())
        }
    }
}

fn expression_clause(
    expr: &Expr,
    names: &ExpressionAttributeNames,
    values: &ExpressionAttributeValues,
) -> Result<KeyClause, QueryError> {
    let attribute = |operand: &Operand| -> Result<String, QueryError> {
        match operand {
            Operand::Name(name) => name
                .resolve(names)
                .map_err(|e| expression_error_to_query("KeyConditionExpression", e)),
            _ => Err(QueryError::invalid_key_condition(format!(
                "Invalid KeyConditionExpression: key conditions compare an attribute with a \
                 value; found {operand}"
            ))),
        }
    };
    let value = |operand: &Operand| -> Result<AttributeValue, QueryError> {
        match operand {
            Operand::Value(placeholder) => values.get(placeholder).cloned().ok_or_else(|| {
                expression_error_to_query(
                    "KeyConditionExpression",
                    ExpressionError::UnresolvedValue {
                        name: placeholder.clone(),
                    },
                )
            }),
            _ => Err(QueryError::invalid_key_condition(format!(
                "Invalid KeyConditionExpression: key conditions compare an attribute with a \
                 value; found {operand}"
            ))),
        }
    };

    match expr {
        Expr::Compare { left, op, right } => {
            let (name, op, literal) = if matches!(left, Operand::Value(_)) {
                (right, op.flipped(), left)
            } else {
                (left, *op, right)
            };
            Ok(KeyClause {
                attribute: attribute(name)?,
                operator: op.to_comparison(),
                operands: vec![value(literal)?],
            })
        }
        Expr::Between { value: v, low, high } => Ok(KeyClause {
            attribute: attribute(v)?,
            operator: ComparisonOperator::Between,
            operands: vec![value(low)?, value(high)?],
        }),
        Expr::Function { args, .. } => match args.as_slice() {
            [name, prefix] => Ok(KeyClause {
                attribute: attribute(name)?,
                operator: ComparisonOperator::BeginsWith,
                operands: vec![value(prefix)?],
            }),
            _ => Err(unsupported(FunctionName::BeginsWith)),
        },
        other => Err(QueryError::invalid_key_condition(format!(
            "Invalid KeyConditionExpression: unsupported clause {other:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Schema checks
// ---------------------------------------------------------------------------

fn plan_clauses(clauses: Vec<KeyClause>, schema: &KeySchema) -> Result<KeyPlan, QueryError> {
    let partition_name = schema.partition_key.name.as_str();
    let mut partition: Option<AttributeValue> = None;
    let mut sort: Option<SortRange> = None;

    for clause in clauses {
        for operand in &clause.operands {
            validate_attribute_value(operand)?;
        }

        let key = schema
            .attribute(&clause.attribute)
            .ok_or_else(|| QueryError::invalid_key_condition("Query key condition not supported"))?;

        if let Some(operand) = clause.operands.iter().find(|v| !key.attr_type.matches(v)) {
            return Err(QueryError::invalid_key_condition(format!(
                "One or more parameter values were invalid: Condition parameter type does not \
                 match schema type for key attribute '{}': expected {}, got {}",
                key.name,
                key.attr_type,
                operand.type_descriptor()
            )));
        }

        if key.name == partition_name {
            if partition.is_some() {
                return Err(one_condition_per_key());
            }
            match (clause.operator, clause.operands.as_slice()) {
                (ComparisonOperator::Eq, [value]) => partition = Some(value.clone()),
                _ => {
                    return Err(QueryError::invalid_key_condition(
                        "Query key condition not supported",
                    ));
                }
            }
        } else {
            if sort.is_some() {
                return Err(one_condition_per_key());
            }
            sort = Some(sort_range(clause, key.attr_type)?);
        }
    }

    let partition = partition.ok_or_else(|| {
        QueryError::invalid_key_condition(format!(
            "Query condition missed key schema element: {partition_name}"
        ))
    })?;
    Ok(KeyPlan { partition, sort })
}

fn one_condition_per_key() -> QueryError {
    QueryError::invalid_key_condition(
        "KeyConditionExpressions must only contain one condition per key",
    )
}

fn sort_range(clause: KeyClause, attr_type: ScalarAttributeType) -> Result<SortRange, QueryError> {
    let KeyClause {
        attribute,
        operator,
        operands,
    } = clause;
    let mut operands = operands.into_iter();
    let (Some(first), second) = (operands.next(), operands.next()) else {
        return Err(QueryError::invalid_key_condition("Query key condition not supported"));
    };

    let range = match (operator, second) {
        (ComparisonOperator::Eq, None) => SortRange::Eq(first),
        (ComparisonOperator::Lt, None) => SortRange::Lt(first),
        (ComparisonOperator::Le, None) => SortRange::Le(first),
        (ComparisonOperator::Gt, None) => SortRange::Gt(first),
        (ComparisonOperator::Ge, None) => SortRange::Ge(first),
        (ComparisonOperator::BeginsWith, None) => {
            if attr_type == ScalarAttributeType::N {
                return Err(QueryError::invalid_key_condition(format!(
                    "Invalid KeyConditionExpression: Incorrect operand type for operator or \
                     function; operator or function: begins_with, operand type: N, attribute: \
                     {attribute}"
                )));
            }
            SortRange::BeginsWith(first)
        }
        (ComparisonOperator::Between, Some(second)) => {
            if first.compare(&second) == Some(Ordering::Greater) {
                return Err(QueryError::invalid_key_condition(format!(
                    "Invalid KeyConditionExpression: The BETWEEN operator requires upper bound to \
                     be greater than or equal to lower bound; lower bound operand: {first}, upper \
                     bound operand: {second}"
                )));
            }
            SortRange::Between(first, second)
        }
        _ => {
            return Err(QueryError::invalid_key_condition(format!(
                "Query key condition not supported: {operator} on {attribute}"
            )));
        }
    };
    Ok(range)
}
