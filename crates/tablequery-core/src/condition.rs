//! Comparison operator semantics.
//!
//! One evaluator backs both surface syntaxes: legacy `Condition` maps are
//! checked here directly, and expression predicates lower onto the same
//! [`ComparisonOperator`] set in [`crate::filter`].

use std::cmp::Ordering;

use tablequery_model::AttributeValue;
use tablequery_model::error::QueryError;
use tablequery_model::number::validate_number;
use tablequery_model::types::{ComparisonOperator, Condition};

/// Check that `condition` has the right operand count and operand types for
/// its operator.
///
/// Arity violations are `InvalidOperandCount`; type violations are
/// `InvalidQuerySpec`.
pub fn validate_condition(attribute: &str, condition: &Condition) -> Result<(), QueryError> {
    let op = condition.comparison_operator;
    let operands = &condition.attribute_value_list;
    check_arity(op, operands.len())?;

    for value in operands {
        validate_attribute_value(value)?;
    }

    match op {
        ComparisonOperator::Lt
        | ComparisonOperator::Le
        | ComparisonOperator::Gt
        | ComparisonOperator::Ge
        | ComparisonOperator::Contains
        | ComparisonOperator::NotContains
        | ComparisonOperator::In
        | ComparisonOperator::Between => {
            if let Some(value) = operands.iter().find(|v| !v.is_scalar()) {
                return Err(operator_type_error(op, value));
            }
        }
        ComparisonOperator::BeginsWith => {
            if let Some(value) = operands
                .iter()
                .find(|v| !matches!(v, AttributeValue::S(_) | AttributeValue::B(_)))
            {
                return Err(operator_type_error(op, value));
            }
        }
        _ => {}
    }

    if matches!(op, ComparisonOperator::In | ComparisonOperator::Between) {
        if let Some(first) = operands.first() {
            if operands.iter().any(|v| !v.same_kind(first)) {
                return Err(QueryError::invalid_spec(format!(
                    "One or more parameter values were invalid: AttributeValues inside \
                     AttributeValueList must be of same type for the {op} ComparisonOperator \
                     on attribute {attribute}"
                )));
            }
        }
    }

    if let [low, high] = operands.as_slice() {
        if op == ComparisonOperator::Between && low.compare(high) == Some(Ordering::Greater) {
            return Err(QueryError::invalid_spec(format!(
                "Invalid BETWEEN condition on attribute {attribute}: the lower bound must be \
                 less than or equal to the upper bound"
            )));
        }
    }

    Ok(())
}

/// Evaluate a legacy condition against an attribute value, absent when the
/// item does not carry the attribute.
///
/// # Examples
///
/// ```
/// use tablequery_core::condition::evaluate_condition;
/// use tablequery_model::AttributeValue;
/// use tablequery_model::types::{ComparisonOperator, Condition};
///
/// let between = Condition::new(
///     ComparisonOperator::Between,
///     [AttributeValue::N("3".into()), AttributeValue::N("7".into())],
/// );
/// assert!(evaluate_condition(&between, Some(&AttributeValue::N("7".into()))).unwrap());
/// assert!(!evaluate_condition(&between, Some(&AttributeValue::N("2".into()))).unwrap());
/// ```
pub fn evaluate_condition(
    condition: &Condition,
    actual: Option<&AttributeValue>,
) -> Result<bool, QueryError> {
    let op = condition.comparison_operator;
    check_arity(op, condition.attribute_value_list.len())?;
    let operands: Vec<&AttributeValue> = condition.attribute_value_list.iter().collect();
    Ok(evaluate_operator(op, actual, &operands))
}

/// Apply `op` to an attribute value and operands whose count is already
/// known to satisfy the operator's arity.
pub(crate) fn evaluate_operator(
    op: ComparisonOperator,
    actual: Option<&AttributeValue>,
    operands: &[&AttributeValue],
) -> bool {
    match (op, actual, operands) {
        (ComparisonOperator::Null, actual, _) => actual.is_none(),
        (ComparisonOperator::NotNull, actual, _) => actual.is_some(),
        (_, None, _) => false,
        (ComparisonOperator::Eq, Some(actual), [operand]) => actual == *operand,
        (ComparisonOperator::Ne, Some(actual), [operand]) => actual != *operand,
        (ComparisonOperator::Lt, Some(actual), [operand]) => {
            ordered(actual, operand).is_some_and(Ordering::is_lt)
        }
        (ComparisonOperator::Le, Some(actual), [operand]) => {
            ordered(actual, operand).is_some_and(Ordering::is_le)
        }
        (ComparisonOperator::Gt, Some(actual), [operand]) => {
            ordered(actual, operand).is_some_and(Ordering::is_gt)
        }
        (ComparisonOperator::Ge, Some(actual), [operand]) => {
            ordered(actual, operand).is_some_and(Ordering::is_ge)
        }
        (ComparisonOperator::Between, Some(actual), [low, high]) => {
            ordered(low, actual).is_some_and(Ordering::is_le)
                && ordered(actual, high).is_some_and(Ordering::is_le)
        }
        (ComparisonOperator::BeginsWith, Some(actual), [prefix]) => actual.begins_with(prefix),
        (ComparisonOperator::Contains, Some(actual), [operand]) => actual.contains(operand),
        (ComparisonOperator::NotContains, Some(actual), [operand]) => !actual.contains(operand),
        (ComparisonOperator::In, Some(actual), candidates) => {
            candidates.iter().any(|candidate| actual == *candidate)
        }
        _ => false,
    }
}

/// Order two scalars of the same kind.
fn ordered(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    if a.is_scalar() && a.same_kind(b) {
        a.compare(b)
    } else {
        None
    }
}

pub(crate) fn check_arity(op: ComparisonOperator, count: usize) -> Result<(), QueryError> {
    if op.accepts_operand_count(count) {
        Ok(())
    } else {
        Err(QueryError::invalid_operand_count(format!(
            "One or more parameter values were invalid: Invalid number of argument(s) for the \
             {op} ComparisonOperator"
        )))
    }
}

fn operator_type_error(op: ComparisonOperator, value: &AttributeValue) -> QueryError {
    QueryError::invalid_spec(format!(
        "One or more parameter values were invalid: ComparisonOperator {op} is not valid for {} \
         AttributeValue type",
        value.type_descriptor()
    ))
}

/// Reject malformed numbers and empty sets anywhere inside a value.
pub fn validate_attribute_value(value: &AttributeValue) -> Result<(), QueryError> {
    let invalid_number = |text: &str| {
        validate_number(text).map_err(|e| {
            QueryError::invalid_spec(format!(
                "The parameter cannot be converted to a numeric value: {text} ({e})"
            ))
        })
    };

    if value.is_empty_set() {
        return Err(QueryError::invalid_spec(format!(
            "One or more parameter values were invalid: An {} set may not be empty",
            value.type_descriptor()
        )));
    }

    match value {
        AttributeValue::N(n) => invalid_number(n),
        AttributeValue::Ns(ns) => ns.iter().try_for_each(|n| invalid_number(n)),
        AttributeValue::L(list) => list.iter().try_for_each(validate_attribute_value),
        AttributeValue::M(map) => map.values().try_for_each(validate_attribute_value),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use tablequery_model::error::QueryErrorCode;

    use super::*;

    fn n(v: &str) -> AttributeValue {
        AttributeValue::N(v.to_owned())
    }

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    fn eval(
        op: ComparisonOperator,
        operands: &[AttributeValue],
        actual: Option<&AttributeValue>,
    ) -> bool {
        evaluate_condition(&Condition::new(op, operands.to_vec()), actual).unwrap()
    }

    #[test]
    fn test_should_evaluate_between_inclusively() {
        let bounds = [n("3"), n("7")];
        assert!(eval(ComparisonOperator::Between, &bounds, Some(&n("5"))));
        assert!(!eval(ComparisonOperator::Between, &bounds, Some(&n("2"))));
        assert!(eval(ComparisonOperator::Between, &bounds, Some(&n("7"))));
        assert!(eval(ComparisonOperator::Between, &bounds, Some(&n("3.0"))));
        assert!(!eval(ComparisonOperator::Between, &bounds, Some(&s("5"))));
    }

    #[test]
    fn test_should_not_treat_different_kinds_as_equal() {
        assert!(!eval(ComparisonOperator::Eq, &[s("6")], Some(&n("6"))));
        assert!(!eval(
            ComparisonOperator::Eq,
            &[AttributeValue::Ns(vec!["6".to_owned()])],
            Some(&n("6"))
        ));
        assert!(eval(ComparisonOperator::Eq, &[n("6.0")], Some(&n("6"))));
        assert!(eval(ComparisonOperator::Ne, &[s("6")], Some(&n("6"))));
    }

    #[test]
    fn test_should_order_strings_by_bytes() {
        assert!(eval(ComparisonOperator::Gt, &[s("A")], Some(&s("a"))));
        assert!(eval(ComparisonOperator::Gt, &[s("B")], Some(&s("a"))));
        assert!(!eval(ComparisonOperator::Lt, &[n("5")], Some(&s("1"))));
    }

    #[test]
    fn test_should_handle_absent_attribute() {
        assert!(eval(ComparisonOperator::Null, &[], None));
        assert!(!eval(ComparisonOperator::NotNull, &[], None));
        assert!(!eval(ComparisonOperator::Ne, &[n("1")], None));
        assert!(!eval(ComparisonOperator::Contains, &[s("x")], None));
        assert!(!eval(ComparisonOperator::NotContains, &[s("x")], None));
    }

    #[test]
    fn test_should_evaluate_membership_operators() {
        let tags = AttributeValue::Ss(vec!["red".to_owned(), "blue".to_owned()]);
        assert!(eval(ComparisonOperator::Contains, &[s("red")], Some(&tags)));
        assert!(eval(ComparisonOperator::NotContains, &[s("green")], Some(&tags)));
        assert!(eval(ComparisonOperator::Contains, &[s("ell")], Some(&s("hello"))));
        assert!(eval(ComparisonOperator::In, &[n("1"), n("2")], Some(&n("2.00"))));
        assert!(!eval(ComparisonOperator::In, &[n("1"), n("2")], Some(&n("3"))));
        assert!(eval(ComparisonOperator::BeginsWith, &[s("he")], Some(&s("hello"))));
        assert!(!eval(ComparisonOperator::BeginsWith, &[s("he")], Some(&n("1"))));
    }

    #[test]
    fn test_should_fail_fast_on_wrong_arity() {
        let condition = Condition::new(ComparisonOperator::Between, [n("1")]);
        let err = evaluate_condition(&condition, Some(&n("1"))).unwrap_err();
        assert_eq!(err.code, QueryErrorCode::InvalidOperandCount);
        assert!(err.message.contains("BETWEEN ComparisonOperator"));

        let condition = Condition::new(ComparisonOperator::Null, [n("1")]);
        assert!(evaluate_condition(&condition, None).is_err());
    }

    #[test]
    fn test_should_validate_operand_types() {
        let set = AttributeValue::Ss(vec!["a".to_owned()]);
        let err = validate_condition("a", &Condition::new(ComparisonOperator::Contains, [set]))
            .unwrap_err();
        assert_eq!(err.code, QueryErrorCode::InvalidQuerySpec);

        let err = validate_condition("a", &Condition::new(ComparisonOperator::BeginsWith, [n("1")]))
            .unwrap_err();
        assert!(err.message.contains("BEGINS_WITH"));

        let err = validate_condition("a", &Condition::new(ComparisonOperator::In, [n("1"), s("1")]))
            .unwrap_err();
        assert!(err.message.contains("same type"));

        let err = validate_condition(
            "a",
            &Condition::new(ComparisonOperator::Between, [n("9"), n("1")]),
        )
        .unwrap_err();
        assert!(err.message.contains("lower bound"));

        let huge = Condition::new(ComparisonOperator::Eq, [n("1e126")]);
        assert!(validate_condition("a", &huge).is_err());
        let empty_set = Condition::new(ComparisonOperator::Eq, [AttributeValue::Ss(vec![])]);
        assert!(validate_condition("a", &empty_set).is_err());
        let boolean = Condition::new(ComparisonOperator::Ne, [AttributeValue::Bool(true)]);
        assert!(validate_condition("a", &boolean).is_ok());
    }
}
