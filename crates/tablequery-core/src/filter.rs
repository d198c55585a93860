//! Post-read filtering.
//!
//! A [`FilterSpec`] is built once per request from either `QueryFilter` plus
//! `ConditionalOperator` or a parsed `FilterExpression`, with placeholders
//! already substituted. Evaluation never fails: operand counts and literal
//! types are checked while building.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use tablequery_model::AttributeValue;
use tablequery_model::error::QueryError;
use tablequery_model::types::{
    ComparisonOperator, Condition, ConditionalOperator, ExpressionAttributeNames,
    ExpressionAttributeValues, Item,
};

use crate::condition::{evaluate_operator, validate_condition};
use crate::error::expression_error_to_query;
use crate::expression::{Expr, ExpressionError, FunctionName, LogicalOp, Operand};

const TYPE_DESCRIPTORS: &[&str] = &["S", "SS", "N", "NS", "B", "BS", "BOOL", "NULL", "L", "M"];

/// A value producer inside a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A top-level attribute of the item.
    Attribute(String),
    /// A substituted literal.
    Literal(AttributeValue),
    /// `size(term)` as a number.
    Size(Box<Term>),
}

/// A bound boolean predicate over an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `subject <operator> operands`.
    Test {
        /// Left-hand value.
        subject: Term,
        /// Operator applied.
        operator: ComparisonOperator,
        /// Right-hand values.
        operands: Vec<Term>,
    },
    /// `attribute_type(attribute, :t)`.
    TypeIs {
        /// Attribute tested.
        attribute: String,
        /// Expected type descriptor, e.g. `"SS"`.
        type_descriptor: String,
    },
    /// All must hold. Empty is true.
    All(Vec<Predicate>),
    /// Any must hold. Empty is false.
    Any(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

/// A filter ready to run against scanned items.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    predicate: Predicate,
}

impl FilterSpec {
    /// Build from legacy `QueryFilter` conditions joined by `operator` across
    /// the whole set.
    pub fn from_conditions(
        conditions: &HashMap<String, Condition>,
        operator: ConditionalOperator,
    ) -> Result<Self, QueryError> {
        let mut names: Vec<&String> = conditions.keys().collect();
        names.sort();

        let tests = names
            .into_iter()
            .map(|name| {
                let condition = &conditions[name];
                validate_condition(name, condition)?;
                Ok(Predicate::Test {
                    subject: Term::Attribute(name.clone()),
                    operator: condition.comparison_operator,
                    operands: condition
                        .attribute_value_list
                        .iter()
                        .cloned()
                        .map(Term::Literal)
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        let predicate = match operator {
            ConditionalOperator::And => Predicate::All(tests),
            ConditionalOperator::Or => Predicate::Any(tests),
        };
        Ok(Self { predicate })
    }

    /// Bind a parsed `FilterExpression` to its placeholder maps.
    pub fn from_expression(
        expr: &Expr,
        names: &ExpressionAttributeNames,
        values: &ExpressionAttributeValues,
    ) -> Result<Self, QueryError> {
        let binder = Binder { names, values };
        let predicate = binder
            .bind(expr)
            .map_err(|e| expression_error_to_query("FilterExpression", e))?;
        Ok(Self { predicate })
    }

    /// The bound predicate.
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Every attribute the filter reads, sorted.
    #[must_use]
    pub fn attributes(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        collect_predicate_attributes(&self.predicate, &mut out);
        out
    }

    /// Fail with `KeyAttributeInFilter` if the filter reads any of `keys`.
    pub fn reject_key_attributes(&self, keys: &[&str]) -> Result<(), QueryError> {
        match self.attributes().into_iter().find(|a| keys.contains(a)) {
            Some(key) => Err(QueryError::key_attribute_in_filter(key)),
            None => Ok(()),
        }
    }

    /// Evaluate the filter against `item`.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        evaluate(&self.predicate, item)
    }
}

// ---------------------------------------------------------------------------
// Binding expressions
// ---------------------------------------------------------------------------

struct Binder<'a> {
    names: &'a ExpressionAttributeNames,
    values: &'a ExpressionAttributeValues,
}

impl Binder<'_> {
    fn bind(&self, expr: &Expr) -> Result<Predicate, ExpressionError> {
        match expr {
            Expr::Compare { left, op, right } => Ok(Predicate::Test {
                subject: self.term(left)?,
                operator: op.to_comparison(),
                operands: vec![self.term(right)?],
            }),
            Expr::Between { value, low, high } => {
                let low = self.term(low)?;
                let high = self.term(high)?;
                if let (Term::Literal(lo), Term::Literal(hi)) = (&low, &high) {
                    if !lo.same_kind(hi) || lo.compare(hi) == Some(Ordering::Greater) {
                        return Err(ExpressionError::InvalidOperand {
                            operation: "BETWEEN".to_owned(),
                            message: format!(
                                "the upper bound must be greater than or equal to the lower \
                                 bound of the same type; lower bound: {lo}, upper bound: {hi}"
                            ),
                        });
                    }
                }
                Ok(Predicate::Test {
                    subject: self.term(value)?,
                    operator: ComparisonOperator::Between,
                    operands: vec![low, high],
                })
            }
            Expr::In { value, list } => Ok(Predicate::Test {
                subject: self.term(value)?,
                operator: ComparisonOperator::In,
                operands: list
                    .iter()
                    .map(|item| self.term(item))
                    .collect::<Result<_, _>>()?,
            }),
            Expr::Logical { op, left, right } => {
                let both = vec![self.bind(left)?, self.bind(right)?];
                Ok(match op {
                    LogicalOp::And => Predicate::All(both),
                    LogicalOp::Or => Predicate::Any(both),
                })
            }
            Expr::Not(inner) => Ok(Predicate::Not(Box::new(self.bind(inner)?))),
            Expr::Function { name, args } => self.bind_function(*name, args),
        }
    }

    fn bind_function(
        &self,
        name: FunctionName,
        args: &[Operand],
    ) -> Result<Predicate, ExpressionError> {
        let subject = match args.first() {
            Some(Operand::Name(path)) => path.resolve(self.names)?,
            _ => {
                return Err(ExpressionError::InvalidOperand {
                    operation: name.to_string(),
                    message: "the first operand must be an attribute name".to_owned(),
                });
            }
        };
        let second = args.get(1).map(|arg| self.term(arg)).transpose()?;

        let test = |operator, operands| Predicate::Test {
            subject: Term::Attribute(subject.clone()),
            operator,
            operands,
        };

        match (name, second) {
            (FunctionName::AttributeExists, None) => Ok(test(ComparisonOperator::NotNull, vec![])),
            (FunctionName::AttributeNotExists, None) => Ok(test(ComparisonOperator::Null, vec![])),
            (FunctionName::AttributeType, Some(Term::Literal(AttributeValue::S(descriptor)))) => {
                if TYPE_DESCRIPTORS.contains(&descriptor.as_str()) {
                    Ok(Predicate::TypeIs {
                        attribute: subject.clone(),
                        type_descriptor: descriptor,
                    })
                } else {
                    Err(ExpressionError::InvalidOperand {
                        operation: name.to_string(),
                        message: format!("invalid type: {descriptor}"),
                    })
                }
            }
            (FunctionName::BeginsWith, Some(prefix)) => {
                if let Term::Literal(literal) = &prefix {
                    if !matches!(literal, AttributeValue::S(_) | AttributeValue::B(_)) {
                        return Err(ExpressionError::InvalidOperand {
                            operation: name.to_string(),
                            message: format!(
                                "Incorrect operand type for operator or function; operand type: {}",
                                literal.type_descriptor()
                            ),
                        });
                    }
                }
                Ok(test(ComparisonOperator::BeginsWith, vec![prefix]))
            }
            (FunctionName::Contains, Some(operand)) => {
                Ok(test(ComparisonOperator::Contains, vec![operand]))
            }
            _ => Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "Incorrect operands for function".to_owned(),
            }),
        }
    }

    fn term(&self, operand: &Operand) -> Result<Term, ExpressionError> {
        match operand {
            Operand::Name(name) => Ok(Term::Attribute(name.resolve(self.names)?)),
            Operand::Value(placeholder) => self
                .values
                .get(placeholder)
                .cloned()
                .map(Term::Literal)
                .ok_or_else(|| ExpressionError::UnresolvedValue {
                    name: placeholder.clone(),
                }),
            Operand::Size(inner) => Ok(Term::Size(Box::new(self.term(inner)?))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn evaluate(predicate: &Predicate, item: &Item) -> bool {
    match predicate {
        Predicate::Test {
            subject,
            operator,
            operands,
        } => {
            let subject = resolve(subject, item);
            let resolved: Vec<Cow<'_, AttributeValue>> =
                match operands.iter().map(|t| resolve(t, item)).collect::<Option<_>>() {
                    Some(values) => values,
                    None => return false,
                };
            let operands: Vec<&AttributeValue> = resolved.iter().map(|c| &**c).collect();
            evaluate_operator(*operator, subject.as_deref(), &operands)
        }
        Predicate::TypeIs {
            attribute,
            type_descriptor,
        } => item
            .get(attribute)
            .is_some_and(|v| v.type_descriptor() == type_descriptor),
        Predicate::All(all) => all.iter().all(|p| evaluate(p, item)),
        Predicate::Any(any) => any.iter().any(|p| evaluate(p, item)),
        Predicate::Not(inner) => !evaluate(inner, item),
    }
}

fn resolve<'a>(term: &'a Term, item: &'a Item) -> Option<Cow<'a, AttributeValue>> {
    match term {
        Term::Attribute(name) => item.get(name).map(Cow::Borrowed),
        Term::Literal(value) => Some(Cow::Borrowed(value)),
        Term::Size(inner) => {
            let size = resolve(inner, item)?.size()?;
            Some(Cow::Owned(AttributeValue::N(size.to_string())))
        }
    }
}

fn collect_predicate_attributes<'a>(predicate: &'a Predicate, out: &mut BTreeSet<&'a str>) {
    match predicate {
        Predicate::Test {
            subject, operands, ..
        } => {
            for term in std::iter::once(subject).chain(operands) {
                collect_term_attributes(term, out);
            }
        }
        Predicate::TypeIs { attribute, .. } => {
            out.insert(attribute.as_str());
        }
        Predicate::All(list) | Predicate::Any(list) => {
            for p in list {
                collect_predicate_attributes(p, out);
            }
        }
        Predicate::Not(inner) => collect_predicate_attributes(inner, out),
    }
}

fn collect_term_attributes<'a>(term: &'a Term, out: &mut BTreeSet<&'a str>) {
    match term {
        Term::Attribute(name) => {
            out.insert(name.as_str());
        }
        Term::Size(inner) => collect_term_attributes(inner, out),
        Term::Literal(_) => {}
    }
}
