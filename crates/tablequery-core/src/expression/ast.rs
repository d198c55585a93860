//! AST for condition and projection expressions.
//!
//! Also provides the walkers that collect placeholder references, used to
//! reject undefined or unused `#name` / `:value` entries.

use std::collections::HashSet;
use std::fmt;

use tablequery_model::types::{ComparisonOperator, ExpressionAttributeNames};

use super::parser::ExpressionError;

/// Condition expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `left op right`.
    Compare {
        /// Left-hand operand.
        left: Operand,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Operand,
    },
    /// `value BETWEEN low AND high`.
    Between {
        /// Value to test.
        value: Operand,
        /// Lower bound (inclusive).
        low: Operand,
        /// Upper bound (inclusive).
        high: Operand,
    },
    /// `value IN (list...)`.
    In {
        /// Value to search for.
        value: Operand,
        /// Candidate values.
        list: Vec<Operand>,
    },
    /// `left AND right` or `left OR right`.
    Logical {
        /// Logical operator.
        op: LogicalOp,
        /// Left-hand expression.
        left: Box<Expr>,
        /// Right-hand expression.
        right: Box<Expr>,
    },
    /// `NOT expr`.
    Not(Box<Expr>),
    /// `function_name(args...)`.
    Function {
        /// Function name.
        name: FunctionName,
        /// Function arguments.
        args: Vec<Operand>,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// The equivalent legacy comparison operator.
    #[must_use]
    pub fn to_comparison(self) -> ComparisonOperator {
        match self {
            Self::Eq => ComparisonOperator::Eq,
            Self::Ne => ComparisonOperator::Ne,
            Self::Lt => ComparisonOperator::Lt,
            Self::Le => ComparisonOperator::Le,
            Self::Gt => ComparisonOperator::Gt,
            Self::Ge => ComparisonOperator::Ge,
        }
    }

    /// The operator with its operands swapped: `a < b` is `b > a`.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Built-in condition functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `attribute_exists(path)`
    AttributeExists,
    /// `attribute_not_exists(path)`
    AttributeNotExists,
    /// `attribute_type(path, :type)`
    AttributeType,
    /// `begins_with(path, :prefix)`
    BeginsWith,
    /// `contains(path, :operand)`
    Contains,
}

impl FunctionName {
    /// Number of arguments the function takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::AttributeExists | Self::AttributeNotExists => 1,
            Self::AttributeType | Self::BeginsWith | Self::Contains => 2,
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::AttributeType => write!(f, "attribute_type"),
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

/// A reference to a top-level attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameRef {
    /// A literal attribute name.
    Plain(String),
    /// A `#name` placeholder, stored with its `#`.
    Placeholder(String),
}

impl NameRef {
    /// Resolve to the attribute name, looking placeholders up in `names`.
    pub fn resolve(&self, names: &ExpressionAttributeNames) -> Result<String, ExpressionError> {
        match self {
            Self::Plain(name) => Ok(name.clone()),
            Self::Placeholder(placeholder) => names.get(placeholder).cloned().ok_or_else(|| {
                ExpressionError::UnresolvedName {
                    name: placeholder.clone(),
                }
            }),
        }
    }
}

impl fmt::Display for NameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(name) | Self::Placeholder(name) => f.write_str(name),
        }
    }
}

/// An operand: a value producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// An attribute reference.
    Name(NameRef),
    /// A `:value` placeholder, stored with its `:`.
    Value(String),
    /// `size(operand)`.
    Size(Box<Operand>),
}

impl Operand {
    /// The attribute referenced by this operand, if it is a bare reference.
    #[must_use]
    pub fn as_name(&self) -> Option<&NameRef> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Value(value) => f.write_str(value),
            Self::Size(inner) => write!(f, "size({inner})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Collecting placeholder and attribute references
// ---------------------------------------------------------------------------

impl Expr {
    /// Visit every operand in the tree.
    pub fn for_each_operand<'e>(&'e self, visit: &mut impl FnMut(&'e Operand)) {
        match self {
            Self::Compare { left, right, .. } => {
                visit(left);
                visit(right);
            }
            Self::Between { value, low, high } => {
                visit(value);
                visit(low);
                visit(high);
            }
            Self::In { value, list } => {
                visit(value);
                list.iter().for_each(|item| visit(item));
            }
            Self::Logical { left, right, .. } => {
                left.for_each_operand(visit);
                right.for_each_operand(visit);
            }
            Self::Not(inner) => inner.for_each_operand(visit),
            Self::Function { args, .. } => args.iter().for_each(|arg| visit(arg)),
        }
    }

    /// Every attribute referenced by the expression, placeholders unresolved.
    #[must_use]
    pub fn attribute_refs(&self) -> Vec<&NameRef> {
        let mut refs = Vec::new();
        self.for_each_operand(&mut |operand| collect_operand_names(operand, &mut refs));
        refs
    }
}

fn collect_operand_names<'e>(operand: &'e Operand, refs: &mut Vec<&'e NameRef>) {
    match operand {
        Operand::Name(name) => refs.push(name),
        Operand::Size(inner) => collect_operand_names(inner, refs),
        Operand::Value(_) => {}
    }
}

fn collect_operand_values<'e>(operand: &'e Operand, values: &mut HashSet<String>) {
    match operand {
        Operand::Value(value) => {
            values.insert(value.clone());
        }
        Operand::Size(inner) => collect_operand_values(inner, values),
        Operand::Name(_) => {}
    }
}

/// Collect the `#name` placeholders used in a condition expression.
#[allow(clippy::implicit_hasher)]
pub fn collect_names_from_expr(expr: &Expr, names: &mut HashSet<String>) {
    for name in expr.attribute_refs() {
        if let NameRef::Placeholder(placeholder) = name {
            names.insert(placeholder.clone());
        }
    }
}

/// Collect the `:value` placeholders used in a condition expression.
#[allow(clippy::implicit_hasher)]
pub fn collect_values_from_expr(expr: &Expr, values: &mut HashSet<String>) {
    expr.for_each_operand(&mut |operand| collect_operand_values(operand, values));
}

/// Collect the `#name` placeholders used in a projection.
#[allow(clippy::implicit_hasher)]
pub fn collect_names_from_projection(paths: &[NameRef], names: &mut HashSet<String>) {
    for path in paths {
        if let NameRef::Placeholder(placeholder) = path {
            names.insert(placeholder.clone());
        }
    }
}
