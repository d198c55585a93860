//! Condition and projection expressions.
//!
//! Expressions name top-level attributes directly or through `#name`
//! placeholders and take literals from `:value` placeholders. The pipeline is:
//!
//! 1. **Lexing**: tokenize the expression string.
//! 2. **Parsing**: build an [`Expr`] tree by recursive descent, bounded by a
//!    maximum nesting depth.
//! 3. **Binding**: the planner and the filter resolve placeholders and turn the
//!    tree into their own representations.
//!
//! Nested document paths (`a.b`, `a[0]`) are rejected at parse time.

pub mod ast;
pub mod parser;

pub use ast::{CompareOp, Expr, FunctionName, LogicalOp, NameRef, Operand};
pub use parser::{ExpressionError, parse_condition, parse_projection};
