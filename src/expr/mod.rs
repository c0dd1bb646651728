pub mod ast;
pub mod auto;
pub mod eval;
pub mod parser;

pub use ast::{BinaryOp, CalcNode, Expr, ExprParseError, UnaryOp};
pub use auto::auto_names;
pub use eval::{
    evaluate, evaluate_calc, evaluate_condition, interpolate, interpolate_audited, Scalar, Scope,
};
pub use parser::parse_calc;
