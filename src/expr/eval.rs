use super::ast::{BinaryOp, CalcNode, Expr, UnaryOp};
use super::auto::resolve_auto;
use crate::model::{AuditKind, AuditTrail, SceneContext};
use serde_json::{Map, Number, Value};

/// Variable bindings plus the scene the `$AUTO_*` helpers and condition
/// identifiers read from. During expansion the scene is the simulated view.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub vars: &'a Map<String, Value>,
    pub scene: &'a SceneContext,
}

impl<'a> Scope<'a> {
    pub fn new(vars: &'a Map<String, Value>, scene: &'a SceneContext) -> Self {
        Self { vars, scene }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Scalar {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Number(value) => number_value(value),
            Self::Text(text) => Value::String(text),
            Self::Bool(flag) => Value::Bool(flag),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::Text(text) => !text.is_empty(),
            Self::Bool(flag) => *flag,
        }
    }

    fn as_number(&self, context: &str) -> Result<f64, String> {
        match self {
            Self::Number(value) => Ok(*value),
            other => Err(format!("{context} expects a number, got {other:?}")),
        }
    }
}

pub(crate) fn number_value(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Resolves an expression. Anything that cannot be resolved is emitted as its
/// original text and flagged as `UnresolvedReference`.
pub fn evaluate(expr: &Expr, scope: &Scope<'_>, audit: &mut AuditTrail) -> Value {
    match expr {
        Expr::Literal(Value::String(text)) => {
            Value::String(interpolate_audited(text, scope.vars, audit))
        }
        Expr::Literal(value) => value.clone(),
        Expr::VarRef(name) => match scope.vars.get(name) {
            Some(value) => value.clone(),
            None => {
                audit.push(
                    AuditKind::UnresolvedReference,
                    format!("`${name}` is not bound; kept as literal text"),
                );
                Value::String(format!("${name}"))
            }
        },
        Expr::Calculate { source, node } => match evaluate_calc(node, scope) {
            Ok(Scalar::Number(value)) if !value.is_finite() => {
                unresolved(audit, source, "result is not a finite number")
            }
            Ok(scalar) => scalar.into_value(),
            Err(reason) => unresolved(audit, source, &reason),
        },
        Expr::AutoFn { source, name, args } => match resolve_auto(name, args, scope) {
            Ok(value) => value,
            Err(reason) => unresolved(audit, source, &reason),
        },
        Expr::List(items) => Value::Array(
            items
                .iter()
                .map(|item| evaluate(item, scope, audit))
                .collect(),
        ),
        Expr::Map(entries) => {
            let mut out = Map::new();
            for (key, value) in entries {
                let resolved = evaluate(value, scope, audit);
                out.insert(key.clone(), resolved);
            }
            Value::Object(out)
        }
    }
}

fn unresolved(audit: &mut AuditTrail, source: &str, reason: &str) -> Value {
    audit.push(
        AuditKind::UnresolvedReference,
        format!("`{source}` could not be resolved ({reason}); kept as literal text"),
    );
    Value::String(source.to_string())
}

/// Evaluates a condition. `Err` carries the reason it could not be decided.
pub fn evaluate_condition(expr: &Expr, scope: &Scope<'_>) -> Result<bool, String> {
    match expr {
        Expr::Calculate { node, .. } => evaluate_calc(node, scope).map(|scalar| scalar.truthy()),
        Expr::Literal(value) => Scalar::from_value(value)
            .map(|scalar| scalar.truthy())
            .ok_or_else(|| format!("`{value}` is not a condition")),
        Expr::VarRef(name) => scope
            .vars
            .get(name)
            .and_then(Scalar::from_value)
            .map(|scalar| scalar.truthy())
            .ok_or_else(|| format!("`${name}` is not bound to a scalar")),
        other => Err(format!("`{}` is not a condition", other.source_text())),
    }
}

pub fn evaluate_calc(node: &CalcNode, scope: &Scope<'_>) -> Result<Scalar, String> {
    match node {
        CalcNode::Number(value) => Ok(Scalar::Number(*value)),
        CalcNode::Text(text) => Ok(Scalar::Text(text.clone())),
        CalcNode::Bool(flag) => Ok(Scalar::Bool(*flag)),
        CalcNode::Ident(name) => lookup(name, scope),
        CalcNode::Unary(UnaryOp::Neg, inner) => {
            let value = evaluate_calc(inner, scope)?.as_number("unary `-`")?;
            Ok(Scalar::Number(-value))
        }
        CalcNode::Unary(UnaryOp::Not, inner) => {
            Ok(Scalar::Bool(!evaluate_calc(inner, scope)?.truthy()))
        }
        CalcNode::Binary(BinaryOp::And, left, right) => {
            if !evaluate_calc(left, scope)?.truthy() {
                return Ok(Scalar::Bool(false));
            }
            Ok(Scalar::Bool(evaluate_calc(right, scope)?.truthy()))
        }
        CalcNode::Binary(BinaryOp::Or, left, right) => {
            if evaluate_calc(left, scope)?.truthy() {
                return Ok(Scalar::Bool(true));
            }
            Ok(Scalar::Bool(evaluate_calc(right, scope)?.truthy()))
        }
        CalcNode::Binary(op, left, right) => {
            let left = evaluate_calc(left, scope)?;
            let right = evaluate_calc(right, scope)?;
            binary(*op, left, right)
        }
        CalcNode::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| {
                    evaluate_calc(arg, scope)?.as_number(&format!("`{name}` argument"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            call_function(name, &values)
        }
    }
}

fn lookup(name: &str, scope: &Scope<'_>) -> Result<Scalar, String> {
    if let Some(value) = scope.vars.get(name) {
        return Scalar::from_value(value)
            .ok_or_else(|| format!("`{name}` is bound to a non-scalar value"));
    }
    let scene = scope.scene;
    let dimension = |axis: usize| {
        scene
            .active_dimensions()
            .map(|dims| Scalar::Number(dims[axis]))
            .ok_or_else(|| format!("`{name}` needs an active object"))
    };
    match name {
        "current_mode" => Ok(Scalar::Text(scene.mode.as_str().to_string())),
        "has_selection" => Ok(Scalar::Bool(scene.has_selection())),
        "object_count" => Ok(Scalar::Number(scene.object_count() as f64)),
        "active_object" => scene
            .active_object
            .clone()
            .map(Scalar::Text)
            .ok_or_else(|| "no active object".to_string()),
        "selected_verts" => Ok(Scalar::Number(scene.selection.vertices as f64)),
        "selected_edges" => Ok(Scalar::Number(scene.selection.edges as f64)),
        "selected_faces" => Ok(Scalar::Number(scene.selection.faces as f64)),
        "dim_x" => dimension(0),
        "dim_y" => dimension(1),
        "dim_z" => dimension(2),
        _ => Err(format!("`{name}` is not bound")),
    }
}

fn binary(op: BinaryOp, left: Scalar, right: Scalar) -> Result<Scalar, String> {
    let symbol = op.symbol();
    match op {
        BinaryOp::Eq => Ok(Scalar::Bool(scalars_equal(&left, &right))),
        BinaryOp::Ne => Ok(Scalar::Bool(!scalars_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Scalar::Number(a), Scalar::Number(b)) => a.partial_cmp(b),
                (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| format!("cannot compare {left:?} {symbol} {right:?}"))?;
            Ok(Scalar::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        _ => {
            let context = format!("`{symbol}`");
            let a = left.as_number(&context)?;
            let b = right.as_number(&context)?;
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    a / b
                }
                _ => {
                    if b == 0.0 {
                        return Err("remainder by zero".to_string());
                    }
                    a % b
                }
            };
            Ok(Scalar::Number(value))
        }
    }
}

fn scalars_equal(left: &Scalar, right: &Scalar) -> bool {
    match (left, right) {
        (Scalar::Number(a), Scalar::Number(b)) => (a - b).abs() <= 1e-9,
        (Scalar::Text(a), Scalar::Text(b)) => a == b,
        (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
        _ => false,
    }
}

fn call_function(name: &str, args: &[f64]) -> Result<Scalar, String> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(format!(
                "`{name}` takes {expected} argument(s), got {}",
                args.len()
            ))
        }
    };
    let value = match name {
        "abs" => {
            arity(1)?;
            args[0].abs()
        }
        "round" => {
            arity(1)?;
            args[0].round()
        }
        "floor" => {
            arity(1)?;
            args[0].floor()
        }
        "ceil" => {
            arity(1)?;
            args[0].ceil()
        }
        "sqrt" => {
            arity(1)?;
            if args[0] < 0.0 {
                return Err("`sqrt` of a negative number".to_string());
            }
            args[0].sqrt()
        }
        "sin" => {
            arity(1)?;
            args[0].sin()
        }
        "cos" => {
            arity(1)?;
            args[0].cos()
        }
        "tan" => {
            arity(1)?;
            args[0].tan()
        }
        "radians" => {
            arity(1)?;
            args[0].to_radians()
        }
        "degrees" => {
            arity(1)?;
            args[0].to_degrees()
        }
        "pow" => {
            arity(2)?;
            args[0].powf(args[1])
        }
        "atan2" => {
            arity(2)?;
            args[0].atan2(args[1])
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(format!("`{name}` needs at least one argument"));
            }
            let fold = if name == "min" { f64::min } else { f64::max };
            args[1..].iter().copied().fold(args[0], fold)
        }
        _ => return Err(format!("unknown function `{name}`")),
    };
    Ok(Scalar::Number(value))
}

/// Replaces `{name}` with the bound value. Unknown names and unbalanced
/// braces stay verbatim.
pub fn interpolate(text: &str, vars: &Map<String, Value>) -> String {
    substitute(text, vars, &mut Vec::new())
}

/// Like [`interpolate`], flagging every unknown `{name}` as an unresolved
/// reference.
pub fn interpolate_audited(
    text: &str,
    vars: &Map<String, Value>,
    audit: &mut AuditTrail,
) -> String {
    let mut missing = Vec::new();
    let out = substitute(text, vars, &mut missing);
    for name in missing {
        audit.push(
            AuditKind::UnresolvedReference,
            format!("`{{{name}}}` in `{text}` is not bound; kept as literal text"),
        );
    }
    out
}

fn substitute(text: &str, vars: &Map<String, Value>, missing: &mut Vec<String>) -> String {
    if !text.contains('{') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = after[..close].trim();
        match vars.get(name) {
            Some(value) if !name.is_empty() => out.push_str(&render(value)),
            _ => {
                if !name.is_empty() {
                    missing.push(name.to_string());
                }
                out.push_str(&rest[open..open + close + 2]);
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => match (number.as_i64(), number.as_u64(), number.as_f64()) {
            (Some(int), _, _) => int.to_string(),
            (_, Some(uint), _) => uint.to_string(),
            (_, _, Some(float)) => float.to_string(),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}
