use super::parser::{parse_calc, parse_calc_args};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalcNode {
    Number(f64),
    Text(String),
    Bool(bool),
    Ident(String),
    Unary(UnaryOp, Box<CalcNode>),
    Binary(BinaryOp, Box<CalcNode>, Box<CalcNode>),
    Call(String, Vec<CalcNode>),
}

/// Parameter and condition expressions, parsed once when a workflow loads.
/// `source` keeps the original text so unresolvable expressions can be
/// emitted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    VarRef(String),
    Calculate {
        source: String,
        node: CalcNode,
    },
    AutoFn {
        source: String,
        name: String,
        args: Vec<CalcNode>,
    },
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid expression `{source_text}` at offset {offset}: {reason}")]
pub struct ExprParseError {
    pub source_text: String,
    pub offset: usize,
    pub reason: String,
}

impl ExprParseError {
    pub fn new(source_text: &str, offset: usize, reason: impl Into<String>) -> Self {
        Self {
            source_text: source_text.to_string(),
            offset,
            reason: reason.into(),
        }
    }
}

const CALCULATE_PREFIX: &str = "$CALCULATE(";
const AUTO_PREFIX: &str = "$AUTO_";

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn var(name: &str) -> Self {
        Self::VarRef(name.to_string())
    }

    /// Parses a JSON parameter value. Object keys come out in the map's own
    /// (sorted) order; loaders that need declaration order build `Expr::Map`
    /// themselves.
    pub fn parse(value: &Value) -> Result<Self, ExprParseError> {
        match value {
            Value::String(raw) => Self::parse_str(raw),
            Value::Array(items) => Ok(Self::List(
                items
                    .iter()
                    .map(Self::parse)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Object(map) => Ok(Self::Map(
                map.iter()
                    .map(|(key, value)| Ok((key.clone(), Self::parse(value)?)))
                    .collect::<Result<Vec<_>, ExprParseError>>()?,
            )),
            other => Ok(Self::Literal(other.clone())),
        }
    }

    pub fn parse_str(raw: &str) -> Result<Self, ExprParseError> {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix(CALCULATE_PREFIX) {
            let inner = rest.strip_suffix(')').ok_or_else(|| {
                ExprParseError::new(raw, raw.len(), "`$CALCULATE(` is missing its closing `)`")
            })?;
            return Ok(Self::Calculate {
                source: raw.to_string(),
                node: parse_calc(inner)?,
            });
        }
        if let Some(rest) = trimmed.strip_prefix(AUTO_PREFIX) {
            let (name, args) = match rest.find('(') {
                Some(open) => {
                    let inner = rest[open + 1..].strip_suffix(')').ok_or_else(|| {
                        ExprParseError::new(raw, raw.len(), "`$AUTO_` call is missing its closing `)`")
                    })?;
                    (&rest[..open], parse_calc_args(inner)?)
                }
                None => (rest, Vec::new()),
            };
            if name.is_empty()
                || !name
                    .chars()
                    .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
            {
                return Err(ExprParseError::new(
                    raw,
                    AUTO_PREFIX.len(),
                    "`$AUTO_` names use upper-case letters, digits and `_`",
                ));
            }
            return Ok(Self::AutoFn {
                source: raw.to_string(),
                name: name.to_string(),
                args,
            });
        }
        if let Some(name) = trimmed.strip_prefix('$') {
            if is_identifier(name) {
                return Ok(Self::VarRef(name.to_string()));
            }
        }
        Ok(Self::Literal(Value::String(raw.to_string())))
    }

    /// Conditions are bare calc expressions; a `$CALCULATE(...)` wrapper is accepted too.
    pub fn parse_condition(raw: &str) -> Result<Self, ExprParseError> {
        let trimmed = raw.trim();
        let inner = trimmed
            .strip_prefix(CALCULATE_PREFIX)
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(trimmed);
        if inner.trim().is_empty() {
            return Err(ExprParseError::new(raw, 0, "condition is empty"));
        }
        Ok(Self::Calculate {
            source: raw.to_string(),
            node: parse_calc(inner)?,
        })
    }

    pub fn source_text(&self) -> String {
        match self {
            Self::Literal(Value::String(text)) => text.clone(),
            Self::Literal(value) => value.to_string(),
            Self::VarRef(name) => format!("${name}"),
            Self::Calculate { source, .. } | Self::AutoFn { source, .. } => source.clone(),
            Self::List(_) => "[...]".to_string(),
            Self::Map(_) => "{...}".to_string(),
        }
    }

    /// Variable names this expression reads, in first-seen order.
    pub fn referenced_vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal(_) => {}
            Self::VarRef(name) => push_unique(out, name),
            Self::Calculate { node, .. } => node.collect_idents(out),
            Self::AutoFn { args, .. } => {
                for arg in args {
                    arg.collect_idents(out);
                }
            }
            Self::List(items) => {
                for item in items {
                    item.collect_vars(out);
                }
            }
            Self::Map(entries) => {
                for (_, value) in entries {
                    value.collect_vars(out);
                }
            }
        }
    }
}

impl CalcNode {
    fn collect_idents(&self, out: &mut Vec<String>) {
        match self {
            Self::Ident(name) => push_unique(out, name),
            Self::Unary(_, inner) => inner.collect_idents(out),
            Self::Binary(_, left, right) => {
                left.collect_idents(out);
                right.collect_idents(out);
            }
            Self::Call(_, args) => {
                for arg in args {
                    arg.collect_idents(out);
                }
            }
            Self::Number(_) | Self::Text(_) | Self::Bool(_) => {}
        }
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|seen| seen == name) {
        out.push(name.to_string());
    }
}

pub fn is_identifier(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
