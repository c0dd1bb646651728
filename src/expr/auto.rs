use super::ast::CalcNode;
use super::eval::{evaluate_calc, number_value, Scalar, Scope};
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
enum Basis {
    Smallest,
    Largest,
    Uniform,
}

/// `$AUTO_<NAME>`: `factor` times a quantity read off the active object.
/// `Uniform` entries are constant scale vectors.
const AUTO_TABLE: &[(&str, Basis, f64)] = &[
    ("BEVEL", Basis::Smallest, 0.05),
    ("BEVEL_SMALL", Basis::Smallest, 0.02),
    ("BEVEL_LARGE", Basis::Smallest, 0.1),
    ("INSET", Basis::Smallest, 0.03),
    ("INSET_THICK", Basis::Smallest, 0.08),
    ("EXTRUDE", Basis::Largest, 0.1),
    ("EXTRUDE_SMALL", Basis::Largest, 0.05),
    ("EXTRUDE_DEEP", Basis::Largest, 0.25),
    ("OFFSET", Basis::Smallest, 0.02),
    ("SCREEN_DEPTH", Basis::Smallest, 0.5),
    ("SCALE_SMALL", Basis::Uniform, 0.8),
    ("SCALE_TINY", Basis::Uniform, 0.5),
];

pub fn auto_names() -> impl Iterator<Item = &'static str> {
    AUTO_TABLE
        .iter()
        .map(|(name, _, _)| *name)
        .chain(["DIM", "FRACTION"])
}

pub fn resolve_auto(name: &str, args: &[CalcNode], scope: &Scope<'_>) -> Result<Value, String> {
    match name {
        "DIM" => {
            expect_args(name, args, 1)?;
            let dims = active_dimensions(name, scope)?;
            Ok(number_value(dims[axis_index(&args[0], scope)?]))
        }
        "FRACTION" => {
            expect_args(name, args, 2)?;
            let dims = active_dimensions(name, scope)?;
            let axis = axis_index(&args[0], scope)?;
            let factor = match evaluate_calc(&args[1], scope)? {
                Scalar::Number(value) => value,
                other => return Err(format!("`$AUTO_FRACTION` factor must be a number, got {other:?}")),
            };
            Ok(number_value(dims[axis] * factor))
        }
        _ => {
            let (_, basis, factor) = AUTO_TABLE
                .iter()
                .find(|(entry, _, _)| *entry == name)
                .ok_or_else(|| format!("unknown auto value `$AUTO_{name}`"))?;
            expect_args(name, args, 0)?;
            match basis {
                Basis::Uniform => Ok(Value::Array(vec![number_value(*factor); 3])),
                Basis::Smallest => {
                    let dims = active_dimensions(name, scope)?;
                    let smallest = dims.iter().copied().fold(f64::INFINITY, f64::min);
                    Ok(number_value(smallest * factor))
                }
                Basis::Largest => {
                    let dims = active_dimensions(name, scope)?;
                    let largest = dims.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    Ok(number_value(largest * factor))
                }
            }
        }
    }
}

fn expect_args(name: &str, args: &[CalcNode], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "`$AUTO_{name}` takes {expected} argument(s), got {}",
            args.len()
        ))
    }
}

fn active_dimensions(name: &str, scope: &Scope<'_>) -> Result<[f64; 3], String> {
    scope
        .scene
        .active_dimensions()
        .ok_or_else(|| format!("`$AUTO_{name}` needs an active object"))
}

/// Bare axis names are read literally before falling back to evaluation, so
/// `x` works even though it parses as an identifier.
fn axis_index(arg: &CalcNode, scope: &Scope<'_>) -> Result<usize, String> {
    let scalar = match arg {
        CalcNode::Ident(name) if !scope.vars.contains_key(name) => Scalar::Text(name.clone()),
        other => evaluate_calc(other, scope)?,
    };
    match scalar {
        Scalar::Text(text) => match text.to_ascii_lowercase().as_str() {
            "x" | "width" => Ok(0),
            "y" | "depth" => Ok(1),
            "z" | "height" => Ok(2),
            other => Err(format!("`{other}` is not an axis (x, y, z)")),
        },
        Scalar::Number(value) if value.fract() == 0.0 && (0.0..3.0).contains(&value) => {
            Ok(value as usize)
        }
        other => Err(format!("{other:?} is not an axis (x, y, z)")),
    }
}
