use super::ShapeHeuristic;
use crate::model::{SceneContext, ToolCall};
use serde_json::{json, Value};

type DimensionScore = fn([f64; 3]) -> Option<(f32, Value)>;

/// Scores the active object's bounding dimensions `[x, y, z]`.
#[derive(Debug, Clone, Copy)]
pub struct DimensionHeuristic {
    name: &'static str,
    score: DimensionScore,
}

impl DimensionHeuristic {
    pub const fn new(name: &'static str, score: DimensionScore) -> Self {
        Self { name, score }
    }
}

impl ShapeHeuristic for DimensionHeuristic {
    fn name(&self) -> &str {
        self.name
    }

    fn score(&self, context: &SceneContext, _history: &[ToolCall]) -> Option<(f32, Value)> {
        let dims = context.active_dimensions()?;
        if dims.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return None;
        }
        (self.score)(dims)
    }
}

pub fn builtin_heuristics() -> Vec<DimensionHeuristic> {
    vec![
        DimensionHeuristic::new("tower_like", tower_like),
        DimensionHeuristic::new("pillar_like", pillar_like),
        DimensionHeuristic::new("phone_like", phone_like),
        DimensionHeuristic::new("table_like", table_like),
        DimensionHeuristic::new("wheel_like", wheel_like),
        DimensionHeuristic::new("box_like", box_like),
    ]
}

fn footprint(dims: [f64; 3]) -> (f64, f64) {
    let [x, y, _] = dims;
    (x.max(y), x.min(y))
}

fn tower_like(dims: [f64; 3]) -> Option<(f32, Value)> {
    let (wide, _) = footprint(dims);
    let height_ratio = dims[2] / wide;
    if height_ratio < 3.0 {
        return None;
    }
    let confidence = (0.6 + (height_ratio - 3.0) * 0.1).min(0.95);
    Some((
        confidence as f32,
        json!({ "dimensions": dims, "height_ratio": height_ratio }),
    ))
}

fn pillar_like(dims: [f64; 3]) -> Option<(f32, Value)> {
    let (wide, narrow) = footprint(dims);
    let height_ratio = dims[2] / wide;
    let asymmetry = (wide - narrow) / wide;
    if height_ratio < 2.0 || asymmetry > 0.15 {
        return None;
    }
    let confidence = 0.55 + 0.3 * (1.0 - asymmetry / 0.15);
    Some((
        confidence as f32,
        json!({ "dimensions": dims, "height_ratio": height_ratio, "asymmetry": asymmetry }),
    ))
}

fn phone_like(dims: [f64; 3]) -> Option<(f32, Value)> {
    let (wide, narrow) = footprint(dims);
    let thickness_ratio = dims[2] / wide;
    let aspect = wide / narrow;
    if thickness_ratio >= 0.15 || !(1.6..=2.6).contains(&aspect) {
        return None;
    }
    let confidence = 0.85 - (aspect - 2.0).abs() * 0.2;
    Some((
        confidence as f32,
        json!({ "dimensions": dims, "thickness_ratio": thickness_ratio, "aspect": aspect }),
    ))
}

fn table_like(dims: [f64; 3]) -> Option<(f32, Value)> {
    let (wide, narrow) = footprint(dims);
    let height_ratio = dims[2] / wide;
    let aspect = wide / narrow;
    if !(0.15..0.6).contains(&height_ratio) || aspect > 2.5 {
        return None;
    }
    let confidence = 0.6 + (0.6 - height_ratio) * 0.3;
    Some((
        confidence as f32,
        json!({ "dimensions": dims, "height_ratio": height_ratio, "aspect": aspect }),
    ))
}

fn wheel_like(dims: [f64; 3]) -> Option<(f32, Value)> {
    let (wide, narrow) = footprint(dims);
    let thickness_ratio = dims[2] / wide;
    let asymmetry = (wide - narrow) / wide;
    if thickness_ratio >= 0.4 || asymmetry > 0.1 {
        return None;
    }
    let confidence = 0.75 + (0.1 - asymmetry) * 1.5;
    Some((
        confidence as f32,
        json!({ "dimensions": dims, "thickness_ratio": thickness_ratio, "asymmetry": asymmetry }),
    ))
}

fn box_like(dims: [f64; 3]) -> Option<(f32, Value)> {
    let largest = dims.iter().copied().fold(f64::MIN, f64::max);
    let smallest = dims.iter().copied().fold(f64::MAX, f64::min);
    let spread = (largest - smallest) / largest;
    if spread > 0.2 {
        return None;
    }
    let confidence = 0.9 - spread;
    Some((
        confidence as f32,
        json!({ "dimensions": dims, "spread": spread }),
    ))
}
