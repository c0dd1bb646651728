use crate::model::{Mode, RequiredMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParamRange {
    pub tool: String,
    pub param: String,
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    pub fn new(tool: &str, param: &str, min: f64, max: f64) -> Self {
        Self {
            tool: tool.to_string(),
            param: param.to_string(),
            min,
            max,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(format!(
                "range for `{}.{}` must have finite bounds",
                self.tool, self.param
            ));
        }
        if self.min > self.max {
            return Err(format!(
                "range for `{}.{}` has min {} greater than max {}",
                self.tool, self.param, self.min, self.max
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrectionRules {
    pub mode_switch_tool: String,
    pub mode_param: String,
    pub select_tool: String,
    pub select_all_params: Map<String, Value>,
    pub mode_prefixes: BTreeMap<String, RequiredMode>,
    pub tool_modes: BTreeMap<String, RequiredMode>,
    pub selection_required: BTreeSet<String>,
    pub param_ranges: Vec<ParamRange>,
}

impl Default for CorrectionRules {
    fn default() -> Self {
        Self::blender_defaults()
    }
}

impl CorrectionRules {
    pub fn empty() -> Self {
        Self {
            mode_switch_tool: "system_set_mode".to_string(),
            mode_param: "mode".to_string(),
            select_tool: "mesh_select".to_string(),
            select_all_params: select_all_params(),
            mode_prefixes: BTreeMap::new(),
            tool_modes: BTreeMap::new(),
            selection_required: BTreeSet::new(),
            param_ranges: Vec::new(),
        }
    }

    pub fn blender_defaults() -> Self {
        let edit = RequiredMode::Exactly(Mode::Edit);
        let object = RequiredMode::Exactly(Mode::Object);
        let sculpt = RequiredMode::Exactly(Mode::Sculpt);

        let mode_prefixes = BTreeMap::from([
            ("mesh_".to_string(), edit),
            ("uv_".to_string(), edit),
            ("modeling_".to_string(), object),
            ("curve_".to_string(), object),
            ("sculpt_".to_string(), sculpt),
            ("scene_".to_string(), RequiredMode::Any),
            ("system_".to_string(), RequiredMode::Any),
            ("material_".to_string(), RequiredMode::Any),
        ]);
        let tool_modes = BTreeMap::from([
            ("mesh_boolean".to_string(), object),
            ("mesh_join_objects".to_string(), object),
        ]);
        let selection_required = [
            "mesh_extrude_region",
            "mesh_inset",
            "mesh_bevel",
            "mesh_subdivide",
            "mesh_delete_selected",
            "mesh_smooth",
            "mesh_flatten",
            "mesh_merge_by_distance",
            "mesh_transform_selected",
            "mesh_dissolve",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        let param_ranges = vec![
            ParamRange::new("mesh_bevel", "offset", 0.001, 10.0),
            ParamRange::new("mesh_bevel", "segments", 1.0, 10.0),
            ParamRange::new("mesh_inset", "thickness", 0.001, 10.0),
            ParamRange::new("mesh_inset", "depth", -10.0, 10.0),
            ParamRange::new("mesh_subdivide", "number_cuts", 1.0, 10.0),
            ParamRange::new("mesh_extrude_region", "move", -100.0, 100.0),
            ParamRange::new("mesh_smooth", "iterations", 1.0, 100.0),
            ParamRange::new("mesh_smooth", "factor", 0.0, 1.0),
            ParamRange::new("mesh_merge_by_distance", "distance", 0.00001, 1.0),
            ParamRange::new("modeling_create_primitive", "size", 0.001, 1000.0),
            ParamRange::new("modeling_transform_object", "scale", 0.0001, 1000.0),
            ParamRange::new("sculpt_draw", "strength", 0.0, 1.0),
            ParamRange::new("sculpt_draw", "radius", 1.0, 500.0),
        ];

        Self {
            mode_prefixes,
            tool_modes,
            selection_required,
            param_ranges,
            ..Self::empty()
        }
    }

    /// Exact tool entries beat prefixes; among prefixes the longest wins.
    pub fn required_mode(&self, tool: &str) -> Option<RequiredMode> {
        if let Some(mode) = self.tool_modes.get(tool) {
            return Some(*mode);
        }
        self.mode_prefixes
            .iter()
            .filter(|(prefix, _)| tool.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, mode)| *mode)
    }

    pub fn requires_selection(&self, tool: &str) -> bool {
        self.selection_required.contains(tool)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mode_switch_tool.trim().is_empty() {
            return Err("mode_switch_tool must be non-empty".to_string());
        }
        if self.mode_param.trim().is_empty() {
            return Err("mode_param must be non-empty".to_string());
        }
        if self.select_tool.trim().is_empty() {
            return Err("select_tool must be non-empty".to_string());
        }
        for range in &self.param_ranges {
            range.validate()?;
        }
        Ok(())
    }
}

fn select_all_params() -> Map<String, Value> {
    Map::from_iter([("action".to_string(), Value::String("all".to_string()))])
}
