use crate::correction::CorrectionRules;
use crate::model::{Mode, ObjectInfo, SceneContext, SelectionCounts, ToolCall};
use serde_json::Value;
use tracing::trace;

/// Heuristic guess at what a call does to the scene, used only to keep a
/// planning view current between generated calls. The view is a private
/// copy and never reaches the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectModel {
    mode_switch_tool: String,
    mode_param: String,
    select_tool: String,
}

impl Default for EffectModel {
    fn default() -> Self {
        Self::from_rules(&CorrectionRules::blender_defaults())
    }
}

impl EffectModel {
    pub fn from_rules(rules: &CorrectionRules) -> Self {
        Self {
            mode_switch_tool: rules.mode_switch_tool.clone(),
            mode_param: rules.mode_param.clone(),
            select_tool: rules.select_tool.clone(),
        }
    }

    pub fn apply(&self, call: &ToolCall, view: &mut SceneContext) {
        let name = call.name();
        if name == self.mode_switch_tool {
            if let Some(mode) = call
                .param(&self.mode_param)
                .and_then(Value::as_str)
                .and_then(|raw| Mode::parse(raw).ok())
            {
                view.mode = mode;
            }
        } else if name == self.select_tool {
            apply_select(call, view);
        } else if name.contains("create") {
            apply_create(call, view);
        } else if name.contains("delete") {
            apply_delete(call, view);
        } else if name.contains("transform") || name.contains("scale") {
            apply_transform(call, view);
        }
        trace!(tool = name, mode = %view.mode, objects = view.object_count(), "simulated effect");
    }

    pub fn apply_all<'a>(&self, calls: impl IntoIterator<Item = &'a ToolCall>, view: &mut SceneContext) {
        for call in calls {
            self.apply(call, view);
        }
    }
}

fn apply_select(call: &ToolCall, view: &mut SceneContext) {
    match call.param("action").and_then(Value::as_str) {
        Some("all") | Some("ALL") | Some("SELECT") => {
            let topology = view.active().map(|info| info.topology).unwrap_or_default();
            view.selection = SelectionCounts::new(
                topology.vertex_count.max(1),
                topology.edge_count.max(1),
                topology.face_count.max(1),
            );
        }
        Some("none") | Some("NONE") | Some("DESELECT") => {
            view.selection = SelectionCounts::default();
        }
        _ => {}
    }
}

fn apply_create(call: &ToolCall, view: &mut SceneContext) {
    let id = call
        .param("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| next_object_name(view));

    let mut info = ObjectInfo::default();
    if let Some(dimensions) = call.param("dimensions").and_then(vec3) {
        info.dimensions = dimensions;
    } else if let Some(size) = call.param("size").and_then(vec3) {
        info.dimensions = size;
    }
    if let Some(scale) = call.param("scale").and_then(vec3) {
        info.scale = scale;
        for axis in 0..3 {
            info.dimensions[axis] *= scale[axis];
        }
    }
    if let Some(location) = call.param("location").and_then(vec3) {
        info.location = location;
    }
    if let Some(rotation) = call.param("rotation").and_then(vec3) {
        info.rotation = rotation;
    }

    view.objects.insert(id.clone(), info);
    view.active_object = Some(id.clone());
    view.selected_objects = vec![id];
    view.selection = SelectionCounts::default();
    view.mode = Mode::Object;
}

/// In edit mode a delete removes geometry, so it only clears the selection.
fn apply_delete(call: &ToolCall, view: &mut SceneContext) {
    if view.mode == Mode::Edit {
        view.selection = SelectionCounts::default();
        return;
    }
    let Some(target) = target_object(call, view) else {
        return;
    };
    view.objects.remove(&target);
    view.selected_objects.retain(|id| id != &target);
    if view.active_object.as_deref() == Some(target.as_str()) {
        view.active_object = None;
    }
}

fn apply_transform(call: &ToolCall, view: &mut SceneContext) {
    let Some(target) = target_object(call, view) else {
        return;
    };
    let Some(info) = view.objects.get_mut(&target) else {
        return;
    };
    if let Some(scale) = call.param("scale").and_then(vec3) {
        for axis in 0..3 {
            info.dimensions[axis] *= scale[axis];
            info.scale[axis] *= scale[axis];
        }
    }
    if let Some(dimensions) = call.param("dimensions").and_then(vec3) {
        info.dimensions = dimensions;
    }
    if let Some(location) = call.param("location").and_then(vec3) {
        info.location = location;
    }
    if let Some(rotation) = call.param("rotation").and_then(vec3) {
        info.rotation = rotation;
    }
}

fn target_object(call: &ToolCall, view: &SceneContext) -> Option<String> {
    ["name", "object", "object_name"]
        .iter()
        .find_map(|key| call.param(key).and_then(Value::as_str))
        .filter(|id| view.objects.contains_key(*id))
        .map(str::to_string)
        .or_else(|| view.active_object.clone())
}

fn next_object_name(view: &SceneContext) -> String {
    let mut index = view.object_count() + 1;
    loop {
        let candidate = format!("Object.{index:03}");
        if !view.objects.contains_key(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

/// A scalar broadcasts to all three axes.
fn vec3(value: &Value) -> Option<[f64; 3]> {
    match value {
        Value::Number(number) => number.as_f64().map(|scalar| [scalar; 3]),
        Value::Array(items) if items.len() == 3 => {
            let mut out = [0.0; 3];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = item.as_f64()?;
            }
            Some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_adds_active_object_sized_from_params() {
        let model = EffectModel::default();
        let mut view = SceneContext::new(Mode::Edit);
        model.apply(
            &ToolCall::from_json("modeling_create_primitive", json!({ "size": 1.5 })),
            &mut view,
        );
        assert_eq!(view.mode, Mode::Object);
        assert_eq!(view.active_object.as_deref(), Some("Object.001"));
        assert_eq!(view.active_dimensions(), Some([1.5, 1.5, 1.5]));
    }

    #[test]
    fn transform_scales_the_active_object() {
        let model = EffectModel::default();
        let mut view = SceneContext::new(Mode::Object)
            .with_object("Top", ObjectInfo::with_dimensions([2.0, 1.0, 0.1]))
            .with_active("Top");
        model.apply(
            &ToolCall::from_json(
                "modeling_transform_object",
                json!({ "scale": [1.0, 2.0, 1.0], "location": [0.0, 0.0, 1.0] }),
            ),
            &mut view,
        );
        let top = view.active().expect("active");
        assert_eq!(top.dimensions, [2.0, 2.0, 0.1]);
        assert_eq!(top.location, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn edit_mode_delete_clears_selection_but_keeps_object() {
        let model = EffectModel::default();
        let mut view = SceneContext::new(Mode::Edit)
            .with_object("Cube", ObjectInfo::default())
            .with_active("Cube")
            .with_selection(SelectionCounts::new(8, 12, 6));
        model.apply(&ToolCall::bare("mesh_delete_selected"), &mut view);
        assert!(!view.has_selection());
        assert_eq!(view.object_count(), 1);
    }

    #[test]
    fn mode_switch_and_select_all_update_view() {
        let model = EffectModel::default();
        let mut view = SceneContext::new(Mode::Object);
        model.apply(
            &ToolCall::from_json("system_set_mode", json!({ "mode": "EDIT" })),
            &mut view,
        );
        model.apply(
            &ToolCall::from_json("mesh_select", json!({ "action": "all" })),
            &mut view,
        );
        assert_eq!(view.mode, Mode::Edit);
        assert!(view.has_selection());
    }
}
