use crate::shared::serde_ext::parse_via_string;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Object,
    Edit,
    Sculpt,
    VertexPaint,
    WeightPaint,
    TexturePaint,
    Pose,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "OBJECT",
            Self::Edit => "EDIT",
            Self::Sculpt => "SCULPT",
            Self::VertexPaint => "VERTEX_PAINT",
            Self::WeightPaint => "WEIGHT_PAINT",
            Self::TexturePaint => "TEXTURE_PAINT",
            Self::Pose => "POSE",
        }
    }

    /// Accepts host spellings such as `EDIT_MESH` and `PAINT_VERTEX`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OBJECT" => Ok(Self::Object),
            "EDIT" | "EDIT_MESH" => Ok(Self::Edit),
            "SCULPT" => Ok(Self::Sculpt),
            "VERTEX_PAINT" | "PAINT_VERTEX" => Ok(Self::VertexPaint),
            "WEIGHT_PAINT" | "PAINT_WEIGHT" => Ok(Self::WeightPaint),
            "TEXTURE_PAINT" | "PAINT_TEXTURE" => Ok(Self::TexturePaint),
            "POSE" => Ok(Self::Pose),
            _ => Err(
                "mode must be one of: OBJECT, EDIT, SCULPT, VERTEX_PAINT, WEIGHT_PAINT, TEXTURE_PAINT, POSE"
                    .to_string(),
            ),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Mode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_via_string(deserializer, "mode", Self::parse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredMode {
    Any,
    Exactly(Mode),
}

impl RequiredMode {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.trim().eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }
        Mode::parse(raw).map(Self::Exactly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Exactly(mode) => mode.as_str(),
        }
    }
}

impl std::fmt::Display for RequiredMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for RequiredMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RequiredMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_via_string(deserializer, "required mode", Self::parse)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionCounts {
    pub vertices: u64,
    pub edges: u64,
    pub faces: u64,
}

impl SelectionCounts {
    pub fn new(vertices: u64, edges: u64, faces: u64) -> Self {
        Self {
            vertices,
            edges,
            faces,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices == 0 && self.edges == 0 && self.faces == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TopologyHints {
    pub vertex_count: u64,
    pub edge_count: u64,
    pub face_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObjectInfo {
    pub dimensions: [f64; 3],
    pub location: [f64; 3],
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    pub topology: TopologyHints,
}

impl Default for ObjectInfo {
    fn default() -> Self {
        Self {
            dimensions: [2.0, 2.0, 2.0],
            location: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            topology: TopologyHints::default(),
        }
    }
}

impl ObjectInfo {
    pub fn with_dimensions(dimensions: [f64; 3]) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }
}

/// Read-only snapshot of the host application. Planning stages work on
/// clones of it; nothing here is written back to the host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SceneContext {
    pub mode: Mode,
    #[serde(default)]
    pub active_object: Option<String>,
    #[serde(default)]
    pub selection: SelectionCounts,
    #[serde(default)]
    pub selected_objects: Vec<String>,
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectInfo>,
}

impl Default for SceneContext {
    fn default() -> Self {
        Self::new(Mode::Object)
    }
}

impl SceneContext {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            active_object: None,
            selection: SelectionCounts::default(),
            selected_objects: Vec::new(),
            objects: BTreeMap::new(),
        }
    }

    pub fn with_object(mut self, id: impl Into<String>, info: ObjectInfo) -> Self {
        self.objects.insert(id.into(), info);
        self
    }

    pub fn with_active(mut self, id: impl Into<String>) -> Self {
        self.active_object = Some(id.into());
        self
    }

    pub fn with_selection(mut self, selection: SelectionCounts) -> Self {
        self.selection = selection;
        self
    }

    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    pub fn active(&self) -> Option<&ObjectInfo> {
        self.active_object
            .as_ref()
            .and_then(|id| self.objects.get(id))
    }

    pub fn active_dimensions(&self) -> Option<[f64; 3]> {
        self.active().map(|info| info.dimensions)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}
