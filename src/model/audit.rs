use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    ModeSwitch,
    SelectionFix,
    Clamp,
    Override,
    OverrideConflict,
    RuntimeSkip,
    ModifierMatch,
    LoopUnroll,
    UnresolvedReference,
    Include,
    LimitReached,
    CollaboratorTimeout,
    Passthrough,
    Goal,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModeSwitch => "mode_switch",
            Self::SelectionFix => "selection_fix",
            Self::Clamp => "clamp",
            Self::Override => "override",
            Self::OverrideConflict => "override_conflict",
            Self::RuntimeSkip => "runtime_skip",
            Self::ModifierMatch => "modifier_match",
            Self::LoopUnroll => "loop_unroll",
            Self::UnresolvedReference => "unresolved_reference",
            Self::Include => "include",
            Self::LimitReached => "limit_reached",
            Self::CollaboratorTimeout => "collaborator_timeout",
            Self::Passthrough => "passthrough",
            Self::Goal => "goal",
        }
    }
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuditEntry {
    pub kind: AuditKind,
    pub message: String,
}

impl AuditEntry {
    pub fn new(kind: AuditKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Append-only record of every decision taken while planning one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<AuditEntry>);

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: AuditKind, message: impl Into<String>) {
        self.0.push(AuditEntry::new(kind, message));
    }

    pub fn record(&mut self, entry: AuditEntry) {
        self.0.push(entry);
    }

    pub fn append(&mut self, other: AuditTrail) {
        self.0.extend(other.0);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn of_kind(&self, kind: AuditKind) -> impl Iterator<Item = &AuditEntry> {
        self.0.iter().filter(move |entry| entry.kind == kind)
    }

    pub fn contains_kind(&self, kind: AuditKind) -> bool {
        self.of_kind(kind).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
