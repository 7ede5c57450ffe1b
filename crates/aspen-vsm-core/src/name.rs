//! Node identity.
//!
//! Pipelines are identified by name without regard to case, materials by
//! fingerprint, and filler nodes by a generated UUID.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

use serde::Serialize;
use serde::Serializer;
use uuid::Uuid;

/// Pipeline name that compares case-insensitively.
///
/// The casing the name was created with is kept for display.
#[derive(Debug, Clone)]
pub struct PipelineName {
    name: String,
    canonical: String,
}

impl PipelineName {
    /// Create a pipeline name, keeping `name` as the display casing.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let canonical = name.to_lowercase();
        Self { name, canonical }
    }

    /// Name with its original casing.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Lowercased form used for comparison and hashing.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for PipelineName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for PipelineName {}

impl Hash for PipelineName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for PipelineName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PipelineName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for PipelineName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PipelineName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Serialize for PipelineName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Identity of a node in a value-stream map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// A pipeline, by case-insensitive name.
    Pipeline(PipelineName),
    /// A source-control material, by fingerprint.
    Material(String),
    /// A layout filler, by generated id.
    Filler(Uuid),
}

impl NodeId {
    /// Id of the pipeline called `name`.
    pub fn pipeline(name: impl Into<PipelineName>) -> Self {
        Self::Pipeline(name.into())
    }

    /// Id of the material with `fingerprint`.
    pub fn material(fingerprint: impl Into<String>) -> Self {
        Self::Material(fingerprint.into())
    }

    /// Pipeline name if this id names a pipeline.
    pub fn pipeline_name(&self) -> Option<&PipelineName> {
        match self {
            Self::Pipeline(name) => Some(name),
            _ => None,
        }
    }

    /// Material fingerprint if this id names a material.
    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            Self::Material(fingerprint) => Some(fingerprint),
            _ => None,
        }
    }

    /// Kind-qualified form, unique across node kinds.
    ///
    /// Used wherever ids leave the graph (serialization, derived filler ids),
    /// so pipeline `x` and material `x` never share a key.
    pub fn key(&self) -> String {
        match self {
            Self::Pipeline(name) => format!("pipeline:{}", name.canonical()),
            Self::Material(fingerprint) => format!("material:{fingerprint}"),
            Self::Filler(id) => format!("filler:{}", id.hyphenated()),
        }
    }

    /// Whether this id belongs to a layout filler.
    pub fn is_filler(&self) -> bool {
        matches!(self, Self::Filler(_))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline(name) => f.write_str(name.canonical()),
            Self::Material(fingerprint) => f.write_str(fingerprint),
            Self::Filler(id) => write!(f, "{}", id.hyphenated()),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}
