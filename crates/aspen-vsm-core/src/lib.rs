//! Pure value-stream map model for Aspen CI lineage.
//!
//! A value-stream map is the layered dependency graph of one concrete pipeline
//! run (or one material revision): every upstream pipeline and source-control
//! material that fed it, and the pipelines downstream of it. This crate holds
//! the graph itself and the algorithms that keep it renderable; collaborators,
//! trigger-history walks and request handling live in `aspen-vsm`.
//!
//! # Layout
//!
//! ```text
//!  level -3      level -2        level -1        level 0
//! ┌───────┐    ┌──────────┐    ┌──────────┐    ┌────────┐
//! │  git  │───>│ build    │───>│ test     │───>│ deploy │
//! └───────┘ │  └──────────┘ │  └──────────┘    └────────┘
//!           │  ┌──────────┐ │  ┌──────────┐        ^
//!           └─>│ (filler) │─┘  │ (filler) │────────┘
//!              └──────────┘    └──────────┘
//! ```
//!
//! - Every node is stored once in an id-keyed arena; edges are id lists.
//! - A node's level is set by its longest path to the root. Re-discovering a
//!   node further from the root moves it and cascades to its ancestors.
//! - [`ValueStreamMap::normalize`] inserts filler nodes so that every edge
//!   spans exactly one level.
//!
//! # Tiger Style
//!
//! - No I/O; every operation is deterministic for identical inputs
//! - Relocation and cycle checks are iterative worklists, never recursion
//! - Relocation is bounded by the node count, so a cyclic history terminates

#![warn(missing_docs)]

pub mod error;
mod graph;
mod layout;
pub mod model;
pub mod name;
pub mod node;
pub mod revision;
pub mod verified;

pub use error::Result;
pub use error::VsmCoreError;
pub use graph::ValueStreamMap;
pub use model::ValueStreamMapModel;
pub use name::NodeId;
pub use name::PipelineName;
pub use node::MaterialDetails;
pub use node::Node;
pub use node::NodeKind;
pub use node::NodeSpec;
pub use node::ViewState;
pub use revision::MaterialRevision;
pub use revision::PipelineRevision;
pub use revision::Revision;
pub use revision::StageState;
pub use revision::StageSummary;
