//! Incremental constrained Delaunay triangulation for large, semi-random
//! point sets (typically airborne laser-scan returns).
//!
//! The mesh topology lives in a paged quad-edge arena of packed integer
//! arrays rather than per-edge objects, which keeps the memory footprint
//! small enough for point clouds in the millions. Vertices are inserted with
//! the Bowyer–Watson algorithm using a stochastic Lawson's walk for point
//! location, removed with Devillers' ear-based retriangulation, and linear or
//! polygonal constraints can be burned into the mesh afterwards, optionally
//! restoring Delaunay conformance with synthetic midpoint vertices.
//!
//! ```
//! use terratin::{Mesh, Vertex};
//!
//! let mut mesh = Mesh::new(1.0);
//! mesh.add(Vertex::new(0.0, 0.0, 0.0)).unwrap();
//! mesh.add(Vertex::new(1.0, 0.0, 0.0)).unwrap();
//! mesh.add(Vertex::new(0.0, 1.0, 0.0)).unwrap();
//! mesh.add(Vertex::new(1.0, 1.0, 0.0)).unwrap();
//! assert!(mesh.is_bootstrapped());
//! assert_eq!(mesh.triangle_count(), 2);
//! ```

pub mod arena;
pub mod constraint;
pub mod edge;
mod mesh;
pub mod predicates;
pub mod rect;
pub mod thresholds;
pub mod vertex;

pub use constraint::Constraint;
pub use edge::EdgeRef;
pub use mesh::{IntegrityReport, Mesh, MeshStats, Monitor, NearestEdge};
pub use rect::Rect;
pub use thresholds::Thresholds;
pub use vertex::{MergeRule, Vertex, VertexRef};

/// Maximum application-assigned constraint index; the index must fit in the
/// 21-bit field of the per-pair flag word alongside the four status flags.
pub const MAX_CONSTRAINT_INDEX: usize = (1 << 20) - 1;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The mesh was disposed; no further operation is possible.
  #[error("operation on a disposed mesh")]
  Disposed,
  /// Vertex insertion and removal lock once constraints are added.
  #[error("mesh is locked after constraints have been added")]
  Locked,
  /// `add_constraints` may be called at most once per mesh.
  #[error("constraints have already been added to this mesh")]
  ConstraintsAlreadyAdded,
  #[error("constraint index {0} does not fit the 20-bit index field")]
  InvalidConstraintIndex(usize),
  #[error("invalid constraint: {0}")]
  InvalidConstraint(&'static str),
  /// An internal invariant failed; this indicates a bug in the mesh, not a
  /// misuse by the caller.
  #[error("internal error: {0}")]
  Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
