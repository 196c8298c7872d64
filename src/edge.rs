//! Read-only edge cursors.
//!
//! An [`EdgeRef`] is a lightweight cursor into the arena of a borrowed mesh.
//! Because it holds a shared borrow, the borrow checker statically rules out
//! any mesh mutation while a cursor (or an iterator producing cursors) is
//! alive; stale traversal is a compile error rather than a runtime check.

use crate::arena::EdgeIndex;
use crate::constraint::Constraint;
use crate::mesh::Mesh;
use crate::vertex::{Vertex, VertexRef, SLOT_NONE};

/// Directed edge of a mesh. The vertex `a` is the origin, `b` the
/// destination; the edge's triangle lies on its left.
#[derive(Clone, Copy)]
pub struct EdgeRef<'m> {
  mesh: &'m Mesh,
  e: EdgeIndex,
}

impl<'m> EdgeRef<'m> {
  pub(crate) fn new(mesh: &'m Mesh, e: EdgeIndex) -> EdgeRef<'m> {
    EdgeRef { mesh, e }
  }

  /// Arena index of this directed edge.
  pub fn index(&self) -> u32 {
    self.e.as_u32()
  }

  /// Origin vertex; `None` on the null side of a ghost pair. Merger groups
  /// resolve to their first-inserted member.
  pub fn a(&self) -> Option<&'m Vertex> {
    self.vertex_at(self.mesh.arena.a(self.e))
  }

  /// Destination vertex; `None` for ghost edges.
  pub fn b(&self) -> Option<&'m Vertex> {
    self.vertex_at(self.mesh.arena.b(self.e))
  }

  fn vertex_at(&self, slot: u32) -> Option<&'m Vertex> {
    if slot == SLOT_NONE {
      None
    } else {
      Some(self.mesh.pool.canonical(slot))
    }
  }

  /// Tagged reference of the origin: single vertex or merger group.
  pub fn a_ref(&self) -> Option<VertexRef> {
    let slot = self.mesh.arena.a(self.e);
    if slot == SLOT_NONE {
      None
    } else {
      Some(VertexRef::from_slot(slot))
    }
  }

  pub fn b_ref(&self) -> Option<VertexRef> {
    self.dual().a_ref()
  }

  /// Z of the origin, resolved through the merger rule for groups.
  pub fn a_z(&self) -> Option<f64> {
    let slot = self.mesh.arena.a(self.e);
    if slot == SLOT_NONE {
      None
    } else {
      Some(self.mesh.pool.z(slot))
    }
  }

  pub fn b_z(&self) -> Option<f64> {
    self.dual().a_z()
  }

  pub fn forward(&self) -> EdgeRef<'m> {
    EdgeRef::new(self.mesh, self.mesh.arena.forward(self.e))
  }

  pub fn reverse(&self) -> EdgeRef<'m> {
    EdgeRef::new(self.mesh, self.mesh.arena.reverse(self.e))
  }

  pub fn dual(&self) -> EdgeRef<'m> {
    EdgeRef::new(self.mesh, self.e.dual())
  }

  pub fn forward_from_dual(&self) -> EdgeRef<'m> {
    self.dual().forward()
  }

  pub fn reverse_from_dual(&self) -> EdgeRef<'m> {
    self.dual().reverse()
  }

  /// Apex of the left triangle; `None` when the left face is a ghost.
  pub fn triangle_apex(&self) -> Option<&'m Vertex> {
    self.forward().b()
  }

  /// True iff the pair has a null side.
  pub fn is_ghost(&self) -> bool {
    self.mesh.arena.is_ghost(self.e)
  }

  /// True iff the triangle on this edge's left is a ghost triangle.
  pub fn is_exterior(&self) -> bool {
    let arena = &self.mesh.arena;
    arena.a(self.e) == SLOT_NONE
      || arena.b(self.e) == SLOT_NONE
      || arena.triangle_apex(self.e) == SLOT_NONE
  }

  pub fn is_constrained(&self) -> bool {
    self.mesh.arena.is_constrained(self.e)
  }

  pub fn is_constrained_region_border(&self) -> bool {
    self.mesh.arena.is_region_border(self.e)
  }

  pub fn is_constrained_region_interior(&self) -> bool {
    self.mesh.arena.is_region_interior(self.e)
  }

  pub fn is_constrained_region_member(&self) -> bool {
    self.mesh.arena.is_region_member(self.e)
  }

  pub fn is_constraint_line_member(&self) -> bool {
    self.mesh.arena.is_line_member(self.e)
  }

  /// Index stored in the pair's flag word, if any flags are set.
  pub fn constraint_index(&self) -> Option<usize> {
    self.mesh.arena.constraint_index(self.e)
  }

  /// Region constraint whose border produced this edge.
  pub fn border_constraint(&self) -> Option<&'m Constraint> {
    let cid = self.mesh.arena.border_constraint(self.e)?;
    self.mesh.constraints.get(cid)
  }

  /// Linear constraint that overlays this edge.
  pub fn line_constraint(&self) -> Option<&'m Constraint> {
    let cid = self.mesh.arena.line_constraint(self.e)?;
    self.mesh.constraints.get(cid)
  }

  /// Region constraint governing the area this edge lies in, border or
  /// interior.
  pub fn region_constraint(&self) -> Option<&'m Constraint> {
    if self.mesh.arena.is_region_border(self.e) {
      return self.border_constraint();
    }
    if self.mesh.arena.is_region_interior(self.e) {
      let cid = self.mesh.arena.constraint_index(self.e)?;
      return self.mesh.constraints.get(cid);
    }
    None
  }

  pub fn is_synthetic(&self) -> bool {
    self.mesh.arena.is_synthetic(self.e)
  }

  /// Planar length; `None` for ghost pairs.
  pub fn length(&self) -> Option<f64> {
    let a = self.a()?;
    let b = self.b()?;
    Some(a.distance_sq(b.x(), b.y()).sqrt())
  }

  /// Iterate the directed edges sharing this edge's origin, in
  /// counterclockwise order starting with this edge.
  pub fn pinwheel(&self) -> Pinwheel<'m> {
    Pinwheel {
      mesh: self.mesh,
      start: self.e,
      cur: Some(self.e),
    }
  }
}

impl std::fmt::Debug for EdgeRef<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let slot = |s: u32| {
      if s == SLOT_NONE {
        "null".to_string()
      } else {
        format!("{}", s)
      }
    };
    write!(
      f,
      "{:?} ({} -> {})",
      self.e,
      slot(self.mesh.arena.a(self.e)),
      slot(self.mesh.arena.b(self.e))
    )
  }
}

impl PartialEq for EdgeRef<'_> {
  fn eq(&self, other: &Self) -> bool {
    std::ptr::eq(self.mesh, other.mesh) && self.e == other.e
  }
}

impl Eq for EdgeRef<'_> {}

/// Counterclockwise traversal of the edges around a common origin.
pub struct Pinwheel<'m> {
  mesh: &'m Mesh,
  start: EdgeIndex,
  cur: Option<EdgeIndex>,
}

impl<'m> Iterator for Pinwheel<'m> {
  type Item = EdgeRef<'m>;

  fn next(&mut self) -> Option<EdgeRef<'m>> {
    let e = self.cur?;
    let next = self.mesh.arena.reverse(e).dual();
    self.cur = if next == self.start { None } else { Some(next) };
    Some(EdgeRef::new(self.mesh, e))
  }
}
