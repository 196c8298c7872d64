//! The incremental mesh and its public contract.
//!
//! A [`Mesh`] accumulates vertices through [`Mesh::add`], maintaining a
//! Delaunay triangulation bounded by ghost edges around the convex hull.
//! Vertices can be removed, and constraint chains or polygons can be burned
//! in once via [`Mesh::add_constraints`]. All read access goes through
//! borrowed [`EdgeRef`] cursors, so readers and the single writer are
//! separated by the borrow checker rather than by locks.

mod bootstrap;
mod constrain;
mod hilbert;
mod insert;
mod remove;
mod walk;

use std::collections::HashSet;

use log::debug;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::arena::{EdgeArena, EdgeIndex};
use crate::constraint::Constraint;
use crate::edge::EdgeRef;
use crate::predicates::Predicates;
use crate::rect::Rect;
use crate::thresholds::Thresholds;
use crate::vertex::{MergeRule, Vertex, VertexPool, SLOT_NONE};
use crate::{Error, Result};

use insert::Inserted;
use walk::WalkResult;

/// PRNG seed for the walk tie-breaker and bootstrap sampling; fixed so that
/// a given insertion sequence always produces the same mesh.
const RNG_SEED: u64 = 0;

/// Vertices between two monitor consultations in bulk loading.
const MONITOR_STRIDE: usize = 1024;

/// External progress/cancellation hook for bulk vertex loading.
pub trait Monitor {
  fn progress(&mut self, _fraction: f64) {}

  fn is_canceled(&self) -> bool {
    false
  }
}

/// Result of a nearest-edge query.
#[derive(Debug)]
pub struct NearestEdge<'m> {
  /// Edge of the triangle containing (or hull edge facing) the query point.
  pub edge: EdgeRef<'m>,
  /// Perpendicular offset of the query from the edge's line; positive on
  /// the left (interior) side.
  pub signed_distance: f64,
  pub inside_hull: bool,
}

/// Diagnostic counters. Gathering them is cheap except for the triangle and
/// ghost tallies, which scan the arena's allocation bitmaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshStats {
  /// Distinct vertex positions currently in the triangulation.
  pub vertex_count: usize,
  pub triangle_count: usize,
  /// Allocated edge pairs, ghosts included.
  pub edge_count: usize,
  pub ghost_count: usize,
  pub coincident_group_count: usize,
  /// Edge pairs deallocated by cavity excavation since construction.
  pub edges_replaced: u64,
  pub in_circle_calls: u64,
  pub in_circle_extended: u64,
  pub in_circle_conflicts: u64,
  pub synthetic_vertex_count: usize,
  pub max_flood_fill_depth: usize,
}

/// Structured result of [`Mesh::check_integrity`]. A report never signals
/// failure by itself; callers decide what to do with the counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityReport {
  /// Edges where `forward.reverse` does not come back.
  pub link_violations: usize,
  /// Edges whose face is not a three-cycle.
  pub triangle_cycle_violations: usize,
  /// Non-ghost triangles with non-positive signed area.
  pub orientation_violations: usize,
  /// Unconstrained interior pairs failing the in-circle criterion beyond
  /// the Delaunay threshold.
  pub delaunay_violations: usize,
  pub max_delaunay_violation: f64,
  /// Delaunay failures across constrained pairs (expected; informational).
  pub delaunay_violations_on_constrained: usize,
  pub ghost_count: usize,
  pub perimeter_count: usize,
}

impl IntegrityReport {
  /// True when the topology and geometry are sound.
  pub fn is_consistent(&self) -> bool {
    self.link_violations == 0
      && self.triangle_cycle_violations == 0
      && self.orientation_violations == 0
      && self.delaunay_violations == 0
      && self.ghost_count == self.perimeter_count
  }
}

/// Incremental constrained Delaunay triangulation.
pub struct Mesh {
  pub(crate) arena: EdgeArena,
  pub(crate) pool: VertexPool,
  pub(crate) constraints: Vec<Constraint>,
  geo: Predicates,
  rng: SmallRng,
  bounds: Option<Rect>,
  /// Vertex ids buffered until a valid bootstrap triangle exists.
  pending: Vec<u32>,
  bootstrapped: bool,
  /// Seed for the next walk; kept near the most recent mutation.
  search_edge: EdgeIndex,
  /// Distinct vertex positions in the triangulation.
  n_structural: usize,
  constraints_added: bool,
  disposed: bool,
  edges_replaced: u64,
  synthetic_count: usize,
  max_flood_depth: usize,
}

impl Mesh {
  /// New mesh for points with the given nominal spacing.
  ///
  /// # Panics
  ///
  /// Panics if the spacing is not a finite positive number.
  pub fn new(nominal_point_spacing: f64) -> Mesh {
    let thresholds = Thresholds::new(nominal_point_spacing);
    Mesh {
      arena: EdgeArena::new(),
      pool: VertexPool::new(),
      constraints: Vec::new(),
      geo: Predicates::new(thresholds),
      rng: SmallRng::seed_from_u64(RNG_SEED),
      bounds: None,
      pending: Vec::new(),
      bootstrapped: false,
      search_edge: EdgeIndex(0),
      n_structural: 0,
      constraints_added: false,
      disposed: false,
      edges_replaced: 0,
      synthetic_count: 0,
      max_flood_depth: 0,
    }
  }

  pub fn thresholds(&self) -> &Thresholds {
    self.geo.thresholds()
  }

  // ---------------------------------------------------------------------
  // Lifecycle
  // ---------------------------------------------------------------------

  /// Reset to the empty state, keeping the allocated pages for reuse.
  /// A no-op on a disposed mesh.
  pub fn clear(&mut self) {
    if self.disposed {
      return;
    }
    self.arena.clear();
    self.pool.clear();
    self.constraints.clear();
    self.geo.reset_counters();
    self.rng = SmallRng::seed_from_u64(RNG_SEED);
    self.bounds = None;
    self.pending.clear();
    self.bootstrapped = false;
    self.search_edge = EdgeIndex(0);
    self.n_structural = 0;
    self.constraints_added = false;
    self.edges_replaced = 0;
    self.synthetic_count = 0;
    self.max_flood_depth = 0;
  }

  /// Release the arena memory. Every subsequent operation fails with
  /// [`Error::Disposed`].
  pub fn dispose(&mut self) {
    self.arena.dispose();
    self.pool.clear();
    self.constraints.clear();
    self.bootstrapped = false;
    self.disposed = true;
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed
  }

  fn check_live(&self) -> Result<()> {
    if self.disposed {
      Err(Error::Disposed)
    } else {
      Ok(())
    }
  }

  fn check_mutable(&self) -> Result<()> {
    self.check_live()?;
    if self.constraints_added {
      Err(Error::Locked)
    } else {
      Ok(())
    }
  }

  // ---------------------------------------------------------------------
  // Vertex insertion and removal
  // ---------------------------------------------------------------------

  /// Add a vertex. Returns `false` when the vertex is already present (by
  /// position and index); a vertex that merely lies within the vertex
  /// tolerance of an existing one is accepted and coalesced into a merger
  /// group.
  pub fn add(&mut self, v: Vertex) -> Result<bool> {
    self.check_mutable()?;
    match self.bounds.as_mut() {
      Some(r) => r.add_point(v.x(), v.y()),
      None => self.bounds = Some(Rect::of_point(v.x(), v.y())),
    }
    if self.bootstrapped {
      let vid = self.pool.add(v);
      Ok(!matches!(self.insert_vertex(vid), Inserted::Duplicate(_)))
    } else {
      let vid = self.pool.add(v);
      self.pending.push(vid);
      self.try_bootstrap();
      Ok(true)
    }
  }

  /// Bulk add. Large lists are pre-sorted along a Hilbert curve so that
  /// consecutive insertions stay near each other and the walk stays short.
  /// The monitor, if given, is consulted every [`MONITOR_STRIDE`] vertices;
  /// on cancellation the mesh is left valid for the vertices already added
  /// and `Ok(false)` is returned.
  pub fn add_all(
    &mut self,
    mut vertices: Vec<Vertex>,
    mut monitor: Option<&mut dyn Monitor>,
  ) -> Result<bool> {
    self.check_mutable()?;
    if vertices.len() > 64 {
      hilbert::sort(&mut vertices);
    }
    let n = vertices.len();
    let mut all = true;
    for (i, v) in vertices.into_iter().enumerate() {
      if i % MONITOR_STRIDE == 0 {
        if let Some(m) = monitor.as_deref_mut() {
          m.progress(i as f64 / n as f64);
          if m.is_canceled() {
            debug!("bulk add canceled after {} of {} vertices", i, n);
            return Ok(false);
          }
        }
      }
      all &= self.add(v)?;
    }
    if let Some(m) = monitor.as_deref_mut() {
      m.progress(1.0);
    }
    Ok(all)
  }

  /// Remove a vertex identified by position and application index. Returns
  /// `false` if no such vertex is in the mesh.
  pub fn remove(&mut self, v: &Vertex) -> Result<bool> {
    self.check_mutable()?;
    self.remove_vertex(v)
  }

  /// Rule used to resolve z across coincident-vertex groups; applies to
  /// existing groups as well as future ones.
  pub fn set_merge_rule(&mut self, rule: MergeRule) {
    self.pool.set_rule(rule);
  }

  // ---------------------------------------------------------------------
  // Constraints
  // ---------------------------------------------------------------------

  /// Embed constraints into the mesh. May be called at most once; vertex
  /// insertion and removal lock afterwards. With `restore_conformity`,
  /// synthetic midpoint vertices are inserted until every constrained edge
  /// satisfies the Delaunay criterion.
  pub fn add_constraints(
    &mut self,
    constraints: Vec<Constraint>,
    restore_conformity: bool,
  ) -> Result<()> {
    self.check_live()?;
    if self.constraints_added {
      return Err(Error::ConstraintsAlreadyAdded);
    }
    self.insert_constraints(constraints, restore_conformity)
  }

  /// The constraints owned by the mesh, in index order.
  pub fn constraints(&self) -> &[Constraint] {
    &self.constraints
  }

  /// Subdivide an existing edge at its midpoint with a synthetic vertex.
  /// `z_mid` overrides the interpolated z. The edge is identified by the
  /// index of an [`EdgeRef`] obtained from this mesh.
  pub fn split_edge(&mut self, edge_index: u32, z_mid: Option<f64>) -> Result<Vertex> {
    self.check_live()?;
    self.split_edge_at_midpoint(EdgeIndex(edge_index), z_mid)
  }

  // ---------------------------------------------------------------------
  // Queries
  // ---------------------------------------------------------------------

  pub fn is_bootstrapped(&self) -> bool {
    self.bootstrapped
  }

  /// Bounds of all vertices ever given to [`Mesh::add`], including buffered
  /// and merged ones.
  pub fn bounds(&self) -> Option<Rect> {
    self.bounds
  }

  /// Distinct vertex positions currently in the triangulation.
  pub fn vertex_count(&self) -> usize {
    if self.bootstrapped {
      self.n_structural
    } else {
      0
    }
  }

  pub fn triangle_count(&self) -> usize {
    if !self.bootstrapped {
      return 0;
    }
    let pairs = self.arena.n_allocated();
    let ghosts = self.arena.ghost_count();
    (2 * (pairs - ghosts) - ghosts) / 3
  }

  /// Iterate the base side of every non-ghost edge pair.
  pub fn edges(&self) -> impl Iterator<Item = EdgeRef<'_>> {
    self.arena.iter(false).map(move |e| EdgeRef::new(self, e))
  }

  /// Iterate all edge pairs, ghosts included.
  pub fn edges_with_ghosts(&self) -> impl Iterator<Item = EdgeRef<'_>> {
    self.arena.iter(true).map(move |e| EdgeRef::new(self, e))
  }

  /// The convex hull as directed edges in counterclockwise order.
  pub fn perimeter(&self) -> Vec<EdgeRef<'_>> {
    let mut out = Vec::new();
    let Some(ghost) = self.arena.start_ghost_edge() else {
      return out;
    };
    // Hull-dual side of the ghost's face, then around the hull.
    let d = self.arena.forward(self.arena.forward(ghost));
    let first = d.dual();
    let mut e = first;
    loop {
      out.push(EdgeRef::new(self, e));
      e = self.next_hull_edge(e);
      if e == first {
        break;
      }
    }
    out
  }

  /// Distinct vertices referenced by the triangulation, merger groups
  /// resolved to their first-inserted member.
  pub fn vertices(&self) -> Vec<&Vertex> {
    let mut seen: HashSet<u32> = HashSet::new();
    let mut out = Vec::new();
    for e in self.arena.iter(true) {
      for slot in [self.arena.a(e), self.arena.b(e)] {
        if slot != SLOT_NONE && seen.insert(slot) {
          out.push(self.pool.canonical(slot));
        }
      }
    }
    out
  }

  /// An edge whose left triangle contains the query point, or the facing
  /// hull edge for a point outside the hull.
  pub fn neighbor_edge(&mut self, x: f64, y: f64) -> Option<EdgeRef<'_>> {
    if !self.bootstrapped {
      return None;
    }
    let e = match self.walk(x, y) {
      WalkResult::Interior(e) => e,
      WalkResult::Exterior(hull) => hull,
    };
    Some(EdgeRef::new(self, e))
  }

  /// Nearest edge of the containing triangle, with the query's signed
  /// perpendicular offset from it.
  pub fn nearest_edge(&mut self, x: f64, y: f64) -> Option<NearestEdge<'_>> {
    if !self.bootstrapped {
      return None;
    }
    let (candidates, inside) = match self.walk(x, y) {
      WalkResult::Interior(e) => {
        let f = self.arena.forward(e);
        (vec![e, f, self.arena.forward(f)], true)
      }
      WalkResult::Exterior(hull) => (vec![hull], false),
    };
    let mut best: Option<(f64, f64, EdgeIndex)> = None;
    for e in candidates {
      if self.arena.is_ghost(e) {
        continue;
      }
      let (ax, ay) = self.pool.position(self.arena.a(e));
      let (bx, by) = self.pool.position(self.arena.b(e));
      let len = ((bx - ax) * (bx - ax) + (by - ay) * (by - ay)).sqrt();
      if len == 0.0 {
        continue;
      }
      let signed = self.geo.half_plane(ax, ay, bx, by, x, y) / len;
      match best {
        Some((d, _, _)) if d <= signed.abs() => {}
        _ => best = Some((signed.abs(), signed, e)),
      }
    }
    let (_, signed, e) = best?;
    Some(NearestEdge {
      edge: EdgeRef::new(self, e),
      signed_distance: signed,
      inside_hull: inside,
    })
  }

  /// Vertex of the containing (or facing hull) triangle closest to the
  /// query point.
  pub fn nearest_vertex(&mut self, x: f64, y: f64) -> Option<&Vertex> {
    if !self.bootstrapped {
      return None;
    }
    let slots: Vec<u32> = match self.walk(x, y) {
      WalkResult::Interior(e) => {
        vec![self.arena.a(e), self.arena.b(e), self.arena.triangle_apex(e)]
      }
      WalkResult::Exterior(hull) => vec![self.arena.a(hull), self.arena.b(hull)],
    };
    let mut best: Option<(f64, u32)> = None;
    for slot in slots {
      if slot == SLOT_NONE {
        continue;
      }
      let (px, py) = self.pool.position(slot);
      let d = (px - x) * (px - x) + (py - y) * (py - y);
      match best {
        Some((bd, _)) if bd <= d => {}
        _ => best = Some((d, slot)),
      }
    }
    best.map(|(_, slot)| self.pool.canonical(slot))
  }

  /// The three edges of the triangle containing the query point, in
  /// counterclockwise order; `None` for points outside the hull.
  pub fn containing_triangle(&mut self, x: f64, y: f64) -> Option<[EdgeRef<'_>; 3]> {
    if !self.bootstrapped {
      return None;
    }
    match self.walk(x, y) {
      WalkResult::Interior(e) => {
        let f = self.arena.forward(e);
        let g = self.arena.forward(f);
        Some([
          EdgeRef::new(self, e),
          EdgeRef::new(self, f),
          EdgeRef::new(self, g),
        ])
      }
      WalkResult::Exterior(_) => None,
    }
  }

  pub fn is_point_inside_hull(&mut self, x: f64, y: f64) -> bool {
    if !self.bootstrapped {
      return false;
    }
    matches!(self.walk(x, y), WalkResult::Interior(_))
  }

  // ---------------------------------------------------------------------
  // Diagnostics
  // ---------------------------------------------------------------------

  pub fn stats(&self) -> MeshStats {
    MeshStats {
      vertex_count: self.vertex_count(),
      triangle_count: self.triangle_count(),
      edge_count: self.arena.n_allocated(),
      ghost_count: self.arena.ghost_count(),
      coincident_group_count: self.pool.group_count(),
      edges_replaced: self.edges_replaced,
      in_circle_calls: self.geo.in_circle_calls(),
      in_circle_extended: self.geo.in_circle_extended(),
      in_circle_conflicts: self.geo.in_circle_conflicts(),
      synthetic_vertex_count: self.synthetic_count,
      max_flood_fill_depth: self.max_flood_depth,
    }
  }

  /// Verify the structural and geometric invariants, without mutating any
  /// diagnostic counter.
  pub fn check_integrity(&self) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    if !self.bootstrapped {
      return report;
    }
    let thresholds = self.geo.thresholds();
    for base in self.arena.iter(true) {
      for e in [base, base.dual()] {
        let f = self.arena.forward(e);
        if self.arena.reverse(f) != e || self.arena.forward(self.arena.reverse(e)) != e {
          report.link_violations += 1;
        }
        let g = self.arena.forward(f);
        if self.arena.forward(g) != e {
          report.triangle_cycle_violations += 1;
        }
        // Check each real face once, through its lowest-numbered edge.
        if e < f && e < g {
          let (a, b, c) = (self.arena.a(e), self.arena.b(e), self.arena.triangle_apex(e));
          if a != SLOT_NONE && b != SLOT_NONE && c != SLOT_NONE {
            let (ax, ay) = self.pool.position(a);
            let (bx, by) = self.pool.position(b);
            let (cx, cy) = self.pool.position(c);
            if geometry_predicates::orient2d([ax, ay], [bx, by], [cx, cy]) <= 0.0 {
              report.orientation_violations += 1;
            }
          }
        }
      }
      // Delaunay criterion, once per pair.
      let e = base;
      let (a, b, c) = (self.arena.a(e), self.arena.b(e), self.arena.triangle_apex(e));
      let d = self.arena.triangle_apex(e.dual());
      if a != SLOT_NONE && b != SLOT_NONE && c != SLOT_NONE && d != SLOT_NONE {
        let (ax, ay) = self.pool.position(a);
        let (bx, by) = self.pool.position(b);
        let (cx, cy) = self.pool.position(c);
        let (dx, dy) = self.pool.position(d);
        let h = in_circle_static(ax, ay, bx, by, cx, cy, dx, dy, thresholds.in_circle());
        if h > thresholds.delaunay() {
          if self.arena.is_constrained(e) {
            report.delaunay_violations_on_constrained += 1;
          } else {
            report.delaunay_violations += 1;
            report.max_delaunay_violation = report.max_delaunay_violation.max(h);
          }
        }
      }
      if self.arena.is_ghost(base) {
        report.ghost_count += 1;
      }
    }
    report.perimeter_count = self.perimeter().len();
    report
  }

  // ---------------------------------------------------------------------
  // Internal helpers shared by the algorithm modules
  // ---------------------------------------------------------------------

  pub(crate) fn position(&self, slot: u32) -> (f64, f64) {
    self.pool.position(slot)
  }

  pub(crate) fn geo(&mut self) -> &mut Predicates {
    &mut self.geo
  }

  pub(crate) fn rng(&mut self) -> &mut SmallRng {
    &mut self.rng
  }

  pub(crate) fn note_replaced_edge(&mut self) {
    self.edges_replaced += 1;
  }

  pub(crate) fn note_synthetic_vertex(&mut self) {
    self.synthetic_count += 1;
  }

  pub(crate) fn note_flood_depth(&mut self, depth: usize) {
    self.max_flood_depth = self.max_flood_depth.max(depth);
  }

  pub(crate) fn note_structural_vertex(&mut self, delta: isize) {
    self.n_structural = (self.n_structural as isize + delta) as usize;
  }

  pub(crate) fn set_bootstrapped(&mut self) {
    self.bootstrapped = true;
  }

  pub(crate) fn unbootstrap(&mut self) {
    self.bootstrapped = false;
    self.arena.clear();
    self.n_structural = 0;
    self.search_edge = EdgeIndex(0);
  }

  pub(crate) fn pending_mut(&mut self) -> &mut Vec<u32> {
    &mut self.pending
  }

  pub(crate) fn search_edge(&self) -> EdgeIndex {
    self.search_edge
  }

  pub(crate) fn set_search_edge(&mut self, e: EdgeIndex) {
    self.search_edge = e;
  }

  /// Rewrite the origin slot of every edge pinwheeling around `probe`.
  pub(crate) fn rewrite_origin(&mut self, probe: EdgeIndex, new_slot: u32) {
    let mut e = probe;
    loop {
      self.arena.set_a(e, new_slot);
      e = self.arena.reverse(e).dual();
      if e == probe {
        break;
      }
    }
  }

  /// A directed edge of the walk-located triangle whose origin resolves to
  /// `slot`.
  pub(crate) fn edge_with_origin(&mut self, slot: u32) -> Result<EdgeIndex> {
    let (x, y) = self.pool.position(slot);
    let e = match self.walk(x, y) {
      WalkResult::Interior(e) => e,
      WalkResult::Exterior(hull) => hull,
    };
    for cand in [e, e.dual(), self.arena.forward(e).dual(), self.arena.forward(e.dual()).dual()] {
      if self.arena.a(cand) == slot {
        return Ok(cand);
      }
    }
    Err(Error::Internal("vertex slot not found at its own position"))
  }
}

impl std::fmt::Debug for Mesh {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("Mesh")
      .field("bootstrapped", &self.bootstrapped)
      .field("vertices", &self.vertex_count())
      .field("edge_pairs", &self.arena.n_allocated())
      .field("constraints", &self.constraints.len())
      .finish()
  }
}

/// In-circle evaluation used by the read-only integrity check; mirrors
/// `Predicates::in_circle` without touching diagnostic counters.
#[allow(clippy::too_many_arguments)]
fn in_circle_static(
  ax: f64,
  ay: f64,
  bx: f64,
  by: f64,
  cx: f64,
  cy: f64,
  dx: f64,
  dy: f64,
  band: f64,
) -> f64 {
  let adx = ax - dx;
  let ady = ay - dy;
  let bdx = bx - dx;
  let bdy = by - dy;
  let cdx = cx - dx;
  let cdy = cy - dy;
  let det = (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
    + (bdx * bdx + bdy * bdy) * (cdx * ady - adx * cdy)
    + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady);
  if det.abs() < band {
    geometry_predicates::incircle([ax, ay], [bx, by], [cx, cy], [dx, dy])
  } else {
    det
  }
}
