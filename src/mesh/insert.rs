//! Bowyer–Watson insertion.
//!
//! The cavity of triangles whose circumcircle contains the new vertex is
//! excavated starting from the triangle the walk located, then
//! retriangulated by fanning spokes from the vertex to the cavity boundary.
//! Ghost triangles take part uniformly: a ghost's "circumcircle" is the
//! half-plane beyond its hull edge, so inserting an exterior vertex devours
//! the ghost triangles it is visible from and the hull grows by the fan's
//! ghost spokes.
//!
//! <https://doi.org/10.1093/comjnl/24.2.162>

use crate::arena::EdgeIndex;
use crate::mesh::walk::WalkResult;
use crate::mesh::Mesh;
use crate::vertex::{Vertex, SLOT_NONE};

/// How an insertion resolved, carrying the slot now representing the vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inserted {
  /// A new mesh vertex.
  New(u32),
  /// Coalesced into a merger group within the vertex tolerance.
  Merged(u32),
  /// The identical vertex was already present; nothing changed.
  Duplicate(u32),
}

impl Inserted {
  pub(crate) fn slot(self) -> u32 {
    match self {
      Inserted::New(s) | Inserted::Merged(s) | Inserted::Duplicate(s) => s,
    }
  }
}

impl Mesh {
  /// Insert a pooled vertex into the bootstrapped mesh.
  pub(crate) fn insert_vertex(&mut self, vid: u32) -> Inserted {
    let v: Vertex = *self.pool.vertex(vid);
    let (x, y) = (v.x(), v.y());
    let loc = self.walk(x, y);

    // Coincident-vertex check against the located triangle's corners.
    let candidates: [u32; 3] = match loc {
      WalkResult::Interior(e) => {
        [self.arena.a(e), self.arena.b(e), self.arena.triangle_apex(e)]
      }
      WalkResult::Exterior(hull) => [self.arena.a(hull), self.arena.b(hull), SLOT_NONE],
    };
    let tol_sq = self.thresholds().vertex_tolerance_sq();
    for slot in candidates {
      if slot == SLOT_NONE {
        continue;
      }
      let (px, py) = self.position(slot);
      if (px - x) * (px - x) + (py - y) * (py - y) >= tol_sq {
        continue;
      }
      if self.pool.represents(slot, &v) {
        self.pool.redirect_to(vid, slot);
        return Inserted::Duplicate(slot);
      }
      return Inserted::Merged(self.merge_coincident(loc, slot, vid));
    }

    let ring = self.excavate_cavity(loc, x, y);
    let spoke = self.fan_cavity(&ring, vid);
    self.set_search_edge(spoke);
    self.note_structural_vertex(1);
    Inserted::New(vid)
  }

  /// Coalesce `vid` into the existing `slot`. When the slot was a single
  /// vertex the fresh group slot must be written into every incident edge.
  fn merge_coincident(&mut self, loc: WalkResult, slot: u32, vid: u32) -> u32 {
    let new_slot = self.pool.merge(slot, vid);
    if new_slot != slot {
      let e = match loc {
        WalkResult::Interior(e) => e,
        WalkResult::Exterior(hull) => hull,
      };
      let probe = [e, e.dual(), self.arena.forward(e).dual()]
        .into_iter()
        .find(|&c| self.arena.a(c) == slot)
        .expect("merge target not on located triangle");
      self.rewrite_origin(probe, new_slot);
    }
    new_slot
  }

  /// Excavate the cavity around (x, y) and return its boundary ring: a
  /// closed chain of directed edges with the cavity on their left.
  fn excavate_cavity(&mut self, loc: WalkResult, x: f64, y: f64) -> Vec<EdgeIndex> {
    let mut ring: Vec<EdgeIndex> = match loc {
      WalkResult::Interior(e) => {
        let f = self.arena.forward(e);
        vec![e, f, self.arena.forward(f)]
      }
      WalkResult::Exterior(hull) => {
        // Seed with the ghost triangle beyond the facing hull edge.
        let d = hull.dual();
        let f = self.arena.forward(d);
        vec![d, f, self.arena.forward(f)]
      }
    };
    let mut i = 0;
    while i < ring.len() {
      let e = ring[i];
      if self.devours_neighbor(e, x, y) {
        let d = e.dual();
        let fd = self.arena.forward(d);
        let gd = self.arena.forward(fd);
        self.arena.deallocate(e);
        self.note_replaced_edge();
        ring[i] = fd;
        ring.insert(i + 1, gd);
      } else {
        i += 1;
      }
    }
    ring
  }

  /// In-circle test of the triangle across ring edge `e` against the new
  /// vertex, with the ghost half-plane rule for exterior faces.
  fn devours_neighbor(&mut self, e: EdgeIndex, x: f64, y: f64) -> bool {
    let d = e.dual();
    let q = self.arena.a(d);
    let p = self.arena.b(d);
    let apex = self.arena.triangle_apex(d);
    if q == SLOT_NONE || p == SLOT_NONE || apex == SLOT_NONE {
      // Ghost face: locate its hull edge (the side with two real ends).
      let (u, w) = if q != SLOT_NONE && p != SLOT_NONE {
        (q, p)
      } else if p != SLOT_NONE && apex != SLOT_NONE {
        (p, apex)
      } else if apex != SLOT_NONE && q != SLOT_NONE {
        (apex, q)
      } else {
        return false;
      };
      return self.beyond_hull_edge(u, w, x, y);
    }
    let (qx, qy) = self.position(q);
    let (px, py) = self.position(p);
    let (cx, cy) = self.position(apex);
    self.geo().in_circle(qx, qy, px, py, cx, cy, x, y) > 0.0
  }

  /// Ghost in-circle: the vertex lies "inside" a ghost triangle when it is
  /// beyond the hull edge. The edge arrives in ghost-face cycle order, so
  /// the exterior is on its left. Near-collinear cases are classified by
  /// the projection onto the segment: overlapping the span counts as
  /// behind the edge (the cavity extends), beyond either end as ahead.
  fn beyond_hull_edge(&mut self, u: u32, w: u32, x: f64, y: f64) -> bool {
    let (ax, ay) = self.position(u);
    let (bx, by) = self.position(w);
    let h = self.geo().half_plane(ax, ay, bx, by, x, y);
    if h.abs() < self.thresholds().half_plane() {
      let t = (x - ax) * (bx - ax) + (y - ay) * (by - ay);
      let len2 = (bx - ax) * (bx - ax) + (by - ay) * (by - ay);
      t > 0.0 && t < len2
    } else {
      h > 0.0
    }
  }

  /// Retriangulate the cavity by fanning spokes from the new vertex to
  /// every ring vertex. Returns a non-ghost spoke for the next walk seed.
  fn fan_cavity(&mut self, ring: &[EdgeIndex], vid: u32) -> EdgeIndex {
    let k = ring.len();
    let mut spokes = Vec::with_capacity(k);
    for &e in ring {
      let origin = self.arena.a(e);
      // A null ring origin yields a ghost spoke; allocating (vid, null)
      // keeps the null on side 1 of the pair.
      let spoke = self.arena.allocate(vid, origin);
      spokes.push(spoke);
    }
    for i in 0..k {
      let s = spokes[i];
      let s_next = spokes[(i + 1) % k];
      self.arena.set_forward(s, ring[i]);
      self.arena.set_forward(ring[i], s_next.dual());
      self.arena.set_forward(s_next.dual(), s);
    }
    spokes
      .iter()
      .copied()
      .find(|&s| !self.arena.is_ghost(s))
      .expect("cavity fan produced only ghost spokes")
  }
}
