//! Stochastic Lawson's walk.
//!
//! Starting from the cached search edge, the walk crosses one triangle per
//! step toward the query point. Each step tests the point against the two
//! far edges of the current triangle; when both tests fail (the degenerate
//! quadrilaterals that co-circular lidar returns produce), the crossing
//! edge is chosen at random to avoid cycling. Expected cost is
//! O(√n) steps from a cold start and O(1) when queries are spatially
//! coherent.
//!
//! <https://inria.hal.science/inria-00072509>

use log::warn;
use rand::Rng;

use crate::arena::EdgeIndex;
use crate::mesh::Mesh;
use crate::vertex::SLOT_NONE;

/// Outcome of a point-location walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WalkResult {
  /// The triangle to the left of this edge contains the query point.
  Interior(EdgeIndex),
  /// The point lies outside the hull; this is a hull edge (interior on its
  /// left) the point is beyond or beside.
  Exterior(EdgeIndex),
}

impl Mesh {
  /// Locate the query point. The mesh must be bootstrapped.
  pub(crate) fn walk(&mut self, x: f64, y: f64) -> WalkResult {
    let mut e = self.valid_search_edge();
    let (ax, ay) = self.position(self.arena.a(e));
    let (bx, by) = self.position(self.arena.b(e));
    if self.geo().half_plane(ax, ay, bx, by, x, y) < 0.0 {
      e = e.dual();
    }
    // The point is never to the right of e from here on.
    let step_limit = 4 * self.arena.n_allocated() + 64;
    for _ in 0..step_limit {
      if self.arena.triangle_apex(e) == SLOT_NONE {
        // Crossed out of the hull into a ghost triangle.
        let hull = self.perimeter_locate(e.dual(), x, y);
        self.set_search_edge(hull);
        return WalkResult::Exterior(hull);
      }
      let f = self.arena.forward(e);
      let r = self.arena.reverse(e);
      let (fax, fay) = self.position(self.arena.a(f));
      let (fbx, fby) = self.position(self.arena.b(f));
      let hf = self.geo().half_plane(fax, fay, fbx, fby, x, y);
      let (rax, ray) = self.position(self.arena.a(r));
      let (rbx, rby) = self.position(self.arena.b(r));
      let hr = self.geo().half_plane(rax, ray, rbx, rby, x, y);
      e = if hf < 0.0 && hr < 0.0 {
        // Both far edges separate the point: pick one at random.
        if self.rng().gen::<bool>() {
          f.dual()
        } else {
          r.dual()
        }
      } else if hf < 0.0 {
        f.dual()
      } else if hr < 0.0 {
        r.dual()
      } else {
        self.set_search_edge(e);
        return WalkResult::Interior(e);
      };
    }
    // Should be unreachable on a consistent mesh.
    warn!("lawson walk exceeded {} steps; returning current edge", step_limit);
    WalkResult::Interior(e)
  }

  /// Walk the hull counterclockwise from `entry` until an edge the point is
  /// strictly beyond is found. Any such edge is a valid cavity seed; for a
  /// point numerically on the hull the edge of smallest offset wins.
  fn perimeter_locate(&mut self, entry: EdgeIndex, x: f64, y: f64) -> EdgeIndex {
    let mut e = entry;
    let mut best: Option<(f64, EdgeIndex)> = None;
    loop {
      let (ax, ay) = self.position(self.arena.a(e));
      let (bx, by) = self.position(self.arena.b(e));
      let h = self.geo().half_plane(ax, ay, bx, by, x, y);
      if h < 0.0 {
        return e;
      }
      // Keep the hull edge whose span contains the point's projection as a
      // fallback for on-hull queries.
      let t = (x - ax) * (bx - ax) + (y - ay) * (by - ay);
      let len2 = (bx - ax) * (bx - ax) + (by - ay) * (by - ay);
      if t >= 0.0 && t <= len2 {
        match best {
          Some((bh, _)) if bh <= h => {}
          _ => best = Some((h, e)),
        }
      }
      e = self.next_hull_edge(e);
      if e == entry {
        break;
      }
    }
    best.map(|(_, e)| e).unwrap_or(entry)
  }

  /// Next hull edge counterclockwise around the perimeter. `e` must be a
  /// hull edge: a real pair whose dual side faces a ghost triangle.
  pub(crate) fn next_hull_edge(&self, e: EdgeIndex) -> EdgeIndex {
    let d = e.dual();
    // Ghost face cycle: (b→a), (a→null), (null→b).
    let g2 = self.arena.forward(self.arena.forward(d));
    self.arena.reverse(g2.dual()).dual()
  }

  /// The cached search edge if it is still usable, else any live edge.
  fn valid_search_edge(&mut self) -> EdgeIndex {
    let e = self.search_edge();
    if self.arena.is_allocated(e) && !self.arena.is_ghost(e) {
      return e;
    }
    let fresh = self
      .arena
      .start_edge()
      .expect("walk on a mesh with no interior edges");
    self.set_search_edge(fresh);
    fresh
  }
}
