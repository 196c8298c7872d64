//! Devillers vertex removal.
//!
//! Deleting a vertex leaves the star polygon of its neighbors, which is
//! retriangulated ear by ear. Each ear of three consecutive boundary
//! vertices is scored with Devillers' power criterion
//! `in_circle(v0, v1, v2, removed) / orientation(v0, v1, v2)` and the
//! lowest-scoring ear closes first; degenerate ears score +∞. For a hull
//! vertex the polygon contains the null vertex, and among tied infinite
//! ears the one starting at null closes first so that every new ghost edge
//! keeps its null on side 1.
//!
//! <https://doi.org/10.1142/S0218195902000815>

use ordered_float::OrderedFloat;

use crate::arena::EdgeIndex;
use crate::mesh::walk::WalkResult;
use crate::mesh::Mesh;
use crate::vertex::{Vertex, VertexRef, SLOT_NONE};
use crate::{Error, Result};

struct Ear {
  /// Boundary edge v0 → v1.
  left: EdgeIndex,
  /// Boundary edge v1 → v2.
  right: EdgeIndex,
  score: f64,
}

impl Mesh {
  pub(crate) fn remove_vertex(&mut self, v: &Vertex) -> Result<bool> {
    if !self.is_bootstrapped() {
      // The vertex may still be sitting in the bootstrap buffer.
      let found = {
        let pool = &self.pool;
        self
          .pending
          .iter()
          .position(|&vid| pool.vertex(vid).same_as(v))
      };
      return Ok(match found {
        Some(i) => {
          self.pending.remove(i);
          true
        }
        None => false,
      });
    }

    let (x, y) = (v.x(), v.y());
    let loc = self.walk(x, y);
    let candidates: [u32; 3] = match loc {
      WalkResult::Interior(e) => {
        [self.arena.a(e), self.arena.b(e), self.arena.triangle_apex(e)]
      }
      WalkResult::Exterior(hull) => [self.arena.a(hull), self.arena.b(hull), SLOT_NONE],
    };
    let tol_sq = self.thresholds().vertex_tolerance_sq();
    let slot = candidates.into_iter().find(|&slot| {
      slot != SLOT_NONE && {
        let (px, py) = self.position(slot);
        (px - x) * (px - x) + (py - y) * (py - y) < tol_sq && self.pool.represents(slot, v)
      }
    });
    let Some(slot) = slot else {
      return Ok(false);
    };

    if let VertexRef::Group(_) = VertexRef::from_slot(slot) {
      return self.remove_group_member(loc, slot, v);
    }

    if self.vertex_count() == 3 {
      return self.remove_from_seed_triangle(slot);
    }

    let probe = self.edge_with_origin(slot)?;
    self.devillers_remove(slot, probe)?;
    self.note_structural_vertex(-1);

    // Removing the only vertex off a line leaves nothing but ghost faces;
    // such a mesh dissolves back into the bootstrap buffer.
    let has_real_face = self.arena.iter(false).any(|e| {
      self.arena.triangle_apex(e) != SLOT_NONE
        || self.arena.triangle_apex(e.dual()) != SLOT_NONE
    });
    if !has_real_face {
      let mut survivors: Vec<u32> = Vec::new();
      for e in self.arena.iter(false) {
        for s in [self.arena.a(e), self.arena.b(e)] {
          if !survivors.contains(&s) {
            survivors.push(s);
          }
        }
      }
      self.unbootstrap();
      for s in survivors {
        let members = self.pool.dissolve(s);
        self.pending.extend(members);
      }
    }
    Ok(true)
  }

  /// Removing one member of a merger group never changes the topology;
  /// when only one member remains the group collapses back to it.
  fn remove_group_member(&mut self, loc: WalkResult, slot: u32, v: &Vertex) -> Result<bool> {
    let Some(new_slot) = self.pool.unmerge(slot, v) else {
      return Ok(false);
    };
    if new_slot != slot {
      let e = match loc {
        WalkResult::Interior(e) => e,
        WalkResult::Exterior(hull) => hull,
      };
      let probe = [e, e.dual(), self.arena.forward(e).dual()]
        .into_iter()
        .find(|&c| self.arena.a(c) == slot)
        .ok_or(Error::Internal("group slot not on located triangle"))?;
      self.rewrite_origin(probe, new_slot);
    }
    Ok(true)
  }

  /// Removing one of the last three vertices dissolves the triangulation;
  /// the survivors go back to the bootstrap buffer.
  fn remove_from_seed_triangle(&mut self, slot: u32) -> Result<bool> {
    let mut survivors: Vec<u32> = Vec::new();
    for e in self.arena.iter(false) {
      for s in [self.arena.a(e), self.arena.b(e)] {
        if s != slot && !survivors.contains(&s) {
          survivors.push(s);
        }
      }
    }
    self.unbootstrap();
    for s in survivors {
      // Merger groups disband; their members rejoin the buffer one by one
      // and will re-coalesce on the next bootstrap.
      let members = self.pool.dissolve(s);
      self.pending.extend(members);
    }
    Ok(true)
  }

  fn devillers_remove(&mut self, slot: u32, probe: EdgeIndex) -> Result<()> {
    let (rx, ry) = self.position(slot);

    // Cavitation: collect the counterclockwise star and delete the spokes,
    // leaving the boundary polygon with dangling links.
    let mut spokes = Vec::new();
    let mut e = probe;
    loop {
      spokes.push(e);
      e = self.arena.reverse(e).dual();
      if e == probe {
        break;
      }
    }
    let boundary: Vec<EdgeIndex> = spokes.iter().map(|&s| self.arena.forward(s)).collect();
    for &s in &spokes {
      self.arena.deallocate(s);
      self.note_replaced_edge();
    }

    let k = boundary.len();
    if k == 3 {
      // The cavity is already a triangle.
      self.arena.set_forward(boundary[0], boundary[1]);
      self.arena.set_forward(boundary[1], boundary[2]);
      self.arena.set_forward(boundary[2], boundary[0]);
      self.reseat_search_edge(&boundary);
      return Ok(());
    }

    // Ear ring over the boundary vertices, linked like the boundary itself.
    let mut ears: Vec<Ear> = (0..k)
      .map(|i| Ear {
        left: boundary[(i + k - 1) % k],
        right: boundary[i],
        score: 0.0,
      })
      .collect();
    for i in 0..k {
      let (left, right) = (ears[i].left, ears[i].right);
      ears[i].score = self.ear_score(left, right, rx, ry);
    }
    let mut prev: Vec<usize> = (0..k).map(|i| (i + k - 1) % k).collect();
    let mut next: Vec<usize> = (0..k).map(|i| (i + 1) % k).collect();
    let mut alive: Vec<bool> = vec![true; k];
    let mut remaining = k;
    let mut cursor = 0;

    while remaining > 3 {
      let i = self.pick_ear(&ears, &alive, cursor)?;
      let el = ears[i].left;
      let er = ears[i].right;
      let v0 = self.arena.a(el);
      let v2 = self.arena.b(er);
      // Close the ear with a new edge v2 → v0, null kept on side 1.
      let n = if v0 == SLOT_NONE {
        self.arena.allocate(v2, SLOT_NONE)
      } else if v2 == SLOT_NONE {
        self.arena.allocate(v0, SLOT_NONE).dual()
      } else {
        self.arena.allocate(v2, v0)
      };
      self.arena.set_forward(el, er);
      self.arena.set_forward(er, n);
      self.arena.set_forward(n, el);

      let p = prev[i];
      let nx = next[i];
      ears[p].right = n.dual();
      ears[nx].left = n.dual();
      alive[i] = false;
      next[p] = nx;
      prev[nx] = p;
      remaining -= 1;
      cursor = nx;
      let (left, right) = (ears[p].left, ears[p].right);
      ears[p].score = self.ear_score(left, right, rx, ry);
      let (left, right) = (ears[nx].left, ears[nx].right);
      ears[nx].score = self.ear_score(left, right, rx, ry);
    }

    // The last three ears share one triangle.
    let i = (0..ears.len())
      .find(|&i| alive[i])
      .ok_or(Error::Internal("ear ring exhausted"))?;
    let j = next[i];
    let l = next[j];
    self.arena.set_forward(ears[i].right, ears[j].right);
    self.arena.set_forward(ears[j].right, ears[l].right);
    self.arena.set_forward(ears[l].right, ears[i].right);
    self.reseat_search_edge(&[ears[i].right, ears[j].right, ears[l].right]);
    Ok(())
  }

  /// Lowest-scoring live ear, preferring null-headed ears among infinite
  /// ties so the closing edge ends at the null vertex.
  fn pick_ear(&mut self, ears: &[Ear], alive: &[bool], cursor: usize) -> Result<usize> {
    let mut best: Option<(OrderedFloat<f64>, bool, usize)> = None;
    let mut i = cursor;
    loop {
      if alive[i] {
        let v0_real = self.arena.a(ears[i].left) != SLOT_NONE;
        let key = (OrderedFloat(ears[i].score), v0_real, i);
        match best {
          Some((s, r, _)) if (s, r) <= (key.0, key.1) => {}
          _ => best = Some(key),
        }
      }
      i = (i + 1) % ears.len();
      if i == cursor {
        break;
      }
    }
    best.map(|(_, _, i)| i).ok_or(Error::Internal("no live ear"))
  }

  /// Devillers' power score; +∞ for ears touching the null vertex or with
  /// non-positive orientation.
  fn ear_score(&mut self, left: EdgeIndex, right: EdgeIndex, rx: f64, ry: f64) -> f64 {
    let v0 = self.arena.a(left);
    let v1 = self.arena.b(left);
    let v2 = self.arena.b(right);
    if v0 == SLOT_NONE || v1 == SLOT_NONE || v2 == SLOT_NONE {
      return f64::INFINITY;
    }
    let (ax, ay) = self.position(v0);
    let (bx, by) = self.position(v1);
    let (cx, cy) = self.position(v2);
    let o = self.geo().orientation(ax, ay, bx, by, cx, cy);
    if o <= 0.0 {
      return f64::INFINITY;
    }
    self.geo().in_circle(ax, ay, bx, by, cx, cy, rx, ry) / o
  }

  fn reseat_search_edge(&mut self, candidates: &[EdgeIndex]) {
    let e = candidates
      .iter()
      .copied()
      .find(|&e| !self.arena.is_ghost(e))
      .or_else(|| self.arena.start_edge());
    if let Some(e) = e {
      self.set_search_edge(e);
    }
  }
}
