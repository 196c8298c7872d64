//! Constraint embedding and Delaunay conformance restoration.
//!
//! Each constraint segment is forced into the mesh by excavating the
//! corridor of triangles it crosses, laying the constraint edge through the
//! cleared channel, and retriangulating the two cavity polygons with an ear
//! fill followed by local Delaunay flips (constrained edges never flip).
//! Optionally, constrained edges that still violate the Delaunay criterion
//! are subdivided at their midpoints with synthetic vertices until the mesh
//! is conformant. Region constraints finish with an iterative flood fill
//! that stamps every interior edge with the region's index.
//!
//! <https://people.eecs.berkeley.edu/~jrs/papers/inccdtj.pdf>

use std::collections::VecDeque;

use log::{debug, warn};
use ordered_float::OrderedFloat;

use crate::arena::EdgeIndex;
use crate::constraint::{check_index, Constraint};
use crate::mesh::Mesh;
use crate::rect::Rect;
use crate::vertex::{Vertex, SLOT_NONE};
use crate::{Error, Result};

impl Mesh {
  pub(crate) fn insert_constraints(
    &mut self,
    mut constraints: Vec<Constraint>,
    restore_conformity: bool,
  ) -> Result<()> {
    for c in &mut constraints {
      if !c.is_completed() {
        c.complete()?;
      }
    }
    if !constraints.is_empty() {
      check_index(constraints.len() - 1)?;
    }

    // Constraint vertices enter the mesh as ordinary vertices first; their
    // effective slots are remembered so merges are honored while embedding.
    let mut slot_lists: Vec<Vec<u32>> = Vec::with_capacity(constraints.len());
    for c in &constraints {
      let mut slots = Vec::with_capacity(c.vertices().len());
      for v in c.vertices() {
        let mut v: Vertex = *v;
        v.set_constraint_member(true);
        match self.bounds.as_mut() {
          Some(r) => r.add_point(v.x(), v.y()),
          None => self.bounds = Some(Rect::of_point(v.x(), v.y())),
        }
        let vid = self.pool.add(v);
        let slot = if self.bootstrapped {
          self.insert_vertex(vid).slot()
        } else {
          self.pending.push(vid);
          self.try_bootstrap();
          vid
        };
        slots.push(slot);
      }
      slot_lists.push(slots);
    }
    if !self.bootstrapped {
      return Err(Error::InvalidConstraint(
        "constraint vertices do not span a bootstrappable mesh",
      ));
    }
    self.constraints_added = true;

    for (cid, (c, slots)) in constraints.iter().zip(&slot_lists).enumerate() {
      debug!("embedding constraint {} ({} vertices)", cid, slots.len());
      for (i, j) in c.segments() {
        self.embed_segment(cid, c.defines_region(), slots[i], slots[j])?;
      }
    }
    if restore_conformity {
      self.restore_conformity();
    }
    self.flood_fill_regions();
    self.constraints = constraints;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Segment embedding
  // ---------------------------------------------------------------------

  /// Force the segment between two vertex slots into the mesh, marking the
  /// covering edges constrained. Vertices lying on the segment within the
  /// vertex tolerance become intermediate constraint vertices.
  fn embed_segment(&mut self, cid: usize, region: bool, s0: u32, s1: u32) -> Result<()> {
    let mut s0 = self.pool.resolve(s0);
    let s1 = self.pool.resolve(s1);
    'segment: while s0 != s1 {
      let (x0, y0) = self.position(s0);
      let (x1, y1) = self.position(s1);
      let probe = self.edge_with_origin(s0)?;

      // Collect the pinwheel once; the scans below mutate nothing.
      let mut spokes: Vec<(EdgeIndex, u32)> = Vec::new();
      let mut e = probe;
      loop {
        spokes.push((e, self.arena.b(e)));
        e = self.arena.reverse(e).dual();
        if e == probe {
          break;
        }
      }

      // An existing edge may already cover the segment, or run to a vertex
      // sitting on it.
      for &(spoke, t) in &spokes {
        if t == s1 {
          self.mark_constrained_edge(spoke, cid, region);
          self.set_search_edge(spoke);
          continue 'segment;
        }
      }
      let mut through: Option<(f64, EdgeIndex, u32)> = None;
      for &(spoke, t) in &spokes {
        if t == SLOT_NONE {
          continue;
        }
        let (tx, ty) = self.position(t);
        if let Some(along) = self.on_segment(x0, y0, x1, y1, tx, ty) {
          match through {
            Some((d, _, _)) if d <= along => {}
            _ => through = Some((along, spoke, t)),
          }
        }
      }
      if let Some((_, spoke, t)) = through {
        self.mark_constrained_edge(spoke, cid, region);
        self.set_search_edge(spoke);
        s0 = self.pool.resolve(t);
        continue 'segment;
      }

      // Find the pinwheel triangle straddling the ray toward s1.
      let mut straddle = None;
      for i in 0..spokes.len() {
        let (er, r) = spokes[i];
        let (_, l) = spokes[(i + 1) % spokes.len()];
        if r == SLOT_NONE || l == SLOT_NONE {
          continue;
        }
        let (rx, ry) = self.position(r);
        let (lx, ly) = self.position(l);
        let hr = self.geo().half_plane(x0, y0, x1, y1, rx, ry);
        let hl = self.geo().half_plane(x0, y0, x1, y1, lx, ly);
        if hr < 0.0 && hl > 0.0 {
          // In front, not behind: the far endpoint is beyond the r-l edge.
          if self.geo().half_plane(rx, ry, lx, ly, x1, y1) < 0.0 {
            straddle = Some(er);
            break;
          }
        }
      }
      let er = straddle.ok_or(Error::Internal("no triangle straddles constraint segment"))?;

      // Peel the corridor of crossed triangles, collecting the surviving
      // boundary chains on either side of the segment.
      let t = self.arena.forward(er);
      let mut right_edges = vec![er];
      let mut left_edges = vec![self.arena.forward(t)];
      let mut crossed = t;
      let reached;
      loop {
        let d = crossed.dual();
        let fd = self.arena.forward(d);
        let gd = self.arena.forward(fd);
        let w = self.arena.b(fd);
        self.arena.deallocate(crossed);
        self.note_replaced_edge();
        if w == SLOT_NONE {
          return Err(Error::Internal("constraint corridor escaped the hull"));
        }
        let (wx, wy) = self.position(w);
        if w == s1 || self.on_segment(x0, y0, x1, y1, wx, wy).is_some() {
          right_edges.push(fd);
          left_edges.push(gd);
          reached = w;
          break;
        }
        if self.geo().half_plane(x0, y0, x1, y1, wx, wy) > 0.0 {
          left_edges.push(gd);
          crossed = fd;
        } else {
          right_edges.push(fd);
          crossed = gd;
        }
      }

      // Lay the constraint edge through the corridor and refill both sides.
      let ce = self.arena.allocate(s0, reached);
      self.mark_constrained_edge(ce, cid, region);
      let mut left_poly = vec![ce];
      left_poly.extend(left_edges.iter().rev());
      let mut right_poly = vec![ce.dual()];
      right_poly.extend(right_edges.iter());
      self.fill_cavity(&left_poly)?;
      self.fill_cavity(&right_poly)?;
      self.set_search_edge(ce);
      s0 = self.pool.resolve(reached);
    }
    Ok(())
  }

  /// Distance along the segment if (px, py) lies on it within the vertex
  /// tolerance, strictly between the endpoints.
  fn on_segment(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, px: f64, py: f64) -> Option<f64> {
    let len2 = (x1 - x0) * (x1 - x0) + (y1 - y0) * (y1 - y0);
    if len2 == 0.0 {
      return None;
    }
    let cross = (x1 - x0) * (py - y0) - (y1 - y0) * (px - x0);
    let tol_sq = self.thresholds().vertex_tolerance_sq();
    if cross * cross / len2 >= tol_sq {
      return None;
    }
    let along = (px - x0) * (x1 - x0) + (py - y0) * (y1 - y0);
    if along > 0.0 && along < len2 {
      Some(along)
    } else {
      None
    }
  }

  fn mark_constrained_edge(&mut self, e: EdgeIndex, cid: usize, region: bool) {
    self.arena.set_constrained(e, cid);
    if region {
      self.arena.set_region_border_flag(e);
      // Directed so the region interior lies on the left.
      self.arena.set_border_constraint(e, cid);
    } else {
      self.arena.set_line_member_flag(e);
      self.arena.set_line_constraint(e, cid);
    }
  }

  // ---------------------------------------------------------------------
  // Cavity fill
  // ---------------------------------------------------------------------

  /// Retriangulate a simple polygon cavity given as a closed CCW chain of
  /// directed edges (cavity on each edge's left). Ears are closed smallest
  /// positive area first, skipping ears that contain another boundary
  /// vertex; the new interior edges then get flipped to Delaunay.
  fn fill_cavity(&mut self, poly: &[EdgeIndex]) -> Result<()> {
    let k = poly.len();
    if k < 3 {
      return Err(Error::Internal("cavity polygon with fewer than 3 edges"));
    }
    if k == 3 {
      self.arena.set_forward(poly[0], poly[1]);
      self.arena.set_forward(poly[1], poly[2]);
      self.arena.set_forward(poly[2], poly[0]);
      return Ok(());
    }

    let mut left: Vec<EdgeIndex> = (0..k).map(|i| poly[(i + k - 1) % k]).collect();
    let mut right: Vec<EdgeIndex> = poly.to_vec();
    let mut prev: Vec<usize> = (0..k).map(|i| (i + k - 1) % k).collect();
    let mut next: Vec<usize> = (0..k).map(|i| (i + 1) % k).collect();
    let mut alive: Vec<bool> = vec![true; k];
    let mut remaining = k;
    let mut new_edges: Vec<EdgeIndex> = Vec::new();

    while remaining > 3 {
      let mut candidates: Vec<(OrderedFloat<f64>, usize)> = Vec::new();
      for i in 0..k {
        if !alive[i] {
          continue;
        }
        let (v0, v1, v2) = (self.arena.a(left[i]), self.arena.a(right[i]), self.arena.b(right[i]));
        let (ax, ay) = self.position(v0);
        let (bx, by) = self.position(v1);
        let (cx, cy) = self.position(v2);
        let area = self.geo().area(ax, ay, bx, by, cx, cy);
        if area > 0.0 {
          candidates.push((OrderedFloat(area), i));
        }
      }
      candidates.sort();
      let mut chosen = None;
      'candidate: for &(_, i) in &candidates {
        let (v0, v2) = (self.arena.a(left[i]), self.arena.b(right[i]));
        let v1 = self.arena.a(right[i]);
        let (ax, ay) = self.position(v0);
        let (bx, by) = self.position(v1);
        let (cx, cy) = self.position(v2);
        let mut j = next[next[i]];
        while j != prev[i] {
          let w = self.arena.a(right[j]);
          let (wx, wy) = self.position(w);
          let inside = self.geo().half_plane(ax, ay, bx, by, wx, wy) >= 0.0
            && self.geo().half_plane(bx, by, cx, cy, wx, wy) >= 0.0
            && self.geo().half_plane(cx, cy, ax, ay, wx, wy) >= 0.0;
          if inside {
            continue 'candidate;
          }
          j = next[j];
        }
        chosen = Some(i);
        break;
      }
      let i = chosen.ok_or(Error::Internal("cavity fill found no closable ear"))?;

      let el = left[i];
      let er = right[i];
      let v0 = self.arena.a(el);
      let v2 = self.arena.b(er);
      let n = self.arena.allocate(v2, v0);
      self.arena.set_forward(el, er);
      self.arena.set_forward(er, n);
      self.arena.set_forward(n, el);
      new_edges.push(n);

      let p = prev[i];
      let nx = next[i];
      right[p] = n.dual();
      left[nx] = n.dual();
      alive[i] = false;
      next[p] = nx;
      prev[nx] = p;
      remaining -= 1;
    }

    let i = (0..k).find(|&i| alive[i]).ok_or(Error::Internal("cavity ring exhausted"))?;
    let j = next[i];
    let l = next[j];
    self.arena.set_forward(right[i], right[j]);
    self.arena.set_forward(right[j], right[l]);
    self.arena.set_forward(right[l], right[i]);

    // Restore the Delaunay criterion on the fresh diagonals; constrained
    // edges are never flipped.
    let passes = new_edges.len() * new_edges.len();
    for _ in 0..passes {
      let mut changed = false;
      for &e in &new_edges {
        changed |= self.flip_if_not_delaunay(e);
      }
      if !changed {
        break;
      }
    }
    Ok(())
  }

  /// Lawson flip of a non-constrained interior edge whose two triangles
  /// fail the in-circle criterion. Returns true if the edge was flipped.
  fn flip_if_not_delaunay(&mut self, e: EdgeIndex) -> bool {
    if self.arena.is_constrained(e) {
      return false;
    }
    let a = self.arena.a(e);
    let b = self.arena.b(e);
    let c = self.arena.triangle_apex(e);
    let d = self.arena.triangle_apex(e.dual());
    if a == SLOT_NONE || b == SLOT_NONE || c == SLOT_NONE || d == SLOT_NONE {
      return false;
    }
    let (ax, ay) = self.position(a);
    let (bx, by) = self.position(b);
    let (cx, cy) = self.position(c);
    let (dx, dy) = self.position(d);
    let h = self.geo().in_circle(ax, ay, bx, by, cx, cy, dx, dy);
    if h <= self.thresholds().delaunay() {
      return false;
    }
    // The quadrilateral must be convex for the flipped diagonal to exist.
    if self.geo().orientation(cx, cy, dx, dy, bx, by) <= 0.0
      || self.geo().orientation(dx, dy, cx, cy, ax, ay) <= 0.0
    {
      return false;
    }
    self.flip(e, c, d);
    true
  }

  /// Rotate edge (a → b) into (c → d) within its quadrilateral.
  fn flip(&mut self, e: EdgeIndex, c: u32, d: u32) {
    let f = self.arena.forward(e);
    let r = self.arena.reverse(e);
    let fd = self.arena.forward(e.dual());
    let rd = self.arena.reverse(e.dual());
    self.arena.set_vertices(e, c, d);
    self.arena.set_forward(e, rd);
    self.arena.set_forward(rd, f);
    self.arena.set_forward(f, e);
    self.arena.set_forward(e.dual(), r);
    self.arena.set_forward(r, fd);
    self.arena.set_forward(fd, e.dual());
  }

  // ---------------------------------------------------------------------
  // Conformance restoration
  // ---------------------------------------------------------------------

  /// Subdivide constrained edges (and flip unconstrained ones) until every
  /// edge satisfies the Delaunay criterion within the threshold. Runs on an
  /// explicit work stack; adversarial inputs would overflow the call stack
  /// long before they exhaust this loop's limit.
  fn restore_conformity(&mut self) {
    let mut stack: Vec<EdgeIndex> = self
      .arena
      .iter(false)
      .filter(|&e| self.arena.is_constrained(e))
      .collect();
    let limit = 4096 * (stack.len() + 1);
    let mut ops = 0usize;
    while let Some(e) = stack.pop() {
      if !self.arena.is_allocated(e) || self.arena.is_ghost(e) {
        continue;
      }
      let a = self.arena.a(e);
      let b = self.arena.b(e);
      let c = self.arena.triangle_apex(e);
      let d = self.arena.triangle_apex(e.dual());
      if c == SLOT_NONE || d == SLOT_NONE {
        continue;
      }
      let (ax, ay) = self.position(a);
      let (bx, by) = self.position(b);
      let (cx, cy) = self.position(c);
      let (dx, dy) = self.position(d);
      let h = self.geo().in_circle(ax, ay, bx, by, cx, cy, dx, dy);
      if h <= self.thresholds().delaunay() {
        continue;
      }
      ops += 1;
      if ops > limit {
        warn!("conformance restoration stopped after {} subdivisions", limit);
        return;
      }
      let f = self.arena.forward(e);
      let r = self.arena.reverse(e);
      let fd = self.arena.forward(e.dual());
      let rd = self.arena.reverse(e.dual());
      if self.arena.is_constrained(e) {
        let m = self.midpoint_vertex(a, b, None);
        let p = self.subdivide_pair(e, m);
        stack.extend([f, r, fd, rd, p, e]);
      } else if self.flip_if_not_delaunay(e) {
        stack.extend([f, r, fd, rd]);
      }
    }
  }

  /// Synthetic constraint vertex at the midpoint of two slots, z linearly
  /// interpolated (NaN if either side carries no data) unless overridden.
  fn midpoint_vertex(&mut self, a: u32, b: u32, z_override: Option<f64>) -> u32 {
    let (ax, ay) = self.position(a);
    let (bx, by) = self.position(b);
    let za = self.pool.z(a);
    let zb = self.pool.z(b);
    let z = z_override.unwrap_or((za + zb) / 2.0);
    let mut v = Vertex::new((ax + bx) / 2.0, (ay + by) / 2.0, z);
    v.set_synthetic(true);
    v.set_constraint_member(true);
    let vid = self.pool.add(v);
    self.note_synthetic_vertex();
    self.note_structural_vertex(1);
    vid
  }

  /// Split the pair of e = (a → b) at vertex slot m into (a → m) + (m → b)
  /// and reconnect both flanking faces by edges from m to their apices.
  /// Handles ghost faces, so hull edges can be split too. Returns the new
  /// (a → m) pair.
  fn subdivide_pair(&mut self, e: EdgeIndex, m: u32) -> EdgeIndex {
    let f = self.arena.forward(e);
    let r = self.arena.reverse(e);
    let fd = self.arena.forward(e.dual());
    let rd = self.arena.reverse(e.dual());
    let c = self.arena.triangle_apex(e);
    let d = self.arena.triangle_apex(e.dual());

    let p = self.arena.split_edge(e, m);
    // Left face (a, b, c) becomes (a, m, c) + (m, b, c).
    let mc = self.arena.allocate(m, c);
    self.arena.set_forward(p, mc);
    self.arena.set_forward(mc, r);
    self.arena.set_forward(r, p);
    self.arena.set_forward(e, f);
    self.arena.set_forward(f, mc.dual());
    self.arena.set_forward(mc.dual(), e);
    // Right face (b, a, d) becomes (b, m, d) + (m, a, d).
    let md = self.arena.allocate(m, d);
    self.arena.set_forward(e.dual(), md);
    self.arena.set_forward(md, rd);
    self.arena.set_forward(rd, e.dual());
    self.arena.set_forward(p.dual(), fd);
    self.arena.set_forward(fd, md.dual());
    self.arena.set_forward(md.dual(), p.dual());
    p
  }

  /// Public edge subdivision: midpoint synthetic vertex with optional
  /// explicit z. The split edge keeps its constraint flags on both halves.
  pub(crate) fn split_edge_at_midpoint(
    &mut self,
    e: EdgeIndex,
    z_mid: Option<f64>,
  ) -> Result<Vertex> {
    if !self.arena.is_allocated(e) {
      return Err(Error::Internal("split of an unallocated edge"));
    }
    let a = self.arena.a(e);
    let b = self.arena.b(e);
    if a == SLOT_NONE || b == SLOT_NONE {
      return Err(Error::Internal("split of a ghost edge"));
    }
    let m = self.midpoint_vertex(a, b, z_mid);
    self.subdivide_pair(e, m);
    Ok(*self.pool.vertex(m))
  }

  // ---------------------------------------------------------------------
  // Region flood fill
  // ---------------------------------------------------------------------

  /// Mark every edge inside each region constraint with REGION_INTERIOR and
  /// the region's index. Breadth-first over face adjacency from the border
  /// edges' interior sides; iterative because polygons may span millions of
  /// triangles.
  fn flood_fill_regions(&mut self) {
    let seeds = self.arena.border_seeds();
    if seeds.is_empty() {
      return;
    }
    let mut queue: VecDeque<EdgeIndex> = VecDeque::new();
    for (seed, cid) in seeds {
      if !self.arena.is_allocated(seed) {
        continue;
      }
      queue.push_back(seed);
      while let Some(e) = queue.pop_front() {
        for g in [self.arena.forward(e), self.arena.reverse(e)] {
          if self.arena.is_ghost(g)
            || self.arena.is_region_border(g)
            || self.arena.is_region_interior(g)
          {
            continue;
          }
          self.arena.set_region_interior(g, cid);
          queue.push_back(g.dual());
        }
        self.note_flood_depth(queue.len());
      }
    }
    debug!("region flood fill complete, max queue depth {}", self.max_flood_depth);
  }
}
