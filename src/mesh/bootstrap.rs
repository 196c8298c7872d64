//! Bootstrap: selecting the seed triangle.
//!
//! Vertices are buffered until three of them span a triangle of acceptable
//! area. A handful of random triples is tried first; only if none is good
//! enough does an exhaustive search run. The acceptance threshold is 1/64
//! of the area of an equilateral triangle at nominal spacing: small enough
//! to start from mediocre geometry, large enough to keep the first few
//! in-circle determinants out of the noise band.

use log::{debug, warn};
use rand::Rng;

use crate::mesh::Mesh;
use crate::vertex::SLOT_NONE;

/// Exhaustive search is cubic; beyond this many buffered vertices it runs
/// over a prefix only. A data set that degenerate is pathological anyway.
const EXHAUSTIVE_LIMIT: usize = 512;

impl Mesh {
  /// Try to seed the mesh from the buffered vertices. On success the
  /// remaining buffered vertices are inserted and the buffer drains.
  pub(crate) fn try_bootstrap(&mut self) -> bool {
    let n = self.pending_mut().len();
    if n < 3 {
      return false;
    }
    let Some([ia, ib, ic]) = self.select_seed_triple() else {
      return false;
    };
    self.build_seed_mesh(ia, ib, ic);
    self.set_bootstrapped();
    self.note_structural_vertex(3);
    debug!("bootstrapped from {} buffered vertices", n);

    let mut rest: Vec<u32> = std::mem::take(self.pending_mut());
    rest.retain(|&vid| vid != ia && vid != ib && vid != ic);
    for vid in rest {
      self.insert_vertex(vid);
    }
    true
  }

  /// Pick three buffered vertices spanning an acceptable CCW triangle.
  fn select_seed_triple(&mut self) -> Option<[u32; 3]> {
    let n = self.pending_mut().len();
    let min_area = self.thresholds().min_bootstrap_area();
    let trials = ((n as f64).cbrt().ceil() as usize).clamp(1, 16);

    let mut best: Option<(f64, [usize; 3])> = None;
    for _ in 0..trials {
      let t = self.random_triple(n);
      let area = self.triple_area(t);
      match best {
        Some((a, _)) if a >= area.abs() => {}
        _ => best = Some((area.abs(), t)),
      }
    }

    if best.map_or(true, |(a, _)| a < min_area) {
      // Random sampling failed; sweep triples exhaustively.
      let m = n.min(EXHAUSTIVE_LIMIT);
      if m < n {
        warn!("bootstrap falling back to exhaustive search over {} of {} vertices", m, n);
      }
      for i in 0..m {
        for j in (i + 1)..m {
          for k in (j + 1)..m {
            let area = self.triple_area([i, j, k]).abs();
            match best {
              Some((a, _)) if a >= area => {}
              _ => best = Some((area, [i, j, k])),
            }
          }
        }
      }
    }

    let (area, t) = best?;
    if area < min_area {
      return None;
    }
    // Orient counterclockwise.
    let t = if self.triple_area(t) < 0.0 { [t[2], t[1], t[0]] } else { t };
    let pending = self.pending_mut();
    Some([pending[t[0]], pending[t[1]], pending[t[2]]])
  }

  fn random_triple(&mut self, n: usize) -> [usize; 3] {
    let rng = self.rng();
    let i = rng.gen_range(0..n);
    let mut j = rng.gen_range(0..n - 1);
    if j >= i {
      j += 1;
    }
    let mut k = rng.gen_range(0..n - 2);
    for bound in [i.min(j), i.max(j)] {
      if k >= bound {
        k += 1;
      }
    }
    [i, j, k]
  }

  fn triple_area(&mut self, [i, j, k]: [usize; 3]) -> f64 {
    let pending = self.pending_mut();
    let (a, b, c) = (pending[i], pending[j], pending[k]);
    let (ax, ay) = self.position(a);
    let (bx, by) = self.position(b);
    let (cx, cy) = self.position(c);
    self.geo().area(ax, ay, bx, by, cx, cy)
  }

  /// Three interior edges forming a CCW triangle plus one ghost pair per
  /// vertex, fanning to the null vertex so that the exterior is covered by
  /// three ghost triangles.
  fn build_seed_mesh(&mut self, a: u32, b: u32, c: u32) {
    let ab = self.arena.allocate(a, b);
    let bc = self.arena.allocate(b, c);
    let ca = self.arena.allocate(c, a);
    let ga = self.arena.allocate(a, SLOT_NONE);
    let gb = self.arena.allocate(b, SLOT_NONE);
    let gc = self.arena.allocate(c, SLOT_NONE);

    // Interior face.
    self.arena.set_forward(ab, bc);
    self.arena.set_forward(bc, ca);
    self.arena.set_forward(ca, ab);
    // Ghost triangle beyond a→b: (b→a), (a→null), (null→b).
    self.arena.set_forward(ab.dual(), ga);
    self.arena.set_forward(ga, gb.dual());
    self.arena.set_forward(gb.dual(), ab.dual());
    // Beyond b→c.
    self.arena.set_forward(bc.dual(), gb);
    self.arena.set_forward(gb, gc.dual());
    self.arena.set_forward(gc.dual(), bc.dual());
    // Beyond c→a.
    self.arena.set_forward(ca.dual(), gc);
    self.arena.set_forward(gc, ga.dual());
    self.arena.set_forward(ga.dual(), ca.dual());

    self.set_search_edge(ab);
  }
}
