//! Hilbert-curve pre-sort for bulk loading.
//!
//! Inserting a large unordered point set makes every Lawson walk start far
//! from its target. Sorting the batch along a Hilbert curve first makes
//! consecutive insertions spatial neighbors, which keeps the walk near O(1)
//! per vertex and dominates bulk-load throughput for lidar-sized inputs.

use crate::rect::Rect;
use crate::vertex::Vertex;

/// Grid resolution per axis: 2^16 cells.
const ORDER: u32 = 16;

pub(crate) fn sort(vertices: &mut [Vertex]) {
  let Some(first) = vertices.first() else {
    return;
  };
  let mut bounds = Rect::of_point(first.x(), first.y());
  for v in vertices.iter().skip(1) {
    bounds.add_point(v.x(), v.y());
  }
  let w = bounds.width();
  let h = bounds.height();
  if w == 0.0 && h == 0.0 {
    return;
  }
  let scale = f64::from((1u32 << ORDER) - 1) / w.max(h);
  vertices.sort_by_key(|v| {
    let gx = ((v.x() - bounds.x_min()) * scale) as u32;
    let gy = ((v.y() - bounds.y_min()) * scale) as u32;
    hilbert_index(gx, gy)
  });
}

/// Distance along the order-16 Hilbert curve of a grid cell; both
/// coordinates must be below 2^16.
fn hilbert_index(mut x: u32, mut y: u32) -> u64 {
  let n: u32 = 1 << ORDER;
  let mut d: u64 = 0;
  let mut s: u32 = n / 2;
  while s > 0 {
    let rx = u32::from(x & s > 0);
    let ry = u32::from(y & s > 0);
    d += u64::from(s) * u64::from(s) * u64::from((3 * rx) ^ ry);
    // Rotate the quadrant so the sub-curve keeps its orientation.
    if ry == 0 {
      if rx == 1 {
        x = n - 1 - x;
        y = n - 1 - y;
      }
      std::mem::swap(&mut x, &mut y);
    }
    s /= 2;
  }
  d
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn curve_visits_distinct_cells_distinctly() {
    let mut seen = std::collections::HashSet::new();
    for x in 0..8u32 {
      for y in 0..8u32 {
        assert!(seen.insert(hilbert_index(x << 13, y << 13)));
      }
    }
  }

  #[test]
  fn neighbors_on_curve_are_spatial_neighbors() {
    // Walk the 8x8 grid in curve order; consecutive cells must be adjacent.
    let mut cells: Vec<(u64, (i64, i64))> = Vec::new();
    for x in 0..8i64 {
      for y in 0..8i64 {
        cells.push((hilbert_index((x as u32) << 13, (y as u32) << 13), (x, y)));
      }
    }
    cells.sort();
    for pair in cells.windows(2) {
      let (x0, y0) = pair[0].1;
      let (x1, y1) = pair[1].1;
      assert_eq!((x1 - x0).abs() + (y1 - y0).abs(), 1);
    }
  }

  #[test]
  fn sort_is_a_permutation() {
    let mut vs: Vec<Vertex> = (0..100)
      .map(|i| Vertex::with_index((i * 37 % 100) as f64, (i * 61 % 100) as f64, 0.0, i))
      .collect();
    let mut indices: Vec<i32> = vs.iter().map(|v| v.index()).collect();
    sort(&mut vs);
    let mut sorted_indices: Vec<i32> = vs.iter().map(|v| v.index()).collect();
    indices.sort();
    sorted_indices.sort();
    assert_eq!(indices, sorted_indices);
  }
}
