mod mesh {
  use claims::{assert_none, assert_some};
  use rand::rngs::SmallRng;
  use rand::{Rng, SeedableRng};
  use terratin::{Error, Mesh, Vertex};

  fn build(points: &[(f64, f64)]) -> Mesh {
    let mut mesh = Mesh::new(1.0);
    for (i, &(x, y)) in points.iter().enumerate() {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    mesh
  }

  fn random_points(n: usize, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n).map(|_| (rng.gen::<f64>(), rng.gen::<f64>())).collect()
  }

  /// Sum of the signed areas of all real triangles.
  fn total_area(mesh: &Mesh) -> f64 {
    let mut sum = 0.0;
    for base in mesh.edges() {
      for e in [base, base.dual()] {
        if e.is_exterior() {
          continue;
        }
        let f = e.forward();
        let g = f.forward();
        if e.index() < f.index() && e.index() < g.index() {
          let a = e.a().unwrap();
          let b = e.b().unwrap();
          let c = e.triangle_apex().unwrap();
          sum += ((b.x() - a.x()) * (c.y() - a.y()) - (b.y() - a.y()) * (c.x() - a.x())) / 2.0;
        }
      }
    }
    sum
  }

  fn hull_area(mesh: &Mesh) -> f64 {
    let mut sum = 0.0;
    for e in mesh.perimeter() {
      let a = e.a().unwrap();
      let b = e.b().unwrap();
      sum += a.x() * b.y() - b.x() * a.y();
    }
    sum / 2.0
  }

  #[test]
  fn collinear_points_do_not_bootstrap() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
    assert!(!mesh.is_bootstrapped());
    assert_eq!(mesh.triangle_count(), 0);
    assert_none!(mesh.neighbor_edge(0.5, 0.5));
    assert_none!(mesh.nearest_vertex(0.5, 0.5));
    assert!(!mesh.is_point_inside_hull(0.5, 0.5));
  }

  #[test]
  fn single_triangle() {
    let mesh = build(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
    assert!(mesh.is_bootstrapped());
    let stats = mesh.stats();
    assert_eq!(stats.triangle_count, 1);
    assert_eq!(stats.edge_count, 6);
    assert_eq!(stats.ghost_count, 3);
    let perimeter = mesh.perimeter();
    assert_eq!(perimeter.len(), 3);
    let length: f64 = perimeter.iter().map(|e| e.length().unwrap()).sum();
    assert!((length - (2.0 + 2f64.sqrt())).abs() < 1e-12);
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn unit_square_has_two_triangles_and_a_diagonal() {
    let mesh = build(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    let stats = mesh.stats();
    assert_eq!(stats.triangle_count, 2);
    assert_eq!(stats.edge_count - stats.ghost_count, 5);
    assert_eq!(stats.ghost_count, 4);
    assert!((total_area(&mesh) - 1.0).abs() < 1e-12);
    // One of the two flip-ambiguous diagonals must be present.
    let diagonal = mesh.edges().any(|e| {
      let a = e.a().unwrap();
      let b = e.b().unwrap();
      (a.distance(b) - 2f64.sqrt()).abs() < 1e-12
    });
    assert!(diagonal);
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn hundred_random_points_satisfy_euler() {
    let mut mesh = Mesh::new(1.0);
    let points: Vec<Vertex> = random_points(100, 0)
      .into_iter()
      .enumerate()
      .map(|(i, (x, y))| Vertex::with_index(x, y, 0.0, i as i32))
      .collect();
    assert!(mesh.add_all(points, None).unwrap());
    let stats = mesh.stats();
    let n = stats.vertex_count;
    let h = mesh.perimeter().len();
    assert_eq!(stats.triangle_count, 2 * n - 2 - h);
    assert!((total_area(&mesh) - hull_area(&mesh)).abs() < 1e-9);
    let report = mesh.check_integrity();
    assert!(report.is_consistent(), "integrity: {:?}", report);
    assert_eq!(report.ghost_count, report.perimeter_count);
    // Exact-vs-fast sign conflicts must stay a vanishing fraction.
    assert!(stats.in_circle_conflicts * 100 < stats.in_circle_calls + 100);
  }

  #[test]
  fn insertion_order_does_not_change_the_mesh() {
    let points = random_points(60, 7);
    let mesh_a = build(&points);
    let mut shuffled = points.clone();
    shuffled.reverse();
    shuffled.swap(3, 11);
    let mesh_b = build(&shuffled);
    assert_eq!(mesh_a.triangle_count(), mesh_b.triangle_count());
    assert!((total_area(&mesh_a) - total_area(&mesh_b)).abs() < 1e-9);
  }

  #[test]
  fn removal_matches_direct_construction() {
    let points = random_points(50, 0);
    let mut mesh = build(&points);
    let victim = points[25];
    assert!(mesh.remove(&Vertex::with_index(victim.0, victim.1, 0.0, 25)).unwrap());
    assert!(mesh.check_integrity().is_consistent());

    let mut direct = Mesh::new(1.0);
    for (i, &(x, y)) in points.iter().enumerate() {
      if i != 25 {
        direct.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
      }
    }
    assert_eq!(mesh.triangle_count(), direct.triangle_count());
    assert_eq!(mesh.stats().edge_count, direct.stats().edge_count);
    assert!((total_area(&mesh) - total_area(&direct)).abs() < 1e-9);
  }

  #[test]
  fn duplicate_insert_is_rejected() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
    let before = mesh.stats();
    assert!(!mesh.add(Vertex::with_index(1.0, 1.0, 0.0, 3)).unwrap());
    let after = mesh.stats();
    assert_eq!(before.vertex_count, after.vertex_count);
    assert_eq!(before.edge_count, after.edge_count);
    assert_eq!(after.coincident_group_count, 0);
  }

  #[test]
  fn coincident_insert_merges() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
    let before = mesh.stats();
    // Within the vertex tolerance of (1, 1) but a distinct vertex.
    assert!(mesh.add(Vertex::with_index(1.0 + 1e-7, 1.0, 5.0, 99)).unwrap());
    let after = mesh.stats();
    assert_eq!(after.vertex_count, before.vertex_count);
    assert_eq!(after.edge_count, before.edge_count);
    assert_eq!(after.coincident_group_count, 1);
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn merged_vertex_resolves_z_by_rule() {
    use terratin::MergeRule;
    let mut mesh = Mesh::new(1.0);
    mesh.add(Vertex::new(0.0, 0.0, 0.0)).unwrap();
    mesh.add(Vertex::new(1.0, 0.0, 0.0)).unwrap();
    mesh.add(Vertex::new(0.0, 1.0, 0.0)).unwrap();
    mesh.add(Vertex::with_index(1.0, 1.0, 2.0, 1)).unwrap();
    mesh.add(Vertex::with_index(1.0 + 1e-7, 1.0, 6.0, 2)).unwrap();
    mesh.set_merge_rule(MergeRule::Max);
    let corner = mesh
      .edges()
      .flat_map(|e| [e, e.dual()])
      .find(|e| e.a().map(|a| (a.x(), a.y())) == Some((1.0, 1.0)))
      .and_then(|e| e.a_z());
    assert_eq!(corner, Some(6.0));
  }

  #[test]
  fn removing_every_vertex_empties_the_arena() {
    let points = random_points(10, 3);
    let mut mesh = build(&points);
    assert!(mesh.is_bootstrapped());
    for (i, &(x, y)) in points.iter().enumerate() {
      assert!(mesh.remove(&Vertex::with_index(x, y, 0.0, i as i32)).unwrap(), "vertex {}", i);
    }
    assert!(!mesh.is_bootstrapped());
    assert_eq!(mesh.stats().edge_count, 0);
    // The arena must still serve fresh allocations.
    let more = random_points(10, 4);
    for (i, &(x, y)) in more.iter().enumerate() {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    assert!(mesh.is_bootstrapped());
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn every_vertex_keeps_an_edge() {
    let points = random_points(40, 11);
    let mesh = build(&points);
    let vertices = mesh.vertices();
    assert_eq!(vertices.len(), mesh.stats().vertex_count);
    for &(x, y) in &points {
      assert!(
        vertices.iter().any(|v| v.x() == x && v.y() == y),
        "vertex ({}, {}) lost",
        x,
        y
      );
    }
  }

  #[test]
  fn point_location_queries() {
    let mut mesh = build(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (2.0, 2.0)]);
    assert!(mesh.is_point_inside_hull(1.0, 1.0));
    assert!(!mesh.is_point_inside_hull(5.0, 5.0));

    let tri = assert_some!(mesh.containing_triangle(2.0, 1.0));
    for e in tri {
      assert!(!e.is_exterior());
    }
    assert_none!(mesh.containing_triangle(-1.0, -1.0));

    let nearest = assert_some!(mesh.nearest_vertex(1.9, 2.2));
    assert_eq!((nearest.x(), nearest.y()), (2.0, 2.0));

    let ne = assert_some!(mesh.nearest_edge(2.0, 0.1));
    assert!(ne.inside_hull);
    assert!(ne.signed_distance.abs() <= 2.0);

    let outside = assert_some!(mesh.nearest_edge(2.0, -1.0));
    assert!(!outside.inside_hull);
  }

  #[test]
  fn pinwheel_visits_the_full_fan() {
    let mesh = build(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (2.0, 2.0)]);
    let start = mesh
      .edges()
      .flat_map(|e| [e, e.dual()])
      .find(|e| e.a().map(|v| (v.x(), v.y())) == Some((2.0, 2.0)))
      .unwrap();
    // The interior vertex connects to all four corners and nothing else.
    assert_eq!(start.pinwheel().count(), 4);
    for spoke in start.pinwheel() {
      let a = spoke.a().unwrap();
      assert_eq!((a.x(), a.y()), (2.0, 2.0));
      assert!(spoke.b().is_some());
    }
  }

  #[test]
  fn perimeter_is_counterclockwise() {
    let points = random_points(30, 5);
    let mesh = build(&points);
    assert!(hull_area(&mesh) > 0.0);
    let perimeter = mesh.perimeter();
    // Consecutive hull edges chain head to tail.
    for pair in perimeter.windows(2) {
      let b0 = pair[0].b().unwrap();
      let a1 = pair[1].a().unwrap();
      assert_eq!((b0.x(), b0.y()), (a1.x(), a1.y()));
    }
  }

  #[test]
  fn bounds_track_all_added_vertices() {
    let mesh = build(&[(0.0, 0.0), (3.0, 0.0), (0.0, 2.0)]);
    let bounds = mesh.bounds().unwrap();
    assert_eq!(bounds.x_max(), 3.0);
    assert_eq!(bounds.y_max(), 2.0);
  }

  #[test]
  fn clear_resets_for_reuse() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
    mesh.clear();
    assert!(!mesh.is_bootstrapped());
    assert_eq!(mesh.stats().edge_count, 0);
    assert_none!(mesh.bounds());
    mesh.add(Vertex::new(0.0, 0.0, 0.0)).unwrap();
    mesh.add(Vertex::new(2.0, 0.0, 0.0)).unwrap();
    mesh.add(Vertex::new(0.0, 2.0, 0.0)).unwrap();
    assert!(mesh.is_bootstrapped());
  }

  #[test]
  fn disposed_mesh_rejects_operations() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
    mesh.dispose();
    assert!(matches!(mesh.add(Vertex::new(2.0, 2.0, 0.0)), Err(Error::Disposed)));
    assert!(matches!(mesh.remove(&Vertex::new(0.0, 0.0, 0.0)), Err(Error::Disposed)));
  }

  #[test]
  fn removal_of_hull_vertex_rebuilds_the_hull() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    assert!(mesh.remove(&Vertex::with_index(1.0, 1.0, 0.0, 2)).unwrap());
    let stats = mesh.stats();
    assert_eq!(stats.triangle_count, 1);
    assert_eq!(stats.ghost_count, 3);
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn exterior_insertion_extends_the_hull() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (0.5, 1.0)]);
    // Far outside the current hull.
    mesh.add(Vertex::with_index(3.0, 0.5, 0.0, 3)).unwrap();
    assert_eq!(mesh.stats().vertex_count, 4);
    assert!(mesh.is_point_inside_hull(1.5, 0.4));
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn collinear_exterior_insertion() {
    let mut mesh = build(&[(0.0, 0.0), (1.0, 0.0), (0.5, 1.0)]);
    // Collinear with the bottom hull edge, beyond its end.
    mesh.add(Vertex::with_index(2.0, 0.0, 0.0, 3)).unwrap();
    assert_eq!(mesh.stats().vertex_count, 4);
    assert!(mesh.check_integrity().is_consistent());
    // And one exactly on a hull edge's span.
    mesh.add(Vertex::with_index(1.5, 0.0, 0.0, 4)).unwrap();
    assert_eq!(mesh.stats().vertex_count, 5);
    assert!(mesh.check_integrity().is_consistent());
  }

  use proptest::prelude::*;

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn arbitrary_point_sets_stay_consistent(
      raw in proptest::collection::vec((0u32..60, 0u32..60), 3..40)
    ) {
      let mut mesh = Mesh::new(1.0);
      for (i, &(x, y)) in raw.iter().enumerate() {
        mesh
          .add(Vertex::with_index(f64::from(x) / 4.0, f64::from(y) / 4.0, 0.0, i as i32))
          .unwrap();
      }
      prop_assume!(mesh.is_bootstrapped());
      let report = mesh.check_integrity();
      prop_assert!(report.is_consistent(), "integrity: {:?}", report);
      let stats = mesh.stats();
      let h = mesh.perimeter().len();
      prop_assert_eq!(stats.triangle_count, 2 * stats.vertex_count - 2 - h);
    }

    #[test]
    fn insert_remove_round_trip(
      raw in proptest::collection::vec((0u32..50, 0u32..50), 5..25),
      victim in 3usize..20
    ) {
      let mut mesh = Mesh::new(1.0);
      for (i, &(x, y)) in raw.iter().enumerate() {
        mesh
          .add(Vertex::with_index(f64::from(x), f64::from(y), 0.0, i as i32))
          .unwrap();
      }
      prop_assume!(mesh.is_bootstrapped());
      prop_assume!(victim < raw.len());
      // Only remove a vertex that is a distinct position.
      let (vx, vy) = raw[victim];
      prop_assume!(raw.iter().enumerate().all(|(i, &p)| i == victim || p != (vx, vy)));
      let removed = mesh
        .remove(&Vertex::with_index(f64::from(vx), f64::from(vy), 0.0, victim as i32))
        .unwrap();
      prop_assert!(removed);
      let report = mesh.check_integrity();
      prop_assert!(report.is_consistent(), "integrity after removal: {:?}", report);
    }
  }
}
