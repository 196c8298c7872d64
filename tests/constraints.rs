mod constraints {
  use claims::assert_ok;
  use terratin::{Constraint, Error, Mesh, Vertex};

  fn square_constraint(size: f64) -> Constraint {
    let mut c = Constraint::polygon();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(size, 0.0, 0.0));
    c.add_vertex(Vertex::new(size, size, 0.0));
    c.add_vertex(Vertex::new(0.0, size, 0.0));
    c
  }

  fn on_square_boundary(x: f64, y: f64, size: f64) -> bool {
    ((x == 0.0 || x == size) && (0.0..=size).contains(&y))
      || ((y == 0.0 || y == size) && (0.0..=size).contains(&x))
  }

  #[test]
  fn region_constraint_floods_the_interior() {
    let mut mesh = Mesh::new(1.0);
    let interior = [
      (2.3, 1.9),
      (5.1, 2.2),
      (7.8, 2.4),
      (2.1, 5.3),
      (5.2, 4.9),
      (7.9, 5.1),
      (2.4, 7.7),
      (4.8, 7.9),
      (7.6, 8.2),
    ];
    for (i, &(x, y)) in interior.iter().enumerate() {
      mesh.add(Vertex::with_index(x, y, 1.0, i as i32)).unwrap();
    }
    assert_ok!(mesh.add_constraints(vec![square_constraint(10.0)], true));

    let stats = mesh.stats();
    assert!(stats.max_flood_fill_depth > 0);
    let mut interior_edges = 0;
    let mut border_edges = 0;
    for e in mesh.edges() {
      if e.is_constrained_region_border() {
        border_edges += 1;
        assert!(e.is_constrained(), "border edge must be constrained: {:?}", e);
        let a = e.a().unwrap();
        let b = e.b().unwrap();
        assert!(on_square_boundary(a.x(), a.y(), 10.0), "border endpoint off boundary");
        assert!(on_square_boundary(b.x(), b.y(), 10.0), "border endpoint off boundary");
        let constraint = e.border_constraint().expect("border edge lost its constraint");
        assert!(constraint.is_polygon());
      } else {
        interior_edges += 1;
        assert!(
          e.is_constrained_region_interior(),
          "interior edge missed by flood fill: {:?}",
          e
        );
        let region = e.region_constraint().expect("interior edge without region");
        assert!(region.defines_region());
      }
    }
    assert!(border_edges >= 4);
    assert!(interior_edges > 0);
    let report = mesh.check_integrity();
    assert!(report.is_consistent(), "integrity: {:?}", report);
  }

  #[test]
  fn flood_fill_stops_at_the_border() {
    let mut mesh = Mesh::new(1.0);
    // Vertices well outside the constrained square keep the hull larger
    // than the region.
    for (i, &(x, y)) in [(-5.0, -5.0), (15.0, -5.0), (15.0, 15.0), (-5.0, 15.0), (5.0, 5.0)]
      .iter()
      .enumerate()
    {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    assert_ok!(mesh.add_constraints(vec![square_constraint(10.0)], false));
    for e in mesh.edges() {
      if e.is_constrained_region_interior() {
        let a = e.a().unwrap();
        let b = e.b().unwrap();
        let (mx, my) = ((a.x() + b.x()) / 2.0, (a.y() + b.y()) / 2.0);
        assert!(
          (0.0..=10.0).contains(&mx) && (0.0..=10.0).contains(&my),
          "flood fill escaped the region at ({}, {})",
          mx,
          my
        );
      }
    }
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn linear_constraint_marks_line_members() {
    let mut mesh = Mesh::new(1.0);
    for (i, &(x, y)) in [(0.0, 0.0), (10.0, 0.0), (5.0, 4.0), (5.0, -4.0), (2.0, 1.0), (8.0, -1.0)]
      .iter()
      .enumerate()
    {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    let mut c = Constraint::linear();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(10.0, 0.0, 0.0));
    assert_ok!(mesh.add_constraints(vec![c], false));

    let constrained: Vec<_> = mesh
      .edges()
      .filter(|e| e.is_constrained())
      .collect();
    assert!(!constrained.is_empty());
    for e in &constrained {
      assert!(e.is_constraint_line_member());
      assert!(!e.is_constrained_region_border());
      assert!(e.line_constraint().is_some());
      // Every covering edge lies on the constrained line y = 0.
      assert_eq!(e.a().unwrap().y(), 0.0);
      assert_eq!(e.b().unwrap().y(), 0.0);
    }
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn constraint_through_collinear_vertex_subdivides() {
    let mut mesh = Mesh::new(1.0);
    for (i, &(x, y)) in [(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]
      .iter()
      .enumerate()
    {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    let mut c = Constraint::linear();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(10.0, 0.0, 0.0));
    assert_ok!(mesh.add_constraints(vec![c], false));
    // The segment passes through (5, 0); both sub-edges carry the flag.
    let covering = mesh
      .edges()
      .filter(|e| e.is_constrained())
      .count();
    assert_eq!(covering, 2);
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn conformance_restoration_inserts_synthetic_midpoints() {
    let mut mesh = Mesh::new(1.0);
    // The Delaunay diagonal of this quad runs vertically; constraining the
    // horizontal diagonal forces a non-Delaunay edge.
    for (i, &(x, y)) in [(0.0, 0.0), (10.0, 0.0), (5.0, 1.0), (5.0, -1.0)].iter().enumerate() {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    let mut c = Constraint::linear();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(10.0, 0.0, 0.0));
    assert_ok!(mesh.add_constraints(vec![c], true));

    let stats = mesh.stats();
    assert!(stats.synthetic_vertex_count >= 1, "expected midpoint subdivision");
    let report = mesh.check_integrity();
    assert!(report.is_consistent(), "integrity: {:?}", report);
    assert_eq!(report.delaunay_violations_on_constrained, 0);
    // Synthetic vertices are flagged as such.
    let synthetic = mesh
      .vertices()
      .into_iter()
      .filter(|v| v.is_synthetic())
      .count();
    assert_eq!(synthetic, stats.synthetic_vertex_count);
  }

  #[test]
  fn constrained_edge_without_conformity_keeps_violation() {
    let mut mesh = Mesh::new(1.0);
    for (i, &(x, y)) in [(0.0, 0.0), (10.0, 0.0), (5.0, 1.0), (5.0, -1.0)].iter().enumerate() {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    let mut c = Constraint::linear();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(10.0, 0.0, 0.0));
    assert_ok!(mesh.add_constraints(vec![c], false));
    let report = mesh.check_integrity();
    // The forced edge violates Delaunay, but only across the constraint.
    assert_eq!(report.delaunay_violations, 0);
    assert!(report.delaunay_violations_on_constrained > 0);
    assert_eq!(mesh.stats().synthetic_vertex_count, 0);
  }

  #[test]
  fn split_edge_preserves_constraint_flags() {
    let mut mesh = Mesh::new(1.0);
    for (i, &(x, y)) in [(0.0, 0.0), (10.0, 0.0), (5.0, 4.0), (5.0, -4.0)].iter().enumerate() {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    let mut c = Constraint::linear();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(10.0, 0.0, 0.0));
    assert_ok!(mesh.add_constraints(vec![c], false));

    let target = mesh
      .edges()
      .find(|e| e.is_constrained())
      .map(|e| e.index())
      .unwrap();
    let mid = mesh.split_edge(target, Some(7.5)).unwrap();
    assert!(mid.is_synthetic());
    assert_eq!(mid.z(), 7.5);
    assert_eq!((mid.x(), mid.y()), (5.0, 0.0));

    let halves: Vec<_> = mesh.edges().filter(|e| e.is_constrained()).collect();
    assert_eq!(halves.len(), 2);
    for e in &halves {
      assert!(e.is_constraint_line_member());
      assert!(e.line_constraint().is_some());
    }
    assert!(halves.iter().any(|e| e.is_synthetic()));
    assert!(mesh.check_integrity().is_consistent());
  }

  #[test]
  fn constraints_lock_the_mesh() {
    let mut mesh = Mesh::new(1.0);
    for (i, &(x, y)) in [(0.0, 0.0), (10.0, 0.0), (5.0, 5.0)].iter().enumerate() {
      mesh.add(Vertex::with_index(x, y, 0.0, i as i32)).unwrap();
    }
    let mut c = Constraint::linear();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(10.0, 0.0, 0.0));
    assert_ok!(mesh.add_constraints(vec![c], false));

    assert!(matches!(mesh.add(Vertex::new(1.0, 1.0, 0.0)), Err(Error::Locked)));
    assert!(matches!(
      mesh.remove(&Vertex::new(0.0, 0.0, 0.0)),
      Err(Error::Locked)
    ));
    let mut c2 = Constraint::linear();
    c2.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c2.add_vertex(Vertex::new(5.0, 5.0, 0.0));
    assert!(matches!(
      mesh.add_constraints(vec![c2], false),
      Err(Error::ConstraintsAlreadyAdded)
    ));
  }

  #[test]
  fn incomplete_polygon_is_rejected() {
    let mut mesh = Mesh::new(1.0);
    let mut c = Constraint::polygon();
    c.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    c.add_vertex(Vertex::new(1.0, 0.0, 0.0));
    assert!(matches!(
      mesh.add_constraints(vec![c], false),
      Err(Error::InvalidConstraint(_))
    ));
  }

  #[test]
  fn constraint_vertices_can_bootstrap_the_mesh() {
    let mut mesh = Mesh::new(1.0);
    assert_ok!(mesh.add_constraints(vec![square_constraint(10.0)], false));
    assert!(mesh.is_bootstrapped());
    assert_eq!(mesh.stats().vertex_count, 4);
    assert_eq!(mesh.triangle_count(), 2);
    assert!(mesh.check_integrity().is_consistent());
  }
}
