//! Numeric tolerances derived from the nominal point spacing.
//!
//! All thresholds are expressed as powers of the nominal spacing `s` so that
//! uniformly scaling the input coordinates (metres to feet, UTM to local
//! grids) scales every tolerance by the same factor and leaves the mesh
//! structurally unchanged. The magnitude exponents follow from the precision
//! of IEEE doubles at UTM-scale coordinates: a product of two coordinate
//! differences carries roughly `s²·1e-11` of representational noise, a
//! four-way in-circle determinant roughly `s⁴·1e-12`.

/// Tolerances for a mesh built over points with a given nominal spacing.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
  nominal_point_spacing: f64,
  vertex_tolerance: f64,
  vertex_tolerance_sq: f64,
  half_plane: f64,
  in_circle: f64,
  delaunay: f64,
  min_bootstrap_area: f64,
}

impl Thresholds {
  /// Derive all tolerances from a positive nominal point spacing.
  ///
  /// # Panics
  ///
  /// Panics if `nominal_point_spacing` is not a finite positive number.
  pub fn new(nominal_point_spacing: f64) -> Thresholds {
    assert!(
      nominal_point_spacing.is_finite() && nominal_point_spacing > 0.0,
      "nominal point spacing must be finite and positive, got {}",
      nominal_point_spacing
    );
    let s = nominal_point_spacing;
    let s2 = s * s;
    let s4 = s2 * s2;
    Thresholds {
      nominal_point_spacing: s,
      // Vertices closer than s/100_000 coalesce into a merger group.
      vertex_tolerance: s * 1e-5,
      vertex_tolerance_sq: (s * 1e-5) * (s * 1e-5),
      // Band where the fast orientation determinant is not sign-reliable.
      half_plane: s2 * 1e-11,
      // Band where the fast in-circle determinant is not sign-reliable.
      in_circle: s4 * 1e-12,
      // Magnitude below which a pair of triangles counts as Delaunay.
      delaunay: s4 * 1e-10,
      // 1/64 of the area of an equilateral triangle with side s.
      min_bootstrap_area: s2 * 3f64.sqrt() / 256.0,
    }
  }

  pub fn nominal_point_spacing(&self) -> f64 {
    self.nominal_point_spacing
  }

  /// Planar distance below which two vertices are treated as coincident.
  pub fn vertex_tolerance(&self) -> f64 {
    self.vertex_tolerance
  }

  pub fn vertex_tolerance_sq(&self) -> f64 {
    self.vertex_tolerance_sq
  }

  /// Magnitude below which an orientation result triggers the
  /// extended-precision recomputation.
  pub fn half_plane(&self) -> f64 {
    self.half_plane
  }

  /// Magnitude below which an in-circle result triggers the
  /// extended-precision recomputation.
  pub fn in_circle(&self) -> f64 {
    self.in_circle
  }

  /// In-circle magnitude up to which a triangle pair is acceptably Delaunay.
  pub fn delaunay(&self) -> f64 {
    self.delaunay
  }

  /// Smallest |signed area| acceptable for the bootstrap triangle.
  pub fn min_bootstrap_area(&self) -> f64 {
    self.min_bootstrap_area
  }
}
