//! Vertices, coincident-vertex merger groups, and the vertex pool.
//!
//! Edges do not store vertices directly; they store 32-bit *slots* into the
//! pool. A slot is either a plain vertex id, a merger-group id with the high
//! bit set, or the null sentinel used by ghost edges. Replacing the source's
//! polymorphic vertex/merger-group hierarchy with this tagged encoding keeps
//! the per-edge storage at one integer and removes virtual dispatch from the
//! z lookup.

use std::fmt;

pub(crate) const SLOT_NONE: u32 = u32::MAX;
const GROUP_BIT: u32 = 1 << 31;

const SYNTHETIC_BIT: u8 = 0x01;
const CONSTRAINT_MEMBER_BIT: u8 = 0x02;

/// A sample point: immutable planar coordinates, a z value (NaN for "null
/// data"), an application-assigned index, and status flag bits.
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
  x: f64,
  y: f64,
  z: f32,
  index: i32,
  status: u8,
}

impl Vertex {
  pub fn new(x: f64, y: f64, z: f64) -> Vertex {
    Vertex {
      x,
      y,
      z: z as f32,
      index: 0,
      status: 0,
    }
  }

  /// Vertex with an application-assigned index. Indices need not be unique.
  pub fn with_index(x: f64, y: f64, z: f64, index: i32) -> Vertex {
    Vertex {
      x,
      y,
      z: z as f32,
      index,
      status: 0,
    }
  }

  pub fn x(&self) -> f64 {
    self.x
  }

  pub fn y(&self) -> f64 {
    self.y
  }

  pub fn z(&self) -> f64 {
    f64::from(self.z)
  }

  pub fn index(&self) -> i32 {
    self.index
  }

  /// True if z carries no measurement.
  pub fn is_null_data(&self) -> bool {
    self.z.is_nan()
  }

  /// True for vertices created by the mesh itself (constraint midpoints).
  pub fn is_synthetic(&self) -> bool {
    self.status & SYNTHETIC_BIT != 0
  }

  pub fn set_synthetic(&mut self, synthetic: bool) {
    if synthetic {
      self.status |= SYNTHETIC_BIT;
    } else {
      self.status &= !SYNTHETIC_BIT;
    }
  }

  /// True for vertices that belong to at least one constraint.
  pub fn is_constraint_member(&self) -> bool {
    self.status & CONSTRAINT_MEMBER_BIT != 0
  }

  pub fn set_constraint_member(&mut self, member: bool) {
    if member {
      self.status |= CONSTRAINT_MEMBER_BIT;
    } else {
      self.status &= !CONSTRAINT_MEMBER_BIT;
    }
  }

  pub fn distance_sq(&self, x: f64, y: f64) -> f64 {
    let dx = self.x - x;
    let dy = self.y - y;
    dx * dx + dy * dy
  }

  pub fn distance(&self, other: &Vertex) -> f64 {
    self.distance_sq(other.x, other.y).sqrt()
  }

  /// Value identity: same planar position and same application index.
  pub(crate) fn same_as(&self, other: &Vertex) -> bool {
    self.x == other.x && self.y == other.y && self.index == other.index
  }
}

impl fmt::Display for Vertex {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "v{} ({}, {}, {})", self.index, self.x, self.y, self.z)
  }
}

/// How a merger group resolves the z values of its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
  Min,
  Mean,
  Max,
}

/// Resolved reference stored in an edge: either a single vertex or a group
/// of coincident vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexRef {
  Single(u32),
  Group(u32),
}

impl VertexRef {
  pub(crate) fn from_slot(slot: u32) -> VertexRef {
    if slot & GROUP_BIT != 0 {
      VertexRef::Group(slot & !GROUP_BIT)
    } else {
      VertexRef::Single(slot)
    }
  }

  pub(crate) fn slot(self) -> u32 {
    match self {
      VertexRef::Single(id) => id,
      VertexRef::Group(id) => id | GROUP_BIT,
    }
  }
}

/// Coalescence of vertices whose planar separation lies below the vertex
/// tolerance. The group's planar position is the first-inserted member's.
#[derive(Debug, Clone)]
pub(crate) struct VertexGroup {
  pub members: Vec<u32>,
  pub rule: MergeRule,
}

impl VertexGroup {
  fn z(&self, verts: &[Vertex]) -> f64 {
    let zs = self
      .members
      .iter()
      .map(|&id| verts[id as usize].z())
      .filter(|z| !z.is_nan());
    match self.rule {
      MergeRule::Min => zs.fold(f64::NAN, |acc, z| if acc.is_nan() { z } else { acc.min(z) }),
      MergeRule::Max => zs.fold(f64::NAN, |acc, z| if acc.is_nan() { z } else { acc.max(z) }),
      MergeRule::Mean => {
        let mut n = 0usize;
        let mut sum = 0.0;
        for z in zs {
          n += 1;
          sum += z;
        }
        if n == 0 {
          f64::NAN
        } else {
          sum / n as f64
        }
      }
    }
  }
}

/// Append-only store of vertices plus the merger-group table.
#[derive(Debug)]
pub(crate) struct VertexPool {
  verts: Vec<Vertex>,
  groups: Vec<VertexGroup>,
  /// For a vertex that was folded into a group, the group slot it now lives
  /// under. Lets callers that cached a vertex id recover the current slot.
  redirect: Vec<u32>,
  pub default_rule: MergeRule,
}

impl VertexPool {
  pub fn new() -> VertexPool {
    VertexPool {
      verts: Vec::new(),
      groups: Vec::new(),
      redirect: Vec::new(),
      default_rule: MergeRule::Mean,
    }
  }

  pub fn clear(&mut self) {
    self.verts.clear();
    self.groups.clear();
    self.redirect.clear();
  }

  pub fn group_count(&self) -> usize {
    self.groups.iter().filter(|g| !g.members.is_empty()).count()
  }

  pub fn add(&mut self, v: Vertex) -> u32 {
    let id = self.verts.len() as u32;
    self.verts.push(v);
    self.redirect.push(id);
    id
  }

  pub fn vertex(&self, id: u32) -> &Vertex {
    &self.verts[id as usize]
  }

  /// Point a dropped-duplicate vertex id at the slot that represents it.
  pub fn redirect_to(&mut self, vid: u32, slot: u32) {
    self.redirect[vid as usize] = slot;
  }

  /// The slot a cached vertex id currently resolves to.
  pub fn resolve(&self, slot: u32) -> u32 {
    if slot == SLOT_NONE || slot & GROUP_BIT != 0 {
      slot
    } else {
      self.redirect[slot as usize]
    }
  }

  /// Planar position of a slot. For groups this is the first-inserted
  /// member's position, which the group invariantly shares.
  pub fn position(&self, slot: u32) -> (f64, f64) {
    let v = self.canonical(slot);
    (v.x, v.y)
  }

  /// Z of a slot, resolved through the group rule where applicable.
  pub fn z(&self, slot: u32) -> f64 {
    match VertexRef::from_slot(slot) {
      VertexRef::Single(id) => self.verts[id as usize].z(),
      VertexRef::Group(gid) => self.groups[gid as usize].z(&self.verts),
    }
  }

  /// Representative vertex of a slot: the vertex itself, or the
  /// first-inserted member of a group.
  pub fn canonical(&self, slot: u32) -> &Vertex {
    match VertexRef::from_slot(slot) {
      VertexRef::Single(id) => &self.verts[id as usize],
      VertexRef::Group(gid) => &self.verts[self.groups[gid as usize].members[0] as usize],
    }
  }

  /// True if the vertex value is already represented by the slot (the slot
  /// is that vertex, or a group containing an equal vertex).
  pub fn represents(&self, slot: u32, v: &Vertex) -> bool {
    match VertexRef::from_slot(slot) {
      VertexRef::Single(id) => self.verts[id as usize].same_as(v),
      VertexRef::Group(gid) => self.groups[gid as usize]
        .members
        .iter()
        .any(|&id| self.verts[id as usize].same_as(v)),
    }
  }

  /// Fold `vid` into the coincident `slot`. Returns the slot the pair now
  /// lives under: the existing group, or a freshly created one.
  pub fn merge(&mut self, slot: u32, vid: u32) -> u32 {
    match VertexRef::from_slot(slot) {
      VertexRef::Group(gid) => {
        self.groups[gid as usize].members.push(vid);
        self.redirect[vid as usize] = slot;
        slot
      }
      VertexRef::Single(first) => {
        let gid = self.groups.len() as u32;
        self.groups.push(VertexGroup {
          members: vec![first, vid],
          rule: self.default_rule,
        });
        let gslot = VertexRef::Group(gid).slot();
        self.redirect[first as usize] = gslot;
        self.redirect[vid as usize] = gslot;
        gslot
      }
    }
  }

  /// Remove one member whose value equals `v` from the group slot. Returns
  /// the surviving slot: the group itself while it still has two or more
  /// members, or the last member as a single vertex.
  pub fn unmerge(&mut self, gslot: u32, v: &Vertex) -> Option<u32> {
    let gid = match VertexRef::from_slot(gslot) {
      VertexRef::Group(gid) => gid,
      VertexRef::Single(_) => return None,
    };
    let pos = self.groups[gid as usize]
      .members
      .iter()
      .position(|&id| self.verts[id as usize].same_as(v))?;
    let group = &mut self.groups[gid as usize];
    let removed = group.members.remove(pos);
    self.redirect[removed as usize] = removed;
    if group.members.len() >= 2 {
      Some(gslot)
    } else {
      let last = group.members[0];
      group.members.clear();
      self.redirect[last as usize] = last;
      Some(last)
    }
  }

  /// Disband the slot into its member vertex ids, resetting redirects.
  pub fn dissolve(&mut self, slot: u32) -> Vec<u32> {
    match VertexRef::from_slot(slot) {
      VertexRef::Single(id) => vec![id],
      VertexRef::Group(gid) => {
        let members = std::mem::take(&mut self.groups[gid as usize].members);
        for &m in &members {
          self.redirect[m as usize] = m;
        }
        members
      }
    }
  }

  pub fn set_rule(&mut self, rule: MergeRule) {
    self.default_rule = rule;
    for g in &mut self.groups {
      g.rule = rule;
    }
  }
}
