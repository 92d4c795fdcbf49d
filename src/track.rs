// ==============================================================================
// track.rs — TRACK NODE ARENA + BOUNDARY QUERIES
// ------------------------------------------------------------------------------
// A track is an ordered chain of centreline nodes. Each node carries a heading
// (degrees around world up; 0 faces -Z), a slope value, a surface up vector and
// a cross-section segment (left boundary -> right boundary). Nodes link to
// their neighbours by index; a closed track wraps last -> first.
//
// Queries used by the vehicle every tick:
// - is_left_of_line: which side of a cross-section the car is on (XZ plane);
//   "left" means the car has not crossed that node's line yet
// - closest point on a cross-section (parry segment projection)
// - ground sample: height / up interpolated between the current and next
//   cross-sections
// ==============================================================================

use anyhow::{Context, Result, anyhow, bail, ensure};
use rapier3d::parry::query::PointQuery;
use rapier3d::parry::shape::Segment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dynamics::types::{Pos3, Vec3, WORLD_UP, forward_from_orientation, lerp, p3, safe_normalize, v3};

const MIN_SEGMENT_LEN: f32 = 1e-3;
const MIN_NODE_SPACING: f32 = 1e-3;
const MIN_SAMPLE_DIST: f32 = 1e-6;

// ============================================
// Nodes
// ============================================
#[derive(Debug, Clone, PartialEq)]
pub struct TrackNode {
    pub number: usize,
    pub position: Pos3,
    pub orientation: f32, // degrees
    pub slope: f32,
    pub up: Vec3,
    pub left_boundary: Pos3,
    pub right_boundary: Pos3,
    pub next: Option<usize>,
    pub prev: Option<usize>,
}

impl TrackNode {
    pub fn forward(&self) -> Vec3 {
        forward_from_orientation(self.orientation)
    }

    pub fn boundary(&self) -> Segment {
        Segment::new(self.left_boundary, self.right_boundary)
    }

    pub fn road_width(&self) -> f32 {
        (self.right_boundary - self.left_boundary).norm()
    }

    /// Nearest point of the cross-section to `p`.
    pub fn closest_point(&self, p: &Pos3) -> Pos3 {
        self.boundary().project_local_point(p, true).point
    }

    /// True while `p` is still behind this node's cross-section.
    pub fn is_behind(&self, p: &Pos3) -> bool {
        is_left_of_line(&self.left_boundary, &self.right_boundary, p)
    }

    /// Position of `p` across the road in the XZ plane: 0 at the left
    /// boundary, 1 at the right one, outside [0, 1] beyond the verge.
    pub fn lateral(&self, p: &Pos3) -> f32 {
        let ab = self.right_boundary - self.left_boundary;
        let ap = p - self.left_boundary;
        let len2 = ab.x * ab.x + ab.z * ab.z;
        if len2 <= MIN_SEGMENT_LEN * MIN_SEGMENT_LEN {
            return 0.5;
        }
        (ap.x * ab.x + ap.z * ab.z) / len2
    }
}

/// 2D (XZ) side test of `p` against the line a -> b.
pub fn is_left_of_line(a: &Pos3, b: &Pos3, p: &Pos3) -> bool {
    let ab = b - a;
    let ap = p - a;
    ab.x * ap.z - ab.z * ap.x > 0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStep {
    Stay,
    Advanced(usize),
    Retreated(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundSample {
    pub height: f32,
    pub ratio: f32,
    pub up: Vec3,
}

// ============================================
// Track
// ============================================
#[derive(Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<TrackNode>,
    pub start: usize,
    pub closed: bool,
}

impl Track {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Result<&TrackNode> {
        self.nodes
            .get(index)
            .ok_or_else(|| anyhow!("track '{}' has no node {index}", self.name))
    }

    pub fn next_of(&self, index: usize) -> Result<&TrackNode> {
        let node = self.node(index)?;
        let next = node
            .next
            .ok_or_else(|| anyhow!("node {} of track '{}' has no next link", node.number, self.name))?;
        self.node(next)
    }

    pub fn prev_of(&self, index: usize) -> Option<&TrackNode> {
        self.nodes.get(index)?.prev.and_then(|i| self.nodes.get(i))
    }

    /// Lazy walk along the chain driven by cross-section crossings.
    /// Advancing takes priority; at most one step per call.
    pub fn step_node(&self, current: usize, position: &Pos3) -> Result<NodeStep> {
        let next = self.next_of(current)?;
        if !next.is_behind(position) {
            return Ok(NodeStep::Advanced(next.number));
        }
        if let Some(prev) = self.prev_of(current) {
            if prev.is_behind(position) {
                return Ok(NodeStep::Retreated(prev.number));
            }
        }
        Ok(NodeStep::Stay)
    }

    /// Ground under `position` between node `current` and its successor.
    pub fn sample_ground(&self, current: usize, position: &Pos3) -> Result<GroundSample> {
        let node = self.node(current)?;
        let next = self.next_of(current)?;

        let cp1 = node.closest_point(position);
        let cp2 = next.closest_point(position);

        let dist = (cp2 - cp1).norm();
        if !(dist > MIN_SAMPLE_DIST) {
            bail!(
                "degenerate ground query between nodes {} and {} (cross-sections {dist} apart)",
                node.number,
                next.number
            );
        }

        let ratio = ((position - cp1).norm() / dist).clamp(0.0, 1.0);
        let height = lerp(cp1.y, cp2.y, ratio);
        if !height.is_finite() {
            bail!("non-finite ground height at node {}", node.number);
        }

        let up = safe_normalize(node.up.lerp(&next.up, ratio), node.up);
        Ok(GroundSample { height, ratio, up })
    }
}

// ============================================
// Builder
// ============================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub position: [f32; 3],
    pub orientation: f32,
    #[serde(default)]
    pub slope: f32,
    #[serde(default = "default_up")]
    pub up: [f32; 3],
    pub left_width: f32,
    pub right_width: f32,
}

fn default_up() -> [f32; 3] {
    WORLD_UP
}

#[derive(Debug, Clone)]
pub struct TrackBuilder {
    name: String,
    specs: Vec<NodeSpec>,
    closed: bool,
    start: usize,
}

impl TrackBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), specs: Vec::new(), closed: false, start: 0 }
    }

    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    pub fn start(mut self, index: usize) -> Self {
        self.start = index;
        self
    }

    pub fn specs_mut(&mut self) -> &mut [NodeSpec] {
        &mut self.specs
    }

    /// Flat straight along -Z starting at the origin.
    pub fn straight(name: impl Into<String>, count: usize, spacing: f32, half_width: f32) -> Self {
        let mut b = Self::new(name);
        for i in 0..count {
            b = b.node(NodeSpec {
                position: [0.0, 0.0, -(i as f32) * spacing],
                orientation: 0.0,
                slope: 0.0,
                up: WORLD_UP,
                left_width: half_width,
                right_width: half_width,
            });
        }
        b
    }

    /// Flat closed circle of `count` nodes, driven counter-clockwise seen from above.
    pub fn ring(name: impl Into<String>, count: usize, radius: f32, half_width: f32) -> Self {
        let mut b = Self::new(name).closed(true);
        for i in 0..count {
            let phi = i as f32 / count as f32 * std::f32::consts::TAU;
            b = b.node(NodeSpec {
                position: [radius * phi.cos(), 0.0, -radius * phi.sin()],
                orientation: phi.to_degrees(),
                slope: 0.0,
                up: WORLD_UP,
                left_width: half_width,
                right_width: half_width,
            });
        }
        b
    }

    pub fn build(self) -> Result<Track> {
        let count = self.specs.len();
        ensure!(count >= 2, "track '{}' needs at least 2 nodes, got {count}", self.name);
        ensure!(self.start < count, "start node {} out of range (track has {count} nodes)", self.start);

        let mut nodes = Vec::with_capacity(count);
        for (i, spec) in self.specs.iter().enumerate() {
            let node = build_node(i, spec, count, self.closed)
                .with_context(|| format!("track '{}': invalid node {i}", self.name))?;
            nodes.push(node);
        }

        for i in 0..count {
            let Some(j) = nodes[i].next else { continue };
            let gap = (nodes[j].position - nodes[i].position).norm();
            ensure!(
                gap > MIN_NODE_SPACING,
                "track '{}': nodes {i} and {j} coincide",
                self.name
            );
        }

        Ok(Track { id: Uuid::new_v4(), name: self.name, nodes, start: self.start, closed: self.closed })
    }
}

fn build_node(index: usize, spec: &NodeSpec, count: usize, closed: bool) -> Result<TrackNode> {
    let finite = spec.position.iter().chain(spec.up.iter()).all(|v| v.is_finite())
        && spec.orientation.is_finite()
        && spec.slope.is_finite()
        && spec.left_width.is_finite()
        && spec.right_width.is_finite();
    ensure!(finite, "non-finite value");

    let up = v3(spec.up);
    ensure!(up.norm() > 1e-6, "zero up vector");
    let up = up.normalize();

    let forward = forward_from_orientation(spec.orientation);
    let right = forward.cross(&up);
    ensure!(right.norm() > 1e-6, "up vector parallel to heading");
    let right = right.normalize();

    let position = p3(spec.position);
    let left_boundary = position - right * spec.left_width;
    let right_boundary = position + right * spec.right_width;
    ensure!(
        (right_boundary - left_boundary).norm() > MIN_SEGMENT_LEN,
        "degenerate cross-section (width {})",
        spec.left_width + spec.right_width
    );

    let last = count - 1;
    let next = if index < last { Some(index + 1) } else if closed { Some(0) } else { None };
    let prev = if index > 0 { Some(index - 1) } else if closed { Some(last) } else { None };

    Ok(TrackNode {
        number: index,
        position,
        orientation: spec.orientation,
        slope: spec.slope,
        up,
        left_boundary,
        right_boundary,
        next,
        prev,
    })
}
