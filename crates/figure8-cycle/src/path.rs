//! Path history of the current traversal.
//!
//! Points are written once into a shared segment. A snapshot is the segment
//! plus a length, so handing the path to a consumer never copies points.
//! Clearing starts a new segment; snapshots taken before keep the old one.

use std::fmt;
use std::sync::{Arc, OnceLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest segment ever allocated (points).
const MIN_SEGMENT_LEN: usize = 64;

/// A visited position on the curve (m).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
}

impl PathPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        PathPoint { x, y }
    }
}

impl fmt::Display for PathPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Write-once slots. Slots below the owning buffer's length are always set.
struct Segment {
    slots: Box<[OnceLock<PathPoint>]>,
}

impl Segment {
    fn new(len: usize) -> Arc<Self> {
        Arc::new(Segment { slots: (0..len).map(|_| OnceLock::new()).collect() })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Segment { slots: Box::new([]) })
    }
}

/// Read-only view of the path buffer handed to consumers.
#[derive(Clone)]
pub struct PathSnapshot {
    /// Cycle the points belong to.
    pub cycle: u64,
    /// Controller clock reading when the snapshot was taken (s).
    pub stamp: f64,
    /// Frame the points are expressed in.
    pub frame_id: Arc<str>,
    segment: Arc<Segment>,
    len: usize,
}

impl PathSnapshot {
    /// Snapshot that owns its points. Mostly useful to hosts and tests that
    /// build paths by hand.
    pub fn from_points(cycle: u64, stamp: f64, frame_id: impl Into<Arc<str>>, points: &[PathPoint]) -> Self {
        let mut buffer = PathBuffer::new(frame_id, points.len());
        for &point in points {
            buffer.push(point);
        }
        buffer.snapshot(cycle, stamp)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&PathPoint> {
        if index < self.len { self.segment.slots[index].get() } else { None }
    }

    pub fn last(&self) -> Option<&PathPoint> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Points in insertion order.
    pub fn points(&self) -> impl Iterator<Item = &PathPoint> + '_ {
        self.segment.slots[..self.len].iter().filter_map(OnceLock::get)
    }

    pub fn to_vec(&self) -> Vec<PathPoint> {
        self.points().copied().collect()
    }
}

impl Default for PathSnapshot {
    fn default() -> Self {
        PathSnapshot { cycle: 0, stamp: 0.0, frame_id: Arc::from(""), segment: Segment::empty(), len: 0 }
    }
}

impl PartialEq for PathSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.cycle == other.cycle
            && self.stamp == other.stamp
            && self.frame_id == other.frame_id
            && self.len == other.len
            && self.points().eq(other.points())
    }
}

impl fmt::Debug for PathSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSnapshot")
            .field("cycle", &self.cycle)
            .field("stamp", &self.stamp)
            .field("frame_id", &self.frame_id)
            .field("len", &self.len)
            .field("last", &self.last())
            .finish()
    }
}

/// Append-only sequence of visited points, emptied on every period boundary.
pub struct PathBuffer {
    frame_id: Arc<str>,
    segment: Arc<Segment>,
    len: usize,
    capacity_hint: usize,
}

impl PathBuffer {
    /// Empty buffer in `frame_id` with room for `capacity` points.
    pub fn new(frame_id: impl Into<Arc<str>>, capacity: usize) -> Self {
        let capacity_hint = capacity.max(MIN_SEGMENT_LEN);
        Self { frame_id: frame_id.into(), segment: Segment::new(capacity_hint), len: 0, capacity_hint }
    }

    pub fn push(&mut self, point: PathPoint) {
        if self.len == self.segment.slots.len() {
            self.grow();
        }
        // Slots at and above `len` are never set in a live segment.
        let _ = self.segment.slots[self.len].set(point);
        self.len += 1;
    }

    fn grow(&mut self) {
        let next = Segment::new((self.segment.slots.len() * 2).max(MIN_SEGMENT_LEN));
        for (slot, point) in next.slots.iter().zip(self.segment.slots[..self.len].iter().filter_map(OnceLock::get)) {
            let _ = slot.set(*point);
        }
        self.segment = next;
    }

    /// Drops every point. Snapshots taken earlier are unaffected.
    pub fn clear(&mut self) {
        self.segment = Segment::new(self.capacity_hint.max(self.len));
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Shares the current points with a consumer. Does not copy them.
    pub fn snapshot(&self, cycle: u64, stamp: f64) -> PathSnapshot {
        PathSnapshot {
            cycle,
            stamp,
            frame_id: Arc::clone(&self.frame_id),
            segment: Arc::clone(&self.segment),
            len: self.len,
        }
    }
}

impl Default for PathBuffer {
    fn default() -> Self {
        PathBuffer::new("world", 0)
    }
}

impl fmt::Debug for PathBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathBuffer")
            .field("frame_id", &self.frame_id)
            .field("len", &self.len)
            .field("allocated", &self.segment.slots.len())
            .finish()
    }
}
