use std::fmt;
use std::time::SystemTime;

use tokio::sync::watch;
use tracing::info;

/// Unit quaternion `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const fn identity() -> Self {
        Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }

    /// Rotation of `yaw` radians about the z-axis (roll = pitch = 0).
    pub fn from_yaw(yaw: f64) -> Self {
        let (s, c) = (yaw / 2.0).sin_cos();
        Quaternion { x: 0.0, y: 0.0, z: s, w: c }
    }

    /// Rotation about the z-axis, in `[-PI, PI]`.
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Fixed transform between two frames, declared once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticTransform {
    pub parent: String,
    pub child: String,
    pub translation: [f64; 3],
    pub rotation: Quaternion,
    pub stamp: SystemTime,
}

impl StaticTransform {
    /// `child` sits at the origin of `parent`, rotated by `yaw`.
    pub fn from_yaw(parent: &str, child: &str, yaw: f64) -> Self {
        StaticTransform {
            parent: parent.to_string(),
            child: child.to_string(),
            translation: [0.0; 3],
            rotation: Quaternion::from_yaw(yaw),
            stamp: SystemTime::now(),
        }
    }
}

impl fmt::Display for StaticTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = &self.rotation;
        write!(
            f,
            "{} -> {}: t = ({:.2}, {:.2}, {:.2}), q = ({:.4}, {:.4}, {:.4}, {:.4})",
            self.parent,
            self.child,
            self.translation[0],
            self.translation[1],
            self.translation[2],
            q.x,
            q.y,
            q.z,
            q.w
        )
    }
}

/// Latched publisher: late subscribers still see the last declared transform.
pub struct StaticFrameBroadcaster {
    tx: watch::Sender<Option<StaticTransform>>,
}

impl StaticFrameBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn send_transform(&self, transform: StaticTransform) {
        info!(transform = %transform, yaw = transform.rotation.yaw(), "Declaring static frame");
        self.tx.send_replace(Some(transform));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StaticTransform>> {
        self.tx.subscribe()
    }
}

impl Default for StaticFrameBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_quaternion_from_yaw() {
        let q = Quaternion::from_yaw(1.08);
        assert!((q.norm() - 1.0).abs() < EPSILON);
        assert!((q.yaw() - 1.08).abs() < EPSILON);
        assert_eq!((q.x, q.y), (0.0, 0.0));

        let half_turn = Quaternion::from_yaw(PI);
        assert!(half_turn.w.abs() < EPSILON);
        assert!((half_turn.z - 1.0).abs() < EPSILON);
        assert_eq!(Quaternion::from_yaw(0.0), Quaternion::identity());
    }

    #[test]
    fn test_late_subscriber_sees_latched_transform() {
        let broadcaster = StaticFrameBroadcaster::new();
        broadcaster.send_transform(StaticTransform::from_yaw("world", "odom", 0.5));
        let rx = broadcaster.subscribe();
        let transform = rx.borrow().clone().unwrap();
        assert_eq!(transform.parent, "world");
        assert_eq!(transform.child, "odom");
        assert_eq!(transform.translation, [0.0; 3]);
        assert!((transform.rotation.yaw() - 0.5).abs() < EPSILON);
    }
}
