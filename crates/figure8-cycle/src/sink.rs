//! Collaborator interfaces the controller emits into.
//!
//! Transport is the host's business. Sinks are best-effort: an `Err` is
//! logged by the controller and the loop carries on.

use figure8_kinematics::ChassisSpeeds;

use crate::path::PathSnapshot;

/// Receives the commanded `(v, ω)` once per tick.
pub trait VelocitySink {
    fn send_velocity(&self, cmd: ChassisSpeeds) -> anyhow::Result<()>;
}

/// Receives a copy of the current path buffer.
pub trait PathSink {
    fn send_path(&self, snapshot: PathSnapshot) -> anyhow::Result<()>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl VelocitySink for NullSink {
    fn send_velocity(&self, _cmd: ChassisSpeeds) -> anyhow::Result<()> {
        Ok(())
    }
}

impl PathSink for NullSink {
    fn send_path(&self, _snapshot: PathSnapshot) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<S: VelocitySink + ?Sized> VelocitySink for std::sync::Arc<S> {
    fn send_velocity(&self, cmd: ChassisSpeeds) -> anyhow::Result<()> {
        (**self).send_velocity(cmd)
    }
}

impl<S: PathSink + ?Sized> PathSink for std::sync::Arc<S> {
    fn send_path(&self, snapshot: PathSnapshot) -> anyhow::Result<()> {
        (**self).send_path(snapshot)
    }
}
