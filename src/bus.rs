use std::sync::Arc;

use anyhow::{anyhow, bail};
use tokio::sync::broadcast;

use figure8_cycle::{PathSink, PathSnapshot, VelocitySink};
use figure8_kinematics::{ChassisSpeeds, Twist};

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because we hop across threads.
/// Slow subscribers lag and lose the oldest messages.
#[derive(Debug)]
pub struct Topic<T> {
    name: Arc<str>,
    tx: broadcast::Sender<Arc<T>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self { name: Arc::clone(&self.name), tx: self.tx.clone() }
    }
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(name: &str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { name: Arc::from(name), tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of subscribers reached, or an error when nobody
    /// is listening.
    pub fn publish(&self, msg: T) -> Result<usize, broadcast::error::SendError<Arc<T>>> {
        self.tx.send(Arc::new(msg))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// The same command published on several topics, e.g. a simulator's and
/// the real base's.
#[derive(Debug, Clone)]
pub struct VelocityFanout {
    topics: Vec<Topic<Twist>>,
}

impl VelocityFanout {
    pub fn new(names: &[String], capacity: usize) -> Self {
        Self { topics: names.iter().map(|name| Topic::new(name, capacity)).collect() }
    }

    pub fn topics(&self) -> &[Topic<Twist>] {
        &self.topics
    }

    /// First topic, the one in-process consumers listen on.
    pub fn primary(&self) -> Option<&Topic<Twist>> {
        self.topics.first()
    }
}

impl VelocitySink for VelocityFanout {
    /// Succeeds when at least one topic had a subscriber.
    fn send_velocity(&self, cmd: ChassisSpeeds) -> anyhow::Result<()> {
        let twist = Twist::from(cmd);
        let reached = self.topics.iter().filter(|topic| topic.publish(twist).is_ok()).count();
        if reached == 0 {
            bail!("no subscribers on any of {} velocity topics", self.topics.len());
        }
        Ok(())
    }
}

impl PathSink for Topic<PathSnapshot> {
    fn send_path(&self, snapshot: PathSnapshot) -> anyhow::Result<()> {
        self.publish(snapshot)
            .map(|_| ())
            .map_err(|_| anyhow!("no subscribers on topic `{}`", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figure8_cycle::PathPoint;

    #[test]
    fn test_path_sink_without_subscribers_names_topic() {
        let topic: Topic<PathSnapshot> = Topic::new("path", 4);
        let err = topic.send_path(PathSnapshot::default()).unwrap_err();
        assert!(err.to_string().contains("`path`"));
    }

    #[tokio::test]
    async fn test_lagging_path_subscriber_skips_old_snapshots() {
        let topic: Topic<PathSnapshot> = Topic::new("path", 2);
        let mut rx = topic.subscribe();
        for i in 0..5 {
            let points = [PathPoint::new(i as f64, 0.0)];
            topic.send_path(PathSnapshot::from_points(0, i as f64, "world", &points)).unwrap();
        }
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(3))));
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.get(0), Some(&PathPoint::new(3.0, 0.0)));
        assert_eq!(snapshot.stamp, 3.0);
    }

    #[tokio::test]
    async fn test_fanout_publishes_on_every_topic() {
        let names = vec!["cmd_vel".to_string(), "turtle1/cmd_vel".to_string()];
        let fanout = VelocityFanout::new(&names, 4);
        assert_eq!(fanout.primary().map(Topic::name), Some("cmd_vel"));
        let mut receivers: Vec<_> = fanout.topics().iter().map(Topic::subscribe).collect();

        fanout.send_velocity(ChassisSpeeds::new(0.5, 0.1)).unwrap();
        for rx in receivers.iter_mut() {
            assert_eq!(*rx.recv().await.unwrap(), Twist::new(0.5, 0.1));
        }
    }

    #[test]
    fn test_fanout_needs_one_listener() {
        let names = vec!["cmd_vel".to_string(), "turtle1/cmd_vel".to_string()];
        let fanout = VelocityFanout::new(&names, 4);
        assert!(fanout.send_velocity(ChassisSpeeds::stopped()).is_err());

        let _rx = fanout.topics()[1].subscribe();
        assert!(fanout.send_velocity(ChassisSpeeds::stopped()).is_ok());
    }
}
