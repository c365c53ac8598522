//! Deterministic probe for tests and demos.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{SystemSnapshot, TelemetryProbe};

/// Probe that replays a scripted list of snapshots.
///
/// Each [`sample`](TelemetryProbe::sample) pops the next snapshot; once the
/// script is exhausted the last snapshot is repeated forever.
///
/// ```rust
/// # use adaptive_inference_router::{FixedProbe, SystemSnapshot, TelemetryProbe};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let before = SystemSnapshot::default().with_cpu_util(10.0);
/// let after = SystemSnapshot::default().with_cpu_util(35.0);
/// let probe = FixedProbe::sequence(vec![before, after]);
/// assert_eq!(probe.sample().await.cpu_util_pct, Some(10.0));
/// assert_eq!(probe.sample().await.cpu_util_pct, Some(35.0));
/// assert_eq!(probe.sample().await.cpu_util_pct, Some(35.0));
/// # }
/// ```
#[derive(Debug)]
pub struct FixedProbe {
    script: Mutex<Script>,
}

#[derive(Debug)]
struct Script {
    pending: VecDeque<SystemSnapshot>,
    last: SystemSnapshot,
}

impl FixedProbe {
    /// Always return `snapshot`.
    pub fn constant(snapshot: SystemSnapshot) -> Self {
        Self::sequence(vec![snapshot])
    }

    /// Return `snapshots` in order, then repeat the last one.
    ///
    /// An empty list behaves like `constant(SystemSnapshot::default())`.
    pub fn sequence(snapshots: Vec<SystemSnapshot>) -> Self {
        let last = snapshots.last().cloned().unwrap_or_default();
        Self {
            script: Mutex::new(Script {
                pending: snapshots.into(),
                last,
            }),
        }
    }
}

#[async_trait]
impl TelemetryProbe for FixedProbe {
    async fn sample(&self) -> SystemSnapshot {
        let mut script = self.script.lock().await;
        script
            .pending
            .pop_front()
            .unwrap_or_else(|| script.last.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_sequence_yields_default_snapshot() {
        let probe = FixedProbe::sequence(Vec::new());
        assert_eq!(probe.sample().await, SystemSnapshot::default());
    }

    #[tokio::test]
    async fn test_constant_repeats() {
        let snap = SystemSnapshot::default().with_gpu_util(55.0);
        let probe = FixedProbe::constant(snap.clone());
        for _ in 0..3 {
            assert_eq!(probe.sample().await, snap);
        }
    }
}
