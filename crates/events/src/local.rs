//! In-process progress bus backed by per-job `tokio::sync::broadcast`
//! channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use automl_core::types::JobId;
use futures::StreamExt;
use tokio::sync::broadcast;

use crate::bus::{BusError, ProgressBus, Subscription};
use crate::event::ProgressEvent;

/// Default buffer capacity of each job's broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

type Channels = Arc<Mutex<HashMap<JobId, broadcast::Sender<ProgressEvent>>>>;

/// In-process fan-out bus, shared via `Arc` between the executors and
/// relays of one process.
///
/// A job's channel is created by its first subscriber and removed once the
/// last subscriber is gone, so idle jobs hold no memory.
pub struct LocalProgressBus {
    channels: Channels,
    capacity: usize,
}

impl LocalProgressBus {
    /// Create a bus whose per-job channels buffer `capacity` events.
    ///
    /// A subscriber that falls more than `capacity` events behind skips the
    /// oldest ones and logs a warning.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// Number of jobs that currently have at least one subscriber.
    pub fn active_channels(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for LocalProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ProgressBus for LocalProgressBus {
    async fn publish(&self, job_id: JobId, event: &ProgressEvent) -> Result<(), BusError> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = channels.get(&job_id) {
            // SendError only means every receiver is gone.
            if sender.send(event.clone()).is_err() {
                channels.remove(&job_id);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, job_id: JobId) -> Result<Subscription, BusError> {
        let receiver = {
            let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
            channels
                .entry(job_id)
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let stream = futures::stream::unfold(receiver, move |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((Ok(event), receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%job_id, skipped, "Progress subscriber lagged, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed();

        Ok(Subscription::new(stream).with_guard(ChannelGuard {
            channels: Arc::clone(&self.channels),
            job_id,
        }))
    }
}

/// Removes a job's channel when its last subscription is dropped.
struct ChannelGuard {
    channels: Channels,
    job_id: JobId,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if channels
            .get(&self.job_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use automl_core::types::new_job_id;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = LocalProgressBus::default();
        let job = new_job_id();
        let mut sub = bus.subscribe(job).await.unwrap();

        bus.publish(job, &ProgressEvent::log("step 1")).await.unwrap();

        let received = sub.next_event().await.unwrap().unwrap();
        assert_eq!(received, ProgressEvent::log("step 1"));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_events() {
        let bus = LocalProgressBus::default();
        let job = new_job_id();
        let mut a = bus.subscribe(job).await.unwrap();
        let mut b = bus.subscribe(job).await.unwrap();

        bus.publish(job, &ProgressEvent::log("one")).await.unwrap();
        bus.publish(job, &ProgressEvent::done("ok", json!({"score": 1})))
            .await
            .unwrap();

        for sub in [&mut a, &mut b] {
            assert_eq!(
                sub.next_event().await.unwrap().unwrap(),
                ProgressEvent::log("one")
            );
            assert!(sub.next_event().await.unwrap().unwrap().is_terminal());
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_discarded() {
        let bus = LocalProgressBus::default();
        let job = new_job_id();

        bus.publish(job, &ProgressEvent::log("lost")).await.unwrap();
        assert_eq!(bus.active_channels(), 0);

        let mut sub = bus.subscribe(job).await.unwrap();
        bus.publish(job, &ProgressEvent::log("seen")).await.unwrap();
        assert_eq!(
            sub.next_event().await.unwrap().unwrap(),
            ProgressEvent::log("seen")
        );
    }

    #[tokio::test]
    async fn channels_are_isolated_per_job() {
        let bus = LocalProgressBus::default();
        let (a, b) = (new_job_id(), new_job_id());
        let mut sub_a = bus.subscribe(a).await.unwrap();
        let _sub_b = bus.subscribe(b).await.unwrap();

        bus.publish(b, &ProgressEvent::log("for b")).await.unwrap();
        bus.publish(a, &ProgressEvent::log("for a")).await.unwrap();

        assert_eq!(
            sub_a.next_event().await.unwrap().unwrap(),
            ProgressEvent::log("for a")
        );
    }

    #[tokio::test]
    async fn dropping_last_subscriber_reclaims_channel() {
        let bus = LocalProgressBus::default();
        let job = new_job_id();
        let first = bus.subscribe(job).await.unwrap();
        let second = bus.subscribe(job).await.unwrap();
        assert_eq!(bus.active_channels(), 1);

        drop(first);
        assert_eq!(bus.active_channels(), 1);

        drop(second);
        assert_eq!(bus.active_channels(), 0);
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_to_newest() {
        let bus = LocalProgressBus::new(2);
        let job = new_job_id();
        let mut sub = bus.subscribe(job).await.unwrap();

        for i in 0..5 {
            bus.publish(job, &ProgressEvent::log(format!("line {i}")))
                .await
                .unwrap();
        }

        assert_eq!(
            sub.next_event().await.unwrap().unwrap(),
            ProgressEvent::log("line 3")
        );
        assert_eq!(
            sub.next_event().await.unwrap().unwrap(),
            ProgressEvent::log("line 4")
        );
    }
}
