// Request coalescing for derivative population
//
// When several requests miss the same store key at once:
// - First request (leader): populates the derivative, then signals completion
// - Subsequent requests (followers): wait for the leader, then re-check the store
//
// The leader's map entry is removed before followers are woken, so a woken
// follower that finds the derivative missing (leader failed) can lead a retry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Tracks in-flight populations keyed by store key
#[derive(Debug, Clone, Default)]
pub struct RequestCoalescer {
    in_flight: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the leader for `key`, or wait for the current leader to finish
    ///
    /// Leadership is decided under a single lock acquisition.
    pub async fn acquire(&self, key: &str) -> CoalescingSlot {
        let mut receiver = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(sender) => sender.subscribe(),
                None => {
                    let (sender, _) = watch::channel(false);
                    in_flight.insert(key.to_string(), sender.clone());
                    return CoalescingSlot::Leader(LeaderGuard {
                        key: key.to_string(),
                        coalescer: self.clone(),
                        sender,
                    });
                }
            }
        };

        // Err means every sender is gone, which also ends the wait
        let _ = receiver.wait_for(|&completed| completed).await;
        CoalescingSlot::Follower
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn remove_in_flight(&self, key: &str) {
        self.in_flight.lock().remove(key);
    }
}

#[derive(Debug)]
pub enum CoalescingSlot {
    /// First requester; dropping the guard wakes every follower
    Leader(LeaderGuard),

    /// A leader finished; the caller should re-check the store
    Follower,
}

impl CoalescingSlot {
    pub fn is_leader(&self) -> bool {
        matches!(self, CoalescingSlot::Leader(_))
    }
}

/// Held by the leader; released on completion, error, cancellation or panic
#[derive(Debug)]
pub struct LeaderGuard {
    key: String,
    coalescer: RequestCoalescer,
    sender: watch::Sender<bool>,
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.coalescer.remove_in_flight(&self.key);
        let _ = self.sender.send(true);
    }
}
