// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The asynchronous error channel of a device.

use crate::error::DeviceError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Fans reported errors out to every subscriber.
///
/// Subscribers receive errors through an unbounded `flume` channel, so
/// reporting never blocks the recording thread. Subscribers whose receiver was
/// dropped are forgotten on the next report.
#[derive(Debug, Default)]
pub struct ErrorBus {
    subscribers: Mutex<Vec<flume::Sender<DeviceError>>>,
    reported: AtomicU64,
}

impl ErrorBus {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for every error reported from now on.
    pub fn subscribe(&self) -> flume::Receiver<DeviceError> {
        let (sender, receiver) = flume::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Logs the error and forwards it to every live subscriber.
    pub fn publish(&self, error: DeviceError) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        log::error!("{error}");

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| sender.send(error.clone()).is_ok());
    }

    /// The number of errors reported so far.
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use flume::TryRecvError;
    use std::{thread, time::Duration};

    #[test]
    fn every_subscriber_receives_the_error() {
        let bus = ErrorBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(PipelineError::BuilderConsumed.into());

        let expected: DeviceError = PipelineError::BuilderConsumed.into();
        assert_eq!(first.try_recv(), Ok(expected.clone()));
        assert_eq!(second.try_recv(), Ok(expected));
        assert_eq!(bus.reported(), 1);
    }

    #[test]
    fn nothing_received_before_a_report() {
        let bus = ErrorBus::new();
        let receiver = bus.subscribe();
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn dropped_subscribers_are_forgotten() {
        let bus = ErrorBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(PipelineError::BuilderPoisoned.into());
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn reports_from_another_thread() {
        let bus = std::sync::Arc::new(ErrorBus::new());
        let receiver = bus.subscribe();

        let publisher = std::sync::Arc::clone(&bus);
        let handle = thread::spawn(move || {
            publisher.publish(PipelineError::BuilderConsumed.into());
        });

        let received = receiver
            .recv_timeout(Duration::from_secs(1))
            .expect("Failed to receive error from thread");
        assert_eq!(received, PipelineError::BuilderConsumed.into());
        handle.join().expect("Thread join failed");
    }
}
