//! Observer pattern for fields - push notifications on mutation
//!
//! Observers run synchronously on the mutating thread, after the mutation
//! has completed. No polling required.

use std::sync::mpsc::Sender;

/// Event emitted when a field changes.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldEvent {
    /// A center was appended at `index`.
    CenterAdded { index: usize, num_centers: usize },
    /// The center at `index` was removed; later indices shifted down.
    CenterRemoved { index: usize, num_centers: usize },
    /// An evolution step completed.
    Evolved {
        time: f64,
        dt: f32,
        /// Centers that kept their pre-step state.
        degenerate: usize,
    },
    /// A center failed metric validation during evolution and was frozen.
    Degenerate { index: usize, time: f64 },
}

/// Observer that receives field events
pub trait FieldObserver: Send + Sync {
    /// Called when a field event occurs
    fn on_event(&self, event: FieldEvent);
}

/// Function-based observer for simple cases
pub struct FnObserver<F: Fn(FieldEvent) + Send + Sync>(pub F);

impl<F: Fn(FieldEvent) + Send + Sync> FieldObserver for FnObserver<F> {
    fn on_event(&self, event: FieldEvent) {
        (self.0)(event);
    }
}

/// Channel-based observer - sends events to a channel
///
/// A dropped receiver silently discards further events.
pub struct ChannelObserver {
    sender: Sender<FieldEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<FieldEvent>) -> Self {
        Self { sender }
    }
}

impl FieldObserver for ChannelObserver {
    fn on_event(&self, event: FieldEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};

    #[test]
    fn test_fn_observer() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let observer = FnObserver(move |event| {
            if let FieldEvent::CenterAdded { .. } = event {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        observer.on_event(FieldEvent::CenterAdded {
            index: 0,
            num_centers: 1,
        });
        observer.on_event(FieldEvent::Degenerate { index: 0, time: 0.5 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        let observer = ChannelObserver::new(tx);

        observer.on_event(FieldEvent::CenterRemoved {
            index: 2,
            num_centers: 4,
        });
        assert_eq!(
            rx.recv().unwrap(),
            FieldEvent::CenterRemoved {
                index: 2,
                num_centers: 4
            }
        );

        drop(rx);
        observer.on_event(FieldEvent::Evolved {
            time: 1.0,
            dt: 0.1,
            degenerate: 0,
        });
    }
}
