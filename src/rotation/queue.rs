//! "Match observed" notifications from the engine worker.
//!
//! Listeners either own the receiving end of an mpsc channel or register a
//! callback. Both run on (or are fed from) the worker thread and receive only
//! the ability name. Clones of a `MatchNotifier` share one sink list, so a
//! sink added through any clone sees the next notification.

use chrono::{DateTime, Local};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Callback invoked on the worker thread with the matched ability name.
pub type MatchCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// One ability-change notification.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    pub ability: String,
    /// When the engine observed the new match
    pub observed_at: DateTime<Local>,
}

impl MatchEvent {
    pub fn new(ability: &str) -> Self {
        Self {
            ability: ability.to_string(),
            observed_at: Local::now(),
        }
    }
}

/// Where notifications go.
#[derive(Clone)]
pub enum MatchSink {
    Channel(Sender<MatchEvent>),
    Callback(MatchCallback),
}

/// Fans each notification out to every registered sink.
#[derive(Clone, Default)]
pub struct MatchNotifier {
    sinks: Arc<Mutex<Vec<MatchSink>>>,
}

impl MatchNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sink: MatchSink) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push(sink);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sinks.lock().map_or(0, |sinks| sinks.len())
    }

    /// Delivers `ability` to every sink.
    ///
    /// Channels whose receiver is gone are dropped from the list.
    pub fn notify(&self, ability: &str) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.retain(|sink| match sink {
                MatchSink::Channel(sender) => sender.send(MatchEvent::new(ability)).is_ok(),
                MatchSink::Callback(callback) => {
                    callback(ability);
                    true
                }
            });
        }
    }
}

/// Creates a notification channel.
///
/// The channel is unbounded; events queue up if the listener falls behind.
pub fn create_match_channel() -> (Sender<MatchEvent>, Receiver<MatchEvent>) {
    channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_send_receive() {
        let (sender, receiver) = create_match_channel();
        let notifier = MatchNotifier::new();
        notifier.add(MatchSink::Channel(sender));

        notifier.notify("Fireball");

        let received = receiver.recv().expect("Failed to receive");
        assert_eq!(received.ability, "Fireball");
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (sender, receiver) = create_match_channel();
        let notifier = MatchNotifier::new();
        notifier.add(MatchSink::Channel(sender));

        for name in ["a", "b", "c"] {
            notifier.notify(name);
        }
        let names: Vec<String> = receiver.try_iter().map(|e| e.ability).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_callback_and_channel_both_receive() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let (sender, receiver) = create_match_channel();

        let notifier = MatchNotifier::new();
        notifier.add(MatchSink::Callback(Arc::new(move |name: &str| {
            seen_clone.lock().unwrap().push(name.to_string());
        })));
        notifier.add(MatchSink::Channel(sender));

        notifier.notify("Blink");
        assert_eq!(*seen.lock().unwrap(), vec!["Blink".to_string()]);
        assert_eq!(receiver.recv().unwrap().ability, "Blink");
    }

    #[test]
    fn test_closed_channel_is_pruned() {
        let (sender, receiver) = create_match_channel();
        let notifier = MatchNotifier::new();
        notifier.add(MatchSink::Channel(sender));

        drop(receiver);
        notifier.notify("Fireball");
        assert_eq!(notifier.len(), 0);
    }

    #[test]
    fn test_sink_added_through_clone_is_shared() {
        let notifier = MatchNotifier::new();
        let worker_side = notifier.clone();

        let (sender, receiver) = create_match_channel();
        notifier.add(MatchSink::Channel(sender));
        worker_side.notify("Blink");

        assert_eq!(worker_side.len(), 1);
        assert_eq!(receiver.recv().unwrap().ability, "Blink");
    }
}
