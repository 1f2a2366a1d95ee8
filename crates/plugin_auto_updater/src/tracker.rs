//! Player Notification Tracker.

use host_api::SessionId;
use std::collections::HashMap;

/// Remembers which connected sessions have been told about the pending
/// update, so nobody is warned twice.
///
/// Keyed by [`SessionId`], which is unique per connection: a player taking
/// over a freed slot is a new entry, not the previous occupant.
#[derive(Debug, Default, Clone)]
pub struct NotificationTracker {
    sessions: HashMap<SessionId, bool>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `session` as notified. Returns `true` if it was not notified
    /// before, i.e. the caller should send the notice now. Unknown sessions
    /// are added on the fly.
    pub fn mark_notified_if_needed(&mut self, session: SessionId) -> bool {
        let notified = self.sessions.entry(session).or_insert(false);
        if *notified {
            false
        } else {
            *notified = true;
            true
        }
    }

    /// Starts tracking a freshly connected session as not yet notified.
    pub fn reset(&mut self, session: SessionId) {
        self.sessions.insert(session, false);
    }

    /// Stops tracking a disconnected session.
    pub fn forget(&mut self, session: SessionId) {
        self.sessions.remove(&session);
    }

    /// Drops every entry (map start).
    pub fn clear_all(&mut self) {
        self.sessions.clear();
    }

    pub fn is_notified(&self, session: SessionId) -> bool {
        self.sessions.get(&session).copied().unwrap_or(false)
    }

    pub fn is_tracked(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifies_each_session_once() {
        let mut tracker = NotificationTracker::new();
        let id = SessionId::new();

        tracker.reset(id);
        assert!(!tracker.is_notified(id));
        assert!(tracker.mark_notified_if_needed(id));
        assert!(tracker.is_notified(id));
        assert!(!tracker.mark_notified_if_needed(id));
    }

    #[test]
    fn test_unknown_session_is_added_on_probe() {
        let mut tracker = NotificationTracker::new();
        let id = SessionId::new();

        assert!(!tracker.is_tracked(id));
        assert!(tracker.mark_notified_if_needed(id));
        assert!(tracker.is_tracked(id));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_reconnect_gets_a_fresh_entry() {
        let mut tracker = NotificationTracker::new();
        let first = SessionId::new();
        tracker.reset(first);
        tracker.mark_notified_if_needed(first);
        tracker.forget(first);

        // Same slot, new connection: new id, so it is warned again.
        let second = SessionId::new();
        tracker.reset(second);
        assert!(tracker.mark_notified_if_needed(second));
        assert!(!tracker.is_tracked(first));
    }

    #[test]
    fn test_clear_all_empties_tracker() {
        let mut tracker = NotificationTracker::new();
        for _ in 0..5 {
            let id = SessionId::new();
            tracker.reset(id);
            tracker.mark_notified_if_needed(id);
        }
        assert_eq!(tracker.len(), 5);

        tracker.clear_all();
        assert!(tracker.is_empty());
    }
}
