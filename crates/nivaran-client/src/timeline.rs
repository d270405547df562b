use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use nivaran_types::models::Message;

type Key = (DateTime<Utc>, Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Shown locally, create call still in flight.
    Pending,
    Confirmed,
    /// Create call failed; the entry stays until dismissed.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub message: Message,
    pub status: DeliveryStatus,
}

/// A locally shown send. `echo` is the stored record that looks like its
/// echo; the entry is hidden while that record is in the view.
#[derive(Debug, Clone)]
struct LocalEntry {
    entry: TimelineEntry,
    echo: Option<Uuid>,
}

/// Ordered, deduplicated message view of one chat.
///
/// Confirmed messages are keyed by `(created_at, id)`, so the result is the
/// same whatever order history and pushes arrive in. Local echoes follow the
/// confirmed messages in send order. Only `confirm` and `dismiss` remove a
/// local entry, each by its own id.
#[derive(Debug, Default)]
pub struct Timeline {
    confirmed: BTreeMap<Key, Message>,
    keys: HashMap<Uuid, Key>,
    local: Vec<LocalEntry>,
    window: Option<usize>,
}

impl Timeline {
    pub fn new(window: Option<usize>) -> Self {
        Self {
            window: window.filter(|w| *w > 0),
            ..Self::default()
        }
    }

    /// Merge a confirmed message. Returns false if it was already present
    /// or fell outside the history window.
    pub fn upsert(&mut self, message: Message) -> bool {
        if self.keys.contains_key(&message.id) {
            return false;
        }

        // Possibly the echo of a pending send: hide that entry until its own
        // create call settles.
        if let Some(local) = self.local.iter_mut().find(|l| {
            l.echo.is_none()
                && l.entry.status == DeliveryStatus::Pending
                && l.entry.message.sender_id == message.sender_id
                && l.entry.message.text == message.text
        }) {
            local.echo = Some(message.id);
        }

        self.insert(message)
    }

    fn insert(&mut self, message: Message) -> bool {
        if self.keys.contains_key(&message.id) {
            return false;
        }
        let key = (message.created_at, message.id);
        self.keys.insert(message.id, key);
        self.confirmed.insert(key, message);
        self.evict();
        self.keys.contains_key(&key.1)
    }

    fn evict(&mut self) {
        let Some(window) = self.window else { return };
        while self.confirmed.len() > window {
            if let Some(((_, id), _)) = self.confirmed.pop_first() {
                self.keys.remove(&id);
            }
        }
    }

    /// Show an outgoing message before the backend has acknowledged it.
    pub fn push_local(&mut self, message: Message) {
        self.local.push(LocalEntry {
            entry: TimelineEntry {
                message,
                status: DeliveryStatus::Pending,
            },
            echo: None,
        });
    }

    /// Replace the local entry `local_id` with the stored record. Returns
    /// true if the record was new to the timeline.
    pub fn confirm(&mut self, local_id: Uuid, message: Message) -> bool {
        self.local.retain(|l| l.entry.message.id != local_id);
        // Another entry guessed this record as its echo; it was wrong.
        for local in &mut self.local {
            if local.echo == Some(message.id) {
                local.echo = None;
            }
        }
        self.insert(message)
    }

    /// Mark the local entry failed. It becomes visible again even if a
    /// look-alike record had been taken for its echo.
    pub fn fail(&mut self, local_id: Uuid) {
        if let Some(local) = self.local.iter_mut().find(|l| l.entry.message.id == local_id) {
            local.entry.status = DeliveryStatus::Failed;
            local.echo = None;
        }
    }

    pub fn dismiss(&mut self, local_id: Uuid) {
        self.local.retain(|l| l.entry.message.id != local_id);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.keys.contains_key(&id)
    }

    /// Confirmed messages, ascending.
    pub fn messages(&self) -> Vec<Message> {
        self.confirmed.values().cloned().collect()
    }

    /// Everything to render: confirmed messages, then local echoes.
    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.confirmed
            .values()
            .map(|m| TimelineEntry {
                message: m.clone(),
                status: DeliveryStatus::Confirmed,
            })
            .chain(
                self.local
                    .iter()
                    .filter(|l| l.echo.is_none_or(|id| !self.keys.contains_key(&id)))
                    .map(|l| l.entry.clone()),
            )
            .collect()
    }

    pub fn last(&self) -> Option<&Message> {
        self.confirmed.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }

    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.keys.clear();
        self.local.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn msg(sender: Uuid, text: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id: Uuid::nil(),
            sender_id: sender,
            text: text.into(),
            attachments: vec![],
            read_by: vec![sender],
            created_at: at,
        }
    }

    fn texts(t: &Timeline) -> Vec<String> {
        t.messages().into_iter().map(|m| m.text).collect()
    }

    #[test]
    fn order_is_independent_of_arrival() {
        let now = Utc::now();
        let s = Uuid::new_v4();
        let a = msg(s, "a", now);
        let b = msg(s, "b", now + Duration::seconds(1));
        let c = msg(s, "c", now + Duration::seconds(2));

        let mut forward = Timeline::new(None);
        for m in [a.clone(), b.clone(), c.clone()] {
            forward.upsert(m);
        }
        let mut shuffled = Timeline::new(None);
        for m in [c, a, b] {
            shuffled.upsert(m);
        }
        assert_eq!(texts(&forward), vec!["a", "b", "c"]);
        assert_eq!(forward.messages(), shuffled.messages());
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut t = Timeline::new(None);
        let m = msg(Uuid::new_v4(), "once", Utc::now());
        assert!(t.upsert(m.clone()));
        assert!(!t.upsert(m));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn ties_break_by_id() {
        let now = Utc::now();
        let s = Uuid::new_v4();
        let mut first = msg(s, "x", now);
        let mut second = msg(s, "y", now);
        first.id = Uuid::from_u128(1);
        second.id = Uuid::from_u128(2);

        let mut t = Timeline::new(None);
        t.upsert(second);
        t.upsert(first);
        assert_eq!(texts(&t), vec!["x", "y"]);
    }

    #[test]
    fn window_evicts_oldest() {
        let now = Utc::now();
        let s = Uuid::new_v4();
        let mut t = Timeline::new(Some(2));
        for i in 0..4 {
            t.upsert(msg(s, &i.to_string(), now + Duration::seconds(i)));
        }
        assert_eq!(texts(&t), vec!["2", "3"]);

        // Older than the window: accepted and immediately dropped.
        assert!(!t.upsert(msg(s, "old", now - Duration::seconds(10))));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn echo_replaces_local_entry() {
        let s = Uuid::new_v4();
        let mut t = Timeline::new(None);
        let local = msg(s, "hello", Utc::now());
        let local_id = local.id;
        t.push_local(local);
        assert_eq!(t.entries()[0].status, DeliveryStatus::Pending);

        let stored = msg(s, "hello", Utc::now());
        assert!(t.upsert(stored.clone()));
        assert_eq!(t.entries().len(), 1);

        // Late confirmation of the same record changes nothing.
        assert!(!t.confirm(local_id, stored));
        assert_eq!(t.entries().len(), 1);
        assert_eq!(t.entries()[0].status, DeliveryStatus::Confirmed);
    }

    #[test]
    fn look_alike_from_another_device_does_not_swallow_a_failed_send() {
        let me = Uuid::new_v4();
        let mut t = Timeline::new(None);
        let local = msg(me, "ok", Utc::now());
        let local_id = local.id;
        t.push_local(local);

        // Same sender and text, but a different send.
        let other = msg(me, "ok", Utc::now());
        assert!(t.upsert(other.clone()));
        assert_eq!(t.entries().len(), 1);

        t.fail(local_id);
        let entries = t.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message.id, other.id);
        assert_eq!(entries[1].message.id, local_id);
        assert_eq!(entries[1].status, DeliveryStatus::Failed);
    }

    #[test]
    fn confirm_corrects_a_wrong_echo_guess() {
        let me = Uuid::new_v4();
        let mut t = Timeline::new(None);
        let first = msg(me, "ok", Utc::now());
        let second = msg(me, "ok", Utc::now());
        let (first_id, second_id) = (first.id, second.id);
        t.push_local(first);
        t.push_local(second);

        // The second send's record arrives first and is taken for the first's echo.
        let stored_second = msg(me, "ok", Utc::now());
        t.upsert(stored_second.clone());
        assert_eq!(t.entries().len(), 2);

        t.confirm(second_id, stored_second);
        let pending: Vec<_> = t
            .entries()
            .into_iter()
            .filter(|e| e.status == DeliveryStatus::Pending)
            .map(|e| e.message.id)
            .collect();
        assert_eq!(pending, vec![first_id]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn failed_send_stays_until_dismissed() {
        let mut t = Timeline::new(None);
        let local = msg(Uuid::new_v4(), "lost", Utc::now());
        let id = local.id;
        t.push_local(local);
        t.fail(id);
        assert_eq!(t.entries()[0].status, DeliveryStatus::Failed);
        assert!(t.messages().is_empty());
        t.dismiss(id);
        assert!(t.entries().is_empty());
    }
}
