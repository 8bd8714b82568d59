use dashmap::DashMap;
use ferrite_mcp_wire::Message;
use std::collections::VecDeque;

/// One retained message on a stream, numbered so a reconnecting GET can ask
/// for everything after a given sequence number.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub seq: u64,
    pub message: Message,
}

impl StoredEvent {
    /// The wire-level id a `Last-Event-ID` header echoes back:
    /// `"<stream_id>/<seq>"`.
    pub fn event_id(&self, stream_id: &str) -> String {
        format!("{stream_id}/{}", self.seq)
    }
}

/// Parses a `Last-Event-ID` header value of the form `"<stream_id>/<seq>"`.
pub fn parse_last_event_id(header: &str) -> Option<(String, u64)> {
    let (stream_id, seq) = header.rsplit_once('/')?;
    if stream_id.is_empty() {
        return None;
    }
    Some((stream_id.to_string(), seq.parse().ok()?))
}

struct Stream {
    ring: VecDeque<StoredEvent>,
    next_seq: u64,
}

/// A fixed-size ring buffer of retained events per stream, purely in memory.
/// `append` is called by a session's `Connection::send`; `since` serves a
/// reconnecting GET's `Last-Event-ID` replay.
pub struct EventStore {
    capacity: usize,
    streams: DashMap<String, Stream>,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), streams: DashMap::new() }
    }

    /// Appends `message` to `stream_id`'s ring, evicting the oldest retained
    /// event once at capacity. Returns the sequence number assigned.
    pub fn append(&self, stream_id: &str, message: Message) -> u64 {
        let mut entry = self.streams.entry(stream_id.to_string()).or_insert_with(|| Stream {
            ring: VecDeque::new(),
            next_seq: 0,
        });
        let seq = entry.next_seq;
        entry.next_seq += 1;
        if entry.ring.len() == self.capacity {
            entry.ring.pop_front();
        }
        entry.ring.push_back(StoredEvent { seq, message });
        seq
    }

    /// Events strictly after `seq`. Returns `None` when `seq` has already
    /// fallen out of the retention window — the caller treats that as a
    /// fresh subscription (no replay) rather than an error.
    pub fn since(&self, stream_id: &str, seq: u64) -> Option<Vec<StoredEvent>> {
        let stream = self.streams.get(stream_id)?;
        match stream.ring.front() {
            Some(oldest) if seq + 1 < oldest.seq => None,
            _ => Some(stream.ring.iter().filter(|e| e.seq > seq).cloned().collect()),
        }
    }

    /// Drops all retained state for `stream_id`, e.g. on session termination.
    pub fn close(&self, stream_id: &str) {
        self.streams.remove(stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_mcp_wire::{Message, Notification};

    fn note(method: &str) -> Message {
        Message::Notification(Notification::new(method, None))
    }

    #[test]
    fn replays_only_events_after_requested_seq() {
        let store = EventStore::new(8);
        store.append("s1", note("a"));
        store.append("s1", note("b"));
        store.append("s1", note("c"));
        let replay = store.since("s1", 0).unwrap();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].seq, 1);
        assert_eq!(replay[1].seq, 2);
    }

    #[test]
    fn evicts_beyond_capacity_and_treats_stale_seq_as_fresh() {
        let store = EventStore::new(2);
        for i in 0..5 {
            store.append("s1", note(&format!("m{i}")));
        }
        // seq 0,1,2 have been evicted; only 3,4 remain.
        assert!(store.since("s1", 0).is_none());
        let replay = store.since("s1", 2).unwrap();
        assert_eq!(replay.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn unknown_stream_yields_none() {
        let store = EventStore::new(4);
        assert!(store.since("nope", 0).is_none());
    }

    #[test]
    fn close_drops_retained_state() {
        let store = EventStore::new(4);
        store.append("s1", note("a"));
        store.close("s1");
        assert!(store.since("s1", 0).is_none());
    }

    #[test]
    fn parses_last_event_id_header() {
        assert_eq!(parse_last_event_id("abc/12").unwrap(), ("abc".to_string(), 12));
        assert!(parse_last_event_id("no-slash").is_none());
        assert!(parse_last_event_id("/12").is_none());
    }
}
