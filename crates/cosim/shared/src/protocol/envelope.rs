use std::{sync::OnceLock, time::Instant};

use serde::{Deserialize, Serialize};

/// Request/reply envelope attaching a correlation id and a timestamp to a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Caller-assigned, increasing per connection. Replies echo the request id.
    pub id: u64,
    /// Monotonic timestamp in milliseconds since process start.
    /// Not a wall-clock time, so it is only comparable within one process.
    pub ts_mono_ms: u64,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(id: u64, payload: T) -> Self {
        Self {
            id,
            ts_mono_ms: monotonic_ms(),
            payload,
        }
    }

    /// Builds the reply envelope for this request, preserving the id.
    pub fn reply<U>(&self, payload: U) -> Envelope<U> {
        Envelope::new(self.id, payload)
    }

    /// Transform the payload while preserving metadata.
    pub fn map_payload<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            id: self.id,
            ts_mono_ms: self.ts_mono_ms,
            payload: f(self.payload),
        }
    }
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_keeps_request_id() {
        let request = Envelope::new(7, "step");
        let reply = request.reply(42u32);
        assert_eq!(reply.id, 7);
        assert!(reply.ts_mono_ms >= request.ts_mono_ms);
        assert_eq!(request.map_payload(str::len).payload, 4);
    }
}
