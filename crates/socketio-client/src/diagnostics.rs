//! Where dropped frames are reported.

use crate::protocol::Discard;

/// Receives every frame the read loop drops instead of delivering.
///
/// Implementations must not block; they run inline in the read loop.
pub trait DiscardSink: Send + Sync {
    fn discarded(&self, frame: &str, reason: &Discard);
}

/// Logs discards through `tracing`. This is the client default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiscardSink for TracingSink {
    fn discarded(&self, frame: &str, reason: &Discard) {
        if reason.is_malformed() {
            tracing::warn!(packet = frame, "Discarding Socket.IO event: {reason}");
        } else {
            tracing::debug!(packet = frame, "Discarding packet: {reason}");
        }
    }
}

/// Ignores discards.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiscardSink for NoopSink {
    fn discarded(&self, _frame: &str, _reason: &Discard) {}
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::protocol::decode;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(frame: &str) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .finish();

        let reason = decode(frame).unwrap_err();
        tracing::subscriber::with_default(subscriber, || TracingSink.discarded(frame, &reason));

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn tracing_sink_warns_on_malformed_event() {
        let out = logged("42[not json");
        assert!(out.contains("WARN"), "got {out}");
        assert!(out.contains("Discarding Socket.IO event"), "got {out}");
        assert!(out.contains("42[not json"), "got {out}");
    }

    #[test]
    fn tracing_sink_debug_logs_unknown_packet() {
        let out = logged("x");
        assert!(out.contains("DEBUG"), "got {out}");
        assert!(out.contains("Discarding packet"), "got {out}");
        assert!(!out.contains("WARN"), "got {out}");
    }
}
