#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    events_sent: u64,
    audio_chunks_sent: u64,
    send_failures: u64,
    decode_failures: u64,
    audio_bytes_received: u64,
    interruptions: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sent(&mut self, kind: &str) {
        self.events_sent += 1;
        if kind == "audioInput" {
            self.audio_chunks_sent += 1;
        }
    }

    pub(crate) fn record_send_failure(&mut self) {
        self.send_failures += 1;
    }

    pub(crate) fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    pub(crate) fn record_audio_received(&mut self, bytes: usize) {
        self.audio_bytes_received += bytes as u64;
    }

    pub(crate) fn record_interruption(&mut self) {
        self.interruptions += 1;
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }

    pub fn audio_chunks_sent(&self) -> u64 {
        self.audio_chunks_sent
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    pub fn audio_bytes_received(&self) -> u64 {
        self.audio_bytes_received
    }

    /// Barge-in markers seen on the inbound stream.
    pub fn interruptions(&self) -> u64 {
        self.interruptions
    }
}
