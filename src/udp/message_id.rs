//! Message id generation for chunked datagrams.
//!
//! Every [`UdpWriter`](super::UdpWriter) owns its own id source, so ids are
//! unique per writer rather than per process.

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::chunk::MessageId;

/// Produces ids for chunked messages.
pub trait MessageIdSource: Send {
    fn next_id(&mut self) -> MessageId;
}

/// Counter-based ids starting from an arbitrary value.
///
/// Successive ids never repeat until the 64-bit counter wraps, which keeps
/// them distinct across any realistic reassembly window.
#[derive(Clone, Debug)]
pub struct SequentialIdSource {
    next: u64,
}

impl SequentialIdSource {
    /// Start counting from `start`.
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    /// Start counting from a random value so concurrent writers do not share
    /// an id space.
    pub fn random() -> Self {
        Self::starting_at(StdRng::from_entropy().r#gen())
    }
}

impl Default for SequentialIdSource {
    fn default() -> Self {
        Self::random()
    }
}

impl MessageIdSource for SequentialIdSource {
    fn next_id(&mut self) -> MessageId {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id.to_be_bytes()
    }
}

impl<F> MessageIdSource for F
where
    F: FnMut() -> MessageId + Send,
{
    fn next_id(&mut self) -> MessageId {
        self()
    }
}
