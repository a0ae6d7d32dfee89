//! Behaviour shared by the UDP and TCP writers.

use std::panic::Location;

use crate::{
    error::GelfError,
    message::{Message, Origin},
};

/// Trait implemented by every GELF writer.
///
/// Writers are `Send + Sync` and take `&self`, so one instance may be shared
/// between threads. Each implementation serialises its own socket access.
pub trait GelfWriter: Send + Sync {
    /// Identity stamped onto messages built by [`write`](Self::write).
    fn origin(&self) -> &Origin;

    /// Encode and send a complete message.
    fn write_message(&self, message: &Message) -> Result<(), GelfError>;

    /// Close the transport. Later calls fail with [`GelfError::Closed`].
    fn close(&self);

    /// Send raw text as a message.
    ///
    /// The first line becomes the short message and, for multi-line input,
    /// the whole text becomes the full message. The calling source file and
    /// line are attached as `_file` and `_line`. Returns the input length.
    #[track_caller]
    fn write(&self, raw: &[u8]) -> Result<usize, GelfError> {
        self.write_from(raw, Location::caller())
    }

    /// Send raw text as a message attributed to `location`.
    ///
    /// Wrappers that forward text on behalf of their own callers pass the
    /// location they captured.
    fn write_from(&self, raw: &[u8], location: &Location<'_>) -> Result<usize, GelfError> {
        let message = Message::from_raw(raw, self.origin()).with_location(location);
        self.write_message(&message)?;
        Ok(raw.len())
    }
}

/// Send raw text without a caller location.
pub(crate) fn write_unlocated<W: GelfWriter + ?Sized>(
    writer: &W,
    raw: &[u8],
) -> Result<usize, GelfError> {
    writer.write_message(&Message::from_raw(raw, writer.origin()))?;
    Ok(raw.len())
}

/// Implement [`std::io::Write`] for a writer so it can back any API that logs
/// to an `io::Write` sink.
///
/// Text arriving this way carries no `_file` or `_line`, since the formatting
/// code between the caller and the sink hides the real call site.
macro_rules! impl_io_write {
    ($ty:ty) => {
        impl std::io::Write for $ty {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                $crate::writer::write_unlocated(&*self, buf).map_err(std::io::Error::from)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl std::io::Write for &$ty {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                $crate::writer::write_unlocated(*self, buf).map_err(std::io::Error::from)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
    };
}

pub(crate) use impl_io_write;
