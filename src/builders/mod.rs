//! Fluent builders for the GELF writers.
//!
//! Each builder collects optional overrides, validates them, and fills in the
//! remaining fields from the matching config's defaults. Builders implement
//! [`WriterBuilder`] so a caller can construct either transport behind a
//! boxed [`GelfWriter`].

use std::io;

use thiserror::Error;

use crate::{error::GelfError, writer::GelfWriter};

mod tcp_builder;
mod udp_builder;

pub use tcp_builder::TcpWriterBuilder;
pub use udp_builder::UdpWriterBuilder;

/// Errors that may occur while building a writer.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid writer configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst creating the writer.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The writer itself rejected the configuration.
    #[error(transparent)]
    Writer(GelfError),
}

impl From<GelfError> for BuildError {
    fn from(err: GelfError) -> Self {
        match err {
            GelfError::Io(err) => BuildError::Io(err),
            other => BuildError::Writer(other),
        }
    }
}

/// Trait implemented by all writer builders.
pub trait WriterBuilder: Send + Sync {
    /// Concrete writer produced by the builder.
    type Writer: GelfWriter + 'static;

    /// Build the concrete writer.
    fn build_inner(&self) -> Result<Self::Writer, BuildError>;

    /// Build the writer behind a trait object.
    fn build(&self) -> Result<Box<dyn GelfWriter>, BuildError> {
        Ok(Box::new(self.build_inner()?))
    }
}

/// Validate that a value is greater than zero, returning an error otherwise.
macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err($crate::builders::BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

pub(crate) use ensure_positive;

/// Generate a consuming setter storing `Some(value)` in an optional field.
macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

pub(crate) use option_setter;

/// Reject blank host names.
fn require_host(host: &str, field: &str) -> Result<(), BuildError> {
    if host.trim().is_empty() {
        Err(BuildError::InvalidConfig(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// Optional source identity shared by both builders.
#[derive(Clone, Debug, Default)]
struct OriginOverrides {
    host: Option<String>,
    facility: Option<String>,
}

impl OriginOverrides {
    fn apply(&self, origin: &mut crate::message::Origin) -> Result<(), BuildError> {
        if let Some(host) = &self.host {
            require_host(host, "origin host")?;
            origin.host = host.clone();
        }
        if let Some(facility) = &self.facility {
            origin.facility = facility.clone();
        }
        Ok(())
    }
}
