//! Builder for [`UdpWriter`](crate::udp::UdpWriter).

use crate::{
    compression::{CompressionType, MAX_COMPRESSION_LEVEL},
    udp::{UdpWriter, UdpWriterConfig},
};

use super::{BuildError, OriginOverrides, WriterBuilder, ensure_positive, option_setter, require_host};

/// Builder for constructing [`UdpWriter`] instances.
#[derive(Clone, Debug, Default)]
pub struct UdpWriterBuilder {
    destination: Option<(String, u16)>,
    compression: Option<CompressionType>,
    compression_level: Option<u32>,
    origin: OriginOverrides,
}

impl UdpWriterBuilder {
    /// Create a new builder with no destination configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send to the collector at `host:port`.
    pub fn with_destination(mut self, host: impl Into<String>, port: u16) -> Self {
        self.destination = Some((host.into(), port));
        self
    }

    option_setter!(
        #[doc = "Select the payload compression."]
        with_compression,
        compression,
        CompressionType
    );
    option_setter!(
        #[doc = "Set the compression level (0..=9)."]
        with_compression_level,
        compression_level,
        u32
    );

    /// Override the host reported in messages built from raw text.
    pub fn with_origin_host(mut self, host: impl Into<String>) -> Self {
        self.origin.host = Some(host.into());
        self
    }

    pub fn with_facility(mut self, facility: impl Into<String>) -> Self {
        self.origin.facility = Some(facility.into());
        self
    }

    fn validate(&self) -> Result<(&str, u16), BuildError> {
        let (host, port) = self.destination.as_ref().ok_or_else(|| {
            BuildError::InvalidConfig("udp writer requires a destination".into())
        })?;
        require_host(host, "udp host")?;
        ensure_positive!(*port, "udp port")?;
        if let Some(level) = self.compression_level
            && level > MAX_COMPRESSION_LEVEL
        {
            return Err(BuildError::InvalidConfig(format!(
                "compression_level must be at most {MAX_COMPRESSION_LEVEL}"
            )));
        }
        Ok((host, *port))
    }

    pub(crate) fn build_config(&self) -> Result<UdpWriterConfig, BuildError> {
        let (host, port) = self.validate()?;
        let mut config = UdpWriterConfig::default().with_destination(host, port);
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if let Some(level) = self.compression_level {
            config.compression_level = level;
        }
        self.origin.apply(&mut config.origin)?;
        Ok(config)
    }
}

impl WriterBuilder for UdpWriterBuilder {
    type Writer = UdpWriter;

    fn build_inner(&self) -> Result<Self::Writer, BuildError> {
        let config = self.build_config()?;
        Ok(UdpWriter::new(config)?)
    }
}
