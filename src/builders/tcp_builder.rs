//! Builder for [`TcpWriter`](crate::tcp::TcpWriter).
//!
//! Exposes the destination, TLS, timeouts, and the redial budget.

use std::time::Duration;

use crate::tcp::{ReconnectPolicy, TcpTransport, TcpWriter, TcpWriterConfig, TlsOptions};

use super::{
    BuildError, OriginOverrides, WriterBuilder, ensure_positive, option_setter, require_host,
};

#[derive(Clone, Debug)]
struct Destination {
    host: String,
    port: u16,
}

#[derive(Clone, Debug, Default)]
struct TlsConfig {
    domain: Option<String>,
    insecure: bool,
}

/// Builder for constructing [`TcpWriter`] instances.
#[derive(Clone, Debug, Default)]
pub struct TcpWriterBuilder {
    destination: Option<Destination>,
    tls: Option<TlsConfig>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    max_reconnect: Option<u32>,
    reconnect_delay_ms: Option<u64>,
    origin: OriginOverrides,
}

impl TcpWriterBuilder {
    /// Create a new builder with no destination configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send to the collector at `host:port`.
    pub fn with_destination(mut self, host: impl Into<String>, port: u16) -> Self {
        self.destination = Some(Destination {
            host: host.into(),
            port,
        });
        self
    }

    /// Enable TLS. The domain defaults to the destination host.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        self.tls = Some(TlsConfig { domain, insecure });
        self
    }

    /// Override the host reported in messages built from raw text.
    pub fn with_origin_host(mut self, host: impl Into<String>) -> Self {
        self.origin.host = Some(host.into());
        self
    }

    pub fn with_facility(mut self, facility: impl Into<String>) -> Self {
        self.origin.facility = Some(facility.into());
        self
    }

    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(
        #[doc = "Set how many redials follow a failed write. Zero disables redialing."]
        with_max_reconnect,
        max_reconnect,
        u32
    );
    option_setter!(
        #[doc = "Set the pause before each redial."]
        with_reconnect_delay_ms,
        reconnect_delay_ms,
        u64
    );

    /// Build a writer and dial it immediately.
    pub fn connect(&self) -> Result<TcpWriter, BuildError> {
        let config = self.build_config()?;
        Ok(TcpWriter::connect(config)?)
    }

    fn validate(&self) -> Result<&Destination, BuildError> {
        let destination = self.destination.as_ref().ok_or_else(|| {
            BuildError::InvalidConfig("tcp writer requires a destination".into())
        })?;
        require_host(&destination.host, "tcp host")?;
        ensure_positive!(destination.port, "tcp port")?;
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        Ok(destination)
    }

    pub(crate) fn build_config(&self) -> Result<TcpWriterConfig, BuildError> {
        let destination = self.validate()?;
        let mut config = TcpWriterConfig::default().with_transport(TcpTransport {
            host: destination.host.clone(),
            port: destination.port,
            tls: self.build_tls_options(&destination.host),
        });
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
        config.write_timeout = self.write_timeout_ms.map(Duration::from_millis);
        self.apply_reconnect(&mut config.reconnect);
        self.origin.apply(&mut config.origin)?;
        Ok(config)
    }

    fn apply_reconnect(&self, policy: &mut ReconnectPolicy) {
        if let Some(max) = self.max_reconnect {
            policy.max_reconnect = max;
        }
        if let Some(delay) = self.reconnect_delay_ms {
            policy.reconnect_delay = Duration::from_millis(delay);
        }
    }

    fn build_tls_options(&self, host: &str) -> Option<TlsOptions> {
        self.tls.as_ref().map(|tls_cfg| {
            let domain = tls_cfg
                .domain
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| host.to_owned());
            TlsOptions {
                domain,
                insecure_skip_verify: tls_cfg.insecure,
            }
        })
    }
}

impl WriterBuilder for TcpWriterBuilder {
    type Writer = TcpWriter;

    /// Build a lazily connecting writer; the first write dials.
    fn build_inner(&self) -> Result<Self::Writer, BuildError> {
        let config = self.build_config()?;
        Ok(TcpWriter::new(config))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::tcp::{ConnectionState, DEFAULT_MAX_RECONNECT};

    #[rstest]
    fn builder_requires_destination() {
        let err = TcpWriterBuilder::new()
            .build_inner()
            .expect_err("destination must be required");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("destination")));
    }

    #[rstest]
    #[case("", 12201, "tcp host")]
    #[case("   ", 12201, "tcp host")]
    #[case("127.0.0.1", 0, "tcp port")]
    fn builder_rejects_bad_destination(
        #[case] host: &str,
        #[case] port: u16,
        #[case] field: &str,
    ) {
        let err = TcpWriterBuilder::new()
            .with_destination(host, port)
            .build_inner()
            .expect_err("invalid destination");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains(field)));
    }

    #[rstest]
    fn builder_rejects_zero_timeouts() {
        let err = TcpWriterBuilder::new()
            .with_destination("127.0.0.1", 12201)
            .with_connect_timeout_ms(0)
            .build_inner()
            .expect_err("zero timeout must fail");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains("connect_timeout_ms")));
    }

    #[rstest]
    fn builder_applies_overrides() {
        let config = TcpWriterBuilder::new()
            .with_destination("graylog.internal", 12202)
            .with_tls(None, true)
            .with_connect_timeout_ms(250)
            .with_write_timeout_ms(500)
            .with_max_reconnect(0)
            .with_reconnect_delay_ms(20)
            .with_origin_host("web-1")
            .with_facility("checkout")
            .build_config()
            .expect("valid config");

        assert_eq!(config.transport.host, "graylog.internal");
        assert_eq!(config.transport.port, 12202);
        let tls = config.transport.tls.expect("tls enabled");
        assert_eq!(tls.domain, "graylog.internal");
        assert!(tls.insecure_skip_verify);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.write_timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.reconnect.max_reconnect, 0);
        assert_eq!(config.reconnect.reconnect_delay, Duration::from_millis(20));
        assert_eq!(config.origin.host, "web-1");
        assert_eq!(config.origin.facility, "checkout");
    }

    #[rstest]
    fn builder_keeps_defaults() {
        let writer = TcpWriterBuilder::new()
            .with_destination("127.0.0.1", 12201)
            .build_inner()
            .expect("build writer");
        assert_eq!(writer.config().reconnect.max_reconnect, DEFAULT_MAX_RECONNECT);
        assert_eq!(writer.config().write_timeout, None);
        assert!(writer.config().transport.tls.is_none());
        assert_eq!(writer.state(), ConnectionState::Disconnected);
    }
}
