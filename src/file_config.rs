//! INI configuration for the writer builders.
//!
//! A `[tcp]` section feeds a [`TcpWriterBuilder`] and a `[udp]` section feeds
//! a [`UdpWriterBuilder`]. Keys mirror the builder setters:
//!
//! ```ini
//! [tcp]
//! host = graylog.internal
//! port = 12201
//! tls = true
//! tls_domain = graylog.internal
//! tls_insecure = false
//! connect_timeout_ms = 5000
//! write_timeout_ms = 2000
//! max_reconnect = 3
//! reconnect_delay_ms = 1000
//! origin_host = web-1
//! facility = checkout
//!
//! [udp]
//! host = graylog.internal
//! port = 12201
//! compression = zlib
//! compression_level = 6
//! ```
//!
//! Validation of the values themselves happens when the builder builds.

use std::{
    fs,
    io::{self, ErrorKind},
    path::Path,
    str::FromStr,
};

use ini::{Ini, Properties};
use log::warn;
use thiserror::Error;

use crate::{
    builders::{TcpWriterBuilder, UdpWriterBuilder},
    compression::CompressionType,
};

const TCP_SECTION: &str = "tcp";
const UDP_SECTION: &str = "udp";

const TCP_KEYS: &[&str] = &[
    "host",
    "port",
    "tls",
    "tls_domain",
    "tls_insecure",
    "connect_timeout_ms",
    "write_timeout_ms",
    "max_reconnect",
    "reconnect_delay_ms",
    "origin_host",
    "facility",
];
const UDP_KEYS: &[&str] = &[
    "host",
    "port",
    "compression",
    "compression_level",
    "origin_host",
    "facility",
];

/// Errors raised while loading writer configuration from INI.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path} doesn't exist")]
    NotFound { path: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{path} is an empty file")]
    Empty { path: String },
    #[error("invalid ini: {0}")]
    Parse(String),
    #[error("missing [{0}] section")]
    MissingSection(&'static str),
    #[error("[{section}] is missing `{key}`")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
    #[error("[{section}] `{key}` has invalid value {value:?}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Load a [`TcpWriterBuilder`] from the `[tcp]` section of an INI file.
pub fn tcp_builder_from_ini(path: impl AsRef<Path>) -> Result<TcpWriterBuilder, ConfigError> {
    tcp_builder_from_ini_str(&read_file(path.as_ref())?)
}

/// Load a [`UdpWriterBuilder`] from the `[udp]` section of an INI file.
pub fn udp_builder_from_ini(path: impl AsRef<Path>) -> Result<UdpWriterBuilder, ConfigError> {
    udp_builder_from_ini_str(&read_file(path.as_ref())?)
}

pub fn tcp_builder_from_ini_str(text: &str) -> Result<TcpWriterBuilder, ConfigError> {
    let ini = parse(text)?;
    let section = Section::find(&ini, TCP_SECTION, TCP_KEYS)?;

    let mut builder =
        TcpWriterBuilder::new().with_destination(section.required("host")?, section.port()?);
    let tls_domain = section.optional("tls_domain").map(str::to_owned);
    let tls_insecure = section.parse::<Flag>("tls_insecure")?.is_some_and(|f| f.0);
    let tls = section.parse::<Flag>("tls")?.map(|f| f.0);
    if tls.unwrap_or(tls_domain.is_some() || tls_insecure) {
        builder = builder.with_tls(tls_domain, tls_insecure);
    }
    if let Some(timeout) = section.parse("connect_timeout_ms")? {
        builder = builder.with_connect_timeout_ms(timeout);
    }
    if let Some(timeout) = section.parse("write_timeout_ms")? {
        builder = builder.with_write_timeout_ms(timeout);
    }
    if let Some(max) = section.parse("max_reconnect")? {
        builder = builder.with_max_reconnect(max);
    }
    if let Some(delay) = section.parse("reconnect_delay_ms")? {
        builder = builder.with_reconnect_delay_ms(delay);
    }
    if let Some(host) = section.optional("origin_host") {
        builder = builder.with_origin_host(host);
    }
    if let Some(facility) = section.optional("facility") {
        builder = builder.with_facility(facility);
    }
    Ok(builder)
}

pub fn udp_builder_from_ini_str(text: &str) -> Result<UdpWriterBuilder, ConfigError> {
    let ini = parse(text)?;
    let section = Section::find(&ini, UDP_SECTION, UDP_KEYS)?;

    let mut builder =
        UdpWriterBuilder::new().with_destination(section.required("host")?, section.port()?);
    if let Some(compression) = section.parse::<CompressionType>("compression")? {
        builder = builder.with_compression(compression);
    }
    if let Some(level) = section.parse("compression_level")? {
        builder = builder.with_compression_level(level);
    }
    if let Some(host) = section.optional("origin_host") {
        builder = builder.with_origin_host(host);
    }
    if let Some(facility) = section.optional("facility") {
        builder = builder.with_facility(facility);
    }
    Ok(builder)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::NotFound {
            path: display.clone(),
        },
        _ => ConfigError::Read {
            path: display.clone(),
            source: err,
        },
    })?;
    if text.trim().is_empty() {
        return Err(ConfigError::Empty { path: display });
    }
    Ok(text)
}

fn parse(text: &str) -> Result<Ini, ConfigError> {
    Ini::load_from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Boolean accepting the spellings INI files commonly use.
struct Flag(bool);

impl FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Flag(true)),
            "0" | "false" | "no" | "off" => Ok(Flag(false)),
            _ => Err(()),
        }
    }
}

struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn find(ini: &'a Ini, name: &'static str, known: &[&str]) -> Result<Self, ConfigError> {
        let props = ini
            .section(Some(name))
            .ok_or(ConfigError::MissingSection(name))?;
        for (key, _) in props.iter() {
            if !known.contains(&key) {
                warn!("ignoring unknown key `{key}` in [{name}]");
            }
        }
        Ok(Self { name, props })
    }

    fn optional(&self, key: &str) -> Option<&'a str> {
        self.props.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<&'a str, ConfigError> {
        self.optional(key).ok_or(ConfigError::MissingKey {
            section: self.name,
            key,
        })
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| {
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    section: self.name,
                    key,
                    value: value.to_owned(),
                })
            })
            .transpose()
    }

    fn port(&self) -> Result<u16, ConfigError> {
        self.parse("port")?.ok_or(ConfigError::MissingKey {
            section: self.name,
            key: "port",
        })
    }
}
