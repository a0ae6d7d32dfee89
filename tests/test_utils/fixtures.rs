//! Loopback readers shared by the integration tests.

use std::time::Duration;

use gelf_transport::{TcpReader, UdpReader, tcp::TcpReaderConfig};
use rstest::fixture;

pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

#[fixture]
pub fn udp_reader() -> UdpReader {
    let reader = UdpReader::bind("127.0.0.1:0").expect("bind udp reader");
    reader
        .set_read_timeout(Some(READ_TIMEOUT))
        .expect("set read timeout");
    reader
}

#[fixture]
pub fn tcp_reader() -> TcpReader {
    TcpReader::bind_with_config(
        "127.0.0.1:0",
        TcpReaderConfig {
            read_timeout: Some(READ_TIMEOUT),
            ..TcpReaderConfig::default()
        },
    )
    .expect("bind tcp reader")
}
