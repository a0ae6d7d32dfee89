//! Writer-to-reader round trips through the public API.

use gelf_transport::{
    CompressionType, GelfWriter, Level, Message, TcpReader, UdpReader, WriterBuilder,
    tcp_builder_from_ini_str, udp_builder_from_ini_str,
};
use rstest::rstest;

mod test_utils;
use test_utils::{tcp_reader, udp_reader};

fn udp_ini(reader: &UdpReader, compression: CompressionType) -> String {
    let addr = reader.local_addr().expect("udp reader address");
    format!(
        "[udp]\nhost = {}\nport = {}\ncompression = {compression}\norigin_host = e2e-host\nfacility = e2e\n",
        addr.ip(),
        addr.port()
    )
}

fn tcp_ini(reader: &TcpReader) -> String {
    let addr = reader.local_addr().expect("tcp reader address");
    format!(
        "[tcp]\nhost = {}\nport = {}\nmax_reconnect = 1\nreconnect_delay_ms = 10\norigin_host = e2e-host\n",
        addr.ip(),
        addr.port()
    )
}

#[rstest]
#[case(CompressionType::Zlib)]
#[case(CompressionType::Gzip)]
#[case(CompressionType::None)]
fn udp_writer_from_ini_splits_lines(udp_reader: UdpReader, #[case] compression: CompressionType) {
    let writer = udp_builder_from_ini_str(&udp_ini(&udp_reader, compression))
        .expect("parse ini")
        .build()
        .expect("build writer");

    assert_eq!(writer.write(b"awesomesauce\nbananas").expect("write"), 20);
    let message = udp_reader.read_message().expect("read");
    assert_eq!(message.short, "awesomesauce");
    assert_eq!(message.full, "awesomesauce\nbananas");
    assert_eq!(message.host, "e2e-host");
    assert_eq!(message.facility, "e2e");
}

#[rstest]
fn tcp_writer_from_ini_drops_trailing_newline(tcp_reader: TcpReader) {
    let writer = tcp_builder_from_ini_str(&tcp_ini(&tcp_reader))
        .expect("parse ini")
        .build()
        .expect("build writer");

    writer.write(b"short\n").expect("write");
    let message = tcp_reader.read_message().expect("read");
    assert_eq!(message.short, "short");
    assert_eq!(message.full, "");
    assert_eq!(message.host, "e2e-host");
}

#[rstest]
fn both_transports_work_behind_the_trait(udp_reader: UdpReader, tcp_reader: TcpReader) {
    let writers: Vec<Box<dyn GelfWriter>> = vec![
        udp_builder_from_ini_str(&udp_ini(&udp_reader, CompressionType::Gzip))
            .expect("udp ini")
            .build()
            .expect("udp writer"),
        tcp_builder_from_ini_str(&tcp_ini(&tcp_reader))
            .expect("tcp ini")
            .build()
            .expect("tcp writer"),
    ];

    let message = Message::new("trait-host", "disk almost full")
        .with_full("disk almost full\n/var is at 97%")
        .with_level(Level::Warning)
        .with_extra("_mount", "/var")
        .with_extra("_percent", 97_i64);
    for writer in &writers {
        writer.write_message(&message).expect("write message");
    }

    for received in [
        udp_reader.read_message().expect("udp read"),
        tcp_reader.read_message().expect("tcp read"),
    ] {
        assert_eq!(received.short, message.short);
        assert_eq!(received.full, message.full);
        assert_eq!(received.severity(), Some(Level::Warning));
        assert_eq!(received.extra["_mount"].as_str(), Some("/var"));
        assert_eq!(received.extra["_percent"].as_f64(), Some(97.0));
    }

    for writer in &writers {
        writer.close();
        assert!(writer.write(b"after close").is_err());
    }
}
