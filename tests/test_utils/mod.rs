pub mod fixtures;

pub use fixtures::{tcp_reader, udp_reader};
