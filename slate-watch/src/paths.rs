use std::net::{Ipv4Addr, SocketAddr};

/// Event name broadcast to reload clients after every sync/unsync.
pub const RELOAD_EVENT: &str = "refresh";

pub const EVENTS_PATH: &str = "/events";
pub const CLIENT_SCRIPT_PATH: &str = "/client.js";

/// The reload endpoint only listens on loopback.
pub fn reload_addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

pub fn events_url(addr: SocketAddr) -> String {
    format!("http://{addr}{EVENTS_PATH}")
}

pub fn client_script_url(addr: SocketAddr) -> String {
    format!("http://{addr}{CLIENT_SCRIPT_PATH}")
}
