//! Discovery datagrams.

use std::net::Ipv4Addr;

use crate::constants::Tag;
use crate::tags::wrap;

/// Returns `true` if the (possibly concatenated) datagram bytes contain a
/// `getServer` request.
pub fn is_server_request(datagrams: &[u8]) -> bool {
    let text = String::from_utf8_lossy(datagrams);
    Tag::GetServer.extract(&text).is_some()
}

/// Builds the `<serverIP>ip,0;ip,0</serverIP>` reply for the given
/// coordinator addresses, in order.
pub fn encode_server_reply(addresses: &[Ipv4Addr]) -> String {
    let list = addresses
        .iter()
        .map(|ip| format!("{ip},0"))
        .collect::<Vec<_>>()
        .join(";");
    wrap(Tag::ServerIp, list)
}

/// Parses a `serverIP` reply back into addresses (panel side).
pub fn parse_server_reply(message: &str) -> Option<Vec<Ipv4Addr>> {
    let list = Tag::ServerIp.extract(message)?;
    list.split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.split(',').next().and_then(|ip| ip.parse().ok()))
        .collect()
}
