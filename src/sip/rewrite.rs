// File: src/sip/rewrite.rs
//! Pure header transformations over [`SipMessage`]. Nothing here touches
//! the registrar, the tracker or the network.

use crate::sip::message::{sip_uri, HeaderKind, SipMessage};
use std::net::SocketAddr;

/// Pushes the relay's own via entry above every via line that carries a
/// branch parameter (the branch is suffixed with an `m` loop-detection
/// marker), then annotates the original line with the observed source
/// address: a requested `rport` becomes `received=<ip>;rport=<port>`,
/// otherwise `;received=<ip>` is appended. This is the stateless-proxy
/// via stacking that keeps responses routable back through the relay.
pub fn insert_top_via(msg: &SipMessage, own_via: &str, peer: SocketAddr) -> SipMessage {
    let mut lines = Vec::with_capacity(msg.lines.len() + 1);
    for line in &msg.lines {
        if HeaderKind::Via.matches(line) {
            if let Some(branch) = branch_of(line) {
                lines.push(format!("{};branch={}m", own_via, branch));
            }
            lines.push(complete_rport(line, peer));
        } else {
            lines.push(line.clone());
        }
    }
    SipMessage { lines }
}

/// Drops the via line(s) this relay pushed, identified by its own via
/// prefix, when unwinding the stack on a relayed response.
pub fn remove_top_via(msg: &SipMessage, own_via: &str) -> SipMessage {
    SipMessage {
        lines: msg
            .lines
            .iter()
            .filter(|line| !(HeaderKind::Via.matches(line) && line.starts_with(own_via)))
            .cloned()
            .collect(),
    }
}

/// Drops every Route line before forwarding.
pub fn remove_route_headers(msg: &SipMessage) -> SipMessage {
    SipMessage {
        lines: msg
            .lines
            .iter()
            .filter(|line| !HeaderKind::Route.matches(line))
            .cloned()
            .collect(),
    }
}

/// Inserts the relay's Record-Route line as the second line of the
/// message, unconditionally, on every forwarded request.
pub fn insert_record_route(msg: &SipMessage, record_route: &str) -> SipMessage {
    let mut lines = msg.lines.clone();
    let at = 1.min(lines.len());
    lines.insert(at, record_route.to_string());
    SipMessage { lines }
}

/// `user@host` identity from the From/f header, or None if absent or
/// unparseable.
pub fn origin(msg: &SipMessage) -> Option<String> {
    identity(msg, HeaderKind::From)
}

/// `user@host` identity from the To/t header.
pub fn destination(msg: &SipMessage) -> Option<String> {
    identity(msg, HeaderKind::To)
}

fn identity(msg: &SipMessage, kind: HeaderKind) -> Option<String> {
    let line = msg.header_line(kind)?;
    sip_uri(line).map(|(user, host)| format!("{}@{}", user, host))
}

/// Value of the `;branch=` parameter, up to the next `;`.
pub fn branch_of(via_line: &str) -> Option<&str> {
    let start = via_line.find(";branch=")? + ";branch=".len();
    let rest = &via_line[start..];
    let end = rest.find(';').unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Value of an `expires=` parameter on a Contact line, up to `;` or `$`.
pub fn contact_expires(contact_line: &str) -> Option<&str> {
    let start = contact_line.find("expires=")? + "expires=".len();
    let rest = &contact_line[start..];
    let end = rest.find(|c| matches!(c, ';' | '$')).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Value of a message-level `Expires: ` header.
pub fn expires_header(msg: &SipMessage) -> Option<&str> {
    msg.lines
        .iter()
        .find_map(|line| line.strip_prefix("Expires: "))
}

/// True when the via line asks for symmetric response routing (`;rport`
/// at end of line or followed by another parameter).
pub fn wants_rport(via_line: &str) -> bool {
    via_line.ends_with(";rport") || via_line.contains(";rport;")
}

/// Fills in the rport/received annotation on a via line from the peer's
/// observed source address. Shared between via stacking and local
/// response synthesis.
pub fn complete_rport(via_line: &str, peer: SocketAddr) -> String {
    if wants_rport(via_line) {
        let received = format!("received={};rport={}", peer.ip(), peer.port());
        via_line.replacen("rport", &received, 1)
    } else {
        format!("{};received={}", via_line, peer.ip())
    }
}
