// File: src/sip/response.rs
//! Local reply synthesis: the relay answering a request itself instead of
//! forwarding it.

use crate::sip::message::{HeaderKind, SipMessage};
use crate::sip::rewrite::complete_rport;
use std::net::SocketAddr;

/// Builds a local reply from the inbound request: the first line becomes
/// `SIP/2.0 <status>`; the To/t line gains `;tag=123456` only when no tag
/// parameter is present; every via line gets the same rport/received
/// completion as forwarding does (no new via is stacked, the relay is
/// replying, not proxying); the Content-Length/l value is zeroed. Header
/// processing stops at the first blank line so any body is discarded, and
/// a trailing blank line terminates the message.
pub fn build_local_response(msg: &SipMessage, status: &str, peer: SocketAddr) -> SipMessage {
    let mut lines = vec![format!("SIP/2.0 {}", status)];
    for line in msg.lines.iter().skip(1) {
        if line.is_empty() {
            lines.push(String::new());
            break;
        }
        if HeaderKind::To.matches(line) && !line.contains(";tag") {
            lines.push(format!("{};tag=123456", line));
        } else if HeaderKind::Via.matches(line) {
            lines.push(complete_rport(line, peer));
        } else if line.starts_with("Content-Length:") {
            lines.push("Content-Length: 0".to_string());
        } else if line.starts_with("l:") {
            lines.push("l: 0".to_string());
        } else {
            lines.push(line.clone());
        }
    }
    lines.push(String::new());
    SipMessage { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.5:5062".parse().unwrap()
    }

    #[test]
    fn substitutes_the_status_line_and_tags_the_to_header() {
        let msg = SipMessage::from_text(
            "REGISTER sip:relay SIP/2.0\r\nTo: <sip:alice@domain>\r\nContent-Length: 349\r\n\r\n",
        );
        let out = build_local_response(&msg, "200 V Poriadku", peer());
        assert_eq!(out.lines[0], "SIP/2.0 200 V Poriadku");
        assert_eq!(out.lines[1], "To: <sip:alice@domain>;tag=123456");
        assert_eq!(out.lines[2], "Content-Length: 0");
    }

    #[test]
    fn existing_dialog_tag_is_kept() {
        let msg = SipMessage::from_text(
            "BYE sip:relay SIP/2.0\r\nt: <sip:alice@domain>;tag=77\r\nl: 12\r\n\r\n",
        );
        let out = build_local_response(&msg, "200 V Poriadku", peer());
        assert_eq!(out.lines[1], "t: <sip:alice@domain>;tag=77");
        assert_eq!(out.lines[2], "l: 0");
    }

    #[test]
    fn completes_rport_on_via_without_stacking() {
        let msg = SipMessage::from_text(
            "OPTIONS sip:relay SIP/2.0\r\nVia: SIP/2.0/UDP 10.0.0.5:5062;branch=z9hG4bK1;rport\r\n\r\n",
        );
        let out = build_local_response(&msg, "200 V Poriadku", peer());
        assert_eq!(
            out.lines[1],
            "Via: SIP/2.0/UDP 10.0.0.5:5062;branch=z9hG4bK1;received=10.0.0.5;rport=5062"
        );
        // exactly one via line: replying never stacks a new one
        assert_eq!(out.lines.iter().filter(|l| l.starts_with("Via:")).count(), 1);
    }

    #[test]
    fn body_is_cut_at_the_blank_line() {
        let msg = SipMessage::from_text(
            "INVITE sip:bob@domain SIP/2.0\r\nTo: <sip:bob@domain>\r\n\r\nv=0\r\no=sdp payload\r\n",
        );
        let out = build_local_response(&msg, "480 Dočasne Nedostupné", peer());
        assert!(out.lines.iter().all(|l| !l.starts_with("v=0")));
        let text = String::from_utf8(out.to_bytes()).unwrap();
        assert!(text.ends_with("\r\n\r\n"));
    }
}
