// File: src/sip/message.rs
use crate::error::RelayError;

/// The header families the relay recognizes, by long name or single-letter
/// compact alias. Matching is case-sensitive and anchored at line start,
/// exactly the set of accepted patterns of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    From,
    To,
    Contact,
    Via,
    Route,
    ContentLength,
}

impl HeaderKind {
    fn prefixes(self) -> (&'static str, Option<&'static str>) {
        match self {
            HeaderKind::From => ("From:", Some("f:")),
            HeaderKind::To => ("To:", Some("t:")),
            HeaderKind::Contact => ("Contact:", Some("m:")),
            HeaderKind::Via => ("Via:", Some("v:")),
            HeaderKind::Route => ("Route:", None),
            HeaderKind::ContentLength => ("Content-Length:", Some("l:")),
        }
    }

    pub fn matches(self, line: &str) -> bool {
        let (long, compact) = self.prefixes();
        line.starts_with(long) || compact.map_or(false, |c| line.starts_with(c))
    }
}

/// A parsed datagram: the ordered line sequence of a request or response.
/// Line order is semantically significant (via stack, route set) and is
/// preserved verbatim; rewrites build a new message rather than reordering
/// in place. A message lives for one datagram and is then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMessage {
    pub lines: Vec<String>,
}

impl SipMessage {
    /// Decodes a raw datagram. The only decode failure is invalid UTF-8;
    /// structural validation happens at dispatch time.
    pub fn parse(raw: &[u8]) -> Result<Self, RelayError> {
        let text = std::str::from_utf8(raw)?;
        Ok(Self::from_text(text))
    }

    /// Splits on CRLF keeping empty segments, so a re-join reproduces the
    /// datagram byte for byte, trailing blank line included.
    pub fn from_text(text: &str) -> Self {
        SipMessage {
            lines: text.split("\r\n").map(String::from).collect(),
        }
    }

    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    /// First line matching the given header kind, in message order.
    pub fn header_line(&self, kind: HeaderKind) -> Option<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .find(|line| kind.matches(line))
    }

    /// The method of a `METHOD sip:target SIP/2.0` request line, or None
    /// for responses and anything malformed.
    pub fn method(&self) -> Option<&str> {
        let (method, rest) = self.first_line().split_once(' ')?;
        let (uri, protocol) = rest.split_once(' ')?;
        if uri.starts_with("sip:") && protocol.starts_with("SIP/2.0") {
            Some(method)
        } else {
            None
        }
    }

    pub fn is_status(&self) -> bool {
        self.first_line().starts_with("SIP/2.0 ")
    }

    /// Numeric code of a `SIP/2.0 code reason` status line.
    pub fn status_code(&self) -> Option<u16> {
        self.first_line()
            .strip_prefix("SIP/2.0 ")?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    /// Call-ID header value (long form or compact `i:`), the token that
    /// correlates every message of one session attempt.
    pub fn call_id(&self) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            line.strip_prefix("Call-ID:")
                .or_else(|| line.strip_prefix("i:"))
                .map(str::trim)
        })
    }

    /// Method component of the CSeq header, used to tell INVITE replies
    /// apart from other replies.
    pub fn cseq_method(&self) -> Option<&str> {
        self.lines
            .iter()
            .find_map(|line| line.strip_prefix("CSeq:"))
            .and_then(|value| value.split_whitespace().nth(1))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.lines.join("\r\n").into_bytes()
    }
}

/// Extracts `(user, hostport)` from the first `sip:user@hostport` pattern
/// in the line. The hostport runs until `;`, `>` or `$`.
pub fn sip_uri(line: &str) -> Option<(&str, &str)> {
    let start = line.find("sip:")? + "sip:".len();
    let rest = &line[start..];
    let at = rest.find('@')?;
    let user = &rest[..at];
    let host = &rest[at + 1..];
    let end = host
        .find(|c| matches!(c, ';' | '>' | '$'))
        .unwrap_or(host.len());
    Some((user, &host[..end]))
}

/// Extracts a bare `sip:hostport` target (no user part), as found in
/// Contact headers of endpoints registering a plain address. Runs until
/// space, `;`, `>` or `$`.
pub fn bare_sip_addr(line: &str) -> Option<&str> {
    let start = line.find("sip:")? + "sip:".len();
    let rest = &line[start..];
    let end = rest
        .find(|c| matches!(c, ' ' | ';' | '>' | '$'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTER: &str = "REGISTER sip:relay SIP/2.0\r\nVia: SIP/2.0/UDP 10.0.0.5:5060;branch=z9hG4bK1\r\nt: <sip:alice@domain>\r\nf: <sip:alice@domain>\r\nCall-ID: reg-1\r\nCSeq: 1 REGISTER\r\nm: <sip:10.0.0.5:5060>;expires=3600\r\nl: 0\r\n\r\n";

    #[test]
    fn parses_request_line_and_compact_headers() {
        let msg = SipMessage::from_text(REGISTER);
        assert_eq!(msg.method(), Some("REGISTER"));
        assert!(!msg.is_status());
        assert_eq!(msg.header_line(HeaderKind::To), Some("t: <sip:alice@domain>"));
        assert_eq!(msg.header_line(HeaderKind::Contact), Some("m: <sip:10.0.0.5:5060>;expires=3600"));
        assert_eq!(msg.header_line(HeaderKind::ContentLength), Some("l: 0"));
        assert_eq!(msg.call_id(), Some("reg-1"));
        assert_eq!(msg.cseq_method(), Some("REGISTER"));
    }

    #[test]
    fn status_line_detection() {
        let msg = SipMessage::from_text("SIP/2.0 200 OK\r\nCSeq: 1 INVITE\r\n\r\n");
        assert!(msg.is_status());
        assert_eq!(msg.status_code(), Some(200));
        assert_eq!(msg.method(), None);
        assert_eq!(msg.cseq_method(), Some("INVITE"));
    }

    #[test]
    fn header_matching_is_case_sensitive() {
        let msg = SipMessage::from_text("OPTIONS sip:x SIP/2.0\r\nFROM: <sip:a@b>\r\n\r\n");
        assert_eq!(msg.header_line(HeaderKind::From), None);
    }

    #[test]
    fn uri_extraction() {
        assert_eq!(
            sip_uri("To: <sip:bob@domain;user=phone>"),
            Some(("bob", "domain"))
        );
        assert_eq!(sip_uri("Contact: <sip:10.0.0.5:5060>"), None);
        assert_eq!(
            bare_sip_addr("Contact: <sip:10.0.0.5:5060>;expires=60"),
            Some("10.0.0.5:5060")
        );
    }

    #[test]
    fn round_trips_the_datagram_verbatim() {
        let msg = SipMessage::parse(REGISTER.as_bytes()).unwrap();
        assert_eq!(msg.to_bytes(), REGISTER.as_bytes());
    }

    #[test]
    fn rejects_non_utf8() {
        assert!(SipMessage::parse(&[0xff, 0xfe, 0x00]).is_err());
    }
}
