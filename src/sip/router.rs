// File: src/sip/router.rs
//! Method dispatch: one inbound datagram in, at most one outbound
//! datagram and a handful of audit events out. Owns the registrar and the
//! call tracker; the transport adapter performs the actual sends.

use crate::sip::call_tracker::{CallEvent, CallTracker};
use crate::sip::message::{bare_sip_addr, sip_uri, HeaderKind, SipMessage};
use crate::sip::registrar::Registrar;
use crate::sip::response::build_local_response;
use crate::sip::rewrite;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn, Span};

pub const OK: &str = "200 V Poriadku";
pub const BAD_REQUEST: &str = "400 Zlá Požiadavka";
pub const NOT_ACCEPTABLE: &str = "406 Neakceptovateľné";
pub const UNAVAILABLE: &str = "480 Dočasne Nedostupné";
pub const SERVER_ERROR: &str = "500 Interná Chyba Servera";

/// A datagram for the transport adapter to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub dest: SocketAddr,
    pub payload: Vec<u8>,
}

/// One call-log line, keyed by call id; the audit sink adds the
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub call_id: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RouterOutput {
    pub outbound: Option<Outbound>,
    pub events: Vec<AuditEvent>,
}

impl RouterOutput {
    fn empty() -> Self {
        Self::default()
    }

    fn reply(msg: &SipMessage, status: &str, src: SocketAddr) -> Self {
        RouterOutput {
            outbound: Some(Outbound {
                dest: src,
                payload: build_local_response(msg, status, src).to_bytes(),
            }),
            events: Vec::new(),
        }
    }
}

pub struct Router {
    registrar: Registrar,
    calls: CallTracker,
    /// `Via: SIP/2.0/UDP ip:port` for this relay, fixed at startup.
    own_via: String,
    /// `Record-Route: <sip:ip:port;lr>` for this relay, fixed at startup.
    record_route: String,
}

impl Router {
    pub fn new(own_via: String, record_route: String) -> Self {
        Router {
            registrar: Registrar::new(),
            calls: CallTracker::new(),
            own_via,
            record_route,
        }
    }

    pub fn handle(&mut self, raw: &[u8], src: SocketAddr) -> RouterOutput {
        self.handle_at(raw, src, unix_now())
    }

    /// Full dispatch with an explicit clock, one call per datagram.
    #[instrument(level = "debug", skip_all, fields(source = %src, method, call_id))]
    pub fn handle_at(&mut self, raw: &[u8], src: SocketAddr, now: u64) -> RouterOutput {
        let msg = match SipMessage::parse(raw) {
            Ok(msg) => msg,
            Err(_) => {
                debug!("dropping non-UTF-8 datagram");
                return RouterOutput::empty();
            }
        };
        if let Some(id) = msg.call_id() {
            Span::current().record("call_id", id);
        }

        if let Some(method) = msg.method() {
            Span::current().record("method", method);
            match method {
                "REGISTER" => self.on_register(&msg, src, now),
                "INVITE" => self.on_invite(&msg, src, now),
                "ACK" => self.on_ack(&msg, src),
                "BYE" => self.on_bye(&msg, src, now),
                "CANCEL" => self.on_cancel(&msg, src, now),
                "OPTIONS" | "INFO" | "MESSAGE" | "REFER" | "PRACK" | "UPDATE" => {
                    self.on_non_invite(&msg, src, now)
                }
                "SUBSCRIBE" | "PUBLISH" | "NOTIFY" => RouterOutput::reply(&msg, OK, src),
                other => {
                    debug!(method = other, "unknown method, dropping");
                    RouterOutput::empty()
                }
            }
        } else if msg.is_status() {
            self.on_response(&msg)
        } else {
            debug!("first line matches neither request nor status pattern, dropping");
            RouterOutput::empty()
        }
    }

    /// Registration: the address-of-record comes from the To header, the
    /// contact target and its `expires=` parameter from Contact, with a
    /// message-level Expires header as fallback. Always answers 200.
    ///
    /// Note the asymmetry with the origin checks below, which key off
    /// From: a client that registers one identity and originates as
    /// another will be rejected as unregistered.
    fn on_register(&mut self, msg: &SipMessage, src: SocketAddr, now: u64) -> RouterOutput {
        let aor = rewrite::destination(msg).unwrap_or_default();

        let mut contact = String::new();
        let mut contact_expires: Option<&str> = None;
        for line in &msg.lines {
            if HeaderKind::Contact.matches(line) {
                if let Some((_, host)) = sip_uri(line) {
                    contact = host.to_string();
                } else if let Some(addr) = bare_sip_addr(line) {
                    contact = addr.to_string();
                }
                if let Some(value) = rewrite::contact_expires(line) {
                    contact_expires = Some(value);
                }
            }
        }

        // the contact parameter takes precedence over the Expires header
        let ttl_str = contact_expires.or_else(|| rewrite::expires_header(msg));
        let ttl = match ttl_str {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ttl) => ttl,
                Err(_) => {
                    warn!(value, "unparseable expiry on REGISTER, dropping");
                    return RouterOutput::empty();
                }
            },
            None => 0,
        };

        let was_registered = self.registrar.upsert(&aor, &contact, ttl, src, now);
        if ttl == 0 {
            info!(aor = %aor, was_registered, "deregistration");
        } else {
            info!(aor = %aor, contact = %contact, ttl, "registration stored");
        }
        RouterOutput::reply(msg, OK, src)
    }

    fn on_invite(&mut self, msg: &SipMessage, src: SocketAddr, now: u64) -> RouterOutput {
        let mut events = Vec::new();
        let call_id = msg.call_id().map(str::to_string);

        if let Some(id) = &call_id {
            if self.calls.on_invite(id) {
                events.push(AuditEvent {
                    call_id: id.clone(),
                    message: format!(
                        "INVITE from {} to {}",
                        rewrite::origin(msg).unwrap_or_default(),
                        rewrite::destination(msg).unwrap_or_default()
                    ),
                });
            }
        }

        let origin = rewrite::origin(msg).unwrap_or_default();
        if origin.is_empty() || !self.registrar.contains(&origin) {
            warn!(origin = %origin, "INVITE from unregistered origin");
            events.extend(self.local_error(call_id.as_deref(), msg, 400));
            let mut out = RouterOutput::reply(msg, BAD_REQUEST, src);
            out.events = events;
            return out;
        }

        let destination = rewrite::destination(msg).unwrap_or_default();
        if destination.is_empty() {
            events.extend(self.local_error(call_id.as_deref(), msg, 500));
            let mut out = RouterOutput::reply(msg, SERVER_ERROR, src);
            out.events = events;
            return out;
        }

        match self.registrar.lookup_valid(&destination, now).map(|b| b.addr) {
            Some(dest_addr) => {
                info!(destination = %destination, dest_addr = %dest_addr, "➡️ forwarding INVITE");
                RouterOutput {
                    outbound: Some(self.forward(msg, src, dest_addr)),
                    events,
                }
            }
            None => {
                info!(destination = %destination, "INVITE destination unregistered or expired");
                events.extend(self.local_error(call_id.as_deref(), msg, 480));
                let mut out = RouterOutput::reply(msg, UNAVAILABLE, src);
                out.events = events;
                out
            }
        }
    }

    /// ACK is best-effort: forward when the destination is present in the
    /// registrar (fresh or not, no origin check), otherwise drop without
    /// a reply — ACKs have no response in the protocol.
    fn on_ack(&mut self, msg: &SipMessage, src: SocketAddr) -> RouterOutput {
        let destination = rewrite::destination(msg).unwrap_or_default();
        if destination.is_empty() {
            return RouterOutput::empty();
        }
        match self.registrar.get(&destination).map(|b| b.addr) {
            Some(dest_addr) => RouterOutput {
                outbound: Some(self.forward(msg, src, dest_addr)),
                events: Vec::new(),
            },
            None => RouterOutput::empty(),
        }
    }

    /// BYE consults the tracker before the usual non-INVITE handling.
    fn on_bye(&mut self, msg: &SipMessage, src: SocketAddr, now: u64) -> RouterOutput {
        let mut events = Vec::new();
        if let Some(id) = msg.call_id() {
            if let Some(event) = self.calls.on_bye(id) {
                events.push(format_event(id, event, msg));
            }
        }
        let mut out = self.on_non_invite(msg, src, now);
        events.extend(out.events);
        out.events = events;
        out
    }

    /// CANCEL forwards like any non-INVITE, then marks the tracked call
    /// terminated (the 487 path).
    fn on_cancel(&mut self, msg: &SipMessage, src: SocketAddr, now: u64) -> RouterOutput {
        let mut out = self.on_non_invite(msg, src, now);
        if let Some(id) = msg.call_id() {
            if let Some(event) = self.calls.on_final_response(id, 487) {
                out.events.push(format_event(id, event, msg));
            }
        }
        out
    }

    fn on_non_invite(&mut self, msg: &SipMessage, src: SocketAddr, now: u64) -> RouterOutput {
        let origin = rewrite::origin(msg).unwrap_or_default();
        if origin.is_empty() || !self.registrar.contains(&origin) {
            warn!(origin = %origin, "request from unregistered origin");
            return RouterOutput::reply(msg, BAD_REQUEST, src);
        }
        let destination = rewrite::destination(msg).unwrap_or_default();
        if destination.is_empty() {
            return RouterOutput::reply(msg, SERVER_ERROR, src);
        }
        match self.registrar.lookup_valid(&destination, now).map(|b| b.addr) {
            Some(dest_addr) => RouterOutput {
                outbound: Some(self.forward(msg, src, dest_addr)),
                events: Vec::new(),
            },
            None => RouterOutput::reply(msg, NOT_ACCEPTABLE, src),
        }
    }

    /// Replies route by the From identity: the original caller the
    /// response must travel back to. The relay's own via frame is
    /// unwound; 200/603/486 answers to INVITE transactions feed the call
    /// tracker.
    fn on_response(&mut self, msg: &SipMessage) -> RouterOutput {
        let origin = rewrite::origin(msg).unwrap_or_default();
        if origin.is_empty() {
            return RouterOutput::empty();
        }
        let dest_addr = match self.registrar.get(&origin).map(|b| b.addr) {
            Some(addr) => addr,
            None => {
                debug!(origin = %origin, "no registration for reply origin, dropping");
                return RouterOutput::empty();
            }
        };

        let relayed = rewrite::remove_route_headers(msg);
        let relayed = rewrite::remove_top_via(&relayed, &self.own_via);
        let outbound = Outbound {
            dest: dest_addr,
            payload: relayed.to_bytes(),
        };

        let mut events = Vec::new();
        if relayed.cseq_method() == Some("INVITE") {
            if let (Some(code), Some(id)) = (msg.status_code(), msg.call_id()) {
                if matches!(code, 200 | 603 | 486) {
                    if let Some(event) = self.calls.on_final_response(id, code) {
                        events.push(format_event(id, event, msg));
                    }
                }
            }
        }

        RouterOutput {
            outbound: Some(outbound),
            events,
        }
    }

    /// Standard via/route/record-route rewrite applied to every forwarded
    /// request, in this order: stack own via, strip routes, record-route
    /// as line two.
    fn forward(&self, msg: &SipMessage, src: SocketAddr, dest: SocketAddr) -> Outbound {
        let rewritten = rewrite::insert_top_via(msg, &self.own_via, src);
        let rewritten = rewrite::remove_route_headers(&rewritten);
        let rewritten = rewrite::insert_record_route(&rewritten, &self.record_route);
        Outbound {
            dest,
            payload: rewritten.to_bytes(),
        }
    }

    fn local_error(&mut self, call_id: Option<&str>, msg: &SipMessage, code: u16) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        if let Some(id) = call_id {
            if let Some(event) = self.calls.on_local_error(id, code) {
                events.push(format_event(id, event, msg));
            }
        }
        events
    }

    #[cfg(test)]
    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    #[cfg(test)]
    pub fn calls(&self) -> &CallTracker {
        &self.calls
    }
}

fn format_event(call_id: &str, event: CallEvent, msg: &SipMessage) -> AuditEvent {
    let message = match event {
        CallEvent::Accepted => format!("200 ACCEPTED by {}", rewrite::destination(msg).unwrap_or_default()),
        CallEvent::Declined => format!("603 DECLINED by {}", rewrite::destination(msg).unwrap_or_default()),
        CallEvent::Busy => format!("486 {} is BUSY", rewrite::destination(msg).unwrap_or_default()),
        CallEvent::Terminated => format!("487 TERMINATED by {}", rewrite::origin(msg).unwrap_or_default()),
        CallEvent::Bye => format!("BYE from {}", rewrite::origin(msg).unwrap_or_default()),
        CallEvent::BadRequest => "400 BAD REQUEST".to_string(),
        CallEvent::TemporarilyUnavailable => "480 TEMPORARILY UNAVAILABLE".to_string(),
        CallEvent::InternalError => "500 INTERNAL SERVER ERROR".to_string(),
    };
    AuditEvent {
        call_id: call_id.to_string(),
        message,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
