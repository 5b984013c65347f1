// File: src/sip/registrar.rs
use std::collections::HashMap;
use std::net::SocketAddr;

/// A registrant's current location: where traffic addressed to its
/// address-of-record should be sent, and until when.
#[derive(Debug, Clone)]
pub struct Binding {
    /// host:port taken from the Contact URI at registration time.
    pub contact: String,
    /// Source address the REGISTER arrived from; replies and forwarded
    /// requests for this identity go here.
    pub addr: SocketAddr,
    /// Absolute expiry in unix seconds. A binding with `expires_at <= now`
    /// is logically absent.
    pub expires_at: u64,
}

/// Address-of-record to binding map, one binding per identity.
///
/// Expiry is enforced lazily on `lookup_valid`; there is no background
/// sweep, so a stale entry stays in memory until the next lookup for that
/// exact key. `get`/`contains` deliberately skip the freshness check:
/// origin validation, ACK forwarding and response routing accept a lapsed
/// but not-yet-evicted registration, while destination resolution does not.
#[derive(Debug, Default)]
pub struct Registrar {
    bindings: HashMap<String, Binding>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or refreshes a binding. `ttl == 0` deregisters instead and
    /// never stores. Returns true when a previous binding existed.
    pub fn upsert(&mut self, aor: &str, contact: &str, ttl: u64, addr: SocketAddr, now: u64) -> bool {
        if ttl == 0 {
            return self.bindings.remove(aor).is_some();
        }
        self.bindings
            .insert(
                aor.to_string(),
                Binding {
                    contact: contact.to_string(),
                    addr,
                    expires_at: now + ttl,
                },
            )
            .is_some()
    }

    /// Lookup with lazy eviction: an entry whose expiry has passed is
    /// removed and reported absent.
    pub fn lookup_valid(&mut self, aor: &str, now: u64) -> Option<&Binding> {
        let expired = match self.bindings.get(aor) {
            Some(binding) => binding.expires_at <= now,
            None => return None,
        };
        if expired {
            self.bindings.remove(aor);
            return None;
        }
        self.bindings.get(aor)
    }

    /// Read without eviction or freshness check.
    pub fn get(&self, aor: &str) -> Option<&Binding> {
        self.bindings.get(aor)
    }

    /// Existence check without eviction.
    pub fn contains(&self, aor: &str) -> bool {
        self.bindings.contains_key(aor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn upsert_overwrites_never_duplicates() {
        let mut reg = Registrar::new();
        assert!(!reg.upsert("alice@domain", "10.0.0.5:5060", 3600, addr("10.0.0.5:5060"), 100));
        assert!(reg.upsert("alice@domain", "10.0.0.9:5062", 3600, addr("10.0.0.9:5062"), 200));
        let binding = reg.get("alice@domain").unwrap();
        assert_eq!(binding.contact, "10.0.0.9:5062");
        assert_eq!(binding.expires_at, 3800);
    }

    #[test]
    fn lookup_valid_evicts_expired_entries() {
        let mut reg = Registrar::new();
        reg.upsert("alice@domain", "10.0.0.5:5060", 60, addr("10.0.0.5:5060"), 100);
        assert!(reg.lookup_valid("alice@domain", 159).is_some());
        // expiry boundary is inclusive: expires_at <= now means absent
        assert!(reg.lookup_valid("alice@domain", 160).is_none());
        assert!(!reg.contains("alice@domain"));
    }

    #[test]
    fn get_skips_the_freshness_check() {
        let mut reg = Registrar::new();
        reg.upsert("alice@domain", "10.0.0.5:5060", 60, addr("10.0.0.5:5060"), 100);
        assert!(reg.get("alice@domain").is_some());
        assert!(reg.contains("alice@domain"));
        // a stale entry is still visible until a lookup_valid touches it
        assert!(reg.get("alice@domain").is_some());
    }

    #[test]
    fn zero_ttl_deregisters() {
        let mut reg = Registrar::new();
        reg.upsert("alice@domain", "10.0.0.5:5060", 3600, addr("10.0.0.5:5060"), 100);
        assert!(reg.upsert("alice@domain", "", 0, addr("10.0.0.5:5060"), 100));
        assert!(!reg.contains("alice@domain"));
    }

    #[test]
    fn zero_ttl_on_unknown_identity_stores_nothing() {
        let mut reg = Registrar::new();
        assert!(!reg.upsert("carol@domain", "10.0.0.7:5060", 0, addr("10.0.0.7:5060"), 100));
        assert!(!reg.contains("carol@domain"));
    }
}
