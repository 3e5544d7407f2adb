//! The per-agent contact book, ported from `router_agent.py::AgentContactBook`
//! (`add_contact`/`update_interaction`): opportunistic bookkeeping of
//! every remote DID an agent has exchanged authenticated requests with,
//! plus whichever token each side currently holds for the other.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub remote_did: String,
    pub host: String,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub token_to_remote: Option<String>,
    pub token_from_remote: Option<String>,
    pub first_contact: DateTime<Utc>,
    pub last_contact: DateTime<Utc>,
    pub interaction_count: u64,
}

impl ContactRecord {
    fn new(remote_did: &str, host: &str, port: Option<u16>) -> Self {
        let now = Utc::now();
        ContactRecord {
            remote_did: remote_did.to_string(),
            host: host.to_string(),
            port,
            name: None,
            token_to_remote: None,
            token_from_remote: None,
            first_contact: now,
            last_contact: now,
            interaction_count: 1,
        }
    }
}

#[derive(Default)]
pub struct ContactBook {
    contacts: RwLock<HashMap<String, ContactRecord>>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an authenticated exchange with `remote_did`, creating the
    /// contact on first sight and bumping `interaction_count` and
    /// `last_contact` otherwise. Never loses the DID of a new contact even
    /// under concurrent updates, since the whole read-modify-write happens
    /// under one write-lock acquisition.
    pub fn record_interaction(&self, remote_did: &str, host: &str, port: Option<u16>) {
        let mut contacts = self.contacts.write();
        contacts
            .entry(remote_did.to_string())
            .and_modify(|c| {
                c.last_contact = Utc::now();
                c.interaction_count += 1;
            })
            .or_insert_with(|| ContactRecord::new(remote_did, host, port));
    }

    pub fn set_name(&self, remote_did: &str, name: impl Into<String>) {
        if let Some(contact) = self.contacts.write().get_mut(remote_did) {
            contact.name = Some(name.into());
        }
    }

    pub fn set_token_to_remote(&self, remote_did: &str, token: impl Into<String>) {
        if let Some(contact) = self.contacts.write().get_mut(remote_did) {
            contact.token_to_remote = Some(token.into());
        }
    }

    pub fn set_token_from_remote(&self, remote_did: &str, token: impl Into<String>) {
        if let Some(contact) = self.contacts.write().get_mut(remote_did) {
            contact.token_from_remote = Some(token.into());
        }
    }

    pub fn get(&self, remote_did: &str) -> Option<ContactRecord> {
        self.contacts.read().get(remote_did).cloned()
    }

    pub fn all(&self) -> Vec<ContactRecord> {
        self.contacts.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_contact_is_recorded_once() {
        let book = ContactBook::new();
        book.record_interaction("did:wba:a.com:wba:agent:0000000000000000", "a.com", None);
        book.record_interaction("did:wba:a.com:wba:agent:0000000000000000", "a.com", None);

        let contact = book.get("did:wba:a.com:wba:agent:0000000000000000").unwrap();
        assert_eq!(contact.interaction_count, 2);
    }

    #[test]
    fn unknown_contact_is_absent() {
        let book = ContactBook::new();
        assert!(book.get("did:wba:nobody.com:wba:agent:1111111111111111").is_none());
    }
}
