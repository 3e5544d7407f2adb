//! Parsing and formatting of `did:wba` identifiers.
//!
//! Format: `did:wba:<host>[%3A<port>]:wba:<type>:<id>` where `<id>` is 16
//! lowercase hex digits. The host segment may also use a literal `:port`
//! when the DID has not been percent-encoded (grounded on the regex-based
//! tolerance of `parse_wba_did_host_port`).

use std::fmt;

use crate::error::ProtocolError;

pub const DID_METHOD: &str = "wba";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WbaDid {
    pub host: String,
    pub port: Option<u16>,
    pub path_segments: Vec<String>,
    pub local_id: String,
}

impl WbaDid {
    /// Parses a `did:wba:...` string.
    ///
    /// The original DID is split on `:`. The first two segments must be
    /// `did` and `wba`. The host segment follows, optionally carrying a
    /// `%3A`-encoded port. Everything between the host and the final
    /// 16-hex-digit local id is kept as `path_segments` (e.g. the literal
    /// `wba` / type segment used by agent DIDs).
    pub fn parse(did: &str) -> Result<Self, ProtocolError> {
        let mut parts = did.split(':');

        let scheme = parts.next().unwrap_or_default();
        if scheme != "did" {
            return Err(ProtocolError::MalformedHeader(format!(
                "not a DID: {did}"
            )));
        }
        let method = parts.next().unwrap_or_default();
        if method != DID_METHOD {
            return Err(ProtocolError::MalformedHeader(format!(
                "unsupported DID method: {method}"
            )));
        }

        let host_segment = parts
            .next()
            .ok_or_else(|| ProtocolError::MalformedHeader("missing host segment".into()))?;
        let (host, port) = split_host_port(host_segment)?;

        let rest: Vec<&str> = parts.collect();
        let local_id = rest
            .last()
            .ok_or_else(|| ProtocolError::MalformedHeader("missing local id".into()))?
            .to_string();
        if !is_valid_local_id(&local_id) {
            return Err(ProtocolError::MalformedHeader(format!(
                "invalid local id: {local_id}"
            )));
        }
        let path_segments = rest[..rest.len() - 1]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Ok(WbaDid {
            host,
            port,
            path_segments,
            local_id,
        })
    }

    /// Renders back to a `did:wba:...` string, percent-encoding the port
    /// as `%3A` per the wire format used throughout the protocol.
    pub fn to_did_string(&self) -> String {
        let mut host_segment = self.host.clone();
        if let Some(port) = self.port {
            host_segment.push_str("%3A");
            host_segment.push_str(&port.to_string());
        }
        let mut out = format!("did:{DID_METHOD}:{host_segment}");
        for seg in &self.path_segments {
            out.push(':');
            out.push_str(seg);
        }
        out.push(':');
        out.push_str(&self.local_id);
        out
    }

    /// The `host[:port]` authority this DID resolves against.
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for WbaDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_did_string())
    }
}

fn split_host_port(segment: &str) -> Result<(String, Option<u16>), ProtocolError> {
    if let Some((host, port)) = segment.split_once("%3A") {
        let port: u16 = port
            .parse()
            .map_err(|_| ProtocolError::MalformedHeader(format!("invalid port: {port}")))?;
        return Ok((host.to_string(), Some(port)));
    }
    if let Some((host, port)) = segment.split_once(':') {
        let port: u16 = port
            .parse()
            .map_err(|_| ProtocolError::MalformedHeader(format!("invalid port: {port}")))?;
        return Ok((host.to_string(), Some(port)));
    }
    Ok((segment.to_string(), None))
}

fn is_valid_local_id(id: &str) -> bool {
    id.len() == 16 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_encoded_port() {
        let did = WbaDid::parse("did:wba:example.com%3A9000:wba:agent:0123456789abcdef").unwrap();
        assert_eq!(did.host, "example.com");
        assert_eq!(did.port, Some(9000));
        assert_eq!(did.local_id, "0123456789abcdef");
        assert_eq!(did.path_segments, vec!["wba".to_string(), "agent".to_string()]);
    }

    #[test]
    fn parses_without_port() {
        let did = WbaDid::parse("did:wba:example.com:wba:user:fedcba9876543210").unwrap();
        assert_eq!(did.host, "example.com");
        assert_eq!(did.port, None);
    }

    #[test]
    fn round_trips() {
        let raw = "did:wba:example.com%3A8080:wba:agent:abcdef0123456789";
        let did = WbaDid::parse(raw).unwrap();
        assert_eq!(did.to_did_string(), raw);
    }

    #[test]
    fn rejects_bad_local_id() {
        assert!(WbaDid::parse("did:wba:example.com:wba:agent:not-hex").is_err());
    }

    #[test]
    fn rejects_non_wba_method() {
        assert!(WbaDid::parse("did:key:z6Mk...").is_err());
    }
}
