//! Validated domain names.

use std::fmt;
use std::str::FromStr;

use url::{Host, Url};

use crate::Error;

/// Maximum length of a DNS name, excluding any port suffix.
pub const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single DNS label.
pub const MAX_LABEL_LEN: usize = 63;

/// A validated, lowercased domain name, optionally followed by `:port`.
///
/// This is the lookup key for both the resolver and the cache. Two inputs
/// that differ only in case or in a trailing dot parse to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    /// Parse and normalize a domain.
    ///
    /// Accepts a bare host (`example.com`), an IP literal, or either of
    /// those with an explicit port. Schemes, paths, queries, fragments and
    /// credentials are rejected.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidDomain("empty domain".into()));
        }
        if trimmed.contains("://") {
            return Err(Error::InvalidDomain(format!("{trimmed}: must not include a scheme")));
        }

        let url = Url::parse(&format!("http://{trimmed}/"))
            .map_err(|e| Error::InvalidDomain(format!("{trimmed}: {e}")))?;

        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(Error::InvalidDomain(format!("{trimmed}: must be a bare host name")));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(Error::InvalidDomain(format!("{trimmed}: must not include credentials")));
        }

        let host = match url.host() {
            Some(Host::Domain(name)) => {
                let name = name.strip_suffix('.').unwrap_or(name);
                validate_labels(trimmed, name)?;
                name.to_string()
            }
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => format!("[{addr}]"),
            None => return Err(Error::InvalidDomain(format!("{trimmed}: missing host"))),
        };

        let normalized = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };

        Ok(Self(normalized))
    }

    /// The normalized domain text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The homepage fetched during resolution: `http://<domain>/`.
    pub fn homepage_url(&self) -> String {
        format!("http://{}/", self.0)
    }
}

fn validate_labels(input: &str, name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidDomain(format!("{input}: missing host")));
    }
    if name.len() > MAX_DOMAIN_LEN {
        return Err(Error::InvalidDomain(format!("{input}: longer than {MAX_DOMAIN_LEN} characters")));
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err(Error::InvalidDomain(format!("{input}: empty label")));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(Error::InvalidDomain(format!("{input}: label longer than {MAX_LABEL_LEN} characters")));
        }
    }
    Ok(())
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
