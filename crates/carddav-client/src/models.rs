//! Data models for the CardDAV client

use serde::{Deserialize, Serialize};

use crate::filter::FilterMode;

/// Username/password pair sent as HTTP Basic authentication
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDavConfig {
    /// Address book collection URL
    pub url: String,
    /// Optional HTTP Basic credentials
    #[serde(default)]
    pub credential: Option<Credential>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Combination mode applied when a query carries several filters
    #[serde(default)]
    pub filter_mode: FilterMode,
}

impl CardDavConfig {
    /// Create a config for an address book collection URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: None,
            timeout_secs: default_timeout_secs(),
            filter_mode: FilterMode::default(),
        }
    }

    /// Set HTTP Basic credentials
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(username, password));
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the filter combination mode for the session
    pub fn with_filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }
}

/// vCard properties requested by a query.
///
/// `VERSION`, `FN` and `N` are always requested regardless of the
/// selection; `names()` yields them first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySelection {
    extra: Vec<String>,
}

/// Properties every query requests
const IMPLIED_PROPERTIES: [&str; 3] = ["VERSION", "FN", "N"];

impl PropertySelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from property names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selection = Self::new();
        for name in names {
            selection.select(name.as_ref());
        }
        selection
    }

    /// Add a property name; duplicates and always-implied names are ignored
    pub fn select(&mut self, name: &str) {
        let name = name.trim().to_ascii_uppercase();
        if name.is_empty()
            || IMPLIED_PROPERTIES.contains(&name.as_str())
            || self.extra.contains(&name)
        {
            return;
        }
        self.extra.push(name);
    }

    /// All requested names, implied properties first
    pub fn names(&self) -> impl Iterator<Item = &str> {
        IMPLIED_PROPERTIES
            .into_iter()
            .chain(self.extra.iter().map(String::as_str))
    }
}

/// A contact resource as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Resource id (href minus collection path and `.vcf` suffix)
    pub id: String,
    /// ETag with surrounding quotes stripped
    pub etag: String,
    /// Server-reported HTTP-date, passed through opaquely
    #[serde(default)]
    pub last_modified: Option<String>,
    /// Raw vCard body, when requested or returned inline
    #[serde(default)]
    pub vcard: Option<String>,
}

/// A sub-collection reported alongside contacts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub display_name: String,
    /// Absolute URL resolved against the session's scheme and host
    pub url: String,
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// One normalized multistatus entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerRecord {
    Contact(ContactRecord),
    Collection(CollectionRecord),
}

impl ServerRecord {
    /// The contained contact, if this entry is one
    pub fn as_contact(&self) -> Option<&ContactRecord> {
        match self {
            Self::Contact(contact) => Some(contact),
            Self::Collection(_) => None,
        }
    }
}
