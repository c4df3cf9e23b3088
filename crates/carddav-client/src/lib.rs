//! carddav-client: a CardDAV address-book protocol engine
//!
//! This crate provides a synchronous client for CardDAV servers: listing,
//! querying, fetching, creating, updating and deleting vCard resources
//! under one address book collection.
//!
//! ## Features
//!
//! - Typed query filters with `allof`/`anyof` combination modes
//! - addressbook-query and addressbook-multiget REPORT bodies
//! - Multistatus normalization into structured contact/collection records
//! - Collision-avoiding resource id generation (probe-then-create)
//!
//! vCard bodies are treated as opaque text; no field-level parsing happens
//! here.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use carddav_client::{CardDavClient, CardDavConfig, PropertySelection};
//!
//! let config = CardDavConfig::new("https://dav.example.com/u/contacts/")
//!     .with_auth("user", "password");
//! let client = CardDavClient::new(config)?;
//!
//! // Query contacts by nickname
//! let mut filter = client.filter_set();
//! filter.set_filter("NICKNAME", "equals", "Ed")?;
//! let records = client.query(&PropertySelection::from_names(["EMAIL"]), &filter)?;
//!
//! // Create a contact
//! let id = client.create("BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Ed\r\nEND:VCARD\r\n")?;
//!
//! // Fetch it back
//! let vcard = client.fetch(&id)?;
//! ```

pub mod client;
pub mod error;
pub mod filter;
pub mod idgen;
pub mod models;
pub mod request;
pub mod response;
pub mod transport;

pub use client::CardDavClient;
pub use error::{CardDavError, Result};
pub use filter::{FieldFilter, FilterMode, FilterSet, MatchType};
pub use models::{
    CardDavConfig, CollectionRecord, ContactRecord, Credential, PropertySelection, ServerRecord,
};
pub use response::ResponseNormalizer;
pub use transport::{DavMethod, HttpResponse, HttpTransport, Transport};

/// Re-export the common types for easy use
pub mod prelude {
    pub use super::{
        CardDavClient, CardDavConfig, Credential, FilterMode, FilterSet, MatchType,
        PropertySelection, ServerRecord,
    };
}
