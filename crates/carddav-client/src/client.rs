//! CardDAV client facade

use std::cell::RefCell;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{CardDavError, Result};
use crate::filter::FilterSet;
use crate::idgen;
use crate::models::{CardDavConfig, ContactRecord, PropertySelection, ServerRecord};
use crate::request;
use crate::response::ResponseNormalizer;
use crate::transport::{DavMethod, HttpTransport, Transport};

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const VCARD_CONTENT_TYPE: &str = "text/vcard; charset=utf-8";

/// Synchronous CardDAV session over one address book collection.
///
/// Each operation is a single blocking request/response cycle; the session
/// issues at most one request at a time and keeps no state between calls
/// beyond its configuration and the last generated resource id. Sharing a
/// session across threads is not supported; give each caller its own.
pub struct CardDavClient {
    base_url: String,
    collection_path: String,
    config: CardDavConfig,
    transport: Box<dyn Transport>,
    last_id: RefCell<Option<String>>,
}

impl CardDavClient {
    /// Create a session backed by a blocking HTTPS transport
    pub fn new(config: CardDavConfig) -> Result<Self> {
        let transport = HttpTransport::new(
            config.credential.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    /// Create a session over a caller-supplied transport
    pub fn with_transport(config: CardDavConfig, transport: Box<dyn Transport>) -> Self {
        let base_url = normalize_url(&config.url);
        let collection_path = reqwest::Url::parse(&base_url)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| "/".to_string());

        info!("CardDAV session initialized for: {}", base_url);

        Self {
            base_url,
            collection_path,
            config,
            transport,
            last_id: RefCell::new(None),
        }
    }

    /// Normalized collection URL (trailing slash ensured)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Empty filter set carrying the session's configured combination mode
    pub fn filter_set(&self) -> FilterSet {
        FilterSet::with_mode(self.config.filter_mode)
    }

    /// Id produced by the most recent [`create`](Self::create) call
    pub fn last_generated_id(&self) -> Option<String> {
        self.last_id.borrow().clone()
    }

    /// List the collection via PROPFIND and return the raw multistatus XML
    pub fn list_raw(&self) -> Result<String> {
        self.transport
            .execute(&self.base_url, DavMethod::Propfind, None, None)?
            .into_data()
    }

    /// List the collection as normalized records. With `include_bodies`
    /// each contact's vCard text is pulled with a follow-up GET.
    pub fn list(&self, include_bodies: bool) -> Result<Vec<ServerRecord>> {
        let xml = self.list_raw()?;
        let records = self.normalizer().normalize(&xml, include_bodies)?;
        info!("listed {} records from {}", records.len(), self.base_url);
        Ok(records)
    }

    /// Run an addressbook-query REPORT and return the raw multistatus XML
    pub fn query_raw(&self, selection: &PropertySelection, filter: &FilterSet) -> Result<String> {
        let body = request::addressbook_query(selection, filter);
        debug!("REPORT {} ({} filters)", self.base_url, filter.len());
        self.transport
            .execute(
                &self.base_url,
                DavMethod::Report,
                Some(&body),
                Some(XML_CONTENT_TYPE),
            )?
            .into_data()
    }

    /// Run an addressbook-query REPORT and normalize the result. Bodies
    /// come back inline via the requested address-data.
    pub fn query(
        &self,
        selection: &PropertySelection,
        filter: &FilterSet,
    ) -> Result<Vec<ServerRecord>> {
        let xml = self.query_raw(selection, filter)?;
        let records = self.normalizer().normalize(&xml, false)?;
        info!("query matched {} records", records.len());
        Ok(records)
    }

    /// Fetch one vCard body as raw text
    pub fn fetch(&self, id: &str) -> Result<String> {
        let response = self
            .transport
            .execute(&self.resource_url(id), DavMethod::Get, None, None)?;
        if response.status == 404 {
            return Err(CardDavError::ContactNotFound(id.to_string()));
        }
        response.into_data()
    }

    /// Fetch one contact with etag and last-modified metadata via an
    /// addressbook-multiget REPORT
    pub fn fetch_with_metadata(&self, id: &str) -> Result<ContactRecord> {
        let body = request::addressbook_multiget(&self.collection_path, id);
        let xml = self
            .transport
            .execute(
                &self.base_url,
                DavMethod::Report,
                Some(&body),
                Some(XML_CONTENT_TYPE),
            )?
            .into_data()?;

        self.normalizer()
            .normalize(&xml, true)?
            .into_iter()
            .find_map(|record| match record {
                ServerRecord::Contact(contact) => Some(contact),
                ServerRecord::Collection(_) => None,
            })
            .ok_or_else(|| CardDavError::ContactNotFound(id.to_string()))
    }

    /// Store a new vCard under a freshly generated id and return the id
    pub fn create(&self, vcard: &str) -> Result<String> {
        let id = idgen::generate(self.transport.as_ref(), &self.base_url)?;
        self.put_vcard(vcard, &id)?;
        *self.last_id.borrow_mut() = Some(id.clone());
        info!("created contact {}", id);
        Ok(id)
    }

    /// Store a vCard under a caller-chosen id; creates the resource when it
    /// does not exist yet (upsert)
    pub fn update(&self, vcard: &str, id: &str) -> Result<()> {
        self.put_vcard(vcard, id)?;
        info!("stored contact {}", id);
        Ok(())
    }

    /// Delete one contact resource
    pub fn delete(&self, id: &str) -> Result<()> {
        let response =
            self.transport
                .execute(&self.resource_url(id), DavMethod::Delete, None, None)?;
        if !response.is_success() {
            return Err(CardDavError::Protocol {
                status: response.status,
                message: response.body,
            });
        }
        info!("deleted contact {}", id);
        Ok(())
    }

    /// Probe the server with OPTIONS, reporting what went wrong on failure
    pub fn verify_connection(&self) -> Result<()> {
        let response = self
            .transport
            .execute(&self.base_url, DavMethod::Options, None, None)?;
        if response.is_success() {
            Ok(())
        } else {
            Err(CardDavError::Protocol {
                status: response.status,
                message: response.body,
            })
        }
    }

    /// Boolean variant of [`verify_connection`](Self::verify_connection);
    /// collapses every failure category into `false`
    pub fn check_connection(&self) -> bool {
        self.verify_connection().is_ok()
    }

    fn put_vcard(&self, vcard: &str, id: &str) -> Result<()> {
        // Tab characters upset some servers' vCard parsers; strip them
        // before the upload.
        let cleaned = vcard.replace('\t', "");
        let response = self.transport.execute(
            &self.resource_url(id),
            DavMethod::Put,
            Some(&cleaned),
            Some(VCARD_CONTENT_TYPE),
        )?;
        if response.is_success() {
            Ok(())
        } else {
            Err(CardDavError::Protocol {
                status: response.status,
                message: response.body,
            })
        }
    }

    fn resource_url(&self, id: &str) -> String {
        format!("{}{}.vcf", self.base_url, id)
    }

    fn normalizer(&self) -> ResponseNormalizer<'_> {
        ResponseNormalizer::new(self.transport.as_ref(), &self.base_url)
    }
}

fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}
