//! Multistatus response normalization

use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use crate::error::{CardDavError, Result};
use crate::models::{CollectionRecord, ContactRecord, ServerRecord};
use crate::transport::{DavMethod, Transport};

/// Fallback id shape for legacy hrefs that don't sit under the collection
/// path: three 8-char hex groups.
static LEGACY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9A-Fa-f]{8}-[0-9A-Fa-f]{8}-[0-9A-Fa-f]{8}").unwrap()
});

/// One raw `<response>` entry before classification
#[derive(Debug, Default)]
struct ResponseEntry {
    href: String,
    /// An href declared inside the propstat block, when the server sends one
    prop_href: Option<String>,
    etag: Option<String>,
    last_modified: Option<String>,
    content_type: Option<String>,
    display_name: Option<String>,
    address_data: Option<String>,
}

impl ResponseEntry {
    fn is_vcard(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("vcard"))
            || self.href.trim_end().ends_with(".vcf")
    }

    fn is_collection(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("unix-directory"))
    }
}

/// Turns multistatus XML into [`ServerRecord`]s for one session.
///
/// Holds the transport so contact bodies can be pulled with a secondary
/// single-record GET when a caller asks for them and the entry carried no
/// inline address-data.
pub struct ResponseNormalizer<'a> {
    transport: &'a dyn Transport,
    base_url: &'a str,
    collection_path: String,
}

impl<'a> ResponseNormalizer<'a> {
    /// `base_url` must be the session's normalized collection URL
    pub fn new(transport: &'a dyn Transport, base_url: &'a str) -> Self {
        let collection_path = reqwest::Url::parse(base_url)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| "/".to_string());
        Self {
            transport,
            base_url,
            collection_path,
        }
    }

    /// Normalize a multistatus body. Unrecognized entries are skipped;
    /// malformed XML fails the whole call.
    pub fn normalize(&self, xml: &str, include_bodies: bool) -> Result<Vec<ServerRecord>> {
        let entries = parse_multistatus(xml)?;
        let mut records = Vec::new();

        for entry in entries {
            if entry.is_vcard() {
                if let Some(record) = self.contact_record(entry, include_bodies) {
                    records.push(ServerRecord::Contact(record));
                }
            } else if entry.is_collection() {
                records.push(ServerRecord::Collection(self.collection_record(entry)));
            } else {
                debug!("skipping unrecognized multistatus entry: {}", entry.href);
            }
        }

        Ok(records)
    }

    fn contact_record(&self, entry: ResponseEntry, include_bodies: bool) -> Option<ContactRecord> {
        let id = self.derive_contact_id(&entry.href)?;

        let vcard = match entry.address_data.filter(|data| !data.trim().is_empty()) {
            Some(inline) => Some(inline),
            None if include_bodies => self.fetch_body(&id),
            None => None,
        };

        Some(ContactRecord {
            id,
            etag: entry
                .etag
                .map(|etag| etag.trim_matches('"').to_string())
                .unwrap_or_default(),
            last_modified: entry.last_modified,
            vcard,
        })
    }

    /// Prefer structured stripping of the collection path and `.vcf`
    /// suffix; fall back to scanning for an id-shaped token on hrefs that
    /// don't match. Entries yielding no id are skipped.
    fn derive_contact_id(&self, href: &str) -> Option<String> {
        let href = href.trim();
        let path = match reqwest::Url::parse(href) {
            Ok(url) => url.path().to_string(),
            Err(_) => href.to_string(),
        };

        if let Some(rest) = path.strip_prefix(self.collection_path.as_str()) {
            if let Some(id) = rest.strip_suffix(".vcf") {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }

        LEGACY_ID.find(href).map(|hit| hit.as_str().to_string())
    }

    fn fetch_body(&self, id: &str) -> Option<String> {
        let url = format!("{}{}.vcf", self.base_url, id);
        match self.transport.execute(&url, DavMethod::Get, None, None) {
            Ok(response) if response.status == 200 => Some(response.body),
            Ok(response) => {
                debug!("vcard body fetch for {} returned {}", id, response.status);
                None
            }
            Err(error) => {
                debug!("vcard body fetch for {} failed: {}", id, error);
                None
            }
        }
    }

    fn collection_record(&self, entry: ResponseEntry) -> CollectionRecord {
        let href = entry.prop_href.as_deref().unwrap_or(entry.href.as_str());
        let url = reqwest::Url::parse(self.base_url)
            .ok()
            .and_then(|base| base.join(href).ok())
            .map(|resolved| resolved.to_string())
            .unwrap_or_else(|| href.to_string());

        CollectionRecord {
            display_name: entry.display_name.unwrap_or_default(),
            url,
            last_modified: entry.last_modified,
        }
    }
}

/// Collect the raw entries of a multistatus document, namespace-prefix
/// agnostic.
fn parse_multistatus(xml: &str) -> Result<Vec<ResponseEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<ResponseEntry> = None;
    let mut in_prop = false;
    let mut field: Option<Field> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"response" => current = Some(ResponseEntry::default()),
                b"prop" => in_prop = true,
                b"href" => field = Some(if in_prop { Field::PropHref } else { Field::Href }),
                b"getetag" => field = Some(Field::Etag),
                b"getlastmodified" => field = Some(Field::LastModified),
                b"getcontenttype" => field = Some(Field::ContentType),
                b"displayname" => field = Some(Field::DisplayName),
                b"address-data" => field = Some(Field::AddressData),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"response" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                b"prop" => in_prop = false,
                b"href" | b"getetag" | b"getlastmodified" | b"getcontenttype"
                | b"displayname" | b"address-data" => field = None,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                    let text = e
                        .unescape()
                        .map_err(|error| CardDavError::XmlParse(error.to_string()))?;
                    entry.append(field, &text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                    let text = String::from_utf8_lossy(e).into_owned();
                    entry.append(field, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(error) => return Err(CardDavError::XmlParse(error.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Href,
    PropHref,
    Etag,
    LastModified,
    ContentType,
    DisplayName,
    AddressData,
}

impl ResponseEntry {
    fn append(&mut self, field: Field, text: &str) {
        match field {
            Field::Href => self.href.push_str(text),
            Field::PropHref => {
                self.prop_href.get_or_insert_with(String::new).push_str(text);
            }
            Field::Etag => self.etag.get_or_insert_with(String::new).push_str(text),
            Field::LastModified => {
                self.last_modified.get_or_insert_with(String::new).push_str(text);
            }
            Field::ContentType => {
                self.content_type.get_or_insert_with(String::new).push_str(text);
            }
            Field::DisplayName => {
                self.display_name.get_or_insert_with(String::new).push_str(text);
            }
            Field::AddressData => {
                self.address_data.get_or_insert_with(String::new).push_str(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    const BASE: &str = "https://dav.example.com/u/contacts/";

    fn contact_multistatus() -> String {
        r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/u/contacts/0A1B2C3D-4E5F6071-8293A4B5.vcf</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"etag-one"</d:getetag>
        <d:getlastmodified>Tue, 20 Jul 2021 10:00:00 GMT</d:getlastmodified>
        <d:getcontenttype>text/vcard; charset=utf-8</d:getcontenttype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/u/contacts/FFEEDDCC-BBAA9988-77665544.vcf</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"etag-two"</d:getetag>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#
            .to_string()
    }

    #[test]
    fn test_two_entries_normalize_to_two_contacts() {
        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);

        let records = normalizer.normalize(&contact_multistatus(), false).unwrap();
        assert_eq!(records.len(), 2);

        let first = records[0].as_contact().unwrap();
        assert_eq!(first.id, "0A1B2C3D-4E5F6071-8293A4B5");
        assert_eq!(first.etag, "etag-one");
        assert_eq!(
            first.last_modified.as_deref(),
            Some("Tue, 20 Jul 2021 10:00:00 GMT")
        );
        assert!(first.vcard.is_none());

        let second = records[1].as_contact().unwrap();
        assert_eq!(second.id, "FFEEDDCC-BBAA9988-77665544");
        assert_eq!(second.etag, "etag-two");

        // No include_bodies, no secondary fetches.
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);

        let xml = contact_multistatus();
        let first = normalizer.normalize(&xml, false).unwrap();
        let second = normalizer.normalize(&xml, false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_include_bodies_fetches_each_vcard() {
        let transport = MockTransport::new();
        transport.push_status(200, "BEGIN:VCARD\r\nFN:One\r\nEND:VCARD\r\n");
        transport.push_status(200, "BEGIN:VCARD\r\nFN:Two\r\nEND:VCARD\r\n");
        let normalizer = ResponseNormalizer::new(&transport, BASE);

        let records = normalizer.normalize(&contact_multistatus(), true).unwrap();
        let bodies: Vec<_> = records
            .iter()
            .filter_map(|r| r.as_contact().and_then(|c| c.vcard.as_deref()))
            .collect();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("FN:One"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, DavMethod::Get);
        assert_eq!(
            requests[0].url,
            "https://dav.example.com/u/contacts/0A1B2C3D-4E5F6071-8293A4B5.vcf"
        );
    }

    #[test]
    fn test_inline_address_data_skips_secondary_fetch() {
        let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/u/contacts/0A1B2C3D-4E5F6071-8293A4B5.vcf</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"abc"</d:getetag>
        <card:address-data>BEGIN:VCARD
VERSION:3.0
FN:Inline
END:VCARD</card:address-data>
      </d:prop>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);
        let records = normalizer.normalize(xml, true).unwrap();

        let contact = records[0].as_contact().unwrap();
        assert!(contact.vcard.as_deref().unwrap().contains("FN:Inline"));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_collection_entry_resolves_absolute_url() {
        let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/u/shared-books/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Shared</d:displayname>
        <d:getcontenttype>httpd/unix-directory</d:getcontenttype>
        <d:getlastmodified>Mon, 01 Jan 2024 00:00:00 GMT</d:getlastmodified>
      </d:prop>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);
        let records = normalizer.normalize(xml, false).unwrap();

        match &records[0] {
            ServerRecord::Collection(collection) => {
                assert_eq!(collection.display_name, "Shared");
                assert_eq!(collection.url, "https://dav.example.com/u/shared-books/");
                assert_eq!(
                    collection.last_modified.as_deref(),
                    Some("Mon, 01 Jan 2024 00:00:00 GMT")
                );
            }
            other => panic!("expected collection, got {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_entries_are_skipped() {
        let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/u/contacts/readme.txt</d:href>
    <d:propstat>
      <d:prop><d:getcontenttype>text/plain</d:getcontenttype></d:prop>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);
        assert!(normalizer.normalize(xml, false).unwrap().is_empty());
    }

    #[test]
    fn test_legacy_href_falls_back_to_token_scan() {
        // Entry lives outside the collection path; the 8-8-8 token in the
        // href is the only usable id.
        let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/legacy/store/ABCD1234-ABCD1234-ABCD1234</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"legacy"</d:getetag>
        <d:getcontenttype>text/vcard</d:getcontenttype>
      </d:prop>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);
        let records = normalizer.normalize(xml, false).unwrap();
        assert_eq!(records[0].as_contact().unwrap().id, "ABCD1234-ABCD1234-ABCD1234");
    }

    #[test]
    fn test_entry_with_empty_id_is_skipped() {
        let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/u/contacts/.vcf</d:href>
    <d:propstat>
      <d:prop><d:getetag>"x"</d:getetag></d:prop>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);
        assert!(normalizer.normalize(xml, false).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_is_a_parse_error() {
        let transport = MockTransport::new();
        let normalizer = ResponseNormalizer::new(&transport, BASE);

        let err = normalizer
            .normalize("<d:multistatus><d:response></d:multistatus>", false)
            .unwrap_err();
        assert!(matches!(err, CardDavError::XmlParse(_)));
    }
}
