//! XML request bodies for CardDAV reports

use quick_xml::escape::escape;

use crate::filter::FilterSet;
use crate::models::PropertySelection;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8" ?>"#;
const DAV_NS: &str = "DAV:";
const CARDDAV_NS: &str = "urn:ietf:params:xml:ns:carddav";

/// Build an `addressbook-query` REPORT body requesting the selected vCard
/// properties, with one prop-filter per configured predicate. The filter
/// block is omitted entirely when the set is empty.
pub fn addressbook_query(selection: &PropertySelection, filter: &FilterSet) -> String {
    let mut xml = String::with_capacity(512);
    xml.push_str(XML_DECLARATION);
    xml.push_str(&format!(
        r#"<C:addressbook-query xmlns:D="{DAV_NS}" xmlns:C="{CARDDAV_NS}">"#
    ));
    xml.push_str("<D:prop><D:getetag/><C:address-data>");
    for name in selection.names() {
        xml.push_str(&format!(r#"<C:prop name="{}"/>"#, escape(name)));
    }
    xml.push_str("</C:address-data></D:prop>");

    if !filter.is_empty() {
        xml.push_str(&format!(
            r#"<C:filter test="{}">"#,
            filter.mode().test_attr()
        ));
        for (property, field) in filter.iter() {
            xml.push_str(&format!(r#"<C:prop-filter name="{}">"#, escape(property)));
            xml.push_str(&format!(
                r#"<C:text-match collation="i;unicode-casemap" match-type="{}">{}</C:text-match>"#,
                field.match_type.as_str(),
                escape(&field.text)
            ));
            xml.push_str("</C:prop-filter>");
        }
        xml.push_str("</C:filter>");
    }

    xml.push_str("</C:addressbook-query>");
    xml
}

/// Build an `addressbook-multiget` REPORT body fetching metadata for one
/// resource under the collection path.
pub fn addressbook_multiget(collection_path: &str, id: &str) -> String {
    let mut xml = String::with_capacity(256);
    xml.push_str(XML_DECLARATION);
    xml.push_str(&format!(
        r#"<C:addressbook-multiget xmlns:D="{DAV_NS}" xmlns:C="{CARDDAV_NS}">"#
    ));
    xml.push_str("<D:prop><D:getetag/><D:getlastmodified/></D:prop>");
    xml.push_str(&format!(
        "<D:href>{}{}.vcf</D:href>",
        escape(collection_path),
        escape(id)
    ));
    xml.push_str("</C:addressbook-multiget>");
    xml
}
