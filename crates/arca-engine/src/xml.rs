//! XML canonicalization, system-stream schema checks and the read-only
//! object rendering.
//!
//! Canonical form, as stored for InlineXML versions:
//! - no XML declaration, processing instructions, comments or DOCTYPE
//! - internal entities declared in the DOCTYPE are expanded
//! - leading and trailing whitespace of text nodes is trimmed, and
//!   whitespace-only text between elements is dropped
//! - attributes are sorted by qualified name and double-quoted
//! - CDATA sections become escaped text

use std::collections::HashMap;

use arca_store::{DigitalObject, VersionContent};
use arca_types::Timestamp;
use chrono::SecondsFormat;
use quick_xml::escape::{escape, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Namespace of the root element of `DC`.
pub const OAI_DC_NS: &str = "http://www.openarchives.org/OAI/2.0/oai_dc/";
/// Namespace of the Dublin Core elements inside `DC`.
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
/// Namespace of the root element of `RELS-EXT`.
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

const OBJECT_XML_NS: &str = "info:arca/xml/object/1.0";

const DC_ELEMENTS: [&str; 15] = [
    "title",
    "creator",
    "subject",
    "description",
    "publisher",
    "contributor",
    "date",
    "type",
    "format",
    "identifier",
    "source",
    "language",
    "relation",
    "coverage",
    "rights",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("{datastream} does not conform to its schema: {reason}")]
    Schema { datastream: String, reason: String },
}

/// An element seen during canonicalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementName {
    /// 0 for the root element.
    pub depth: usize,
    pub namespace: Option<String>,
    pub local: String,
}

/// Canonical text of a document plus its element structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalXml {
    pub text: String,
    /// Elements in document order.
    pub elements: Vec<ElementName>,
}

// ---------------------------------------------------------------------------
// Canonicalization
// ---------------------------------------------------------------------------

/// Check that `input` is a well-formed UTF-8 document and canonicalize it.
pub fn canonicalize(input: &[u8]) -> Result<CanonicalXml, XmlError> {
    let text = std::str::from_utf8(input)
        .map_err(|e| XmlError::Malformed(format!("not UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    let mut state = Canonicalizer::default();

    loop {
        let event = reader.read_event().map_err(|e| {
            XmlError::Malformed(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) => {}
            Event::DocType(doctype) => {
                if state.root_done || !state.stack.is_empty() {
                    return Err(XmlError::Malformed("DOCTYPE after the root element".into()));
                }
                state.entities = internal_entities(&utf8(&doctype)?);
            }
            Event::Start(start) => state.open(&start, false)?,
            Event::Empty(start) => state.open(&start, true)?,
            Event::End(end) => {
                let name = utf8(end.name().as_ref())?;
                state.close(&name)?;
            }
            Event::Text(text) => {
                let raw = utf8(&text)?;
                let value = state.unescape(&raw)?;
                state.text(&value)?;
            }
            Event::CData(cdata) => {
                let value = utf8(&cdata)?;
                state.text(&value)?;
            }
            Event::Eof => break,
        }
    }

    if let Some(open) = state.stack.last() {
        return Err(XmlError::Malformed(format!("element <{open}> is never closed")));
    }
    if !state.root_done {
        return Err(XmlError::Malformed("document has no root element".into()));
    }
    Ok(CanonicalXml {
        text: state.out,
        elements: state.elements,
    })
}

#[derive(Default)]
struct Canonicalizer {
    entities: HashMap<String, String>,
    out: String,
    /// Qualified names of open elements.
    stack: Vec<String>,
    /// Namespace declarations per open element; `""` is the default prefix.
    scopes: Vec<HashMap<String, String>>,
    elements: Vec<ElementName>,
    root_done: bool,
}

impl Canonicalizer {
    fn open(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<(), XmlError> {
        if self.stack.is_empty() && self.root_done {
            return Err(XmlError::Malformed("more than one root element".into()));
        }
        let name = utf8(start.name().as_ref())?;

        let mut attributes = Vec::new();
        let mut declarations = HashMap::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| XmlError::Malformed(e.to_string()))?;
            let key = utf8(attribute.key.as_ref())?;
            let value = self.unescape(&utf8(&attribute.value)?)?;
            if key == "xmlns" {
                declarations.insert(String::new(), value.clone());
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.insert(prefix.to_string(), value.clone());
            }
            attributes.push((key, value));
        }
        attributes.sort_by(|a, b| a.0.cmp(&b.0));
        self.scopes.push(declarations);

        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", name.as_str()),
        };
        let namespace = self.resolve(prefix);
        if namespace.is_none() && !prefix.is_empty() && prefix != "xml" {
            return Err(XmlError::Malformed(format!("unbound namespace prefix in <{name}>")));
        }
        self.elements.push(ElementName {
            depth: self.stack.len(),
            namespace,
            local: local.to_string(),
        });

        self.out.push('<');
        self.out.push_str(&name);
        for (key, value) in &attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&escape(value.as_str()));
            self.out.push('"');
        }
        if empty {
            self.out.push_str("/>");
            self.scopes.pop();
            if self.stack.is_empty() {
                self.root_done = true;
            }
        } else {
            self.out.push('>');
            self.stack.push(name);
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), XmlError> {
        match self.stack.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(XmlError::Malformed(format!(
                    "</{name}> does not close <{open}>"
                )))
            }
            None => return Err(XmlError::Malformed(format!("unexpected </{name}>"))),
        }
        self.scopes.pop();
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        if self.stack.is_empty() {
            self.root_done = true;
        }
        Ok(())
    }

    fn text(&mut self, value: &str) -> Result<(), XmlError> {
        if self.stack.is_empty() {
            return Err(XmlError::Malformed("text outside the root element".into()));
        }
        self.out.push_str(&escape(value));
        Ok(())
    }

    fn unescape(&self, raw: &str) -> Result<String, XmlError> {
        unescape_with(raw, |entity| self.entities.get(entity).map(String::as_str))
            .map(|value| value.into_owned())
            .map_err(|e| XmlError::Malformed(e.to_string()))
    }

    fn resolve(&self, prefix: &str) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix))
            .cloned()
    }
}

fn utf8(bytes: &[u8]) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlError::Malformed(format!("not UTF-8: {e}")))
}

/// `<!ENTITY name "value">` declarations of a DOCTYPE internal subset.
/// Parameter and external entities are ignored.
fn internal_entities(doctype: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let mut rest = doctype;
    while let Some(at) = rest.find("<!ENTITY") {
        rest = rest[at + "<!ENTITY".len()..].trim_start();
        if rest.starts_with('%') {
            continue;
        }
        let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let body = &rest[1..];
        let Some(close) = body.find(quote) else {
            break;
        };
        entities.insert(name.to_string(), body[..close].to_string());
        rest = &body[close + 1..];
    }
    entities
}

// ---------------------------------------------------------------------------
// System metadata streams
// ---------------------------------------------------------------------------

/// Whether `datastream_id` names a system metadata stream that must be
/// InlineXML and schema-checked.
pub fn is_system_stream(datastream_id: &str) -> bool {
    matches!(datastream_id, "DC" | "RELS-EXT")
}

/// Schema check for system metadata streams; other ids pass unchecked.
pub fn validate_system_stream(datastream_id: &str, xml: &CanonicalXml) -> Result<(), XmlError> {
    let fail = |reason: String| XmlError::Schema {
        datastream: datastream_id.to_string(),
        reason,
    };
    let root = xml.elements.first();
    let in_ns = |element: &ElementName, ns: &str| element.namespace.as_deref() == Some(ns);

    match datastream_id {
        "DC" => {
            match root {
                Some(root) if root.local == "dc" && in_ns(root, OAI_DC_NS) => {}
                _ => return Err(fail(format!("root element must be dc in {OAI_DC_NS}"))),
            }
            for element in &xml.elements[1..] {
                if element.depth > 1 {
                    return Err(fail(format!("nested element {} not allowed", element.local)));
                }
                if !in_ns(element, DC_NS) || !DC_ELEMENTS.contains(&element.local.as_str()) {
                    return Err(fail(format!("{} is not a Dublin Core element", element.local)));
                }
            }
            Ok(())
        }
        "RELS-EXT" => {
            match root {
                Some(root) if root.local == "RDF" && in_ns(root, RDF_NS) => {}
                _ => return Err(fail(format!("root element must be RDF in {RDF_NS}"))),
            }
            for element in xml.elements[1..].iter().filter(|e| e.depth == 1) {
                if element.local != "Description" || !in_ns(element, RDF_NS) {
                    return Err(fail(format!("{} is not an rdf:Description", element.local)));
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Object rendering
// ---------------------------------------------------------------------------

fn date(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

/// Read-only XML rendering of an object's committed state.
pub fn render_object(object: &DigitalObject) -> String {
    let mut out = String::new();
    out.push_str("<digitalObject");
    attr(&mut out, "xmlns", OBJECT_XML_NS);
    attr(&mut out, "pid", &object.pid.to_string());
    out.push('>');

    out.push_str("<objectProperties");
    attr(&mut out, "label", &object.label);
    attr(&mut out, "ownerId", &object.owner_id);
    attr(&mut out, "state", object.state.code());
    attr(&mut out, "created", &date(&object.created));
    attr(&mut out, "lastModified", &date(&object.last_modified));
    out.push_str("/>");

    for datastream in object.datastreams() {
        out.push_str("<datastream");
        attr(&mut out, "id", datastream.id.as_str());
        attr(&mut out, "controlGroup", datastream.control_group.code());
        attr(&mut out, "state", datastream.state.code());
        attr(&mut out, "versionable", if datastream.versionable { "true" } else { "false" });
        out.push('>');
        for version in datastream.versions() {
            out.push_str("<datastreamVersion");
            attr(&mut out, "id", &version.version_id);
            attr(&mut out, "label", &version.label);
            attr(&mut out, "mimeType", &version.mime_type);
            attr(&mut out, "created", &date(&version.created));
            if let Some(format_uri) = &version.format_uri {
                attr(&mut out, "formatUri", format_uri);
            }
            if let Some(size) = version.size {
                attr(&mut out, "size", &size.to_string());
            }
            attr(&mut out, "checksumType", &version.checksum_type);
            if let Some(checksum) = &version.checksum {
                attr(&mut out, "checksum", checksum);
            }
            out.push('>');
            for alt_id in &version.alt_ids {
                out.push_str("<altId>");
                out.push_str(&escape(alt_id.as_str()));
                out.push_str("</altId>");
            }
            match &version.content {
                VersionContent::Inline(xml) => {
                    out.push_str("<xmlContent>");
                    out.push_str(xml);
                    out.push_str("</xmlContent>");
                }
                VersionContent::Location(location) => {
                    out.push_str("<contentLocation");
                    attr(&mut out, "ref", location);
                    out.push_str("/>");
                }
            }
            out.push_str("</datastreamVersion>");
        }
        out.push_str("</datastream>");
    }

    out.push_str("<auditTrail>");
    for record in object.audit_trail.records() {
        out.push_str("<record");
        attr(&mut out, "id", &record.id);
        attr(&mut out, "action", record.action.as_str());
        if let Some(component) = &record.component_id {
            attr(&mut out, "componentId", component);
        }
        attr(&mut out, "responsibility", &record.responsibility);
        attr(&mut out, "date", &date(&record.date));
        out.push('>');
        out.push_str(&escape(record.justification.as_str()));
        out.push_str("</record>");
    }
    out.push_str("</auditTrail>");

    out.push_str("<relationships>");
    for tuple in object.relationships.iter() {
        out.push_str("<relationship");
        attr(&mut out, "subject", &tuple.subject);
        attr(&mut out, "predicate", &tuple.predicate);
        attr(&mut out, "object", tuple.object.value());
        attr(&mut out, "literal", if tuple.is_literal() { "true" } else { "false" });
        if let arca_rels::RelObject::Literal {
            datatype: Some(datatype),
            ..
        } = &tuple.object
        {
            attr(&mut out, "datatype", datatype);
        }
        out.push_str("/>");
    }
    out.push_str("</relationships>");

    out.push_str("</digitalObject>");
    out
}
