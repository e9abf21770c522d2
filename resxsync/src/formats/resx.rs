//! Support for .NET `.resx` resource files.
//!
//! String `<data>` nodes become [`ResourceEntry`] values. Nodes carrying a `type` or `mimetype`
//! attribute (embedded images, file references, serialized objects) are kept as raw XML in an
//! [`OpaqueEntry`] and emitted unchanged. `<assembly>` aliases are preserved as well, since typed
//! nodes may refer to them.

use std::{
    fs::File,
    io::{BufRead, Read, Write},
    path::Path,
};

use indoc::indoc;
use quick_xml::{
    Reader, Writer,
    escape::escape,
    events::{BytesStart, Event},
};
use tracing::debug;

use crate::{
    error::Error,
    traits::{Parser, ResourceStore},
    types::{OpaqueEntry, ResourceEntry, ResourceNode},
};

const RESX_HEADER: &str = indoc! {r#"
    <?xml version="1.0" encoding="utf-8"?>
    <root>
      <resheader name="resmimetype">
        <value>text/microsoft-resx</value>
      </resheader>
      <resheader name="version">
        <value>2.0</value>
      </resheader>
      <resheader name="reader">
        <value>System.Resources.ResXResourceReader, System.Windows.Forms, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089</value>
      </resheader>
      <resheader name="writer">
        <value>System.Resources.ResXResourceWriter, System.Windows.Forms, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089</value>
      </resheader>
"#};

/// In-memory form of one `.resx` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResxDocument {
    /// Raw `<assembly>` elements, in document order.
    pub assemblies: Vec<String>,
    pub nodes: Vec<ResourceNode>,
}

impl Parser for ResxDocument {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut xml_reader = Reader::from_reader(reader);

        let mut buf = Vec::new();
        let mut doc = ResxDocument::default();

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.name().as_ref() == b"data" => {
                    let start = e.into_owned();
                    let attrs = DataAttributes::from_start(&start)?;
                    if attrs.typed {
                        let raw = capture_raw(&mut xml_reader, start)?;
                        doc.nodes.push(ResourceNode::Opaque(OpaqueEntry {
                            key: attrs.name,
                            raw,
                        }));
                    } else {
                        let entry = parse_string_data(&mut xml_reader, attrs.name)?;
                        doc.nodes.push(ResourceNode::Text(entry));
                    }
                }
                Event::Empty(e) if e.name().as_ref() == b"data" => {
                    let attrs = DataAttributes::from_start(&e)?;
                    if attrs.typed {
                        let raw = serialize_event(Event::Empty(e))?;
                        doc.nodes.push(ResourceNode::Opaque(OpaqueEntry {
                            key: attrs.name,
                            raw,
                        }));
                    } else {
                        doc.nodes
                            .push(ResourceNode::Text(ResourceEntry::new(attrs.name, "")));
                    }
                }
                Event::Start(e) if e.name().as_ref() == b"assembly" => {
                    let start = e.into_owned();
                    doc.assemblies.push(capture_raw(&mut xml_reader, start)?);
                }
                Event::Empty(e) if e.name().as_ref() == b"assembly" => {
                    doc.assemblies.push(serialize_event(Event::Empty(e))?);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(doc)
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        let mut content = String::from(RESX_HEADER);

        for assembly in &self.assemblies {
            content.push_str("  ");
            content.push_str(assembly);
            content.push('\n');
        }

        for node in &self.nodes {
            match node {
                ResourceNode::Text(entry) => {
                    content.push_str(&format!(
                        "  <data name=\"{}\" xml:space=\"preserve\">\n",
                        escape(entry.key.as_str())
                    ));
                    content.push_str(&format!(
                        "    <value>{}</value>\n",
                        escape(entry.value.as_str())
                    ));
                    if let Some(comment) = &entry.comment {
                        content.push_str(&format!(
                            "    <comment>{}</comment>\n",
                            escape(comment.as_str())
                        ));
                    }
                    content.push_str("  </data>\n");
                }
                ResourceNode::Opaque(entry) => {
                    content.push_str("  ");
                    content.push_str(&entry.raw);
                    content.push('\n');
                }
            }
        }

        content.push_str("</root>\n");
        writer.write_all(content.as_bytes()).map_err(Error::Io)
    }

    /// Override default file reading to support BOM-aware decoding (UTF-16 files saved by older
    /// tooling are common).
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let file = File::open(path).map_err(Error::Io)?;
        let mut decoder = encoding_rs_io::DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding_rs::UTF_8))
            .bom_override(true)
            .build(file);

        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).map_err(Error::Io)?;

        Self::from_str(&decoded)
    }
}

struct DataAttributes {
    name: String,
    typed: bool,
}

impl DataAttributes {
    fn from_start(e: &BytesStart) -> Result<Self, Error> {
        let mut name = None;
        let mut typed = false;

        for attr in e.attributes().with_checks(false) {
            let attr = attr.map_err(|e| Error::InvalidResource(e.to_string()))?;
            match attr.key.as_ref() {
                b"name" => name = Some(attr.unescape_value()?.to_string()),
                b"type" | b"mimetype" => typed = true,
                _ => {}
            }
        }

        let name =
            name.ok_or_else(|| Error::InvalidResource("data tag missing 'name'".to_string()))?;
        Ok(DataAttributes { name, typed })
    }
}

fn parse_string_data<R: BufRead>(
    xml_reader: &mut Reader<R>,
    key: String,
) -> Result<ResourceEntry, Error> {
    let mut entry = ResourceEntry::new(key, "");
    let mut buf = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"value" => {
                entry.value = read_text(xml_reader, b"value")?;
            }
            Event::Start(e) if e.name().as_ref() == b"comment" => {
                entry.comment = Some(read_text(xml_reader, b"comment")?);
            }
            Event::Empty(e) if e.name().as_ref() == b"comment" => {
                entry.comment = Some(String::new());
            }
            Event::End(e) if e.name().as_ref() == b"data" => break,
            Event::Eof => {
                return Err(Error::InvalidResource(format!(
                    "unexpected end of file inside data `{}`",
                    entry.key
                )));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(entry)
}

fn read_text<R: BufRead>(xml_reader: &mut Reader<R>, end: &[u8]) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(e) if e.name().as_ref() == end => break,
            Event::Eof => {
                return Err(Error::InvalidResource(
                    "unexpected end of file inside element".to_string(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Re-emits the element opened by `start`, including all of its children, as a string.
fn capture_raw<R: BufRead>(
    xml_reader: &mut Reader<R>,
    start: BytesStart<'static>,
) -> Result<String, Error> {
    let name = start.name().as_ref().to_vec();
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(start))?;

    let mut depth = 0usize;
    let mut buf = Vec::new();
    loop {
        let event = xml_reader.read_event_into(&mut buf)?;
        let closes = match &event {
            Event::Start(e) if e.name().as_ref() == name.as_slice() => {
                depth += 1;
                false
            }
            Event::End(e) if e.name().as_ref() == name.as_slice() => {
                if depth == 0 {
                    true
                } else {
                    depth -= 1;
                    false
                }
            }
            Event::Eof => {
                return Err(Error::InvalidResource(
                    "unexpected end of file inside typed data".to_string(),
                ));
            }
            _ => false,
        };
        writer.write_event(event)?;
        if closes {
            break;
        }
        buf.clear();
    }

    String::from_utf8(writer.into_inner()).map_err(|e| Error::InvalidResource(e.to_string()))
}

fn serialize_event(event: Event) -> Result<String, Error> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(event)?;
    String::from_utf8(writer.into_inner()).map_err(|e| Error::InvalidResource(e.to_string()))
}

/// [`ResourceStore`] backed by `.resx` files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResxStore;

impl ResourceStore for ResxStore {
    fn read(&self, path: &Path) -> Result<Vec<ResourceNode>, Error> {
        debug!(path = %path.display(), "reading resx");
        Ok(ResxDocument::read_from(path)?.nodes)
    }

    fn write(&self, path: &Path, nodes: &[ResourceNode]) -> Result<(), Error> {
        debug!(path = %path.display(), nodes = nodes.len(), "writing resx");
        let assemblies = if path.exists() {
            ResxDocument::read_from(path)?.assemblies
        } else {
            Vec::new()
        };
        ResxDocument {
            assemblies,
            nodes: nodes.to_vec(),
        }
        .write_to(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root>
  <resheader name="resmimetype">
    <value>text/microsoft-resx</value>
  </resheader>
  <assembly alias="System.Drawing" name="System.Drawing, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b03f5f7f11d50a3a" />
  <data name="Greeting" xml:space="preserve">
    <value>Hello &amp; welcome</value>
    <comment>Shown on the start page</comment>
  </data>
  <data name="Logo" type="System.Drawing.Bitmap, System.Drawing" mimetype="application/x-microsoft.net.object.bytearray.base64">
    <value>iVBORw0KGgo=</value>
  </data>
  <data name="Empty" />
  <data name="Farewell" xml:space="preserve">
    <value>  Bye  </value>
  </data>
</root>
"#;

    #[test]
    fn test_parse_string_and_typed_nodes() {
        let doc = ResxDocument::from_str(SAMPLE).unwrap();
        assert_eq!(doc.nodes.len(), 4);
        assert_eq!(doc.assemblies.len(), 1);

        let greeting = doc.nodes[0].as_text().unwrap();
        assert_eq!(greeting.key, "Greeting");
        assert_eq!(greeting.value, "Hello & welcome");
        assert_eq!(greeting.comment.as_deref(), Some("Shown on the start page"));

        match &doc.nodes[1] {
            ResourceNode::Opaque(opaque) => {
                assert_eq!(opaque.key, "Logo");
                assert!(opaque.raw.starts_with("<data name=\"Logo\""));
                assert!(opaque.raw.contains("iVBORw0KGgo="));
                assert!(opaque.raw.ends_with("</data>"));
            }
            other => panic!("expected opaque node, got {other:?}"),
        }

        assert_eq!(doc.nodes[2].as_text().unwrap().value, "");
        assert_eq!(doc.nodes[3].as_text().unwrap().value, "  Bye  ");
    }

    #[test]
    fn test_empty_input_has_no_entries() {
        let doc = ResxDocument::from_str("").unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.assemblies.is_empty());
    }

    #[test]
    fn test_missing_name_attribute() {
        let result = ResxDocument::from_str("<root><data><value>x</value></data></root>");
        let err = format!("{:?}", result.unwrap_err());
        assert!(err.contains("missing 'name'"));
    }

    #[test]
    fn test_unterminated_data_is_rejected() {
        assert!(ResxDocument::from_str("<root><data name=\"A\"><value>x</value>").is_err());
    }

    #[test]
    fn test_written_document_reads_back_identically() {
        let doc = ResxDocument::from_str(SAMPLE).unwrap();
        let mut out = Vec::new();
        doc.to_writer(&mut out).unwrap();
        let written = String::from_utf8(out).unwrap();

        assert!(written.contains("<value>text/microsoft-resx</value>"));
        assert!(written.contains("Hello &amp; welcome"));

        let reparsed = ResxDocument::from_str(&written).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_store_reads_utf16_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Strings.resx");
        let xml = "<root><data name=\"A\"><value>Ä</value></data></root>";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in xml.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        std::fs::write(&path, bytes).unwrap();

        let nodes = ResxStore.read(&path).unwrap();
        assert_eq!(nodes, vec![ResourceNode::Text(ResourceEntry::new("A", "Ä"))]);
    }

    #[test]
    fn test_store_write_keeps_existing_assemblies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Strings.resx");
        std::fs::write(&path, SAMPLE).unwrap();

        ResxStore
            .write(&path, &[ResourceEntry::new("Only", "one").into()])
            .unwrap();

        let doc = ResxDocument::read_from(&path).unwrap();
        assert_eq!(doc.assemblies.len(), 1);
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].key(), "Only");
    }

    #[test]
    fn test_store_reads_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Strings.fr.resx");
        std::fs::write(&path, "").unwrap();
        assert!(ResxStore.read(&path).unwrap().is_empty());
    }
}
