use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::SdmxError;

/// Owned, namespace-resolved XML token.
///
/// Empty elements are expanded into a `Start`/`End` pair, and element and
/// attribute names are local names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    Start {
        name: String,
        namespace: Option<String>,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Text(String),
    Eof,
}

impl Tok {
    pub fn is_start(&self, expected: &str) -> bool {
        matches!(self, Self::Start { name, .. } if name == expected)
    }

    pub fn is_end(&self, expected: &str) -> bool {
        matches!(self, Self::End { name } if name == expected)
    }
}

/// Looks an attribute up by local name.
pub fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Pull parser producing [`Tok`] values.
pub struct XmlStream<R> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    depth: usize,
}

impl<R: BufRead> XmlStream<R> {
    pub fn new(source: R) -> Self {
        let mut reader = NsReader::from_reader(source);
        let config = reader.config_mut();
        config.trim_text(true);
        config.expand_empty_elements = true;
        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
        }
    }

    /// Reads the next token. Reaching the end of input inside an open element
    /// is an I/O error.
    pub fn next(&mut self) -> Result<Tok, SdmxError> {
        loop {
            self.buf.clear();
            let (resolved, event) = self.reader.read_resolved_event_into(&mut self.buf)?;
            match event {
                Event::Start(start) => {
                    self.depth += 1;
                    let namespace = match resolved {
                        ResolveResult::Bound(namespace) => {
                            Some(String::from_utf8_lossy(namespace.as_ref()).into_owned())
                        }
                        _ => None,
                    };
                    return Ok(Tok::Start {
                        name: local_name(start.local_name().as_ref()),
                        namespace,
                        attrs: attributes(&start)?,
                    });
                }
                Event::End(end) => {
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(Tok::End {
                        name: local_name(end.local_name().as_ref()),
                    });
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    if !text.is_empty() {
                        return Ok(Tok::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    return Ok(Tok::Text(
                        String::from_utf8_lossy(&data.into_inner()).into_owned(),
                    ));
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(SdmxError::io(format!(
                            "premature end of xml stream, {} element(s) left open",
                            self.depth
                        )));
                    }
                    return Ok(Tok::Eof);
                }
                _ => {}
            }
        }
    }

    /// Consumes tokens up to and including the end of the element whose start
    /// was just read.
    pub fn skip_element(&mut self) -> Result<(), SdmxError> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Tok::Start { .. } => depth += 1,
                Tok::End { .. } => depth -= 1,
                Tok::Text(_) => {}
                Tok::Eof => return Err(SdmxError::io("premature end of xml stream")),
            }
        }
        Ok(())
    }

    /// Concatenated text content of the element whose start was just read;
    /// consumes its end.
    pub fn read_text(&mut self) -> Result<String, SdmxError> {
        let mut text = String::new();
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Tok::Start { .. } => depth += 1,
                Tok::End { .. } => depth -= 1,
                Tok::Text(chunk) => text.push_str(&chunk),
                Tok::Eof => return Err(SdmxError::io("premature end of xml stream")),
            }
        }
        Ok(text)
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, SdmxError> {
    let mut result = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let name = local_name(attribute.key.local_name().as_ref());
        let value = attribute.unescape_value()?.into_owned();
        result.push((name, value));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_empty_elements_and_resolves_namespaces() {
        let xml = r#"<m:Root xmlns:m="urn:test"><m:Item id="1"/><Text>a &amp; b</Text></m:Root>"#;
        let mut stream = XmlStream::new(xml.as_bytes());

        let root = stream.next().expect("root");
        assert!(matches!(
            &root,
            Tok::Start { name, namespace: Some(ns), attrs } if name == "Root" && ns == "urn:test" && attrs.is_empty()
        ));
        let item = stream.next().expect("item");
        assert!(item.is_start("Item"));
        if let Tok::Start { attrs, .. } = &item {
            assert_eq!(attr(attrs, "id"), Some("1"));
        }
        assert!(stream.next().expect("item end").is_end("Item"));
        assert!(stream.next().expect("text start").is_start("Text"));
        assert_eq!(stream.read_text().expect("text"), "a & b");
        assert!(stream.next().expect("root end").is_end("Root"));
        assert_eq!(stream.next().expect("eof"), Tok::Eof);
    }

    #[test]
    fn truncated_input_is_an_io_error() {
        let mut stream = XmlStream::new("<Root><Series>".as_bytes());
        stream.next().expect("root");
        stream.next().expect("series");
        let err = stream.next().expect_err("truncated");
        assert_eq!(err.kind(), crate::SdmxErrorKind::Io);
    }
}
