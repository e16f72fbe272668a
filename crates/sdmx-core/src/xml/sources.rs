//! Reader for `<sources>` descriptor files.

use std::io::BufRead;

use crate::driver::{SdmxSource, SdmxSourceBuilder};
use crate::xml::stream::{attr, Tok, XmlStream};
use crate::{SdmxError, ValidationError};

/// Reads every `<source>` of a descriptor document, in document order.
pub fn read_sources<R: BufRead>(source: R) -> Result<Vec<SdmxSource>, SdmxError> {
    let mut stream = XmlStream::new(source);
    loop {
        match stream.next()? {
            Tok::Start { name, .. } if name == "sources" => break,
            Tok::Start { name, .. } => {
                return Err(invalid(format!("expected <sources> root, found <{name}>")))
            }
            Tok::Eof => return Err(invalid("empty document")),
            Tok::End { .. } | Tok::Text(_) => {}
        }
    }

    let mut sources = Vec::new();
    loop {
        match stream.next()? {
            Tok::Start { name, .. } if name == "source" => {
                sources.push(read_source(&mut stream)?);
            }
            Tok::Start { .. } => stream.skip_element()?,
            Tok::End { name } if name == "sources" => return Ok(sources),
            Tok::End { .. } | Tok::Text(_) => {}
            Tok::Eof => return Err(invalid("unterminated <sources>")),
        }
    }
}

fn read_source<R: BufRead>(stream: &mut XmlStream<R>) -> Result<SdmxSource, SdmxError> {
    let mut builder = SdmxSourceBuilder::default();
    loop {
        match stream.next()? {
            Tok::Start { name, attrs, .. } => {
                builder = match name.as_str() {
                    "name" => builder.name(stream.read_text()?),
                    "description" => builder.description(stream.read_text()?),
                    "driver" => builder.driver(stream.read_text()?),
                    "endpoint" => builder.endpoint(stream.read_text()?.trim()),
                    "property" => {
                        let key = attr(&attrs, "key")
                            .ok_or_else(|| invalid("<property> without key"))?
                            .to_owned();
                        let value = attr(&attrs, "value").unwrap_or_default().to_owned();
                        stream.skip_element()?;
                        builder.property(key, value)
                    }
                    _ => {
                        stream.skip_element()?;
                        builder
                    }
                };
            }
            Tok::End { name } if name == "source" => return Ok(builder.build()?),
            Tok::End { .. } | Tok::Text(_) => {}
            Tok::Eof => return Err(invalid("unterminated <source>")),
        }
    }
}

fn invalid(reason: impl Into<String>) -> SdmxError {
    ValidationError::InvalidDescriptor {
        reason: reason.into(),
    }
    .into()
}
