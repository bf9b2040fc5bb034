#![forbid(unsafe_code)]

//! Input decoding for documents handed over as bytes.
//!
//! The parser works on `&str`, so byte input is decoded first: a UTF-8 or
//! UTF-16 byte order mark wins, otherwise the `encoding` pseudo-attribute
//! of the XML declaration decides, otherwise UTF-8.  After a non-UTF-8
//! decode the declaration is rewritten to name UTF-8.

use sigtuna_core::Error;
use std::borrow::Cow;

const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

/// Decode `data` into XML text.
pub fn decode(data: &[u8]) -> Result<Cow<'_, str>, Error> {
    if let Some(rest) = data.strip_prefix(UTF8_BOM) {
        return utf8(rest).map(Cow::Borrowed);
    }
    match data {
        [0xfe, 0xff, rest @ ..] => return utf16(rest, u16::from_be_bytes).map(Cow::Owned),
        [0xff, 0xfe, rest @ ..] => return utf16(rest, u16::from_le_bytes).map(Cow::Owned),
        _ => {}
    }

    let label = declared_encoding(data).map(|l| l.to_ascii_lowercase());
    let text = match label.as_deref() {
        None | Some("utf-8") | Some("utf8") => return utf8(data).map(Cow::Borrowed),
        Some("iso-8859-1") | Some("latin1") | Some("iso_8859-1") | Some("l1") => {
            data.iter().map(|&b| char::from(b)).collect::<String>()
        }
        Some("us-ascii") | Some("ascii") => {
            if let Some(pos) = data.iter().position(|b| !b.is_ascii()) {
                return Err(Error::XmlParse(format!(
                    "non-ASCII byte at offset {pos} in US-ASCII document"
                )));
            }
            return utf8(data).map(Cow::Borrowed);
        }
        Some(other) => {
            return Err(Error::XmlParse(format!("unsupported encoding: {other}")));
        }
    };
    tracing::trace!(encoding = ?label, "decoded non-UTF-8 input");
    Ok(Cow::Owned(relabel_utf8(text)))
}

fn utf8(data: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(data).map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))
}

fn utf16(data: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, Error> {
    if data.len() % 2 != 0 {
        return Err(Error::XmlParse("truncated UTF-16 input".into()));
    }
    let units = data.chunks_exact(2).map(|c| unit([c[0], c[1]]));
    let text: String = char::decode_utf16(units)
        .collect::<Result<_, _>>()
        .map_err(|e| Error::XmlParse(format!("invalid UTF-16: {e}")))?;
    Ok(relabel_utf8(text))
}

/// The `encoding` value of a leading `<?xml ...?>` declaration.
fn declared_encoding(data: &[u8]) -> Option<&str> {
    let decl = xml_declaration(data)?;
    let at = decl.find("encoding")?;
    let rest = decl[at + "encoding".len()..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|q| *q == '"' || *q == '\'')?;
    let value = &rest[1..];
    value.find(quote).map(|end| &value[..end])
}

fn xml_declaration(data: &[u8]) -> Option<&str> {
    if !data.starts_with(b"<?xml") {
        return None;
    }
    let end = data.windows(2).position(|w| w == b"?>")?;
    std::str::from_utf8(&data[..end + 2]).ok()
}

/// Rewrite the declared encoding of already-decoded text to UTF-8.
fn relabel_utf8(text: String) -> String {
    let Some(label) = declared_encoding(text.as_bytes()).map(str::to_owned) else {
        return text;
    };
    let Some(decl_end) = text.find("?>") else {
        return text;
    };
    let (decl, body) = text.split_at(decl_end);
    format!("{}{body}", decl.replacen(&label, "UTF-8", 1))
}
