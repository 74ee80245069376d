use std::io::{Cursor, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::BytesRef;
use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::error::ExtractError;

/// Check that a file exists and is a regular file
pub fn validate_file_path(file_path: &str) -> Result<(), String> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {}", file_path));
    }
    if !path.is_file() {
        return Err(format!("Not a regular file: {}", file_path));
    }
    Ok(())
}

/// SHA-256 of the raw file bytes, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Open an Office Open XML container held in memory
pub fn open_ooxml(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, ExtractError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        ExtractError::Unreadable(format!("Failed to read file as ZIP archive: {}", e))
    })
}

/// Read one part of a ZIP container as UTF-8 text
pub fn read_archive_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .with_context(|| format!("Part not found in archive: {}", path))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .with_context(|| format!("Failed to read part: {}", path))?;

    Ok(content)
}

/// Check whether a ZIP container has a given part
pub fn archive_has_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> bool {
    archive.by_name(path).is_ok()
}

/// Strip a namespace prefix from an XML name ("w:p" -> "p")
pub fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Value of the attribute with the given local name, prefix ignored
pub fn attr_value(element: &quick_xml::events::BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

/// Resolve an entity reference (`&amp;`, `&#233;`, `&#x3042;`) to its text
pub fn resolve_entity(entity: &BytesRef) -> Option<String> {
    match entity.resolve_char_ref() {
        Ok(Some(ch)) => return Some(ch.to_string()),
        Ok(None) => {}
        Err(e) => {
            log::debug!("Invalid character reference: {}", e);
            return None;
        }
    }
    let name = entity.decode().ok()?;
    quick_xml::escape::resolve_predefined_entity(&name).map(str::to_string)
}

/// Decode raw XML text content, unescaping any entities left in it
pub fn decode_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match quick_xml::escape::unescape(&text) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.into_owned(),
    }
}

/// Trailing decimal number of a name ("slide12.xml" -> 12, "rId3" -> 3)
pub fn trailing_number(name: &str) -> Option<usize> {
    let stem = name.trim_end_matches(".xml").trim_end_matches(".rels");
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[digits_start..].parse().ok()
}
