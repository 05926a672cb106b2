// DOCX files are zip archives; the body lives in word/document.xml.
use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::LexError;

pub fn extract_docx_text(bytes: &[u8]) -> Result<String, LexError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| LexError::ExtractionFailed(format!("DOCX is not a zip archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| LexError::ExtractionFailed("word/document.xml not found".into()))?
        .read_to_string(&mut xml)
        .map_err(|e| LexError::ExtractionFailed(format!("reading word/document.xml: {e}")))?;

    Ok(document_xml_to_text(&xml))
}

/// Keep run text (`<w:t>`) and in-run tabs and breaks; end each paragraph
/// with a blank line.
/// Everything else (styles, properties, fields) is dropped.
pub fn document_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    let mut in_text = false;
    let mut in_run = false;
    let mut rest = xml;

    while let Some(lt) = rest.find('<') {
        if in_text {
            out.push_str(&unescape(&rest[..lt]));
        }
        let Some(gt) = rest[lt..].find('>') else {
            break;
        };
        let tag = &rest[lt + 1..lt + gt];
        rest = &rest[lt + gt + 1..];

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();

        match (name, closing) {
            ("w:t", false) => in_text = !self_closing,
            ("w:t", true) => in_text = false,
            ("w:r", false) => in_run = !self_closing,
            ("w:r", true) => in_run = false,
            ("w:tab", false) if in_run => out.push('\t'),
            ("w:br" | "w:cr", false) if in_run => out.push('\n'),
            ("w:p", true) => out.push_str("\n\n"),
            ("w:p", false) if self_closing => out.push_str("\n\n"),
            _ => {}
        }
    }

    collapse_blank_lines(out.trim())
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(c);
    }
    out
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let Some(semi) = after.find(';') else {
            out.push_str(after);
            return out;
        };
        let entity = &after[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            e if e.starts_with("#x") || e.starts_with("#X") => {
                u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
            }
            e if e.starts_with('#') => e[1..].parse().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
