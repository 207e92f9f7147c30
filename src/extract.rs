//! Text extraction from the supported document formats.
//!
//! Plain-text formats are read as UTF-8. PDF text comes from `pdf_oxide`,
//! one page per paragraph. DOCX and PPTX are zip containers of
//! WordprocessingML / PresentationML parts; their text runs are pulled out
//! of the XML directly.

use std::{fs::File, io::Read, path::Path};

use crate::{
    error::{Error, Result},
    walker::extension_of,
};

/// Converts a file on disk into plain text.
///
/// Implementations return [`Error::Extraction`] for anything that only
/// affects the one file, so the indexer can skip it and carry on.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Extractor dispatching on the file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        match extension_of(path).as_str() {
            ".txt" | ".md" => extract_plain(path),
            ".pdf" => extract_pdf(path),
            ".docx" => extract_docx(path),
            ".pptx" => extract_pptx(path),
            other => Err(Error::extraction(
                path,
                format!("unsupported file type '{other}'"),
            )),
        }
    }
}

fn extract_plain(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::extraction(path, e))
}

fn extract_pdf(path: &Path) -> Result<String> {
    let mut doc = pdf_oxide::PdfDocument::open(path)
        .map_err(|e| Error::extraction(path, e))?;
    let page_count = doc.page_count().map_err(|e| Error::extraction(path, e))?;

    let mut pages = Vec::with_capacity(page_count);
    for page in 0..page_count {
        pages.push(
            doc.extract_text(page)
                .map_err(|e| Error::extraction(path, e))?,
        );
    }
    Ok(pages.join("\n"))
}

fn open_zip(path: &Path) -> Result<zip::ZipArchive<File>> {
    let file = File::open(path).map_err(|e| Error::extraction(path, e))?;
    zip::ZipArchive::new(file).map_err(|e| Error::extraction(path, e))
}

fn read_zip_entry(
    archive: &mut zip::ZipArchive<File>,
    path: &Path,
    name: &str,
) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| Error::extraction(path, format!("{name}: {e}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| Error::extraction(path, format!("{name}: {e}")))?;
    Ok(xml)
}

fn extract_docx(path: &Path) -> Result<String> {
    let mut archive = open_zip(path)?;
    let xml = read_zip_entry(&mut archive, path, "word/document.xml")?;
    Ok(xml_text(&xml, "w:t", "w:p"))
}

fn extract_pptx(path: &Path) -> Result<String> {
    let mut archive = open_zip(path)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort();

    if slides.is_empty() {
        return Err(Error::extraction(path, "presentation has no slides"));
    }

    let mut texts = Vec::with_capacity(slides.len());
    for (_, name) in &slides {
        let xml = read_zip_entry(&mut archive, path, name)?;
        texts.push(xml_text(&xml, "a:t", "a:p"));
    }
    Ok(texts.join("\n"))
}

/// Collect the character data of every `text_tag` element, ending each
/// `para_tag` element with a newline.
fn xml_text(xml: &str, text_tag: &str, para_tag: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            break;
        };
        let tag = &after[..close];
        rest = &after[close + 1..];

        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();

        if name == text_tag && !self_closing {
            let end = rest.find('<').unwrap_or(rest.len());
            out.push_str(&unescape_xml(&rest[..end]));
            rest = &rest[end..];
        } else if name.strip_prefix('/') == Some(para_tag) {
            out.push('\n');
        }
    }

    out.trim_end().to_string()
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            out.push_str(&rest[amp..]);
            return out;
        };
        let entity = &after[..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#')?.parse().ok())
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
