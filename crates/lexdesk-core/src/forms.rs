//! USCIS questionnaire export: map flat answers onto the AcroForm fields of a
//! downloaded government PDF.
//!
//! Filling is best-effort. A field that is missing from the PDF or is not a
//! text field is logged and recorded in the [`FillReport`]; the remaining
//! mappings are still applied.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::LexError;

// ── Templates ─────────────────────────────────────────────────────────────

/// Where one answer key lands in the PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTarget", into = "RawTarget")]
pub enum FieldTarget {
    Direct {
        field: String,
    },
    FullNameSplit {
        first_field: String,
        middle_field: String,
        last_field: String,
    },
}

/// Catalog files may write a direct mapping as a bare field name.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Field(String),
    Tagged(TaggedTarget),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum TaggedTarget {
    Direct {
        field: String,
    },
    FullNameSplit {
        first: String,
        middle: String,
        last: String,
    },
}

impl From<RawTarget> for FieldTarget {
    fn from(raw: RawTarget) -> Self {
        match raw {
            RawTarget::Field(field) | RawTarget::Tagged(TaggedTarget::Direct { field }) => {
                FieldTarget::Direct { field }
            }
            RawTarget::Tagged(TaggedTarget::FullNameSplit {
                first,
                middle,
                last,
            }) => FieldTarget::FullNameSplit {
                first_field: first,
                middle_field: middle,
                last_field: last,
            },
        }
    }
}

impl From<FieldTarget> for RawTarget {
    fn from(target: FieldTarget) -> Self {
        match target {
            FieldTarget::Direct { field } => RawTarget::Field(field),
            FieldTarget::FullNameSplit {
                first_field,
                middle_field,
                last_field,
            } => RawTarget::Tagged(TaggedTarget::FullNameSplit {
                first: first_field,
                middle: middle_field,
                last: last_field,
            }),
        }
    }
}

impl FieldTarget {
    pub fn direct(field: impl Into<String>) -> Self {
        FieldTarget::Direct {
            field: field.into(),
        }
    }

    pub fn name_split(
        first: impl Into<String>,
        middle: impl Into<String>,
        last: impl Into<String>,
    ) -> Self {
        FieldTarget::FullNameSplit {
            first_field: first.into(),
            middle_field: middle.into(),
            last_field: last.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub form_id: String,
    pub title: String,
    #[serde(default)]
    pub pdf_url: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldTarget>,
}

impl FormTemplate {
    /// A template without a PDF or without mappings cannot produce output.
    pub fn ensure_usable(&self) -> Result<(), LexError> {
        if self.pdf_url.trim().is_empty() {
            return Err(LexError::ConfigurationMissing(format!(
                "form {} has no pdf url",
                self.form_id
            )));
        }
        if self.fields.is_empty() {
            return Err(LexError::ConfigurationMissing(format!(
                "form {} has no field mappings",
                self.form_id
            )));
        }
        Ok(())
    }
}

// ── Name splitting ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub first: String,
    pub middle: String,
    pub last: String,
}

/// First token, last token, and everything in between.
///
/// `"Maria del Carmen Lopez"` → `Maria` / `del Carmen` / `Lopez`.
/// A single token only fills `first`.
pub fn split_name(full: Option<&str>) -> NameParts {
    let tokens: Vec<&str> = full.unwrap_or_default().split_whitespace().collect();
    match tokens.as_slice() {
        [] => NameParts::default(),
        [only] => NameParts {
            first: only.to_string(),
            ..NameParts::default()
        },
        [first, middle @ .., last] => NameParts {
            first: first.to_string(),
            middle: middle.join(" "),
            last: last.to_string(),
        },
    }
}

// ── Field writing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldWriteError {
    #[error("no field named {0}")]
    NoSuchField(String),
    #[error("field {field} is a {kind} field, not text")]
    NotText { field: String, kind: String },
}

/// Something that accepts text values by fully-qualified field name.
pub trait FieldSink {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FieldWriteError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedWrite {
    pub key: String,
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Fields that received a value.
    pub filled: Vec<String>,
    /// Answer keys with no usable value.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedWrite>,
}

/// Answers that count as "not provided" are skipped, never written.
fn answer_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Apply every mapping entry of `template` to `sink`.
pub fn apply_mappings(
    sink: &mut dyn FieldSink,
    template: &FormTemplate,
    answers: &Map<String, Value>,
) -> FillReport {
    let mut report = FillReport::default();

    for (key, target) in &template.fields {
        let Some(value) = answer_text(answers.get(key)) else {
            report.skipped.push(key.clone());
            continue;
        };

        let writes: Vec<(&str, String)> = match target {
            FieldTarget::Direct { field } => vec![(field.as_str(), value)],
            FieldTarget::FullNameSplit {
                first_field,
                middle_field,
                last_field,
            } => {
                let parts = split_name(Some(&value));
                [
                    (first_field.as_str(), parts.first),
                    (middle_field.as_str(), parts.middle),
                    (last_field.as_str(), parts.last),
                ]
                .into_iter()
                .filter(|(_, v)| !v.is_empty())
                .collect()
            }
        };

        for (field, text) in writes {
            match sink.set_text(field, &text) {
                Ok(()) => report.filled.push(field.to_string()),
                Err(e) => {
                    warn!(form = %template.form_id, key = %key, field = %field, "field write failed: {e}");
                    report.failed.push(FailedWrite {
                        key: key.clone(),
                        field: field.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    report
}

// ── AcroForm ──────────────────────────────────────────────────────────────

struct FieldEntry {
    id: ObjectId,
    kind: Option<String>,
}

/// An editable AcroForm loaded from PDF bytes.
pub struct PdfForm {
    doc: Document,
    fields: HashMap<String, FieldEntry>,
}

impl PdfForm {
    pub fn load(bytes: &[u8]) -> Result<Self, LexError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| LexError::FetchFailed(format!("template is not a readable PDF: {e}")))?;

        let roots = acroform(&doc)
            .and_then(|form| form.get(b"Fields").ok())
            .and_then(|fields| fields.as_array().ok())
            .cloned()
            .ok_or_else(|| LexError::ConfigurationMissing("template PDF has no AcroForm".into()))?;

        let mut fields = HashMap::new();
        collect_fields(&doc, &roots, "", None, &mut HashSet::new(), &mut fields);
        debug!(fields = fields.len(), "AcroForm loaded");

        Ok(Self { doc, fields })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Current value of a text field, if set.
    pub fn value(&self, field: &str) -> Option<String> {
        let entry = self.fields.get(field)?;
        let dict = self.doc.get_object(entry.id).ok()?.as_dict().ok()?;
        match dict.get(b"V").ok()? {
            Object::String(bytes, _) => Some(decode_pdf_text(bytes)),
            _ => None,
        }
    }

    /// Serialize with `NeedAppearances` on and any XFA packet removed, so
    /// viewers render the AcroForm values instead of the XFA layer.
    pub fn finish(self) -> Result<Vec<u8>, LexError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Same as [`PdfForm::finish`], writing into `target`. A write failure
    /// is an export failure, reported as `Storage`.
    pub fn write_to<W: std::io::Write>(mut self, target: &mut W) -> Result<(), LexError> {
        if let Some(form) = acroform_mut(&mut self.doc) {
            form.set("NeedAppearances", Object::Boolean(true));
            form.remove(b"XFA");
        }
        self.doc
            .save_to(target)
            .map_err(|e| LexError::Storage(format!("writing filled PDF: {e}")))
    }
}

impl FieldSink for PdfForm {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FieldWriteError> {
        let entry = self
            .fields
            .get(field)
            .ok_or_else(|| FieldWriteError::NoSuchField(field.to_string()))?;
        if entry.kind.as_deref() != Some("Tx") {
            return Err(FieldWriteError::NotText {
                field: field.to_string(),
                kind: entry.kind.clone().unwrap_or_else(|| "untyped".into()),
            });
        }
        let dict = self
            .doc
            .get_object_mut(entry.id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| FieldWriteError::NoSuchField(field.to_string()))?;
        dict.set("V", encode_pdf_text(value));
        dict.remove(b"AP");
        Ok(())
    }
}

fn acroform(doc: &Document) -> Option<&Dictionary> {
    match doc.catalog().ok()?.get(b"AcroForm").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn acroform_mut(doc: &mut Document) -> Option<&mut Dictionary> {
    let reference = match doc.catalog().ok()?.get(b"AcroForm").ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    match reference {
        Some(id) => doc.get_object_mut(id).ok()?.as_dict_mut().ok(),
        None => doc
            .catalog_mut()
            .ok()?
            .get_mut(b"AcroForm")
            .ok()?
            .as_dict_mut()
            .ok(),
    }
}

/// Walk the field tree. A node with named kids is a container; anything else
/// is a terminal field (its unnamed kids are widget annotations). Each object
/// is visited at most once, so cyclic `Kids` chains terminate.
fn collect_fields(
    doc: &Document,
    nodes: &[Object],
    parent: &str,
    inherited_kind: Option<&str>,
    seen: &mut HashSet<ObjectId>,
    out: &mut HashMap<String, FieldEntry>,
) {
    for node in nodes {
        let Ok(id) = node.as_reference() else {
            continue;
        };
        if !seen.insert(id) {
            warn!(object = ?id, "AcroForm field tree revisits an object; skipped");
            continue;
        }
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            continue;
        };

        let partial = dict.get(b"T").ok().and_then(|t| match t {
            Object::String(bytes, _) => Some(decode_pdf_text(bytes)),
            _ => None,
        });
        let name = match (parent.is_empty(), partial) {
            (_, None) => parent.to_string(),
            (true, Some(p)) => p,
            (false, Some(p)) => format!("{parent}.{p}"),
        };
        let kind = dict
            .get(b"FT")
            .and_then(Object::as_name_str)
            .ok()
            .or(inherited_kind);

        let kids: Vec<Object> = dict
            .get(b"Kids")
            .and_then(Object::as_array)
            .map(|kids| {
                kids.iter()
                    .filter(|kid| {
                        kid.as_reference()
                            .and_then(|kid_id| doc.get_object(kid_id))
                            .and_then(Object::as_dict)
                            .is_ok_and(|d| d.has(b"T"))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !kids.is_empty() {
            collect_fields(doc, &kids, &name, kind, seen, out);
        } else if !name.is_empty() {
            out.insert(
                name,
                FieldEntry {
                    id,
                    kind: kind.map(str::to_string),
                },
            );
        }
    }
}

/// PDFDocEncoding covers ASCII; anything else goes out as UTF-16BE with BOM.
fn encode_pdf_text(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn decode_pdf_text(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

// ── Export ────────────────────────────────────────────────────────────────

/// Downloads official templates and produces filled PDFs.
pub struct FormFiller {
    http: reqwest::Client,
    proxy: String,
}

impl FormFiller {
    /// `proxy` is prepended to the url-encoded template address; an empty
    /// prefix fetches directly.
    pub fn new(proxy: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            proxy: proxy.into(),
        }
    }

    pub fn template_url(&self, pdf_url: &str) -> String {
        if self.proxy.is_empty() {
            pdf_url.to_string()
        } else {
            format!("{}{}", self.proxy, urlencoding::encode(pdf_url))
        }
    }

    pub async fn fetch_template(&self, pdf_url: &str) -> Result<Vec<u8>, LexError> {
        let url = self.template_url(pdf_url);
        debug!(url = %url, "fetching form template");
        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| LexError::FetchFailed(format!("{pdf_url}: {e}")))?
            .bytes()
            .await
            .map_err(|e| LexError::FetchFailed(format!("{pdf_url}: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// Fetch the template, apply answers and return the filled PDF.
    pub async fn fill(
        &self,
        template: &FormTemplate,
        answers: &Map<String, Value>,
    ) -> Result<(Vec<u8>, FillReport), LexError> {
        template.ensure_usable()?;
        let pdf = self.fetch_template(&template.pdf_url).await?;

        let template = template.clone();
        let answers = answers.clone();
        let (bytes, report) = tokio::task::spawn_blocking(move || {
            fill_pdf(&pdf, &template, &answers)
        })
        .await
        .map_err(|e| LexError::Storage(format!("form fill task aborted: {e}")))??;
        Ok((bytes, report))
    }
}

/// Load, fill and serialize in one step.
pub fn fill_pdf(
    pdf: &[u8],
    template: &FormTemplate,
    answers: &Map<String, Value>,
) -> Result<(Vec<u8>, FillReport), LexError> {
    let mut form = PdfForm::load(pdf)?;
    let report = apply_mappings(&mut form, template, answers);
    info!(
        form = %template.form_id,
        filled = report.filled.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "form filled"
    );
    Ok((form.finish()?, report))
}
