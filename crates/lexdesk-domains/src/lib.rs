pub mod courtlistener;
pub mod uscis;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use lexdesk_core::forms::FormTemplate;
use serde::Deserialize;
use tracing::info;

/// Return all built-in USCIS form templates.
pub fn all_forms() -> Vec<FormTemplate> {
    uscis::builtin_forms()
}

// ── Catalog ──────────────────────────────────────────────────────────────

/// Form templates available to the export flow, keyed by upper-cased id.
#[derive(Debug, Clone)]
pub struct FormCatalog {
    forms: BTreeMap<String, FormTemplate>,
}

/// A catalog file is either a list of templates or a map of id → template
/// body.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<FormTemplate>),
    Map(BTreeMap<String, CatalogEntry>),
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    pdf_url: String,
    #[serde(default)]
    fields: BTreeMap<String, lexdesk_core::forms::FieldTarget>,
}

impl FormCatalog {
    pub fn builtin() -> Self {
        let mut catalog = Self {
            forms: BTreeMap::new(),
        };
        catalog.extend(all_forms());
        catalog
    }

    /// Built-in forms overlaid with the templates in a JSON file. An empty
    /// path yields just the built-ins.
    pub fn load(path: &str) -> Result<Self> {
        let mut catalog = Self::builtin();
        if path.is_empty() {
            return Ok(catalog);
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading form catalog {path}"))?;
        let loaded = parse_catalog(&data).with_context(|| format!("parsing form catalog {path}"))?;
        info!(path, forms = loaded.len(), "form catalog loaded");
        catalog.extend(loaded);
        Ok(catalog)
    }

    fn extend(&mut self, forms: impl IntoIterator<Item = FormTemplate>) {
        for form in forms {
            self.forms.insert(form.form_id.to_ascii_uppercase(), form);
        }
    }

    pub fn get(&self, form_id: &str) -> Option<&FormTemplate> {
        self.forms.get(&form_id.to_ascii_uppercase())
    }

    pub fn list(&self) -> impl Iterator<Item = &FormTemplate> {
        self.forms.values()
    }
}

pub fn parse_catalog(json: &str) -> Result<Vec<FormTemplate>> {
    Ok(match serde_json::from_str::<CatalogFile>(json)? {
        CatalogFile::List(forms) => forms,
        CatalogFile::Map(entries) => entries
            .into_iter()
            .map(|(form_id, e)| FormTemplate {
                title: if e.title.is_empty() { form_id.clone() } else { e.title },
                form_id,
                pdf_url: e.pdf_url,
                fields: e.fields,
            })
            .collect(),
    })
}
