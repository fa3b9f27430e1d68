//! Prompt catalogue → many images.
//!
//! A [`PromptCatalog`] is an ordered list of named prompts. [`run_batch`]
//! walks it sequentially, one API call at a time with a pause in between,
//! and records every outcome in a [`BatchReport`]. A failed item never stops
//! the batch.
//!
//! ## Catalogue formats
//!
//! ```json
//! { "images": [ { "name": "hero", "prompt": "…", "category": "site" } ] }
//! ```
//!
//! or, keyed and order-preserving:
//!
//! ```json
//! { "hero": { "name": "hero_v2", "prompt": "…", "category": "site" } }
//! ```
//!
//! `category` defaults to `general`; in the keyed form `name` defaults to
//! the key. Images are written to `<output_dir>/<category>/<name>.png`.

use crate::config::BatchConfig;
use crate::error::{ForgeError, ItemError};
use crate::imagegen::{request_with_retry, resolve_provider, save_images, ImageRequest};
use crate::output::{BatchReport, ItemOutcome, ItemStatus};
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

const BUILTIN_CATALOG: &str = include_str!("../assets/default_prompts.json");

/// Category used when an entry names none.
pub const DEFAULT_CATEGORY: &str = "general";

/// One named prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Selection key (`--single`).
    pub key: String,
    /// Output file stem.
    pub name: String,
    pub prompt: String,
    /// Output sub-directory.
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: Option<String>,
    prompt: String,
    category: Option<String>,
}

/// Ordered prompt catalogue.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    entries: Vec<CatalogEntry>,
}

impl PromptCatalog {
    /// The ten built-in portfolio prompts.
    pub fn builtin() -> Result<Self, ForgeError> {
        Self::from_json_str(BUILTIN_CATALOG, "built-in catalogue")
    }

    /// Reads a catalogue from a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ForgeError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ForgeError::CatalogLoad {
                source_name: path.display().to_string(),
                detail: e.to_string(),
            })?;
        Self::from_json_str(&text, &path.display().to_string())
    }

    /// Parses either catalogue format. `source_name` appears in errors.
    pub fn from_json_str(json: &str, source_name: &str) -> Result<Self, ForgeError> {
        let fail = |detail: String| ForgeError::CatalogLoad {
            source_name: source_name.to_string(),
            detail,
        };

        let value: Value = serde_json::from_str(json).map_err(|e| fail(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(fail("top level must be a JSON object".into()));
        };

        let images = match map.get("images") {
            Some(Value::Array(items)) => Some(items.clone()),
            _ => None,
        };

        let mut entries = Vec::new();
        match images {
            Some(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    let raw: RawEntry = serde_json::from_value(item)
                        .map_err(|e| fail(format!("images[{i}]: {e}")))?;
                    let name = raw
                        .name
                        .ok_or_else(|| fail(format!("images[{i}]: missing field `name`")))?;
                    entries.push(Self::entry(name.clone(), Some(name), raw.prompt, raw.category));
                }
            }
            None => {
                for (key, item) in map {
                    let raw: RawEntry = serde_json::from_value(item)
                        .map_err(|e| fail(format!("{key}: {e}")))?;
                    entries.push(Self::entry(key, raw.name, raw.prompt, raw.category));
                }
            }
        }

        for e in &entries {
            validate_component("name", &e.name).map_err(|r| fail(format!("{}: {r}", e.key)))?;
            validate_component("category", &e.category)
                .map_err(|r| fail(format!("{}: {r}", e.key)))?;
            if e.prompt.trim().is_empty() {
                return Err(fail(format!("{}: prompt is empty", e.key)));
            }
        }
        Ok(Self { entries })
    }

    fn entry(
        key: String,
        name: Option<String>,
        prompt: String,
        category: Option<String>,
    ) -> CatalogEntry {
        CatalogEntry {
            name: name.unwrap_or_else(|| key.clone()),
            key,
            prompt,
            category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Narrows the catalogue to the entry under `key`.
    pub fn select(self, key: &str) -> Result<Self, ForgeError> {
        match self.entries.iter().position(|e| e.key == key) {
            Some(i) => {
                let mut entries = self.entries;
                Ok(Self {
                    entries: vec![entries.swap_remove(i)],
                })
            }
            None => Err(ForgeError::UnknownPrompt {
                key: key.to_string(),
                available: self.keys(),
            }),
        }
    }
}

/// Names become path components, so they must stay inside the output dir.
fn validate_component(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is empty"));
    }
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(format!("{field} '{value}' must not contain path separators or '..'"));
    }
    Ok(())
}

/// Where an entry's image is written, before the MIME extension rule.
pub fn target_path(output_dir: &Path, entry: &CatalogEntry) -> PathBuf {
    output_dir
        .join(&entry.category)
        .join(format!("{}.png", entry.name))
}

/// Generates every entry of `catalog` into `output_dir`.
///
/// Only a provider that cannot be constructed (e.g. no API key) is fatal;
/// per-item failures are recorded in the report.
pub async fn run_batch(
    catalog: &PromptCatalog,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchReport, ForgeError> {
    let output_dir = output_dir.as_ref();
    let start = Instant::now();
    let provider = resolve_provider(&config.image)?;
    let noop = NoopProgressCallback;
    let cb: &dyn BatchProgressCallback = match &config.progress_callback {
        Some(cb) => cb.as_ref(),
        None => &noop,
    };

    let total = catalog.len();
    info!(
        "Generating {} images into {} with {}",
        total,
        output_dir.display(),
        config.image.model
    );
    cb.on_batch_start(total);

    let mut outcomes = Vec::with_capacity(total);
    for (i, entry) in catalog.entries().iter().enumerate() {
        let index = i + 1;
        cb.on_item_start(index, total, &entry.name);
        info!("[{index}/{total}] Generating: {} ({})", entry.name, entry.category);

        let item_start = Instant::now();
        let result = generate_entry(provider.as_ref(), entry, output_dir, config).await;
        let duration_ms = item_start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok((path, bytes)) => {
                info!("Saved: {}", path.display());
                cb.on_item_complete(index, total, &entry.name, bytes);
                ItemOutcome {
                    key: entry.key.clone(),
                    name: entry.name.clone(),
                    category: entry.category.clone(),
                    status: ItemStatus::Success,
                    path: Some(path),
                    error: None,
                    duration_ms,
                }
            }
            Err(err) => {
                warn!("Failed: {err}");
                cb.on_item_error(index, total, &entry.name, &err.to_string());
                ItemOutcome {
                    key: entry.key.clone(),
                    name: entry.name.clone(),
                    category: entry.category.clone(),
                    status: ItemStatus::Failed,
                    path: None,
                    error: Some(err),
                    duration_ms,
                }
            }
        };
        outcomes.push(outcome);

        if index < total && !config.delay.is_zero() {
            info!("Waiting {:.1}s before next request...", config.delay.as_secs_f64());
            tokio::time::sleep(config.delay).await;
        }
    }

    let report = BatchReport::from_outcomes(outcomes, start.elapsed().as_millis() as u64);
    cb.on_batch_complete(report.total, report.success);
    Ok(report)
}

async fn generate_entry(
    provider: &dyn crate::imagegen::ImageProvider,
    entry: &CatalogEntry,
    output_dir: &Path,
    config: &BatchConfig,
) -> Result<(PathBuf, usize), ItemError> {
    let mut request = ImageRequest::new(config.image.model, entry.prompt.clone());
    request.aspect_ratio = config.image.aspect_ratio.clone();

    let (response, _) = request_with_retry(provider, &request, &config.image)
        .await
        .map_err(|e| ItemError::GenerationFailed {
            name: entry.name.clone(),
            retries: if e.is_retryable() {
                config.image.max_retries
            } else {
                0
            },
            detail: e.to_string(),
        })?;

    let Some(first) = response.images.first() else {
        return Err(ItemError::GenerationFailed {
            name: entry.name.clone(),
            retries: 0,
            detail: ForgeError::NoImageGenerated {
                text: response.joined_text(),
            }
            .to_string(),
        });
    };

    let saved = save_images(std::slice::from_ref(first), &target_path(output_dir, entry))
        .await
        .map_err(|e| ItemError::SaveFailed {
            name: entry.name.clone(),
            detail: e.to_string(),
        })?;
    saved
        .into_iter()
        .next()
        .map(|img| (img.path, img.bytes))
        .ok_or_else(|| ItemError::SaveFailed {
            name: entry.name.clone(),
            detail: "nothing was written".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogue_has_ten_entries_in_order() {
        let c = PromptCatalog::builtin().unwrap();
        assert_eq!(c.len(), 10);
        assert_eq!(c.entries()[0].key, "profile_banner");
        assert_eq!(c.entries()[9].key, "iot_3");
        let a1 = c.get("ai_agent_1").unwrap();
        assert_eq!(a1.name, "ai_agent_architecture");
        assert_eq!(a1.category, "ai-agent-gig");
    }

    #[test]
    fn images_form_keys_by_name() {
        let c = PromptCatalog::from_json_str(
            r#"{"images":[{"name":"hero","prompt":"p1","category":"site"},{"name":"logo","prompt":"p2"}]}"#,
            "t",
        )
        .unwrap();
        assert_eq!(c.keys(), vec!["hero", "logo"]);
        assert_eq!(c.get("logo").unwrap().category, DEFAULT_CATEGORY);
    }

    #[test]
    fn images_form_requires_name() {
        let e = PromptCatalog::from_json_str(r#"{"images":[{"prompt":"p"}]}"#, "t").unwrap_err();
        assert!(e.to_string().contains("missing field `name`"));
    }

    #[test]
    fn keyed_form_preserves_order_and_defaults_name() {
        let c = PromptCatalog::from_json_str(
            r#"{"zeta":{"prompt":"z"},"alpha":{"name":"a_file","prompt":"a","category":"c"}}"#,
            "t",
        )
        .unwrap();
        assert_eq!(c.keys(), vec!["zeta", "alpha"]);
        assert_eq!(c.entries()[0].name, "zeta");
        assert_eq!(c.entries()[1].name, "a_file");
    }

    #[test]
    fn rejects_path_traversal() {
        for bad in [
            r#"{"x":{"name":"../evil","prompt":"p"}}"#,
            r#"{"x":{"prompt":"p","category":"a/b"}}"#,
            r#"{"images":[{"name":"a\\b","prompt":"p"}]}"#,
        ] {
            assert!(PromptCatalog::from_json_str(bad, "t").is_err(), "{bad}");
        }
    }

    #[test]
    fn rejects_non_object_and_missing_prompt() {
        assert!(PromptCatalog::from_json_str("[1,2]", "t").is_err());
        assert!(PromptCatalog::from_json_str(r#"{"x":{"name":"n"}}"#, "t").is_err());
        assert!(PromptCatalog::from_json_str("not json", "t").is_err());
    }

    #[test]
    fn select_keeps_one_or_lists_keys() {
        let c = PromptCatalog::builtin().unwrap();
        let one = c.clone().select("iot_2").unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one.entries()[0].name, "iot_monitoring_dashboard");

        match c.select("nope") {
            Err(ForgeError::UnknownPrompt { key, available }) => {
                assert_eq!(key, "nope");
                assert_eq!(available.len(), 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn target_path_uses_category_dir() {
        let e = CatalogEntry {
            key: "k".into(),
            name: "banner".into(),
            prompt: "p".into(),
            category: "profile".into(),
        };
        assert_eq!(
            target_path(Path::new("out"), &e),
            PathBuf::from("out/profile/banner.png")
        );
    }
}
