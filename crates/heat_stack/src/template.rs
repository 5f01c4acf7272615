//! Template and environment loading.
//!
//! Builds the in-memory payload submitted with a stack create: the parsed
//! template, the environment merged from every environment file in order,
//! and a file map holding everything those documents reference locally
//! (`get_file` targets, nested templates, resource registry entries).
//! Local references are rewritten to the `file://` URLs used as file-map
//! keys so the orchestration service can resolve them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{StackError, StackResult};

/// Guard against runaway nested-template chains.
const MAX_TEMPLATE_DEPTH: usize = 16;

const TEMPLATE_EXTENSIONS: [&str; 4] = [".yaml", ".yml", ".template", ".json"];

/// Everything a create submission carries besides name and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePayload {
    pub template: Value,
    pub environment: Value,
    pub files: BTreeMap<String, String>,
}

/// Loads templates and environment files from the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct TemplateLoader;

impl TemplateLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load `template` and merge `environment_files` into one payload.
    pub fn load(&self, template: &Path, environment_files: &[PathBuf]) -> StackResult<TemplatePayload> {
        let mut files = BTreeMap::new();

        let template_path = local_path(template)?;
        let template = self.process_template(&template_path, &mut files, 0)?;

        let mut environment = Value::Object(Map::new());
        for env_file in environment_files {
            let env_path = local_path(env_file)?;
            let overlay = self.process_environment(&env_path, &mut files)?;
            merge(&mut environment, overlay);
        }

        debug!(
            "Loaded template {:?} with {} environment file(s) and {} attached file(s)",
            template_path,
            environment_files.len(),
            files.len()
        );

        Ok(TemplatePayload {
            template,
            environment,
            files,
        })
    }

    fn process_template(
        &self,
        path: &Path,
        files: &mut BTreeMap<String, String>,
        depth: usize,
    ) -> StackResult<Value> {
        if depth > MAX_TEMPLATE_DEPTH {
            return Err(StackError::Template(format!(
                "nested templates deeper than {} levels at {:?}",
                MAX_TEMPLATE_DEPTH, path
            )));
        }

        let mut value = parse_document(path)?;
        if !value.is_object() {
            return Err(StackError::Template(format!("{:?} is not a template mapping", path)));
        }

        let base = base_dir(path);
        self.resolve_template_refs(&mut value, &base, files, depth)?;
        Ok(value)
    }

    fn resolve_template_refs(
        &self,
        node: &mut Value,
        base: &Path,
        files: &mut BTreeMap<String, String>,
        depth: usize,
    ) -> StackResult<()> {
        match node {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    match (key.as_str(), child) {
                        ("get_file", Value::String(reference)) => {
                            *reference = self.attach_file(base, reference, files)?;
                        }
                        ("type", Value::String(reference)) if is_template_ref(reference.as_str()) => {
                            *reference = self.attach_template(base, reference, files, depth)?;
                        }
                        (_, child) => self.resolve_template_refs(child, base, files, depth)?,
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.resolve_template_refs(item, base, files, depth)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn process_environment(&self, path: &Path, files: &mut BTreeMap<String, String>) -> StackResult<Value> {
        let mut value = match parse_document(path)? {
            Value::Null => Value::Object(Map::new()),
            v @ Value::Object(_) => v,
            _ => {
                return Err(StackError::Template(format!(
                    "environment {:?} is not a mapping",
                    path
                )))
            }
        };

        let base = base_dir(path);
        if let Some(registry) = value.get_mut("resource_registry") {
            self.resolve_registry_refs(registry, &base, files)?;
        }
        Ok(value)
    }

    fn resolve_registry_refs(
        &self,
        node: &mut Value,
        base: &Path,
        files: &mut BTreeMap<String, String>,
    ) -> StackResult<()> {
        match node {
            Value::String(reference) if is_template_ref(reference.as_str()) => {
                *reference = self.attach_template(base, reference, files, 0)?;
            }
            Value::Object(map) => {
                for child in map.values_mut() {
                    self.resolve_registry_refs(child, base, files)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Attach a raw file and return its file-map key.
    fn attach_file(
        &self,
        base: &Path,
        reference: &str,
        files: &mut BTreeMap<String, String>,
    ) -> StackResult<String> {
        let Some(path) = resolve_reference(base, reference)? else {
            return Ok(reference.to_string());
        };
        let url = file_url(&path)?;
        if !files.contains_key(&url) {
            let content = fs::read_to_string(&path).map_err(|e| {
                StackError::Template(format!("cannot read {:?} referenced by get_file: {}", path, e))
            })?;
            files.insert(url.clone(), content);
        }
        Ok(url)
    }

    /// Attach a nested template (processed recursively) and return its key.
    fn attach_template(
        &self,
        base: &Path,
        reference: &str,
        files: &mut BTreeMap<String, String>,
        depth: usize,
    ) -> StackResult<String> {
        let Some(path) = resolve_reference(base, reference)? else {
            return Ok(reference.to_string());
        };
        let url = file_url(&path)?;
        if !files.contains_key(&url) {
            // Placeholder first so reference cycles terminate.
            files.insert(url.clone(), String::new());
            let nested = self.process_template(&path, files, depth + 1)?;
            let rendered = serde_json::to_string(&nested)
                .map_err(|e| StackError::Template(format!("cannot encode {:?}: {}", path, e)))?;
            files.insert(url.clone(), rendered);
        }
        Ok(url)
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything
/// else in `overlay` replaces what was there.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn parse_document(path: &Path) -> StackResult<Value> {
    let content = fs::read_to_string(path)
        .map_err(|e| StackError::Template(format!("cannot read {:?}: {}", path, e)))?;
    serde_yaml::from_str(&content)
        .map_err(|e| StackError::Template(format!("cannot parse {:?}: {}", path, e)))
}

fn is_template_ref(reference: &str) -> bool {
    TEMPLATE_EXTENSIONS.iter().any(|ext| reference.ends_with(ext))
}

fn base_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Strip a `file://` prefix; other schemes are not loadable here.
fn local_path(source: &Path) -> StackResult<PathBuf> {
    let text = source.to_string_lossy();
    if let Some(rest) = text.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if text.contains("://") {
        return Err(StackError::Template(format!(
            "unsupported template location {}; only local paths and file:// URIs are loaded",
            text
        )));
    }
    Ok(source.to_path_buf())
}

/// Resolve a reference relative to `base`. Remote URLs are passed through
/// (`None`) for the orchestration service to fetch itself.
fn resolve_reference(base: &Path, reference: &str) -> StackResult<Option<PathBuf>> {
    if let Some(rest) = reference.strip_prefix("file://") {
        return Ok(Some(PathBuf::from(rest)));
    }
    if reference.contains("://") {
        return Ok(None);
    }
    Ok(Some(base.join(reference)))
}

fn file_url(path: &Path) -> StackResult<String> {
    let canonical = fs::canonicalize(path)
        .map_err(|e| StackError::Template(format!("cannot resolve {:?}: {}", path, e)))?;
    Ok(format!("file://{}", canonical.display()))
}
