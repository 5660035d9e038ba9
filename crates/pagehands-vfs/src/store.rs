//! Persistent domain store.
//!
//! Layout (one key per domain):
//!
//! ```text
//! vfs:{domain} = { paths: { "{urlPath}": { scripts, styles, editRecords } } }
//! ```
//!
//! All mutations are read-modify-write against the key-value store, reading
//! the current value immediately before writing back. File versions follow
//! the optimistic contract: a write succeeds only when the caller's
//! expected version equals the current one, or is 0 for a new file.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use pagehands_protocols::error::{StoreError, VfsError};
use pagehands_protocols::fabric::{ArtifactKind, VfsFileInfo};
use pagehands_protocols::types::{normalize_url_path, PageLocation};

use crate::kv::{domain_key, KeyValueStore, VFS_KEY_PREFIX};
use crate::route::{find_matching_routes, RoutePattern};

/// Name of the script regenerated from recorded page edits.
pub const AUTO_EDITS_SCRIPT: &str = "_auto_edits.js";

/// A stored, versioned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsFile {
    pub content: String,
    pub version: u64,
    pub created: i64,
    pub modified: i64,
    /// Absent means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl VfsFile {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// A DOM replacement observed during a page edit, kept for regeneration
/// into the auto-edits script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRecord {
    pub selector: String,
    pub old_content: String,
    pub new_content: String,
    pub timestamp: i64,
}

/// Stored state for one urlPath.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathEntry {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, VfsFile>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, VfsFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edit_records: Vec<EditRecord>,
}

impl PathEntry {
    pub fn files(&self, kind: ArtifactKind) -> &BTreeMap<String, VfsFile> {
        match kind {
            ArtifactKind::Script => &self.scripts,
            ArtifactKind::Style => &self.styles,
        }
    }

    fn files_mut(&mut self, kind: ArtifactKind) -> &mut BTreeMap<String, VfsFile> {
        match kind {
            ArtifactKind::Script => &mut self.scripts,
            ArtifactKind::Style => &mut self.styles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty() && self.styles.is_empty() && self.edit_records.is_empty()
    }
}

/// Stored state for one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainState {
    #[serde(default)]
    pub paths: BTreeMap<String, PathEntry>,
}

/// A stored script with its addressing, as fed to the reconciler.
#[derive(Debug, Clone)]
pub struct StoredScript {
    pub domain: String,
    pub url_path: String,
    pub name: String,
    pub file: VfsFile,
}

/// Handle over the key-value store with the domain-store schema on top.
#[derive(Clone)]
pub struct DomainStore {
    kv: Arc<dyn KeyValueStore>,
}

impl DomainStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// Load a domain's state; a missing key is an empty state.
    pub async fn load(&self, domain: &str) -> Result<DomainState, VfsError> {
        let value = self
            .kv
            .get(&domain_key(domain))
            .await
            .map_err(store_err)?;
        match value {
            None => Ok(DomainState::default()),
            Some(v) => serde_json::from_value(v)
                .map_err(|e| VfsError::Store(format!("corrupt state for {domain}: {e}"))),
        }
    }

    /// Persist a domain's state; an empty state removes the key, which
    /// also covers the "deleting the last file removes `vfs:{domain}`"
    /// contract.
    async fn save(&self, domain: &str, state: &DomainState) -> Result<(), VfsError> {
        let key = domain_key(domain);
        if state.paths.is_empty() {
            self.kv.remove(&key).await.map_err(store_err)
        } else {
            let value = serde_json::to_value(state)
                .map_err(|e| VfsError::Store(e.to_string()))?;
            self.kv.set(&key, value).await.map_err(store_err)
        }
    }

    /// Locate the stored urlPath key holding `name`: exact (normalized)
    /// match first, then the highest-priority route-pattern match.
    pub fn resolve_file_key(
        state: &DomainState,
        url_path: &str,
        kind: ArtifactKind,
        name: &str,
    ) -> Option<String> {
        let normalized = normalize_url_path(url_path);
        if let Some(entry) = state.paths.get(&normalized) {
            if entry.files(kind).contains_key(name) {
                return Some(normalized);
            }
        }
        find_matching_routes(&normalized, state.paths.keys().map(String::as_str))
            .into_iter()
            .find(|m| {
                state
                    .paths
                    .get(&m.key)
                    .is_some_and(|e| e.files(kind).contains_key(name))
            })
            .map(|m| m.key)
    }

    /// Fetch a file, resolving route patterns. Returns the stored key the
    /// file lives under alongside the file.
    pub async fn get_file(
        &self,
        domain: &str,
        url_path: &str,
        kind: ArtifactKind,
        name: &str,
    ) -> Result<Option<(String, VfsFile)>, VfsError> {
        let state = self.load(domain).await?;
        Ok(Self::resolve_file_key(&state, url_path, kind, name).and_then(|key| {
            state
                .paths
                .get(&key)
                .and_then(|e| e.files(kind).get(name))
                .map(|f| (key, f.clone()))
        }))
    }

    /// Write a file under the optimistic-version contract. Returns the new
    /// version.
    pub async fn write_file(
        &self,
        domain: &str,
        url_path: &str,
        kind: ArtifactKind,
        name: &str,
        content: String,
        expected_version: u64,
    ) -> Result<u64, VfsError> {
        let mut state = self.load(domain).await?;
        let target_key = Self::resolve_file_key(&state, url_path, kind, name)
            .unwrap_or_else(|| normalize_url_path(url_path));
        let now = Utc::now().timestamp_millis();

        let entry = state.paths.entry(target_key.clone()).or_default();
        let files = entry.files_mut(kind);
        let version = match files.get_mut(name) {
            None => {
                if expected_version != 0 {
                    return Err(VfsError::VersionMismatch {
                        expected: expected_version,
                        actual: 0,
                    });
                }
                files.insert(
                    name.to_string(),
                    VfsFile {
                        content,
                        version: 1,
                        created: now,
                        modified: now,
                        enabled: None,
                    },
                );
                1
            }
            Some(file) => {
                if expected_version != file.version {
                    return Err(VfsError::VersionMismatch {
                        expected: expected_version,
                        actual: file.version,
                    });
                }
                file.content = content;
                file.version += 1;
                file.modified = now;
                file.version
            }
        };

        self.save(domain, &state).await?;
        debug!(domain, key = %target_key, name, version, "wrote file");
        Ok(version)
    }

    /// Remove a file. Empty paths are pruned, and an empty domain drops
    /// the whole key. Returns whether anything was removed.
    pub async fn delete_file(
        &self,
        domain: &str,
        url_path: &str,
        kind: ArtifactKind,
        name: &str,
    ) -> Result<bool, VfsError> {
        let mut state = self.load(domain).await?;
        let Some(key) = Self::resolve_file_key(&state, url_path, kind, name) else {
            return Ok(false);
        };
        let Some(entry) = state.paths.get_mut(&key) else {
            return Ok(false);
        };
        let removed = entry.files_mut(kind).remove(name).is_some();
        if entry.is_empty() {
            state.paths.remove(&key);
        }
        self.save(domain, &state).await?;
        Ok(removed)
    }

    /// Flip a file's enabled flag. Returns the new effective state.
    pub async fn toggle_enabled(
        &self,
        domain: &str,
        url_path: &str,
        kind: ArtifactKind,
        name: &str,
    ) -> Result<bool, VfsError> {
        let mut state = self.load(domain).await?;
        let Some(key) = Self::resolve_file_key(&state, url_path, kind, name) else {
            return Err(VfsError::NotFound(format!("{url_path}/{name}")));
        };
        let file = state
            .paths
            .get_mut(&key)
            .and_then(|e| e.files_mut(kind).get_mut(name))
            .ok_or_else(|| VfsError::NotFound(format!("{url_path}/{name}")))?;
        let next = !file.is_enabled();
        file.enabled = Some(next);
        self.save(domain, &state).await?;
        Ok(next)
    }

    /// Set the enabled flag on every file across every domain.
    pub async fn set_all_enabled(&self, enabled: bool) -> Result<(), VfsError> {
        for domain in self.domains().await? {
            let mut state = self.load(&domain).await?;
            for entry in state.paths.values_mut() {
                for file in entry.scripts.values_mut().chain(entry.styles.values_mut()) {
                    file.enabled = Some(enabled);
                }
            }
            self.save(&domain, &state).await?;
        }
        Ok(())
    }

    /// Record a page edit and regenerate the auto-edits script for its
    /// urlPath.
    pub async fn append_edit_record(
        &self,
        domain: &str,
        url_path: &str,
        record: EditRecord,
    ) -> Result<(), VfsError> {
        let mut state = self.load(domain).await?;
        let key = normalize_url_path(url_path);
        let entry = state.paths.entry(key).or_default();
        entry.edit_records.push(record);

        let generated = render_auto_edits(&entry.edit_records);
        let now = Utc::now().timestamp_millis();
        match entry.scripts.get_mut(AUTO_EDITS_SCRIPT) {
            Some(file) => {
                file.content = generated;
                file.version += 1;
                file.modified = now;
            }
            None => {
                entry.scripts.insert(
                    AUTO_EDITS_SCRIPT.to_string(),
                    VfsFile {
                        content: generated,
                        version: 1,
                        created: now,
                        modified: now,
                        enabled: None,
                    },
                );
            }
        }
        self.save(domain, &state).await
    }

    /// All domains with stored state.
    pub async fn domains(&self) -> Result<Vec<String>, VfsError> {
        Ok(self
            .kv
            .keys()
            .await
            .map_err(store_err)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(VFS_KEY_PREFIX).map(str::to_string))
            .collect())
    }

    /// Every enabled script across every domain, for registration.
    pub async fn enabled_scripts(&self) -> Result<Vec<StoredScript>, VfsError> {
        let mut out = Vec::new();
        for domain in self.domains().await? {
            let state = self.load(&domain).await?;
            for (url_path, entry) in &state.paths {
                for (name, file) in &entry.scripts {
                    if file.is_enabled() {
                        out.push(StoredScript {
                            domain: domain.clone(),
                            url_path: url_path.clone(),
                            name: name.clone(),
                            file: file.clone(),
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Enabled artifacts of `kind` whose stored urlPath matches the given
    /// location, in resolution order (exact key first, then patterns by
    /// priority).
    pub fn matching_files(
        state: &DomainState,
        location: &PageLocation,
        kind: ArtifactKind,
    ) -> Vec<(String, String, VfsFile)> {
        let mut out = Vec::new();
        if let Some(entry) = state.paths.get(&location.url_path) {
            for (name, file) in entry.files(kind) {
                if file.is_enabled() {
                    out.push((location.url_path.clone(), name.clone(), file.clone()));
                }
            }
        }
        for m in find_matching_routes(&location.url_path, state.paths.keys().map(String::as_str))
        {
            if m.key == location.url_path {
                continue;
            }
            if let Some(entry) = state.paths.get(&m.key) {
                for (name, file) in entry.files(kind) {
                    if file.is_enabled() {
                        out.push((m.key.clone(), name.clone(), file.clone()));
                    }
                }
            }
        }
        out
    }

    /// Every stored file for a domain, flattened for the UI.
    pub async fn list_domain_files(&self, domain: &str) -> Result<Vec<VfsFileInfo>, VfsError> {
        let state = self.load(domain).await?;
        let mut out = Vec::new();
        for (url_path, entry) in &state.paths {
            for (kind, files) in [
                (ArtifactKind::Script, &entry.scripts),
                (ArtifactKind::Style, &entry.styles),
            ] {
                for (name, file) in files {
                    out.push(VfsFileInfo {
                        domain: domain.to_string(),
                        url_path: url_path.clone(),
                        kind,
                        name: name.clone(),
                        version: file.version,
                        enabled: file.is_enabled(),
                        modified: file.modified,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Export every domain as a bundle.
    pub async fn export_bundle(&self) -> Result<Value, VfsError> {
        let mut domains = serde_json::Map::new();
        for domain in self.domains().await? {
            let state = self.load(&domain).await?;
            domains.insert(
                domain,
                serde_json::to_value(&state).map_err(|e| VfsError::Store(e.to_string()))?,
            );
        }
        Ok(serde_json::json!({
            "version": 1,
            "exportedAt": Utc::now().timestamp_millis(),
            "domains": Value::Object(domains),
        }))
    }

    /// Merge a bundle into the store: per file, the newer version wins.
    /// Returns the number of files imported.
    pub async fn import_bundle(&self, bundle: &Value) -> Result<usize, StoreError> {
        if bundle.get("version").and_then(Value::as_u64) != Some(1) {
            return Err(StoreError::InvalidBundle(
                "unsupported bundle version".to_string(),
            ));
        }
        let domains = bundle
            .get("domains")
            .and_then(Value::as_object)
            .ok_or_else(|| StoreError::InvalidBundle("missing domains".to_string()))?;

        let mut imported = 0;
        for (domain, value) in domains {
            let incoming: DomainState = serde_json::from_value(value.clone())
                .map_err(|e| StoreError::InvalidBundle(format!("{domain}: {e}")))?;
            let mut current = self.load(domain).await.map_err(|e| {
                StoreError::Serialization(e.to_string())
            })?;
            for (url_path, entry) in incoming.paths {
                let target = current
                    .paths
                    .entry(normalize_url_path(&url_path))
                    .or_default();
                for (kind, files) in [
                    (ArtifactKind::Script, entry.scripts),
                    (ArtifactKind::Style, entry.styles),
                ] {
                    for (name, file) in files {
                        let dest = target.files_mut(kind);
                        let keep = dest
                            .get(&name)
                            .map_or(true, |existing| file.version > existing.version);
                        if keep {
                            dest.insert(name, file);
                            imported += 1;
                        }
                    }
                }
            }
            self.save(domain, &current)
                .await
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
        }
        Ok(imported)
    }
}

/// Render the auto-edits script from the recorded replacements.
fn render_auto_edits(records: &[EditRecord]) -> String {
    let mut out = String::from(
        "// Regenerated from recorded page edits. Re-applies them on load.\n(function() {\n  var edits = ",
    );
    let entries: Vec<Value> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "selector": r.selector,
                "old": r.old_content,
                "new": r.new_content,
            })
        })
        .collect();
    out.push_str(&serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string()));
    out.push_str(
        ";\n  edits.forEach(function(edit) {\n    document.querySelectorAll(edit.selector).forEach(function(el) {\n      if (el.innerHTML.indexOf(edit.old) !== -1) {\n        el.innerHTML = el.innerHTML.split(edit.old).join(edit.new);\n      }\n    });\n  });\n})();\n",
    );
    out
}

fn store_err(err: StoreError) -> VfsError {
    VfsError::Store(err.to_string())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
