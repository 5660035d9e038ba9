//! Registered-script reconciliation.
//!
//! The full set is rebuilt whenever any `vfs:*` key changes: unregister
//! everything, then register every enabled stored script. Full rebuild is
//! O(n) but idempotent, which matters more than delta updates across host
//! quirks (stale ids, permission revocations). Individual registration
//! failures are logged and the remainder proceeds.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pagehands_protocols::host::{RegisteredUserScript, RunAt, ScriptWorld, UserScriptHost};
use pagehands_vfs::{DomainStore, RoutePattern, StoredScript};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub registered: usize,
    pub failed: usize,
}

pub struct ScriptReconciler {
    store: DomainStore,
    host: Arc<dyn UserScriptHost>,
}

impl ScriptReconciler {
    pub fn new(store: DomainStore, host: Arc<dyn UserScriptHost>) -> Self {
        Self { store, host }
    }

    /// One full unregister-then-register pass.
    pub async fn reconcile(&self) -> ReconcileSummary {
        if !self.host.available() {
            warn!("user-script facility unavailable; skipping registration");
            return ReconcileSummary::default();
        }

        let existing = self.host.registered_ids().await;
        if !existing.is_empty() {
            if let Err(err) = self.host.unregister(&existing).await {
                warn!(%err, "failed to unregister previous scripts");
            }
        }

        let scripts = match self.store.enabled_scripts().await {
            Ok(scripts) => scripts,
            Err(err) => {
                warn!(%err, "could not enumerate stored scripts");
                return ReconcileSummary::default();
            }
        };

        let mut summary = ReconcileSummary::default();
        for stored in scripts {
            let registration = build_registration(&stored);
            match self.host.register(registration).await {
                Ok(()) => summary.registered += 1,
                Err(err) => {
                    warn!(%err, domain = %stored.domain, name = %stored.name, "registration failed");
                    summary.failed += 1;
                }
            }
        }
        info!(
            registered = summary.registered,
            failed = summary.failed,
            "reconciled user scripts"
        );
        summary
    }

    /// Reconcile on startup, then on every `vfs:*` store change until
    /// cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut changes = self.store.kv().changes();
        self.reconcile().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(change) if change.is_vfs() => {
                        debug!(key = %change.key, "store change; re-reconciling");
                        self.reconcile().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "change stream lagged; re-reconciling");
                        self.reconcile().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }
}

/// Build the host registration for one stored script.
pub fn build_registration(stored: &StoredScript) -> RegisteredUserScript {
    let code = if RoutePattern::contains_dynamic(&stored.url_path) {
        match RoutePattern::compile(&stored.url_path) {
            Some(pattern) => wrap_with_route_guard(&stored.file.content, &pattern),
            None => stored.file.content.clone(),
        }
    } else {
        stored.file.content.clone()
    };

    RegisteredUserScript {
        id: script_id(&stored.domain, &stored.url_path, &stored.name),
        matches: vec![match_pattern(&stored.domain, &stored.url_path)],
        code,
        run_at: RunAt::DocumentIdle,
        world: ScriptWorld::UserScript,
    }
}

/// Deterministic id from (domain, urlPath, name), sanitized to
/// `[A-Za-z0-9_]`.
pub fn script_id(domain: &str, url_path: &str, name: &str) -> String {
    let raw = format!("{domain}_{url_path}_{name}");
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// URL match pattern: `*://{domain}{patternPath}*`, dynamic segments
/// widened to `*`.
pub fn match_pattern(domain: &str, url_path: &str) -> String {
    let pattern_path: String = if url_path == "/" {
        "/".to_string()
    } else {
        url_path
            .split('/')
            .map(|segment| if segment.starts_with('[') { "*" } else { segment })
            .collect::<Vec<_>>()
            .join("/")
    };
    if pattern_path.ends_with('*') {
        format!("*://{domain}{pattern_path}")
    } else {
        format!("*://{domain}{pattern_path}*")
    }
}

/// Wrap a dynamic-route script body: exit silently off-route, merge the
/// extracted parameters into `window.__routeParams`, then run the body.
pub fn wrap_with_route_guard(code: &str, pattern: &RoutePattern) -> String {
    let regex_js = js_string(pattern.regex_source());
    let mut out = String::new();
    out.push_str("(function() {\n");
    out.push_str(&format!(
        "  var match = new RegExp({regex_js}).exec(location.pathname);\n"
    ));
    out.push_str("  if (!match) { return; }\n");
    out.push_str("  var params = window.__routeParams = window.__routeParams || {};\n");
    for (index, name) in pattern.param_names.iter().enumerate() {
        out.push_str(&format!(
            "  params[{}] = decodeURIComponent(match[{}]);\n",
            js_string(name),
            index + 1
        ));
    }
    out.push('\n');
    out.push_str(code);
    out.push_str("\n})();\n");
    out
}

/// Quote a string for embedding in generated JS.
fn js_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
