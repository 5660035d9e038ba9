//! One-shot script injection for hosts without a user-script facility.
//!
//! On page load the page worker forwards each matching enabled script to
//! the principal-world executor. CSP failures are recorded and surfaced;
//! there is no retry.

use tracing::{debug, warn};

use pagehands_protocols::error::VfsError;
use pagehands_protocols::fabric::ArtifactKind;
use pagehands_protocols::host::MainWorldExecutor;
use pagehands_protocols::types::PageLocation;

use pagehands_vfs::{DomainStore, RoutePattern};

use crate::reconciler::wrap_with_route_guard;

/// One failed injection.
#[derive(Debug, Clone)]
pub struct InjectionFailure {
    pub name: String,
    pub error: String,
    pub csp_blocked: bool,
}

/// Outcome of a page-load injection pass.
#[derive(Debug, Clone, Default)]
pub struct InjectionReport {
    pub injected: usize,
    pub failures: Vec<InjectionFailure>,
}

/// Inject every enabled script matching `location`, best-effort.
pub async fn inject_matching_scripts(
    store: &DomainStore,
    location: &PageLocation,
    executor: &dyn MainWorldExecutor,
) -> Result<InjectionReport, VfsError> {
    let state = store.load(&location.domain).await?;
    let mut report = InjectionReport::default();
    let mut seen = std::collections::HashSet::new();

    for (key, name, file) in DomainStore::matching_files(&state, location, ArtifactKind::Script) {
        if !seen.insert(name.clone()) {
            continue;
        }
        let code = if RoutePattern::contains_dynamic(&key) {
            match RoutePattern::compile(&key) {
                Some(pattern) => wrap_with_route_guard(&file.content, &pattern),
                None => file.content.clone(),
            }
        } else {
            file.content.clone()
        };

        let outcome = executor.execute(&code).await;
        if outcome.success {
            debug!(%name, "injected script on load");
            report.injected += 1;
        } else {
            let csp_blocked = outcome.is_csp_blocked();
            let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(%name, %error, csp_blocked, "script injection failed");
            report.failures.push(InjectionFailure {
                name,
                error,
                csp_blocked,
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
