//! Session-scoped artifacts: screenshots and plans.
//!
//! Both live in memory only, keyed by (domain, urlPath), and disappear
//! when the background worker restarts. Screenshots are written by the
//! capture path; plans follow the ordinary optimistic write contract.

use chrono::Utc;
use dashmap::DashMap;

use pagehands_protocols::error::VfsError;
use pagehands_protocols::types::PageLocation;

#[derive(Debug, Clone)]
pub struct Artifact {
    pub content: String,
    pub version: u64,
    pub modified: i64,
}

#[derive(Default)]
pub struct SessionArtifacts {
    screenshots: DashMap<PageLocation, Artifact>,
    plans: DashMap<PageLocation, Artifact>,
}

impl SessionArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh capture. Each capture is one version step; there is
    /// no optimistic check because captures only flow through the capture
    /// path.
    pub fn store_screenshot(&self, location: &PageLocation, data_url: String) -> u64 {
        let mut entry = self
            .screenshots
            .entry(location.clone())
            .or_insert_with(|| Artifact {
                content: String::new(),
                version: 0,
                modified: 0,
            });
        entry.content = data_url;
        entry.version += 1;
        entry.modified = Utc::now().timestamp_millis();
        entry.version
    }

    pub fn screenshot(&self, location: &PageLocation) -> Option<Artifact> {
        self.screenshots.get(location).map(|a| a.clone())
    }

    pub fn has_screenshot(&self, location: &PageLocation) -> bool {
        self.screenshots.contains_key(location)
    }

    pub fn plan(&self, location: &PageLocation) -> Option<Artifact> {
        self.plans.get(location).map(|a| a.clone())
    }

    pub fn has_plan(&self, location: &PageLocation) -> bool {
        self.plans.contains_key(location)
    }

    /// Write the plan under the optimistic contract.
    pub fn write_plan(
        &self,
        location: &PageLocation,
        content: String,
        expected_version: u64,
    ) -> Result<u64, VfsError> {
        let now = Utc::now().timestamp_millis();
        match self.plans.get_mut(location) {
            None => {
                if expected_version != 0 {
                    return Err(VfsError::VersionMismatch {
                        expected: expected_version,
                        actual: 0,
                    });
                }
                self.plans.insert(
                    location.clone(),
                    Artifact {
                        content,
                        version: 1,
                        modified: now,
                    },
                );
                Ok(1)
            }
            Some(mut plan) => {
                if expected_version != plan.version {
                    return Err(VfsError::VersionMismatch {
                        expected: expected_version,
                        actual: plan.version,
                    });
                }
                plan.content = content;
                plan.version += 1;
                plan.modified = now;
                Ok(plan.version)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> PageLocation {
        PageLocation::new("x.test", "/")
    }

    #[test]
    fn screenshot_versions_count_captures() {
        let session = SessionArtifacts::new();
        assert!(!session.has_screenshot(&loc()));
        assert_eq!(session.store_screenshot(&loc(), "data:image/png;base64,a".into()), 1);
        assert_eq!(session.store_screenshot(&loc(), "data:image/png;base64,b".into()), 2);
        let shot = session.screenshot(&loc()).unwrap();
        assert_eq!(shot.version, 2);
        assert!(shot.content.ends_with(",b"));
    }

    #[test]
    fn plan_write_follows_version_contract() {
        let session = SessionArtifacts::new();
        let v1 = session.write_plan(&loc(), "1. look".into(), 0).unwrap();
        assert_eq!(v1, 1);
        let err = session.write_plan(&loc(), "other".into(), 0).unwrap_err();
        assert_eq!(
            err,
            VfsError::VersionMismatch {
                expected: 0,
                actual: 1
            }
        );
        let v2 = session.write_plan(&loc(), "2. act".into(), 1).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(session.plan(&loc()).unwrap().content, "2. act");
    }

    #[test]
    fn artifacts_are_keyed_by_location() {
        let session = SessionArtifacts::new();
        let other = PageLocation::new("x.test", "/other");
        session.write_plan(&loc(), "root plan".into(), 0).unwrap();
        assert!(session.has_plan(&loc()));
        assert!(!session.has_plan(&other));
    }
}
