//! In-memory user-script host.
//!
//! Backs the test suite and hosts without a real facility. Registration
//! failures can be scripted per id to exercise the reconciler's
//! best-effort path.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use pagehands_protocols::error::RegistryError;
use pagehands_protocols::host::{RegisteredUserScript, UserScriptHost};

pub struct MemoryUserScriptHost {
    scripts: Mutex<BTreeMap<String, RegisteredUserScript>>,
    fail_ids: Mutex<HashSet<String>>,
    available: bool,
}

impl MemoryUserScriptHost {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(BTreeMap::new()),
            fail_ids: Mutex::new(HashSet::new()),
            available: true,
        }
    }

    /// A host with no user-script facility at all.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Make registration of one id fail.
    pub fn fail_on(&self, id: impl Into<String>) {
        self.fail_ids.lock().insert(id.into());
    }

    /// Currently registered scripts, ordered by id.
    pub fn snapshot(&self) -> Vec<RegisteredUserScript> {
        self.scripts.lock().values().cloned().collect()
    }
}

impl Default for MemoryUserScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserScriptHost for MemoryUserScriptHost {
    fn available(&self) -> bool {
        self.available
    }

    async fn register(&self, script: RegisteredUserScript) -> Result<(), RegistryError> {
        if !self.available {
            return Err(RegistryError::Unavailable);
        }
        if self.fail_ids.lock().contains(&script.id) {
            return Err(RegistryError::RegistrationFailed {
                id: script.id,
                message: "scripted failure".to_string(),
            });
        }
        self.scripts.lock().insert(script.id.clone(), script);
        Ok(())
    }

    async fn unregister(&self, ids: &[String]) -> Result<(), RegistryError> {
        let mut scripts = self.scripts.lock();
        for id in ids {
            scripts.remove(id);
        }
        Ok(())
    }

    async fn registered_ids(&self) -> Vec<String> {
        self.scripts.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagehands_protocols::host::{RunAt, ScriptWorld};

    fn script(id: &str) -> RegisteredUserScript {
        RegisteredUserScript {
            id: id.to_string(),
            matches: vec!["*://x.test/*".to_string()],
            code: "// body".to_string(),
            run_at: RunAt::DocumentIdle,
            world: ScriptWorld::UserScript,
        }
    }

    #[tokio::test]
    async fn register_unregister_roundtrip() {
        let host = MemoryUserScriptHost::new();
        host.register(script("a")).await.unwrap();
        host.register(script("b")).await.unwrap();
        assert_eq!(host.registered_ids().await, vec!["a", "b"]);

        host.unregister(&["a".to_string()]).await.unwrap();
        assert_eq!(host.registered_ids().await, vec!["b"]);
    }

    #[tokio::test]
    async fn unavailable_host_rejects_registration() {
        let host = MemoryUserScriptHost::unavailable();
        assert!(!host.available());
        assert!(matches!(
            host.register(script("a")).await,
            Err(RegistryError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn scripted_failures_fire() {
        let host = MemoryUserScriptHost::new();
        host.fail_on("bad");
        assert!(host.register(script("bad")).await.is_err());
        assert!(host.register(script("good")).await.is_ok());
    }
}
