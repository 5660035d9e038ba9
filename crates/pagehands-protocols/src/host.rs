//! Host-facility seams.
//!
//! The browser host provides three capabilities the core cannot implement
//! itself: persistent user-script registration, code execution in the
//! page's principal world, and screenshot capture. Each is a trait here;
//! in-memory implementations back the test suite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Screenshot output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Outcome of a principal-world execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainWorldOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MainWorldOutcome {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Whether the failure looks like a CSP block.
    pub fn is_csp_blocked(&self) -> bool {
        self.error
            .as_deref()
            .map(|e| {
                let lower = e.to_ascii_lowercase();
                lower.contains("content security policy") || lower.contains("unsafe-eval")
            })
            .unwrap_or(false)
    }
}

/// Executes a code string in the page's principal world, where the page's
/// own globals are visible.
#[async_trait]
pub trait MainWorldExecutor: Send + Sync {
    async fn execute(&self, code: &str) -> MainWorldOutcome;
}

/// Captures the visible tab as a data URL.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self, format: ImageFormat, quality: Option<u8>) -> Result<String, String>;
}

/// When a registered script runs relative to document load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    DocumentStart,
    DocumentEnd,
    DocumentIdle,
}

/// Which JS world a registered script executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptWorld {
    UserScript,
    Main,
}

/// A script as handed to the host's user-script facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUserScript {
    /// Deterministic id derived from (domain, urlPath, name).
    pub id: String,
    /// URL match patterns, e.g. `*://shop.test/products/*`.
    pub matches: Vec<String>,
    /// The code to inject (possibly wrapped with a route guard).
    pub code: String,
    pub run_at: RunAt,
    pub world: ScriptWorld,
}

/// The host's persistent user-script facility.
#[async_trait]
pub trait UserScriptHost: Send + Sync {
    /// Whether the facility exists on this host. When false, the lifecycle
    /// manager declines to register and pages fall back to one-shot
    /// injection.
    fn available(&self) -> bool {
        true
    }

    /// Register one script. Failures are per-script; the reconciler
    /// proceeds with the remainder.
    async fn register(&self, script: RegisteredUserScript) -> Result<(), RegistryError>;

    /// Unregister scripts by id.
    async fn unregister(&self, ids: &[String]) -> Result<(), RegistryError>;

    /// Ids of everything currently registered.
    async fn registered_ids(&self) -> Vec<String>;
}
