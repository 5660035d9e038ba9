//! Stand-in host facilities.
//!
//! Used by the CLI (which has no real browser host) and by the test
//! suite. The executor records everything it runs and can be scripted
//! with failure outcomes; the capture returns a fixed data URL.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use pagehands_protocols::host::{ImageFormat, MainWorldExecutor, MainWorldOutcome, ScreenCapture};

/// A principal-world executor that records code and pops scripted
/// outcomes; an empty script yields success.
#[derive(Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
    outcomes: Mutex<VecDeque<MainWorldOutcome>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: MainWorldOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl MainWorldExecutor for RecordingExecutor {
    async fn execute(&self, code: &str) -> MainWorldOutcome {
        self.executed.lock().push(code.to_string());
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| MainWorldOutcome::ok("undefined"))
    }
}

/// 1×1 transparent PNG, base64.
const PIXEL_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// A capture that always returns the same data URL.
pub struct FixedCapture {
    data_url: String,
}

impl FixedCapture {
    pub fn new() -> Self {
        Self {
            data_url: format!("data:image/png;base64,{PIXEL_PNG}"),
        }
    }

    pub fn with_data_url(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
        }
    }
}

impl Default for FixedCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScreenCapture for FixedCapture {
    async fn capture(&self, format: ImageFormat, _quality: Option<u8>) -> Result<String, String> {
        match format {
            ImageFormat::Png => Ok(self.data_url.clone()),
            ImageFormat::Jpeg => Ok(self
                .data_url
                .replace("data:image/png", "data:image/jpeg")),
        }
    }
}
