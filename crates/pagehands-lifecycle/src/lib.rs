//! Script lifecycle manager.
//!
//! Keeps the host's persistent user-script registrations equal to the set
//! of enabled stored scripts across all domains. Dynamic-route scripts are
//! wrapped with a guard that re-checks the pathname and extracts route
//! parameters at injection time. Hosts without a user-script facility fall
//! back to one-shot principal-world injection on page load.

pub mod fallback;
pub mod host;
pub mod reconciler;

pub use fallback::{inject_matching_scripts, InjectionFailure, InjectionReport};
pub use host::MemoryUserScriptHost;
pub use reconciler::{ReconcileSummary, ScriptReconciler};
