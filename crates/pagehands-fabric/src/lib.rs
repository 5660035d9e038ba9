//! Multi-context messaging fabric.
//!
//! Three contexts: the background worker (agent host), per-tab page
//! workers (VFS hosts), and the UI panel. The UI talks to the background
//! over long-lived named ports plus one-shot requests; the background
//! talks to page workers over one-shot requests with
//! inject-and-retry-once recovery; long agent turns hold a
//! reference-counted keep-alive heartbeat.

pub mod background;
pub mod hosts;
pub mod keepalive;
pub mod page;
pub mod port;

pub use background::{Background, BackgroundConfig};
pub use hosts::{FixedCapture, RecordingExecutor};
pub use keepalive::{KeepAlive, KeepAliveGuard};
pub use page::{send_to_page, InProcessPageTransport, PageTransport, PageWorker};
pub use port::PortRegistry;
