pub mod backend;
pub mod monitor;
pub mod platform;
pub mod release;
pub mod state;
pub mod store;

pub use backend::{LocalBackend, STATUS_COOLDOWN};
pub use monitor::Monitor;
pub use platform::{
    Autostart, CursorTracker, ForegroundWindow, ImeControl, ProcessSource, RecordingAutostart,
    StaticProcesses,
};
pub use release::{HttpReleaseFeed, ReleaseFeed, StaticReleaseFeed, DEFAULT_MANIFEST_URL};
pub use state::{HostError, HostState};
pub use store::{ConfigStore, StoreError};
