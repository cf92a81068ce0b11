//! # Skein Loader
//!
//! Isolated code-loading namespaces over mounted plugin archives.
//!
//! Plugins ship as tarballs dropped into the agent's mount directories
//! (`plugins/`, `activations/` by default).  An [`IsolatedNamespace`] resolves
//! code units from those archives without leaking them into the host, and
//! falls back to a single parent [`CodeSource`](skein_core::CodeSource) for
//! host symbols.
//!
//! ## Features
//!
//! - `gzip` (default): accept `*.tar.gz` / `*.tgz` archives
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Interceptor cache   │  bridge(id, host)  ──┐
//! ├──────────────────────┤                      │
//! │  IsolatedNamespace   │◀─────────────────────┘
//! │  (lazy archive scan) │──▶ parent CodeSource (host context)
//! ├──────────────────────┤
//! │  ArchiveHandle       │  tar / tar.gz entry index
//! └──────────────────────┘
//! ```

pub mod archive;
pub mod error;
pub mod hooks;
pub mod namespace;

pub use archive::{ArchiveFormat, ArchiveHandle, list_archives, read_entry, scan_mounts};
pub use error::{ArchiveError, ArchiveResult};
pub use hooks::{
    CONFIG_ROOT_MARKER, ConfigInitializer, HeaderInspector, NoopConfigInitializer, UnitInspector,
};
pub use namespace::IsolatedNamespace;
