//! Library scanning.
//!
//! A scan runs in stages:
//! - [`walker`] lists every regular file under the library root
//! - [`filter`] drops excluded files and recognizes model formats
//! - [`grouper`] folds files into candidate models by folder layout
//! - [`detector`] compares candidates with the stored models
//! - [`orchestrator`] applies the result and submits rescan tasks

pub mod detector;
pub mod filter;
pub mod grouper;
pub mod locks;
pub mod orchestrator;
pub mod paths;
pub mod queue;
pub mod walker;

pub use detector::{detect_changes, fingerprint, ChangedModel, FingerprintedModel, ScanDelta};
pub use filter::FileFilter;
pub use grouper::{group_files, CandidateModel, GroupingRules, MemberFile};
pub use locks::{LibraryGuard, ScanLocks};
pub use orchestrator::{host_default_case, LibraryScanner, ScanSettings, ScanSummary};
pub use paths::{relative_path, CaseSensitivity};
pub use queue::{RecordingQueue, RescanQueue, RescanReason, RescanRequest};
pub use walker::{check_root, filenames_on_disk, DiscoveredFile, FileWalk, ScanWarning};
