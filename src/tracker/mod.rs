pub mod analyzer;
pub mod clock;
pub mod event;
pub mod history;
pub mod ingest;
pub mod logs;
pub mod sweeper;

pub use event::{decode_pod_event, EventError, PodEvent, PodSnapshot};
pub use history::{KeyStats, PodContainerKey, RestartHistory};
pub use ingest::{EvictionReport, IngestReport, Tracker};
pub use logs::{KubeApiLogSource, KubectlLogSource, LogSource};
pub use sweeper::run_eviction_sweeper;
