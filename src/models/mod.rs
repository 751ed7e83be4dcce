// Domain models

mod pod;
mod sample;
mod usage;

pub use pod::{PodInfo, PodStatus};
pub use sample::{IngestBatch, NetworkSample, ProcessSample, Tags};
pub use usage::{NetworkUsageRow, ResourceUsageRow};
