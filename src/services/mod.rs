pub mod debug_artifacts;
pub mod maps_page;
pub mod review_store;

pub use debug_artifacts::{DebugArtifacts, DebugStage};
pub use maps_page::MapsPage;
pub use review_store::{JsonReviewStore, MergeSummary, StoreLocks};
