// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reactive feature services for the Roost bot fleet.
//!
//! Three independent subscribers to the inbound event stream: status
//! auto-view/react, deleted-message capture, and hidden-once media capture.
//! Each has its own per-bot persisted config document and throttling; no
//! state is shared across bots or services.

pub mod anti_delete;
pub mod auto_status;
pub mod scratch;
pub mod view_once;

pub use anti_delete::{ANTI_DELETE_SERVICE, AntiDeleteSettings, DeletedMessageCapture};
pub use auto_status::{AUTO_STATUS_SERVICE, AutoStatusSettings, StatusAutoViewer};
pub use scratch::ScratchArea;
pub use view_once::{CaptureOutcome, VIEW_ONCE_SERVICE, ViewOnceCapture, ViewOnceSettings};

use std::sync::Arc;

use roost_config::model::FeaturesConfig;
use roost_core::traits::FleetStore;

/// All feature services wired to one store and one scratch area,
/// constructed by the process root and injected into sessions.
pub struct FeatureSet {
    pub auto_status: StatusAutoViewer,
    pub anti_delete: DeletedMessageCapture,
    pub view_once: ViewOnceCapture,
}

impl FeatureSet {
    pub fn new(store: Arc<dyn FleetStore>, config: &FeaturesConfig) -> Self {
        let scratch = Arc::new(ScratchArea::new(
            config.scratch_dir.clone(),
            config.scratch_max_bytes,
        ));
        Self {
            auto_status: StatusAutoViewer::new(Arc::clone(&store)),
            anti_delete: DeletedMessageCapture::new(
                Arc::clone(&store),
                Arc::clone(&scratch),
                config.deleted_cache_capacity,
                config.summary_max_chars,
            ),
            view_once: ViewOnceCapture::new(store, scratch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_test_utils::MemoryStore;

    #[tokio::test]
    async fn feature_set_builds_from_config() {
        let store = Arc::new(MemoryStore::new("S1"));
        let config = FeaturesConfig::default();
        let features = FeatureSet::new(store, &config);
        assert_eq!(features.anti_delete.cached_count("b1").await, 0);
    }
}
