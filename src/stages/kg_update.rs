//! `kg_update` — terminal no-op placeholder that emits a final progress
//! record; reserved for a future knowledge-graph writer. No output keys
//! of its own.

use async_trait::async_trait;
use std::sync::Arc;

use super::{PartialUpdate, Stage, StageContext};
use crate::errors::StageError;
use crate::state::{DiscoveryState, ProgressRecord};

pub struct KgUpdateStage;

#[async_trait]
impl Stage for KgUpdateStage {
    fn name(&self) -> &'static str {
        crate::dag::STAGE_KG_UPDATE
    }

    async fn run(
        &self,
        _snapshot: Arc<DiscoveryState>,
        _ctx: &StageContext,
    ) -> Result<PartialUpdate, StageError> {
        Ok(PartialUpdate::default().with_progress(ProgressRecord::ok(self.name())))
    }
}
