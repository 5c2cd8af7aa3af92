//! Tier A: recompute the row from the triple store on every read.

use std::sync::Arc;

use async_trait::async_trait;

use freshgraph_graph::TripleStore;

use crate::error::Result;
use crate::projection::OrderProjector;
use crate::tier::{Tier, TierReader, TierRow};

pub struct OnDemandView {
    projector: OrderProjector,
}

impl OnDemandView {
    pub fn new(store: Arc<dyn TripleStore>) -> Self {
        Self {
            projector: OrderProjector::new(store),
        }
    }
}

#[async_trait]
impl TierReader for OnDemandView {
    fn tier(&self) -> Tier {
        Tier::OnDemand
    }

    async fn read(&self, key: &str) -> Result<Option<TierRow>> {
        Ok(self.projector.project(key).await?.map(|p| p.row))
    }
}
