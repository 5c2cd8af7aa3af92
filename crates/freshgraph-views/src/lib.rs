//! FreshGraph Views: derived order rows materialized three ways.
//!
//! - **Tier A** [`OnDemandView`]: recomputed from the triple store on every read
//! - **Tier B** [`BatchCacheView`]: a snapshot rebuilt only by `refresh()`
//! - **Tier C** [`IncrementalView`]: kept current from the store's change feed
//!
//! All three serve the same [`projection`] of an order, so the only thing
//! that differs between them is how stale a row can be.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod incremental;
pub mod on_demand;
pub mod projection;
pub mod search_sync;
pub mod tier;

pub use batch::BatchCacheView;
pub use config::ViewConfig;
pub use error::{Result, ViewError};
pub use incremental::IncrementalView;
pub use on_demand::OnDemandView;
pub use projection::OrderProjector;
pub use tier::{BatchRefresher, RefreshReport, Tier, TierReader, TierRow};
