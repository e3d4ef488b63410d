//! # pws-engine: personal workspace convergence
//!
//! Every tenant may ask for a personal workspace. When it does, and its
//! private namespace exists, three things must exist together:
//!
//! - a cluster-scoped workspace named `personal-<identity>` owned by the tenant,
//! - a `Manager` subscription to it in the tenant's spec,
//! - a grant in the private namespace binding the tenant to the template
//!   management role.
//!
//! Otherwise none of them may exist. A [`ConvergenceEngine`] pass moves one
//! tenant towards whichever state applies; passes are idempotent, and a
//! pass that fails half way leaves a state the next pass completes.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pws_engine::prelude::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let reconciler = PersonalWorkspaceReconciler::new(store, EngineConfig::from_env()?);
//!
//! let identity = TenantIdentity::parse("john.doe@example.com")?;
//! let report = reconciler.reconcile(&identity).await?;
//! println!("{} change(s)", report.applied.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod desired;
pub mod engine;
pub mod error;
pub mod naming;
pub mod observed;
pub mod projector;
pub mod reconciler;
pub mod retry;
pub mod templates;

#[cfg(feature = "tracing-basic")]
pub mod telemetry;

pub use config::{EngineConfig, Label};
pub use desired::{resolve, DesiredState};
pub use engine::{Applied, ConvergenceEngine, Direction, PassReport};
pub use error::{ReconcileError, ReconcileResult, Step};
pub use naming::{personal_workspace_name, tenant_namespace_name};
pub use observed::{current_role, workspace_exists, ObservedState};
pub use projector::StatusProjector;
pub use reconciler::{PersonalWorkspaceReconciler, TenantFeature};
pub use retry::{RetryDecision, RetryPolicy};

pub mod prelude {
    pub use crate::{
        Applied, ConvergenceEngine, Direction, EngineConfig, PassReport,
        PersonalWorkspaceReconciler, ReconcileError, ReconcileResult, RetryDecision, RetryPolicy,
        TenantFeature,
    };

    pub use pws_core::{
        MemoryStore, ObjectKey, ObjectStore, StoreError, TenantIdentity, TenantRecord,
        WorkspaceRole,
    };

    pub use async_trait::async_trait;
}
