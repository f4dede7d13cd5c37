/// Workflow services
///
/// Each service takes the acting [`crate::auth::context::AuthContext`] as its
/// first argument and performs its own permission checks, so the HTTP layer
/// never decides authorization by itself.
///
/// - `directory`: login, principal resolution, users and roles
/// - `engine`: the task lifecycle state machine
/// - `audit`: per-task comment trail
/// - `notifications`: per-user notifications and the live feed
/// - `reports`: task summary
///
/// # Example
///
/// ```
/// use taskflow_shared::services::Services;
/// use taskflow_shared::store::Stores;
///
/// let services = Services::new(Stores::in_memory());
/// let _feed = services.dispatcher.subscribe();
/// ```

pub mod audit;
pub mod directory;
pub mod engine;
pub mod error;
pub mod notifications;
pub mod reports;

pub use error::{WorkflowError, WorkflowResult};

use crate::store::Stores;

/// Every service wired to one set of stores
#[derive(Clone)]
pub struct Services {
    pub directory: directory::Directory,
    pub audit: audit::AuditTrail,
    pub dispatcher: notifications::Dispatcher,
    pub engine: engine::TaskEngine,
    pub reports: reports::Reports,
}

impl Services {
    pub fn new(stores: Stores) -> Self {
        let directory = directory::Directory::new(stores.clone());
        let audit = audit::AuditTrail::new(stores.comments.clone());
        let dispatcher = notifications::Dispatcher::new(stores.notifications.clone());
        let engine = engine::TaskEngine::new(
            stores.tasks.clone(),
            directory.clone(),
            audit.clone(),
            dispatcher.clone(),
        );
        let reports = reports::Reports::new(stores.tasks.clone());

        Self {
            directory,
            audit,
            dispatcher,
            engine,
            reports,
        }
    }
}
