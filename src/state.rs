use std::sync::Arc;
use std::time::Duration;

use crate::auth::{LoginAttemptGuard, TokenService};
use crate::classifier::Classifier;
use crate::models::{Issue, Project, User};
use crate::store::{RecordStore, Repository};

// 应用状态
pub struct AppState {
    pub users: Repository<User>,
    pub projects: Repository<Project>,
    pub issues: Repository<Issue>,
    pub guard: LoginAttemptGuard,
    pub tokens: Arc<TokenService>,
    pub classifier: Arc<dyn Classifier>,
    pub classifier_timeout: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        guard: LoginAttemptGuard,
        tokens: Arc<TokenService>,
        classifier: Arc<dyn Classifier>,
        classifier_timeout: Duration,
    ) -> Self {
        Self {
            users: Repository::new(store.clone()),
            projects: Repository::new(store.clone()),
            issues: Repository::new(store),
            guard,
            tokens,
            classifier,
            classifier_timeout,
        }
    }
}
