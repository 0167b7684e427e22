use std::sync::Arc;

use application::EventHub;
use domain::{CredentialVerifier, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<EventHub>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    pub fn new(
        hub: Arc<EventHub>,
        verifier: Arc<dyn CredentialVerifier>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self { hub, verifier, users }
    }
}
