//! Server state

use std::sync::Arc;

use crate::deploy::pipeline::WebhookController;

/// Server state shared across handlers
pub struct ServerState {
    pub controller: Arc<WebhookController>,
}

impl ServerState {
    pub fn new(controller: Arc<WebhookController>) -> Self {
        Self { controller }
    }
}
