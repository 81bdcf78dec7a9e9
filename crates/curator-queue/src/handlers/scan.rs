//! `scan` handler: run the directory scanner over a library path.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use curator_providers::ProviderFactory;
use curator_types::{ItemOutcome, ScanPayload};

use crate::handler::{HandlerContext, HandlerError, TaskHandler};

pub struct ScanHandler {
    providers: Arc<dyn ProviderFactory>,
}

impl ScanHandler {
    pub fn new(providers: Arc<dyn ProviderFactory>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl TaskHandler for ScanHandler {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        payload: &Value,
    ) -> Result<ItemOutcome, HandlerError> {
        let payload: ScanPayload = match serde_json::from_value(payload.clone()) {
            Ok(p) => p,
            Err(err) => return Ok(ItemOutcome::failed(format!("invalid scan payload: {err}"))),
        };

        let scanner = self.providers.directory_scanner();
        match scanner.scan(Path::new(&payload.path), payload.media_type).await {
            Ok(entries) => {
                info!(
                    task_id = ctx.task_id,
                    path = %payload.path,
                    found = entries.len(),
                    "scan finished"
                );
                Ok(ItemOutcome::Completed(json!({ "found": entries.len() })))
            }
            Err(err) => Ok(ItemOutcome::failed(err.to_string())),
        }
    }
}
