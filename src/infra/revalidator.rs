//! Cache-invalidation collaborators.

use std::time::Duration;

use async_trait::async_trait;
use escriba_api_types::RevalidationTarget;
use reqwest::{Client, Url};
use tracing::{debug, info};

use crate::application::revalidate::{Revalidator, RevalidatorError};
use crate::infra::error::InfraError;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwards every target as a JSON document to a downstream endpoint, e.g. a
/// CDN purge hook or the frontend's own revalidation route.
#[derive(Clone, Debug)]
pub struct HttpRevalidator {
    client: Client,
    endpoint: Url,
}

impl HttpRevalidator {
    pub fn new(endpoint: &str) -> Result<Self, InfraError> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            InfraError::configuration(format!("invalid revalidate.forward_url `{endpoint}`: {err}"))
        })?;
        let client = Client::builder()
            .user_agent(concat!("escriba/", env!("CARGO_PKG_VERSION")))
            .timeout(FORWARD_TIMEOUT)
            .build()
            .map_err(|err| InfraError::configuration(format!("failed to build http client: {err}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Revalidator for HttpRevalidator {
    async fn revalidate(&self, target: &RevalidationTarget) -> Result<(), RevalidatorError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(target)
            .send()
            .await
            .map_err(|err| RevalidatorError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RevalidatorError::Status {
                status: status.as_u16(),
            });
        }
        debug!(
            target = "infra::revalidator::http",
            revalidation_target = ?target,
            status = status.as_u16(),
            "forwarded revalidation"
        );
        Ok(())
    }
}

/// Records targets in the log only. Used when no forward URL is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRevalidator;

#[async_trait]
impl Revalidator for LogRevalidator {
    async fn revalidate(&self, target: &RevalidationTarget) -> Result<(), RevalidatorError> {
        match target {
            RevalidationTarget::Path(path) => {
                info!(target = "infra::revalidator::log", path = %path, "revalidate path")
            }
            RevalidationTarget::Tag(tag) => {
                info!(target = "infra::revalidator::log", tag = %tag, "revalidate tag")
            }
        }
        Ok(())
    }
}
