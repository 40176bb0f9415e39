//! HTTP-backed ports.
//!
//! The API client is the production implementation of every port that
//! talks to the backend.

use async_trait::async_trait;
use tracing::debug;

use zephra_api::{ApiClient, ErrorReport, VersionCheckRequest, VersionCheckResponse};
use zephra_core::error::ZephraResult;
use zephra_models::{DashboardQuery, PushSubscriptionData, SyncQueueItem, SyncType};

use crate::ports::{ErrorReporter, PushRegistry, SyncTransport, VersionSource};

#[async_trait]
impl SyncTransport for ApiClient {
    async fn deliver(&self, item: &SyncQueueItem) -> ZephraResult<()> {
        debug!("delivering {} {}", item.sync_type, item.id);
        match item.sync_type {
            SyncType::AirQualityRequest => {
                let query = DashboardQuery::from_payload(&item.payload);
                self.get_dashboard(&query).await?;
            }
            SyncType::UserPreference => {
                self.update_preferences(&item.payload).await?;
            }
            SyncType::LocationUpdate => {
                self.update_location(&item.payload).await?;
            }
            SyncType::AnalyticsEvent => {
                self.send_analytics_batch(std::slice::from_ref(&item.payload)).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PushRegistry for ApiClient {
    async fn register(&self, subscription: &PushSubscriptionData) -> ZephraResult<()> {
        self.push_subscribe(subscription).await?;
        Ok(())
    }

    async fn unregister(&self, endpoint: &str) -> ZephraResult<()> {
        self.push_unsubscribe(endpoint).await?;
        Ok(())
    }
}

#[async_trait]
impl VersionSource for ApiClient {
    async fn check_version(&self, request: &VersionCheckRequest) -> ZephraResult<VersionCheckResponse> {
        ApiClient::check_version(self, request).await
    }
}

#[async_trait]
impl ErrorReporter for ApiClient {
    async fn report(&self, report: &ErrorReport) -> ZephraResult<()> {
        self.report_error(report).await?;
        Ok(())
    }
}
