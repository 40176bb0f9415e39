//! Dashboard and location endpoints.

use zephra_core::error::ZephraResult;
use zephra_models::{DashboardData, DashboardQuery, LocationsResponse};

use crate::client::ApiClient;

impl ApiClient {
    /// `GET /api/dashboard` for a named location or coordinates.
    pub async fn get_dashboard(&self, query: &DashboardQuery) -> ZephraResult<DashboardData> {
        self.get_json("/api/dashboard", &query.query_pairs()).await
    }

    /// `GET /api/locations`.
    pub async fn get_locations(&self) -> ZephraResult<LocationsResponse> {
        self.get_json("/api/locations", &[]).await
    }
}
