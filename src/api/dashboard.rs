// Dashboard aggregation endpoints

use crate::error::Result;
use crate::http_client::ApiClient;
use crate::models::{DashboardGoal, DashboardStats, Recommendation};

pub async fn stats(api: &ApiClient) -> Result<DashboardStats> {
    api.get_json("/dashboard/stats").await
}

pub async fn goals(api: &ApiClient) -> Result<Vec<DashboardGoal>> {
    api.get_json("/dashboard/goals").await
}

pub async fn recommendations(api: &ApiClient) -> Result<Vec<Recommendation>> {
    api.get_json("/dashboard/recommendations").await
}
