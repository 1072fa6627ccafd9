//! Back-office dashboard aggregates.

use super::ApiClient;
use crate::{DashboardStats, RecentUpdate, Result};

impl ApiClient {
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> { self.get("/dashboard/stats").await }

    pub async fn recent_updates(&self) -> Result<Vec<RecentUpdate>> { self.get("/dashboard/recent-updates").await }
}
