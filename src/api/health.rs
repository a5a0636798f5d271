use serde_json::Value as JsonValue;

use super::{ endpoints, ApiClient };
use crate::error::ApiError;
use crate::models::health::{ HealthStat, PersonalStatistics, StatisticsPeriod, StatisticsQuery };

impl ApiClient {
    pub async fn my_statistics(
        &self,
        token: &str,
        period: StatisticsPeriod,
        query: &StatisticsQuery
    ) -> Result<PersonalStatistics, ApiError> {
        let data = self.get_json(token, endpoints::MY_STATISTICS, &query.to_params(period)).await?;
        Ok(PersonalStatistics { period, data })
    }

    pub async fn health_statistics(&self, token: &str) -> Result<JsonValue, ApiError> {
        self.get_json(token, endpoints::HEALTH_STATISTIC, &[]).await
    }

    pub async fn record_health_stat(&self, token: &str, stat: &HealthStat) -> Result<HealthStat, ApiError> {
        self.post_json(token, endpoints::HEALTH_STATISTIC, stat).await
    }

    pub async fn track_health_changes(
        &self,
        token: &str,
        period: StatisticsPeriod,
        query: &StatisticsQuery
    ) -> Result<PersonalStatistics, ApiError> {
        let data = self.get_json(token, endpoints::HEALTH_TRACK_CHANGES, &query.to_params(period)).await?;
        Ok(PersonalStatistics { period, data })
    }
}
