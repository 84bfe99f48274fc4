// Telemetry, pricing and billing shapes exchanged with the data gateways.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    Maximum,
}

/// One metric over one resource, e.g. ("AWS/EC2", "CPUUtilization", i-123, Average, hourly).
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub namespace: &'static str,
    pub metric_name: &'static str,
    pub resource_id: String,
    pub statistic: Statistic,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    /// Value of the statistic that was requested.
    pub value: f64,
}

/// Samples for one metric. May be empty; empty means "no evidence".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub datapoints: Vec<Datapoint>,
}

impl MetricSeries {
    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    pub fn average(&self) -> Option<f64> {
        if self.datapoints.is_empty() {
            return None;
        }
        Some(self.sum()? / self.datapoints.len() as f64)
    }

    pub fn max(&self) -> Option<f64> {
        self.datapoints.iter().map(|d| d.value).reduce(f64::max)
    }

    pub fn sum(&self) -> Option<f64> {
        if self.datapoints.is_empty() {
            return None;
        }
        Some(self.datapoints.iter().map(|d| d.value).sum())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalPrice {
    pub region: String,
    pub hourly_price: f64,
}

/// On-demand prices for one instance type across regions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfo {
    pub offers: Vec<RegionalPrice>,
}

impl PriceInfo {
    pub fn price_in(&self, region: &str) -> Option<f64> {
        self.offers
            .iter()
            .find(|o| o.region == region)
            .map(|o| o.hourly_price)
    }

    pub fn cheapest(&self) -> Option<&RegionalPrice> {
        self.offers
            .iter()
            .min_by(|a, b| a.hourly_price.total_cmp(&b.hourly_price))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCoverage {
    pub available_reservations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    Daily,
    Monthly,
}

/// One grouped billing row: spend for one service on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    pub date: NaiveDate,
    pub service: String,
    pub amount: f64,
}
