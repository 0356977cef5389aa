//! Sales summaries grouped by calendar period (UTC).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sales grouped under one period key (`%Y-%m-%d` or `%Y-%m`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    #[serde(rename = "_id")]
    pub period: String,
    #[serde(rename = "totalSales")]
    pub total_sales: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SalesTotal {
    #[serde(rename = "totalSales")]
    pub total_sales: u64,
    pub count: u64,
}

fn group_by<'a, I>(sales: I, format: &str) -> Vec<PeriodSummary>
where
    I: IntoIterator<Item = (&'a DateTime<Utc>, u64)>,
{
    let mut groups: BTreeMap<String, SalesTotal> = BTreeMap::new();
    for (date, amount) in sales {
        let entry = groups.entry(date.format(format).to_string()).or_default();
        entry.total_sales = entry.total_sales.saturating_add(amount);
        entry.count += 1;
    }

    groups
        .into_iter()
        .map(|(period, t)| PeriodSummary {
            period,
            total_sales: t.total_sales,
            count: t.count,
        })
        .collect()
}

/// Daily totals, ascending by day.
pub fn by_day<'a, I>(sales: I) -> Vec<PeriodSummary>
where
    I: IntoIterator<Item = (&'a DateTime<Utc>, u64)>,
{
    group_by(sales, "%Y-%m-%d")
}

/// Monthly totals, ascending by month.
pub fn by_month<'a, I>(sales: I) -> Vec<PeriodSummary>
where
    I: IntoIterator<Item = (&'a DateTime<Utc>, u64)>,
{
    group_by(sales, "%Y-%m")
}

/// Grand total; zero when there are no sales.
pub fn total<'a, I>(sales: I) -> SalesTotal
where
    I: IntoIterator<Item = (&'a DateTime<Utc>, u64)>,
{
    sales.into_iter().fold(SalesTotal::default(), |mut acc, (_, amount)| {
        acc.total_sales = acc.total_sales.saturating_add(amount);
        acc.count += 1;
        acc
    })
}
