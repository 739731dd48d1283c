//! 统计汇总
//!
//! 匹配器和维度筛选共用的均值、比率和分类计数工具

use explorer_core::PatientCase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::normalizer::UNKNOWN_CATEGORY;

/// 概要统计
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean_age: f64,
    pub mean_duration: f64,
    pub mortality_rate_percent: f64,
}

/// 分类计数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryCount {
    pub key: String,
    pub count: usize,
}

/// 带占比的分类计数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryShare {
    pub key: String,
    pub count: usize,
    pub percentage: f64,
}

/// 算术平均，空集合返回 0
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// 非空集合的算术平均，空集合返回 `None`
pub fn mean_opt<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut values = values.into_iter().peekable();
    values.peek()?;
    Some(mean(values))
}

/// 中位数，偶数个取中间两数的平均，空集合返回 `None`
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// 百分比，分母为 0 时返回 0
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// 计算概要统计
pub fn summarize(records: &[&PatientCase]) -> Summary {
    let count = records.len();
    let deaths = records.iter().filter(|case| case.death_inhosp).count();

    Summary {
        count,
        mean_age: mean(records.iter().map(|case| case.age)),
        mean_duration: mean(records.iter().map(|case| case.duration)),
        mortality_rate_percent: percent(deaths, count),
    }
}

/// 按分类键计数，数量降序，数量相同按键名升序
pub fn rollup_by_category<'a, F>(records: &[&'a PatientCase], key_fn: F) -> Vec<CategoryCount>
where
    F: Fn(&'a PatientCase) -> &'a str,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for case in records {
        *counts.entry(key_fn(*case)).or_insert(0) += 1;
    }

    let mut rollup: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(key, count)| CategoryCount {
            key: key.to_string(),
            count,
        })
        .collect();
    rollup.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    rollup
}

/// 取前 N 个分类
pub fn top_n(mut rollup: Vec<CategoryCount>, n: usize) -> Vec<CategoryCount> {
    rollup.truncate(n);
    rollup
}

/// 计算每个分类占全部计数的百分比
pub fn shares(rollup: &[CategoryCount]) -> Vec<CategoryShare> {
    let total: usize = rollup.iter().map(|c| c.count).sum();
    rollup
        .iter()
        .map(|c| CategoryShare {
            key: c.key.clone(),
            count: c.count,
            percentage: percent(c.count, total),
        })
        .collect()
}

/// 患者画像视图的汇总
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileSummary {
    pub summary: Summary,
    pub mean_icu_days: f64,
    pub mean_ebl: f64,
    pub top_surgeries: Vec<CategoryCount>,
    pub approaches: Vec<CategoryShare>,
}

/// 画像视图中展示的常见手术数量
pub const TOP_SURGERY_COUNT: usize = 5;

impl ProfileSummary {
    pub fn compute(records: &[&PatientCase]) -> Self {
        let surgeries = rollup_by_category(records, |case| non_blank_or_unknown(&case.opname));
        let approaches = rollup_by_category(records, |case| non_blank_or_unknown(&case.approach));

        Self {
            summary: summarize(records),
            mean_icu_days: mean(records.iter().map(|case| case.icu_days)),
            mean_ebl: mean(records.iter().map(|case| case.intraop_ebl)),
            top_surgeries: top_n(surgeries, TOP_SURGERY_COUNT),
            approaches: shares(&approaches),
        }
    }
}

fn non_blank_or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        UNKNOWN_CATEGORY
    } else {
        value
    }
}
