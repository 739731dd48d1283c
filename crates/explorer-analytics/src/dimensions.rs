//! 维度筛选与取值范围
//!
//! 维度浏览视图使用的年龄区间、手术名称筛选，以及坐标轴取值范围计算

use explorer_core::{ExplorerError, PatientCase, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 可浏览的维度，序列化为前端使用的维度标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionKey {
    Age,
    IcuDays,
    Ebl,
    Duration,
    Asa,
    Bmi,
    Department,
    Approach,
}

/// 维度类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Numeric,
    Categorical,
}

/// 单个病例在某一维度上的取值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DimensionValue<'a> {
    Numeric(f64),
    Categorical(&'a str),
}

impl DimensionKey {
    pub const ALL: [DimensionKey; 8] = [
        DimensionKey::Age,
        DimensionKey::IcuDays,
        DimensionKey::Ebl,
        DimensionKey::Duration,
        DimensionKey::Asa,
        DimensionKey::Bmi,
        DimensionKey::Department,
        DimensionKey::Approach,
    ];

    /// 前端使用的维度标识
    pub fn id(&self) -> &'static str {
        match self {
            DimensionKey::Age => "age",
            DimensionKey::IcuDays => "icu",
            DimensionKey::Ebl => "ebl",
            DimensionKey::Duration => "duration",
            DimensionKey::Asa => "asa",
            DimensionKey::Bmi => "bmi",
            DimensionKey::Department => "department",
            DimensionKey::Approach => "approach",
        }
    }

    /// 坐标轴标签
    pub fn label(&self) -> &'static str {
        match self {
            DimensionKey::Age => "Age (years)",
            DimensionKey::IcuDays => "ICU Days",
            DimensionKey::Ebl => "Blood Loss (mL)",
            DimensionKey::Duration => "Surgery Duration (min)",
            DimensionKey::Asa => "ASA Score",
            DimensionKey::Bmi => "Body Mass Index",
            DimensionKey::Department => "Department",
            DimensionKey::Approach => "Surgical Approach",
        }
    }

    pub fn kind(&self) -> DimensionKind {
        match self {
            DimensionKey::Department | DimensionKey::Approach => DimensionKind::Categorical,
            _ => DimensionKind::Numeric,
        }
    }

    /// 读取病例在该维度上的值
    pub fn value<'a>(&self, case: &'a PatientCase) -> DimensionValue<'a> {
        match self {
            DimensionKey::Age => DimensionValue::Numeric(case.age),
            DimensionKey::IcuDays => DimensionValue::Numeric(case.icu_days),
            DimensionKey::Ebl => DimensionValue::Numeric(case.intraop_ebl),
            DimensionKey::Duration => DimensionValue::Numeric(case.duration),
            DimensionKey::Asa => DimensionValue::Numeric(case.asa),
            DimensionKey::Bmi => DimensionValue::Numeric(case.bmi),
            DimensionKey::Department => DimensionValue::Categorical(&case.department),
            DimensionKey::Approach => DimensionValue::Categorical(&case.approach),
        }
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DimensionKey {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "age" => Ok(DimensionKey::Age),
            "icu" | "icu_days" => Ok(DimensionKey::IcuDays),
            "ebl" | "intraop_ebl" => Ok(DimensionKey::Ebl),
            "duration" => Ok(DimensionKey::Duration),
            "asa" => Ok(DimensionKey::Asa),
            "bmi" => Ok(DimensionKey::Bmi),
            "department" => Ok(DimensionKey::Department),
            "approach" => Ok(DimensionKey::Approach),
            other => Err(ExplorerError::Validation(format!("Unknown dimension: {}", other))),
        }
    }
}

impl Serialize for DimensionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for DimensionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        id.parse().map_err(de::Error::custom)
    }
}

/// 维度筛选条件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionCriteria {
    pub age_min: f64,
    pub age_max: f64,
    pub surgery: Option<String>,
}

impl DimensionCriteria {
    pub fn age_range(age_min: f64, age_max: f64) -> Self {
        Self {
            age_min,
            age_max,
            surgery: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.age_min > self.age_max {
            return Err(ExplorerError::Validation(format!(
                "age_min {} is greater than age_max {}",
                self.age_min, self.age_max
            )));
        }
        Ok(())
    }
}

/// 按维度条件筛选病例
///
/// 年龄和 ASA 都必须为正数；年龄区间为闭区间；手术名称区分大小写精确匹配。
pub fn filter_by_dimensions<'a>(
    records: &'a [PatientCase],
    criteria: &DimensionCriteria,
) -> Result<Vec<&'a PatientCase>> {
    criteria.validate()?;

    let filtered: Vec<&PatientCase> = records
        .iter()
        .filter(|case| case.age > 0.0 && case.asa > 0.0)
        .filter(|case| case.age >= criteria.age_min && case.age <= criteria.age_max)
        .filter(|case| match &criteria.surgery {
            Some(name) => case.opname == *name,
            None => true,
        })
        .collect();

    tracing::debug!(
        "Dimension filter [{}, {}] kept {} of {} cases",
        criteria.age_min,
        criteria.age_max,
        filtered.len(),
        records.len()
    );
    Ok(filtered)
}

/// 维度取值范围
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataRange {
    Numeric { min: Option<f64>, max: Option<f64> },
    Categorical { categories: Vec<String> },
}

/// 计算一组病例在某一维度上的取值范围
pub fn data_range<'a, I>(records: I, key: DimensionKey) -> DataRange
where
    I: IntoIterator<Item = &'a PatientCase>,
{
    match key.kind() {
        DimensionKind::Categorical => {
            let categories: BTreeSet<&str> = records
                .into_iter()
                .filter_map(|case| match key.value(case) {
                    DimensionValue::Categorical(value) if !value.is_empty() => Some(value),
                    _ => None,
                })
                .collect();
            DataRange::Categorical {
                categories: categories.into_iter().map(str::to_string).collect(),
            }
        }
        DimensionKind::Numeric => {
            let mut min: Option<f64> = None;
            let mut max: Option<f64> = None;
            for case in records {
                if let DimensionValue::Numeric(value) = key.value(case) {
                    if !value.is_finite() {
                        continue;
                    }
                    min = Some(min.map_or(value, |m| m.min(value)));
                    max = Some(max.map_or(value, |m| m.max(value)));
                }
            }
            DataRange::Numeric { min, max }
        }
    }
}
