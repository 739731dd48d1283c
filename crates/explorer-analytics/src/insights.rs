//! 手术洞察与年龄组分布
//!
//! 单个手术的人口学、诊疗和结局指标，以及按年龄段的结局构成

use explorer_core::{ExplorerError, PatientCase, Result, Sex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::normalizer::UNKNOWN_CATEGORY;
use crate::stats::{mean, mean_opt, median, percent, rollup_by_category, CategoryCount, CategoryShare};

/// 生成手术洞察所需的最少病例数
pub const MIN_SURGERY_CASES: usize = 5;

/// 列出所有手术名称及病例数，病例数降序
pub fn surgery_options(records: &[PatientCase]) -> Vec<CategoryCount> {
    let named: Vec<&PatientCase> = records
        .iter()
        .filter(|case| !case.opname.trim().is_empty())
        .collect();
    rollup_by_category(&named, |case| case.opname.as_str())
}

/// 精确匹配手术名称（区分大小写）
pub fn surgery_cases<'a>(records: &'a [PatientCase], name: &str) -> Vec<&'a PatientCase> {
    records.iter().filter(|case| case.opname == name).collect()
}

/// BMI 分类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    NormalWeight,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::NormalWeight
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }
}

/// 年龄区间
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgeSpan {
    pub min: f64,
    pub max: f64,
}

/// 人口学特征
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Demographics {
    pub mean_age: Option<f64>,
    pub median_age: Option<f64>,
    pub age_span: Option<AgeSpan>,
    pub male_percent: f64,
    pub female_percent: f64,
    pub mean_bmi: Option<f64>,
    pub bmi_category: Option<BmiCategory>,
    pub primary_asa: Option<CategoryShare>,
}

/// 诊疗特征
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PracticePattern {
    pub top_approach: Option<CategoryShare>,
    pub top_department: Option<CategoryShare>,
    pub top_anesthesia: Option<CategoryShare>,
    pub top_iv_access: Option<CategoryShare>,
    pub top_arterial_line: Option<CategoryShare>,
    pub mean_duration_minutes: f64,
    pub mean_crystalloid_ml: f64,
    pub mean_colloid_ml: f64,
    pub mean_ebl_ml: f64,
}

/// 结局指标
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeMetrics {
    pub mean_length_of_stay_days: Option<f64>,
    pub median_length_of_stay_days: Option<f64>,
    pub icu_admission_percent: f64,
    pub mean_icu_days: f64,
    pub mortality_rate_percent: f64,
}

/// 与全部数据相比的相对差异（百分比），基线为 0 时为 `None`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineComparison {
    pub duration_percent: Option<f64>,
    pub ebl_percent: Option<f64>,
    pub mortality_percent: Option<f64>,
    pub icu_days_percent: Option<f64>,
}

/// 单个手术的洞察
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurgeryInsights {
    pub case_count: usize,
    pub demographics: Demographics,
    pub practice: PracticePattern,
    pub outcomes: OutcomeMetrics,
    pub comparison: BaselineComparison,
}

impl SurgeryInsights {
    /// 基于某手术的病例和全部病例计算洞察
    pub fn compute(cases: &[&PatientCase], all_cases: &[PatientCase]) -> Self {
        let all: Vec<&PatientCase> = all_cases.iter().collect();
        let total = cases.len();

        let valid_ages: Vec<f64> = cases
            .iter()
            .map(|case| case.age)
            .filter(|age| *age > 0.0 && *age < 120.0)
            .collect();
        let age_span = valid_ages.iter().fold(None, |span: Option<AgeSpan>, age| {
            Some(match span {
                Some(s) => AgeSpan { min: s.min.min(*age), max: s.max.max(*age) },
                None => AgeSpan { min: *age, max: *age },
            })
        });

        let with_sex: Vec<Sex> = cases.iter().filter_map(|case| case.sex).collect();
        let males = with_sex.iter().filter(|sex| **sex == Sex::Male).count();
        let females = with_sex.len() - males;

        let mean_bmi = mean_opt(
            cases
                .iter()
                .map(|case| case.bmi)
                .filter(|bmi| *bmi > 10.0 && *bmi < 60.0),
        );

        let asa_classes: Vec<String> = cases
            .iter()
            .filter_map(|case| case.asa_class())
            .map(|class| class.to_string())
            .collect();
        let primary_asa = most_common(&asa_classes).map(|top| share_of(top, total));

        let demographics = Demographics {
            mean_age: mean_opt(valid_ages.iter().copied()),
            median_age: median(valid_ages.iter().copied()),
            age_span,
            male_percent: percent(males, with_sex.len()),
            female_percent: percent(females, with_sex.len()),
            mean_bmi,
            bmi_category: mean_bmi.map(BmiCategory::from_bmi),
            primary_asa,
        };

        let practice = PracticePattern {
            top_approach: dominant(cases, |case| case.approach.as_str()),
            top_department: dominant(cases, |case| case.department.as_str()),
            top_anesthesia: dominant(cases, |case| case.ane_type.as_str()),
            top_iv_access: dominant(cases, |case| case.iv1.as_str()),
            top_arterial_line: dominant(cases, |case| case.aline1.as_str()),
            mean_duration_minutes: mean_operative_minutes(cases),
            mean_crystalloid_ml: mean_non_negative(cases, |case| case.intraop_crystalloid),
            mean_colloid_ml: mean_non_negative(cases, |case| case.intraop_colloid),
            mean_ebl_ml: mean_non_negative(cases, |case| case.intraop_ebl),
        };

        let icu_admissions = cases.iter().filter(|case| case.icu_days > 0.0).count();
        let deaths = cases.iter().filter(|case| case.death_inhosp).count();
        let stays: Vec<f64> = cases.iter().filter_map(|case| case.length_of_stay_days()).collect();
        let outcomes = OutcomeMetrics {
            mean_length_of_stay_days: mean_opt(stays.iter().copied()),
            median_length_of_stay_days: median(stays.iter().copied()),
            icu_admission_percent: percent(icu_admissions, total),
            mean_icu_days: mean_icu_stay(cases),
            mortality_rate_percent: percent(deaths, total),
        };

        let overall_deaths = all.iter().filter(|case| case.death_inhosp).count();
        let comparison = BaselineComparison {
            duration_percent: relative_difference(
                practice.mean_duration_minutes,
                mean_operative_minutes(&all),
            ),
            ebl_percent: relative_difference(
                practice.mean_ebl_ml,
                mean_non_negative(&all, |case| case.intraop_ebl),
            ),
            mortality_percent: relative_difference(
                outcomes.mortality_rate_percent,
                percent(overall_deaths, all.len()),
            ),
            icu_days_percent: relative_difference(outcomes.mean_icu_days, mean_icu_stay(&all)),
        };

        Self {
            case_count: total,
            demographics,
            practice,
            outcomes,
            comparison,
        }
    }
}

/// 最常见的非空分类及其占全部病例的百分比
fn dominant<'a, F>(cases: &[&'a PatientCase], key_fn: F) -> Option<CategoryShare>
where
    F: Fn(&'a PatientCase) -> &'a str,
{
    let present: Vec<&PatientCase> = cases
        .iter()
        .copied()
        .filter(|case| !key_fn(*case).trim().is_empty())
        .collect();
    rollup_by_category(&present, key_fn)
        .into_iter()
        .next()
        .map(|top| share_of(top, cases.len()))
}

fn most_common(labels: &[String]) -> Option<CategoryCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(key, count)| CategoryCount { key: key.to_string(), count })
        .max_by(|a, b| a.count.cmp(&b.count).then_with(|| b.key.cmp(&a.key)))
}

fn share_of(top: CategoryCount, total: usize) -> CategoryShare {
    CategoryShare {
        percentage: percent(top.count, total),
        key: top.key,
        count: top.count,
    }
}

/// 结束晚于开始的病例的平均手术时长（分钟）
fn mean_operative_minutes(cases: &[&PatientCase]) -> f64 {
    mean(
        cases
            .iter()
            .filter(|case| case.opstart > 0.0 && case.opend > case.opstart)
            .map(|case| (case.opend - case.opstart) / 60.0),
    )
}

fn mean_non_negative<F>(cases: &[&PatientCase], field: F) -> f64
where
    F: Fn(&PatientCase) -> f64,
{
    mean(cases.iter().map(|case| field(*case)).filter(|value| *value >= 0.0))
}

/// 入住 ICU 病例的平均 ICU 天数
fn mean_icu_stay(cases: &[&PatientCase]) -> f64 {
    mean(cases.iter().map(|case| case.icu_days).filter(|days| *days > 0.0))
}

fn relative_difference(value: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 {
        None
    } else {
        Some((value - baseline) / baseline * 100.0)
    }
}

/// 年龄组分布的指标
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownMetric {
    Mortality,
    OperationType,
    AnesthesiaType,
}

impl FromStr for BreakdownMetric {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mortality" => Ok(BreakdownMetric::Mortality),
            "optype" | "operation_type" => Ok(BreakdownMetric::OperationType),
            "ane_type" | "anesthesia_type" => Ok(BreakdownMetric::AnesthesiaType),
            other => Err(ExplorerError::Validation(format!("Unknown breakdown metric: {}", other))),
        }
    }
}

/// 年龄所在的十岁年龄段下限
pub fn age_group(age: f64) -> i32 {
    ((age / 10.0).floor() * 10.0) as i32
}

/// 某一年龄段内按指标的病例构成
///
/// 死亡率指标总是按「存活、死亡」两项顺序返回，其他指标按病例数降序。
pub fn age_group_breakdown(
    records: &[PatientCase],
    decade: i32,
    metric: BreakdownMetric,
) -> Vec<CategoryCount> {
    let group: Vec<&PatientCase> = records
        .iter()
        .filter(|case| age_group(case.age) == decade)
        .collect();

    match metric {
        BreakdownMetric::Mortality => {
            let deaths = group.iter().filter(|case| case.death_inhosp).count();
            vec![
                CategoryCount { key: "No Mortality".to_string(), count: group.len() - deaths },
                CategoryCount { key: "Mortality".to_string(), count: deaths },
            ]
        }
        BreakdownMetric::OperationType => {
            rollup_by_category(&group, |case| or_unknown(&case.optype))
        }
        BreakdownMetric::AnesthesiaType => {
            rollup_by_category(&group, |case| or_unknown(&case.ane_type))
        }
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        UNKNOWN_CATEGORY
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: f64 = 3600.0;
    const DAY: f64 = 86_400.0;

    fn surgery_case(name: &str, age: f64, sex: Sex) -> PatientCase {
        PatientCase {
            age,
            sex: Some(sex),
            opname: name.to_string(),
            ..Default::default()
        }
    }

    fn sample() -> Vec<PatientCase> {
        let mut cases = vec![
            surgery_case("Hemicolectomy", 60.0, Sex::Male),
            surgery_case("Hemicolectomy", 70.0, Sex::Female),
            surgery_case("Hemicolectomy", 80.0, Sex::Male),
            surgery_case("Hemicolectomy", 66.0, Sex::Male),
            surgery_case("Appendectomy", 25.0, Sex::Female),
            surgery_case("Appendectomy", 31.0, Sex::Male),
            surgery_case("", 44.0, Sex::Female),
        ];
        for (i, case) in cases.iter_mut().enumerate() {
            case.opstart = 10.0 * HOUR;
            case.asa = 2.0;
            case.bmi = 24.0;
            if case.opname == "Hemicolectomy" {
                case.opend = case.opstart + 3.0 * HOUR;
                case.intraop_ebl = 400.0;
                case.approach = "Videoscopic".to_string();
                case.ane_type = "General".to_string();
                case.adm = DAY;
                case.dis = DAY * 8.0;
                case.icu_days = if i == 0 { 2.0 } else { 0.0 };
                case.death_inhosp = i == 2;
            } else {
                case.opend = case.opstart + HOUR;
                case.intraop_ebl = 0.0;
                case.approach = "Open".to_string();
            }
        }
        cases[3].asa = 3.0;
        cases
    }

    #[test]
    fn test_surgery_options() {
        let options = surgery_options(&sample());
        assert_eq!(
            options,
            vec![
                CategoryCount { key: "Hemicolectomy".to_string(), count: 4 },
                CategoryCount { key: "Appendectomy".to_string(), count: 2 },
            ]
        );
    }

    #[test]
    fn test_surgery_cases_exact_match() {
        let records = sample();
        assert_eq!(surgery_cases(&records, "Hemicolectomy").len(), 4);
        assert!(surgery_cases(&records, "hemicolectomy").is_empty());
    }

    #[test]
    fn test_surgery_insights() {
        let records = sample();
        let cases = surgery_cases(&records, "Hemicolectomy");
        let insights = SurgeryInsights::compute(&cases, &records);

        assert_eq!(insights.case_count, 4);
        assert_eq!(insights.demographics.mean_age, Some(69.0));
        assert_eq!(insights.demographics.median_age, Some(68.0));
        assert_eq!(insights.demographics.age_span, Some(AgeSpan { min: 60.0, max: 80.0 }));
        assert_eq!(insights.demographics.male_percent, 75.0);
        assert_eq!(insights.demographics.female_percent, 25.0);
        assert_eq!(insights.demographics.bmi_category, Some(BmiCategory::NormalWeight));

        let asa = insights.demographics.primary_asa.unwrap();
        assert_eq!(asa.key, "2");
        assert_eq!(asa.percentage, 75.0);

        let approach = insights.practice.top_approach.unwrap();
        assert_eq!(approach.key, "Videoscopic");
        assert_eq!(approach.percentage, 100.0);
        assert!(insights.practice.top_iv_access.is_none());
        assert_eq!(insights.practice.mean_duration_minutes, 180.0);
        assert_eq!(insights.practice.mean_ebl_ml, 400.0);

        assert_eq!(insights.outcomes.mean_length_of_stay_days, Some(7.0));
        assert_eq!(insights.outcomes.median_length_of_stay_days, Some(7.0));
        assert_eq!(insights.outcomes.icu_admission_percent, 25.0);
        assert_eq!(insights.outcomes.mean_icu_days, 2.0);
        assert_eq!(insights.outcomes.mortality_rate_percent, 25.0);

        // 全部 7 例平均时长 (4*180 + 3*60)/7 分钟
        let overall_duration = (4.0 * 180.0 + 3.0 * 60.0) / 7.0;
        let expected = (180.0 - overall_duration) / overall_duration * 100.0;
        let duration = insights.comparison.duration_percent.unwrap();
        assert!((duration - expected).abs() < 1e-9);
        assert_eq!(insights.comparison.icu_days_percent, Some(0.0));
    }

    #[test]
    fn test_comparison_without_baseline() {
        let records = vec![surgery_case("Biopsy", 50.0, Sex::Female)];
        let cases = surgery_cases(&records, "Biopsy");
        let insights = SurgeryInsights::compute(&cases, &records);

        assert_eq!(insights.comparison.mortality_percent, None);
        assert_eq!(insights.comparison.ebl_percent, None);
        assert_eq!(insights.outcomes.mean_length_of_stay_days, None);
        assert_eq!(insights.outcomes.median_length_of_stay_days, None);
        assert_eq!(insights.demographics.median_age, Some(50.0));
    }

    #[test]
    fn test_age_group() {
        assert_eq!(age_group(0.0), 0);
        assert_eq!(age_group(9.9), 0);
        assert_eq!(age_group(10.0), 10);
        assert_eq!(age_group(67.0), 60);
    }

    #[test]
    fn test_age_group_breakdown() {
        let mut records = sample();
        records[4].optype = "Colorectal".to_string();

        let mortality = age_group_breakdown(&records, 60, BreakdownMetric::Mortality);
        assert_eq!(mortality[0], CategoryCount { key: "No Mortality".to_string(), count: 2 });
        assert_eq!(mortality[1], CategoryCount { key: "Mortality".to_string(), count: 0 });

        let optype = age_group_breakdown(&records, 20, BreakdownMetric::OperationType);
        assert_eq!(optype, vec![CategoryCount { key: "Colorectal".to_string(), count: 1 }]);

        let anesthesia = age_group_breakdown(&records, 30, BreakdownMetric::AnesthesiaType);
        assert_eq!(anesthesia[0].key, UNKNOWN_CATEGORY);

        assert!(age_group_breakdown(&records, 90, BreakdownMetric::OperationType).is_empty());
        assert_eq!("ane_type".parse::<BreakdownMetric>().unwrap(), BreakdownMetric::AnesthesiaType);
    }
}
