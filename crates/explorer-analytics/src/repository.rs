//! 病例仓库
//!
//! 启动时加载一次、之后只读的病例集合，统一提供各视图的查询入口

use explorer_core::{ExplorerError, PatientCase, RawRow, Result};
use std::sync::Arc;

use crate::dimensions::{data_range, filter_by_dimensions, DataRange, DimensionCriteria, DimensionKey};
use crate::insights::{
    age_group_breakdown, surgery_cases, surgery_options, BreakdownMetric, SurgeryInsights,
    MIN_SURGERY_CASES,
};
use crate::matcher::{MatchOutcome, MatcherConfig, ProfileMatcher, ProfileQuery};
use crate::normalizer::normalize;
use crate::stats::CategoryCount;

/// 病例仓库
///
/// 内部数据用 `Arc` 共享，克隆开销很小，可直接注入到各个使用方
#[derive(Debug, Clone)]
pub struct CaseRepository {
    cases: Arc<[PatientCase]>,
    matcher: ProfileMatcher,
}

impl CaseRepository {
    /// 由已归一化的病例创建仓库
    pub fn new(cases: Vec<PatientCase>, matcher_config: MatcherConfig) -> Result<Self> {
        let matcher = ProfileMatcher::new(matcher_config)?;
        tracing::info!("Case repository ready with {} cases", cases.len());

        Ok(Self {
            cases: cases.into(),
            matcher,
        })
    }

    /// 由原始行创建仓库
    pub fn from_raw_rows(rows: &[RawRow], matcher_config: MatcherConfig) -> Result<Self> {
        Self::new(normalize(rows), matcher_config)
    }

    /// 全部病例
    pub fn cases(&self) -> &[PatientCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// 查找相似画像的病例
    pub fn similar_profiles(&self, query: &ProfileQuery) -> MatchOutcome<'_> {
        self.matcher.find_similar(&self.cases, query)
    }

    /// 维度浏览视图的病例
    pub fn dimension_cases(&self, criteria: &DimensionCriteria) -> Result<Vec<&PatientCase>> {
        filter_by_dimensions(&self.cases, criteria)
    }

    /// 全部病例在某维度上的取值范围
    pub fn data_range(&self, key: DimensionKey) -> DataRange {
        data_range(self.cases.iter(), key)
    }

    /// 所有手术及其病例数
    pub fn surgery_options(&self) -> Vec<CategoryCount> {
        surgery_options(&self.cases)
    }

    /// 某手术的洞察
    ///
    /// 没有匹配病例时返回 `NotFound`，病例少于 [`MIN_SURGERY_CASES`] 时返回 `InsufficientData`
    pub fn surgery_insights(&self, name: &str) -> Result<SurgeryInsights> {
        let cases = surgery_cases(&self.cases, name);
        if cases.is_empty() {
            return Err(ExplorerError::NotFound(format!("No cases recorded for surgery {}", name)));
        }
        if cases.len() < MIN_SURGERY_CASES {
            tracing::debug!("Surgery {} has only {} cases", name, cases.len());
            return Err(ExplorerError::InsufficientData {
                found: cases.len(),
                required: MIN_SURGERY_CASES,
            });
        }
        Ok(SurgeryInsights::compute(&cases, &self.cases))
    }

    /// 年龄段构成
    pub fn age_group_breakdown(&self, decade: i32, metric: BreakdownMetric) -> Vec<CategoryCount> {
        age_group_breakdown(&self.cases, decade, metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::ToleranceTier;

    fn raw(age: &str, asa: &str, opname: &str) -> RawRow {
        [("age", age), ("asa", asa), ("opname", opname), ("sex", "M")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn repository() -> CaseRepository {
        let mut rows = vec![
            raw("45", "2", "Thyroidectomy"),
            raw("47", "1", "Thyroidectomy"),
            raw("49", "0", "Mastectomy"),
            raw("", "3", "Mastectomy"),
        ];
        for age in ["70", "72", "74", "76", "78"] {
            rows.push(raw(age, "3", "Colectomy"));
        }
        CaseRepository::from_raw_rows(&rows, MatcherConfig::default()).unwrap()
    }

    #[test]
    fn test_repository_queries() {
        let repo = repository();
        assert_eq!(repo.len(), 9);
        assert!(!repo.is_empty());

        let similar = repo.similar_profiles(&ProfileQuery::by_age(46));
        assert_eq!(similar.len(), 3);

        let dims = repo
            .dimension_cases(&DimensionCriteria::age_range(40.0, 50.0))
            .unwrap();
        assert_eq!(dims.len(), 2);

        assert_eq!(
            repo.data_range(DimensionKey::Age),
            DataRange::Numeric { min: Some(0.0), max: Some(78.0) }
        );
        assert_eq!(repo.surgery_options()[0].key, "Colectomy");
        assert_eq!(repo.surgery_options()[0].count, 5);
    }

    #[test]
    fn test_surgery_insights_require_minimum_cases() {
        let repo = repository();
        assert_eq!(repo.surgery_insights("Colectomy").unwrap().case_count, 5);
        assert!(matches!(
            repo.surgery_insights("Thyroidectomy"),
            Err(ExplorerError::InsufficientData { found: 2, required: 5 })
        ));
        assert!(matches!(
            repo.surgery_insights("Whipple"),
            Err(ExplorerError::NotFound(_))
        ));
    }

    #[test]
    fn test_clones_share_cases() {
        let repo = repository();
        let clone = repo.clone();
        assert!(std::ptr::eq(repo.cases().as_ptr(), clone.cases().as_ptr()));
    }

    #[test]
    fn test_invalid_matcher_config_rejected() {
        let config = MatcherConfig {
            min_sample_size: 10,
            tiers: vec![ToleranceTier::new(1.0, f64::NAN, 1.0, 1.0)],
        };
        assert!(CaseRepository::new(Vec::new(), config).is_err());
    }
}
