//! 相似病例匹配
//!
//! 按容差层级逐步放宽匹配条件，直到样本量足够或容差用尽

use explorer_core::utils::compute_bmi;
use explorer_core::{ExplorerError, PatientCase, Result, Sex};
use serde::{Deserialize, Serialize};

/// 默认最小样本量
pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 10;

/// 性别筛选
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SexFilter {
    All,
    Only(Sex),
}

impl SexFilter {
    fn accepts(&self, sex: Option<Sex>) -> bool {
        match self {
            SexFilter::All => true,
            SexFilter::Only(wanted) => sex == Some(*wanted),
        }
    }
}

/// ASA 筛选：分类变量，要求时必须精确匹配
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AsaFilter {
    Any,
    Exact(u8),
}

impl AsaFilter {
    fn accepts(&self, asa: f64) -> bool {
        match self {
            AsaFilter::Any => true,
            AsaFilter::Exact(class) => asa == f64::from(*class),
        }
    }
}

/// 目标患者画像
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileQuery {
    pub age: u32,
    pub sex: SexFilter,
    pub asa: AsaFilter,
    pub height: Option<f64>, // cm
    pub weight: Option<f64>, // kg
}

impl ProfileQuery {
    /// 只按年龄匹配的画像
    pub fn by_age(age: u32) -> Self {
        Self {
            age,
            sex: SexFilter::All,
            asa: AsaFilter::Any,
            height: None,
            weight: None,
        }
    }

    /// 根据身高体重是否提供，确定本次使用的体型约束
    pub fn body_constraint(&self) -> BodyConstraint {
        let height = self.height.filter(|h| *h > 0.0);
        let weight = self.weight.filter(|w| *w > 0.0);

        match (height, weight) {
            (Some(h), Some(w)) => compute_bmi(h, w)
                .map(BodyConstraint::Bmi)
                .unwrap_or(BodyConstraint::None),
            (Some(h), None) => BodyConstraint::Height(h),
            (None, Some(w)) => BodyConstraint::Weight(w),
            (None, None) => BodyConstraint::None,
        }
    }
}

/// 体型约束，每次调用只有一种生效
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyConstraint {
    None,
    Height(f64),
    Weight(f64),
    Bmi(f64),
}

impl BodyConstraint {
    fn accepts(&self, case: &PatientCase, tier: &ToleranceTier) -> bool {
        match *self {
            BodyConstraint::None => true,
            BodyConstraint::Height(target) => within(case.height, target, tier.height),
            BodyConstraint::Weight(target) => within(case.weight, target, tier.weight),
            BodyConstraint::Bmi(target) => within(case.bmi, target, tier.bmi),
        }
    }
}

/// 值为正数且落在 `target ± tolerance` 闭区间内
fn within(value: f64, target: f64, tolerance: f64) -> bool {
    value > 0.0 && value >= target - tolerance && value <= target + tolerance
}

/// 容差层级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ToleranceTier {
    pub age: f64,    // 年龄容差（岁）
    pub bmi: f64,    // BMI容差
    pub height: f64, // 身高容差（cm）
    pub weight: f64, // 体重容差（kg）
}

impl ToleranceTier {
    pub const fn new(age: f64, bmi: f64, height: f64, weight: f64) -> Self {
        Self { age, bmi, height, weight }
    }
}

/// 默认容差层级，从严到宽
pub const DEFAULT_TIERS: [ToleranceTier; 6] = [
    ToleranceTier::new(2.0, 5.0, 5.0, 5.0),
    ToleranceTier::new(5.0, 8.0, 10.0, 10.0),
    ToleranceTier::new(8.0, 10.0, 15.0, 15.0),
    ToleranceTier::new(10.0, 15.0, 20.0, 20.0),
    ToleranceTier::new(10.0, 20.0, 25.0, 25.0),
    ToleranceTier::new(10.0, 25.0, 30.0, 30.0),
];

/// 匹配器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatcherConfig {
    /// 提前结束所需的最小样本量
    pub min_sample_size: usize,
    /// 容差层级，从严到宽
    pub tiers: Vec<ToleranceTier>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            tiers: DEFAULT_TIERS.to_vec(),
        }
    }
}

impl MatcherConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.min_sample_size == 0 {
            return Err(ExplorerError::Validation(
                "min_sample_size must be greater than zero".to_string(),
            ));
        }
        if self.tiers.is_empty() {
            return Err(ExplorerError::Validation(
                "at least one tolerance tier is required".to_string(),
            ));
        }
        for (index, tier) in self.tiers.iter().enumerate() {
            let widths = [tier.age, tier.bmi, tier.height, tier.weight];
            if widths.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(ExplorerError::Validation(format!(
                    "tolerance tier {} has a negative or non-finite width",
                    index
                )));
            }
        }
        Ok(())
    }
}

/// 匹配样本量对应的可信度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// 没有任何匹配
    NoMatches,
    /// 少于最小样本量
    Insufficient,
    /// 达到最小样本量但不足其两倍
    Low,
    Normal,
}

impl MatchConfidence {
    pub fn assess(count: usize, min_sample_size: usize) -> Self {
        if count == 0 {
            MatchConfidence::NoMatches
        } else if count < min_sample_size {
            MatchConfidence::Insufficient
        } else if count < min_sample_size.saturating_mul(2) {
            MatchConfidence::Low
        } else {
            MatchConfidence::Normal
        }
    }
}

/// 匹配结果
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome<'a> {
    /// 选中的病例
    pub cases: Vec<&'a PatientCase>,
    /// 选中结果所在的层级索引，没有任何匹配时为 `None`
    pub tier: Option<usize>,
    /// 每个已尝试层级的匹配数量
    pub tier_counts: Vec<usize>,
    /// 样本量是否达到最小要求
    pub sufficient: bool,
    pub confidence: MatchConfidence,
}

impl<'a> MatchOutcome<'a> {
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// 相似病例匹配器
#[derive(Debug, Clone, Default)]
pub struct ProfileMatcher {
    config: MatcherConfig,
}

impl ProfileMatcher {
    /// 创建新的匹配器
    pub fn new(config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 查找相似病例
    ///
    /// 任何层级达到最小样本量即返回该层级结果；否则返回匹配数最多的层级
    /// （数量相同取更严格的层级）；全部为零时返回空结果，绝不退回全量数据。
    pub fn find_similar<'a>(
        &self,
        records: &'a [PatientCase],
        query: &ProfileQuery,
    ) -> MatchOutcome<'a> {
        let body = query.body_constraint();
        let target_age = f64::from(query.age);
        let mut tier_counts = Vec::with_capacity(self.config.tiers.len());
        let mut best: Option<(usize, Vec<&'a PatientCase>)> = None;

        for (index, tier) in self.config.tiers.iter().enumerate() {
            let matched: Vec<&PatientCase> = records
                .iter()
                .filter(|case| Self::matches(case, query, &body, target_age, tier))
                .collect();

            tracing::debug!("Tolerance tier {} matched {} cases", index, matched.len());
            tier_counts.push(matched.len());

            if matched.len() >= self.config.min_sample_size {
                let confidence = self.confidence(matched.len());
                return MatchOutcome {
                    cases: matched,
                    tier: Some(index),
                    tier_counts,
                    sufficient: true,
                    confidence,
                };
            }

            let better = match &best {
                Some((_, current)) => matched.len() > current.len(),
                None => !matched.is_empty(),
            };
            if better {
                best = Some((index, matched));
            }
        }

        tracing::warn!(
            "No tolerance tier reached {} cases for age {}",
            self.config.min_sample_size,
            query.age
        );

        match best {
            Some((index, cases)) => MatchOutcome {
                confidence: self.confidence(cases.len()),
                cases,
                tier: Some(index),
                tier_counts,
                sufficient: false,
            },
            None => MatchOutcome {
                cases: Vec::new(),
                tier: None,
                tier_counts,
                sufficient: false,
                confidence: MatchConfidence::NoMatches,
            },
        }
    }

    fn confidence(&self, count: usize) -> MatchConfidence {
        MatchConfidence::assess(count, self.config.min_sample_size)
    }

    fn matches(
        case: &PatientCase,
        query: &ProfileQuery,
        body: &BodyConstraint,
        target_age: f64,
        tier: &ToleranceTier,
    ) -> bool {
        // 没有年龄的病例在任何层级都不参与匹配
        if case.age <= 0.0 {
            return false;
        }
        if case.age < target_age - tier.age || case.age > target_age + tier.age {
            return false;
        }
        query.sex.accepts(case.sex) && query.asa.accepts(case.asa) && body.accepts(case, tier)
    }
}

/// 使用默认配置查找相似病例
pub fn find_similar<'a>(records: &'a [PatientCase], query: &ProfileQuery) -> Vec<&'a PatientCase> {
    ProfileMatcher::default().find_similar(records, query).cases
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn case(age: f64) -> PatientCase {
        PatientCase {
            age,
            ..Default::default()
        }
    }

    fn ages(cases: &[&PatientCase]) -> Vec<f64> {
        cases.iter().map(|c| c.age).collect()
    }

    #[test]
    fn test_sparse_dataset_returns_largest_tier() {
        let records: Vec<PatientCase> = [20.0, 22.0, 24.0, 60.0, 61.0].iter().map(|a| case(*a)).collect();
        let outcome = ProfileMatcher::default().find_similar(&records, &ProfileQuery::by_age(21));

        // ±2 -> {20,22}，±5 起 -> {20,22,24}
        assert_eq!(outcome.tier_counts, vec![2, 3, 3, 3, 3, 3]);
        assert_eq!(outcome.tier, Some(1));
        assert_eq!(ages(&outcome.cases), vec![20.0, 22.0, 24.0]);
        assert!(!outcome.sufficient);
        assert_eq!(outcome.confidence, MatchConfidence::Insufficient);
    }

    #[test]
    fn test_largest_tier_when_only_tight_window_matches() {
        let records: Vec<PatientCase> = [20.0, 22.0, 60.0, 61.0].iter().map(|a| case(*a)).collect();
        let outcome = ProfileMatcher::default().find_similar(&records, &ProfileQuery::by_age(21));

        assert_eq!(outcome.tier, Some(0));
        assert_eq!(ages(&outcome.cases), vec![20.0, 22.0]);
    }

    #[test]
    fn test_early_exit_on_bmi_tier() {
        // 12 例 BMI≈24.2 且年龄在 30±2 内，外加更宽层级才会命中的病例
        let mut records: Vec<PatientCase> = (0..12)
            .map(|i| PatientCase {
                age: 28.0 + f64::from(i % 5),
                height: 170.0,
                weight: 70.0,
                bmi: 24.2,
                ..Default::default()
            })
            .collect();
        records.push(PatientCase {
            age: 35.0,
            bmi: 24.0,
            ..Default::default()
        });

        let query = ProfileQuery {
            age: 30,
            sex: SexFilter::All,
            asa: AsaFilter::Any,
            height: Some(170.0),
            weight: Some(70.0),
        };
        assert!(matches!(query.body_constraint(), BodyConstraint::Bmi(_)));

        let outcome = ProfileMatcher::default().find_similar(&records, &query);
        assert_eq!(outcome.tier, Some(0));
        assert_eq!(outcome.tier_counts, vec![12]);
        assert_eq!(outcome.len(), 12);
        assert!(outcome.sufficient);
        assert_eq!(outcome.confidence, MatchConfidence::Low);
    }

    #[test]
    fn test_no_age_returns_empty() {
        let records = vec![case(0.0); 20];
        let outcome = ProfileMatcher::default().find_similar(&records, &ProfileQuery::by_age(0));

        assert!(outcome.is_empty());
        assert_eq!(outcome.tier, None);
        assert_eq!(outcome.confidence, MatchConfidence::NoMatches);
        assert!(find_similar(&records, &ProfileQuery::by_age(40)).is_empty());
    }

    #[test]
    fn test_exact_asa_and_sex() {
        let mut records = Vec::new();
        for i in 0..30 {
            records.push(PatientCase {
                age: 50.0,
                asa: f64::from(i % 3 + 1),
                sex: Some(if i % 2 == 0 { Sex::Male } else { Sex::Female }),
                ..Default::default()
            });
        }
        let query = ProfileQuery {
            age: 50,
            sex: SexFilter::Only(Sex::Female),
            asa: AsaFilter::Exact(2),
            height: None,
            weight: None,
        };
        let outcome = ProfileMatcher::default().find_similar(&records, &query);

        assert!(!outcome.is_empty());
        assert!(outcome.cases.iter().all(|c| c.asa == 2.0 && c.sex == Some(Sex::Female)));
    }

    #[test]
    fn test_height_only_constraint() {
        let records = vec![
            PatientCase { age: 40.0, height: 172.0, ..Default::default() },
            PatientCase { age: 40.0, height: 190.0, ..Default::default() },
            PatientCase { age: 40.0, height: 0.0, ..Default::default() },
        ];
        let query = ProfileQuery {
            height: Some(170.0),
            ..ProfileQuery::by_age(40)
        };
        assert_eq!(query.body_constraint(), BodyConstraint::Height(170.0));

        let outcome = ProfileMatcher::default().find_similar(&records, &query);
        // 第一层 ±5cm 命中 1 例；±20cm 起也命中 190cm，身高缺失者始终排除
        assert_eq!(outcome.tier_counts, vec![1, 1, 1, 2, 2, 2]);
        assert_eq!(outcome.len(), 2);
        assert!(outcome.cases.iter().all(|c| c.height > 0.0));
    }

    #[test]
    fn test_weight_only_constraint() {
        let query = ProfileQuery {
            weight: Some(80.0),
            height: Some(0.0),
            ..ProfileQuery::by_age(40)
        };
        assert_eq!(query.body_constraint(), BodyConstraint::Weight(80.0));

        let records = vec![
            PatientCase { age: 40.0, weight: 83.0, ..Default::default() },
            PatientCase { age: 41.0, weight: 92.0, ..Default::default() },
            PatientCase { age: 40.0, weight: 0.0, ..Default::default() },
        ];
        let outcome = ProfileMatcher::default().find_similar(&records, &query);
        // ±5/±10kg 只命中 83kg，±15kg 起也命中 92kg；体重缺失者始终排除
        assert_eq!(outcome.tier_counts, vec![1, 1, 2, 2, 2, 2]);
        assert_eq!(outcome.tier, Some(2));
        assert!(outcome.cases.iter().all(|c| c.weight > 0.0));
    }

    #[test]
    fn test_bmi_constraint_skips_missing_bmi() {
        let records = vec![
            PatientCase { age: 40.0, bmi: 26.0, ..Default::default() },
            PatientCase { age: 40.0, bmi: 0.0, ..Default::default() },
        ];
        let query = ProfileQuery {
            height: Some(170.0),
            weight: Some(70.0),
            ..ProfileQuery::by_age(40)
        };

        let outcome = ProfileMatcher::default().find_similar(&records, &query);
        // 最宽层级 ±25 的下界为负，BMI 为 0 的病例仍不参与
        assert_eq!(outcome.tier_counts, vec![1; 6]);
        assert_eq!(outcome.tier, Some(0));
        assert_eq!(outcome.cases[0].bmi, 26.0);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(MatchConfidence::assess(0, 10), MatchConfidence::NoMatches);
        assert_eq!(MatchConfidence::assess(9, 10), MatchConfidence::Insufficient);
        assert_eq!(MatchConfidence::assess(10, 10), MatchConfidence::Low);
        assert_eq!(MatchConfidence::assess(19, 10), MatchConfidence::Low);
        assert_eq!(MatchConfidence::assess(20, 10), MatchConfidence::Normal);
    }

    #[test]
    fn test_invalid_config() {
        let empty = MatcherConfig { min_sample_size: 10, tiers: Vec::new() };
        assert!(ProfileMatcher::new(empty).is_err());

        let zero = MatcherConfig { min_sample_size: 0, ..Default::default() };
        assert!(zero.validate().is_err());

        let negative = MatcherConfig {
            min_sample_size: 5,
            tiers: vec![ToleranceTier::new(-1.0, 1.0, 1.0, 1.0)],
        };
        assert!(negative.validate().is_err());
    }

    fn records_strategy() -> impl Strategy<Value = Vec<PatientCase>> {
        proptest::collection::vec((0u32..100, 0u8..6, 0.0f64..45.0), 0..60).prop_map(|rows| {
            rows.into_iter()
                .map(|(age, asa, bmi)| PatientCase {
                    age: f64::from(age),
                    asa: f64::from(asa),
                    bmi,
                    ..Default::default()
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_default_tiers_never_shrink(records in records_strategy(), age in 1u32..100, asa in 1u8..6) {
            // 所有层级都跑完：把最小样本量设为无法达到的值
            let matcher = ProfileMatcher::new(MatcherConfig {
                min_sample_size: usize::MAX,
                tiers: DEFAULT_TIERS.to_vec(),
            }).unwrap();
            let query = ProfileQuery {
                asa: AsaFilter::Exact(asa),
                height: Some(170.0),
                weight: Some(70.0),
                ..ProfileQuery::by_age(age)
            };
            let outcome = matcher.find_similar(&records, &query);
            prop_assert_eq!(outcome.tier_counts.len(), DEFAULT_TIERS.len());
            for pair in outcome.tier_counts.windows(2) {
                prop_assert!(pair[1] >= pair[0]);
            }
        }

        #[test]
        fn prop_exact_asa_everywhere(records in records_strategy(), age in 1u32..100, asa in 1u8..6) {
            let query = ProfileQuery {
                asa: AsaFilter::Exact(asa),
                ..ProfileQuery::by_age(age)
            };
            let outcome = ProfileMatcher::default().find_similar(&records, &query);
            prop_assert!(outcome.cases.iter().all(|c| c.asa == f64::from(asa)));
            prop_assert!(outcome.cases.iter().all(|c| c.age > 0.0));
        }

        #[test]
        fn prop_early_exit_on_first_tier(records in records_strategy(), age in 1u32..100) {
            let query = ProfileQuery::by_age(age);
            let first_tier = records
                .iter()
                .filter(|c| c.age > 0.0 && (c.age - f64::from(age)).abs() <= DEFAULT_TIERS[0].age)
                .count();
            let outcome = ProfileMatcher::default().find_similar(&records, &query);
            if first_tier >= DEFAULT_MIN_SAMPLE_SIZE {
                prop_assert_eq!(outcome.tier, Some(0));
                prop_assert_eq!(outcome.len(), first_tier);
            }
        }
    }
}
