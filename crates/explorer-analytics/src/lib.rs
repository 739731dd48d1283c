//! # 手术结局分析模块
//!
//! 提供患者画像和维度浏览视图背后的计算，包括：
//! - 病例归一化：把原始表格行转换为类型化病例并计算派生字段
//! - 相似病例匹配：按容差层级逐步放宽，直到样本量足够
//! - 维度筛选：年龄区间、手术名称筛选与坐标轴取值范围
//! - 统计汇总：均值、比率、分类计数
//! - 手术洞察：单个手术的人口学、诊疗和结局指标

pub mod dimensions;
pub mod insights;
pub mod matcher;
pub mod normalizer;
pub mod repository;
pub mod stats;

// 重新导出主要类型
pub use dimensions::{
    data_range, filter_by_dimensions, DataRange, DimensionCriteria, DimensionKey, DimensionKind,
};
pub use insights::{age_group, BreakdownMetric, SurgeryInsights, MIN_SURGERY_CASES};
pub use matcher::{
    find_similar, AsaFilter, BodyConstraint, MatchConfidence, MatchOutcome, MatcherConfig,
    ProfileMatcher, ProfileQuery, SexFilter, ToleranceTier,
};
pub use normalizer::{normalize, normalize_row};
pub use repository::CaseRepository;
pub use stats::{median, rollup_by_category, summarize, CategoryCount, CategoryShare, ProfileSummary, Summary};
