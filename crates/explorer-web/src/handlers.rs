//! HTTP处理器

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use explorer_analytics::{
    data_range, summarize, AsaFilter, BreakdownMetric, CaseRepository, DimensionCriteria,
    DimensionKey, ProfileQuery, ProfileSummary, SexFilter,
};
use explorer_core::{PatientCase, Sex};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// 处理器共享的应用状态
pub type AppState = CaseRepository;

const DEFAULT_AGE_MIN: f64 = 0.0;
const DEFAULT_AGE_MAX: f64 = 100.0;

/// API根路径处理器
pub async fn api_root() -> Json<Value> {
    Json(json!({
        "service": "Surgical Outcomes Explorer API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "profile": "/api/v1/profile",
            "dimensions": "/api/v1/dimensions",
            "dimension_range": "/api/v1/dimensions/:key/range",
            "surgeries": "/api/v1/surgeries",
            "surgery_insights": "/api/v1/surgeries/:name",
            "age_groups": "/api/v1/age-groups/:decade"
        }
    }))
}

/// 健康检查处理器
pub async fn health(State(repo): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "cases": repo.len()
    }))
}

/// 患者画像查询处理器
pub async fn profile(
    State(repo): State<AppState>,
    Query(params): Query<ProfileParams>,
) -> ApiResult<Json<Value>> {
    let query = ProfileQuery::try_from(params)?;
    info!("Profile query for age {}", query.age);

    let outcome = repo.similar_profiles(&query);
    let summary = ProfileSummary::compute(&outcome.cases);

    Ok(Json(json!({
        "query": query,
        "outcome": outcome,
        "summary": summary
    })))
}

/// 维度浏览处理器
pub async fn dimensions(
    State(repo): State<AppState>,
    Query(params): Query<DimensionParams>,
) -> ApiResult<Json<Value>> {
    let x = dimension_or(params.x.as_deref(), DimensionKey::Age)?;
    let y = dimension_or(params.y.as_deref(), DimensionKey::IcuDays)?;
    let color = optional_dimension(params.color.as_deref())?;
    let size = optional_dimension(params.size.as_deref())?;

    let criteria = DimensionCriteria {
        age_min: parse_optional("age_min", params.age_min.as_deref())?.unwrap_or(DEFAULT_AGE_MIN),
        age_max: parse_optional("age_max", params.age_max.as_deref())?.unwrap_or(DEFAULT_AGE_MAX),
        surgery: params.surgery.filter(|name| !name.trim().is_empty()),
    };

    let cases = repo.dimension_cases(&criteria)?;
    info!("Dimension view {} x {} with {} cases", x, y, cases.len());

    Ok(Json(json!({
        "criteria": criteria,
        "summary": summarize(&cases),
        "x": axis(x, &cases),
        "y": axis(y, &cases),
        "color": color.map(|key| axis(key, &cases)),
        "size": size.map(|key| axis(key, &cases)),
        "cases": cases
    })))
}

fn axis(key: DimensionKey, cases: &[&PatientCase]) -> Value {
    json!({
        "key": key,
        "label": key.label(),
        "kind": key.kind(),
        "range": data_range(cases.iter().copied(), key)
    })
}

/// 整个数据集在某维度上的取值范围
pub async fn dimension_range(
    State(repo): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Value>> {
    let key: DimensionKey = key.parse()?;

    Ok(Json(json!({
        "key": key,
        "label": key.label(),
        "range": repo.data_range(key)
    })))
}

/// 手术列表处理器
pub async fn surgeries(State(repo): State<AppState>) -> Json<Value> {
    let options = repo.surgery_options();

    Json(json!({
        "surgeries": options,
        "total": options.len()
    }))
}

/// 单个手术的洞察
pub async fn surgery_insights(
    State(repo): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let insights = repo.surgery_insights(&name)?;

    Ok(Json(json!({
        "surgery": name,
        "insights": insights
    })))
}

/// 年龄段构成处理器
pub async fn age_groups(
    State(repo): State<AppState>,
    Path(decade): Path<String>,
    Query(params): Query<AgeGroupParams>,
) -> ApiResult<Json<Value>> {
    let decade = match parse_optional::<i32>("age group", Some(decade.as_str()))? {
        Some(decade) if decade >= 0 && decade % 10 == 0 => decade,
        _ => {
            return Err(ApiError::validation(format!(
                "Age group must be a non-negative multiple of 10, got {}",
                decade
            )))
        }
    };
    let metric: BreakdownMetric = match params.metric.as_deref().map(str::trim) {
        None | Some("") => BreakdownMetric::Mortality,
        Some(metric) => metric.parse()?,
    };

    Ok(Json(json!({
        "decade": decade,
        "metric": metric,
        "breakdown": repo.age_group_breakdown(decade, metric)
    })))
}

/// 查询参数结构体
///
/// 表单提交的空字段视为未提供，所以数值参数也按字符串接收
#[derive(Debug, Default, Deserialize)]
pub struct ProfileParams {
    pub age: Option<String>,
    pub sex: Option<String>,
    pub asa: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DimensionParams {
    pub age_min: Option<String>,
    pub age_max: Option<String>,
    pub surgery: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgeGroupParams {
    pub metric: Option<String>,
}

/// 解析可选参数，缺省或空白为 `None`
fn parse_optional<T: FromStr>(name: &str, value: Option<&str>) -> ApiResult<Option<T>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::validation(format!("Invalid {}: {}", name, raw))),
    }
}

fn dimension_or(value: Option<&str>, default: DimensionKey) -> ApiResult<DimensionKey> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(id) => Ok(id.parse()?),
    }
}

/// 颜色和大小编码可以选择 `none`
fn optional_dimension(value: Option<&str>) -> ApiResult<Option<DimensionKey>> {
    match value.map(str::trim) {
        None | Some("") | Some("none") => Ok(None),
        Some(id) => Ok(Some(id.parse()?)),
    }
}

impl TryFrom<ProfileParams> for ProfileQuery {
    type Error = ApiError;

    fn try_from(params: ProfileParams) -> ApiResult<Self> {
        let age = parse_optional::<u32>("age", params.age.as_deref())?
            .filter(|age| *age > 0)
            .ok_or_else(|| ApiError::validation("age is required and must be positive"))?;

        let sex = match params.sex.as_deref().map(str::trim) {
            None | Some("") => SexFilter::All,
            Some(value) if value.eq_ignore_ascii_case("all") => SexFilter::All,
            Some(value) => SexFilter::Only(value.parse::<Sex>()?),
        };

        let asa = match params.asa.as_deref().map(str::trim) {
            None | Some("") => AsaFilter::Any,
            Some(value) if value.eq_ignore_ascii_case("any") || value.eq_ignore_ascii_case("all") => {
                AsaFilter::Any
            }
            Some(value) => match value.parse::<u8>() {
                Ok(class @ 1..=5) => AsaFilter::Exact(class),
                _ => return Err(ApiError::validation(format!("Invalid ASA class: {}", value))),
            },
        };

        Ok(ProfileQuery {
            age,
            sex,
            asa,
            height: parse_optional("height", params.height.as_deref())?,
            weight: parse_optional("weight", params.weight.as_deref())?,
        })
    }
}
