//! 病例归一化
//!
//! 将未类型化的原始行转换为 `PatientCase`，并计算派生字段

use explorer_core::utils::{compute_bmi, is_blank, parse_numeric};
use explorer_core::{PatientCase, RawRow};

/// 分类字段缺失时使用的占位值
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// 归一化一组原始行
pub fn normalize(rows: &[RawRow]) -> Vec<PatientCase> {
    let cases: Vec<PatientCase> = rows.iter().map(normalize_row).collect();
    tracing::debug!("Normalized {} raw rows", cases.len());
    cases
}

/// 归一化单行
pub fn normalize_row(row: &RawRow) -> PatientCase {
    let number = |field: &str| row.get(field).map(|raw| parse_numeric(raw)).unwrap_or(0.0);
    let text = |field: &str| row.get(field).map(|raw| raw.trim().to_string()).unwrap_or_default();

    let age = number("age");
    let height = number("height");
    let weight = number("weight");
    let opstart = number("opstart");
    let opend = number("opend");

    // 已有正数BMI时保留，否则由身高体重推导
    let mut bmi = number("bmi");
    if bmi <= 0.0 {
        bmi = compute_bmi(height, weight).unwrap_or(0.0);
    }

    let duration = if opstart > 0.0 && opend > 0.0 {
        (opend - opstart) / 60.0
    } else {
        0.0
    };

    PatientCase {
        age,
        sex: row.get("sex").and_then(|raw| raw.parse().ok()),
        height,
        weight,
        bmi,
        asa: number("asa"),
        department: category_or_unknown(row.get("department")),
        approach: category_or_unknown(row.get("approach")),
        opname: text("opname"),
        optype: text("optype"),
        ane_type: text("ane_type"),
        iv1: text("iv1"),
        aline1: text("aline1"),
        opstart,
        opend,
        duration,
        adm: number("adm"),
        dis: number("dis"),
        death_inhosp: number("death_inhosp") == 1.0,
        icu_days: number("icu_days"),
        intraop_ebl: number("intraop_ebl"),
        intraop_crystalloid: number("intraop_crystalloid"),
        intraop_colloid: number("intraop_colloid"),
        preop_gluc: number("preop_gluc"),
    }
}

fn category_or_unknown(raw: Option<&String>) -> String {
    match raw {
        Some(value) if !is_blank(value) => value.trim().to_string(),
        _ => UNKNOWN_CATEGORY.to_string(),
    }
}
