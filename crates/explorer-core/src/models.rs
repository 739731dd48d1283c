//! 核心数据模型定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ExplorerError;

/// 原始表格行：列名到字符串值的映射
pub type RawRow = HashMap<String, String>;

/// 一天的秒数
const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// 数据集中使用的编码
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Sex {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Sex::Male),
            "f" | "female" => Ok(Sex::Female),
            other => Err(ExplorerError::Validation(format!("Unknown sex value: {}", other))),
        }
    }
}

/// 手术病例（数据集中的一行，经过类型化和派生字段计算）
///
/// 所有数值字段都保证是有限数；无法解析的值已经被置为 0。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientCase {
    pub age: f64,                 // 年龄（岁）
    pub sex: Option<Sex>,         // 性别
    pub height: f64,              // 身高（cm）
    pub weight: f64,              // 体重（kg）
    pub bmi: f64,                 // 体重指数，未知时为 0
    pub asa: f64,                 // ASA 分级（1-5），未知时为 0
    pub department: String,       // 科室
    pub approach: String,         // 手术入路
    pub opname: String,           // 手术名称
    pub optype: String,           // 手术类型
    pub ane_type: String,         // 麻醉方式
    pub iv1: String,              // 静脉通路
    pub aline1: String,           // 动脉置管
    pub opstart: f64,             // 手术开始（epoch 秒）
    pub opend: f64,               // 手术结束（epoch 秒）
    pub duration: f64,            // 手术时长（分钟）
    pub adm: f64,                 // 入院时间（epoch 秒）
    pub dis: f64,                 // 出院时间（epoch 秒）
    pub death_inhosp: bool,       // 院内死亡
    pub icu_days: f64,            // ICU 天数
    pub intraop_ebl: f64,         // 术中估计失血量（mL）
    pub intraop_crystalloid: f64, // 术中晶体液（mL）
    pub intraop_colloid: f64,     // 术中胶体液（mL）
    pub preop_gluc: f64,          // 术前血糖
}

impl PatientCase {
    /// 住院天数，入院和出院时间有效且出院晚于入院时才有值
    pub fn length_of_stay_days(&self) -> Option<f64> {
        if self.adm > 0.0 && self.dis > self.adm {
            Some((self.dis - self.adm) / SECONDS_PER_DAY)
        } else {
            None
        }
    }

    /// ASA 分级的整数形式，未知时为 `None`
    pub fn asa_class(&self) -> Option<u8> {
        if self.asa >= 1.0 && self.asa <= f64::from(u8::MAX) && self.asa.fract() == 0.0 {
            Some(self.asa as u8)
        } else {
            None
        }
    }

    /// 将病例还原为原始行，便于再次归一化
    pub fn to_row(&self) -> RawRow {
        let numeric = [
            ("age", self.age),
            ("height", self.height),
            ("weight", self.weight),
            ("bmi", self.bmi),
            ("asa", self.asa),
            ("opstart", self.opstart),
            ("opend", self.opend),
            ("duration", self.duration),
            ("adm", self.adm),
            ("dis", self.dis),
            ("icu_days", self.icu_days),
            ("intraop_ebl", self.intraop_ebl),
            ("intraop_crystalloid", self.intraop_crystalloid),
            ("intraop_colloid", self.intraop_colloid),
            ("preop_gluc", self.preop_gluc),
        ];
        let text = [
            ("department", &self.department),
            ("approach", &self.approach),
            ("opname", &self.opname),
            ("optype", &self.optype),
            ("ane_type", &self.ane_type),
            ("iv1", &self.iv1),
            ("aline1", &self.aline1),
        ];

        let mut row: RawRow = numeric
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        row.extend(text.iter().map(|(key, value)| (key.to_string(), value.to_string())));
        row.insert(
            "sex".to_string(),
            self.sex.map(|sex| sex.code().to_string()).unwrap_or_default(),
        );
        row.insert(
            "death_inhosp".to_string(),
            if self.death_inhosp { "1" } else { "0" }.to_string(),
        );
        row
    }
}

impl Default for PatientCase {
    fn default() -> Self {
        Self {
            age: 0.0,
            sex: None,
            height: 0.0,
            weight: 0.0,
            bmi: 0.0,
            asa: 0.0,
            department: "Unknown".to_string(),
            approach: "Unknown".to_string(),
            opname: String::new(),
            optype: String::new(),
            ane_type: String::new(),
            iv1: String::new(),
            aline1: String::new(),
            opstart: 0.0,
            opend: 0.0,
            duration: 0.0,
            adm: 0.0,
            dis: 0.0,
            death_inhosp: false,
            icu_days: 0.0,
            intraop_ebl: 0.0,
            intraop_crystalloid: 0.0,
            intraop_colloid: 0.0,
            preop_gluc: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_parsing() {
        assert_eq!("M".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!(" female ".parse::<Sex>().unwrap(), Sex::Female);
        assert!("x".parse::<Sex>().is_err());
        assert_eq!(serde_json::to_string(&Sex::Female).unwrap(), "\"F\"");
    }

    #[test]
    fn test_length_of_stay() {
        let case = PatientCase {
            adm: 86_400.0,
            dis: 86_400.0 * 4.5,
            ..Default::default()
        };
        assert_eq!(case.length_of_stay_days(), Some(3.5));

        let missing = PatientCase {
            adm: 0.0,
            dis: 86_400.0,
            ..Default::default()
        };
        assert!(missing.length_of_stay_days().is_none());
    }

    #[test]
    fn test_asa_class() {
        let case = PatientCase { asa: 3.0, ..Default::default() };
        assert_eq!(case.asa_class(), Some(3));
        let unknown = PatientCase::default();
        assert_eq!(unknown.asa_class(), None);
    }

    #[test]
    fn test_to_row() {
        let case = PatientCase {
            age: 61.0,
            sex: Some(Sex::Male),
            death_inhosp: true,
            opname: "Lung lobectomy".to_string(),
            ..Default::default()
        };
        let row = case.to_row();
        assert_eq!(row["age"], "61");
        assert_eq!(row["sex"], "M");
        assert_eq!(row["death_inhosp"], "1");
        assert_eq!(row["opname"], "Lung lobectomy");
        assert_eq!(row["department"], "Unknown");
    }
}
