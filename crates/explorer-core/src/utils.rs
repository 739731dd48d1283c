//! 通用工具函数

/// 将原始字符串解析为有限浮点数
///
/// 忽略首尾空白，接受数值前缀（`"72 kg"` 解析为 72）。
/// 无法解析、`NaN` 或无穷大一律返回 0。
pub fn parse_numeric(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let value = trimmed
        .parse::<f64>()
        .ok()
        .or_else(|| numeric_prefix(trimmed).and_then(|prefix| prefix.parse::<f64>().ok()))
        .unwrap_or(0.0);

    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// 截取字符串开头最长的十进制数字部分
fn numeric_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }

    if mantissa_digits == 0 {
        return None;
    }

    // 指数部分必须至少带一位数字
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    Some(&s[..end])
}

/// 根据身高（cm）和体重（kg）计算BMI，两者都为正数时才有结果
pub fn compute_bmi(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if height_cm > 0.0 && weight_kg > 0.0 {
        let height_m = height_cm / 100.0;
        Some(weight_kg / (height_m * height_m))
    } else {
        None
    }
}

/// 判断字符串是否为空或只包含空白
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
