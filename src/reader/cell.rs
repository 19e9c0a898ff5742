// ==========================================
// 门店账本同步引擎 - 单元格宽松转换
// ==========================================
// 账本由人工维护, 单元格类型不可信: 数字列可能是文本,
// 日期列混有原生日期/序列号/旧式 "YYYY.M.D" 文本。
// 所有转换失败取调用方指定的默认值, 不抛错。
// ==========================================

use calamine::Data;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// Excel 序列日期纪元（1900 日期系统, 含 Lotus 闰年 bug 的事实纪元）
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

fn dotted_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})\.(\d{1,2})\.(\d{1,2})").unwrap())
}

/// 单元格 → f64, 失败取 default
pub fn to_f64(value: Option<&Data>, default: f64) -> f64 {
    match value {
        Some(Data::Int(i)) => *i as f64,
        Some(Data::Float(f)) => *f,
        Some(Data::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Data::String(s)) => s.trim().parse::<f64>().unwrap_or(default),
        Some(Data::DateTime(dt)) => dt.as_f64(),
        _ => default,
    }
}

/// 单元格 → i64（经由 f64 截断, "3.0" 也能读成 3）, 失败取 default
pub fn to_i64(value: Option<&Data>, default: i64) -> i64 {
    match value {
        Some(Data::Empty) | None => default,
        v => {
            let f = to_f64(v, f64::NAN);
            if f.is_nan() {
                default
            } else {
                f as i64
            }
        }
    }
}

/// 单元格 → 非空字符串, 空白/空单元格 → None
pub fn to_str(value: Option<&Data>) -> Option<String> {
    let text = match value? {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // 整数值浮点去掉 ".0" 尾巴, 与账本里的手填文本对齐
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) => s.trim().to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Excel 序列号 → 日期（纪元 1899-12-30）
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    epoch.checked_add_signed(Duration::days(serial as i64))
}

/// 单元格 → 日期
///
/// 优先级: 原生日期 → ISO 文本 → 序列号 → 旧式 "YYYY.M.D" 文本。
/// 全部失败返回 None, 不抛错（由编排层决定默认日期）。
pub fn to_date(value: Option<&Data>) -> Option<NaiveDate> {
    match value? {
        Data::DateTime(dt) => serial_to_date(dt.as_f64()),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(|dt| dt.date())
            .ok()
            .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        Data::Int(i) => serial_to_date(*i as f64),
        Data::Float(f) => serial_to_date(*f),
        Data::String(s) => {
            let caps = dotted_date_re().captures(s.trim())?;
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        _ => None,
    }
}

/// 单元格是否为空（缺失或 Empty）
pub fn is_empty(value: Option<&Data>) -> bool {
    matches!(value, None | Some(Data::Empty))
}
