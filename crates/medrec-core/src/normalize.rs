//! 记录归一化模块
//!
//! 接口在不同部署/历史版本里混用camelCase与snake_case两套字段命名，
//! 同一响应里两套可能同时出现。这里把任意形态的原始JSON收敛为唯一的
//! 内存记录形态，并能反向生成接口期望的提交载荷（嵌套findings加上
//! 同步的扁平snake_case副本，供旧消费方使用）。

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use crate::models::{
    CtFindings, Dimensions, Findings, Gender, ImagingRecord, Modality, RecordStatus, Severity,
    VitalSigns, XrayFindings,
};

/// 读取字段：camelCase优先，其次snake_case，null视为缺失
fn pick<'a>(raw: &'a Value, camel: &str, snake: &str) -> Option<&'a Value> {
    match raw.get(camel) {
        Some(value) if !value.is_null() => Some(value),
        _ => match raw.get(snake) {
            Some(value) if !value.is_null() => Some(value),
            _ => None,
        },
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 数值强制转换：接受JSON数字或数字字符串，解析失败一律归零，绝不产生NaN
fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn string_of(raw: &Value, camel: &str, snake: &str) -> String {
    pick(raw, camel, snake)
        .and_then(value_to_string)
        .unwrap_or_default()
}

fn opt_string_of(raw: &Value, camel: &str, snake: &str) -> Option<String> {
    pick(raw, camel, snake).and_then(value_to_string)
}

fn number_of(raw: &Value, camel: &str, snake: &str) -> f64 {
    pick(raw, camel, snake).map(coerce_f64).unwrap_or(0.0)
}

fn uint_of(raw: &Value, camel: &str, snake: &str) -> u32 {
    let n = number_of(raw, camel, snake);
    if n > 0.0 {
        n as u32
    } else {
        0
    }
}

fn list_of(raw: &Value, camel: &str, snake: &str) -> Vec<String> {
    match pick(raw, camel, snake) {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        // 扁平形态下列表偶尔以逗号串出现
        Some(Value::String(s)) => csv_to_list(s),
        _ => Vec::new(),
    }
}

/// 读取所见字段：先查嵌套findings对象（两套命名），再查扁平snake键
fn finding<'a>(raw: &'a Value, camel: &str, snake: &str, flat: &str) -> Option<&'a Value> {
    if let Some(nested) = raw.get("findings").and_then(|f| pick(f, camel, snake)) {
        return Some(nested);
    }
    match raw.get(flat) {
        Some(value) if !value.is_null() => Some(value),
        _ => None,
    }
}

fn finding_string(raw: &Value, camel: &str, snake: &str, flat: &str) -> String {
    finding(raw, camel, snake, flat)
        .and_then(value_to_string)
        .unwrap_or_default()
}

fn finding_number(raw: &Value, camel: &str, snake: &str, flat: &str) -> f64 {
    finding(raw, camel, snake, flat)
        .map(coerce_f64)
        .unwrap_or(0.0)
}

fn finding_list(raw: &Value, camel: &str, snake: &str, flat: &str) -> Vec<String> {
    match finding(raw, camel, snake, flat) {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(Value::String(s)) => csv_to_list(s),
        _ => Vec::new(),
    }
}

/// 病灶尺寸：嵌套findings.dimensions优先，其次扁平dimension_*键
fn dimensions_of(raw: &Value) -> Dimensions {
    let nested = raw.get("findings").and_then(|f| f.get("dimensions"));
    let component = |camel: &str, snake: &str, flat: &str| -> f64 {
        if let Some(dims) = nested {
            if let Some(value) = pick(dims, camel, snake) {
                return coerce_f64(value);
            }
        }
        raw.get(flat).map(coerce_f64).unwrap_or(0.0)
    };
    Dimensions {
        length: component("length", "length", "dimension_length"),
        width: component("width", "width", "dimension_width"),
        thickness: component("thickness", "thickness", "dimension_thickness"),
    }
}

fn ct_findings_of(raw: &Value) -> CtFindings {
    CtFindings {
        kind: finding_string(raw, "type", "type", "findings_type"),
        location: finding_string(raw, "location", "location", "location"),
        dimensions: dimensions_of(raw),
        midline_shift: finding_number(raw, "midlineShift", "midline_shift", "midline_shift"),
        mass_effect: finding_string(raw, "massEffect", "mass_effect", "mass_effect"),
        fracture: finding_string(raw, "fracture", "fracture", "fracture"),
        complications: finding_list(raw, "complications", "complications", "complications"),
    }
}

fn xray_findings_of(raw: &Value) -> XrayFindings {
    XrayFindings {
        kind: finding_string(raw, "type", "type", "findings_type"),
        affected_areas: finding_list(raw, "affectedAreas", "affected_areas", "affected_areas"),
        opacity: finding_string(raw, "opacity", "opacity", "opacity"),
        additional_findings: finding_string(
            raw,
            "additionalFindings",
            "additional_findings",
            "additional_findings",
        ),
        complications: finding_list(raw, "complications", "complications", "complications"),
    }
}

/// 生命体征：嵌套vitalSigns对象优先，其次记录层级的扁平键
fn vital_signs_of(raw: &Value) -> VitalSigns {
    let nested = pick(raw, "vitalSigns", "vital_signs");
    let component = |camel: &str, snake: &str| -> f64 {
        if let Some(vitals) = nested {
            if let Some(value) = pick(vitals, camel, snake) {
                return coerce_f64(value);
            }
        }
        raw.get(snake).map(coerce_f64).unwrap_or(0.0)
    };
    let respiratory = component("respiratoryRate", "respiratory_rate");
    VitalSigns {
        temperature: component("temperature", "temperature"),
        o2_saturation: component("o2Saturation", "o2_saturation"),
        respiratory_rate: if respiratory > 0.0 {
            respiratory as u32
        } else {
            0
        },
    }
}

/// 解析检查日期，同时接受HTML datetime-local形态与服务端存储的空格分隔形态
pub fn parse_scan_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// 提交载荷统一使用服务端存储的空格分隔形态
pub fn format_scan_date(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 把任意形态的原始记录JSON归一化为内存记录
///
/// 纯函数：不做I/O，不修改`raw`。
pub fn normalize(raw: &Value, modality: Modality) -> ImagingRecord {
    let findings = match modality {
        Modality::Ct => Findings::Ct(ct_findings_of(raw)),
        Modality::Xray => Findings::Xray(xray_findings_of(raw)),
    };
    ImagingRecord {
        id: string_of(raw, "id", "id"),
        patient_name: string_of(raw, "patientName", "patient_name"),
        patient_id: string_of(raw, "patientId", "patient_id"),
        age: uint_of(raw, "age", "age"),
        gender: Gender::from_wire(&string_of(raw, "gender", "gender")),
        procedure: string_of(raw, "procedure", "procedure"),
        scan_date: opt_string_of(raw, "scanDate", "scan_date")
            .as_deref()
            .and_then(parse_scan_date),
        status: RecordStatus::from_wire(&string_of(raw, "status", "status")),
        severity: Severity::from_wire(&string_of(raw, "severity", "severity")),
        clinical_history: string_of(raw, "clinicalHistory", "clinical_history"),
        impression: string_of(raw, "impression", "impression"),
        recommendations: list_of(raw, "recommendations", "recommendations"),
        image_url: opt_string_of(raw, "imageUrl", "image_url"),
        vital_signs: match modality {
            Modality::Xray => Some(vital_signs_of(raw)),
            Modality::Ct => None,
        },
        findings,
    }
}

/// 反归一化：生成接口期望的提交载荷
///
/// 嵌套findings是接口的权威形态，扁平snake_case副本与其同步写出。
pub fn denormalize(record: &ImagingRecord) -> Value {
    let scan_date = record
        .scan_date
        .as_ref()
        .map(format_scan_date)
        .unwrap_or_default();
    let image_url = record.image_url.clone().unwrap_or_default();
    let gender = record.gender.map(|g| g.as_str()).unwrap_or("");

    let mut payload = json!({
        "patientName": record.patient_name,
        "patient_name": record.patient_name,
        "patientId": record.patient_id,
        "patient_id": record.patient_id,
        "age": record.age,
        "gender": gender,
        "procedure": record.procedure,
        "scanDate": scan_date,
        "scan_date": scan_date,
        "status": record.status.as_str(),
        "severity": record.severity.as_str(),
        "imageUrl": image_url,
        "image_url": image_url,
        "clinicalHistory": record.clinical_history,
        "clinical_history": record.clinical_history,
        "impression": record.impression,
        "recommendations": record.recommendations,
    });
    if !record.id.is_empty() {
        payload["id"] = json!(record.id);
    }

    match &record.findings {
        Findings::Ct(f) => {
            payload["findings"] = json!({
                "type": f.kind,
                "location": f.location,
                "dimensions": {
                    "length": f.dimensions.length,
                    "width": f.dimensions.width,
                    "thickness": f.dimensions.thickness,
                },
                "midlineShift": f.midline_shift,
                "massEffect": f.mass_effect,
                "fracture": f.fracture,
                "complications": f.complications,
            });
            payload["findings_type"] = json!(f.kind);
            payload["location"] = json!(f.location);
            payload["dimension_length"] = json!(f.dimensions.length);
            payload["dimension_width"] = json!(f.dimensions.width);
            payload["dimension_thickness"] = json!(f.dimensions.thickness);
            payload["midline_shift"] = json!(f.midline_shift);
            payload["mass_effect"] = json!(f.mass_effect);
            payload["fracture"] = json!(f.fracture);
            payload["complications"] = json!(f.complications);
        }
        Findings::Xray(f) => {
            payload["findings"] = json!({
                "type": f.kind,
                "affectedAreas": f.affected_areas,
                "opacity": f.opacity,
                "additionalFindings": f.additional_findings,
                "complications": f.complications,
            });
            payload["findings_type"] = json!(f.kind);
            payload["affected_areas"] = json!(f.affected_areas);
            payload["opacity"] = json!(f.opacity);
            payload["additional_findings"] = json!(f.additional_findings);
            payload["complications"] = json!(f.complications);
        }
    }

    if let Some(vitals) = &record.vital_signs {
        payload["vitalSigns"] = json!({
            "temperature": vitals.temperature,
            "o2Saturation": vitals.o2_saturation,
            "respiratoryRate": vitals.respiratory_rate,
        });
        payload["temperature"] = json!(vitals.temperature);
        payload["o2_saturation"] = json!(vitals.o2_saturation);
        payload["respiratory_rate"] = json!(vitals.respiratory_rate);
    }

    payload
}

/// 编辑表单的建议列表按行拼接展示
pub fn list_to_lines(items: &[String]) -> String {
    items.join("\n")
}

/// 提交前按行拆分并丢弃空白行
pub fn lines_to_list(text: &str) -> Vec<String> {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// 受累区域按逗号拼接展示
pub fn list_to_csv(items: &[String]) -> String {
    items.join(", ")
}

/// 提交前按逗号拆分、去空白
pub fn csv_to_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}
