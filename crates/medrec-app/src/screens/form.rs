//! 记录表单状态
//!
//! 编辑与新建屏幕共用的本地表单：全部字段以文本形态持有，与输入
//! 控件一一对应，提交时再做数值解析（解析失败一律归零）。

use medrec_core::normalize::{csv_to_list, lines_to_list, list_to_csv, list_to_lines};
use medrec_core::{
    CtFindings, Dimensions, Findings, Gender, ImagingRecord, Modality, RecordStatus, Severity,
    VitalSigns, XrayFindings,
};

/// 数值输入框的展示文本：0与缺失一样显示为空
fn number_text(value: f64) -> String {
    if value == 0.0 {
        String::new()
    } else {
        value.to_string()
    }
}

fn parse_f64_or_zero(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

fn parse_u32_or_zero(text: &str) -> u32 {
    let n = parse_f64_or_zero(text);
    if n > 0.0 {
        n as u32
    } else {
        0
    }
}

/// 记录表单
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordForm {
    pub patient_name: String,
    pub patient_id: String,
    pub age: String,
    pub gender: String,
    pub procedure: String,
    pub scan_date: String,
    pub status: String,
    pub severity: String,
    pub clinical_history: String,
    pub impression: String,
    /// 每行一条建议
    pub recommendations: String,
    // CT所见
    pub findings_type: String,
    pub location: String,
    pub dimension_length: String,
    pub dimension_width: String,
    pub dimension_thickness: String,
    pub midline_shift: String,
    pub mass_effect: String,
    pub fracture: String,
    // X光所见
    /// 逗号分隔的受累区域
    pub affected_areas: String,
    pub opacity: String,
    pub additional_findings: String,
    // X光生命体征
    pub temperature: String,
    pub o2_saturation: String,
    pub respiratory_rate: String,
}

impl RecordForm {
    /// 从归一化记录初始化表单（编辑流程），或从空白记录取默认值（新建流程）
    pub fn from_record(record: &ImagingRecord) -> Self {
        let mut form = Self {
            patient_name: record.patient_name.clone(),
            patient_id: record.patient_id.clone(),
            age: if record.age > 0 {
                record.age.to_string()
            } else {
                String::new()
            },
            gender: record
                .gender
                .map(|g| g.as_str().to_string())
                .unwrap_or_default(),
            procedure: record.procedure.clone(),
            scan_date: record
                .scan_date
                .map(|d| d.format("%Y-%m-%dT%H:%M").to_string())
                .unwrap_or_default(),
            status: record.status.as_str().to_string(),
            severity: record.severity.as_str().to_string(),
            clinical_history: record.clinical_history.clone(),
            impression: record.impression.clone(),
            recommendations: list_to_lines(&record.recommendations),
            ..Self::default()
        };
        match &record.findings {
            Findings::Ct(f) => {
                form.findings_type = f.kind.clone();
                form.location = f.location.clone();
                form.dimension_length = number_text(f.dimensions.length);
                form.dimension_width = number_text(f.dimensions.width);
                form.dimension_thickness = number_text(f.dimensions.thickness);
                form.midline_shift = number_text(f.midline_shift);
                form.mass_effect = f.mass_effect.clone();
                form.fracture = f.fracture.clone();
            }
            Findings::Xray(f) => {
                form.findings_type = f.kind.clone();
                form.affected_areas = list_to_csv(&f.affected_areas);
                form.opacity = f.opacity.clone();
                form.additional_findings = f.additional_findings.clone();
            }
        }
        if let Some(vitals) = &record.vital_signs {
            form.temperature = number_text(vitals.temperature);
            form.o2_saturation = number_text(vitals.o2_saturation);
            form.respiratory_rate = if vitals.respiratory_rate > 0 {
                vitals.respiratory_rate.to_string()
            } else {
                String::new()
            };
        }
        form
    }

    /// 组装CT所见
    ///
    /// 表单未暴露的子字段（骨折、并发症）从原记录带过来；新建流程
    /// 的原记录是空白记录，骨折回落到"None"。
    fn ct_findings(&self, original: &CtFindings) -> CtFindings {
        let fracture = if self.fracture.is_empty() {
            if original.fracture.is_empty() {
                "None".to_string()
            } else {
                original.fracture.clone()
            }
        } else {
            self.fracture.clone()
        };
        CtFindings {
            kind: self.findings_type.clone(),
            location: self.location.clone(),
            dimensions: Dimensions {
                length: parse_f64_or_zero(&self.dimension_length),
                width: parse_f64_or_zero(&self.dimension_width),
                thickness: parse_f64_or_zero(&self.dimension_thickness),
            },
            midline_shift: parse_f64_or_zero(&self.midline_shift),
            mass_effect: self.mass_effect.clone(),
            fracture,
            complications: original.complications.clone(),
        }
    }

    fn xray_findings(&self, original: &XrayFindings) -> XrayFindings {
        XrayFindings {
            kind: self.findings_type.clone(),
            affected_areas: csv_to_list(&self.affected_areas),
            opacity: self.opacity.clone(),
            additional_findings: self.additional_findings.clone(),
            complications: original.complications.clone(),
        }
    }

    /// 把表单内容合入原记录，生成提交用的记录
    ///
    /// 检查日期：编辑表单不暴露，沿用原记录；新建流程由调用方先把
    /// 表单日期解析进空白记录。`image_url`由调用方按上传结果决定。
    pub fn merge_into(&self, original: &ImagingRecord, image_url: Option<String>) -> ImagingRecord {
        let findings = match &original.findings {
            Findings::Ct(f) => Findings::Ct(self.ct_findings(f)),
            Findings::Xray(f) => Findings::Xray(self.xray_findings(f)),
        };
        let vital_signs = match original.modality() {
            Modality::Xray => Some(VitalSigns {
                temperature: parse_f64_or_zero(&self.temperature),
                o2_saturation: parse_f64_or_zero(&self.o2_saturation),
                respiratory_rate: parse_u32_or_zero(&self.respiratory_rate),
            }),
            Modality::Ct => None,
        };
        ImagingRecord {
            id: original.id.clone(),
            patient_name: self.patient_name.trim().to_string(),
            patient_id: self.patient_id.trim().to_string(),
            age: parse_u32_or_zero(&self.age),
            gender: Gender::from_wire(&self.gender),
            procedure: self.procedure.clone(),
            scan_date: original.scan_date,
            status: RecordStatus::from_wire(&self.status),
            severity: Severity::from_wire(&self.severity),
            clinical_history: self.clinical_history.trim().to_string(),
            impression: self.impression.trim().to_string(),
            recommendations: lines_to_list(&self.recommendations),
            image_url,
            vital_signs,
            findings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ct_record() -> ImagingRecord {
        let mut record = ImagingRecord::blank(Modality::Ct);
        record.id = "12".to_string();
        record.patient_name = "Jane Doe".to_string();
        record.patient_id = "P100".to_string();
        record.age = 34;
        record.gender = Some(Gender::Female);
        record.recommendations = vec!["Repeat CT in 24h".to_string()];
        record.findings = Findings::Ct(CtFindings {
            kind: "Subdural hematoma".to_string(),
            location: "Right frontal lobe".to_string(),
            dimensions: Dimensions {
                length: 4.2,
                width: 0.0,
                thickness: 0.8,
            },
            midline_shift: 3.5,
            mass_effect: "Yes".to_string(),
            fracture: "Linear".to_string(),
            complications: vec!["Edema".to_string()],
        });
        record
    }

    #[test]
    fn test_form_round_trip_preserves_exposed_fields() {
        let record = sample_ct_record();
        let form = RecordForm::from_record(&record);
        assert_eq!(form.patient_name, "Jane Doe");
        assert_eq!(form.dimension_length, "4.2");
        // 0值显示为空
        assert_eq!(form.dimension_width, "");
        assert_eq!(form.recommendations, "Repeat CT in 24h");

        let merged = form.merge_into(&record, record.image_url.clone());
        assert_eq!(merged.patient_name, record.patient_name);
        assert_eq!(merged.age, record.age);
        let findings = merged.findings.as_ct().unwrap();
        assert_eq!(findings.dimensions.length, 4.2);
        assert_eq!(findings.midline_shift, 3.5);
    }

    #[test]
    fn test_unexposed_ct_fields_carried_over() {
        let record = sample_ct_record();
        let mut form = RecordForm::from_record(&record);
        form.fracture = String::new(); // 编辑表单不暴露骨折字段
        let merged = form.merge_into(&record, None);
        let findings = merged.findings.as_ct().unwrap();
        assert_eq!(findings.fracture, "Linear");
        assert_eq!(findings.complications, vec!["Edema".to_string()]);
    }

    #[test]
    fn test_blank_fracture_falls_back_to_none() {
        let record = ImagingRecord::blank(Modality::Ct);
        let mut form = RecordForm::from_record(&record);
        form.fracture = String::new();
        let mut blank = record.clone();
        if let Findings::Ct(f) = &mut blank.findings {
            f.fracture = String::new();
        }
        let merged = form.merge_into(&blank, None);
        assert_eq!(merged.findings.as_ct().unwrap().fracture, "None");
    }

    #[test]
    fn test_garbage_numbers_become_zero() {
        let record = sample_ct_record();
        let mut form = RecordForm::from_record(&record);
        form.midline_shift = "a lot".to_string();
        form.dimension_length = "NaN".to_string();
        let merged = form.merge_into(&record, None);
        let findings = merged.findings.as_ct().unwrap();
        assert_eq!(findings.midline_shift, 0.0);
        assert!(!findings.midline_shift.is_nan());
        assert_eq!(findings.dimensions.length, 0.0);
    }

    #[test]
    fn test_recommendation_blank_lines_filtered() {
        let record = sample_ct_record();
        let mut form = RecordForm::from_record(&record);
        form.recommendations = "Rest\n\n   \nFollow-up".to_string();
        let merged = form.merge_into(&record, None);
        assert_eq!(
            merged.recommendations,
            vec!["Rest".to_string(), "Follow-up".to_string()]
        );
    }

    #[test]
    fn test_xray_vitals_and_areas_round_trip() {
        let mut record = ImagingRecord::blank(Modality::Xray);
        record.vital_signs = Some(VitalSigns {
            temperature: 37.9,
            o2_saturation: 93.5,
            respiratory_rate: 22,
        });
        record.findings = Findings::Xray(XrayFindings {
            kind: "Pneumonia".to_string(),
            affected_areas: vec!["Left lower lobe".to_string(), "Right middle lobe".to_string()],
            opacity: "Patchy".to_string(),
            additional_findings: String::new(),
            complications: vec!["Effusion".to_string()],
        });
        let form = RecordForm::from_record(&record);
        assert_eq!(form.affected_areas, "Left lower lobe, Right middle lobe");
        assert_eq!(form.temperature, "37.9");

        let merged = form.merge_into(&record, None);
        let findings = merged.findings.as_xray().unwrap();
        assert_eq!(findings.affected_areas.len(), 2);
        // 表单未暴露的并发症带过来
        assert_eq!(findings.complications, vec!["Effusion".to_string()]);
        assert_eq!(merged.vital_signs.unwrap().respiratory_rate, 22);
    }
}
