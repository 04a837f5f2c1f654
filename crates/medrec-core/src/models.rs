//! 核心数据模型定义

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 影像检查类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Ct,
    Xray,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Ct => "ct",
            Modality::Xray => "xray",
        }
    }
}

/// 性别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }

    /// 从接口返回的字符串解析，未知值返回None
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "Male" => Some(Gender::Male),
            "Female" => Some(Gender::Female),
            "Other" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// 记录状态
///
/// 不同表单观察到的取值不完全一致，这里保留观察到的并集。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Pending,    // 待处理
    InProgress, // 处理中
    Completed,  // 已完成
    Reviewed,   // 已审阅
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "Pending",
            RecordStatus::InProgress => "In Progress",
            RecordStatus::Completed => "Completed",
            RecordStatus::Reviewed => "Reviewed",
        }
    }

    /// 宽松解析：历史数据里出现过未知状态值，回退到Pending
    pub fn from_wire(value: &str) -> Self {
        match value {
            "In Progress" => RecordStatus::InProgress,
            "Completed" => RecordStatus::Completed,
            "Reviewed" => RecordStatus::Reviewed,
            _ => RecordStatus::Pending,
        }
    }
}

/// 严重程度
///
/// 仅驱动界面配色，客户端不附加任何工作流语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Stable,   // 稳定
    Moderate, // 中度
    Urgent,   // 紧急
    Critical, // 危急
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Stable => "Stable",
            Severity::Moderate => "Moderate",
            Severity::Urgent => "Urgent",
            Severity::Critical => "Critical",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "Moderate" => Severity::Moderate,
            "Urgent" => Severity::Urgent,
            "Critical" => Severity::Critical,
            _ => Severity::Stable,
        }
    }
}

/// 病灶尺寸（厘米）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub thickness: f64,
}

/// CT检查所见
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CtFindings {
    /// 所见类型（线上字段名为type）
    pub kind: String,
    pub location: String,
    pub dimensions: Dimensions,
    /// 中线移位（毫米）
    pub midline_shift: f64,
    pub mass_effect: String,
    pub fracture: String,
    pub complications: Vec<String>,
}

/// X光检查所见
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XrayFindings {
    pub kind: String,
    pub affected_areas: Vec<String>,
    pub opacity: String,
    pub additional_findings: String,
    pub complications: Vec<String>,
}

/// 生命体征（X光记录在记录层级携带，不嵌套在所见里）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VitalSigns {
    pub temperature: f64,
    pub o2_saturation: f64,
    pub respiratory_rate: u32,
}

/// 检查所见，随检查类型变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Findings {
    Ct(CtFindings),
    Xray(XrayFindings),
}

impl Findings {
    pub fn modality(&self) -> Modality {
        match self {
            Findings::Ct(_) => Modality::Ct,
            Findings::Xray(_) => Modality::Xray,
        }
    }

    pub fn as_ct(&self) -> Option<&CtFindings> {
        match self {
            Findings::Ct(f) => Some(f),
            Findings::Xray(_) => None,
        }
    }

    pub fn as_xray(&self) -> Option<&XrayFindings> {
        match self {
            Findings::Xray(f) => Some(f),
            Findings::Ct(_) => None,
        }
    }
}

/// 影像记录
///
/// 服务端持有权威副本；客户端在两次拉取之间只持有可能过期的瞬态副本。
/// `id`由服务端在创建时分配，之后不可变，新建草稿时为空字符串。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingRecord {
    pub id: String,
    pub patient_name: String,
    pub patient_id: String,
    pub age: u32,
    pub gender: Option<Gender>,
    pub procedure: String,
    pub scan_date: Option<NaiveDateTime>,
    pub status: RecordStatus,
    pub severity: Severity,
    pub clinical_history: String,
    pub impression: String,
    pub recommendations: Vec<String>,
    pub image_url: Option<String>,
    pub vital_signs: Option<VitalSigns>,
    pub findings: Findings,
}

impl ImagingRecord {
    /// 对应检查类型的空白记录（新建表单的初始值）
    pub fn blank(modality: Modality) -> Self {
        let findings = match modality {
            Modality::Ct => Findings::Ct(CtFindings {
                kind: "Normal".to_string(),
                fracture: "No".to_string(),
                ..CtFindings::default()
            }),
            Modality::Xray => Findings::Xray(XrayFindings {
                kind: "Normal".to_string(),
                ..XrayFindings::default()
            }),
        };
        Self {
            id: String::new(),
            patient_name: String::new(),
            patient_id: String::new(),
            age: 0,
            gender: None,
            procedure: String::new(),
            scan_date: None,
            status: RecordStatus::Pending,
            severity: Severity::Stable,
            clinical_history: String::new(),
            impression: String::new(),
            recommendations: Vec::new(),
            image_url: None,
            vital_signs: match modality {
                Modality::Xray => Some(VitalSigns::default()),
                Modality::Ct => None,
            },
            findings,
        }
    }

    pub fn modality(&self) -> Modality {
        self.findings.modality()
    }
}

/// 用户资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "profileImage")]
    pub profile_image: Option<String>,
}

impl UserProfile {
    /// 从接口返回的用户对象解析，id可能是数字也可能是字符串
    pub fn from_value(value: &serde_json::Value) -> Self {
        let id = match value.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Self {
            id,
            name: value
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            email: value
                .get("email")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            role: value
                .get("role")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            profile_image: value
                .get("profileImage")
                .or_else(|| value.get("profile_image"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        }
    }
}

/// 列表查询过滤器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    /// 按患者姓名或患者ID搜索
    pub search: String,
    /// None表示"all"，不下发过滤参数
    pub severity: Option<Severity>,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            severity: None,
        }
    }
}
