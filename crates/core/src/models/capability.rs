use std::fmt;
use std::str::FromStr;

use netpulse_errors::NetpulseError;
use serde::{Deserialize, Serialize};

use super::CheckType;

/// Agent声明的执行能力
///
/// 能力名与检测类型一一对应，唯一的扩展项是 `dns`：
/// 它覆盖全部五种 `dns_*` 子类型。`http` 不覆盖 `https`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    Check(CheckType),
    DnsFamily,
}

/// 能力扩展表：通用能力名 -> 覆盖的检测类型
const EXPANSIONS: &[(&str, &[CheckType])] = &[("dns", &CheckType::DNS_FAMILY)];

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Check(check) => check.as_str(),
            Capability::DnsFamily => "dns",
        }
    }

    /// 展开为具体检测类型
    pub fn expand(&self) -> Vec<CheckType> {
        match self {
            Capability::Check(check) => vec![*check],
            Capability::DnsFamily => EXPANSIONS
                .iter()
                .find(|(name, _)| *name == "dns")
                .map(|(_, checks)| checks.to_vec())
                .unwrap_or_default(),
        }
    }

    pub fn covers(&self, check_type: CheckType) -> bool {
        self.expand().contains(&check_type)
    }

    /// 解析能力名列表，任何未知名称都会使整个列表被拒绝
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Capability>, NetpulseError> {
        let mut parsed: Vec<Capability> = Vec::with_capacity(names.len());
        for name in names {
            let capability = name.as_ref().parse::<Capability>()?;
            if !parsed.contains(&capability) {
                parsed.push(capability);
            }
        }
        Ok(parsed)
    }
}

/// 判断能力集合是否覆盖某检测类型（精确的枚举成员判断，不做子串匹配）
pub fn match_capability(capabilities: &[Capability], check_type: CheckType) -> bool {
    capabilities.iter().any(|c| c.covers(check_type))
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = NetpulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if EXPANSIONS.iter().any(|(name, _)| *name == normalized) {
            return Ok(Capability::DnsFamily);
        }
        normalized
            .parse::<CheckType>()
            .map(Capability::Check)
            .map_err(|_| {
                NetpulseError::invalid_argument(format!(
                    "不支持的能力: {s}，允许的能力: {:?} 或 \"dns\"",
                    CheckType::allowed_names()
                ))
            })
    }
}

impl TryFrom<String> for Capability {
    type Error = NetpulseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.as_str().to_string()
    }
}

impl From<CheckType> for Capability {
    fn from(value: CheckType) -> Self {
        Capability::Check(value)
    }
}
