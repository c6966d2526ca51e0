use std::fmt;
use std::str::FromStr;

use netpulse_errors::NetpulseError;
use serde::{Deserialize, Serialize};

/// 检测类型
///
/// 固定目录，创建检测任务时按此顺序扇出子任务。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Http,
    Https,
    Ping,
    Tcp,
    Traceroute,
    DnsA,
    DnsAaaa,
    DnsMx,
    DnsNs,
    DnsTxt,
}

impl CheckType {
    /// 完整检测目录（顺序即入队顺序）
    pub const CATALOG: [CheckType; 10] = [
        CheckType::Http,
        CheckType::Https,
        CheckType::Ping,
        CheckType::Tcp,
        CheckType::Traceroute,
        CheckType::DnsA,
        CheckType::DnsAaaa,
        CheckType::DnsMx,
        CheckType::DnsNs,
        CheckType::DnsTxt,
    ];

    pub const DNS_FAMILY: [CheckType; 5] = [
        CheckType::DnsA,
        CheckType::DnsAaaa,
        CheckType::DnsMx,
        CheckType::DnsNs,
        CheckType::DnsTxt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Http => "http",
            CheckType::Https => "https",
            CheckType::Ping => "ping",
            CheckType::Tcp => "tcp",
            CheckType::Traceroute => "traceroute",
            CheckType::DnsA => "dns_a",
            CheckType::DnsAaaa => "dns_aaaa",
            CheckType::DnsMx => "dns_mx",
            CheckType::DnsNs => "dns_ns",
            CheckType::DnsTxt => "dns_txt",
        }
    }

    pub fn is_dns(&self) -> bool {
        Self::DNS_FAMILY.contains(self)
    }

    /// DNS记录类型（仅DNS检测有效）
    pub fn dns_record_type(&self) -> Option<&'static str> {
        match self {
            CheckType::DnsA => Some("A"),
            CheckType::DnsAaaa => Some("AAAA"),
            CheckType::DnsMx => Some("MX"),
            CheckType::DnsNs => Some("NS"),
            CheckType::DnsTxt => Some("TXT"),
            _ => None,
        }
    }

    /// 所有合法名称，用于错误提示
    pub fn allowed_names() -> Vec<&'static str> {
        Self::CATALOG.iter().map(|c| c.as_str()).collect()
    }

    /// 解析请求的检测子集，保持目录顺序并去重
    pub fn parse_selection<S: AsRef<str>>(names: &[S]) -> Result<Vec<CheckType>, NetpulseError> {
        let mut requested = Vec::with_capacity(names.len());
        for name in names {
            requested.push(name.as_ref().parse::<CheckType>()?);
        }
        Ok(Self::CATALOG
            .iter()
            .copied()
            .filter(|c| requested.contains(c))
            .collect())
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = NetpulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::CATALOG
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                NetpulseError::invalid_argument(format!(
                    "不支持的检测类型: {s}，允许的类型: {:?}",
                    Self::allowed_names()
                ))
            })
    }
}
