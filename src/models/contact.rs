use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScrapeError;

/// 抽取模式
///
/// - `Full`：主页 + AI 推荐的联系页 + 可选校验
/// - `Fast`：只抓主页，可选校验
/// - `ProfileOnly`：只抽取主页的社交主页链接，结果中不含邮箱和电话
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrapeMode {
    #[default]
    Full,
    Fast,
    ProfileOnly,
}

impl ScrapeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeMode::Full => "full",
            ScrapeMode::Fast => "fast",
            ScrapeMode::ProfileOnly => "profile-only",
        }
    }

    /// 该模式写入的缓存命名空间
    pub fn namespace(self) -> CacheNamespace {
        match self {
            ScrapeMode::Full | ScrapeMode::Fast => CacheNamespace::Contact,
            ScrapeMode::ProfileOnly => CacheNamespace::Linkedin,
        }
    }

    /// 是否需要让 AI 寻找联系页
    pub fn seeks_contact_page(self) -> bool {
        matches!(self, ScrapeMode::Full)
    }

    /// 是否抽取邮箱和电话
    pub fn collects_contacts(self) -> bool {
        !matches!(self, ScrapeMode::ProfileOnly)
    }
}

impl fmt::Display for ScrapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeMode {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(ScrapeMode::Full),
            "fast" => Ok(ScrapeMode::Fast),
            "profile-only" | "profile_only" | "linkedin" => Ok(ScrapeMode::ProfileOnly),
            other => Err(ScrapeError::invalid_input(format!(
                "unknown mode '{}', expected full, fast or profile-only",
                other
            ))),
        }
    }
}

/// 缓存命名空间，两个命名空间的 key 永不重叠
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Contact,
    Linkedin,
}

impl CacheNamespace {
    pub fn prefix(self) -> &'static str {
        match self {
            CacheNamespace::Contact => "contact",
            CacheNamespace::Linkedin => "linkedin",
        }
    }

    /// 生成缓存 key：`{namespace}:{url}`
    pub fn key(self, url: &str) -> String {
        format!("{}:{}", self.prefix(), url)
    }
}

/// 抽取结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Success,
    NoContactsFound,
    Error,
}

impl ScrapeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeStatus::Success => "success",
            ScrapeStatus::NoContactsFound => "no_contacts_found",
            ScrapeStatus::Error => "error",
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 社交主页链接（公司 / 个人）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLinks {
    #[serde(default)]
    pub company: Vec<String>,
    #[serde(default)]
    pub personal: Vec<String>,
}

impl ProfileLinks {
    pub fn is_empty(&self) -> bool {
        self.company.is_empty() && self.personal.is_empty()
    }

    /// 合并另一组链接，保持顺序并去重
    pub fn merge(&mut self, other: ProfileLinks) {
        merge_unique(&mut self.company, other.company);
        merge_unique(&mut self.personal, other.personal);
    }
}

/// 流程中间态：尚未定性的候选联系方式
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactCandidates {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub profiles: ProfileLinks,
}

impl ContactCandidates {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phones.is_empty() && self.profiles.is_empty()
    }

    pub fn merge(&mut self, other: ContactCandidates) {
        merge_unique(&mut self.emails, other.emails);
        merge_unique(&mut self.phones, other.phones);
        self.profiles.merge(other.profiles);
    }

    /// 只保留同时出现在 `validated` 中的条目
    ///
    /// AI 校验只能删减，不能凭空添加。邮箱比较忽略大小写，
    /// 电话比较只看数字。`validated.profiles` 为 None 时社交链接保持不变。
    pub fn retain_validated(&mut self, validated: &ValidatedContacts) {
        self.emails.retain(|email| {
            validated
                .emails
                .iter()
                .any(|v| v.trim().eq_ignore_ascii_case(email))
        });

        let valid_phone_digits: Vec<String> =
            validated.phones.iter().map(|p| digits_of(p)).collect();
        self.phones
            .retain(|phone| valid_phone_digits.contains(&digits_of(phone)));

        if let Some(profiles) = &validated.profiles {
            self.profiles
                .company
                .retain(|url| contains_url(&profiles.company, url));
            self.profiles
                .personal
                .retain(|url| contains_url(&profiles.personal, url));
        }
    }
}

/// AI 校验后返回的有效联系方式
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ValidatedContacts {
    #[serde(default, rename = "valid_email")]
    pub emails: Vec<String>,
    #[serde(default, rename = "valid_phones")]
    pub phones: Vec<String>,
    #[serde(default, rename = "valid_linkedin_urls")]
    pub profiles: Option<ProfileLinks>,
}

/// 单个网站的抽取结果
///
/// - `status=error` 时只有 `error`，所有数据字段为空
/// - 仅社交链接模式下 `emails` / `phones` 不出现
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactResult {
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<ProfileLinks>,
    pub status: ScrapeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContactResult {
    /// 构造错误结果
    pub fn error(website: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            website: website.into(),
            emails: None,
            phones: None,
            profiles: None,
            status: ScrapeStatus::Error,
            error: Some(message.into()),
        }
    }

    /// 由候选联系方式构造结果并确定状态
    pub fn from_candidates(
        website: impl Into<String>,
        candidates: ContactCandidates,
        mode: ScrapeMode,
    ) -> Self {
        let status = if candidates.is_empty() {
            ScrapeStatus::NoContactsFound
        } else {
            ScrapeStatus::Success
        };

        let (emails, phones) = if mode.collects_contacts() {
            (Some(candidates.emails), Some(candidates.phones))
        } else {
            (None, None)
        };

        Self {
            website: website.into(),
            emails,
            phones,
            profiles: Some(candidates.profiles),
            status,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ScrapeStatus::Error
    }

    pub fn emails(&self) -> &[String] {
        self.emails.as_deref().unwrap_or_default()
    }

    pub fn phones(&self) -> &[String] {
        self.phones.as_deref().unwrap_or_default()
    }

    pub fn company_profiles(&self) -> &[String] {
        self.profiles
            .as_ref()
            .map(|p| p.company.as_slice())
            .unwrap_or_default()
    }

    pub fn personal_profiles(&self) -> &[String] {
        self.profiles
            .as_ref()
            .map(|p| p.personal.as_slice())
            .unwrap_or_default()
    }
}

/// 把 `extra` 中未出现过的条目依次追加到 `target`
pub fn merge_unique(target: &mut Vec<String>, extra: impl IntoIterator<Item = String>) {
    for item in extra {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

fn digits_of(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn contains_url(list: &[String], url: &str) -> bool {
    let url = url.trim_end_matches('/');
    list.iter()
        .any(|candidate| candidate.trim_end_matches('/').eq_ignore_ascii_case(url))
}
