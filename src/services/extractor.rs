//! 联系方式抽取 - 业务能力层
//!
//! 只负责"从一段 HTML 中找出联系方式"，全部是纯函数。
//! 输入的 HTML 可以是残缺的，任何情况下都不会失败，最多返回空列表。
//! 每个列表都按首次出现顺序去重。

use once_cell::sync::Lazy;
use phf::{phf_map, phf_set};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::models::contact::{merge_unique, ContactCandidates, ProfileLinks};

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").ok());

static PHONE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\+?\d[\d\s().-]{6,}\d").ok());

/// 一次扫描同时匹配公司页和个人页，按路径第一段分类
static PROFILE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)https?://(?:[a-z]{2,3}\.)?linkedin\.com/(company|showcase|school|in|pub)/[A-Za-z0-9_%-]+",
    )
    .ok()
});

static ANCHOR_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("a[href]").ok());

/// 形如 `logo@2x.png` 的资源文件名不是邮箱
static ASSET_EXTENSIONS: phf::Set<&'static str> = phf_set! {
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "css", "js",
};

/// 不计入可见文本的标签
static HIDDEN_TAGS: phf::Set<&'static str> = phf_set! {
    "script", "style", "noscript", "template",
};

/// 联系页关键词及优先级（数值越小越优先）
static CONTACT_KEYWORDS: phf::Map<&'static str, u8> = phf_map! {
    "contact" => 0,
    "contact-us" => 0,
    "contactus" => 0,
    "contact_us" => 0,
    "contactez-nous" => 0,
    "contattaci" => 0,
    "kontakt" => 0,
    "contato" => 0,
    "contacto" => 0,
    "contacts" => 0,
    "reach-us" => 1,
    "get-in-touch" => 1,
    "about" => 2,
    "about-us" => 2,
    "impressum" => 2,
};

const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

/// 抽取邮箱（在原始 HTML 上匹配，统一小写）
pub fn extract_emails(html: &str) -> Vec<String> {
    let Some(re) = EMAIL_RE.as_ref() else {
        return Vec::new();
    };

    let mut emails = Vec::new();
    for m in re.find_iter(html) {
        let email = m.as_str().to_ascii_lowercase();
        let is_asset = email
            .rsplit('.')
            .next()
            .map_or(false, |ext| ASSET_EXTENSIONS.contains(ext));
        if !is_asset && !emails.contains(&email) {
            emails.push(email);
        }
    }
    emails
}

/// 抽取电话（只看可见文本，数字位数 7~15）
pub fn extract_phones(html: &str) -> Vec<String> {
    let Some(re) = PHONE_RE.as_ref() else {
        return Vec::new();
    };

    let text = visible_text(html);
    let mut phones = Vec::new();
    for m in re.find_iter(&text) {
        let phone = collapse_whitespace(m.as_str());
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        if (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) && !phones.contains(&phone) {
            phones.push(phone);
        }
    }
    phones
}

/// 抽取 LinkedIn 链接并分类
///
/// `company` / `showcase` / `school` 归为公司，`in` / `pub` 归为个人。
pub fn extract_profile_links(html: &str) -> ProfileLinks {
    let mut links = ProfileLinks::default();
    let Some(re) = PROFILE_RE.as_ref() else {
        return links;
    };

    for caps in re.captures_iter(html) {
        let (Some(full), Some(kind)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let url = full.as_str().to_string();
        let target = match kind.as_str().to_ascii_lowercase().as_str() {
            "in" | "pub" => &mut links.personal,
            _ => &mut links.company,
        };
        merge_unique(target, [url]);
    }
    links
}

/// 抽取同站链接（相对地址按 `base` 解析，去掉 fragment）
///
/// 同站判断忽略 `www.` 前缀。
pub fn extract_links(html: &str, base: &str) -> Vec<String> {
    let (Ok(base_url), Some(selector)) = (Url::parse(base), ANCHOR_SELECTOR.as_ref()) else {
        return Vec::new();
    };
    let Some(base_host) = base_url.host_str().map(bare_host) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for anchor in document.select(selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = base_url.join(href.trim()) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if resolved.host_str().map(bare_host) != Some(base_host.clone()) {
            continue;
        }
        resolved.set_fragment(None);
        merge_unique(&mut links, [resolved.to_string()]);
    }
    links
}

/// 抽取一页的全部候选联系方式
///
/// `include_contacts` 为 false 时只抽取社交链接。
pub fn extract_candidates(html: &str, include_contacts: bool) -> ContactCandidates {
    let (emails, phones) = if include_contacts {
        (extract_emails(html), extract_phones(html))
    } else {
        (Vec::new(), Vec::new())
    };

    ContactCandidates {
        emails,
        phones,
        profiles: extract_profile_links(html),
    }
}

/// 按关键词猜测联系页（AI 不可用时的兜底）
///
/// 优先级相同时取列表中靠前的链接。
pub fn guess_contact_page(links: &[String]) -> Option<String> {
    links
        .iter()
        .filter_map(|link| keyword_priority(link).map(|priority| (priority, link)))
        .min_by_key(|(priority, _)| *priority)
        .map(|(_, link)| link.clone())
}

fn keyword_priority(link: &str) -> Option<u8> {
    let url = Url::parse(link).ok()?;
    url.path_segments()?
        .filter_map(|segment| {
            let segment = segment.to_ascii_lowercase();
            let stem = segment.split('.').next().unwrap_or_default();
            CONTACT_KEYWORDS
                .get(stem)
                .copied()
                .or_else(|| stem.contains("contact").then_some(1))
        })
        .min()
}

fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| HIDDEN_TAGS.contains(el.name()))
        });
        let text: &str = text;
        if !hidden && !text.trim().is_empty() {
            parts.push(text.trim());
        }
    }
    parts.join(" ")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn bare_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}
