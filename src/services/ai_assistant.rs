//! AI 助手 - 业务能力层
//!
//! 两项能力：
//! - 从主页链接中挑出最可能的联系页
//! - 校验抽取到的联系方式，剔除无效条目
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务均可）

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::models::{ContactCandidates, ValidatedContacts};

/// 发送给 AI 的链接数量上限
pub const MAX_CONTACT_PAGE_LINKS: usize = 20;

/// AI 助手能力
#[async_trait]
pub trait AiAssistant: Send + Sync {
    /// 从链接列表中挑出联系页；AI 认为没有时返回 None
    async fn find_contact_page(&self, base_url: &str, links: &[String]) -> Result<Option<String>>;

    /// 校验候选联系方式，返回 AI 认为有效的部分
    async fn validate_contacts(&self, candidates: &ContactCandidates) -> Result<ValidatedContacts>;
}

/// 基于 OpenAI 兼容接口的 AI 助手
pub struct OpenAiAssistant {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl OpenAiAssistant {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.openai_model.clone(),
        }
    }

    /// 通用的 LLM 调用，返回去掉首尾空白的回复文本
    pub async fn send_to_llm(&self, user_message: &str, system_message: Option<&str>) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(1024u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl AiAssistant for OpenAiAssistant {
    async fn find_contact_page(&self, base_url: &str, links: &[String]) -> Result<Option<String>> {
        let limited = &links[..links.len().min(MAX_CONTACT_PAGE_LINKS)];
        debug!("🤖 请求 AI 寻找联系页，候选链接 {} 个", limited.len());

        let prompt = build_contact_page_prompt(base_url, limited);
        let response = self.send_to_llm(&prompt, None).await?;
        parse_contact_page_response(&response, base_url)
    }

    async fn validate_contacts(&self, candidates: &ContactCandidates) -> Result<ValidatedContacts> {
        debug!(
            "🤖 请求 AI 校验: {} 个邮箱, {} 个电话",
            candidates.emails.len(),
            candidates.phones.len()
        );

        let prompt = build_validation_prompt(candidates);
        let response = self.send_to_llm(&prompt, None).await?;
        parse_validation_response(&response)
    }
}

/// 构建寻找联系页的 prompt
pub fn build_contact_page_prompt(base_url: &str, links: &[String]) -> String {
    let links_json = serde_json::to_string_pretty(links).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"Given the following list of internal website links and the base URL, identify the most likely contact page URL.
Base URL: {}
Internal Links: {}
Return ONLY a JSON response in this exact format with no additional text: {{"most_likely_contact_page": "URL_HERE"}}
The contact page could be named: contact, contact-us, contactez-nous, contattaci, kontakt, contato, contacto, about, reach-us, get-in-touch, etc.
If no contact page is found, return null."#,
        base_url, links_json
    )
}

/// 构建校验联系方式的 prompt
///
/// 有社交链接时一并校验。
pub fn build_validation_prompt(candidates: &ContactCandidates) -> String {
    let emails = serde_json::to_string_pretty(&candidates.emails).unwrap_or_default();
    let phones = serde_json::to_string_pretty(&candidates.phones).unwrap_or_default();

    if candidates.profiles.is_empty() {
        return format!(
            r#"Validate the following extracted emails and phone numbers.
Return ONLY valid contact information in JSON format.

Emails: {}
Phones: {}

Return ONLY this JSON structure with no additional text:
{{
  "valid_email": ["email1@domain.com", "email2@domain.com"],
  "valid_phones": ["+1 202 555 0185", "123-456-7890"]
}}

For phone numbers:
- Include numbers that look like real phone numbers (7-15 digits)
- Preserve formatting including "+" if present
- Prefer international numbers first"#,
            emails, phones
        );
    }

    let profiles = serde_json::to_string_pretty(&candidates.profiles).unwrap_or_default();
    format!(
        r#"Validate the following extracted contact information.
Return ONLY valid contact information in JSON format.

Emails: {}
Phones: {}
LinkedIn URLs: {}

Return ONLY this JSON structure with no additional text:
{{
  "valid_email": ["email1@domain.com", "email2@domain.com"],
  "valid_phones": ["+1 202 555 0185", "123-456-7890"],
  "valid_linkedin_urls": {{
    "company": ["https://linkedin.com/company/example"],
    "personal": ["https://linkedin.com/in/john-doe"]
  }}
}}

For phone numbers:
- Include numbers that look like real phone numbers (7-15 digits)
- Preserve formatting including "+" if present
- Prefer international numbers first

For LinkedIn URLs:
- Only include valid LinkedIn URLs
- Keep company pages separate from personal profiles"#,
        emails, phones, profiles
    )
}

/// 解析联系页回复，相对地址按 `base_url` 补全
pub fn parse_contact_page_response(response: &str, base_url: &str) -> Result<Option<String>> {
    let value: JsonValue = serde_json::from_str(strip_code_fence(response))
        .with_context(|| format!("无法解析 AI 回复: {}", response))?;

    let page = match &value {
        JsonValue::Null => None,
        JsonValue::Object(map) => map
            .get("most_likely_contact_page")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null")),
        other => anyhow::bail!("AI 回复格式不正确: {}", other),
    };

    let Some(page) = page else {
        return Ok(None);
    };

    let base = Url::parse(base_url).with_context(|| format!("无效的基础地址: {}", base_url))?;
    let absolute = base
        .join(page)
        .with_context(|| format!("无效的联系页地址: {}", page))?;
    Ok(Some(absolute.to_string()))
}

/// 解析校验回复
pub fn parse_validation_response(response: &str) -> Result<ValidatedContacts> {
    serde_json::from_str(strip_code_fence(response))
        .with_context(|| format!("无法解析 AI 校验结果: {}", response))
}

/// 去掉 ```json ... ``` 包裹
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    inner.trim()
}
