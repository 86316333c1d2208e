//! Intent Processor (§4.7): intent classification and input normalization.
//!
//! Ordering, short-circuits, and hard corrections intentionally mirror the
//! rule-before-LLM cascade this pipeline was distilled from: a command
//! regex, a short-casual-reply set, a rule-based marketing classifier, and
//! only then an LLM call, each cheaper than the next.

use crate::llm::{ChatMessage, Complexity, LlmClient, LlmRouter};
use noesis_core::{Intent, MarketingClassification, ProcessedInput, StructuredData};
use noesis_types::{SessionId, UserId};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

static COMMAND_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*/(\w+)(?:/\w+)*(?:\s|$)").unwrap());

const SHORT_CASUAL_REPLIES: &[&str] = &[
    "你好", "您好", "嗨", "在吗", "哈喽", "还好", "还好吧", "嗯", "不错", "还行", "一般",
];

const EXPLICIT_CONTENT_PHRASES: &[&str] = &[
    "生成", "写一篇", "帮我写", "做个文案", "输出文案", "给我一篇", "写个", "写段", "写一个",
    "出一篇", "创作", "帮我做", "生成一篇", "写份", "输出一篇", "小红书文案", "抖音脚本", "B站文案",
    "微博文案", "知乎文章",
];

const STRUCTURED_BRAND_KEYWORDS: &[&str] = &["品牌是", "品牌叫", "品牌名", "品牌", "我的是", "我叫"];
const STRUCTURED_PRODUCT_KEYWORDS: &[&str] = &["产品是", "产品叫", "产品名", "产品", "卖的是"];
const STRUCTURED_TOPIC_KEYWORDS: &[&str] = &["主题是", "话题是", "目标", "目的是", "推广", "想做"];

const MARKETING_CORRECTION_KEYWORDS: &[&str] = &["推广", "营销", "文案", "品牌", "产品", "宣传", "卖", "带货", "种草"];
const PRODUCT_MENTION_WORDS: &[&str] = &["手机", "耳机", "电脑", "平板", "手表", "咖啡", "奶茶", "零食", "护肤品"];

static STRUCTURED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"品牌[是为叫名][^，。,]{2,20}",
        r"产品[是为叫名][^，。,]{2,30}",
        r"主题[是为][^，。,]{2,20}",
        r"目标.{0,10}(人群|用户|用户群体)",
        r"品牌[^\s]{2,30}产品[^\s]{2,30}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SELF_INTRO_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"我叫([^，。！？\s]{2,20})").unwrap());
static SELF_INTRO_TOPIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"我是(?:做)?([^的。！？\s]{2,20})(?:的|行业)?").unwrap());

const INTENT_CLASSIFY_SYSTEM: &str = "You are an input-intent classifier for a marketing assistant. \
Given the user's current input (optionally with recent conversation context), decide exactly one intent \
from {structured_request, free_discussion, casual_chat, document_query, command} and whether the user \
explicitly asked for generated content. Respond with exactly one JSON object wrapped in a ```json fenced \
block: {\"intent\": \"...\", \"brand_name\": \"\", \"product_desc\": \"\", \"topic\": \"\", \"command\": \"\", \
\"explicit_content_request\": true|false}. Brand/product/topic come only from the conversation, never from \
attached documents or links.";

/// Rule-based marketing-intent classifier (§4.7). Pure, deterministic, no I/O.
pub fn classify_marketing_intent(text: &str) -> MarketingClassification {
    let text = text.trim();
    if text.is_empty() {
        return MarketingClassification {
            is_marketing: false,
            confidence: 0.5,
            reason: "empty_input".to_string(),
            matched_categories: Vec::new(),
        };
    }

    if let Some(rule) = check_strong_patterns(text) {
        return rule;
    }

    score_intent(text)
}

struct StrongPattern {
    pattern: &'static str,
    is_marketing: bool,
    confidence: f64,
    reason: &'static str,
}

static STRONG_PATTERNS: Lazy<Vec<(Regex, StrongPattern)>> = Lazy::new(|| {
    let defs = [
        (r"帮(我|我们|公司)?(做|写|设计|策划|规划|制定|优化).*(方案|策略|计划|内容|文案|脚本)", true, 0.95, "direct_instruction"),
        (r"请(问)?(如何|怎么|怎样).*(做|写|设计|策划|规划|制定|优化).*", true, 0.93, "how_to_instruction"),
        (r".*(推广|营销|宣传|广告|获客|引流|变现).*(方案|策略|计划|方法|技巧|怎么做)", true, 0.94, "promotion_related"),
        (r".*怎么(推广|营销|宣传|广告|获客|引流).*", true, 0.92, "how_to_promote"),
        (r".*如何(推广|营销|宣传|广告|获客|引流).*", true, 0.92, "how_to_promote"),
        (r".*(小红书|抖音|视频号|B站|快手|知乎|微博).*(运营|账号|IP|人设|打造)", true, 0.93, "platform_operation"),
        (r".*做(小红书|抖音|视频号|B站|快手|知乎|微博).*(账号|IP|内容)", true, 0.93, "platform_content"),
        (r".*(写|创作|制作|设计).*(文案|脚本|内容|帖子|笔记|视频|封面|标题)", true, 0.91, "content_creation"),
        (r".*(文案|脚本|内容|标题|封面).*怎么(写|做|设计)", true, 0.92, "how_to_create"),
        (r".*(涨粉|增粉|引流|变现|转化|成交).*(方法|技巧|策略|怎么|如何)", true, 0.93, "growth_method"),
        (r".*怎么(涨粉|增粉|引流|变现|转化|成交).*", true, 0.91, "how_to_grow"),
        (r".*(个人IP|人设|个人品牌|账号定位).*(打造|建立|设定|怎么|如何)", true, 0.94, "ip_building"),
        (r".*打造(个人IP|人设|个人品牌|账号定位).*", true, 0.94, "build_ip"),
        (r".*(如何|怎么).*打造.*(IP|人设|变现|品牌).*", true, 0.92, "how_to_build_ip"),
        (r".*(我)?(想|要|打算).*(推广|营销|宣传|引流|变现).*", true, 0.90, "want_to_promote"),
        (r".*(营销|推广|文案|品牌).*(什么|怎么|如何|是).*", true, 0.88, "marketing_question"),
        (r".*(直播|短视频|图文|社群|私域).*(怎么做|如何做|策略|方案)", true, 0.92, "specific_action"),
        (r".*做(直播|短视频|图文|社群|私域).*(内容|活动|策划)", true, 0.91, "do_specific_action"),
        (r"^(你好|在吗|哈喽|哈啰|嗨).*$", false, 0.90, "greeting"),
        (r"^.*(早上好|中午好|晚上好|早安|午安|晚安).*$", false, 0.85, "time_greeting"),
        (r"^.*(谢谢|感谢|辛苦).*$", false, 0.80, "thanks"),
        (r"^.*(再见|拜拜|下次聊|下次见).*$", false, 0.90, "goodbye"),
        (r"^.*(天气|吃饭|睡觉|休息|聊天).*$", false, 0.75, "small_talk"),
    ];
    defs.iter()
        .map(|(pattern, is_marketing, confidence, reason)| {
            (
                Regex::new(pattern).unwrap(),
                StrongPattern { pattern, is_marketing: *is_marketing, confidence: *confidence, reason },
            )
        })
        .collect()
});

fn check_strong_patterns(text: &str) -> Option<MarketingClassification> {
    let lower = text.to_lowercase();
    for (regex, def) in STRONG_PATTERNS.iter() {
        if regex.is_match(&lower) {
            return Some(MarketingClassification {
                is_marketing: def.is_marketing,
                confidence: def.confidence,
                reason: format!("rule_{}", def.reason),
                matched_categories: extract_categories_from_pattern(def.pattern),
            });
        }
    }
    None
}

fn extract_categories_from_pattern(pattern: &str) -> Vec<String> {
    let mut categories = Vec::new();
    if pattern.contains("推广") || pattern.contains("营销") {
        categories.push("action".to_string());
    }
    if pattern.contains("小红书") || pattern.contains("抖音") {
        categories.push("platform".to_string());
    }
    if pattern.contains("文案") || pattern.contains("内容") {
        categories.push("content".to_string());
    }
    if pattern.contains("涨粉") || pattern.contains("引流") {
        categories.push("growth".to_string());
    }
    if pattern.contains("IP") || pattern.contains("人设") {
        categories.push("ip".to_string());
    }
    categories
}

fn keyword_categories() -> [(&'static str, &'static [&'static str], f64); 8] {
    [
        ("action", &["推广", "营销", "宣传", "广告", "传播", "曝光", "获客", "拉新", "引流", "导流", "引粉", "转化", "变现", "成交", "销售", "卖货", "运营", "维护", "管理", "操作", "执行"], 3.0),
        ("content", &["文案", "脚本", "稿件", "软文", "文章", "内容", "素材", "选题", "话题", "标题", "视频", "短视频", "长视频", "直播", "图文", "笔记", "帖子", "动态", "说说", "微博"], 1.5),
        ("platform", &["小红书", "抖音", "快手", "视频号", "B站", "bilibili", "知乎", "微博", "公众号", "头条", "百家号", "账号", "号", "主页", "页面", "店铺"], 1.0),
        ("growth", &["涨粉", "增粉", "吸粉", "圈粉", "粉丝", "流量", "热度", "曝光", "推荐", "算法", "数据", "指标", "KPI", "ROI", "效果"], 2.0),
        ("ip", &["IP", "人设", "形象", "定位", "品牌", "口碑", "影响力", "知名度", "权威", "标签", "特色", "特点", "风格", "调性"], 2.0),
        ("strategy", &["策略", "方案", "计划", "规划", "打法", "方法论", "框架", "体系", "结构", "流程", "技巧", "方法", "窍门", "秘籍", "攻略"], 2.5),
        ("question", &["怎么", "如何", "怎样", "为何", "为什么", "哪些", "什么", "哪里", "谁", "哪个", "怎么办", "怎么做", "如何做", "怎样做"], 0.5),
        ("operation", &["做", "写", "搞", "弄", "整", "设计", "策划", "制作", "创建", "建立", "优化", "改进", "提升", "调整", "修改"], 0.5),
    ]
}

static SMALL_TALK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^你好.*",
        r"^在吗.*",
        r"^哈喽.*",
        r"^嗨.*",
        r".*(早上|中午|晚上)好.*",
        r".*(早安|午安|晚安).*",
        r".*(谢谢|感谢|辛苦).*$",
        r".*(再见|拜拜|下次聊).*",
        r"^([你您]好|hi|hello)[!！。，,. ]*$",
        r"^.*(今天|明天|昨天).*(天气|温度).*$",
        r"^.*(吃|喝).*(饭|水|茶|咖啡).*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn is_small_talk(lower: &str) -> bool {
    SMALL_TALK_PATTERNS.iter().any(|r| r.is_match(lower))
}

fn score_intent(text: &str) -> MarketingClassification {
    let lower = text.to_lowercase();
    let mut matched: Vec<&'static str> = Vec::new();
    let mut base_score = 0.0;

    for (category, keywords, weight) in keyword_categories() {
        let count = keywords.iter().filter(|kw| lower.contains(&kw.to_lowercase())).count();
        if count > 0 {
            matched.push(category);
            base_score += weight * count as f64;
        }
    }

    let mut pattern_bonus = 0.0;
    if matched.len() >= 2 {
        pattern_bonus += 0.5;
    }
    if matched.len() >= 3 {
        pattern_bonus += 1.0;
    }
    let has = |c: &str| matched.contains(&c);
    if has("action") && has("question") {
        pattern_bonus += 1.0;
    }
    if has("action") && has("platform") {
        pattern_bonus += 1.0;
    }
    if has("ip") && has("strategy") {
        pattern_bonus += 1.0;
    }
    if is_small_talk(&lower) {
        pattern_bonus -= 2.0;
    }

    let final_score = base_score * 0.1 + pattern_bonus;
    let confidence = final_score.clamp(0.0, 5.0) / 5.0;
    let is_marketing = confidence >= 0.6;

    MarketingClassification {
        is_marketing,
        confidence,
        reason: "scoring_algorithm".to_string(),
        matched_categories: matched.into_iter().map(str::to_string).collect(),
    }
}

fn parse_command(raw: &str) -> Option<String> {
    COMMAND_PATTERN.captures(raw.trim()).map(|c| c[1].to_string())
}

fn is_short_casual_reply(raw_clean: &str) -> bool {
    raw_clean.chars().count() <= 8 && SHORT_CASUAL_REPLIES.contains(&raw_clean)
}

fn has_explicit_content_request(text: &str) -> bool {
    EXPLICIT_CONTENT_PHRASES.iter().any(|p| text.contains(p))
}

fn is_structured_request(text: &str) -> bool {
    let has_brand = STRUCTURED_BRAND_KEYWORDS.iter().any(|kw| text.contains(kw));
    let has_product = STRUCTURED_PRODUCT_KEYWORDS.iter().any(|kw| text.contains(kw));
    let has_topic = STRUCTURED_TOPIC_KEYWORDS.iter().any(|kw| text.contains(kw));
    if has_brand && (has_product || has_topic) {
        return true;
    }
    if has_product && has_brand {
        return true;
    }
    STRUCTURED_PATTERNS.iter().any(|r| r.is_match(text))
}

fn looks_like_product_mention(text: &str) -> bool {
    let len = text.chars().count();
    len >= 5 && PRODUCT_MENTION_WORDS.iter().any(|w| text.contains(w))
}

fn extract_self_intro(raw: &str) -> StructuredData {
    let mut out = StructuredData::default();
    if let Some(c) = SELF_INTRO_NAME.captures(raw) {
        out.brand_name = Some(c[1].trim().chars().take(64).collect());
    }
    if let Some(c) = SELF_INTRO_TOPIC.captures(raw) {
        out.topic = Some(c[1].trim().chars().take(64).collect());
    }
    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

fn parse_llm_json(raw: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut trimmed = raw.trim();
    for prefix in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            trimmed = rest.trim_start();
            break;
        }
    }
    if let Some(idx) = trimmed.rfind("```") {
        trimmed = trimmed[..idx].trim();
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => {
            warn!(raw = %truncate(trimmed, 300), "intent JSON parse failed");
            serde_json::Map::new()
        }
    }
}

fn str_field(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    map.get(key).and_then(|v| v.as_str()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Intent Processor: runs the full classify-and-normalize pipeline for one
/// utterance. `conversation_context` is the only document/link-free signal
/// used to extract the brand/product/topic (§4.7).
pub struct IntentProcessor<C: LlmClient> {
    router: LlmRouter<C>,
}

impl<C: LlmClient> IntentProcessor<C> {
    pub fn new(router: LlmRouter<C>) -> Self {
        Self { router }
    }

    pub async fn process(
        &self,
        raw_input: &str,
        session_id: SessionId,
        user_id: UserId,
        conversation_context: Option<&str>,
    ) -> ProcessedInput {
        let raw = raw_input.trim().to_string();

        let mut result = ProcessedInput {
            intent: Intent::FreeDiscussion,
            raw_query: raw.clone(),
            command: None,
            structured_data: StructuredData::default(),
            explicit_content_request: false,
            session_id: session_id.clone(),
            user_id: user_id.clone(),
        };

        if raw.is_empty() {
            return result;
        }

        if let Some(cmd) = parse_command(&raw) {
            result.intent = Intent::Command;
            result.command = Some(cmd);
            return result;
        }

        if is_short_casual_reply(&raw) {
            result.intent = Intent::CasualChat;
            return result;
        }

        let rule_result = classify_marketing_intent(&raw);
        if !rule_result.is_marketing && rule_result.confidence >= 0.75 {
            info!(confidence = rule_result.confidence, reason = %rule_result.reason, "rule-based classifier: casual chat");
            result.intent = Intent::CasualChat;
            return result;
        }

        let mut prompt = format!("User input:\n{raw}");
        if let Some(ctx) = conversation_context.filter(|c| !c.trim().is_empty()) {
            prompt = format!("Recent conversation context:\n{}\n\nUser input:\n{raw}", ctx.trim());
        }

        let messages = [ChatMessage::system(INTENT_CLASSIFY_SYSTEM), ChatMessage::user(prompt)];
        let parsed = match self.router.invoke(&messages, "planning", Complexity::Low).await {
            Ok(text) => parse_llm_json(&text),
            Err(e) => {
                warn!(error = %e, "intent classification LLM call failed, falling back to free_discussion");
                return result;
            }
        };

        let mut intent_str = str_field(&parsed, "intent").unwrap_or_default().to_lowercase();

        if intent_str != "casual_chat" && is_short_casual_reply(&raw) {
            intent_str = "casual_chat".to_string();
        }
        if intent_str == "casual_chat"
            && (MARKETING_CORRECTION_KEYWORDS.iter().any(|kw| raw.contains(kw)) || looks_like_product_mention(&raw))
        {
            intent_str = "free_discussion".to_string();
        }
        if matches!(intent_str.as_str(), "free_discussion" | "") && is_structured_request(&raw) {
            intent_str = "structured_request".to_string();
        }

        let mut intent = match intent_str.as_str() {
            "structured_request" => Intent::StructuredRequest,
            "free_discussion" => Intent::FreeDiscussion,
            "casual_chat" => Intent::CasualChat,
            "document_query" => Intent::DocumentQuery,
            "command" => Intent::Command,
            _ => Intent::FreeDiscussion,
        };
        if intent == Intent::Command && str_field(&parsed, "command").is_none() {
            intent = Intent::FreeDiscussion;
        }

        result.intent = intent;
        result.explicit_content_request =
            parsed.get("explicit_content_request").and_then(|v| v.as_bool()).unwrap_or(false);
        if has_explicit_content_request(&raw) {
            result.explicit_content_request = true;
        }

        match intent {
            Intent::StructuredRequest | Intent::DocumentQuery => {
                result.structured_data = StructuredData {
                    brand_name: str_field(&parsed, "brand_name"),
                    product_desc: str_field(&parsed, "product_desc"),
                    topic: str_field(&parsed, "topic"),
                };
            }
            Intent::FreeDiscussion | Intent::CasualChat => {
                let mut sd = StructuredData {
                    brand_name: str_field(&parsed, "brand_name"),
                    product_desc: str_field(&parsed, "product_desc"),
                    topic: str_field(&parsed, "topic"),
                };
                if sd.is_empty() {
                    let intro = extract_self_intro(&raw);
                    if intro.brand_name.is_some() || intro.topic.is_some() {
                        sd = intro;
                    }
                }
                result.structured_data = sd;
            }
            Intent::Command => {
                result.command = str_field(&parsed, "command").or(result.command);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_types::Result;

    struct StubLlmClient {
        response: String,
    }

    #[async_trait::async_trait]
    impl LlmClient for StubLlmClient {
        async fn complete(&self, _role: &crate::llm::ModelRoleConfig, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    fn processor(response: &str) -> IntentProcessor<StubLlmClient> {
        let mut roles = std::collections::HashMap::new();
        let cfg = crate::llm::ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.2,
            max_tokens: 256,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        roles.insert(crate::llm::ROLE_STRATEGY.to_string(), cfg.clone());
        roles.insert(crate::llm::ROLE_INTENT.to_string(), cfg);
        let client = StubLlmClient { response: response.to_string() };
        IntentProcessor::new(LlmRouter::new(client, roles))
    }

    #[tokio::test]
    async fn empty_input_returns_default() {
        let p = processor("{}");
        let result = p.process("   ", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.intent, Intent::FreeDiscussion);
        assert!(result.raw_query.is_empty());
    }

    #[tokio::test]
    async fn command_short_circuits_without_llm() {
        let p = processor("should not be used");
        let result = p.process("/new_chat now", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.intent, Intent::Command);
        assert_eq!(result.command.as_deref(), Some("new_chat"));
    }

    #[tokio::test]
    async fn short_casual_reply_short_circuits() {
        let p = processor("should not be used");
        let result = p.process("你好", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.intent, Intent::CasualChat);
    }

    #[tokio::test]
    async fn rule_classifier_short_circuits_clear_small_talk() {
        let p = processor("should not be used");
        let result = p.process("今天天气真好啊", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.intent, Intent::CasualChat);
        assert!(!result.explicit_content_request);
    }

    #[tokio::test]
    async fn llm_path_parses_fenced_json() {
        let p = processor("```json\n{\"intent\": \"structured_request\", \"brand_name\": \"acme\", \"product_desc\": \"widgets\", \"topic\": \"launch\", \"command\": \"\", \"explicit_content_request\": true}\n```");
        let result = p.process("品牌是acme，产品是widgets", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.intent, Intent::StructuredRequest);
        assert_eq!(result.structured_data.brand_name.as_deref(), Some("acme"));
        assert!(result.explicit_content_request);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_free_discussion() {
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl LlmClient for AlwaysFails {
            async fn complete(&self, _role: &crate::llm::ModelRoleConfig, _messages: &[ChatMessage]) -> Result<String> {
                Err(noesis_types::EngineError::NetworkError("down".to_string()))
            }
        }
        let mut roles = std::collections::HashMap::new();
        let cfg = crate::llm::ModelRoleConfig {
            provider: "test".to_string(),
            model: "test".to_string(),
            temperature: 0.2,
            max_tokens: 256,
            base_url: "http://localhost".to_string(),
            api_key_env: "TEST_KEY".to_string(),
        };
        roles.insert(crate::llm::ROLE_STRATEGY.to_string(), cfg.clone());
        roles.insert(crate::llm::ROLE_INTENT.to_string(), cfg);
        let p = IntentProcessor::new(LlmRouter::new(AlwaysFails, roles));
        let result = p.process("推广我们的新产品", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.intent, Intent::FreeDiscussion);
        assert!(result.structured_data.is_empty());
    }

    #[tokio::test]
    async fn casual_chat_upgraded_when_marketing_keyword_present() {
        let p = processor("```json\n{\"intent\": \"casual_chat\", \"brand_name\": \"\", \"product_desc\": \"\", \"topic\": \"\", \"command\": \"\", \"explicit_content_request\": false}\n```");
        let result = p.process("推广一下我的品牌好吗", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.intent, Intent::FreeDiscussion);
    }

    #[tokio::test]
    async fn self_intro_extracted_for_casual_chat() {
        let p = processor("```json\n{\"intent\": \"casual_chat\", \"brand_name\": \"\", \"product_desc\": \"\", \"topic\": \"\", \"command\": \"\", \"explicit_content_request\": false}\n```");
        let result = p.process("我叫小明，我是做咖啡的", "s".to_string(), "u".to_string(), None).await;
        assert_eq!(result.structured_data.brand_name.as_deref(), Some("小明"));
        assert_eq!(result.structured_data.topic.as_deref(), Some("咖啡"));
    }

    #[test]
    fn marketing_classifier_detects_strong_pattern() {
        let result = classify_marketing_intent("帮我写一个推广方案");
        assert!(result.is_marketing);
        assert!(result.confidence > 0.9);
    }

    #[test]
    fn marketing_classifier_detects_greeting() {
        let result = classify_marketing_intent("你好呀");
        assert!(!result.is_marketing);
    }

    #[test]
    fn marketing_classifier_scores_combined_keywords() {
        let result = classify_marketing_intent("怎么做小红书账号运营涨粉策略");
        assert!(result.is_marketing);
    }

    #[test]
    fn marketing_classifier_empty_input() {
        let result = classify_marketing_intent("   ");
        assert!(!result.is_marketing);
        assert_eq!(result.reason, "empty_input");
    }
}
