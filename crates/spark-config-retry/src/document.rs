//! # 策略文档与解码器
//!
//! ## 定位与职责（Why）
//! - 配置中心推送的一次更新是“方法名 → 线上策略”的映射，本模块负责把原始文本解码为 [`PolicyDocument`]；
//! - 解码器以 [`ConfigDecoder`] trait 暴露，配置中心客户端可注入自己的实现，核心逻辑只把它当作不透明能力。
//!
//! ## 契约（What）
//! - 解码是“全有或全无”：任何结构错误都返回 [`DecodeError`]，不会产出部分文档；
//! - 文档保留负载中的条目顺序；同一方法名重复出现视为结构歧义，整批拒绝；
//! - 空方法名可以通过解码，由更新管道逐条拒绝。

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{
    Deserialize, Deserializer,
    de::{self, MapAccess, Visitor},
};

use crate::{error::DecodeError, policy::RawRetryPolicy};

/// 配置负载的序列化格式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    #[default]
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Toml => "toml",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigFormat {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("json") {
            Ok(ConfigFormat::Json)
        } else if value.eq_ignore_ascii_case("toml") {
            Ok(ConfigFormat::Toml)
        } else {
            Err(DecodeError::UnsupportedFormat {
                format: value.to_owned(),
            })
        }
    }
}

/// 一次配置推送解码后的策略文档。
///
/// # 教案式说明
/// - **意图 (Why)**：作为解码与校验之间的中间态，条目仍是未经校验的 [`RawRetryPolicy`]；
/// - **契约 (What)**：方法名在文档内唯一；未出现在文档中的方法不受本次更新影响（无隐式删除）；
/// - **风险 (Trade-offs)**：使用 `Vec` 而非映射保存，换取与负载一致的处理顺序。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    entries: Vec<(String, RawRetryPolicy)>,
}

impl PolicyDocument {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按负载顺序遍历条目。
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawRetryPolicy)> {
        self.entries
            .iter()
            .map(|(method, policy)| (method.as_str(), policy))
    }
}

impl IntoIterator for PolicyDocument {
    type Item = (String, RawRetryPolicy);
    type IntoIter = std::vec::IntoIter<(String, RawRetryPolicy)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'de> Deserialize<'de> for PolicyDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = PolicyDocument;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from method name to retry policy")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        let mut seen = HashSet::new();
        while let Some((method, policy)) = access.next_entry::<String, RawRetryPolicy>()? {
            if !seen.insert(method.clone()) {
                return Err(de::Error::custom(format_args!(
                    "duplicate method `{method}`"
                )));
            }
            entries.push((method, policy));
        }
        Ok(PolicyDocument { entries })
    }
}

/// 可插拔的负载解码器。
///
/// # 契约说明
/// - 实现必须是纯转换：不得修改外部状态，失败时返回 [`DecodeError`]；
/// - Trait 对象安全，配置中心回调以 `&dyn ConfigDecoder` 形式传入。
pub trait ConfigDecoder: Send + Sync {
    fn decode(&self, format: ConfigFormat, raw: &str) -> Result<PolicyDocument, DecodeError>;
}

/// 基于 `serde_json` 与 `toml` 的默认解码器。
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeDecoder;

impl ConfigDecoder for SerdeDecoder {
    fn decode(&self, format: ConfigFormat, raw: &str) -> Result<PolicyDocument, DecodeError> {
        let syntax = |detail: String| DecodeError::Syntax { format, detail };
        match format {
            ConfigFormat::Json => serde_json::from_str(raw).map_err(|err| syntax(err.to_string())),
            ConfigFormat::Toml => toml::from_str(raw).map_err(|err| syntax(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_document_keeps_payload_order() {
        let document = SerdeDecoder
            .decode(
                ConfigFormat::Json,
                r#"{
                    "Ping": {"backup_policy": {"delay_ms": 50}},
                    "Echo": {"failure_policy": {"max_attempts": 3}}
                }"#,
            )
            .unwrap();
        let methods: Vec<_> = document.iter().map(|(method, _)| method).collect();
        assert_eq!(methods, ["Ping", "Echo"]);
    }

    #[test]
    fn duplicate_method_rejects_whole_document() {
        let err = SerdeDecoder
            .decode(
                ConfigFormat::Json,
                r#"{"Echo": {"backup_policy": {"delay_ms": 1}}, "Echo": {}}"#,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Syntax { format: ConfigFormat::Json, ref detail }
                if detail.contains("duplicate method `Echo`")
        ));
    }

    #[test]
    fn toml_document_is_supported() {
        let document = SerdeDecoder
            .decode(
                ConfigFormat::Toml,
                r#"
                [Echo.failure_policy]
                max_attempts = 3

                [Echo.failure_policy.backoff]
                type = "fixed"
                delay_ms = 20
                "#,
            )
            .unwrap();
        assert_eq!(document.len(), 1);
        let (method, raw) = document.iter().next().unwrap();
        assert_eq!(method, "Echo");
        assert_eq!(raw.failure_policy.as_ref().unwrap().max_attempts, 3);
    }

    #[test]
    fn malformed_payload_is_a_syntax_error() {
        let err = SerdeDecoder
            .decode(ConfigFormat::Json, "{not json")
            .unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { format: ConfigFormat::Json, .. }));
    }

    #[test]
    fn format_names_parse_case_insensitively() {
        assert_eq!("JSON".parse::<ConfigFormat>(), Ok(ConfigFormat::Json));
        assert_eq!("toml".parse::<ConfigFormat>(), Ok(ConfigFormat::Toml));
        assert_eq!(
            "yaml".parse::<ConfigFormat>(),
            Err(DecodeError::UnsupportedFormat {
                format: "yaml".to_owned()
            })
        );
    }
}
