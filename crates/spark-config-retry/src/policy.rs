//! # 重试策略数据模型与校验器
//!
//! ## 核心意图（Why）
//! - 以封闭的和类型 [`RetryPolicy`] 表达“备份请求”与“失败重试”二选一的约束，
//!   使“两者都设置/都未设置”的非法状态无法进入注册表；
//! - 线上格式 [`RawRetryPolicy`] 保留两个可选子对象，仅作为解码中间态，唯一的转换入口是 [`validate`]。
//!
//! ## 行为契约（What）
//! - [`validate`] 是纯函数：无 I/O、无共享状态，相同输入得到相同结果；
//! - 返回 `Ok` 当且仅当恰好设置了 `backup_policy` 与 `failure_policy` 中的一个。
//!
//! ## 风险提示（Trade-offs）
//! - 本模块只描述策略“数据”；退避等待的计算与重试调度属于调用链上的执行器。

use std::{collections::BTreeSet, time::Duration};

use serde::Deserialize;

use crate::error::PolicyRejection;

/// 单个方法上生效的重试策略。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// 主请求迟迟未返回时发出影子请求。
    Backup(BackupPolicy),
    /// 观察到失败或超时后重新发起请求。
    Failure(FailurePolicy),
}

impl RetryPolicy {
    /// 策略种类的稳定名称，用于日志字段。
    pub fn kind(&self) -> &'static str {
        match self {
            RetryPolicy::Backup(_) => "backup",
            RetryPolicy::Failure(_) => "failure",
        }
    }

    pub fn as_backup(&self) -> Option<&BackupPolicy> {
        match self {
            RetryPolicy::Backup(policy) => Some(policy),
            RetryPolicy::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FailurePolicy> {
        match self {
            RetryPolicy::Failure(policy) => Some(policy),
            RetryPolicy::Backup(_) => None,
        }
    }
}

impl TryFrom<RawRetryPolicy> for RetryPolicy {
    type Error = PolicyRejection;

    fn try_from(raw: RawRetryPolicy) -> Result<Self, Self::Error> {
        validate(raw)
    }
}

/// 备份请求策略。
///
/// - `delay`：主请求发出后等待多久再发影子请求，线上字段 `delay_ms`（兼容 `retry_delay_ms`），缺省为 0；
/// - `max_in_flight`：同时在途的影子请求上限，缺省为 1；
/// - `retry_same_node`：是否允许影子请求命中与主请求相同的节点。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BackupPolicy {
    #[serde(default, rename = "delay_ms", alias = "retry_delay_ms", with = "duration_ms")]
    pub delay: Duration,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u32,
    #[serde(default)]
    pub retry_same_node: bool,
}

fn default_max_in_flight() -> u32 {
    1
}

/// 失败重试策略。
///
/// # 契约说明
/// - `max_attempts`：重新发起的最大次数（不含首次调用），线上字段兼容 `max_retry_times`；
/// - `max_duration`：整次调用（含重试）的总耗时上限，缺省表示不限制；
/// - `backoff`：两次重试之间的退避形态；
/// - `retryable`：可重试错误分类器。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    #[serde(alias = "max_retry_times")]
    pub max_attempts: u32,
    #[serde(rename = "max_duration_ms", with = "option_duration_ms")]
    pub max_duration: Option<Duration>,
    pub backoff: BackoffPolicy,
    #[serde(rename = "retryable_errors")]
    pub retryable: RetryableClassifier,
    pub retry_same_node: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            max_duration: None,
            backoff: BackoffPolicy::default(),
            retryable: RetryableClassifier::default(),
            retry_same_node: false,
        }
    }
}

/// 退避形态，仅描述参数，不计算等待时长。
///
/// 线上格式使用 `type` 标签，例如 `{"type": "fixed", "delay_ms": 20}`；省略的时长字段按 0 处理。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// 立即重试。
    #[default]
    #[serde(rename = "none")]
    Immediate,
    Fixed {
        #[serde(default, rename = "delay_ms", with = "duration_ms")]
        delay: Duration,
    },
    /// 在 `[min, max]` 区间内随机等待；解码时若两端颠倒会自动交换。
    Random {
        #[serde(default, rename = "min_ms", with = "duration_ms")]
        min: Duration,
        #[serde(default, rename = "max_ms", with = "duration_ms")]
        max: Duration,
    },
    Exponential {
        #[serde(default, rename = "base_ms", with = "duration_ms")]
        base: Duration,
        #[serde(default, rename = "max_ms", with = "duration_ms")]
        max: Duration,
    },
}

impl BackoffPolicy {
    fn normalized(self) -> Self {
        match self {
            BackoffPolicy::Random { min, max } if min > max => {
                BackoffPolicy::Random { min: max, max: min }
            }
            other => other,
        }
    }
}

/// 可重试的错误类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryableErrorKind {
    Timeout,
    Unavailable,
    ResourceExhausted,
    ConnectionReset,
}

/// 可重试错误分类器。
///
/// 空集合表示沿用框架默认分类：只重试超时。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RetryableClassifier {
    kinds: BTreeSet<RetryableErrorKind>,
}

impl RetryableClassifier {
    pub fn new<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = RetryableErrorKind>,
    {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// 判断该类错误是否应触发重试。
    pub fn is_retryable(&self, kind: RetryableErrorKind) -> bool {
        if self.kinds.is_empty() {
            kind == RetryableErrorKind::Timeout
        } else {
            self.kinds.contains(&kind)
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = RetryableErrorKind> + '_ {
        self.kinds.iter().copied()
    }
}

/// 线上格式的单条策略：两个可选子对象，必须经 [`validate`] 才能成为 [`RetryPolicy`]。
///
/// 未知字段被忽略，保证新版本配置中心下发的扩展字段不会导致整批丢弃。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RawRetryPolicy {
    #[serde(default)]
    pub backup_policy: Option<BackupPolicy>,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
}

/// 校验线上策略并构造封闭的 [`RetryPolicy`]。
///
/// # 教案式说明
/// - **意图 (Why)**：在策略进入注册表之前拦截结构非法的配置，避免其影响线上调用；
/// - **契约 (What)**：
///   - 两者同时设置 → [`PolicyRejection::MutuallyExclusive`]；
///   - 两者均未设置 → [`PolicyRejection::Missing`]；
///   - 恰好设置一个 → `Ok`，随机退避区间在此处归一化；
/// - **执行 (How)**：按值消费输入，直接移动子对象，不产生额外分配。
pub fn validate(raw: RawRetryPolicy) -> Result<RetryPolicy, PolicyRejection> {
    match (raw.backup_policy, raw.failure_policy) {
        (Some(_), Some(_)) => Err(PolicyRejection::MutuallyExclusive),
        (None, None) => Err(PolicyRejection::Missing),
        (Some(backup), None) => Ok(RetryPolicy::Backup(backup)),
        (None, Some(mut failure)) => {
            failure.backoff = failure.backoff.normalized();
            Ok(RetryPolicy::Failure(failure))
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn backup(delay_ms: u64) -> BackupPolicy {
        BackupPolicy {
            delay: Duration::from_millis(delay_ms),
            max_in_flight: 1,
            retry_same_node: false,
        }
    }

    fn failure(max_attempts: u32) -> FailurePolicy {
        FailurePolicy {
            max_attempts,
            ..FailurePolicy::default()
        }
    }

    #[test]
    fn both_variants_are_mutually_exclusive() {
        let raw = RawRetryPolicy {
            backup_policy: Some(backup(100)),
            failure_policy: Some(failure(3)),
        };
        assert_eq!(validate(raw), Err(PolicyRejection::MutuallyExclusive));
    }

    #[test]
    fn empty_policy_is_rejected() {
        assert_eq!(
            validate(RawRetryPolicy::default()),
            Err(PolicyRejection::Missing)
        );
    }

    #[test]
    fn random_backoff_bounds_are_normalized() {
        let raw = RawRetryPolicy {
            backup_policy: None,
            failure_policy: Some(FailurePolicy {
                backoff: BackoffPolicy::Random {
                    min: Duration::from_millis(50),
                    max: Duration::from_millis(10),
                },
                ..FailurePolicy::default()
            }),
        };
        let policy = RetryPolicy::try_from(raw).unwrap();
        assert_eq!(
            policy.as_failure().unwrap().backoff,
            BackoffPolicy::Random {
                min: Duration::from_millis(10),
                max: Duration::from_millis(50),
            }
        );
    }

    #[test]
    fn failure_policy_fields_decode_from_wire_names() {
        let raw: RawRetryPolicy = serde_json::from_str(
            r#"{
                "failure_policy": {
                    "max_retry_times": 4,
                    "max_duration_ms": 1500,
                    "backoff": {"type": "exponential", "base_ms": 10, "max_ms": 200},
                    "retryable_errors": ["timeout", "unavailable"],
                    "retry_same_node": true,
                    "cb_policy": {"error_rate": 0.1}
                }
            }"#,
        )
        .unwrap();
        let policy = validate(raw).unwrap();
        let failure = policy.as_failure().unwrap();
        assert_eq!(failure.max_attempts, 4);
        assert_eq!(failure.max_duration, Some(Duration::from_millis(1500)));
        assert_eq!(
            failure.backoff,
            BackoffPolicy::Exponential {
                base: Duration::from_millis(10),
                max: Duration::from_millis(200),
            }
        );
        assert!(failure.retryable.is_retryable(RetryableErrorKind::Unavailable));
        assert!(!failure.retryable.is_retryable(RetryableErrorKind::ConnectionReset));
        assert!(failure.retry_same_node);
    }

    #[test]
    fn backup_policy_accepts_legacy_delay_name() {
        let raw: RawRetryPolicy =
            serde_json::from_str(r#"{"backup_policy": {"retry_delay_ms": 30}}"#).unwrap();
        let policy = validate(raw).unwrap();
        assert_eq!(policy.kind(), "backup");
        assert_eq!(policy.as_backup().unwrap(), &backup(30));
    }

    #[test]
    fn bare_backup_policy_is_a_set_variant() {
        let raw: RawRetryPolicy = serde_json::from_str(r#"{"backup_policy": {}}"#).unwrap();
        let policy = validate(raw).unwrap();
        assert_eq!(policy.as_backup().unwrap(), &backup(0));
    }

    #[test]
    fn omitted_backoff_durations_default_to_zero() {
        let raw: RawRetryPolicy = serde_json::from_str(
            r#"{"failure_policy": {"backoff": {"type": "random", "max_ms": 40}}}"#,
        )
        .unwrap();
        let policy = validate(raw).unwrap();
        assert_eq!(
            policy.as_failure().unwrap().backoff,
            BackoffPolicy::Random {
                min: Duration::ZERO,
                max: Duration::from_millis(40),
            }
        );
    }

    #[test]
    fn empty_classifier_retries_timeouts_only() {
        let classifier = RetryableClassifier::default();
        assert!(classifier.is_retryable(RetryableErrorKind::Timeout));
        assert!(!classifier.is_retryable(RetryableErrorKind::Unavailable));
    }

    proptest! {
        #[test]
        fn prop_validate_accepts_exactly_one_variant(
            with_backup in any::<bool>(),
            with_failure in any::<bool>(),
            delay_ms in 0u64..10_000,
            attempts in 0u32..16,
        ) {
            let raw = RawRetryPolicy {
                backup_policy: with_backup.then(|| backup(delay_ms)),
                failure_policy: with_failure.then(|| failure(attempts)),
            };
            prop_assert_eq!(validate(raw.clone()).is_ok(), with_backup != with_failure);
            prop_assert_eq!(validate(raw.clone()), validate(raw));
        }
    }
}
