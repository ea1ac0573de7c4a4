//! # 更新管道：解码 → 校验 → 应用
//!
//! ## 核心意图（Why）
//! - 配置中心在自己的通知线程上调用回调，回调内部只做同步、非阻塞的纯转换，随后逐条写入注册表；
//! - 将“负载 + 解码器 → 注册表变更”拆成纯函数 [`plan_update`]，无需网络或后台任务即可单元测试。
//!
//! ## 行为契约（What）
//! - 解码失败：记录目标服务与负载，整批丢弃，注册表不变；
//! - 单条校验失败：记录目标服务与方法，仅跳过该条，批次其余条目照常应用；
//! - 相同文档重复应用得到相同的注册表状态。
//!
//! ## 风险提示（Trade-offs）
//! - 不保存历史失败状态，也不自动重试；修正后的配置由配置中心重新推送。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    document::{ConfigDecoder, ConfigFormat, PolicyDocument},
    error::{DecodeError, PolicyRejection},
    policy::{RetryPolicy, validate},
    registry::PolicyRegistry,
};

/// 被拒绝的单条策略。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedEntry {
    pub method: String,
    pub reason: PolicyRejection,
}

/// 一次推送对注册表的待应用变更。
///
/// # 教案式说明
/// - **意图 (Why)**：把校验结果与写入动作解耦，写入前即可完整检查本批次的接受/拒绝情况；
/// - **契约 (What)**：`accepted` 保持文档顺序，且只包含已校验的 [`RetryPolicy`]。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryMutation {
    pub accepted: Vec<(String, RetryPolicy)>,
    pub rejected: Vec<RejectedEntry>,
}

impl RegistryMutation {
    /// 对文档逐条独立校验。
    pub fn from_document(document: PolicyDocument) -> Self {
        let mut mutation = Self::default();
        for (method, raw) in document {
            let verdict = if method.is_empty() {
                Err(PolicyRejection::EmptyMethod)
            } else {
                validate(raw)
            };
            match verdict {
                Ok(policy) => mutation.accepted.push((method, policy)),
                Err(reason) => mutation.rejected.push(RejectedEntry { method, reason }),
            }
        }
        mutation
    }
}

/// 纯函数形式的更新规划：解码并校验，但不触碰注册表。
pub fn plan_update(
    format: ConfigFormat,
    raw: &str,
    decoder: &dyn ConfigDecoder,
) -> Result<RegistryMutation, DecodeError> {
    decoder
        .decode(format, raw)
        .map(RegistryMutation::from_document)
}

/// 单次回调的处理结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateReport {
    /// 负载无法解码，整批丢弃。
    Discarded { error: DecodeError },
    /// 负载已处理；`applied` 为写入条数，`rejected` 为被跳过的条目。
    Applied {
        applied: usize,
        rejected: Vec<RejectedEntry>,
    },
}

impl UpdateReport {
    pub fn applied(&self) -> usize {
        match self {
            UpdateReport::Applied { applied, .. } => *applied,
            UpdateReport::Discarded { .. } => 0,
        }
    }
}

/// 绑定到某个目标服务注册表的更新管道。
///
/// # 教案式注释
/// - **意图 (Why)**：作为配置中心回调的实体，持有注册表写句柄与负载格式；
/// - **契约 (What)**：`on_update` 可在任意线程并发调用，每个方法的写入由注册表保证原子性；
/// - **风险 (Trade-offs)**：两次推送竞争同一方法时以后应用者为准，不做版本栅栏。
#[derive(Clone, Debug)]
pub struct UpdatePipeline {
    destination: Arc<str>,
    format: ConfigFormat,
    registry: PolicyRegistry,
}

impl UpdatePipeline {
    pub fn new(
        destination: impl Into<Arc<str>>,
        format: ConfigFormat,
        registry: PolicyRegistry,
    ) -> Self {
        Self {
            destination: destination.into(),
            format,
            registry,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// 改用给定格式解码，其余绑定不变。
    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = format;
        self
    }

    /// 处理一次配置推送。
    ///
    /// # 实现步骤（How）
    /// 1. 通过 [`plan_update`] 解码并校验；解码失败记录告警后返回 [`UpdateReport::Discarded`]；
    /// 2. 逐条记录被拒绝的方法；
    /// 3. 按文档顺序把接受的条目写入注册表。
    pub fn on_update(&self, raw: &str, decoder: &dyn ConfigDecoder) -> UpdateReport {
        let RegistryMutation { accepted, rejected } = match plan_update(self.format, raw, decoder)
        {
            Ok(mutation) => mutation,
            Err(error) => {
                warn!(
                    destination = %self.destination,
                    payload = raw,
                    %error,
                    "unmarshal retry config failed, skip"
                );
                return UpdateReport::Discarded { error };
            }
        };

        for entry in &rejected {
            warn!(
                destination = %self.destination,
                method = %entry.method,
                reason = %entry.reason,
                "retry policy rejected, skip"
            );
        }

        let applied = self.registry.apply(accepted);
        debug!(
            destination = %self.destination,
            applied,
            rejected = rejected.len(),
            epoch = self.registry.epoch(),
            "retry policies updated"
        );
        UpdateReport::Applied { applied, rejected }
    }
}
