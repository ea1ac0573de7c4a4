//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为重试策略热更新链路暴露的错误语义提供集中定义；
//! - 区分“整批丢弃”（解码失败）、“单条跳过”（策略校验失败）与“尽力而为”（注销失败）三类处理策略，
//!   方便调用方与运维按类别观测。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，兼容 `std::error::Error`；
//! - 本模块内的错误均不会触发自动重试：配置中心会在修正数据后自行重新推送。

use thiserror::Error;

use crate::document::ConfigFormat;

/// 配置负载的解码错误。
///
/// # 教案式说明
/// - **意图 (Why)**：负载在声明格式下不可解析时，整批更新必须被丢弃，注册表保持原状；
/// - **契约 (What)**：`Syntax` 携带格式与底层解析器给出的描述；`UnsupportedFormat` 表示格式名无法识别；
/// - **风险 (Trade-offs)**：底层错误以字符串保存，牺牲结构化信息换取 `Clone + Eq`，便于在报告中传递与断言。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecodeError {
    /// 负载不是合法的 `format` 文档，或文档结构与策略模式不符。
    #[error("payload is not a valid {format} retry document: {detail}")]
    Syntax { format: ConfigFormat, detail: String },

    /// 配置参数声明了无法识别的格式名。
    #[error("unsupported config format `{format}`")]
    UnsupportedFormat { format: String },
}

/// 单条策略被拒绝的原因。
///
/// # 教案式说明
/// - **意图 (Why)**：策略校验失败只影响当前方法，批次中的其它条目继续应用；
/// - **契约 (What)**：`MutuallyExclusive` 与 `Missing` 由校验器产出，`EmptyMethod` 由更新管道在检查方法名时产出；
/// - **风险 (Trade-offs)**：被拒绝方法沿用旧策略，若配置长期错误需要依赖告警发现。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error)]
pub enum PolicyRejection {
    /// `backup_policy` 与 `failure_policy` 同时设置。
    #[error("backup_policy and failure_policy are mutually exclusive")]
    MutuallyExclusive,

    /// 两者均未设置。
    #[error("one of backup_policy and failure_policy must be specified")]
    Missing,

    /// 方法名为空字符串。
    #[error("method name must not be empty")]
    EmptyMethod,
}

/// 外部配置中心返回的错误。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigCenterError {
    /// 配置中心不可达（网络中断、服务端下线等）。
    #[error("config center is unreachable: {detail}")]
    Unreachable { detail: String },

    /// 配置中心拒绝了请求。
    #[error("config center rejected the request: {detail}")]
    Rejected { detail: String },
}

/// 订阅生命周期中的错误。
///
/// # 教案式说明
/// - **意图 (Why)**：为注册/注销失败附加目标服务与配置键，便于在客户端关闭日志中定位；
/// - **契约 (What)**：`Deregister` 为非致命错误，调用方记录后继续关闭流程；
/// - **执行 (How)**：底层 [`ConfigCenterError`] 通过 `#[source]` 保留在错误链上。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SubscriptionError {
    #[error("failed to register retry config listener for `{destination}` ({config_key})")]
    Register {
        destination: String,
        config_key: String,
        #[source]
        source: ConfigCenterError,
    },

    #[error("failed to deregister retry config listener for `{destination}` ({config_key})")]
    Deregister {
        destination: String,
        config_key: String,
        #[source]
        source: ConfigCenterError,
    },
}

impl SubscriptionError {
    /// 是否为致命错误：注册失败意味着动态重试未生效，注销失败只需记录后继续关闭。
    pub fn is_fatal(&self) -> bool {
        matches!(self, SubscriptionError::Register { .. })
    }
}

/// 静态选项解析错误。
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid retry config options: {0}")]
    Toml(#[from] toml::de::Error),
}

/// 日志订阅器安装错误。
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// 外部已设置全局 `tracing` Subscriber。
    #[error("a global tracing subscriber has already been set")]
    SubscriberAlreadySet,

    /// `tracing-subscriber` 初始化失败。
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}
