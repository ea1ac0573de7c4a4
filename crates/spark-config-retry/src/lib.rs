#![deny(unsafe_code)]

//! # spark-config-retry
//!
//! ## 定位与职责（Why）
//! - 让 RPC 客户端在不重启、不断连的前提下，按方法动态调整调用重试策略：订阅远端配置中心，
//!   把推送的策略经过解码与校验后原子地发布到每次出站调用都会读取的注册表；
//! - 策略的执行（重试调度、退避、熔断）属于调用链上的执行器，本 crate 只负责策略数据一致、安全地到达执行层。
//!
//! ## 架构嵌入（Where）
//! - `policy`：封闭的 Backup/Failure 策略和类型与纯函数校验器；
//! - `document`：策略文档与可插拔解码器；
//! - `registry`：按方法索引、并发读单写的策略注册表；
//! - `pipeline`：解码 → 校验 → 应用的更新管道；
//! - `source` / `subscription`：配置中心边界与订阅生命周期；
//! - `suite` / `options`：面向客户端的装配入口与静态选项；
//! - `observability`：`tracing` 订阅器的安装入口。
//!
//! ## 数据流
//! 配置中心 → 原始负载 → [`UpdatePipeline`]（解码 → 校验 → 应用）→ [`PolicyRegistry`] → 调用链执行器按方法读取。

pub mod document;
pub mod error;
pub mod observability;
pub mod options;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod source;
pub mod subscription;
pub mod suite;

pub use document::{ConfigDecoder, ConfigFormat, PolicyDocument, SerdeDecoder};
pub use error::{
    ConfigCenterError, DecodeError, ObservabilityError, OptionsError, PolicyRejection,
    SubscriptionError,
};
pub use options::{RETRY_CONFIG_CATEGORY, RetryConfigOptions};
pub use pipeline::{RegistryMutation, RejectedEntry, UpdatePipeline, UpdateReport, plan_update};
pub use policy::{
    BackoffPolicy, BackupPolicy, FailurePolicy, RawRetryPolicy, RetryPolicy, RetryableClassifier,
    RetryableErrorKind, validate,
};
pub use registry::PolicyRegistry;
pub use source::{
    ConfigCallback, ConfigCenter, ConfigParam, ConfigParamConfig, CustomFunction, DEFAULT_GROUP,
    MemoryConfigCenter,
};
pub use subscription::{RetrySubscription, ShutdownHook, subscribe};
pub use suite::{RetryClientOptions, RetryClientSuite, with_retry_policy};
