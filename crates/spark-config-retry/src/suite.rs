//! # 客户端装配
//!
//! ## 定位与职责（Why）
//! - 把“创建注册表 → 构造配置坐标 → 订阅更新管道 → 登记关闭回调”的固定流程收敛为一个入口，
//!   RPC 客户端只需拿走注册表与关闭回调；
//! - 注册表交给调用链按方法查询，关闭回调挂到客户端的 close 流程上。
//!
//! ## 契约（What）
//! - 每次构建产出一个新的 [`PolicyRegistry`]，由客户端独占；
//! - [`RetryClientOptions::close`] 执行全部关闭回调并收集非致命错误，不会因第一个失败而中断。

use std::sync::Arc;

use tracing::warn;

use crate::{
    error::SubscriptionError,
    options::RetryConfigOptions,
    pipeline::UpdatePipeline,
    registry::PolicyRegistry,
    source::{ConfigCenter, ConfigParam, CustomFunction},
    subscription::{RetrySubscription, ShutdownHook, subscribe},
};

/// 为目标服务启用动态重试的构建器。
pub struct RetryClientSuite {
    destination: String,
    client: String,
    center: Arc<dyn ConfigCenter>,
    options: RetryConfigOptions,
    customs: Vec<CustomFunction>,
}

impl RetryClientSuite {
    /// `destination` 为目标服务名，`center` 为配置中心客户端。
    pub fn new(destination: impl Into<String>, center: Arc<dyn ConfigCenter>) -> Self {
        Self {
            destination: destination.into(),
            client: String::new(),
            center,
            options: RetryConfigOptions::default(),
            customs: Vec::new(),
        }
    }

    /// 设置本地客户端身份，参与缺省 `data_id` 的拼接。
    pub fn client_identity(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn options(mut self, options: RetryConfigOptions) -> Self {
        self.options = options;
        self
    }

    /// 追加一个配置坐标定制函数。
    pub fn custom<F>(mut self, custom: F) -> Self
    where
        F: Fn(&mut ConfigParam) + Send + Sync + 'static,
    {
        self.customs.push(Box::new(custom));
        self
    }

    /// 订阅配置中心并返回客户端需要的装配结果。
    ///
    /// # 实现步骤（How）
    /// 1. 依据选项与定制函数构造 [`ConfigParam`]；
    /// 2. 创建空注册表与绑定它的 [`UpdatePipeline`]；
    /// 3. 以选项中的类别作为配置键完成订阅；注册失败直接返回；
    /// 4. 把订阅的 [`ShutdownHook`] 登记为关闭回调。
    pub fn build(self) -> Result<RetryClientOptions, SubscriptionError> {
        let param = self
            .options
            .config_param(&self.destination, &self.client, &self.customs);
        let container = PolicyRegistry::new();
        let pipeline = UpdatePipeline::new(
            self.destination.as_str(),
            param.format,
            container.clone(),
        );
        let subscription = subscribe(
            self.center,
            self.destination.as_str(),
            self.options.category.as_str(),
            param,
            pipeline,
        )?;

        Ok(RetryClientOptions {
            close_callbacks: vec![subscription.shutdown_hook()],
            container,
            subscription,
        })
    }
}

/// 以缺省选项为 `destination` 启用动态重试。
pub fn with_retry_policy(
    destination: &str,
    center: Arc<dyn ConfigCenter>,
    customs: Vec<CustomFunction>,
) -> Result<RetryClientOptions, SubscriptionError> {
    let mut suite = RetryClientSuite::new(destination, center);
    suite.customs = customs;
    suite.build()
}

/// 交给 RPC 客户端的装配结果。
///
/// # 契约说明
/// - `container`：调用链每次出站请求按方法查询的注册表；
/// - `close_callbacks`：客户端关闭时必须恰好执行一次的拆除回调。
pub struct RetryClientOptions {
    container: PolicyRegistry,
    subscription: RetrySubscription,
    close_callbacks: Vec<ShutdownHook>,
}

impl RetryClientOptions {
    pub fn container(&self) -> &PolicyRegistry {
        &self.container
    }

    pub fn subscription(&self) -> &RetrySubscription {
        &self.subscription
    }

    /// 取走关闭回调，交由客户端自己的关闭流程执行。
    pub fn take_close_callbacks(&mut self) -> Vec<ShutdownHook> {
        std::mem::take(&mut self.close_callbacks)
    }

    /// 执行全部关闭回调，返回收集到的非致命错误。
    pub fn close(mut self) -> Vec<SubscriptionError> {
        let mut errors = Vec::new();
        for hook in self.take_close_callbacks() {
            if let Err(err) = hook() {
                warn!(
                    destination = self.subscription.destination(),
                    error = %err,
                    "close callback failed, continue shutdown"
                );
                errors.push(err);
            }
        }
        errors
    }
}

impl std::fmt::Debug for RetryClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryClientOptions")
            .field("container", &self.container)
            .field("subscription", &self.subscription)
            .field("close_callbacks", &self.close_callbacks.len())
            .finish()
    }
}
