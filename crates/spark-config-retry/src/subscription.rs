//! # 订阅生命周期
//!
//! ## 核心意图（Why）
//! - 配置中心对每个 `(destination, config_key)` 维护一份回调登记，本模块把这份登记显式化为
//!   [`RetrySubscription`] 句柄，而不是依赖进程级全局状态，使生命周期与拆除动作可测试；
//! - 客户端关闭时通过 [`ShutdownHook`] 注销回调，注销失败不阻塞关闭流程。
//!
//! ## 行为契约（What）
//! - `subscribe` 成功后，更新管道会被配置中心在任意线程上调用零次或多次；
//! - `unsubscribe` 只有第一次调用会访问配置中心，之后的调用直接返回 `Ok(())`；
//! - 注销时已在途的推送仍可能完成写入，注册表随客户端一并丢弃，不影响正确性。

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info, warn};

use crate::{
    document::ConfigDecoder,
    error::SubscriptionError,
    pipeline::UpdatePipeline,
    source::{ConfigCallback, ConfigCenter, ConfigParam},
};

/// 客户端关闭时执行的零参数拆除回调。
pub type ShutdownHook = Box<dyn FnOnce() -> Result<(), SubscriptionError> + Send + 'static>;

/// 把更新管道注册为 `(destination, config_key)` 的推送回调。
///
/// # 教案式说明
/// - **意图 (Why)**：回调只持有管道（进而只持有注册表写句柄），不会替换注册表本身；
/// - **契约 (What)**：注册失败返回 [`SubscriptionError::Register`]，此时配置中心未保留任何回调；
///   负载格式以 `param.format` 为准，管道原有的格式会被覆盖；
/// - **执行 (How)**：把 [`UpdatePipeline::on_update`] 包装为 [`ConfigCallback`]，处理报告仅用于日志。
pub fn subscribe(
    center: Arc<dyn ConfigCenter>,
    destination: impl Into<Arc<str>>,
    config_key: impl Into<Arc<str>>,
    param: ConfigParam,
    pipeline: UpdatePipeline,
) -> Result<RetrySubscription, SubscriptionError> {
    let destination = destination.into();
    let config_key = config_key.into();
    let pipeline = pipeline.with_format(param.format);

    let callback: ConfigCallback = Arc::new(move |raw: &str, decoder: &dyn ConfigDecoder| {
        pipeline.on_update(raw, decoder);
    });

    center
        .register_config_callback(&destination, &config_key, &param, callback)
        .map_err(|source| SubscriptionError::Register {
            destination: destination.to_string(),
            config_key: config_key.to_string(),
            source,
        })?;
    info!(
        destination = %destination,
        config_key = %config_key,
        param = %param,
        "retry config listener registered"
    );

    Ok(RetrySubscription {
        inner: Arc::new(SubscriptionInner {
            center,
            destination,
            config_key,
            param,
            active: AtomicBool::new(true),
        }),
    })
}

/// 一次已生效的订阅。
///
/// # 教案式注释
/// - **意图 (Why)**：把“注册过回调”这一外部副作用变成可持有、可撤销的值；
/// - **契约 (What)**：`Clone` 后的句柄共享同一状态，任意句柄调用 `unsubscribe` 都只会真正注销一次；
/// - **风险 (Trade-offs)**：第一次注销失败后不再重试，配置中心侧可能残留监听，由其自身的会话过期回收。
#[derive(Clone)]
pub struct RetrySubscription {
    inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
    center: Arc<dyn ConfigCenter>,
    destination: Arc<str>,
    config_key: Arc<str>,
    param: ConfigParam,
    active: AtomicBool,
}

impl RetrySubscription {
    pub fn destination(&self) -> &str {
        &self.inner.destination
    }

    pub fn config_key(&self) -> &str {
        &self.inner.config_key
    }

    pub fn param(&self) -> &ConfigParam {
        &self.inner.param
    }

    /// 订阅是否仍处于登记状态。
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// 注销回调。
    ///
    /// - **前置条件**：无；从未收到推送的订阅同样可以注销；
    /// - **后置条件**：无论成功与否，句柄都转为非活跃，后续调用为空操作；
    /// - **返回值**：第一次注销失败时返回 [`SubscriptionError::Deregister`]，调用方记录后继续关闭。
    pub fn unsubscribe(&self) -> Result<(), SubscriptionError> {
        if !self.inner.active.swap(false, Ordering::AcqRel) {
            debug!(
                destination = %self.inner.destination,
                config_key = %self.inner.config_key,
                "retry config listener already cancelled"
            );
            return Ok(());
        }

        match self.inner.center.deregister_config(&self.inner.param) {
            Ok(()) => {
                info!(
                    destination = %self.inner.destination,
                    config_key = %self.inner.config_key,
                    "retry config listener cancelled"
                );
                Ok(())
            }
            Err(source) => {
                warn!(
                    destination = %self.inner.destination,
                    config_key = %self.inner.config_key,
                    error = %source,
                    "cancel retry config listener failed"
                );
                Err(SubscriptionError::Deregister {
                    destination: self.inner.destination.to_string(),
                    config_key: self.inner.config_key.to_string(),
                    source,
                })
            }
        }
    }

    /// 生成交给客户端关闭流程的拆除回调。
    pub fn shutdown_hook(&self) -> ShutdownHook {
        let subscription = self.clone();
        Box::new(move || subscription.unsubscribe())
    }
}

impl std::fmt::Debug for RetrySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrySubscription")
            .field("destination", &self.inner.destination)
            .field("config_key", &self.inner.config_key)
            .field("param", &self.inner.param)
            .field("active", &self.is_active())
            .finish()
    }
}
