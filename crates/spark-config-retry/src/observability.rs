//! 日志订阅器的便捷安装入口。
//!
//! # 教案式说明
//! - **意图（Why）**：本 crate 的诊断全部通过 `tracing` 宏输出，宿主若尚未配置 Subscriber，
//!   可调用 [`install_default_subscriber`] 获得 `fmt` 输出与 `RUST_LOG` 过滤；
//! - **契约（What）**：只允许安装一次；外部已设置全局 Subscriber 时返回
//!   [`ObservabilityError::SubscriberAlreadySet`]，不覆盖宿主配置。

use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::ObservabilityError;

/// 未设置 `RUST_LOG` 时的默认过滤级别。
pub const DEFAULT_LOG_FILTER: &str = "info";

/// 安装 `fmt + EnvFilter` 组合的全局 Subscriber。
pub fn install_default_subscriber() -> Result<(), ObservabilityError> {
    if dispatcher::has_been_set() {
        return Err(ObservabilityError::SubscriberAlreadySet);
    }
    tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
