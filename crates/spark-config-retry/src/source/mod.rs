//! # 外部配置中心边界
//!
//! ## 定位与职责（Why）
//! - 长轮询/推送协议与服务端存储均属于配置中心客户端，本 crate 只约定回调注册与注销两个入口；
//! - [`ConfigParam`] 描述一份配置在配置中心中的坐标（`group` + `data_id`）与负载格式。
//!
//! ## 契约（What）
//! - [`ConfigCenter::register_config_callback`] 之后，配置中心可在任意线程、任意次数地调用回调；
//! - [`ConfigCenter::deregister_config`] 停止后续投递，可能因配置中心不可达而失败。

use std::{fmt, sync::Arc};

use crate::{
    document::{ConfigDecoder, ConfigFormat},
    error::ConfigCenterError,
};

pub mod memory;

pub use memory::MemoryConfigCenter;

/// 未显式指定时使用的配置分组。
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// 配置中心推送回调：参数为原始负载与配置中心提供的解码器。
///
/// 回调没有返回通道，处理结果只能通过日志观测。
pub type ConfigCallback = Arc<dyn Fn(&str, &dyn ConfigDecoder) + Send + Sync>;

/// 在默认参数生成之后对 [`ConfigParam`] 做定制的函数，按传入顺序依次执行。
pub type CustomFunction = Box<dyn Fn(&mut ConfigParam) + Send + Sync>;

/// 构造 [`ConfigParam`] 的输入。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigParamConfig {
    /// 配置类别，例如 `retry_config`。
    pub category: String,
    /// 本地客户端身份，可为空。
    pub client_service_name: String,
    /// 目标服务名。
    pub server_service_name: String,
}

/// 一份配置在配置中心中的坐标。
///
/// # 契约说明
/// - 缺省 `data_id` 为 `{client}.{server}.{category}`，空的组成部分被省略；
/// - 缺省 `group` 为 [`DEFAULT_GROUP`]，缺省格式为 JSON；
/// - `(group, data_id)` 唯一确定一份配置。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigParam {
    pub data_id: String,
    pub group: String,
    pub category: String,
    pub client_service_name: String,
    pub server_service_name: String,
    pub format: ConfigFormat,
}

impl ConfigParam {
    /// 生成缺省参数后依次执行定制函数。
    pub fn new(config: ConfigParamConfig, customs: &[CustomFunction]) -> Self {
        let data_id = [
            config.client_service_name.as_str(),
            config.server_service_name.as_str(),
            config.category.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".");

        let mut param = Self {
            data_id,
            group: DEFAULT_GROUP.to_owned(),
            category: config.category,
            client_service_name: config.client_service_name,
            server_service_name: config.server_service_name,
            format: ConfigFormat::default(),
        };
        for custom in customs {
            custom(&mut param);
        }
        param
    }

    /// `group/data_id` 形式的配置键，用于日志与错误上下文。
    pub fn config_key(&self) -> String {
        format!("{}/{}", self.group, self.data_id)
    }
}

impl fmt::Display for ConfigParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.group, self.data_id, self.format)
    }
}

/// 配置中心客户端契约。
///
/// # 线程安全
/// - Trait 要求 `Send + Sync`，订阅句柄以 `Arc<dyn ConfigCenter>` 持有，可在客户端关闭钩子中跨线程调用。
pub trait ConfigCenter: Send + Sync {
    /// 为 `(destination, config_key)` 注册推送回调。
    fn register_config_callback(
        &self,
        destination: &str,
        config_key: &str,
        param: &ConfigParam,
        callback: ConfigCallback,
    ) -> Result<(), ConfigCenterError>;

    /// 注销 `param` 对应的全部回调。
    fn deregister_config(&self, param: &ConfigParam) -> Result<(), ConfigCenterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_config(client: &str) -> ConfigParamConfig {
        ConfigParamConfig {
            category: "retry_config".to_owned(),
            client_service_name: client.to_owned(),
            server_service_name: "echo-service".to_owned(),
        }
    }

    #[test]
    fn default_param_joins_non_empty_parts() {
        let param = ConfigParam::new(retry_config(""), &[]);
        assert_eq!(param.data_id, "echo-service.retry_config");
        assert_eq!(param.group, DEFAULT_GROUP);
        assert_eq!(param.format, ConfigFormat::Json);

        let param = ConfigParam::new(retry_config("gateway"), &[]);
        assert_eq!(param.data_id, "gateway.echo-service.retry_config");
        assert_eq!(param.config_key(), "DEFAULT_GROUP/gateway.echo-service.retry_config");
    }

    #[test]
    fn custom_functions_run_in_order() {
        let customs: Vec<CustomFunction> = vec![
            Box::new(|param: &mut ConfigParam| param.group = "rpc".to_owned()),
            Box::new(|param: &mut ConfigParam| {
                param.format = ConfigFormat::Toml;
                param.group.push_str("-prod");
            }),
        ];
        let param = ConfigParam::new(retry_config(""), &customs);
        assert_eq!(param.group, "rpc-prod");
        assert_eq!(param.format, ConfigFormat::Toml);
        assert_eq!(param.to_string(), "rpc-prod/echo-service.retry_config (toml)");
    }
}
