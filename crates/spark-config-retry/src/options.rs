//! 动态重试的静态选项：决定去配置中心的哪个坐标订阅，以及负载的格式。
//!
//! 选项可以直接构造，也可以从宿主配置文件中的 TOML 片段解析，例如：
//!
//! ```toml
//! category = "retry_config"
//! group = "RPC_GROUP"
//! format = "toml"
//! ```

use serde::Deserialize;

use crate::{
    document::ConfigFormat,
    error::OptionsError,
    source::{ConfigParam, ConfigParamConfig, CustomFunction, DEFAULT_GROUP},
};

/// 重试策略在配置中心中的默认类别。
pub const RETRY_CONFIG_CATEGORY: &str = "retry_config";

/// 动态重试选项。
///
/// # 契约说明
/// - 所有字段均有缺省值，空的 TOML 片段得到 [`RetryConfigOptions::default`]；
/// - `data_id` 为空时沿用 [`ConfigParam`] 的缺省拼接规则；
/// - 选项先于 [`CustomFunction`] 生效，定制函数可以覆盖这里的任何字段。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfigOptions {
    pub category: String,
    pub group: String,
    pub format: ConfigFormat,
    pub data_id: Option<String>,
}

impl Default for RetryConfigOptions {
    fn default() -> Self {
        Self {
            category: RETRY_CONFIG_CATEGORY.to_owned(),
            group: DEFAULT_GROUP.to_owned(),
            format: ConfigFormat::Json,
            data_id: None,
        }
    }
}

impl RetryConfigOptions {
    /// 从 TOML 片段解析选项。
    pub fn from_toml_str(raw: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(raw)?)
    }

    /// 为目标服务构造配置坐标。
    ///
    /// `client` 为本地客户端身份，允许为空。
    pub fn config_param(
        &self,
        destination: &str,
        client: &str,
        customs: &[CustomFunction],
    ) -> ConfigParam {
        let mut param = ConfigParam::new(
            ConfigParamConfig {
                category: self.category.clone(),
                client_service_name: client.to_owned(),
                server_service_name: destination.to_owned(),
            },
            &[],
        );
        param.group.clone_from(&self.group);
        param.format = self.format;
        if let Some(data_id) = &self.data_id {
            param.data_id.clone_from(data_id);
        }
        for custom in customs {
            custom(&mut param);
        }
        param
    }
}
