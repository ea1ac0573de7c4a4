use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    document::{ConfigDecoder, SerdeDecoder},
    error::ConfigCenterError,
};

use super::{ConfigCallback, ConfigCenter, ConfigParam};

type ConfigId = (String, String);

/// 进程内配置中心，供本地开发与测试使用。
///
/// # 教案式解读
/// - **意图（Why）**：
///   - 在没有远端配置中心的环境下复现“注册即下发当前值、发布即推送”的语义；
///   - 通过 `set_reachable(false)` 模拟网络中断，验证注销失败时的尽力而为清理。
/// - **实现策略（How）**：
///   - 以 `(group, data_id)` 为键保存最新内容与回调列表，`parking_lot::Mutex` 保护内部状态；
///   - 回调在释放锁之后执行，回调内部可以安全地再次访问本结构。
///
/// # 契约说明
/// - `register_config_callback` 成功后，若该配置已有内容，立即在调用线程上投递一次；
/// - `deregister_config` 对未注册的配置返回 `Ok(())`；
/// - 不可达状态下注册与注销均返回 [`ConfigCenterError::Unreachable`]，发布不受影响。
#[derive(Clone, Default)]
pub struct MemoryConfigCenter {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: Mutex<MemoryState>,
    unreachable: AtomicBool,
    decoder: SerdeDecoder,
}

#[derive(Default)]
struct MemoryState {
    contents: HashMap<ConfigId, String>,
    listeners: HashMap<ConfigId, Vec<ConfigCallback>>,
}

impl MemoryConfigCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布新内容并推送给全部回调，返回被通知的回调数量。
    pub fn publish(&self, group: &str, data_id: &str, content: &str) -> usize {
        let id = (group.to_owned(), data_id.to_owned());
        let callbacks = {
            let mut state = self.inner.state.lock();
            state.contents.insert(id.clone(), content.to_owned());
            state.listeners.get(&id).cloned().unwrap_or_default()
        };
        debug!(group, data_id, listeners = callbacks.len(), "config published");
        let decoder: &dyn ConfigDecoder = &self.inner.decoder;
        for callback in &callbacks {
            callback(content, decoder);
        }
        callbacks.len()
    }

    /// 按 [`ConfigParam`] 坐标发布。
    pub fn publish_to(&self, param: &ConfigParam, content: &str) -> usize {
        self.publish(&param.group, &param.data_id, content)
    }

    /// 切换可达性，用于模拟配置中心故障。
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.unreachable.store(!reachable, Ordering::Release);
    }

    /// 当前为 `param` 注册的回调数量。
    pub fn listener_count(&self, param: &ConfigParam) -> usize {
        let state = self.inner.state.lock();
        state
            .listeners
            .get(&config_id(param))
            .map_or(0, Vec::len)
    }

    fn ensure_reachable(&self) -> Result<(), ConfigCenterError> {
        if self.inner.unreachable.load(Ordering::Acquire) {
            return Err(ConfigCenterError::Unreachable {
                detail: "memory config center is offline".to_owned(),
            });
        }
        Ok(())
    }
}

fn config_id(param: &ConfigParam) -> ConfigId {
    (param.group.clone(), param.data_id.clone())
}

impl ConfigCenter for MemoryConfigCenter {
    fn register_config_callback(
        &self,
        destination: &str,
        config_key: &str,
        param: &ConfigParam,
        callback: ConfigCallback,
    ) -> Result<(), ConfigCenterError> {
        self.ensure_reachable()?;
        let id = config_id(param);
        let current = {
            let mut state = self.inner.state.lock();
            state
                .listeners
                .entry(id.clone())
                .or_default()
                .push(Arc::clone(&callback));
            state.contents.get(&id).cloned()
        };
        debug!(destination, config_key, param = %param, "config listener registered");
        if let Some(content) = current {
            let decoder: &dyn ConfigDecoder = &self.inner.decoder;
            callback(&content, decoder);
        }
        Ok(())
    }

    fn deregister_config(&self, param: &ConfigParam) -> Result<(), ConfigCenterError> {
        self.ensure_reachable()?;
        let removed = self.inner.state.lock().listeners.remove(&config_id(param));
        debug!(
            param = %param,
            listeners = removed.map_or(0, |callbacks| callbacks.len()),
            "config listener deregistered"
        );
        Ok(())
    }
}

impl fmt::Debug for MemoryConfigCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemoryConfigCenter")
            .field("configs", &state.contents.len())
            .field("listeners", &state.listeners.len())
            .field("reachable", &!self.inner.unreachable.load(Ordering::Acquire))
            .finish()
    }
}
