//! # PolicyRegistry：按方法索引的重试策略容器
//!
//! ## 核心意图（Why）
//! - 每次出站调用都会按方法名读取当前策略，读路径需要在任意并发下保持无锁或仅持分片读锁；
//! - 写路径只来自更新管道，每个方法独立覆盖，后写者胜出，不需要跨方法的事务。
//!
//! ## 行为契约（What）
//! - `get`：未配置过的方法返回 `None`，调用方回退到框架默认（不重试）行为；
//! - `set`：替换该方法的策略，调用返回后发起的 `get` 必然观察到新值（`DashMap` 分片锁提供 happens-before）；
//! - 不提供删除操作：策略只会被替换或保持原样；
//! - `epoch`：每提交一批非空更新递增一次，仅用于观测，不参与读写同步。
//!
//! ## 风险提示（Trade-offs）
//! - `get` 返回 `Arc` 克隆而非 guard，避免调用方长期持有分片读锁阻塞写入；
//! - 注册表由创建它的客户端独占，回调只持有克隆句柄用于写入，没有替换整个注册表的入口。

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;

use crate::policy::RetryPolicy;

/// 单个目标服务的重试策略注册表。
///
/// # 教案式注释
/// - **意图 (Why)**：封装 `DashMap`，统一对外暴露读写接口，避免调用链直接依赖底层并发映射；
/// - **契约 (What)**：`Clone` 得到的句柄共享同一张表，可在调用链与配置回调之间传递；
/// - **风险 (Trade-offs)**：条目只增不减，长期运行时方法集合以配置中心下发过的为上限。
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    policies: DashMap<Arc<str>, Arc<RetryPolicy>>,
    epoch: AtomicU64,
}

impl PolicyRegistry {
    /// 构造空的注册表。
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询方法当前生效的策略。
    pub fn get(&self, method: &str) -> Option<Arc<RetryPolicy>> {
        self.inner
            .policies
            .get(method)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 替换方法的策略，返回被替换的旧值。
    ///
    /// - **前置条件**：`policy` 已经过校验；[`RetryPolicy`] 的构造方式保证了这一点；
    /// - **后置条件**：返回后其它线程的 `get` 观察到新策略。
    pub fn set(
        &self,
        method: impl Into<Arc<str>>,
        policy: RetryPolicy,
    ) -> Option<Arc<RetryPolicy>> {
        self.inner.policies.insert(method.into(), Arc::new(policy))
    }

    /// 顺序应用一批已校验的条目，返回写入条数。
    ///
    /// 条目按迭代顺序逐个提交，第 N+1 条在第 N 条生效之后才写入；写入至少一条时纪元加一。
    pub fn apply<I>(&self, accepted: I) -> usize
    where
        I: IntoIterator<Item = (String, RetryPolicy)>,
    {
        let mut applied = 0;
        for (method, policy) in accepted {
            self.set(method, policy);
            applied += 1;
        }
        if applied > 0 {
            self.inner.epoch.fetch_add(1, Ordering::Release);
        }
        applied
    }

    /// 已提交的非空更新批次数。
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    /// 已配置过策略的方法名，按字典序排列。
    pub fn methods(&self) -> Vec<Arc<str>> {
        let mut methods: Vec<_> = self
            .inner
            .policies
            .iter()
            .map(|entry| Arc::clone(entry.key()))
            .collect();
        methods.sort();
        methods
    }

    /// 当前全部策略的有序快照。
    ///
    /// 快照逐分片读取，不与并发写入构成原子视图；用于诊断与测试比较。
    pub fn snapshot(&self) -> BTreeMap<Arc<str>, Arc<RetryPolicy>> {
        self.inner
            .policies
            .iter()
            .map(|entry| (Arc::clone(entry.key()), Arc::clone(entry.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.policies.is_empty()
    }
}
