use std::collections::HashMap;

use crate::models::{SourceKind, DEFAULT_CLIENT_RANK, DEFAULT_TRACKED_KEYS};
use crate::runtime::ClientRuntime;

pub mod diagnose;
pub mod inject;
pub mod payload;
pub mod resolver;
pub mod snapshot;

/// 配置管理器：对整个客户端运行时的一份惰性填充、可重载的解析视图。
/// 通过构造参数显式传递实例，不做模块级单例，测试可各建各的
pub struct ConfigManager {
    keys: Vec<String>,
    rank: Vec<SourceKind>,
    /// 首次解析后的缓存，缺失结果也缓存（强一致诉求走 reload）
    cache: HashMap<String, Option<String>>,
    /// 显式覆盖，优先于缓存与来源，直到下一次整体 reload
    overrides: HashMap<String, String>,
}

impl ConfigManager {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::with_rank(keys, DEFAULT_CLIENT_RANK.to_vec())
    }

    /// 排序是数据：调用方可替换默认优先级
    pub fn with_rank<I, K>(keys: I, rank: Vec<SourceKind>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            rank,
            cache: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    /// 默认跟踪键集合上的管理器
    pub fn with_default_keys() -> Self {
        Self::new(DEFAULT_TRACKED_KEYS.iter().copied())
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 解析单个键。覆盖 > 缓存 > 排序解析；缺失不是错误，返回 None
    pub fn get(&mut self, runtime: &ClientRuntime, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        if let Some(cached) = self.cache.get(key) {
            return cached.clone();
        }
        let resolved = self.resolve(runtime, key);
        self.cache.insert(key.to_string(), resolved.clone());
        resolved
    }

    /// 显式覆盖一个键，优先于缓存与来源，直到下一次 reload
    pub fn set(&mut self, key: &str, value: &str) {
        self.overrides.insert(key.to_string(), value.to_string());
    }

    /// 丢弃缓存与覆盖，立即重解析全部跟踪键。
    /// 消费者收到就绪通知后调用，补上构造时尚未注入的值
    pub fn reload(&mut self, runtime: &ClientRuntime) {
        self.overrides.clear();
        self.cache.clear();
        let keys = self.keys.clone();
        for key in keys {
            let resolved = self.resolve(runtime, &key);
            self.cache.insert(key, resolved);
        }
        tracing::debug!(keys = self.keys.len(), "管理器缓存已重建");
    }

    fn resolve(&self, runtime: &ClientRuntime, key: &str) -> Option<String> {
        let sources = resolver::ranked(&self.rank, Some(runtime));
        let refs = resolver::as_refs(&sources);
        resolver::resolve(key, &refs)
    }
}
