use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 默认跟踪的配置键集合，构建期固定
pub const DEFAULT_TRACKED_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "MATHPIX_APP_KEY",
    "PLOT_SERVICE_KEY",
];

/// 公共变量前缀：`PUBLIC_<KEY>` 形式的服务端变量
pub const PUBLIC_PREFIX: &str = "PUBLIC_";

/// 配置来源种类。排序即优先级，作为数据传递而非硬编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// 带公共前缀的服务端变量（PUBLIC_<KEY>）
    PublicEnv,
    /// 裸服务端变量（<KEY>）
    BareEnv,
    /// 客户端扁平全局命名空间
    ClientGlobal,
    /// 客户端类 process 环境命名空间
    ClientEnv,
    /// 框架注入的页面数据（侧通道）
    PageData,
}

/// 服务端快照构建使用的默认排序
pub const DEFAULT_SERVER_RANK: &[SourceKind] = &[SourceKind::PublicEnv, SourceKind::BareEnv];

/// 客户端管理器使用的默认排序：先查注入后的命名空间，再回落到服务端变量
/// （覆盖未注入的纯服务端读取路径）
pub const DEFAULT_CLIENT_RANK: &[SourceKind] = &[
    SourceKind::ClientGlobal,
    SourceKind::ClientEnv,
    SourceKind::PageData,
    SourceKind::PublicEnv,
    SourceKind::BareEnv,
];

/// 注入写扇出的目标命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// 客户端扁平全局
    Globals,
    /// 类 process 环境命名空间（不存在时惰性创建）
    Env,
}

impl Namespace {
    pub fn label(self) -> &'static str {
        match self {
            Namespace::Globals => "client-global",
            Namespace::Env => "client-env",
        }
    }
}

/// 一次服务端渲染产出的配置快照：仅含解析为非空白值的键，构建后不可变
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, String>);

impl Snapshot {
    /// 从键值对构建。空白值由调用方（构建器）过滤，这里原样收下
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 可嵌入服务端渲染输出的载荷：自包含的脚本片段，空快照也是合法的 no-op
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    text: String,
}

impl Payload {
    /// 从原始文本构造。用于传输边界与测试（损坏载荷场景）
    pub fn from_raw(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// 注入状态：ready 单向翻转，revision 每次注入严格递增
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionState {
    pub ready: bool,
    pub revision: u64,
}

/// 就绪通知：初次注入与每次重注入都会发出，携带本轮涉及的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyEvent {
    pub keys: Vec<String>,
    pub revision: u64,
    /// false 表示首次注入，true 表示后续重注入刷新
    pub refresh: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_entries_and_get() {
        let snap = Snapshot::from_entries([("A", "1"), ("B", "2")]);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("A"), Some("1"));
        assert_eq!(snap.get("C"), None);
        assert!(snap.contains_key("B"));
    }

    #[test]
    fn test_snapshot_iteration_is_ordered() {
        let snap = Snapshot::from_entries([("Z", "3"), ("A", "1"), ("M", "2")]);
        let keys: Vec<&str> = snap.keys().collect();
        assert_eq!(keys, vec!["A", "M", "Z"]);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = Snapshot::default();
        assert!(snap.is_empty());
        assert_eq!(snap.len(), 0);
    }

    #[test]
    fn test_namespace_labels() {
        assert_eq!(Namespace::Globals.label(), "client-global");
        assert_eq!(Namespace::Env.label(), "client-env");
    }

    #[test]
    fn test_default_ranks_order() {
        // 服务端：公共前缀变量优先于裸变量
        assert_eq!(DEFAULT_SERVER_RANK[0], SourceKind::PublicEnv);
        assert_eq!(DEFAULT_SERVER_RANK[1], SourceKind::BareEnv);
        // 客户端：注入后的命名空间优先于服务端回落
        assert_eq!(DEFAULT_CLIENT_RANK[0], SourceKind::ClientGlobal);
        assert!(DEFAULT_CLIENT_RANK.contains(&SourceKind::BareEnv));
    }
}
