use crate::models::{SourceKind, PUBLIC_PREFIX};
use crate::runtime::ClientRuntime;

/// 单个配置来源：具名的 key/value 查找位置
pub trait Source {
    fn name(&self) -> &'static str;

    /// 读取原始值。缺失返回 None，绝不报错
    fn raw(&self, key: &str) -> Option<String>;
}

/// 归一化原始值：trim 后为空串或字面 "undefined" 都视为缺失
pub fn usable(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "undefined" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 按排序逐个探测来源，返回第一个非空白值及其来源名。
/// 对来源当前状态是纯函数，内部不做缓存
pub fn resolve_traced(key: &str, sources: &[&dyn Source]) -> Option<(String, &'static str)> {
    for source in sources {
        if let Some(value) = source.raw(key).as_deref().and_then(usable) {
            return Some((value, source.name()));
        }
    }
    None
}

pub fn resolve(key: &str, sources: &[&dyn Source]) -> Option<String> {
    resolve_traced(key, sources).map(|(value, _)| value)
}

/// 带公共前缀的服务端变量：PUBLIC_<KEY>
pub struct PublicEnv;

impl Source for PublicEnv {
    fn name(&self) -> &'static str {
        "server-public"
    }

    fn raw(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", PUBLIC_PREFIX, key)).ok()
    }
}

/// 裸服务端变量：<KEY>
pub struct BareEnv;

impl Source for BareEnv {
    fn name(&self) -> &'static str {
        "server-bare"
    }

    fn raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// 客户端扁平全局命名空间视图
pub struct GlobalNamespace<'a>(pub &'a ClientRuntime);

impl Source for GlobalNamespace<'_> {
    fn name(&self) -> &'static str {
        "client-global"
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.0.global(key).map(|s| s.to_string())
    }
}

/// 客户端类 process 环境命名空间视图。命名空间尚未创建时一律缺失
pub struct EnvNamespace<'a>(pub &'a ClientRuntime);

impl Source for EnvNamespace<'_> {
    fn name(&self) -> &'static str {
        "client-env"
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.0.env_var(key).map(|s| s.to_string())
    }
}

/// 框架注入的页面数据视图（侧通道）
pub struct PageData<'a>(pub &'a ClientRuntime);

impl Source for PageData<'_> {
    fn name(&self) -> &'static str {
        "page-data"
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.0.page_datum(key).map(|s| s.to_string())
    }
}

/// 按排序构造来源探测列表。排序是数据而非硬编码；
/// 需要客户端上下文的种类在 runtime 缺席时跳过（纯服务端路径）
pub fn ranked<'a>(
    rank: &[SourceKind],
    runtime: Option<&'a ClientRuntime>,
) -> Vec<Box<dyn Source + 'a>> {
    let mut sources: Vec<Box<dyn Source + 'a>> = Vec::with_capacity(rank.len());
    for kind in rank {
        match kind {
            SourceKind::PublicEnv => sources.push(Box::new(PublicEnv)),
            SourceKind::BareEnv => sources.push(Box::new(BareEnv)),
            SourceKind::ClientGlobal => {
                if let Some(rt) = runtime {
                    sources.push(Box::new(GlobalNamespace(rt)));
                }
            }
            SourceKind::ClientEnv => {
                if let Some(rt) = runtime {
                    sources.push(Box::new(EnvNamespace(rt)));
                }
            }
            SourceKind::PageData => {
                if let Some(rt) = runtime {
                    sources.push(Box::new(PageData(rt)));
                }
            }
        }
    }
    sources
}

/// ranked 的借用辅助：Box 列表转 resolve 需要的引用切片
pub fn as_refs<'a, 'b>(sources: &'b [Box<dyn Source + 'a>]) -> Vec<&'b dyn Source> {
    sources.iter().map(|s| s.as_ref() as &dyn Source).collect()
}
