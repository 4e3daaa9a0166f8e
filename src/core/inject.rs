use std::collections::BTreeMap;

use crate::core::payload;
use crate::core::resolver;
use crate::models::{Namespace, Payload, ReadyEvent, Snapshot};
use crate::runtime::ClientRuntime;

/// 客户端生命周期检查点。Immediate 是唯一保证先于消费者执行的位置，
/// 其余两个是防御性重执行点，覆盖载荷晚于首次执行才挂载的情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// 载荷随渲染输出立即执行
    Immediate,
    /// 文档解析完成
    DocumentParsed,
    /// 所有引用资源加载完成
    ResourcesLoaded,
}

impl Checkpoint {
    pub fn label(self) -> &'static str {
        match self {
            Checkpoint::Immediate => "immediate",
            Checkpoint::DocumentParsed => "document-parsed",
            Checkpoint::ResourcesLoaded => "resources-loaded",
        }
    }
}

/// 写扇出目标：命名空间集合是数据，不在各写点重复逻辑
pub const WRITE_TARGETS: &[Namespace] = &[Namespace::Globals, Namespace::Env];

/// 一轮注入的结果
#[derive(Debug, Clone)]
pub struct InjectReport {
    pub keys: Vec<String>,
    pub revision: u64,
    pub checkpoint: Checkpoint,
}

/// 客户端注入器：把解析出的键值写进消费者可能查询的每个命名空间
pub struct Injector {
    keys: Vec<String>,
}

impl Injector {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 执行一轮注入。幂等：同一载荷注入两次，命名空间终态与一次相同；
    /// revision 无论如何严格递增，就绪通知每轮都发
    pub fn inject(
        &self,
        runtime: &mut ClientRuntime,
        payload: &Payload,
        checkpoint: Checkpoint,
    ) -> InjectReport {
        // 1. 解码。失败按空快照继续，绝不中断页面执行
        let snapshot = match payload::decode(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(checkpoint = checkpoint.label(), "载荷解码失败，按空快照继续: {}", e);
                Snapshot::default()
            }
        };

        // 2. 合并侧通道：载荷优先，页面数据补缺
        let merged = self.merge_side_channel(runtime, &snapshot);

        // 3. 写扇出：每个键写进全部目标命名空间。单键失败（空白值）静默跳过
        let mut injected: Vec<String> = Vec::with_capacity(merged.len());
        for (key, value) in &merged {
            if resolver::usable(value).is_none() {
                continue;
            }
            for target in WRITE_TARGETS {
                match target {
                    Namespace::Globals => runtime.write_global(key, value),
                    Namespace::Env => runtime.write_env(key, value),
                }
            }
            injected.push(key.clone());
        }

        // 4-5. 置位就绪、递增 revision、发出就绪通知
        let event = runtime.mark_injected(injected);
        tracing::debug!(
            checkpoint = checkpoint.label(),
            revision = event.revision,
            keys = event.keys.len(),
            refresh = event.refresh,
            "注入完成"
        );

        let ReadyEvent { keys, revision, .. } = event;
        InjectReport {
            keys,
            revision,
            checkpoint,
        }
    }

    /// 载荷键值为准，跟踪键在载荷缺席时用页面数据兜底
    fn merge_side_channel(
        &self,
        runtime: &ClientRuntime,
        snapshot: &Snapshot,
    ) -> BTreeMap<String, String> {
        let mut merged: BTreeMap<String, String> = snapshot
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        for key in &self.keys {
            if merged.contains_key(key.as_str()) {
                continue;
            }
            if let Some(value) = runtime.page_datum(key).and_then(resolver::usable) {
                merged.insert(key.clone(), value);
            }
        }
        merged
    }
}
