use std::collections::HashMap;

use tokio::sync::broadcast;

use crate::models::{InjectionState, ReadyEvent};

/// 就绪通知通道容量。键集合很小，积压到这个量级说明消费者早已落后，
/// 落后者应读 InjectionState 后调用 reload 补课
const READY_CHANNEL_CAPACITY: usize = 16;

/// 客户端执行上下文：消费者可能查询的全部命名空间，以及注入状态。
/// 写入只来自注入器（pub(crate)），管理器与诊断只读
pub struct ClientRuntime {
    /// 扁平全局命名空间
    globals: HashMap<String, String>,
    /// 类 process 环境命名空间，首次写入时惰性创建
    env: Option<HashMap<String, String>>,
    /// 框架注入的页面数据（服务端渲染的侧通道）
    page_data: HashMap<String, String>,
    ready: bool,
    revision: u64,
    ready_tx: broadcast::Sender<ReadyEvent>,
}

impl ClientRuntime {
    pub fn new() -> Self {
        let (ready_tx, _) = broadcast::channel(READY_CHANNEL_CAPACITY);
        Self {
            globals: HashMap::new(),
            env: None,
            page_data: HashMap::new(),
            ready: false,
            revision: 0,
            ready_tx,
        }
    }

    /// 带页面数据侧通道的上下文（服务端渲染附带的数据）
    pub fn with_page_data<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut runtime = Self::new();
        runtime.page_data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        runtime
    }

    pub fn global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.as_ref()?.get(key).map(|s| s.as_str())
    }

    pub fn page_datum(&self, key: &str) -> Option<&str> {
        self.page_data.get(key).map(|s| s.as_str())
    }

    /// 环境命名空间是否已经创建（惰性，首次写入前不存在）
    pub fn env_namespace_exists(&self) -> bool {
        self.env.is_some()
    }

    pub fn globals_count(&self) -> usize {
        self.globals.len()
    }

    pub fn env_count(&self) -> usize {
        self.env.as_ref().map(|m| m.len()).unwrap_or(0)
    }

    pub fn page_data_count(&self) -> usize {
        self.page_data.len()
    }

    pub fn state(&self) -> InjectionState {
        InjectionState {
            ready: self.ready,
            revision: self.revision,
        }
    }

    /// 订阅就绪通知。错过首次通知的消费者仍能收到后续重注入的通知
    pub fn subscribe(&self) -> broadcast::Receiver<ReadyEvent> {
        self.ready_tx.subscribe()
    }

    /// 写入扁平全局命名空间（仅注入器调用）
    pub(crate) fn write_global(&mut self, key: &str, value: &str) {
        self.globals.insert(key.to_string(), value.to_string());
    }

    /// 写入环境命名空间，不存在时惰性创建（仅注入器调用）
    pub(crate) fn write_env(&mut self, key: &str, value: &str) {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
    }

    /// 标记一轮注入完成：ready 置位，revision 递增，广播就绪通知。
    /// 没有订阅者时发送失败是正常情况，直接忽略
    pub(crate) fn mark_injected(&mut self, keys: Vec<String>) -> ReadyEvent {
        let refresh = self.ready;
        self.ready = true;
        self.revision += 1;
        let event = ReadyEvent {
            keys,
            revision: self.revision,
            refresh,
        };
        let _ = self.ready_tx.send(event.clone());
        event
    }
}

impl Default for ClientRuntime {
    fn default() -> Self {
        Self::new()
    }
}
