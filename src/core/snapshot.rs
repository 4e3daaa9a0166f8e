use crate::core::resolver::{self, Source};
use crate::models::Snapshot;

/// 为每个跟踪键执行排序解析，产出只含非空白值的快照。
/// 每次服务端渲染调用一次；来源不变时多次调用结果一致
pub fn build_snapshot<S: AsRef<str>>(keys: &[S], sources: &[&dyn Source]) -> Snapshot {
    let entries = keys.iter().filter_map(|key| {
        let key = key.as_ref();
        resolver::resolve(key, sources).map(|value| (key.to_string(), value))
    });
    let snapshot = Snapshot::from_entries(entries);
    tracing::debug!(
        tracked = keys.len(),
        resolved = snapshot.len(),
        "快照构建完成"
    );
    snapshot
}
