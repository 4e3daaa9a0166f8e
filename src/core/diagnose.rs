use crate::core::resolver;
use crate::models::{InjectionState, SourceKind};
use crate::runtime::ClientRuntime;

/// 单个键的探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProbe {
    pub key: String,
    pub present: bool,
    /// 命中的来源名（按排序第一个满足的命名空间）
    pub origin: Option<&'static str>,
}

/// 只读探测报告：直接探命名空间，不碰管理器缓存
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub entries: Vec<KeyProbe>,
    /// 各命名空间当前可见的键总数（用于泄漏/调试检查）
    pub namespace_counts: Vec<(&'static str, usize)>,
    pub state: InjectionState,
}

impl ProbeReport {
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.present).count()
    }
}

/// 对每个跟踪键按排序重新探测所有命名空间。对命名空间无副作用
pub fn probe<S: AsRef<str>>(
    runtime: &ClientRuntime,
    keys: &[S],
    rank: &[SourceKind],
) -> ProbeReport {
    let sources = resolver::ranked(rank, Some(runtime));
    let refs = resolver::as_refs(&sources);

    let entries = keys
        .iter()
        .map(|key| {
            let key = key.as_ref();
            match resolver::resolve_traced(key, &refs) {
                Some((_, origin)) => KeyProbe {
                    key: key.to_string(),
                    present: true,
                    origin: Some(origin),
                },
                None => KeyProbe {
                    key: key.to_string(),
                    present: false,
                    origin: None,
                },
            }
        })
        .collect();

    ProbeReport {
        entries,
        namespace_counts: vec![
            ("client-global", runtime.globals_count()),
            ("client-env", runtime.env_count()),
            ("page-data", runtime.page_data_count()),
        ],
        state: runtime.state(),
    }
}

/// 报告展示能力：报告进、文本行出。叠加层与测试共用同一实现
pub trait ReportView {
    fn lines(&self, report: &ProbeReport) -> Vec<String>;
}

/// 纯文本视图
pub struct PlainView;

impl ReportView for PlainView {
    fn lines(&self, report: &ProbeReport) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "ready={} revision={} resolved={}/{}",
            report.state.ready,
            report.state.revision,
            report.present_count(),
            report.entries.len(),
        ));
        lines.push(String::new());
        for entry in &report.entries {
            if entry.present {
                lines.push(format!(
                    "[ok] {} <- {}",
                    entry.key,
                    entry.origin.unwrap_or("?"),
                ));
            } else {
                lines.push(format!("[--] {} absent", entry.key));
            }
        }
        lines.push(String::new());
        for (name, count) in &report.namespace_counts {
            lines.push(format!("{}: {} keys", name, count));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inject::{Checkpoint, Injector};
    use crate::core::payload::encode;
    use crate::models::{Snapshot, DEFAULT_CLIENT_RANK};

    fn injected_runtime() -> ClientRuntime {
        let mut runtime = ClientRuntime::with_page_data([("KEY_C", "v3")]);
        let injector = Injector::new(["KEY_A", "KEY_B", "KEY_C"]);
        let payload = encode(&Snapshot::from_entries([("KEY_A", "v1")])).unwrap();
        injector.inject(&mut runtime, &payload, Checkpoint::Immediate);
        runtime
    }

    #[test]
    fn test_probe_reports_presence_and_origin() {
        let runtime = injected_runtime();
        let rank = [
            crate::models::SourceKind::ClientGlobal,
            crate::models::SourceKind::ClientEnv,
            crate::models::SourceKind::PageData,
        ];
        let report = probe(&runtime, &["KEY_A", "KEY_B", "KEY_C"], &rank);

        assert_eq!(report.entries.len(), 3);
        assert!(report.entries[0].present);
        assert_eq!(report.entries[0].origin, Some("client-global"));
        assert!(!report.entries[1].present);
        assert_eq!(report.entries[1].origin, None);
        // KEY_C 已被注入到全局，来源显示为第一个命中的命名空间
        assert_eq!(report.entries[2].origin, Some("client-global"));
        assert_eq!(report.present_count(), 2);
    }

    #[test]
    fn test_probe_namespace_counts() {
        let runtime = injected_runtime();
        let report = probe(&runtime, &["KEY_A"], DEFAULT_CLIENT_RANK);

        // KEY_A 来自载荷，KEY_C 来自侧通道，都进了两个目标命名空间
        let counts: std::collections::HashMap<_, _> =
            report.namespace_counts.iter().copied().collect();
        assert_eq!(counts["client-global"], 2);
        assert_eq!(counts["client-env"], 2);
        assert_eq!(counts["page-data"], 1);
    }

    #[test]
    fn test_probe_reflects_injection_state() {
        let runtime = ClientRuntime::new();
        let report = probe(&runtime, &["KEY_A"], DEFAULT_CLIENT_RANK);
        assert!(!report.state.ready);
        assert_eq!(report.state.revision, 0);

        let runtime = injected_runtime();
        let report = probe(&runtime, &["KEY_A"], DEFAULT_CLIENT_RANK);
        assert!(report.state.ready);
        assert_eq!(report.state.revision, 1);
    }

    #[test]
    fn test_probe_is_read_only() {
        let runtime = injected_runtime();
        let before = (
            runtime.globals_count(),
            runtime.env_count(),
            runtime.state(),
        );
        probe(&runtime, &["KEY_A", "KEY_B"], DEFAULT_CLIENT_RANK);
        let after = (
            runtime.globals_count(),
            runtime.env_count(),
            runtime.state(),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_plain_view_lines() {
        let runtime = injected_runtime();
        let report = probe(&runtime, &["KEY_A", "KEY_B"], DEFAULT_CLIENT_RANK);
        let lines = PlainView.lines(&report);

        assert!(lines[0].contains("ready=true"));
        assert!(lines.iter().any(|l| l.contains("[ok] KEY_A")));
        assert!(lines.iter().any(|l| l.contains("[--] KEY_B absent")));
        assert!(lines.iter().any(|l| l.contains("client-global: 2 keys")));
    }
}
