use std::collections::BTreeMap;

use crate::error::{ConfigError, Result};
use crate::models::{Payload, Snapshot};

/// 载荷标记：客户端在任何消费者代码之前执行的赋值语句
pub const PAYLOAD_MARKER: &str = "window.__RUNTIME_CONFIG__ = ";

/// 将快照编码为可原样嵌入渲染输出的脚本片段。
/// 键值集合与 JSON 对象一一对应（无碰撞、无截断）；空快照编码为合法的 no-op
pub fn encode(snapshot: &Snapshot) -> Result<Payload> {
    let body: BTreeMap<&str, &str> = snapshot.iter().collect();
    let json = serde_json::to_string(&body)?;
    Ok(Payload::from_raw(format!("{}{};", PAYLOAD_MARKER, json)))
}

/// 解码嵌入载荷。格式不符或 JSON 损坏返回 PayloadDecode，
/// 由调用方（注入器）降级为空快照，绝不中断执行
pub fn decode(payload: &Payload) -> Result<Snapshot> {
    let text = payload.as_str().trim();
    let body = text
        .strip_prefix(PAYLOAD_MARKER)
        .ok_or_else(|| ConfigError::PayloadDecode("missing payload marker".to_string()))?
        .trim_end_matches(';')
        .trim();

    let entries: BTreeMap<String, String> = serde_json::from_str(body)
        .map_err(|e| ConfigError::PayloadDecode(e.to_string()))?;
    Ok(Snapshot::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_empty_snapshot_is_valid_noop() {
        let payload = encode(&Snapshot::default()).unwrap();
        assert_eq!(payload.as_str(), "window.__RUNTIME_CONFIG__ = {};");

        let decoded = decode(&payload).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let snapshot = Snapshot::from_entries([("KEY_A", "v1"), ("KEY_B", "sk-123")]);
        let payload = encode(&snapshot).unwrap();
        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_encode_escapes_value_characters() {
        // 含引号与反斜杠的值不得破坏载荷结构
        let snapshot = Snapshot::from_entries([("KEY_A", r#"va"l\ue"#)]);
        let payload = encode(&snapshot).unwrap();
        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.get("KEY_A"), Some(r#"va"l\ue"#));
    }

    #[test]
    fn test_decode_missing_marker() {
        let err = decode(&Payload::from_raw(r#"{"KEY_A":"v1"}"#)).unwrap_err();
        assert!(matches!(err, ConfigError::PayloadDecode(_)));
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode(&Payload::from_raw(
            "window.__RUNTIME_CONFIG__ = {not json;",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::PayloadDecode(_)));
    }

    #[test]
    fn test_decode_tolerates_missing_semicolon() {
        let payload = Payload::from_raw(r#"window.__RUNTIME_CONFIG__ = {"KEY_A":"v1"}"#);
        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.get("KEY_A"), Some("v1"));
    }

    proptest! {
        /// 任意快照（含空快照）编码再解码，恢复完全相同的键值集合
        #[test]
        fn prop_round_trip(entries in prop::collection::btree_map(
            "[A-Z][A-Z0-9_]{0,15}",
            "[!-~]{1,24}",
            0..8,
        )) {
            let snapshot = Snapshot::from_entries(entries);
            let payload = encode(&snapshot).unwrap();
            let decoded = decode(&payload).unwrap();
            prop_assert_eq!(decoded, snapshot);
        }
    }
}
