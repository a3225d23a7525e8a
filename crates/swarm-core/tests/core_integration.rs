#![allow(clippy::unwrap_used, clippy::expect_used)]

use swarm_core::*;

// ---------------------------------------------------------------------------
// 1. Identifiers behave as map keys and serialize transparently
// ---------------------------------------------------------------------------

#[test]
fn ids_work_as_map_keys() {
    let mut map = std::collections::HashMap::new();
    map.insert(AgentId::from("a"), 1);
    map.insert(AgentId::from("b"), 2);
    assert_eq!(map.get(&AgentId::new("a")), Some(&1));

    let ids = vec![TaskId::from("T1"), TaskId::from("T2")];
    let json = serde_json::to_string(&ids).unwrap();
    assert_eq!(json, r#"["T1","T2"]"#);
}

// ---------------------------------------------------------------------------
// 2. Error variants carry their context into the message
// ---------------------------------------------------------------------------

#[test]
fn error_messages_name_the_offender() {
    let err = SwarmError::TaskNotFound("T9".into());
    assert_eq!(err.to_string(), "Task not found: T9");

    let err = SwarmError::InvalidTransition {
        task: "T1".into(),
        from: "completed".into(),
        to: "cancelled".into(),
    };
    assert_eq!(
        err.to_string(),
        "Task T1: cannot transition from completed to cancelled"
    );
}

#[test]
fn toml_errors_convert() {
    let parsed: Result<toml::Value, toml::de::Error> = toml::from_str("key = ");
    let err: SwarmError = parsed.unwrap_err().into();
    assert!(matches!(err, SwarmError::Toml(_)));
}

// ---------------------------------------------------------------------------
// 3. Risk levels deserialize from lowercase names
// ---------------------------------------------------------------------------

#[test]
fn risk_level_roundtrip_from_config_strings() {
    let level: RiskLevel = serde_json::from_str("\"high\"").unwrap();
    assert_eq!(level, RiskLevel::High);
    assert!(level >= RiskLevel::Medium);
    assert_eq!(RiskLevel::default(), RiskLevel::Low);
}
