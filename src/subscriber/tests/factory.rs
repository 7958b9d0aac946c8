//! Subscriber factory construction rules

use crate::store::api::SubscriberRecord;
use crate::subscriber::api::{
    ConditionKind, DispatcherKind, ResultKind, SubscriberError, SubscriberFactory,
};
use serde_json::json;

fn http_record() -> SubscriberRecord {
    SubscriberRecord {
        dispatcher_kind: "http".into(),
        dispatcher_params: json!({"url": "http://127.0.0.1:1/hook"}),
        ..SubscriberRecord::default()
    }
}

#[test]
fn test_empty_dispatcher_means_absent() {
    let factory = SubscriberFactory::new().unwrap();
    let record = SubscriberRecord {
        condition_kind: "regex".into(),
        condition_params: json!({"pattern": "x"}),
        result_kind: "errno".into(),
        ..SubscriberRecord::default()
    };
    assert!(factory.build(&record).unwrap().is_none());
}

#[test]
fn test_full_bundle() {
    let factory = SubscriberFactory::new().unwrap();
    let record = SubscriberRecord {
        condition_kind: "json-field".into(),
        condition_params: json!({"field": "kind", "values": ["paid"]}),
        result_kind: "ERRNO".into(),
        ..http_record()
    };

    let subscriber = factory.build(&record).unwrap().unwrap();
    assert_eq!(subscriber.dispatcher().kind(), DispatcherKind::Http);
    assert_eq!(subscriber.condition().map(|c| c.kind()), Some(ConditionKind::JsonField));
    assert_eq!(subscriber.result().map(|r| r.kind()), Some(ResultKind::Errno));
}

#[test]
fn test_optional_capabilities_stay_absent() {
    let factory = SubscriberFactory::new().unwrap();
    let subscriber = factory.build(&http_record()).unwrap().unwrap();
    assert!(subscriber.condition().is_none());
    assert!(subscriber.result().is_none());
}

#[test]
fn test_unknown_kind_fails_the_slot() {
    let factory = SubscriberFactory::new().unwrap();

    let record = SubscriberRecord {
        dispatcher_kind: "grpc".into(),
        ..SubscriberRecord::default()
    };
    assert!(matches!(
        factory.build(&record),
        Err(SubscriberError::UnknownKind { capability: "dispatcher", .. })
    ));

    let record = SubscriberRecord {
        result_kind: "xml".into(),
        ..http_record()
    };
    assert!(matches!(
        factory.build(&record),
        Err(SubscriberError::UnknownKind { capability: "result", .. })
    ));
}

#[test]
fn test_bad_params_fail_the_slot() {
    let factory = SubscriberFactory::new().unwrap();
    let record = SubscriberRecord {
        dispatcher_params: json!({"url": "http://h/x", "retries": 3}),
        ..http_record()
    };
    assert!(matches!(
        factory.build(&record),
        Err(SubscriberError::InvalidParams { .. })
    ));
}
