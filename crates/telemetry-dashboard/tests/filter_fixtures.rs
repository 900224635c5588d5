use serde_json::{Value, json};

use telemetry_dashboard::cache::{CacheStore, INITIAL_WINDOW, WINDOW_STEP};
use telemetry_dashboard::filter::{device_visibility, filtered_history, has_more};
use telemetry_dashboard::model::{EventRecord, FilterState, Group};

fn events(group: Group, raw: Value) -> Vec<EventRecord> {
    raw.as_array()
        .unwrap()
        .iter()
        .map(|v| EventRecord::from_raw(group, v.as_object().cloned().unwrap()))
        .collect()
}

fn three_events() -> CacheStore {
    let mut cache = CacheStore::new();
    cache.set_history(
        Group::Cameras,
        "LPR1",
        events(
            Group::Cameras,
            json!([
                {"placa": "A1", "tipoEvento": "entrada", "autorizado": true, "timestampEvento": "2024-08-01T08:00:00Z"},
                {"placa": "B2", "tipoEvento": "salida", "autorizado": false, "timestampEvento": "2024-08-01T09:00:00Z"},
                {"placa": "C3", "tipoEvento": "entrada", "autorizado": true, "timestampEvento": "2024-08-01T10:00:00Z"}
            ]),
        ),
    );
    cache
}

fn plates(out: &[&EventRecord]) -> Vec<String> {
    out.iter()
        .map(|e| e.attrs["placa"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn event_type_filter_keeps_matching_records_newest_first() {
    let cache = three_events();
    let filter = FilterState {
        event_type: "entrada".into(),
        authorized: String::new(),
    };
    let out = filtered_history(&cache, Group::Cameras, "LPR1", &filter);
    assert_eq!(plates(&out), vec!["C3", "A1"]);
}

#[test]
fn authorization_filter_compares_string_form() {
    let cache = three_events();
    let filter = FilterState {
        event_type: String::new(),
        authorized: "true".into(),
    };
    let out = filtered_history(&cache, Group::Cameras, "LPR1", &filter);
    assert_eq!(plates(&out), vec!["C3", "A1"]);

    let filter = FilterState {
        event_type: String::new(),
        authorized: "false".into(),
    };
    assert_eq!(
        plates(&filtered_history(&cache, Group::Cameras, "LPR1", &filter)),
        vec!["B2"]
    );
}

#[test]
fn empty_authorization_filter_means_no_filter() {
    let cache = three_events();
    let out = filtered_history(&cache, Group::Cameras, "LPR1", &FilterState::default());
    assert_eq!(plates(&out), vec!["C3", "B2", "A1"]);
}

#[test]
fn filters_compose_with_and() {
    let cache = three_events();
    let filter = FilterState {
        event_type: "salida".into(),
        authorized: "true".into(),
    };
    assert!(filtered_history(&cache, Group::Cameras, "LPR1", &filter).is_empty());
}

#[test]
fn output_is_non_increasing_and_stable_on_ties() {
    let mut cache = CacheStore::new();
    cache.set_history(
        Group::Cameras,
        "LPR2",
        events(
            Group::Cameras,
            json!([
                {"placa": "T1", "timestampEvento": "2024-08-01T10:00:00Z"},
                {"placa": "T2", "timestampEvento": "2024-08-01T12:00:00+02:00"},
                {"placa": "T3", "timestampEvento": "2024-08-01T11:00:00Z"},
                {"placa": "T4", "timestampEvento": "2024-08-01T10:00:00Z"}
            ]),
        ),
    );
    let out = filtered_history(&cache, Group::Cameras, "LPR2", &FilterState::default());
    assert!(out.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    // 12:00+02:00 equals 10:00Z, so three records tie and keep upstream order.
    assert_eq!(plates(&out), vec!["T3", "T1", "T2", "T4"]);
}

#[test]
fn window_only_grows_and_survives_reloads() {
    let mut cache = CacheStore::new();
    let history = || {
        events(
            Group::Cameras,
            Value::Array(
                (0..70)
                    .map(|i| json!({"placa": format!("P{i}"), "timestampEvento": format!("2024-08-01T10:{:02}:00Z", i % 60)}))
                    .collect(),
            ),
        )
    };
    cache.set_history(Group::Cameras, "LPR1", history());
    let f = FilterState::default();

    let mut last = cache.visible_window(Group::Cameras, "LPR1");
    assert_eq!(last, INITIAL_WINDOW);
    for _ in 0..5 {
        let before = filtered_history(&cache, Group::Cameras, "LPR1", &f).len();
        let next = cache.grow_window(Group::Cameras, "LPR1");
        assert_eq!(next, last + WINDOW_STEP);
        assert!(filtered_history(&cache, Group::Cameras, "LPR1", &f).len() >= before);
        cache.set_history(Group::Cameras, "LPR1", history());
        assert_eq!(cache.visible_window(Group::Cameras, "LPR1"), next);
        last = next;
    }
    assert_eq!(last, 120);
    assert!(!has_more(&cache, Group::Cameras, "LPR1", &f));
}

#[test]
fn device_search_is_case_insensitive_substring() {
    let devices = events(
        Group::Devices,
        json!([
            {"id": "dev-01", "nombre": "Sensor Estacionario"},
            {"id": "dev-02", "nombre": "Cámara Perimetral"}
        ]),
    );
    let vis = device_visibility(&devices, "sensor");
    assert_eq!(
        vis,
        vec![("dev-01".to_string(), true), ("dev-02".to_string(), false)]
    );

    let all = device_visibility(&devices, "");
    assert!(all.iter().all(|(_, visible)| *visible));
}
