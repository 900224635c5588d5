use serde_json::Value;

use crate::adapter;
use crate::cache::CacheStore;
use crate::model::{EventRecord, FilterState, Group, Record};

/// String form of an attribute as a browser would print it; this is what the
/// authorization control is compared against.
pub fn display_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// AND of the non-empty filter fields. A missing attribute never satisfies a
/// non-empty field.
pub fn matches(group: Group, event: &EventRecord, filter: &FilterState) -> bool {
    if filter.is_empty() {
        return true;
    }
    let canon = adapter::normalize(group, &event.attrs);
    if !filter.event_type.is_empty() && canon.str("tipoEvento") != Some(filter.event_type.as_str())
    {
        return false;
    }
    if !filter.authorized.is_empty() {
        match canon.get("autorizado") {
            Some(v) if display_string(v) == filter.authorized => {}
            _ => return false,
        }
    }
    true
}

/// Newest first. Ties keep their upstream order; undated events sink to the
/// bottom.
pub fn sorted_desc<'a, I>(events: I) -> Vec<&'a EventRecord>
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut out: Vec<&EventRecord> = events.into_iter().collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}

/// Oldest first, limited to the most recent `n` entries (chart series).
pub fn recent_asc(events: &[EventRecord], n: usize) -> Vec<&EventRecord> {
    let mut out: Vec<&EventRecord> = events.iter().collect();
    out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let skip = out.len().saturating_sub(n);
    out.split_off(skip)
}

fn filtered_sorted<'a>(
    cache: &'a CacheStore,
    group: Group,
    id: &str,
    filter: &FilterState,
) -> Vec<&'a EventRecord> {
    sorted_desc(
        cache
            .history(group, id)
            .iter()
            .filter(|ev| matches(group, ev, filter)),
    )
}

pub fn filtered_history<'a>(
    cache: &'a CacheStore,
    group: Group,
    id: &str,
    filter: &FilterState,
) -> Vec<&'a EventRecord> {
    let mut out = filtered_sorted(cache, group, id, filter);
    out.truncate(cache.visible_window(group, id));
    out
}

pub fn has_more(cache: &CacheStore, group: Group, id: &str, filter: &FilterState) -> bool {
    filtered_sorted(cache, group, id, filter).len() > cache.visible_window(group, id)
}

/// `key: value` listing of the attributes not shown in their own column.
pub fn attribute_summary(attrs: &Record, skip: &[&str], decimals: Option<usize>) -> String {
    attrs
        .iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| match (v, decimals) {
            (Value::Number(n), Some(d)) => match n.as_f64() {
                Some(f) => format!("{k}: {f:.d$}"),
                None => format!("{k}: {n}"),
            },
            _ => format!("{k}: {}", display_string(v)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub const DEVICE_COLUMNS: [&str; 3] = ["id", "tipo", "estado"];

/// Text a device row shows, which is what the search box matches against.
pub fn device_row_text(device: &Record) -> String {
    let canon = adapter::normalize(Group::Devices, device);
    let field = |name: &str, fallback: &str| {
        canon
            .get(name)
            .map(display_string)
            .unwrap_or_else(|| fallback.to_string())
    };
    let info = attribute_summary(device, &DEVICE_COLUMNS, None);
    format!(
        "{} {} {} {}",
        field("id", "N/A"),
        field("tipo", "N/A"),
        field("estado", "Desconocido"),
        if info.is_empty() { "N/A" } else { &info }
    )
}

/// Case-insensitive substring search over each device row. Row order follows
/// the inventory; an empty term shows everything.
pub fn device_visibility(devices: &[EventRecord], term: &str) -> Vec<(String, bool)> {
    let term = term.trim().to_lowercase();
    devices
        .iter()
        .map(|d| {
            let id = adapter::normalize(Group::Devices, &d.attrs)
                .get("id")
                .map(display_string)
                .unwrap_or_else(|| "N/A".to_string());
            let visible = term.is_empty() || device_row_text(&d.attrs).to_lowercase().contains(&term);
            (id, visible)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::WINDOW_STEP;

    fn ev(group: Group, v: Value) -> EventRecord {
        EventRecord::from_raw(group, v.as_object().cloned().unwrap())
    }

    fn camera_history(n: usize) -> Vec<EventRecord> {
        (0..n)
            .map(|i| {
                ev(
                    Group::Cameras,
                    json!({
                        "timestampEvento": format!("2024-08-01T{:02}:{:02}:00Z", i / 60, i % 60),
                        "tipoEvento": if i % 2 == 0 { "entrada" } else { "salida" },
                        "autorizado": i % 3 != 0,
                    }),
                )
            })
            .collect()
    }

    #[test]
    fn display_string_follows_script_semantics() {
        assert_eq!(display_string(&json!(true)), "true");
        assert_eq!(display_string(&json!("false")), "false");
        assert_eq!(display_string(&json!(12)), "12");
        assert_eq!(display_string(&Value::Null), "null");
    }

    #[test]
    fn missing_attribute_never_matches() {
        let e = ev(Group::Cameras, json!({"tipoEvento": "entrada"}));
        let f = FilterState {
            event_type: String::new(),
            authorized: "false".into(),
        };
        assert!(!matches(Group::Cameras, &e, &f));
        assert!(matches(Group::Cameras, &e, &FilterState::default()));
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let events = vec![
            ev(Group::Cameras, json!({"placa": "A", "timestampEvento": "2024-08-01T10:00:00Z"})),
            ev(Group::Cameras, json!({"placa": "B"})),
            ev(Group::Cameras, json!({"placa": "C", "timestampEvento": "2024-08-01T12:00:00Z"})),
            ev(Group::Cameras, json!({"placa": "D", "timestampEvento": "2024-08-01T10:00:00Z"})),
        ];
        let plates: Vec<&str> = sorted_desc(&events)
            .iter()
            .map(|e| e.attrs["placa"].as_str().unwrap())
            .collect();
        assert_eq!(plates, vec!["C", "A", "D", "B"]);
    }

    #[test]
    fn window_truncates_and_reports_more() {
        let mut cache = CacheStore::new();
        cache.set_history(Group::Cameras, "LPR1", camera_history(45));
        let f = FilterState::default();
        assert_eq!(filtered_history(&cache, Group::Cameras, "LPR1", &f).len(), 20);
        assert!(has_more(&cache, Group::Cameras, "LPR1", &f));

        cache.grow_window(Group::Cameras, "LPR1");
        assert_eq!(filtered_history(&cache, Group::Cameras, "LPR1", &f).len(), 20 + WINDOW_STEP);
        cache.grow_window(Group::Cameras, "LPR1");
        assert_eq!(filtered_history(&cache, Group::Cameras, "LPR1", &f).len(), 45);
        assert!(!has_more(&cache, Group::Cameras, "LPR1", &f));
    }

    #[test]
    fn unknown_entity_yields_empty_not_missing() {
        let cache = CacheStore::new();
        let f = FilterState {
            event_type: "entrada".into(),
            authorized: String::new(),
        };
        assert!(filtered_history(&cache, Group::Cameras, "LPR9", &f).is_empty());
        assert!(!has_more(&cache, Group::Cameras, "LPR9", &f));
    }

    #[test]
    fn recent_asc_keeps_the_tail() {
        let events = camera_history(25);
        let tail = recent_asc(&events, 20);
        assert_eq!(tail.len(), 20);
        assert!(tail.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(tail[19].timestamp, events[24].timestamp);
    }

    #[test]
    fn summary_formats_numbers() {
        let attrs = json!({"co2": 410, "ubicacion": "Norte", "idEstacion": "EST1"});
        let got = attribute_summary(attrs.as_object().unwrap(), &["idEstacion"], Some(2));
        assert_eq!(got, "co2: 410.00, ubicacion: Norte");
    }
}
