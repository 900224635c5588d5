use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Endpoint, SourcesConfig};
use crate::model::{EventRecord, Group, Record};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum LoadEvent {
    /// One entity's snapshot and history have landed (either half may be
    /// absent/empty after a failure).
    EntityLoaded {
        group: Group,
        id: String,
        snapshot: Option<Record>,
        history: Vec<EventRecord>,
        failures: usize,
    },
    /// Every entity of the stage has settled.
    StageSettled {
        group: Group,
        entities: usize,
        failures: usize,
        elapsed_ms: u128,
    },
    CycleFinished {
        failures: usize,
        elapsed_ms: u128,
    },
}

pub trait LoadSink {
    fn emit(&self, ev: LoadEvent);
}

/// Result of one half of an entity fetch.
struct Fetched<T> {
    value: T,
    failed: bool,
}

pub struct Loader {
    transport: Box<dyn Transport>,
    sources: SourcesConfig,
}

impl Loader {
    pub fn new(transport: Box<dyn Transport>, sources: SourcesConfig) -> Self {
        Self { transport, sources }
    }

    pub fn sources(&self) -> &SourcesConfig {
        &self.sources
    }

    /// Fans out over every entity of `group`; each entity is reported to the
    /// sink as soon as it lands. Returns the number of failed halves.
    pub async fn load_group(&self, group: Group, sink: &dyn LoadSink) -> usize {
        let started = Instant::now();
        let ids = self.sources.entities(group);
        let entities = ids.len();

        let outcomes = join_all(ids.into_iter().map(|id| async move {
            let (snapshot, history) = self.load_entity(group, &id).await;
            let failures = usize::from(snapshot.failed) + usize::from(history.failed);
            sink.emit(LoadEvent::EntityLoaded {
                group,
                id,
                snapshot: snapshot.value,
                history: history.value,
                failures,
            });
            failures
        }))
        .await;

        let failures = outcomes.into_iter().sum();
        let elapsed_ms = started.elapsed().as_millis();
        debug!(%group, entities, failures, elapsed_ms = elapsed_ms as u64, "stage settled");
        sink.emit(LoadEvent::StageSettled {
            group,
            entities,
            failures,
            elapsed_ms,
        });
        failures
    }

    /// Groups run as sequential stages; a stage starts only after the previous
    /// stage's fan-out has fully settled.
    pub async fn load_all(&self, sink: &dyn LoadSink) -> usize {
        let started = Instant::now();
        let mut failures = 0;
        for group in Group::ALL {
            failures += self.load_group(group, sink).await;
        }
        let elapsed_ms = started.elapsed().as_millis();
        info!(failures, elapsed_ms = elapsed_ms as u64, "refresh cycle finished");
        sink.emit(LoadEvent::CycleFinished {
            failures,
            elapsed_ms,
        });
        failures
    }

    async fn load_entity(
        &self,
        group: Group,
        id: &str,
    ) -> (Fetched<Option<Record>>, Fetched<Vec<EventRecord>>) {
        match self.sources.endpoint(group, id) {
            Endpoint::Entity { actual, history } => {
                futures::join!(
                    self.fetch_snapshot(group, id, &actual),
                    self.fetch_history(group, id, &history)
                )
            }
            Endpoint::Inventory { path } => {
                let history = self.fetch_history(group, id, &path).await;
                (
                    Fetched {
                        value: None,
                        failed: false,
                    },
                    history,
                )
            }
        }
    }

    async fn fetch_snapshot(&self, group: Group, id: &str, path: &str) -> Fetched<Option<Record>> {
        let body = match self.transport.fetch(path).await {
            Ok(body) => body,
            Err(e) => {
                warn!(%group, entity = id, path, error = %e, "snapshot fetch failed");
                return Fetched {
                    value: None,
                    failed: true,
                };
            }
        };
        match body {
            None | Some(Value::Null) => Fetched {
                value: None,
                failed: false,
            },
            Some(Value::Object(map)) => Fetched {
                value: Some(map),
                failed: false,
            },
            // Some upstreams wrap the current reading in a one-element list.
            Some(Value::Array(items)) => Fetched {
                value: items.into_iter().find_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                }),
                failed: false,
            },
            Some(other) => {
                warn!(%group, entity = id, path, kind = json_kind(&other), "malformed snapshot body");
                Fetched {
                    value: None,
                    failed: true,
                }
            }
        }
    }

    async fn fetch_history(&self, group: Group, id: &str, path: &str) -> Fetched<Vec<EventRecord>> {
        let body = match self.transport.fetch(path).await {
            Ok(body) => body,
            Err(e) => {
                warn!(%group, entity = id, path, error = %e, "history fetch failed");
                return Fetched {
                    value: Vec::new(),
                    failed: true,
                };
            }
        };
        match body {
            None | Some(Value::Null) => Fetched {
                value: Vec::new(),
                failed: false,
            },
            Some(Value::Array(items)) => {
                let total = items.len();
                let events: Vec<EventRecord> = items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(map) => Some(EventRecord::from_raw(group, map)),
                        _ => None,
                    })
                    .collect();
                if events.len() < total {
                    warn!(
                        %group,
                        entity = id,
                        skipped = total - events.len(),
                        "history entries that are not objects were skipped"
                    );
                }
                Fetched {
                    value: events,
                    failed: false,
                }
            }
            Some(other) => {
                warn!(%group, entity = id, path, kind = json_kind(&other), "malformed history body");
                Fetched {
                    value: Vec::new(),
                    failed: true,
                }
            }
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::transport::MemoryTransport;

    #[derive(Default)]
    struct Collect(RefCell<Vec<LoadEvent>>);

    impl LoadSink for Collect {
        fn emit(&self, ev: LoadEvent) {
            self.0.borrow_mut().push(ev);
        }
    }

    #[tokio::test]
    async fn one_failing_half_does_not_leak_into_siblings() {
        let t = MemoryTransport::new()
            .with_failure("monitor_acceso_LPR1/actual", "connection reset")
            .with_body(
                "monitor_acceso_LPR1/historico",
                json!([{"timestampEvento": "2024-08-01T10:00:00Z", "placa": "A"}]),
            )
            .with_body("monitor_acceso_LPR2/actual", json!({"placa": "B"}))
            .with_raw("monitor_acceso_LPR2/historico", "<html>")
            .with_body("monitor_acceso_LPR3/actual", json!([{"placa": "C"}]))
            .with_body("monitor_acceso_LPR3/historico", json!([1, {"placa": "C"}]));
        let loader = Loader::new(Box::new(t), SourcesConfig::default());
        let sink = Collect::default();

        let failures = loader.load_group(Group::Cameras, &sink).await;
        assert_eq!(failures, 2);

        let events = sink.0.borrow();
        let mut landed = 0;
        for ev in events.iter() {
            let LoadEvent::EntityLoaded {
                id,
                snapshot,
                history,
                ..
            } = ev
            else {
                continue;
            };
            landed += 1;
            match id.as_str() {
                "LPR1" => {
                    assert!(snapshot.is_none());
                    assert_eq!(history.len(), 1);
                }
                "LPR2" => {
                    assert!(snapshot.is_some());
                    assert!(history.is_empty());
                }
                "LPR3" => {
                    assert_eq!(snapshot.as_ref().unwrap()["placa"], "C");
                    assert_eq!(history.len(), 1);
                }
                other => panic!("unexpected entity {other}"),
            }
        }
        assert_eq!(landed, 3);
        assert!(matches!(
            events.last(),
            Some(LoadEvent::StageSettled {
                group: Group::Cameras,
                entities: 3,
                failures: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn devices_stage_reads_the_inventory() {
        let t = MemoryTransport::new().with_body(
            "dispositivos",
            json!([{"id": "dev-01", "tipo": "Sensor", "estado": "activo"}]),
        );
        let loader = Loader::new(Box::new(t), SourcesConfig::default());
        let sink = Collect::default();
        assert_eq!(loader.load_group(Group::Devices, &sink).await, 0);
        let events = sink.0.borrow();
        let Some(LoadEvent::EntityLoaded { id, history, .. }) = events.first() else {
            panic!("no entity event");
        };
        assert_eq!(id, crate::model::DEVICE_INVENTORY);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn null_bodies_mean_no_data() {
        let t = MemoryTransport::new()
            .with_raw("monitor_energia_EV-001/actual", "null")
            .with_raw("monitor_energia_EV-001/historico", "null");
        let sources = SourcesConfig::default();
        let loader = Loader::new(Box::new(t), sources);
        let sink = Collect::default();
        let failures = loader.load_group(Group::Energy, &sink).await;
        // Only the three unrouted monitors fail, two halves each.
        assert_eq!(failures, 6);
        let events = sink.0.borrow();
        let landed = events.iter().find_map(|ev| match ev {
            LoadEvent::EntityLoaded {
                id,
                snapshot,
                history,
                failures,
                ..
            } if id == "EV-001" => Some((snapshot.clone(), history.len(), *failures)),
            _ => None,
        });
        assert_eq!(landed, Some((None, 0, 0)));
    }
}
