//! Field adapters: upstream sources name the same concept differently
//! (`temperaturaC`, `temperatura`, `temp`), so every group declares a fixed
//! priority list per concept and the rest of the engine reads canonical names.

use std::collections::BTreeMap;

use serde_json::Value;
use telemetry_dashboard_macros::Adapter;

use crate::model::{Group, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concept {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub trait FieldAdapter {
    fn group(&self) -> Group;
    fn concepts(&self) -> &'static [Concept];

    /// First key present (and non-null) wins; concepts with no match are
    /// left out rather than defaulted.
    fn normalize(&self, raw: &Record) -> CanonicalRecord {
        let mut fields = BTreeMap::new();
        for concept in self.concepts() {
            let hit = concept
                .keys
                .iter()
                .find_map(|k| raw.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)));
            if let Some((key, value)) = hit {
                fields.insert(
                    concept.name,
                    CanonicalField {
                        source: key,
                        value: value.clone(),
                    },
                );
            }
        }
        CanonicalRecord { fields }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalField {
    pub source: &'static str,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRecord {
    fields: BTreeMap<&'static str, CanonicalField>,
}

impl CanonicalRecord {
    pub fn get(&self, concept: &str) -> Option<&Value> {
        self.fields.get(concept).map(|f| &f.value)
    }

    /// Upstream key that satisfied `concept`.
    pub fn source(&self, concept: &str) -> Option<&'static str> {
        self.fields.get(concept).map(|f| f.source)
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.fields.contains_key(concept)
    }

    pub fn str(&self, concept: &str) -> Option<&str> {
        self.get(concept).and_then(Value::as_str)
    }

    pub fn f64(&self, concept: &str) -> Option<f64> {
        self.get(concept).and_then(Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

#[Adapter(
    group = Group::Cameras,
    concepts = [
        "placa",
        "autorizado",
        "ocupacion",
        "velocidadKmh",
        "tipoEvento",
        "ubicacion",
        "idCamara",
        "timestampEvento",
    ]
)]
pub struct CameraAdapter;

#[Adapter(
    group = Group::Environmental,
    concepts = [
        "temperaturaC = temperaturaC | temperatura | temp",
        "humedadRel = humedadRel | humedad | humidity",
        "co2",
        "pm10",
        "pm25",
        "ubicacion",
        "timestampEvento = timestampEvento | timestamp",
        "id = id | idEstacion",
    ]
)]
pub struct EnvironmentalAdapter;

#[Adapter(
    group = Group::Energy,
    concepts = [
        "energiaKWh",
        "potenciaKW",
        "corrienteA",
        "voltajeV",
        "ubicacion",
        "estacionId = estacionId | idMonitor",
        "timestampEvento = timestampEvento | timestamp",
        "consumo = energiaKWh | potenciaKW | potencia | consumo",
    ]
)]
pub struct EnergyAdapter;

#[Adapter(
    group = Group::Devices,
    concepts = [
        "id = id | idDispositivo",
        "tipo = tipo | type",
        "estado",
        "nombre",
        "ubicacion",
    ]
)]
pub struct DeviceAdapter;

pub fn adapter_for(group: Group) -> &'static dyn FieldAdapter {
    match group {
        Group::Cameras => &CameraAdapter,
        Group::Environmental => &EnvironmentalAdapter,
        Group::Energy => &EnergyAdapter,
        Group::Devices => &DeviceAdapter,
    }
}

pub fn normalize(group: Group, raw: &Record) -> CanonicalRecord {
    adapter_for(group).normalize(raw)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn first_present_key_wins() {
        let raw = record(json!({"temperatura": 21.5, "temp": 99.0, "humidity": 40}));
        let c = normalize(Group::Environmental, &raw);
        assert_eq!(c.f64("temperaturaC"), Some(21.5));
        assert_eq!(c.source("temperaturaC"), Some("temperatura"));
        assert_eq!(c.f64("humedadRel"), Some(40.0));
    }

    #[test]
    fn missing_concepts_are_omitted_not_zeroed() {
        let raw = record(json!({"co2": 0, "pm10": null}));
        let c = normalize(Group::Environmental, &raw);
        assert_eq!(c.f64("co2"), Some(0.0));
        assert!(!c.contains("pm10"));
        assert!(!c.contains("temperaturaC"));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn energy_consumption_reports_matched_key() {
        let raw = record(json!({"potencia": 1200, "consumo": 5}));
        let c = normalize(Group::Energy, &raw);
        assert_eq!(c.source("consumo"), Some("potencia"));
        assert!(!c.contains("energiaKWh"));
    }

    #[test]
    fn snapshot_timestamp_alias_resolves() {
        let raw = record(json!({"timestamp": "2024-08-01T11:45:00Z", "idEstacion": "EST1"}));
        let c = normalize(Group::Environmental, &raw);
        assert_eq!(c.str("timestampEvento"), Some("2024-08-01T11:45:00Z"));
        assert_eq!(c.str("id"), Some("EST1"));
    }

    #[test]
    fn every_group_has_an_adapter() {
        for g in Group::ALL {
            let a = adapter_for(g);
            assert_eq!(a.group(), g);
            assert!(!a.concepts().is_empty());
        }
        assert_eq!(CameraAdapter::CONCEPTS.len(), 8);
    }
}
