//! Pure mapping from cache + view state + control values to a display model.
//! Nothing here mutates; rendering twice from the same inputs yields the same
//! model.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;

use crate::adapter::{self, CanonicalRecord};
use crate::aggregate::{dashboard_stats, latest_events};
use crate::cache::CacheStore;
use crate::config::SourcesConfig;
use crate::filter::{
    DEVICE_COLUMNS, attribute_summary, device_visibility, display_string, filtered_history,
    has_more, recent_asc, sorted_desc,
};
use crate::model::{EventRecord, FilterState, Group, TIMESTAMP, View, ViewState, parse_timestamp};

pub const LATEST_EVENTS: usize = 5;
pub const CHART_POINTS: usize = 20;

const NA: &str = "N/A";
const NO_CURRENT: &str = "No hay datos actuales disponibles";
const NO_FIELDS: &str = "No hay datos disponibles";
const NO_EVENTS: &str = "No hay eventos disponibles";
const NO_HISTORY: &str = "No hay datos históricos disponibles";
const NO_DEVICES: &str = "No hay dispositivos disponibles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MountPoint {
    StatCounters,
    LatestEvents,
    ActivityChart,
    EntityTabs,
    CurrentData,
    SpeedChart,
    EventsChart,
    TemperatureChart,
    HumidityChart,
    ConsumptionChart,
    HistoryTable,
    DeviceTable,
}

impl MountPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            MountPoint::StatCounters => "stat_counters",
            MountPoint::LatestEvents => "latest_events",
            MountPoint::ActivityChart => "activity_chart",
            MountPoint::EntityTabs => "entity_tabs",
            MountPoint::CurrentData => "current_data",
            MountPoint::SpeedChart => "speed_chart",
            MountPoint::EventsChart => "events_chart",
            MountPoint::TemperatureChart => "temperature_chart",
            MountPoint::HumidityChart => "humidity_chart",
            MountPoint::ConsumptionChart => "consumption_chart",
            MountPoint::HistoryTable => "history_table",
            MountPoint::DeviceTable => "device_table",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Warning,
    Error,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    pub label: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub label: String,
    pub value: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub text: String,
    pub tone: Tone,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Neutral,
        }
    }

    fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub key: String,
    pub cells: Vec<Cell>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub placeholder: Option<String>,
    pub load_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Doughnut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub kind: ChartKind,
    pub title: String,
    pub unit: Option<String>,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum Panel {
    Stats {
        counters: Vec<Stat>,
    },
    Tabs {
        items: Vec<String>,
        active: Option<usize>,
    },
    Fields {
        items: Vec<Field>,
        placeholder: Option<String>,
    },
    Table(Table),
    Chart(Chart),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayModel {
    pub view: View,
    pub title: String,
    pub panels: Vec<(MountPoint, Panel)>,
}

impl DisplayModel {
    pub fn panel(&self, mount: MountPoint) -> Option<&Panel> {
        self.panels.iter().find(|(m, _)| *m == mount).map(|(_, p)| p)
    }

    pub fn table(&self, mount: MountPoint) -> Option<&Table> {
        match self.panel(mount)? {
            Panel::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn chart(&self, mount: MountPoint) -> Option<&Chart> {
        match self.panel(mount)? {
            Panel::Chart(c) => Some(c),
            _ => None,
        }
    }
}

pub struct RenderInput<'a> {
    pub cache: &'a CacheStore,
    pub view: &'a ViewState,
    pub filter: &'a FilterState,
    pub device_search: &'a str,
    pub sources: &'a SourcesConfig,
}

impl RenderInput<'_> {
    fn entity(&self, group: Group) -> String {
        self.view
            .active_entity
            .get(&group)
            .cloned()
            .unwrap_or_else(|| self.sources.default_entity(group))
    }
}

pub fn render(input: &RenderInput<'_>) -> DisplayModel {
    let view = input.view.active_view;
    let panels = match view {
        View::Dashboard => dashboard(input),
        View::Cameras => cameras(input),
        View::Environmental => environmental(input),
        View::Energy => energy(input),
        View::Devices => devices(input),
    };
    DisplayModel {
        view,
        title: view.title().to_string(),
        panels,
    }
}

fn dashboard(input: &RenderInput<'_>) -> Vec<(MountPoint, Panel)> {
    let stats = dashboard_stats(input.cache);
    let counters = vec![
        stat("Eventos Totales", stats.total_events),
        stat("Cámaras", input.sources.entity_count(Group::Cameras)),
        stat("Estaciones", input.sources.entity_count(Group::Environmental)),
        stat("Monitores", input.sources.entity_count(Group::Energy)),
        stat("Dispositivos", stats.per_group_counts[&Group::Devices]),
    ];

    let rows = latest_events(input.cache, LATEST_EVENTS)
        .into_iter()
        .enumerate()
        .map(|(i, ev)| {
            let c = adapter::normalize(Group::Cameras, &ev.attrs);
            row(
                i.to_string(),
                vec![
                    Cell::plain(format_event_time(ev)),
                    Cell::plain(text_or_na(&c, "idCamara")),
                    Cell::plain(text_or_na(&c, "placa")),
                    event_type_cell(&c),
                    authorized_cell(&c),
                    Cell::plain(speed(&c, true)),
                ],
            )
        })
        .collect();

    let activity = [Group::Cameras, Group::Environmental, Group::Energy];
    vec![
        (MountPoint::StatCounters, Panel::Stats { counters }),
        (
            MountPoint::LatestEvents,
            Panel::Table(table(
                &["Fecha/Hora", "Cámara", "Placa", "Tipo", "Autorizado", "Velocidad"],
                rows,
                NO_EVENTS,
                false,
            )),
        ),
        (
            MountPoint::ActivityChart,
            Panel::Chart(Chart {
                kind: ChartKind::Bar,
                title: "Eventos Registrados".into(),
                unit: None,
                labels: activity.iter().map(|g| g.label().to_string()).collect(),
                values: activity
                    .iter()
                    .map(|g| stats.per_group_counts[g] as f64)
                    .collect(),
            }),
        ),
    ]
}

fn cameras(input: &RenderInput<'_>) -> Vec<(MountPoint, Panel)> {
    let group = Group::Cameras;
    let id = input.entity(group);
    let history = input.cache.history(group, &id);

    let current = match input.cache.snapshot(group, &id) {
        None => missing_snapshot(),
        Some(raw) => {
            let c = adapter::normalize(group, raw);
            let items = [
                ("placa", "Placa"),
                ("autorizado", "Autorizado"),
                ("ocupacion", "Ocupación"),
                ("velocidadKmh", "Velocidad"),
                ("tipoEvento", "Tipo Evento"),
                ("ubicacion", "Ubicación"),
                ("idCamara", "ID Cámara"),
                (TIMESTAMP, "Fecha/Hora"),
            ]
            .into_iter()
            .filter(|(key, _)| c.contains(key))
            .map(|(key, label)| {
                let (value, tone) = match key {
                    "velocidadKmh" => (speed(&c, true), Tone::Neutral),
                    "autorizado" => {
                        let cell = authorized_cell(&c);
                        (cell.text, cell.tone)
                    }
                    "ocupacion" => {
                        let cell = occupancy_cell(&c);
                        (cell.text, cell.tone)
                    }
                    TIMESTAMP => (format_raw_time(c.str(TIMESTAMP)), Tone::Neutral),
                    _ => (text_or_na(&c, key), Tone::Neutral),
                };
                field(label, value, tone)
            })
            .collect();
            fields(items)
        }
    };

    let recent = recent_asc(history, CHART_POINTS);
    let speed_chart = Chart {
        kind: ChartKind::Line,
        title: "Velocidad (km/h)".into(),
        unit: Some("km/h".into()),
        labels: recent.iter().map(|ev| format_event_time(ev)).collect(),
        values: recent
            .iter()
            .map(|ev| {
                adapter::normalize(group, &ev.attrs)
                    .f64("velocidadKmh")
                    .unwrap_or(0.0)
            })
            .collect(),
    };

    let count_type = |t: &str| {
        history
            .iter()
            .filter(|ev| adapter::normalize(group, &ev.attrs).str("tipoEvento") == Some(t))
            .count() as f64
    };
    let events_chart = Chart {
        kind: ChartKind::Doughnut,
        title: "Entradas / Salidas".into(),
        unit: None,
        labels: vec!["Entradas".into(), "Salidas".into()],
        values: vec![count_type("entrada"), count_type("salida")],
    };

    let rows = filtered_history(input.cache, group, &id, input.filter)
        .into_iter()
        .enumerate()
        .map(|(i, ev)| {
            let c = adapter::normalize(group, &ev.attrs);
            row(
                i.to_string(),
                vec![
                    Cell::plain(format_event_time(ev)),
                    Cell::plain(text_or_na(&c, "placa")),
                    event_type_cell(&c),
                    authorized_cell(&c),
                    occupancy_cell(&c),
                    Cell::plain(speed(&c, false)),
                    Cell::plain(text_or_na(&c, "ubicacion")),
                ],
            )
        })
        .collect();
    let history_table = table(
        &[
            "Fecha/Hora",
            "Placa",
            "Tipo",
            "Autorizado",
            "Ocupación",
            "Velocidad",
            "Ubicación",
        ],
        rows,
        NO_HISTORY,
        has_more(input.cache, group, &id, input.filter),
    );

    vec![
        (MountPoint::EntityTabs, tabs(input, group, &id)),
        (MountPoint::CurrentData, current),
        (MountPoint::SpeedChart, Panel::Chart(speed_chart)),
        (MountPoint::EventsChart, Panel::Chart(events_chart)),
        (MountPoint::HistoryTable, Panel::Table(history_table)),
    ]
}

fn environmental(input: &RenderInput<'_>) -> Vec<(MountPoint, Panel)> {
    let group = Group::Environmental;
    let id = input.entity(group);
    let history = input.cache.history(group, &id);

    let current = match input.cache.snapshot(group, &id) {
        None => missing_snapshot(),
        Some(raw) => {
            let c = adapter::normalize(group, raw);
            let measure = |concept: &str, unit: &str| match c.f64(concept) {
                Some(v) => format!("{v:.2} {unit}"),
                None => NA.to_string(),
            };
            fields(vec![
                field("Temperatura", measure("temperaturaC", "°C"), Tone::Neutral),
                field("Humedad Relativa", measure("humedadRel", "%"), Tone::Neutral),
                field("CO₂", measure("co2", "ppm"), Tone::Neutral),
                field("PM10", measure("pm10", "µg/m³"), Tone::Neutral),
                field("PM2.5", measure("pm25", "µg/m³"), Tone::Neutral),
                field("Ubicación", text_or_na(&c, "ubicacion"), Tone::Neutral),
                field("Fecha/Hora", format_raw_time(c.str(TIMESTAMP)), Tone::Neutral),
                field("ID Estación", text_or_na(&c, "id"), Tone::Neutral),
            ])
        }
    };

    let recent = recent_asc(history, CHART_POINTS);
    let series = |concept: &str, title: &str, unit: &str| {
        let values: Vec<f64> = recent
            .iter()
            .filter_map(|ev| adapter::normalize(group, &ev.attrs).f64(concept))
            .collect();
        Chart {
            kind: ChartKind::Line,
            title: title.into(),
            unit: Some(unit.into()),
            labels: recent.iter().map(|ev| format_event_time(ev)).collect(),
            values: if values.is_empty() { vec![0.0] } else { values },
        }
    };

    vec![
        (MountPoint::EntityTabs, tabs(input, group, &id)),
        (MountPoint::CurrentData, current),
        (
            MountPoint::TemperatureChart,
            Panel::Chart(series("temperaturaC", "Temperatura (°C)", "°C")),
        ),
        (
            MountPoint::HumidityChart,
            Panel::Chart(series("humedadRel", "Humedad (%)", "%")),
        ),
        (
            MountPoint::HistoryTable,
            Panel::Table(summary_table(history, &[TIMESTAMP, "idEstacion"])),
        ),
    ]
}

fn energy(input: &RenderInput<'_>) -> Vec<(MountPoint, Panel)> {
    let group = Group::Energy;
    let id = input.entity(group);
    let history = input.cache.history(group, &id);

    let current = match input.cache.snapshot(group, &id) {
        None => missing_snapshot(),
        Some(raw) => {
            let c = adapter::normalize(group, raw);
            let items = [
                ("energiaKWh", "Energía (kWh)"),
                ("potenciaKW", "Potencia (kW)"),
                ("corrienteA", "Corriente (A)"),
                ("voltajeV", "Voltaje (V)"),
                ("ubicacion", "Ubicación"),
                ("estacionId", "ID Estación"),
                (TIMESTAMP, "Fecha/Hora"),
            ]
            .into_iter()
            .filter_map(|(key, label)| {
                let value = c.get(key)?;
                let text = match value {
                    Value::Number(_) => fixed(value, 2),
                    _ if key == TIMESTAMP => format_raw_time(value.as_str()),
                    _ => display_string(value),
                };
                Some(field(label, text, Tone::Neutral))
            })
            .collect();
            fields(items)
        }
    };

    let recent = recent_asc(history, CHART_POINTS);
    let mut unit = "kWh";
    let values: Vec<f64> = recent
        .iter()
        .filter_map(|ev| {
            let c = adapter::normalize(group, &ev.attrs);
            let v = c.f64("consumo")?;
            unit = consumption_unit(c.source("consumo"));
            Some(v)
        })
        .collect();
    let consumption = Chart {
        kind: ChartKind::Line,
        title: format!("Consumo ({unit})"),
        unit: Some(unit.to_string()),
        labels: recent.iter().map(|ev| format_event_time(ev)).collect(),
        values: if values.is_empty() { vec![0.0] } else { values },
    };

    vec![
        (MountPoint::EntityTabs, tabs(input, group, &id)),
        (MountPoint::CurrentData, current),
        (MountPoint::ConsumptionChart, Panel::Chart(consumption)),
        (
            MountPoint::HistoryTable,
            Panel::Table(summary_table(history, &[TIMESTAMP, "idMonitor"])),
        ),
    ]
}

fn devices(input: &RenderInput<'_>) -> Vec<(MountPoint, Panel)> {
    let group = Group::Devices;
    let id = input.entity(group);
    let inventory = input.cache.history(group, &id);
    let visibility = device_visibility(inventory, input.device_search);

    let rows = inventory
        .iter()
        .zip(visibility)
        .map(|(dev, (key, visible))| {
            let c = adapter::normalize(group, &dev.attrs);
            let state = c.str("estado");
            let info = attribute_summary(&dev.attrs, &DEVICE_COLUMNS, None);
            Row {
                key: key.clone(),
                cells: vec![
                    Cell::plain(key),
                    Cell::plain(text_or_na(&c, "tipo")),
                    Cell::toned(
                        c.get("estado")
                            .map(display_string)
                            .unwrap_or_else(|| "Desconocido".into()),
                        if state == Some("activo") {
                            Tone::Success
                        } else {
                            Tone::Error
                        },
                    ),
                    Cell::plain(if info.is_empty() { NA.to_string() } else { info }),
                ],
                visible,
            }
        })
        .collect();

    vec![(
        MountPoint::DeviceTable,
        Panel::Table(table(
            &["ID", "Tipo", "Estado", "Información"],
            rows,
            NO_DEVICES,
            false,
        )),
    )]
}

fn summary_table(history: &[EventRecord], skip: &[&str]) -> Table {
    let rows = sorted_desc(history)
        .into_iter()
        .enumerate()
        .map(|(i, ev)| {
            let summary = attribute_summary(&ev.attrs, skip, Some(2));
            row(
                i.to_string(),
                vec![
                    Cell::plain(format_event_time(ev)),
                    Cell::plain(if summary.is_empty() { NA.to_string() } else { summary }),
                ],
            )
        })
        .collect();
    table(&["Fecha/Hora", "Datos"], rows, NO_HISTORY, false)
}

fn tabs(input: &RenderInput<'_>, group: Group, id: &str) -> Panel {
    let items = input.sources.entities(group);
    let active = items.iter().position(|e| e == id);
    Panel::Tabs { items, active }
}

fn stat(label: &str, value: usize) -> Stat {
    Stat {
        label: label.into(),
        value,
    }
}

fn field(label: &str, value: String, tone: Tone) -> Field {
    Field {
        label: label.into(),
        value,
        tone,
    }
}

fn fields(items: Vec<Field>) -> Panel {
    let placeholder = items.is_empty().then(|| NO_FIELDS.to_string());
    Panel::Fields { items, placeholder }
}

fn missing_snapshot() -> Panel {
    Panel::Fields {
        items: Vec::new(),
        placeholder: Some(NO_CURRENT.into()),
    }
}

fn row(key: String, cells: Vec<Cell>) -> Row {
    Row {
        key,
        cells,
        visible: true,
    }
}

fn table(columns: &[&str], rows: Vec<Row>, empty: &str, load_more: bool) -> Table {
    let placeholder = rows.is_empty().then(|| empty.to_string());
    Table {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows,
        placeholder,
        load_more,
    }
}

/// Script-style truthiness of an attribute.
fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn event_type_cell(c: &CanonicalRecord) -> Cell {
    match c.get("tipoEvento") {
        None => Cell::toned(NA, Tone::Neutral),
        Some(v) => {
            let tone = if c.str("tipoEvento") == Some("entrada") {
                Tone::Success
            } else {
                Tone::Warning
            };
            Cell::toned(display_string(v), tone)
        }
    }
}

fn authorized_cell(c: &CanonicalRecord) -> Cell {
    if truthy(c.get("autorizado")) {
        Cell::toned("Sí", Tone::Success)
    } else {
        Cell::toned("No", Tone::Error)
    }
}

fn occupancy_cell(c: &CanonicalRecord) -> Cell {
    if truthy(c.get("ocupacion")) {
        Cell::toned("Ocupado", Tone::Warning)
    } else {
        Cell::toned("Libre", Tone::Success)
    }
}

fn speed(c: &CanonicalRecord, with_unit: bool) -> String {
    match c.f64("velocidadKmh") {
        Some(v) if with_unit => format!("{v:.1} km/h"),
        Some(v) => format!("{v:.1}"),
        None => NA.into(),
    }
}

fn text_or_na(c: &CanonicalRecord, concept: &str) -> String {
    c.get(concept)
        .map(display_string)
        .unwrap_or_else(|| NA.to_string())
}

fn fixed(v: &Value, decimals: usize) -> String {
    match v.as_f64() {
        Some(f) => format!("{f:.decimals$}"),
        None => display_string(v),
    }
}

fn consumption_unit(source: Option<&str>) -> &'static str {
    match source {
        Some("potenciaKW") => "kW",
        Some("potencia") | Some("consumo") => "W",
        _ => "kWh",
    }
}

pub fn format_time(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%d/%m/%Y %H:%M:%S").to_string()
}

fn format_event_time(ev: &EventRecord) -> String {
    ev.timestamp
        .as_ref()
        .map(format_time)
        .unwrap_or_else(|| NA.to_string())
}

fn format_raw_time(raw: Option<&str>) -> String {
    raw.and_then(parse_timestamp)
        .as_ref()
        .map(format_time)
        .unwrap_or_else(|| NA.to_string())
}

impl fmt::Display for DisplayModel {
    /// Plain-text dump used by the `snapshot` command.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        for (mount, panel) in &self.panels {
            writeln!(f)?;
            writeln!(f, "[{}]", mount.as_str())?;
            match panel {
                Panel::Stats { counters } => {
                    for s in counters {
                        writeln!(f, "  {}: {}", s.label, s.value)?;
                    }
                }
                Panel::Tabs { items, active } => {
                    let line: Vec<String> = items
                        .iter()
                        .enumerate()
                        .map(|(i, id)| {
                            if Some(i) == *active {
                                format!("[{id}]")
                            } else {
                                id.clone()
                            }
                        })
                        .collect();
                    writeln!(f, "  {}", line.join(" "))?;
                }
                Panel::Fields { items, placeholder } => {
                    if let Some(p) = placeholder {
                        writeln!(f, "  {p}")?;
                    }
                    for item in items {
                        writeln!(f, "  {}: {}", item.label, item.value)?;
                    }
                }
                Panel::Table(t) => {
                    writeln!(f, "  {}", t.columns.join(" | "))?;
                    if let Some(p) = &t.placeholder {
                        writeln!(f, "  {p}")?;
                    }
                    for r in t.rows.iter().filter(|r| r.visible) {
                        let cells: Vec<&str> = r.cells.iter().map(|c| c.text.as_str()).collect();
                        writeln!(f, "  {}", cells.join(" | "))?;
                    }
                    if t.load_more {
                        writeln!(f, "  (Ver más)")?;
                    }
                }
                Panel::Chart(c) => {
                    let unit = c.unit.as_deref().unwrap_or("");
                    writeln!(f, "  {} {}", c.title, unit)?;
                    let points: Vec<String> = c.values.iter().map(|v| format!("{v:.2}")).collect();
                    writeln!(f, "  {}", points.join(", "))?;
                }
            }
        }
        Ok(())
    }
}
