use std::collections::BTreeMap;
use std::io::{self, Stdout};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Axis, BarChart, Block, BorderType, Borders, Cell as TableCell, Chart as LineChart, Clear,
    Dataset, GraphType, Paragraph, Row as TableRow, Table as TableWidget, Tabs, Wrap,
};
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::error::{Error, Result};
use crate::log_sanitize::sanitize_preview;
use crate::model::View;
use crate::render::{Chart, ChartKind, DisplayModel, Field, MountPoint, Panel, Stat, Table, Tone};
use crate::scheduler::Scheduler;
use crate::surface::{Control, RenderingSurface};
use crate::transport::Transport;

const CELL_CHARS: usize = 96;
const EVENT_TYPES: [&str; 3] = ["", "entrada", "salida"];
const AUTH_VALUES: [&str; 3] = ["", "true", "false"];

/// Surface backed by the terminal: it keeps the last model and the control
/// values typed by the user; the frame loop paints from them.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    controls: BTreeMap<Control, String>,
    model: Option<DisplayModel>,
}

impl TerminalSurface {
    pub fn set_control(&mut self, control: Control, value: &str) {
        self.controls.insert(control, value.to_string());
    }

    fn control(&self, control: Control) -> &str {
        self.controls.get(&control).map(String::as_str).unwrap_or("")
    }
}

impl RenderingSurface for TerminalSurface {
    fn has_mount(&self, _mount: MountPoint) -> bool {
        true
    }

    fn control_value(&self, control: Control) -> String {
        self.control(control).to_string()
    }

    fn draw(&mut self, model: &DisplayModel) {
        self.model = Some(model.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search { buffer: String },
}

struct App {
    dashboard: Rc<Dashboard<TerminalSurface>>,
    input: InputMode,
    scroll: usize,
    status: Option<String>,
}

impl App {
    fn new(dashboard: Rc<Dashboard<TerminalSurface>>) -> Self {
        Self {
            dashboard,
            input: InputMode::Normal,
            scroll: 0,
            status: None,
        }
    }

    fn set_control(&self, control: Control, value: &str) {
        self.dashboard.surface_mut().set_control(control, value);
        self.dashboard.controls_changed();
    }

    fn cycle_control(&mut self, control: Control, values: &[&str]) {
        let current = self.dashboard.surface().control_value(control);
        let idx = values.iter().position(|v| *v == current).unwrap_or(0);
        let next = values[(idx + 1) % values.len()];
        self.set_control(control, next);
        self.scroll = 0;
        self.status = Some(match next {
            "" => "filtro desactivado".to_string(),
            v => format!("filtro: {v}"),
        });
    }

    /// Returns true when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            return true;
        }
        if let InputMode::Search { buffer } = &mut self.input {
            match code {
                KeyCode::Esc | KeyCode::Enter => self.input = InputMode::Normal,
                KeyCode::Backspace => {
                    buffer.pop();
                    let term = buffer.clone();
                    self.set_control(Control::DeviceSearch, &term);
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    let term = buffer.clone();
                    self.set_control(Control::DeviceSearch, &term);
                }
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char(c @ '1'..='5') => {
                let idx = c as usize - '1' as usize;
                self.dashboard.navigate(View::ALL[idx]);
                self.scroll = 0;
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.dashboard.cycle_entity(-1);
                self.scroll = 0;
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.dashboard.cycle_entity(1);
                self.scroll = 0;
            }
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Char('r') => {
                // Detached: the cycle redraws through the surface as entities land.
                drop(self.dashboard.refresh());
                self.status = Some("actualizando…".into());
            }
            KeyCode::Char('a') => {
                let on = self.dashboard.toggle_auto_refresh();
                self.status = Some(format!(
                    "auto-actualización {}",
                    if on { "activada" } else { "desactivada" }
                ));
            }
            KeyCode::Char('m') => {
                if let Some(size) = self.dashboard.load_more() {
                    self.status = Some(format!("mostrando hasta {size} eventos"));
                }
            }
            KeyCode::Char('e') => self.cycle_control(Control::EventTypeFilter, &EVENT_TYPES),
            KeyCode::Char('u') => self.cycle_control(Control::AuthorizationFilter, &AUTH_VALUES),
            KeyCode::Char('/') => {
                if self.dashboard.active_view() != View::Devices {
                    self.dashboard.navigate(View::Devices);
                }
                let buffer = self.dashboard.surface().control_value(Control::DeviceSearch);
                self.input = InputMode::Search { buffer };
            }
            _ => {}
        }
        false
    }

    fn draw(&self, f: &mut ratatui::Frame) {
        let size = f.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(size);

        let surface = self.dashboard.surface();
        self.draw_header(f, chunks[0]);
        match surface.model.as_ref() {
            Some(model) => self.draw_main(f, chunks[1], model, &surface),
            None => {
                let p = Paragraph::new("cargando…").block(rounded("Monitor"));
                f.render_widget(p, chunks[1]);
            }
        }
        self.draw_footer(f, chunks[2], &surface);

        if let InputMode::Search { buffer } = &self.input {
            let area = centered_rect(50, 15, size);
            f.render_widget(Clear, area);
            let p = Paragraph::new(format!("{buffer}_")).block(rounded("Buscar dispositivo"));
            f.render_widget(p, area);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame, area: Rect) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(44)])
            .split(area);

        let titles = View::ALL
            .iter()
            .enumerate()
            .map(|(i, v)| Line::from(format!("{} {}", i + 1, v.title())))
            .collect::<Vec<_>>();
        let idx = View::ALL
            .iter()
            .position(|v| *v == self.dashboard.active_view())
            .unwrap_or(0);
        let tabs = Tabs::new(titles)
            .select(idx)
            .block(rounded("Monitor"))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::LightCyan));
        f.render_widget(tabs, cols[0]);

        let now = chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string();
        let auto = if self.dashboard.auto_refresh_enabled() {
            Span::styled("auto ON", Style::default().fg(Color::Green))
        } else {
            Span::styled("auto OFF", Style::default().fg(Color::Red))
        };
        let line = Line::from(vec![
            Span::styled(now, Style::default().fg(Color::Yellow)),
            Span::raw("  "),
            auto,
            Span::raw(format!("  ciclos={}", self.dashboard.cycles())),
        ]);
        f.render_widget(Paragraph::new(line).block(rounded("")), cols[1]);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame, area: Rect, surface: &TerminalSurface) {
        let hint = "[1-5] Vista  [←/→] Entidad  [r] Actualizar  [a] Auto  [m] Ver más  [e] Tipo  [u] Autorizado  [/] Buscar  [j/k] Desplazar  [q] Salir";
        let filters = format!(
            "tipo={}  autorizado={}  búsqueda={}",
            or_dash(surface.control(Control::EventTypeFilter)),
            or_dash(surface.control(Control::AuthorizationFilter)),
            or_dash(surface.control(Control::DeviceSearch)),
        );
        let mut lines = vec![Line::from(Span::styled(
            hint,
            Style::default().fg(Color::Gray),
        ))];
        let mut second = vec![Span::styled(filters, Style::default().fg(Color::LightBlue))];
        if let Some(status) = &self.status {
            second.push(Span::raw("  "));
            second.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
        }
        lines.push(Line::from(second));
        f.render_widget(Paragraph::new(Text::from(lines)), area);
    }

    fn draw_main(
        &self,
        f: &mut ratatui::Frame,
        area: Rect,
        model: &DisplayModel,
        surface: &TerminalSurface,
    ) {
        let slots = layout_for(model.view, area);
        for (mount, panel) in &model.panels {
            let Some((_, rect)) = slots.iter().find(|(m, _)| m == mount) else {
                continue;
            };
            self.draw_panel(f, *rect, *mount, panel, surface);
        }
    }

    fn draw_panel(
        &self,
        f: &mut ratatui::Frame,
        area: Rect,
        mount: MountPoint,
        panel: &Panel,
        surface: &TerminalSurface,
    ) {
        match panel {
            Panel::Stats { counters } => draw_stats(f, area, counters),
            Panel::Tabs { items, active } => {
                let titles = items.iter().map(|s| Line::from(s.clone())).collect::<Vec<_>>();
                let tabs = Tabs::new(titles)
                    .select(active.unwrap_or(0))
                    .block(rounded("Entidad [←/→]"))
                    .highlight_style(Style::default().fg(Color::Black).bg(Color::LightYellow));
                f.render_widget(tabs, area);
            }
            Panel::Fields { items, placeholder } => {
                draw_fields(f, area, items, placeholder.as_deref())
            }
            Panel::Table(table) => {
                let title = match mount {
                    MountPoint::LatestEvents => "Últimos eventos".to_string(),
                    MountPoint::DeviceTable => {
                        match surface.control(Control::DeviceSearch) {
                            "" => "Dispositivos".to_string(),
                            term => format!("Dispositivos (filtro: {term})"),
                        }
                    }
                    _ => "Histórico".to_string(),
                };
                self.draw_table(f, area, &title, table)
            }
            Panel::Chart(chart) => draw_chart(f, area, chart),
        }
    }

    fn draw_table(&self, f: &mut ratatui::Frame, area: Rect, title: &str, table: &Table) {
        let title = if table.load_more {
            format!("{title}  [m] Ver más")
        } else {
            title.to_string()
        };
        if let Some(placeholder) = &table.placeholder {
            let p = Paragraph::new(placeholder.as_str())
                .style(Style::default().fg(Color::DarkGray))
                .block(rounded(&title));
            f.render_widget(p, area);
            return;
        }

        let visible: Vec<_> = table.rows.iter().filter(|r| r.visible).collect();
        let offset = self.scroll.min(visible.len().saturating_sub(1));
        let rows = visible.into_iter().skip(offset).map(|r| {
            TableRow::new(
                r.cells
                    .iter()
                    .map(|c| {
                        TableCell::from(sanitize_preview(&c.text, CELL_CHARS))
                            .style(tone_style(c.tone))
                    })
                    .collect::<Vec<_>>(),
            )
        });
        let n = table.columns.len().max(1) as u32;
        let widths = table
            .columns
            .iter()
            .map(|_| Constraint::Ratio(1, n))
            .collect::<Vec<_>>();
        let header = TableRow::new(table.columns.iter().map(|c| TableCell::from(c.clone())))
            .style(Style::default().add_modifier(Modifier::BOLD));
        let widget = TableWidget::new(rows, widths)
            .header(header)
            .block(rounded(&title));
        f.render_widget(widget, area);
    }
}

fn layout_for(view: View, area: Rect) -> Vec<(MountPoint, Rect)> {
    match view {
        View::Dashboard => {
            let rows = split(Direction::Vertical, area, &[Constraint::Length(4), Constraint::Min(0)]);
            let cols = split(
                Direction::Horizontal,
                rows[1],
                &[Constraint::Percentage(65), Constraint::Percentage(35)],
            );
            vec![
                (MountPoint::StatCounters, rows[0]),
                (MountPoint::LatestEvents, cols[0]),
                (MountPoint::ActivityChart, cols[1]),
            ]
        }
        View::Devices => vec![(MountPoint::DeviceTable, area)],
        View::Cameras | View::Environmental | View::Energy => {
            let rows = split(
                Direction::Vertical,
                area,
                &[
                    Constraint::Length(3),
                    Constraint::Percentage(45),
                    Constraint::Min(0),
                ],
            );
            let cols = split(
                Direction::Horizontal,
                rows[1],
                &[Constraint::Percentage(35), Constraint::Percentage(65)],
            );
            let charts: &[MountPoint] = match view {
                View::Cameras => &[MountPoint::SpeedChart, MountPoint::EventsChart],
                View::Environmental => &[MountPoint::TemperatureChart, MountPoint::HumidityChart],
                _ => &[MountPoint::ConsumptionChart],
            };
            let chart_cols = split(
                Direction::Horizontal,
                cols[1],
                &vec![Constraint::Ratio(1, charts.len() as u32); charts.len()],
            );
            let mut out = vec![
                (MountPoint::EntityTabs, rows[0]),
                (MountPoint::CurrentData, cols[0]),
                (MountPoint::HistoryTable, rows[2]),
            ];
            out.extend(charts.iter().copied().zip(chart_cols.iter().copied()));
            out
        }
    }
}

fn split(direction: Direction, area: Rect, constraints: &[Constraint]) -> Vec<Rect> {
    Layout::default()
        .direction(direction)
        .constraints(constraints.to_vec())
        .split(area)
        .to_vec()
}

fn draw_stats(f: &mut ratatui::Frame, area: Rect, counters: &[Stat]) {
    if counters.is_empty() {
        return;
    }
    let n = counters.len() as u32;
    let cols = split(
        Direction::Horizontal,
        area,
        &vec![Constraint::Ratio(1, n); counters.len()],
    );
    for (stat, rect) in counters.iter().zip(cols) {
        let p = Paragraph::new(Line::from(Span::styled(
            stat.value.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )))
        .block(rounded(&stat.label));
        f.render_widget(p, rect);
    }
}

fn draw_fields(f: &mut ratatui::Frame, area: Rect, items: &[Field], placeholder: Option<&str>) {
    let text = match placeholder {
        Some(p) => Text::from(Span::styled(p.to_string(), Style::default().fg(Color::DarkGray))),
        None => Text::from(
            items
                .iter()
                .map(|item| {
                    Line::from(vec![
                        Span::styled(
                            format!("{}: ", item.label),
                            Style::default().fg(Color::Gray),
                        ),
                        Span::styled(
                            sanitize_preview(&item.value, CELL_CHARS),
                            tone_style(item.tone).add_modifier(Modifier::BOLD),
                        ),
                    ])
                })
                .collect::<Vec<_>>(),
        ),
    };
    let p = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(rounded("Datos actuales"));
    f.render_widget(p, area);
}

fn draw_chart(f: &mut ratatui::Frame, area: Rect, chart: &Chart) {
    match chart.kind {
        ChartKind::Line => {
            let points: Vec<(f64, f64)> = chart
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64, *v))
                .collect();
            let x_max = (points.len().saturating_sub(1) as f64).max(1.0);
            let y_max = chart.values.iter().copied().fold(0.0_f64, f64::max).max(1.0) * 1.1;
            let first = chart.labels.first().cloned().unwrap_or_default();
            let last = chart.labels.last().cloned().unwrap_or_default();
            let dataset = Dataset::default()
                .name(chart.title.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Cyan))
                .data(&points);
            let widget = LineChart::new(vec![dataset])
                .block(rounded(&chart.title))
                .x_axis(
                    Axis::default()
                        .bounds([0.0, x_max])
                        .labels(vec![Span::raw(first), Span::raw(last)])
                        .style(Style::default().fg(Color::DarkGray)),
                )
                .y_axis(
                    Axis::default()
                        .bounds([0.0, y_max])
                        .labels(vec![
                            Span::raw("0"),
                            Span::raw(format!("{:.1}", y_max / 2.0)),
                            Span::raw(format!("{y_max:.1}")),
                        ])
                        .style(Style::default().fg(Color::DarkGray)),
                );
            f.render_widget(widget, area);
        }
        ChartKind::Bar | ChartKind::Doughnut => {
            let data: Vec<(&str, u64)> = chart
                .labels
                .iter()
                .zip(chart.values.iter())
                .map(|(l, v)| (l.as_str(), v.max(0.0).round() as u64))
                .collect();
            let bar_width = (area.width.saturating_sub(2) / data.len().max(1) as u16)
                .saturating_sub(1)
                .clamp(3, 18);
            let widget = BarChart::default()
                .block(rounded(&chart.title))
                .data(data.as_slice())
                .bar_width(bar_width)
                .bar_gap(1)
                .bar_style(Style::default().fg(Color::Cyan))
                .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
            f.render_widget(widget, area);
        }
    }
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Success => Style::default().fg(Color::Green),
        Tone::Warning => Style::default().fg(Color::Yellow),
        Tone::Error => Style::default().fg(Color::Red),
        Tone::Neutral => Style::default(),
    }
}

fn rounded(title: &str) -> Block<'static> {
    Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
}

fn or_dash(v: &str) -> &str {
    if v.is_empty() { "-" } else { v }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let vertical = popup_layout[1];
    let popup_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical);
    popup_layout[1]
}

/// Interactive dashboard. Must run inside a `LocalSet`: loads and the refresh
/// timer are local tasks sharing the dashboard with the frame loop.
pub async fn run_tui(cfg: &DashboardConfig, transport: Box<dyn Transport>) -> Result<()> {
    let dashboard = Rc::new(Dashboard::from_config(
        cfg,
        transport,
        TerminalSurface::default(),
    ));
    dashboard.render_active();
    drop(dashboard.refresh());

    let mut scheduler = Scheduler::new();
    dashboard.start_auto_refresh(&mut scheduler)?;

    enable_raw_mode().map_err(|e| Error::msg(format!("failed to enter raw mode: {e}")))?;
    let mut terminal = setup_or_restore(
        || {
            execute!(io::stdout(), EnterAlternateScreen, Hide)?;
            let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
            terminal.clear()?;
            Ok(terminal)
        },
        restore_terminal,
    )?;

    let result = run_loop(&mut terminal, App::new(dashboard)).await;

    scheduler.stop();
    restore_terminal();
    result
}

/// Runs terminal setup; a failure part-way leaves raw mode and the alternate
/// screen before it is reported.
fn setup_or_restore<T>(
    setup: impl FnOnce() -> io::Result<T>,
    restore: impl FnOnce(),
) -> Result<T> {
    setup().map_err(|e| {
        restore();
        Error::msg(format!("terminal setup failed: {e}"))
    })
}

fn restore_terminal() {
    disable_raw_mode().ok();
    execute!(io::stdout(), LeaveAlternateScreen, Show).ok();
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App,
) -> Result<()> {
    let tick = Duration::from_millis(100);
    info!("terminal dashboard started");
    loop {
        let mut draw_panicked = false;
        let draw_result = terminal.draw(|f| {
            if catch_unwind(AssertUnwindSafe(|| app.draw(f))).is_err() {
                draw_panicked = true;
            }
        });
        if draw_panicked {
            warn!("frame draw panicked, clearing terminal");
            let _ = terminal.clear();
        } else if let Err(e) = draw_result {
            warn!(error = %e, "frame draw failed, clearing terminal");
            let _ = terminal.clear();
        }

        // Drain pending input without blocking; loads progress while we sleep.
        while event::poll(Duration::ZERO).map_err(|e| Error::msg(e.to_string()))? {
            if let Event::Key(k) = event::read().map_err(|e| Error::msg(e.to_string()))? {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_key(k.code, k.modifiers) {
                    info!("terminal dashboard closed");
                    return Ok(());
                }
            }
        }

        tokio::time::sleep(tick).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn app() -> App {
        let d = Dashboard::from_config(
            &DashboardConfig::default(),
            Box::new(MemoryTransport::new()),
            TerminalSurface::default(),
        );
        App::new(Rc::new(d))
    }

    #[test]
    fn filter_keys_cycle_surface_controls() {
        let mut app = app();
        app.handle_key(KeyCode::Char('e'), KeyModifiers::NONE);
        assert_eq!(
            app.dashboard.surface().control_value(Control::EventTypeFilter),
            "entrada"
        );
        app.handle_key(KeyCode::Char('u'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('u'), KeyModifiers::NONE);
        assert_eq!(
            app.dashboard.surface().control_value(Control::AuthorizationFilter),
            "false"
        );
        app.handle_key(KeyCode::Char('u'), KeyModifiers::NONE);
        assert_eq!(
            app.dashboard.surface().control_value(Control::AuthorizationFilter),
            ""
        );
    }

    #[test]
    fn number_keys_navigate_and_q_quits() {
        let mut app = app();
        assert!(!app.handle_key(KeyCode::Char('2'), KeyModifiers::NONE));
        assert_eq!(app.dashboard.active_view(), View::Cameras);
        assert_eq!(
            app.dashboard.surface().model.as_ref().map(|m| m.view),
            Some(View::Cameras)
        );
        assert!(app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE));
    }

    #[test]
    fn search_mode_types_into_device_search() {
        let mut app = app();
        app.handle_key(KeyCode::Char('/'), KeyModifiers::NONE);
        assert_eq!(app.dashboard.active_view(), View::Devices);
        for c in "sen".chars() {
            app.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
        app.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        // 'q' is text while searching.
        assert!(!app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE));
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(
            app.dashboard.surface().control_value(Control::DeviceSearch),
            "seq"
        );
        assert_eq!(app.input, InputMode::Normal);
    }

    #[test]
    fn failed_setup_restores_the_terminal() {
        let restored = std::cell::Cell::new(false);
        let err = setup_or_restore::<()>(
            || Err(io::Error::other("no tty")),
            || restored.set(true),
        )
        .unwrap_err();
        assert!(restored.get());
        assert!(err.to_string().contains("no tty"));

        let restored = std::cell::Cell::new(false);
        assert_eq!(setup_or_restore(|| Ok(7), || restored.set(true)).unwrap(), 7);
        assert!(!restored.get());
    }

    #[test]
    fn every_view_has_a_slot_for_its_panels() {
        let area = Rect::new(0, 0, 160, 48);
        for view in View::ALL {
            let slots = layout_for(view, area);
            assert!(!slots.is_empty());
        }
        assert_eq!(layout_for(View::Environmental, area).len(), 5);
    }
}
