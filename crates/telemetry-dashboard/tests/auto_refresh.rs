use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;
use tokio::time::sleep;

use telemetry_dashboard::config::{DashboardConfig, RefreshConfig};
use telemetry_dashboard::dashboard::Dashboard;
use telemetry_dashboard::scheduler::Scheduler;
use telemetry_dashboard::surface::RecordingSurface;
use telemetry_dashboard::transport::MemoryTransport;

fn dashboard(interval_ms: u64, auto: bool) -> Rc<Dashboard<RecordingSurface>> {
    let cfg = DashboardConfig {
        refresh: RefreshConfig { interval_ms, auto },
        ..DashboardConfig::default()
    };
    Rc::new(Dashboard::from_config(
        &cfg,
        Box::new(MemoryTransport::new()),
        RecordingSurface::new(),
    ))
}

#[tokio::test(start_paused = true)]
async fn timer_runs_cycles_while_enabled() {
    LocalSet::new()
        .run_until(async {
            let d = dashboard(1_000, true);
            let mut scheduler = Scheduler::new();
            d.start_auto_refresh(&mut scheduler).unwrap();
            assert!(scheduler.is_running());

            sleep(Duration::from_millis(3_500)).await;
            assert_eq!(d.cycles(), 3);

            assert!(!d.toggle_auto_refresh());
            sleep(Duration::from_millis(2_000)).await;
            assert_eq!(d.cycles(), 3);

            assert!(d.toggle_auto_refresh());
            sleep(Duration::from_millis(1_000)).await;
            assert_eq!(d.cycles(), 4);

            scheduler.stop();
            sleep(Duration::from_millis(5_000)).await;
            assert_eq!(d.cycles(), 4);
            assert!(!scheduler.is_running());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn disabled_on_start_means_no_ticks_run_a_cycle() {
    LocalSet::new()
        .run_until(async {
            let d = dashboard(500, false);
            let mut scheduler = Scheduler::new();
            d.start_auto_refresh(&mut scheduler).unwrap();
            sleep(Duration::from_millis(2_100)).await;
            assert_eq!(d.cycles(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_leaves_the_schedule_alone() {
    LocalSet::new()
        .run_until(async {
            let d = dashboard(1_000, true);
            let mut scheduler = Scheduler::new();
            d.start_auto_refresh(&mut scheduler).unwrap();

            sleep(Duration::from_millis(600)).await;
            d.refresh().await.unwrap();
            assert_eq!(d.cycles(), 1);

            // Still due at t=1000, not pushed back to t=1600.
            sleep(Duration::from_millis(450)).await;
            assert_eq!(d.cycles(), 2);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn restarting_does_not_stack_timers() {
    LocalSet::new()
        .run_until(async {
            let d = dashboard(1_000, true);
            let mut scheduler = Scheduler::new();
            d.start_auto_refresh(&mut scheduler).unwrap();
            d.start_auto_refresh(&mut scheduler).unwrap();
            d.start_auto_refresh(&mut scheduler).unwrap();

            sleep(Duration::from_millis(2_500)).await;
            assert_eq!(d.cycles(), 2);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn setting_the_flag_gates_running_timer() {
    LocalSet::new()
        .run_until(async {
            let d = dashboard(1_000, true);
            let mut scheduler = Scheduler::new();
            d.start_auto_refresh(&mut scheduler).unwrap();

            d.set_auto_refresh(false);
            assert!(!d.auto_refresh_enabled());
            assert!(!d.view_state().auto_refresh_enabled);
            sleep(Duration::from_millis(2_500)).await;
            assert_eq!(d.cycles(), 0);
            assert!(scheduler.is_running());

            d.set_auto_refresh(true);
            sleep(Duration::from_millis(1_000)).await;
            assert_eq!(d.cycles(), 1);
        })
        .await;
}
