//! Consumer behaviour under a paused tokio clock

use std::sync::{Arc, Mutex};
use std::time::Duration;

use epicstore_consumer::{Component, Consumer, ConsumerConfig, ConsumerProps};
use epicstore_core::{advance_time, create_app, pause_time, Api, App, EventCreator, Module, Reducer};

struct Counters {
    app: App,
    bump: EventCreator,
    other: EventCreator,
}

fn counters() -> Counters {
    let bump = EventCreator::new("Bump");
    let other = EventCreator::new("Other");
    let module = Module::new("counters")
        .reducer("count", Reducer::new(0i64).on(&bump, |n: &i64, _, _| n + 1))
        .reducer("other", Reducer::new(0i64).on(&other, |n: &i64, _, _| n + 1))
        .event("bump", bump.clone());
    let app = create_app("test", [module]).unwrap();
    Counters { app, bump, other }
}

fn count(state: &epicstore_core::AppState) -> i64 {
    state.get::<i64>("count").copied().unwrap_or_default()
}

type Seen = Arc<Mutex<Vec<i64>>>;

fn recorder() -> (Seen, impl FnMut(&ConsumerProps<i64, Api>) + Send + 'static) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |props: &ConsumerProps<i64, Api>| {
        sink.lock().unwrap().push(props.state)
    })
}

#[tokio::test(start_paused = true)]
async fn test_burst_renders_once_per_tick() {
    let c = counters();
    let (seen, render) = recorder();
    let mounted = Consumer::builder(&c.app).map_state(count).render(render).mount();

    for _ in 0..3 {
        c.app.dispatch(c.bump.trigger()).unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), vec![0]);

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*seen.lock().unwrap(), vec![0, 3]);
    assert_eq!(mounted.render_count(), 2);
}

#[tokio::test]
async fn test_tick_under_manual_clock() {
    pause_time();
    let c = counters();
    let (seen, render) = recorder();
    let _mounted = Consumer::builder(&c.app).map_state(count).render(render).mount();

    for _ in 0..3 {
        c.app.dispatch(c.bump.trigger()).unwrap();
    }
    advance_time(Duration::from_millis(10)).await;
    tokio::task::yield_now().await;
    assert_eq!(*seen.lock().unwrap(), vec![0]);

    advance_time(Duration::from_millis(10)).await;
    tokio::task::yield_now().await;
    assert_eq!(*seen.lock().unwrap(), vec![0, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_custom_tick() {
    let c = counters();
    let (seen, render) = recorder();
    let _mounted = Consumer::builder(&c.app)
        .map_state(count)
        .config(ConsumerConfig::default().with_tick(Duration::from_millis(100)))
        .render(render)
        .mount();

    c.app.dispatch(c.bump.trigger()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*seen.lock().unwrap(), vec![0]);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_selection_skips_render() {
    let c = counters();
    let (seen, render) = recorder();
    let mounted = Consumer::builder(&c.app).map_state(count).render(render).mount();

    c.app.dispatch(c.other.trigger()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*seen.lock().unwrap(), vec![0]);
    assert_eq!(mounted.render_count(), 1);
    assert_eq!(c.app.state().get::<i64>("other"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_unmount_closes_subscription() {
    let c = counters();
    let (seen, render) = recorder();
    let mut mounted = Consumer::builder(&c.app).map_state(count).render(render).mount();

    c.app.dispatch(c.bump.trigger()).unwrap();
    mounted.unmount();
    assert!(mounted.subscription().is_closed());
    assert!(!mounted.is_mounted());

    c.app.dispatch(c.bump.trigger()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The pending notification was dropped along with the later one.
    assert_eq!(*seen.lock().unwrap(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_set_map_state_resubscribes_and_renders() {
    let c = counters();
    let (seen, render) = recorder();
    let mut mounted = Consumer::builder(&c.app).map_state(count).render(render).mount();
    let first = mounted.subscription().is_closed();

    mounted.set_map_state(|state| count(state) * 10);
    assert!(!first);
    assert!(!mounted.subscription().is_closed());
    assert_eq!(*seen.lock().unwrap(), vec![0, 0]);

    c.app.dispatch(c.bump.trigger()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*seen.lock().unwrap(), vec![0, 0, 10]);
    assert_eq!(mounted.render_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_map_api_and_merge_props() {
    let c = counters();
    let labels = Arc::new(Mutex::new(Vec::new()));

    let sink = labels.clone();
    let mut mounted = Consumer::builder(&c.app)
        .map_state(count)
        .map_api(|api: &Api| api.get("bump"))
        .merge_props(|n: &i64, bump| (format!("count={}", n), bump.is_some()))
        .render(move |props: &(String, bool)| sink.lock().unwrap().push(props.clone()))
        .mount();

    // The bound dispatcher built once at mount drives the app.
    let bump = mounted.api_props();
    Option::as_ref(&bump).unwrap().trigger().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    mounted.set_merge_props(|n: &i64, _| (format!("n={}", n), false));

    assert_eq!(
        *labels.lock().unwrap(),
        vec![
            ("count=0".to_string(), true),
            ("count=1".to_string(), true),
            ("n=1".to_string(), false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_map_api_rebuilds_api_props() {
    let c = counters();
    let mut mounted = Consumer::builder(&c.app)
        .map_api(|api: &Api| api.names().count())
        .render(|_: &ConsumerProps<epicstore_core::AppState, usize>| {})
        .mount();
    assert_eq!(*mounted.api_props(), 1);

    mounted.set_map_api(|_| 42);
    assert_eq!(*mounted.api_props(), 42);
    assert_eq!(mounted.render_count(), 2);
}

struct Badge {
    drawn: Arc<Mutex<Vec<String>>>,
    unmounted: Arc<Mutex<bool>>,
}

impl Component<ConsumerProps<i64, Api>> for Badge {
    fn render(&mut self, props: &ConsumerProps<i64, Api>) {
        self.drawn.lock().unwrap().push(format!("[{}]", props.state));
    }

    fn unmounted(&mut self) {
        *self.unmounted.lock().unwrap() = true;
    }
}

#[tokio::test(start_paused = true)]
async fn test_component_lifecycle() {
    let c = counters();
    let drawn = Arc::new(Mutex::new(Vec::new()));
    let unmounted = Arc::new(Mutex::new(false));

    let mounted = Consumer::builder(&c.app)
        .map_state(count)
        .component(Badge {
            drawn: drawn.clone(),
            unmounted: unmounted.clone(),
        })
        .mount();

    c.app.api().trigger("bump").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(mounted);

    assert_eq!(*drawn.lock().unwrap(), vec!["[0]", "[1]"]);
    assert!(*unmounted.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_app_stop_closes_consumer_subscription() {
    let c = counters();
    let (_seen, render) = recorder();
    let mounted = Consumer::builder(&c.app).map_state(count).render(render).mount();

    c.app.stop().unwrap();
    assert!(mounted.subscription().is_closed());
}
