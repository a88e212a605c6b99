//! End-to-end behaviour through the facade crate

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use epicstore::prelude::*;
use epicstore::testing::TestHarness;
use epicstore::{assert_emitted, EffectRun, NotificationBatcher};
use futures::StreamExt;
use serde_json::{json, Value};

fn counter_module(e1: &EventCreator) -> Module {
    Module::new("counter")
        .reducer("test", Reducer::new(0i64).on(e1, |n: &i64, _, _| n + 1))
        .event("e1", e1.clone())
}

#[tokio::test(start_paused = true)]
async fn test_three_dispatches_one_batched_notification() {
    let e1 = EventCreator::new("e1");
    let app = create_app("counter", [counter_module(&e1)]).unwrap();

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let batcher = NotificationBatcher::new(Duration::from_millis(16), move |state: AppState| {
        sink.lock().unwrap().push(state.get::<i64>("test").copied());
    });
    let notify = batcher.clone();
    let _sub = app.subscribe(move |state| notify.notify(state.clone()));

    for _ in 0..3 {
        app.dispatch(e1.trigger()).unwrap();
    }
    assert_eq!(app.state().get::<i64>("test"), Some(&3));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*delivered.lock().unwrap(), vec![Some(3)]);
    assert_eq!(batcher.deliveries(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_consumer_sees_burst_as_one_render() {
    let e1 = EventCreator::new("e1");
    let app = create_app("counter", [counter_module(&e1)]).unwrap();
    let renders = Arc::new(AtomicUsize::new(0));

    let counter = renders.clone();
    let mounted = Consumer::builder(&app)
        .map_state(|state| state.get::<i64>("test").copied().unwrap_or_default())
        .render(move |_: &ConsumerProps<i64, Api>| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .mount();

    for _ in 0..3 {
        app.api().trigger("e1").unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert_eq!(mounted.render_count(), 2);
}

#[tokio::test]
async fn test_effect_emits_start_success_complete() {
    let effect = create_effect("Compute", |_: Value| async { Ok::<_, String>(5) });
    let mut harness = TestHarness::new([Module::new("compute").effect("compute", effect.clone())]).unwrap();

    harness.app().api().call("compute", json!({ "n": 1 })).unwrap();
    // The future is ready on first poll.
    let events = harness.drain_emitted();

    assert_eq!(events.len(), 3);
    assert!(effect.start.is(&events[0]));
    assert_eq!(events[0].payload(), &json!({ "n": 1 }));
    assert!(effect.success.is(&events[1]));
    assert_eq!(events[1].payload(), &json!(5));
    let marker = EffectCreator::completion_of(&events[0]).unwrap();
    assert!(events[2].is(&marker));
}

#[tokio::test]
async fn test_sync_effect_failure_sequence() {
    let effect = EffectCreator::new("Validate").use_sync(|payload| {
        if payload.is_null() {
            Err("missing payload")
        } else {
            Ok(payload)
        }
    });
    let mut harness = TestHarness::new([Module::new("v").effect("validate", effect.clone())]).unwrap();

    harness.app().api().trigger("validate").unwrap();
    let events = harness.drain_emitted();

    assert_eq!(events.len(), 3);
    assert!(effect.start.is(&events[0]));
    assert!(effect.fail.is(&events[1]));
    assert_eq!(events[1].payload(), &json!("missing payload"));
    assert_emitted!(events, effect.start);
}

#[tokio::test]
async fn test_epics_chain_across_modules() {
    let order = EventCreator::new("Order placed");
    let invoice = EventCreator::new("Invoice created");
    let shipped = EventCreator::new("Shipment booked");

    let (order2, invoice2) = (order.clone(), invoice.clone());
    let billing = Module::new("billing").epic(move |events: EventStream, _: StateStream| {
        let invoice2 = invoice2.clone();
        select(&order2, events).map(move |s| invoice2.call(s.event.payload().clone()))
    });

    let (invoice3, shipped2) = (invoice.clone(), shipped.clone());
    let shipping = Module::new("shipping")
        .reducer(
            "booked",
            Reducer::new(Vec::<i64>::new()).on(&shipped, |v: &Vec<i64>, p: &Value, _| {
                let mut next = v.clone();
                next.push(p.as_i64().unwrap_or_default());
                next
            }),
        )
        .epic(move |events: EventStream, _: StateStream| {
            let shipped2 = shipped2.clone();
            select(&invoice3, events).map(move |s| shipped2.call(s.event.payload().clone()))
        });

    let app = create_app("shop", [billing, shipping]).unwrap();
    app.dispatch(order.call(1)).unwrap();
    app.dispatch(order.call(2)).unwrap();

    assert_eq!(app.state().get::<Vec<i64>>("booked"), Some(&vec![1, 2]));
}

#[tokio::test(start_paused = true)]
async fn test_epic_driven_effect_and_stop() {
    let submit = EventCreator::new("Submit");
    let charge = create_effect("Charge", |payload: Value| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, String>(payload)
    });
    let charged = Reducer::new(0usize).on(&charge.success, |n: &usize, _, _| n + 1);

    let (submit2, charge2) = (submit.clone(), charge.clone());
    let module = Module::new("checkout")
        .reducer("charged", charged)
        .epic(move |events: EventStream, _: StateStream| {
            let charge2 = charge2.clone();
            select(&submit2, events)
                .flat_map(move |s| charge2.call(s.event.payload().clone()).unwrap_or_else(|_| EffectRun::empty()))
        });
    let app = create_app("shop", [module]).unwrap();

    app.dispatch(submit.call(1)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.state().get::<usize>("charged"), Some(&1));

    app.stop().unwrap();
    assert_eq!(app.status(), AppStatus::Stopped);
    assert!(app.dispatch(submit.call(2)).is_err());
}
