//! Cart and payment module

use std::time::Duration;

use epicstore::prelude::*;
use epicstore::EffectRun;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    pub items: u32,
    pub unit_price: u64,
}

impl Cart {
    pub fn total(&self) -> u64 {
        u64::from(self.items) * self.unit_price
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payment {
    #[default]
    Idle,
    Pending,
    Paid(Receipt),
    Declined(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub amount: u64,
}

/// Payment gateway behaviour for one run.
#[derive(Debug, Clone, Copy)]
pub struct Gateway {
    pub latency: Duration,
    pub decline: bool,
}

/// Handles the demo drives.
pub struct Checkout {
    pub module: Module,
    pub submit: EventCreator,
    pub pay: EffectCreator,
}

pub fn checkout(unit_price: u64, gateway: Gateway) -> Checkout {
    let cart = create_reducer(Cart {
        items: 0,
        unit_price,
    });
    let cart_events = cart.create_events(
        Handlers::new()
            .add_trigger("add", |cart: &Cart| Cart {
                items: cart.items + 1,
                ..cart.clone()
            })
            .add_trigger("remove", |cart: &Cart| Cart {
                items: cart.items.saturating_sub(1),
                ..cart.clone()
            }),
    );

    let submit = EventCreator::new("Submit order");
    let pay = create_effect("Pay", move |payload: Value| async move {
        tokio::time::sleep(gateway.latency).await;
        let amount = payload["amount"].as_u64().unwrap_or_default();
        if gateway.decline {
            return Err(format!("card declined for {}", amount));
        }
        if amount == 0 {
            return Err("nothing to pay".to_string());
        }
        Ok(Receipt {
            id: epicstore::unique_id().to_string(),
            amount,
        })
    });

    let payment = create_reducer(Payment::default())
        .on(&pay, |_: &Payment, _, _| Payment::Pending)
        .on(&pay.success, |_: &Payment, payload: &Value, _| {
            match serde_json::from_value::<Receipt>(payload.clone()) {
                Ok(receipt) => Payment::Paid(receipt),
                Err(e) => Payment::Declined(e.to_string()),
            }
        })
        .on(&pay.fail, |_: &Payment, payload: &Value, _| {
            Payment::Declined(payload.as_str().unwrap_or("unknown error").to_string())
        });

    // Emptying the cart once paid.
    let cart = cart.on(&pay.success, |cart: &Cart, _, _| Cart {
        items: 0,
        ..cart.clone()
    });

    let (submit2, pay2) = (submit.clone(), pay.clone());
    let pay_on_submit = move |events: EventStream, _: StateStream| {
        let pay2 = pay2.clone();
        select(&submit2, events).flat_map(move |selection| {
            let total = selection
                .state
                .get::<Cart>("cart")
                .map(Cart::total)
                .unwrap_or_default();
            match pay2.call(serde_json::json!({ "amount": total })) {
                Ok(run) => run,
                Err(e) => {
                    tracing::warn!(error = %e, "payment effect unavailable");
                    EffectRun::empty()
                }
            }
        })
    };

    let module = Module::new("checkout")
        .reducer("cart", cart)
        .reducer("payment", payment)
        .events(cart_events)
        .event("submit", submit.clone())
        .effect("pay", pay.clone())
        .epic(pay_on_submit);

    Checkout {
        module,
        submit,
        pay,
    }
}
