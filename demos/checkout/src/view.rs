//! Plain-text view of the checkout state

use epicstore::prelude::*;

use crate::checkout::{Cart, Payment};

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub cart: Cart,
    pub payment: Payment,
}

pub fn summary(state: &AppState) -> Summary {
    Summary {
        cart: state.get::<Cart>("cart").cloned().unwrap_or_default(),
        payment: state.get::<Payment>("payment").cloned().unwrap_or_default(),
    }
}

/// Prints one line per render.
#[derive(Debug, Default)]
pub struct SummaryLine {
    renders: usize,
}

impl Component<ConsumerProps<Summary, Api>> for SummaryLine {
    fn render(&mut self, props: &ConsumerProps<Summary, Api>) {
        self.renders += 1;
        let Summary { cart, payment } = &props.state;
        let status = match payment {
            Payment::Idle => "idle".to_string(),
            Payment::Pending => "paying...".to_string(),
            Payment::Paid(receipt) => format!("paid {} (receipt {})", receipt.amount, receipt.id),
            Payment::Declined(reason) => format!("declined: {}", reason),
        };
        println!(
            "[{}] cart: {} x {} = {} | payment: {}",
            self.renders,
            cart.items,
            cart.unit_price,
            cart.total(),
            status
        );
    }

    fn unmounted(&mut self) {
        println!("view closed after {} renders", self.renders);
    }
}
