//! Component trait for state consumers

/// A view that renders from props computed out of app state
///
/// Components follow these rules:
/// 1. Props contain ALL read-only data needed for rendering
/// 2. `render` never mutates app state; changes go through the api in props
/// 3. Internal view state (scroll position, cached layout) may live in `&mut self`
///
/// Closures taking `&P` are components too.
///
/// # Example
///
/// ```ignore
/// use epicstore::{Api, Component};
///
/// struct CartBadge { last_drawn: String }
///
/// struct BadgeProps { items: u32, api: Api }
///
/// impl Component<BadgeProps> for CartBadge {
///     fn render(&mut self, props: &BadgeProps) {
///         self.last_drawn = format!("cart ({})", props.items);
///         println!("{}", self.last_drawn);
///     }
/// }
/// ```
pub trait Component<P>: Send {
    /// Draw with the latest props
    fn render(&mut self, props: &P);

    /// Called once when the owning consumer unmounts
    fn unmounted(&mut self) {}
}

impl<P, F> Component<P> for F
where
    F: FnMut(&P) + Send,
{
    fn render(&mut self, props: &P) {
        self(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Label {
        text: String,
        unmounted: bool,
    }

    impl Component<u32> for Label {
        fn render(&mut self, props: &u32) {
            self.text = format!("count: {}", props);
        }

        fn unmounted(&mut self) {
            self.unmounted = true;
        }
    }

    #[test]
    fn test_struct_component() {
        let mut label = Label {
            text: String::new(),
            unmounted: false,
        };
        label.render(&3);
        assert_eq!(label.text, "count: 3");
        label.unmounted();
        assert!(label.unmounted);
    }

    #[test]
    fn test_closure_component() {
        let mut seen = Vec::new();
        {
            let mut component = |props: &u32| seen.push(*props);
            Component::render(&mut component, &1);
            Component::render(&mut component, &2);
        }
        assert_eq!(seen, vec![1, 2]);
    }
}
