//! Macros for generating typed state handles.

/// Generate a typed handle over a configured state.
///
/// Every handle gets `id`, `name`, `logs_enabled` and a [`StateRef`]
/// implementation. The listed capabilities add the matching methods:
///
/// - `on_enter`: register enter callbacks
/// - `on_exit`: register exit callbacks
/// - `event`: register event transitions
/// - `transition`: access the state's single transition
///
/// [`StateRef`]: crate::builder::StateRef
macro_rules! state_handle {
    (
        $(#[$meta:meta])*
        $name:ident { $($capability:ident),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            pub(crate) handle: $crate::builder::states::StateHandle,
        }

        impl $name {
            pub fn id(&self) -> $crate::core::StateId {
                self.handle.id()
            }

            pub fn name(&self) -> &str {
                self.handle.name()
            }

            /// Emit trace lines for this state even when chart-wide logging
            /// is disabled.
            pub fn logs_enabled(&self, enabled: bool) -> &Self {
                self.handle.set_logs_enabled(enabled);
                self
            }

            $(state_handle!(@$capability);)*
        }

        impl $crate::builder::states::StateRef for $name {
            fn state_id(&self) -> $crate::core::StateId {
                self.handle.id()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.handle.id())
                    .field("name", &self.handle.name())
                    .finish()
            }
        }
    };

    (@on_enter) => {
        /// Run `action` every time the state is entered.
        pub fn on_enter(&self, action: impl FnMut() + 'static) -> &Self {
            self.handle.on_enter(Box::new(action));
            self
        }
    };

    (@on_exit) => {
        /// Run `action` every time the state is left.
        pub fn on_exit(&self, action: impl FnMut() + 'static) -> &Self {
            self.handle.on_exit(Box::new(action));
            self
        }
    };

    (@event) => {
        /// Transition taken when `event` is triggered while the state is
        /// current.
        pub fn event(&self, event: &$crate::core::Event) -> $crate::builder::Transition {
            self.handle.event(event)
        }
    };

    (@transition) => {
        /// The state's single transition. Repeated calls return the same
        /// transition.
        pub fn transition(&self) -> $crate::builder::Transition {
            self.handle.main_transition()
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::builder::StateRef;
    use crate::StatechartBuilder;

    #[test]
    fn generated_handles_expose_identity() {
        let chart = StatechartBuilder::new().build(|region| {
            let initial = region.initial("Start");
            let idle = region.state("Idle");
            initial.transition().target(&idle);

            assert_eq!(initial.name(), "Start");
            assert_eq!(idle.name(), "Idle");
            assert_eq!(idle.state_id(), idle.id());
            assert_ne!(initial.id(), idle.id());
            assert!(format!("{:?}", idle).contains("SimpleState"));
        });

        assert!(chart.is_ok());
    }

    #[test]
    fn transition_capability_is_idempotent() {
        let chart = StatechartBuilder::new().build(|region| {
            let initial = region.initial("Start");
            let done = region.final_state("Done");
            initial.transition().target(&done);
            initial.transition().on_transition(|| {});
        });

        assert!(chart.is_ok());
    }
}
