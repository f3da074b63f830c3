#![forbid(unsafe_code)]

//! The steward plugin: install surface and lifecycle hook bodies.
//!
//! [`install`] contributes one mixin to the host:
//!
//! - `before_create` realizes each declared shared instance, classifies its
//!   members, wires it into the component's store and derived-value registry,
//!   and provides it under its key for the component's subtree;
//! - `mounted` attaches the mutation guard per key and then invokes the
//!   instance's optional `initialize` member — through its wired wrapper, so
//!   startup mutations are attributed like any other method call.

use std::rc::Rc;

use steward_core::extract;

use crate::error::{Result, StewardError};
use crate::guard;
use crate::host::{Component, Host, Mixin};
use crate::wire;

/// Mixin name used for install idempotence.
pub const PLUGIN_NAME: &str = "steward";

/// Optional startup member invoked at mount, if the instance defines it.
pub const INITIALIZE: &str = "initialize";

/// Install options. Nothing configurable yet; reserved for growth.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct InstallOptions {}

/// Install the steward mixin into `host`. At most once per host instance:
/// returns `false` (and changes nothing) if already installed.
pub fn install(host: &Host, options: InstallOptions) -> bool {
    let _ = options;
    host.register_mixin(
        Mixin::new(PLUGIN_NAME)
            .on_before_create(before_create)
            .on_mounted(mounted),
    )
}

fn before_create(host: &Host, component: &Rc<Component>) -> Result<()> {
    for (key, source) in component.shared_declarations() {
        let instance = source.realize();
        let metadata = extract(&instance);
        wire::wire(
            key,
            &instance,
            &metadata,
            component.store(),
            component.computed(),
            host.context_stack(),
            host.scheduler(),
            component.id(),
        )
        .map_err(|source| StewardError::Wire {
            key: key.clone(),
            source,
        })?;
        component.provide(key.clone(), instance);
    }
    Ok(())
}

fn mounted(host: &Host, component: &Rc<Component>) -> Result<()> {
    for (key, _) in component.shared_declarations() {
        let Some(instance) = component.provided(key) else {
            // Creation provides every declared key; nothing to guard if a
            // custom hook removed it.
            tracing::warn!(key = %key, "no provided instance at mount");
            continue;
        };
        let subscription = guard::attach(
            key,
            &instance,
            component.store(),
            host.context_stack(),
            host.violations(),
        );
        component.push_guard(subscription);

        if instance
            .descriptor(INITIALIZE)
            .is_some_and(|d| d.is_callable())
        {
            instance
                .call(INITIALIZE, &[])
                .map_err(|source| StewardError::Startup {
                    key: key.clone(),
                    source,
                })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ComponentOptions, SharedSource};
    use steward_core::{SharedObject, Value};

    fn counter_source() -> SharedSource {
        SharedSource::factory(|| {
            SharedObject::builder()
                .field("value", 0)
                .method("increment", |this, _| {
                    let v = this.get("value").as_int().unwrap_or(0);
                    this.set("value", v + 1)?;
                    Ok(Value::Absent)
                })
                .build()
        })
    }

    #[test]
    fn install_is_idempotent() {
        let host = Host::new();
        assert!(install(&host, InstallOptions::default()));
        assert!(!install(&host, InstallOptions::default()));
        assert!(host.has_mixin(PLUGIN_NAME));
    }

    #[test]
    fn before_create_wires_and_provides() {
        let host = Host::new();
        install(&host, InstallOptions::default());

        let component = host
            .create_component(
                ComponentOptions::new("app").shared("counter", counter_source()),
                None,
            )
            .unwrap();

        let instance = component.provided("counter").expect("provided");
        assert_eq!(instance.get("value"), Value::Int(0));
        assert_eq!(
            component.store().get("counter", "value"),
            Some(Value::Int(0))
        );
    }

    #[test]
    fn initialize_runs_attributed_at_mount() {
        let host = Host::new();
        install(&host, InstallOptions::default());

        let source = SharedSource::factory(|| {
            SharedObject::builder()
                .field("ready", false)
                .method(INITIALIZE, |this, _| {
                    this.set("ready", true)?;
                    Ok(Value::Absent)
                })
                .build()
        });
        let component = host
            .create_component(ComponentOptions::new("app").shared("boot", source), None)
            .unwrap();
        host.mount(&component).unwrap();
        host.flush();

        let instance = component.provided("boot").unwrap();
        assert_eq!(instance.get("ready"), Value::Bool(true));
        assert!(host.violations().is_empty());
    }

    #[test]
    fn failing_initialize_surfaces_as_startup_error() {
        let host = Host::new();
        install(&host, InstallOptions::default());

        let source = SharedSource::factory(|| {
            SharedObject::builder()
                .field("x", 1)
                .method(INITIALIZE, |_, _| {
                    Err(steward_core::ObjectError::behavior("no backend"))
                })
                .build()
        });
        let component = host
            .create_component(ComponentOptions::new("app").shared("svc", source), None)
            .unwrap();
        let err = host.mount(&component).unwrap_err();
        assert!(matches!(err, StewardError::Startup { .. }));
    }

    #[test]
    fn wiring_failure_aborts_component_creation() {
        let host = Host::new();
        install(&host, InstallOptions::default());

        let source = SharedSource::factory(|| {
            SharedObject::builder().field("_steward_bad", 1).build()
        });
        let err = host
            .create_component(ComponentOptions::new("app").shared("bad", source), None)
            .unwrap_err();
        assert!(matches!(err, StewardError::Wire { .. }));
    }
}
