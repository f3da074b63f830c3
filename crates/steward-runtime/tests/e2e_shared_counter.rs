//! End-to-end: the shared counter scenario through the full install →
//! create → mount lifecycle.

use std::cell::Cell;
use std::rc::Rc;

use steward_core::{SharedObject, Value};
use steward_runtime::{ComponentOptions, Host, InstallOptions, SharedSource, install};

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
fn counter_scenario() {
    let host = Host::new();
    assert!(install(&host, InstallOptions::default()));

    let component = host
        .create_component(
            ComponentOptions::new("app").shared("counter", counter_source()),
            None,
        )
        .unwrap();
    host.mount(&component).unwrap();

    let counter = component.provided("counter").unwrap();
    assert_eq!(counter.get("value"), Value::Int(0));

    // Mutation through the owning method: accepted.
    counter.call("increment", &[]).unwrap();
    host.flush();
    assert_eq!(counter.get("value"), Value::Int(1));
    assert!(host.violations().is_empty());

    // Direct external assignment: applied anyway, flagged exactly once.
    counter.set("value", 5).unwrap();
    host.flush();
    assert_eq!(counter.get("value"), Value::Int(5));
    let violations = host.violations().snapshot();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].key, "counter");
    assert_eq!(violations[0].field, "value");
    assert_eq!(violations[0].value, Value::Int(5));
}

#[test]
fn state_is_mirrored_between_instance_and_store() {
    let host = Host::new();
    install(&host, InstallOptions::default());

    let component = host
        .create_component(
            ComponentOptions::new("app").shared("counter", counter_source()),
            None,
        )
        .unwrap();
    host.mount(&component).unwrap();
    let counter = component.provided("counter").unwrap();

    counter.call("increment", &[]).unwrap();
    counter.call("increment", &[]).unwrap();
    host.flush();

    assert_eq!(counter.get("value"), Value::Int(2));
    assert_eq!(
        component.store().get("counter", "value"),
        Some(Value::Int(2))
    );
}

#[test]
fn derived_value_is_cached_per_change() {
    let runs = Rc::new(Cell::new(0u32));
    let runs_in = Rc::clone(&runs);
    let source = SharedSource::factory(move || {
        let runs = Rc::clone(&runs_in);
        SharedObject::builder()
            .field("value", 0)
            .method("increment", |this, _| {
                let v = this.get("value").as_int().unwrap_or(0);
                this.set("value", v + 1)?;
                Ok(Value::Absent)
            })
            .getter("doubled", move |this| {
                runs.set(runs.get() + 1);
                Value::Int(this.get("value").as_int().unwrap_or(0) * 2)
            })
            .build()
    });

    let host = Host::new();
    install(&host, InstallOptions::default());
    let component = host
        .create_component(ComponentOptions::new("app").shared("counter", source), None)
        .unwrap();
    host.mount(&component).unwrap();
    let counter = component.provided("counter").unwrap();

    // First read computes; the second is served from the derived slot.
    assert_eq!(counter.get("doubled"), Value::Int(0));
    assert_eq!(counter.get("doubled"), Value::Int(0));
    assert_eq!(runs.get(), 1);

    counter.call("increment", &[]).unwrap();
    host.flush();
    assert_eq!(counter.get("doubled"), Value::Int(2));
    assert_eq!(counter.get("doubled"), Value::Int(2));
    assert_eq!(runs.get(), 2);
}

#[test]
fn falsy_initial_values_are_wired() {
    let source = SharedSource::factory(|| {
        SharedObject::builder()
            .field("count", 0)
            .field("enabled", false)
            .field("note", "")
            .build()
    });

    let host = Host::new();
    install(&host, InstallOptions::default());
    let component = host
        .create_component(ComponentOptions::new("app").shared("flags", source), None)
        .unwrap();
    host.mount(&component).unwrap();

    let store = component.store();
    assert_eq!(store.get("flags", "count"), Some(Value::Int(0)));
    assert_eq!(store.get("flags", "enabled"), Some(Value::Bool(false)));
    assert_eq!(store.get("flags", "note"), Some(Value::from("")));

    // Falsy state is guarded like any other state.
    let flags = component.provided("flags").unwrap();
    flags.set("enabled", true).unwrap();
    assert_eq!(host.violations().len(), 1);
}
