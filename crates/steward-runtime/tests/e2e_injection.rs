//! End-to-end: provide/inject across a component tree, and reuse of
//! already-wired instances.

use std::rc::Rc;

use steward_core::{Prototype, SharedObject, Value, extract};
use steward_runtime::{ComponentOptions, Host, InstallOptions, SharedSource, install};

fn session_source() -> SharedSource {
    SharedSource::factory(|| {
        let proto = Prototype::builder("Session")
            .method("login", |this, args| {
                let user = args
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or("anon")
                    .to_string();
                this.set("user", user)?;
                this.set("attempts", this.get("attempts").as_int().unwrap_or(0) + 1)?;
                Ok(Value::Absent)
            })
            .method("logout", |this, _| {
                this.set("user", "")?;
                Ok(Value::Absent)
            })
            .getter("is_logged_in", |this| {
                Value::Bool(!this.get("user").as_str().unwrap_or("").is_empty())
            })
            .build();
        SharedObject::with_prototype(proto)
            .field("user", "")
            .field("attempts", 0)
            .build()
    })
}

#[test]
fn descendants_share_the_ancestor_instance() {
    let host = Host::new();
    install(&host, InstallOptions::default());

    let root = host
        .create_component(
            ComponentOptions::new("root").shared("session", session_source()),
            None,
        )
        .unwrap();
    let header = host
        .create_component(ComponentOptions::new("header"), Some(&root))
        .unwrap();
    let avatar = host
        .create_component(ComponentOptions::new("avatar"), Some(&header))
        .unwrap();
    host.mount(&root).unwrap();

    // A deep descendant resolves the same object the root provided.
    let session = avatar.inject("session").expect("inherited");
    assert_eq!(session.id(), root.provided("session").unwrap().id());

    // Mutation through the instance's own method, driven from the leaf.
    session.call("login", &[Value::from("ada")]).unwrap();
    host.flush();

    assert_eq!(session.get("user"), Value::from("ada"));
    assert_eq!(session.get("is_logged_in"), Value::Bool(true));
    assert_eq!(
        root.store().get("session", "user"),
        Some(Value::from("ada"))
    );
    assert!(host.violations().is_empty());

    // A consumer writing directly is flagged, but the write lands.
    session.set("user", "mallory").unwrap();
    host.flush();
    assert_eq!(session.get("user"), Value::from("mallory"));
    assert_eq!(host.violations().len(), 1);
}

#[test]
fn inherited_members_are_wired_like_own_members() {
    let host = Host::new();
    install(&host, InstallOptions::default());

    let root = host
        .create_component(
            ComponentOptions::new("root").shared("session", session_source()),
            None,
        )
        .unwrap();
    host.mount(&root).unwrap();
    let session = root.provided("session").unwrap();

    // Prototype methods were wrapped: calling one pushes a frame.
    session.call("logout", &[]).unwrap();
    let ctx = host.current_context().expect("wrapped prototype method");
    assert_eq!(ctx.method, "logout");
    host.flush();
    assert!(host.violations().is_empty());

    // Prototype getter is served from the derived registry.
    assert!(
        root.computed()
            .contains(&steward_runtime::computed_slot_name("session", "is_logged_in"))
    );
}

#[test]
fn already_wired_instance_is_not_rewired() {
    let host = Host::new();
    install(&host, InstallOptions::default());

    let first = host
        .create_component(
            ComponentOptions::new("owner").shared("session", session_source()),
            None,
        )
        .unwrap();
    host.mount(&first).unwrap();
    let session = first.provided("session").unwrap();

    // The wired instance now has no bare state fields left.
    assert!(!extract(&session).has_state());

    // A second component reusing the same object: pass-through, no duplicate
    // store record, no duplicate derived slots.
    let second = host
        .create_component(
            ComponentOptions::new("borrower")
                .shared("session", SharedSource::instance(Rc::clone(&session))),
            None,
        )
        .unwrap();
    host.mount(&second).unwrap();

    assert!(!second.store().contains_record("session"));
    assert!(second.computed().is_empty());
    assert_eq!(
        second.provided("session").unwrap().id(),
        session.id()
    );

    // Behavior still flows through the original wiring.
    session.call("login", &[Value::from("grace")]).unwrap();
    host.flush();
    assert_eq!(
        first.store().get("session", "user"),
        Some(Value::from("grace"))
    );
    assert!(host.violations().is_empty());
}

#[test]
fn sibling_components_get_independent_instances_from_a_factory() {
    let host = Host::new();
    install(&host, InstallOptions::default());

    let left = host
        .create_component(
            ComponentOptions::new("left").shared("session", session_source()),
            None,
        )
        .unwrap();
    let right = host
        .create_component(
            ComponentOptions::new("right").shared("session", session_source()),
            None,
        )
        .unwrap();
    host.mount(&left).unwrap();
    host.mount(&right).unwrap();

    let a = left.provided("session").unwrap();
    let b = right.provided("session").unwrap();
    assert_ne!(a.id(), b.id());

    a.call("login", &[Value::from("ada")]).unwrap();
    host.flush();
    assert_eq!(a.get("user"), Value::from("ada"));
    assert_eq!(b.get("user"), Value::from(""));
    assert!(host.violations().is_empty());
}
