//! End-to-end runtime behavior: ordering, transition protocol, escalation,
//! composition, and failure policy.

use flywheel::action::{before_enter, create_action, enter, ENTER, EXIT};
use flywheel::context::{create_initial_context, Context, ContextOptions, LogLevel};
use flywheel::effect::{effect, go_back, log, output};
use flywheel::runtime::{create_runtime, RuntimeError};
use flywheel::snapshot::StateCatalog;
use flywheel::state::{state, state_with_nested, Nested, StateTransition};
use flywheel::returns;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type LogSink = Arc<Mutex<Vec<(LogLevel, String)>>>;

fn capture_logger(sink: &LogSink) -> ContextOptions {
    let sink = sink.clone();
    ContextOptions {
        custom_logger: Some(Arc::new(move |level, message: &str, _data: &Value| {
            sink.lock().push((level, message.to_owned()));
        })),
        ..ContextOptions::default()
    }
}

fn messages(sink: &LogSink) -> Vec<String> {
    sink.lock().iter().map(|(_, m)| m.clone()).collect()
}

#[tokio::test]
async fn submissions_run_in_arrival_order_and_notify_once_each() {
    let add = create_action("Add");
    let multiply = create_action("Multiply");

    let counter = state::<i64>("Counter")
        .on(ENTER, |_total, _payload, _cx| ())
        .on("Add", |total: i64, payload, cx| {
            cx.update(total + payload.as_i64().unwrap_or(0))
        })
        .on("Multiply", |total: i64, payload, cx| {
            cx.update(total * payload.as_i64().unwrap_or(1))
        })
        .build();

    let context =
        create_initial_context(vec![counter.with(0)], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Add", "Multiply"], None, None);

    runtime.run(enter()).await.unwrap();

    let notifications = Arc::new(AtomicUsize::new(0));
    let count = notifications.clone();
    let _sub = runtime.on_context_change(move |_ctx| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    let bound = runtime.bind_actions(&[add, multiply]);
    let (bound_add, bound_multiply) = (&bound[0], &bound[1]);

    // Queue five submissions without waiting in between; the result is only
    // ((((0+2)*2)+3)*5)+1 = 36 if they run strictly in arrival order.
    let handles = vec![
        bound_add.send(2),
        bound_multiply.send(2),
        bound_add.send(3),
        bound_multiply.send(5),
        bound_add.send(1),
    ];
    for handle in handles {
        handle.settled().await.unwrap();
    }

    let current = runtime.current_state().unwrap();
    assert_eq!(current.data::<i64>(), Some(&36));
    assert_eq!(notifications.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn transitions_replay_the_exit_enter_protocol() {
    let next = create_action("Next");

    let c = state::<()>("C")
        .on(ENTER, |_d, _p, _cx| log("Entered C"))
        .build();
    let c_for_b = c.clone();
    let b = state::<()>("B")
        .on(ENTER, |_d, _p, _cx| log("Entered B"))
        .on("Next", move |_d, _p, _cx| c_for_b.with(()))
        .build();
    let b_for_a = b.clone();
    let a = state::<()>("A")
        .on(ENTER, |_d, _p, _cx| log("Entered A"))
        .on(EXIT, |_d, _p, _cx| log("Exited A"))
        .on("Next", move |_d, _p, _cx| b_for_a.with(()))
        .build();

    let sink: LogSink = Arc::new(Mutex::new(Vec::new()));
    let context = create_initial_context(vec![a.with(())], capture_logger(&sink)).unwrap();
    let runtime = create_runtime(context, &["Next"], None, None);

    runtime.run(enter()).await.unwrap();
    runtime.run(next.make()).await.unwrap();
    runtime.run(next.make()).await.unwrap();

    assert_eq!(
        messages(&sink),
        vec![
            "Entered A",
            "Exited A",
            "Enter: B",
            "Entered B",
            "Enter: C",
            "Entered C",
        ]
    );
    assert_eq!(runtime.current_history().names(), vec!["C", "B", "A"]);
}

#[tokio::test]
async fn updates_fold_history_while_reenters_append() {
    let counter = state::<i64>("Counter")
        .on(ENTER, |_t, _p, _cx| ())
        .on("Inc", |total: i64, _p, cx| cx.update(total + 1))
        .on("Reset", |_total, _p, cx| cx.reenter(0))
        .build();

    let context =
        create_initial_context(vec![counter.with(0)], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Inc", "Reset"], None, None);

    runtime.run(enter()).await.unwrap();
    for _ in 0..3 {
        runtime.run(create_action("Inc").make()).await.unwrap();
    }
    assert_eq!(runtime.current_history().len(), 1);
    assert_eq!(runtime.current_state().unwrap().data::<i64>(), Some(&3));

    runtime.run(create_action("Reset").make()).await.unwrap();
    assert_eq!(runtime.current_history().len(), 2);
    assert_eq!(runtime.current_state().unwrap().data::<i64>(), Some(&0));
}

#[tokio::test]
async fn go_back_repushes_the_previous_state() {
    let a = state::<String>("A")
        .on(ENTER, |_d, _p, _cx| ())
        .build();
    let b = state::<()>("B")
        .on(ENTER, |_d, _p, _cx| ())
        .on(EXIT, |_d, _p, _cx| log("Exit B"))
        .on("Back", |_d, _p, _cx| go_back())
        .build();

    let sink: LogSink = Arc::new(Mutex::new(Vec::new()));
    let context = create_initial_context(
        vec![b.with(()), a.with("Test".to_owned())],
        capture_logger(&sink),
    )
    .unwrap();
    let runtime = create_runtime(context, &["Back"], None, None);

    runtime.run(enter()).await.unwrap();
    runtime.run(create_action("Back").make()).await.unwrap();

    let logged = messages(&sink);
    let exit_at = logged.iter().position(|m| m == "Exit B").unwrap();
    let enter_at = logged.iter().position(|m| m == "Enter: A").unwrap();
    assert!(exit_at < enter_at);

    let current = runtime.current_state().unwrap();
    assert_eq!(current.name(), "A");
    assert_eq!(current.data::<String>(), Some(&"Test".to_owned()));
    assert_eq!(runtime.current_history().len(), 3);
}

#[tokio::test]
async fn unhandled_actions_follow_the_allow_unhandled_policy() {
    let a = state::<()>("A").build();

    let strict =
        create_initial_context(vec![a.with(())], ContextOptions::default()).unwrap();
    let strict_runtime = create_runtime(strict, &["Poke"], None, None);

    let err = strict_runtime
        .run(create_action("Poke").make())
        .await
        .unwrap_err();
    match err {
        RuntimeError::NoStatesRespondToAction { states, .. } => {
            assert_eq!(states, vec!["A".to_owned()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let lenient = create_initial_context(
        vec![a.with(())],
        ContextOptions {
            allow_unhandled: true,
            ..ContextOptions::default()
        },
    )
    .unwrap();
    let lenient_runtime = create_runtime(lenient, &["Poke"], None, None);
    lenient_runtime
        .run(create_action("Poke").make())
        .await
        .unwrap();
}

#[tokio::test]
async fn fallback_sees_the_declining_state() {
    let b = state::<String>("B")
        .on(ENTER, |_d, _p, _cx| ())
        .build();

    let b_for_fallback = b.clone();
    let fallback = state::<StateTransition>("Fallback")
        .on("Jump", move |current: StateTransition, _p, _cx| {
            let name = current.data::<String>().cloned().unwrap_or_default();
            b_for_fallback.with(format!("{name}{name}"))
        })
        .build();

    let a = state::<String>("A").build();
    let context = create_initial_context(
        vec![a.with("Test".to_owned())],
        ContextOptions::default(),
    )
    .unwrap();
    let runtime = create_runtime(context, &["Jump"], Some(fallback), None);

    runtime.run(create_action("Jump").make()).await.unwrap();

    let current = runtime.current_state().unwrap();
    assert_eq!(current.name(), "B");
    assert_eq!(current.data::<String>(), Some(&"TestTest".to_owned()));
}

#[tokio::test]
async fn unhandled_actions_escalate_to_the_parent() {
    let parent_b = state::<()>("ParentB")
        .on(ENTER, |_d, _p, _cx| ())
        .build();
    let parent_b_clone = parent_b.clone();
    let parent_a = state::<()>("ParentA")
        .on("Promote", move |_d, _p, _cx| parent_b_clone.with(()))
        .build();

    let parent_context =
        create_initial_context(vec![parent_a.with(())], ContextOptions::default()).unwrap();
    let parent = create_runtime(parent_context, &["Promote"], None, None);

    let child_state = state::<()>("Child").build();
    let child_context =
        create_initial_context(vec![child_state.with(())], ContextOptions::default()).unwrap();
    let child = create_runtime(child_context, &[], None, Some(&parent));

    child.run(create_action("Promote").make()).await.unwrap();
    assert_eq!(child.current_state().unwrap().name(), "Child");
    assert_eq!(parent.current_state().unwrap().name(), "ParentB");

    let err = child
        .run(create_action("Mystery").make())
        .await
        .unwrap_err();
    match err {
        RuntimeError::NoStatesRespondToAction { states, .. } => {
            assert_eq!(states, vec!["Child".to_owned(), "ParentB".to_owned()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn escalation_climbs_the_whole_parent_chain() {
    let top = state::<i64>("Top")
        .on("Bump", |n: i64, _p, cx| cx.update(n + 1))
        .build();
    let top_context =
        create_initial_context(vec![top.with(0)], ContextOptions::default()).unwrap();
    let grandparent = create_runtime(top_context, &["Bump"], None, None);

    let mid = state::<()>("Mid").build();
    let mid_context =
        create_initial_context(vec![mid.with(())], ContextOptions::default()).unwrap();
    let parent = create_runtime(mid_context, &[], None, Some(&grandparent));

    let leaf = state::<()>("Leaf").build();
    let leaf_context =
        create_initial_context(vec![leaf.with(())], ContextOptions::default()).unwrap();
    let child = create_runtime(leaf_context, &[], None, Some(&parent));

    child.run(create_action("Bump").make()).await.unwrap();
    assert_eq!(grandparent.current_state().unwrap().data::<i64>(), Some(&1));

    let err = child.run(create_action("Nope").make()).await.unwrap_err();
    match err {
        RuntimeError::NoStatesRespondToAction { states, .. } => {
            assert_eq!(
                states,
                vec!["Leaf".to_owned(), "Mid".to_owned(), "Top".to_owned()]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn nested_machines_forward_declared_actions() {
    let set_name = create_action("SetName");

    let form_invalid = state::<String>("FormInvalid")
        .on(ENTER, |_d, _p, _cx| ())
        .on("SetName", |_name, payload: Value, cx| {
            cx.update(payload.as_str().unwrap_or_default().to_owned())
        })
        .build();

    let form = state_with_nested(
        state::<Nested<i64>>("Form")
            .on(ENTER, |_d, _p, _cx| ())
            .on("Cancel", |data: Nested<i64>, _p, cx| cx.update(data)),
        form_invalid.with(String::new()),
        vec![set_name.clone()],
    );

    let context = create_initial_context(
        vec![form.with(Nested::new(0))],
        ContextOptions::default(),
    )
    .unwrap();
    let runtime = create_runtime(context, &["SetName", "Cancel"], None, None);

    runtime.run(before_enter()).await.unwrap();
    runtime.run(enter()).await.unwrap();
    runtime.run(set_name.with("Ada")).await.unwrap();

    let current = runtime.current_state().unwrap();
    assert_eq!(current.name(), "Form");

    let data = current.data::<Nested<i64>>().unwrap();
    let child = data.child().unwrap();
    let child_state = child.current_state().unwrap();
    assert_eq!(child_state.name(), "FormInvalid");
    assert_eq!(child_state.data::<String>(), Some(&"Ada".to_owned()));

    // Actions the child does not know escalate into the parent machine.
    child.run(create_action("Cancel").make()).await.unwrap();
}

#[tokio::test]
async fn forwarded_actions_the_child_declines_fail_fast() {
    let poke = create_action("Poke");

    let child_idle = state::<()>("ChildIdle")
        .on(ENTER, |_d, _p, _cx| ())
        .build();

    let shell = state_with_nested(
        state::<Nested<()>>("Shell").on(ENTER, |_d, _p, _cx| ()),
        child_idle.with(()),
        vec![poke.clone()],
    );

    let context = create_initial_context(
        vec![shell.with(Nested::new(()))],
        ContextOptions::default(),
    )
    .unwrap();
    let runtime = create_runtime(context, &["Poke"], None, None);
    runtime.run(before_enter()).await.unwrap();
    runtime.run(enter()).await.unwrap();

    // The parent's drive loop is waiting on the forward, so the child must
    // settle the action itself rather than hand it back up.
    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        runtime.run(poke.make()),
    )
    .await
    .expect("forwarded action must settle");

    match outcome.unwrap_err() {
        RuntimeError::NoStatesRespondToAction { states, .. } => {
            assert_eq!(states, vec!["ChildIdle".to_owned()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn outputs_reach_output_subscribers() {
    let pong = create_action("Pong");

    let a = state::<()>("A")
        .on(ENTER, |_d, _p, _cx| ())
        .on("Ping", move |_d, _p, _cx| output(pong.with("reply")))
        .build();

    let context =
        create_initial_context(vec![a.with(())], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Ping"], None, None);

    let all_outputs = Arc::new(Mutex::new(Vec::new()));
    let pong_payloads = Arc::new(Mutex::new(Vec::new()));

    let all = all_outputs.clone();
    let _sub_all = runtime.on_output(move |action| {
        all.lock().push(action.kind().to_owned());
    });
    let pongs = pong_payloads.clone();
    let _sub_pong = runtime.respond_to_output("Pong", move |action| {
        pongs.lock().push(action.payload().clone());
        None
    });

    runtime.run(enter()).await.unwrap();
    runtime.run(create_action("Ping").make()).await.unwrap();
    runtime.run(create_action("Ping").make()).await.unwrap();

    assert_eq!(*all_outputs.lock(), vec!["Pong".to_owned(), "Pong".to_owned()]);
    assert_eq!(*pong_payloads.lock(), vec![json!("reply"), json!("reply")]);
}

#[tokio::test]
async fn respond_to_output_can_submit_a_follow_up() {
    let pong = create_action("Pong");

    let a = state::<i64>("A")
        .on(ENTER, |_t, _p, _cx| ())
        .on("Ping", move |_t, _p, _cx| output(pong.make()))
        .on("Ack", |acks: i64, _p, cx| cx.update(acks + 1))
        .build();

    let context = create_initial_context(vec![a.with(0)], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Ping", "Ack"], None, None);

    let _sub = runtime.respond_to_output("Pong", |_action| {
        Some(create_action("Ack").make())
    });

    runtime.run(enter()).await.unwrap();
    runtime.run(create_action("Ping").make()).await.unwrap();

    // The follow-up action is a detached submission.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(runtime.current_state().unwrap().data::<i64>(), Some(&1));
}

#[tokio::test]
async fn snapshots_restore_into_a_working_runtime() {
    let c = state::<String>("C")
        .on(ENTER, |_d, _p, _cx| ())
        .build();
    let c_clone = c.clone();
    let b = state::<String>("B")
        .on(ENTER, |_d, _p, _cx| ())
        .on("Next", move |name: String, _p, _cx| c_clone.with(name))
        .build();
    let b_clone = b.clone();
    let start = state::<()>("Start")
        .on(ENTER, |_d, _p, _cx| ())
        .on("Go", move |_d, _p, _cx| b_clone.with("Test".to_owned()))
        .build();

    let context =
        create_initial_context(vec![start.with(())], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Go", "Next"], None, None);
    runtime.run(enter()).await.unwrap();
    runtime.run(create_action("Go").make()).await.unwrap();

    let mut catalog = StateCatalog::new();
    catalog.register(&start);
    catalog.register(&b);
    catalog.register(&c);

    let snapshot = catalog.snapshot(&runtime.current_history()).unwrap();
    let bytes = snapshot.to_bytes().unwrap();

    let revived = flywheel::snapshot::HistorySnapshot::from_bytes(&bytes).unwrap();
    let restored_context = catalog.restore(&revived, ContextOptions::default()).unwrap();
    let restored = create_runtime(restored_context, &["Go", "Next"], None, None);

    restored.run(create_action("Next").make()).await.unwrap();

    let current = restored.current_state().unwrap();
    assert_eq!(current.name(), "C");
    assert_eq!(current.data::<String>(), Some(&"Test".to_owned()));
}

#[tokio::test]
async fn older_history_entries_are_never_mutated() {
    let items = state::<Vec<i64>>("Items")
        .on(ENTER, |_d, _p, _cx| ())
        .on("Push", |mut list: Vec<i64>, payload: Value, cx| {
            list.push(payload.as_i64().unwrap_or(0));
            cx.reenter(list)
        })
        .build();

    let context =
        create_initial_context(vec![items.with(vec![1, 2, 3])], ContextOptions::default())
            .unwrap();
    let runtime = create_runtime(context, &["Push"], None, None);

    runtime.run(enter()).await.unwrap();
    runtime.run(create_action("Push").with(4)).await.unwrap();

    let history = runtime.current_history();
    assert_eq!(history.current().unwrap().data::<Vec<i64>>(), Some(&vec![1, 2, 3, 4]));
    assert_eq!(history.previous().unwrap().data::<Vec<i64>>(), Some(&vec![1, 2, 3]));
}

#[tokio::test]
async fn async_handlers_hold_later_submissions_back() {
    let load = create_action("Load");
    let mark = create_action("Mark");

    let b = state::<String>("B")
        .on(ENTER, |_d, _p, _cx| ())
        .on("Mark", |_name, _p, cx| cx.update("marked".to_owned()))
        .build();
    let b_clone = b.clone();
    let a = state::<()>("A")
        .on(ENTER, |_d, _p, _cx| ())
        .on_async("Load", move |_d, _p, _cx| {
            let b = b_clone.clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                b.with("loaded".to_owned())
            }
        })
        .build();

    let context =
        create_initial_context(vec![a.with(())], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Load", "Mark"], None, None);
    runtime.run(enter()).await.unwrap();

    // Mark is queued while Load's future is still pending; it must not run
    // until the transition to B has landed.
    let bound_load = runtime.bind(&load);
    let bound_mark = runtime.bind(&mark);
    let first = bound_load.send(Value::Null);
    let second = bound_mark.send(Value::Null);
    first.settled().await.unwrap();
    second.settled().await.unwrap();

    let current = runtime.current_state().unwrap();
    assert_eq!(current.name(), "B");
    assert_eq!(current.data::<String>(), Some(&"marked".to_owned()));
}

#[tokio::test]
async fn draining_the_history_is_fatal() {
    let after = create_action("After");

    let a = state::<()>("A")
        .on(ENTER, |_d, _p, _cx| ())
        .on("Break", move |_d, _p, _cx| {
            let drain = effect("drainEverything", Value::Null, |ctx| {
                while ctx.history_mut().pop().is_some() {}
            })
            .unwrap();
            returns![drain, after.make()]
        })
        .build();

    let context =
        create_initial_context(vec![a.with(())], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Break", "After"], None, None);
    runtime.run(enter()).await.unwrap();

    let err = runtime
        .run(create_action("Break").make())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::MissingCurrentState { .. }));
    assert!(runtime.current_state().is_none());
}

#[tokio::test]
async fn bound_sends_downgrade_unhandled_to_a_warning() {
    let a = state::<()>("A")
        .on(ENTER, |_d, _p, _cx| ())
        .build();

    let sink: LogSink = Arc::new(Mutex::new(Vec::new()));
    let context = create_initial_context(vec![a.with(())], capture_logger(&sink)).unwrap();
    let runtime = create_runtime(context, &["Nope"], None, None);
    runtime.run(enter()).await.unwrap();

    let nope = runtime.bind(&create_action("Nope"));
    nope.send(Value::Null).settled().await.unwrap();

    let warned = sink
        .lock()
        .iter()
        .any(|(level, message)| *level == LogLevel::Warn && message.contains("Nope"));
    assert!(warned);
}

#[tokio::test]
async fn trigger_lands_as_a_detached_submission() {
    let counter = state::<i64>("Counter")
        .on(ENTER, |_t, _p, _cx| ())
        .on("Kick", |_t, _p, cx| {
            cx.trigger(create_action("Add").with(5));
        })
        .on("Add", |total: i64, payload, cx| {
            cx.update(total + payload.as_i64().unwrap_or(0))
        })
        .build();

    let context =
        create_initial_context(vec![counter.with(0)], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Kick", "Add"], None, None);
    runtime.run(enter()).await.unwrap();
    runtime.run(create_action("Kick").make()).await.unwrap();

    // The triggered action joins the queue behind the Kick submission.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(runtime.current_state().unwrap().data::<i64>(), Some(&5));
}

#[tokio::test]
async fn wait_state_timeout_fires_through_the_queue() {
    use flywheel::state::{wait_state, WaitStateOptions};

    let failed = state::<()>("Failed")
        .on(ENTER, |_d, _p, _cx| ())
        .build();

    let failed_on_timeout = failed.clone();
    let waiting = wait_state(
        create_action("Fetch"),
        create_action("Fetched"),
        |_d: (), _payload| Vec::new(),
        WaitStateOptions {
            timeout: Some(std::time::Duration::from_millis(20)),
            on_timeout: Some(Arc::new(move |_d| {
                vec![failed_on_timeout.with(()).into()]
            })),
            ..WaitStateOptions::default()
        },
    );

    let context = create_initial_context(
        vec![waiting.with(((), Value::Null))],
        ContextOptions::default(),
    )
    .unwrap();
    let runtime = create_runtime(context, &["Fetched"], None, None);
    runtime.run(enter()).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(runtime.current_state().unwrap().name(), "Failed");
}

#[tokio::test]
async fn subscribed_sources_feed_the_queue() {
    use flywheel::effect::{subscribe, unsubscribe};
    use flywheel::subscription::Subscription;

    let source = Subscription::new();
    let tick_source = source.clone();
    let a = state::<i64>("A")
        .on(ENTER, move |_t, _p, _cx| subscribe("ticks", tick_source.clone()))
        .on("Tick", |total: i64, _p, cx| cx.update(total + 1))
        .on("Stop", |_t, _p, _cx| unsubscribe("ticks"))
        .build();

    let context =
        create_initial_context(vec![a.with(0)], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Tick", "Stop"], None, None);
    runtime.run(enter()).await.unwrap();

    source.emit(create_action("Tick").make());
    source.emit(create_action("Tick").make());
    // Emitted actions are detached submissions; give the spawned drivers a
    // beat to drain.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(runtime.current_state().unwrap().data::<i64>(), Some(&2));

    runtime.run(create_action("Stop").make()).await.unwrap();
    source.emit(create_action("Tick").make());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(runtime.current_state().unwrap().data::<i64>(), Some(&2));
}

fn context_names(context: &Context) -> Vec<String> {
    context
        .history()
        .names()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

#[tokio::test]
async fn context_snapshots_are_detached_from_the_live_machine() {
    let b = state::<()>("B")
        .on(ENTER, |_d, _p, _cx| ())
        .build();
    let b_clone = b.clone();
    let a = state::<()>("A")
        .on(ENTER, |_d, _p, _cx| ())
        .on("Go", move |_d, _p, _cx| b_clone.with(()))
        .build();

    let context =
        create_initial_context(vec![a.with(())], ContextOptions::default()).unwrap();
    let runtime = create_runtime(context, &["Go"], None, None);
    runtime.run(enter()).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = runtime.on_context_change(move |snapshot| {
        sink.lock().push(context_names(snapshot));
    });

    let before = runtime.context();
    runtime.run(create_action("Go").make()).await.unwrap();

    // The earlier snapshot still shows the old history.
    assert_eq!(context_names(&before), vec!["A".to_owned()]);
    assert_eq!(
        seen.lock().last().unwrap(),
        &vec!["B".to_owned(), "A".to_owned()]
    );
}
