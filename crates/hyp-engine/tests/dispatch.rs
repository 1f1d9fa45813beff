//! Request lifecycle integration tests driven through a scripted transport.

mod common;

use common::{settle, MockTransport};
use hyp_engine::{Engine, EventInit};
use hyp_net::Method;
use smol::future::block_on;

fn engine_with(body: &str, transport: MockTransport) -> Engine {
    common::init_logging();
    let html = format!("<html><head><title>Home</title></head><body>{body}</body></html>");
    let engine = Engine::new(&html, "https://app.test/", transport);
    engine.process_document();
    engine
}

#[test]
fn test_get_lifecycle_and_swap() {
    let transport = MockTransport::new();
    transport.queue_ok("<li>one</li>");
    let engine = engine_with(
        "<a id=\"load\" href=\"/items\" h-get=\"\" h-target=\"#list\" h-swap=\"inner\">Load</a>\
         <ul id=\"list\"></ul>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    {
        let doc = engine.document();
        let list = doc.get_element_by_id("list").unwrap();
        assert_eq!(hyp_dom::inner_html(doc.tree(), list), "<li>one</li>");
    }
    assert_eq!(
        engine.notification_names(),
        vec!["init", "inited", "before", "after", "swapped"]
    );
    let req = transport.last_request();
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.url, "/items");
    assert_eq!(req.headers.get("H-Request").map(String::as_str), Some("true"));
    assert_eq!(req.headers.get("H-Target").map(String::as_str), Some("#list"));
}

#[test]
fn test_form_post_serializes_and_brackets_disable() {
    let transport = MockTransport::new();
    let release = transport.queue_deferred();
    let engine = engine_with(
        "<form id=\"f\" action=\"/save\" h-post=\"\" h-target=\"#out\" h-swap=\"inner\" \
         h-indicator=\"#spin\">\
         <input name=\"q\" value=\"hello\">\
         <input id=\"reset\" type=\"button\" value=\"clear\">\
         <button id=\"go\" name=\"go\" value=\"now\">Save</button>\
         </form><span id=\"spin\"></span><div id=\"out\"></div>",
        transport.clone(),
    );
    let form = engine.document().get_element_by_id("f").unwrap();
    let button = engine.document().get_element_by_id("go").unwrap();
    let plain = engine.document().get_element_by_id("reset").unwrap();
    let spin = engine.document().get_element_by_id("spin").unwrap();

    block_on(engine.run(async {
        engine.fire_event_with(form, "submit", EventInit { submitter: Some(button) });
        settle().await;

        // In flight: only the submit control is disabled, only the
        // configured indicator is lit.
        {
            let doc = engine.document();
            assert!(doc.tree().has_attr(button, "disabled"));
            assert!(!doc.tree().has_attr(plain, "disabled"));
            assert!(doc.tree().element(spin).unwrap().has_class("h-loading"));
            assert!(!doc.tree().element(form).unwrap().has_class("h-loading"));
        }

        release
            .send(Ok(hyp_net::Response::with_status(200, "<p>saved</p>")))
            .await
            .unwrap();
        settle().await;
    }));

    let doc = engine.document();
    assert!(!doc.tree().has_attr(button, "disabled"), "re-enabled");
    assert!(!doc.tree().element(spin).unwrap().has_class("h-loading"));
    let out = doc.get_element_by_id("out").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), out), "<p>saved</p>");

    let req = transport.last_request();
    assert_eq!(req.method, Method::Post);
    assert_eq!(req.body.as_deref(), Some("q=hello&go=now"));
    assert_eq!(
        req.headers.get("Content-Type").map(String::as_str),
        Some("application/x-www-form-urlencoded")
    );
}

#[test]
fn test_error_status_routed_to_error_target() {
    let transport = MockTransport::new();
    transport.queue_status(500, "<b>boom</b>");
    let engine = engine_with(
        "<a id=\"load\" href=\"/items\" h-get=\"\" h-target=\"#list\" h-swap=\"inner\" \
         h-error-target=\"#errors\">Load</a>\
         <ul id=\"list\"><li>keep</li></ul><div id=\"errors\"></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    let doc = engine.document();
    let errors = doc.get_element_by_id("errors").unwrap();
    let list = doc.get_element_by_id("list").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), errors), "<b>boom</b>");
    assert_eq!(
        hyp_dom::inner_html(doc.tree(), list),
        "<li>keep</li>",
        "main target untouched on error"
    );
    let names = engine.notification_names();
    assert!(names.contains(&"error".to_string()));
    assert!(!names.contains(&"swapped".to_string()));
}

#[test]
fn test_sync_abort_supersedes_in_flight_request() {
    let transport = MockTransport::new();
    let first = transport.queue_deferred();
    transport.queue_ok("second");
    let engine = engine_with(
        "<a id=\"load\" href=\"/slow\" h-get=\"\" h-sync=\"abort\" h-target=\"#out\" \
         h-swap=\"inner\">Load</a><div id=\"out\"></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
        engine.fire_event(link, "click");
        settle().await;
        // The first reply arrives late; its request was already aborted.
        let _ = first
            .send(Ok(hyp_net::Response::with_status(200, "first")))
            .await;
        settle().await;
    }));

    assert_eq!(transport.request_count(), 2);
    let doc = engine.document();
    let out = doc.get_element_by_id("out").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), out), "second");
    let names = engine.notification_names();
    assert_eq!(names.iter().filter(|n| *n == "swapped").count(), 1);
    assert!(!names.contains(&"error".to_string()), "aborts are silent");
}

#[test]
fn test_sync_drop_ignores_reentrant_fire() {
    let transport = MockTransport::new();
    let release = transport.queue_deferred();
    let engine = engine_with(
        "<a id=\"load\" href=\"/slow\" h-get=\"\" h-sync=\"drop\" h-target=\"#out\" \
         h-swap=\"inner\">Load</a><div id=\"out\"></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
        engine.fire_event(link, "click");
        settle().await;
        release
            .send(Ok(hyp_net::Response::with_status(200, "done")))
            .await
            .unwrap();
        settle().await;
    }));

    assert_eq!(transport.request_count(), 1, "second fire dropped");
    let doc = engine.document();
    let out = doc.get_element_by_id("out").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), out), "done");
}

#[test]
fn test_confirm_decline_stops_dispatch() {
    let transport = MockTransport::new();
    let engine = engine_with(
        "<a id=\"del\" href=\"/rm\" h-get=\"\" h-confirm=\"really?\">rm</a>",
        transport.clone(),
    );
    engine.set_confirmer(|_| false);
    let link = engine.document().get_element_by_id("del").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 0);
    assert!(!engine.notification_names().contains(&"before".to_string()));
}

#[test]
fn test_before_veto_stops_request() {
    let transport = MockTransport::new();
    let engine = engine_with(
        "<a id=\"load\" href=\"/items\" h-get=\"\">Load</a>",
        transport.clone(),
    );
    engine.on(hyp_engine::names::BEFORE, |_| false);
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_push_url_records_navigation() {
    let transport = MockTransport::new();
    transport.queue_ok("<title>Two</title><p>two</p>");
    let engine = engine_with(
        "<a id=\"nav\" href=\"/page2\" h-get=\"\" h-target=\"#main\" h-swap=\"inner\" \
         h-push-url=\"true\">Next</a><div id=\"main\"><p>one</p></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("nav").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    {
        let doc = engine.document();
        assert_eq!(doc.url(), "/page2");
        assert_eq!(doc.title(), "Two");
        let main = doc.get_element_by_id("main").unwrap();
        assert_eq!(hyp_dom::inner_html(doc.tree(), main), "<p>two</p>");
    }
    let history = engine.history_stack();
    assert_eq!(history.len(), 2);
    assert_eq!(history.current_url(), Some("/page2"));
}

#[test]
fn test_oob_fragment_applied_alongside_main_swap() {
    let transport = MockTransport::new();
    transport.queue_ok(
        "<span id=\"badge\" h-oob=\"true\">3</span><li>item</li>",
    );
    let engine = engine_with(
        "<a id=\"load\" href=\"/items\" h-get=\"\" h-target=\"#list\" h-swap=\"append\">Load</a>\
         <ul id=\"list\"></ul><span id=\"badge\">0</span>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    let doc = engine.document();
    let list = doc.get_element_by_id("list").unwrap();
    let badge = doc.get_element_by_id("badge").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), list), "<li>item</li>");
    assert_eq!(doc.tree().text_content(badge), "3");
}

#[test]
fn test_debounced_trigger_coalesces() {
    let transport = MockTransport::new();
    transport.queue_ok("done");
    let engine = engine_with(
        "<form id=\"f\" action=\"/search\" h-get=\"\" h-trigger=\"input debounce:20\" \
         h-target=\"#out\" h-swap=\"inner\"><input name=\"q\"></form><div id=\"out\"></div>",
        transport.clone(),
    );
    let form = engine.document().get_element_by_id("f").unwrap();

    block_on(engine.run(async {
        engine.fire_event(form, "input");
        engine.fire_event(form, "input");
        engine.fire_event(form, "input");
        smol::Timer::after(std::time::Duration::from_millis(80)).await;
        settle().await;
    }));

    assert_eq!(transport.request_count(), 1, "only the last firing survives");
}

#[test]
fn test_throttled_trigger_gates_repeats() {
    let transport = MockTransport::new();
    transport.queue_ok("a");
    transport.queue_ok("b");
    let engine = engine_with(
        "<a id=\"load\" href=\"/items\" h-get=\"\" h-trigger=\"click throttle:10000\">Load</a>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_once_trigger_unbinds_after_first_fire() {
    let transport = MockTransport::new();
    transport.queue_ok("a");
    transport.queue_ok("b");
    let engine = engine_with(
        "<a id=\"load\" href=\"/items\" h-get=\"\" h-trigger=\"click once\">Load</a>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_intersect_trigger_and_geometry() {
    let transport = MockTransport::new();
    transport.queue_ok("<p>lazy</p>");
    let engine = engine_with(
        "<a id=\"lazy\" href=\"/more\" h-get=\"\" h-trigger=\"intersect threshold:0.5\" \
         h-target=\"#out\" h-swap=\"inner\">more</a><div id=\"out\"></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("lazy").unwrap();

    let targets = engine.intersection_targets();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].0, link);
    assert!((targets[0].1 - 0.5).abs() < f32::EPSILON);

    block_on(engine.run(async {
        engine.intersect(link);
        settle().await;
    }));

    let doc = engine.document();
    let out = doc.get_element_by_id("out").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), out), "<p>lazy</p>");
}

#[test]
fn test_ignored_subtree_never_binds() {
    let transport = MockTransport::new();
    let engine = engine_with(
        "<div h-ignore=\"\"><a id=\"load\" href=\"/items\" h-get=\"\">Load</a></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 0);
    assert!(engine.notification_names().is_empty());
}

#[test]
fn test_prefetch_warm_then_consume() {
    let transport = MockTransport::new();
    transport.queue_ok("<p>warm</p>");
    let engine = engine_with(
        "<a id=\"nav\" href=\"/next\" h-get=\"\" h-prefetch=\"hover\" h-target=\"#main\" \
         h-swap=\"inner\">Next</a><div id=\"main\"></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("nav").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "mouseenter");
        settle().await;
        assert_eq!(transport.request_count(), 1);
        assert!(!engine.prefetch_cache().is_empty());

        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 1, "dispatch served from cache");
    assert!(engine.prefetch_cache().is_empty(), "entry consumed");
    let doc = engine.document();
    let main = doc.get_element_by_id("main").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), main), "<p>warm</p>");
}

#[test]
fn test_prefetch_expired_entry_refetches() {
    let transport = MockTransport::new();
    transport.queue_ok("<p>warm</p>");
    transport.queue_ok("<p>net</p>");
    let engine = engine_with(
        "<a id=\"nav\" href=\"/next\" h-get=\"\" h-prefetch=\"hover 0s\" h-target=\"#main\" \
         h-swap=\"inner\">Next</a><div id=\"main\"></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("nav").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "mouseenter");
        settle().await;
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 2, "expired entry not served");
    let doc = engine.document();
    let main = doc.get_element_by_id("main").unwrap();
    assert_eq!(hyp_dom::inner_html(doc.tree(), main), "<p>net</p>");
}

#[test]
fn test_vetoed_init_leaves_element_bindable() {
    common::init_logging();
    let transport = MockTransport::new();
    transport.queue_ok("ok");
    let engine = Engine::new(
        "<html><body><a id=\"load\" href=\"/items\" h-get=\"\">Load</a></body></html>",
        "https://app.test/",
        transport.clone(),
    );
    let allow = std::rc::Rc::new(std::cell::Cell::new(false));
    let gate = allow.clone();
    engine.on(hyp_engine::names::INIT, move |_| gate.get());
    engine.process_document();
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));
    assert_eq!(transport.request_count(), 0, "binding refused");

    allow.set(true);
    engine.process_document();
    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));
    assert_eq!(transport.request_count(), 1, "re-scan bound the element");
}

#[test]
fn test_outer_self_swap_also_notifies_root() {
    let transport = MockTransport::new();
    transport.queue_ok("<p id=\"done\">done</p>");
    let engine = engine_with(
        "<a id=\"go\" href=\"/x\" h-get=\"\" h-swap=\"outer\">go</a>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("go").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    let swaps: Vec<_> = engine
        .notices()
        .into_iter()
        .filter(|n| n.name == "swapped")
        .collect();
    assert_eq!(swaps.len(), 2, "element first, then the root");
    assert_eq!(swaps[0].target, link);
    assert_eq!(swaps[1].target, hyp_dom::NodeId::ROOT);
}

#[test]
fn test_handler_may_reenter_the_engine() {
    let transport = MockTransport::new();
    transport.queue_ok("ok");
    let engine = engine_with(
        "<a id=\"load\" href=\"/items\" h-get=\"\" h-target=\"this\" h-swap=\"inner\">Load</a>",
        transport.clone(),
    );
    let view = engine.clone();
    engine.on(hyp_engine::names::BEFORE, move |_| {
        // Reading the log from inside a handler must work.
        view.notification_names().contains(&"init".to_string())
    });
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_push_without_target_selector_replays_as_reload() {
    let transport = MockTransport::new();
    transport.queue_ok("<p>two</p>");
    let engine = engine_with(
        "<a id=\"nav\" href=\"/page2\" h-get=\"\" h-push-url=\"true\" h-swap=\"inner\">Next</a>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("nav").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));
    assert_eq!(engine.history_stack().current_url(), Some("/page2"));

    let back = block_on(engine.run(engine.history_back()));
    assert_eq!(back, hyp_engine::ReplayOutcome::Reload);
    let count = transport.request_count();
    let forward = block_on(engine.run(engine.history_forward()));
    assert_eq!(
        forward,
        hyp_engine::ReplayOutcome::Reload,
        "no target selector was configured, so the snapshot cannot swap"
    );
    assert_eq!(transport.request_count(), count, "replayed without fetching");
}

#[test]
fn test_scroll_and_focus_effects() {
    let transport = MockTransport::new();
    transport.queue_ok("<input id=\"first\">");
    let engine = engine_with(
        "<a id=\"load\" href=\"/form\" h-get=\"\" h-target=\"#main\" h-swap=\"inner\" \
         h-scroll=\"top\" h-focus=\"#first\">Load</a><div id=\"main\"></div>",
        transport.clone(),
    );
    let link = engine.document().get_element_by_id("load").unwrap();

    block_on(engine.run(async {
        engine.fire_event(link, "click");
        settle().await;
    }));

    assert_eq!(
        engine.scroll_requests(),
        vec![hyp_engine::ScrollRequest::Top]
    );
    let doc = engine.document();
    let first = doc.get_element_by_id("first").unwrap();
    assert_eq!(doc.focused(), Some(first));
}
