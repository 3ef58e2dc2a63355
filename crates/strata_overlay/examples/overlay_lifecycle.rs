//! Overlay Lifecycle Demo
//!
//! Walks a dialog and a dropdown through their lifecycle on a headless
//! document, printing the resulting tree after each step.
//!
//! Features demonstrated:
//! - Global positioning with a backdrop (dialog)
//! - Connected positioning that flips above its trigger (dropdown)
//! - Backdrop click and Escape handling through the event channels
//! - Deferred host removal and backdrop fade-out
//!
//! Run with: RUST_LOG=strata_overlay=debug cargo run -p strata_overlay --example overlay_lifecycle

use strata_core::{
    Document, DocumentExt, DomEvent, NodeId, Platform, QueueScheduler, Rect, Result, StrataError, Viewport,
};
use strata_overlay::{ConnectionPosition, OverlayConfig, OverlayContext, OverlayContextConfig, Portal};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let document = Document::new().into_shared();
    document.lock().unwrap().set_viewport(Viewport {
        width: 800.0,
        height: 600.0,
        scroll_x: 0.0,
        scroll_y: 0.0,
    });
    let scheduler = QueueScheduler::new().shared();
    let ctx = OverlayContext::new(
        document.clone(),
        scheduler.clone(),
        OverlayContextConfig::new().platform(Platform::from_env()),
    );

    // Dialog: centered, with a backdrop that closes it
    let strategy = ctx.position().global();
    strategy.center_horizontally("").center_vertically("");
    let dialog = ctx.create(
        OverlayConfig::new()
            .position_strategy(strategy)
            .has_backdrop(true)
            .panel_class("dialog")
            .width(400),
    )?;
    let body = element(&document, "article");
    dialog.attach(Portal::element(body))?;

    let closer = dialog.clone();
    dialog.backdrop_click().subscribe(move |_| {
        tracing::info!("backdrop clicked, closing dialog");
        closer.detach();
    })?;

    scheduler.run_frame();
    scheduler.run_idle();
    print_tree(&document, "dialog open");

    // Dropdown anchored near the bottom edge: flips above its trigger
    let trigger = element(&document, "button");
    document
        .lock()
        .unwrap()
        .set_bounds(trigger, Rect::new(40.0, 560.0, 120.0, 24.0));
    let dropdown_strategy = ctx.position().flexible_connected_to(trigger);
    dropdown_strategy.with_positions(vec![ConnectionPosition::below(), ConnectionPosition::above()]);
    dropdown_strategy.position_changes().subscribe(|change| {
        tracing::info!("dropdown placed at {:?} (fits={})", change.position, change.fits);
    })?;

    let dropdown = ctx.create(
        OverlayConfig::new()
            .position_strategy(dropdown_strategy)
            .dispose_on_navigation(true),
    )?;
    let pane = dropdown
        .overlay_element()
        .ok_or(StrataError::OverlayDisposed)?;
    document
        .lock()
        .unwrap()
        .set_bounds(pane, Rect::new(0.0, 0.0, 160.0, 120.0));

    let closer = dropdown.clone();
    dropdown.keydown_events().subscribe(move |event| {
        if event.key() == Some("Escape") {
            tracing::info!("escape pressed, closing dropdown");
            closer.detach();
        }
    })?;

    dropdown.attach(Portal::build(|doc| {
        let list = doc.create_element("ul");
        for _ in 0..3 {
            let item = doc.create_element("li");
            let _ = doc.append_child(list, item);
        }
        vec![list]
    }))?;
    scheduler.run_idle();
    print_tree(&document, "dropdown open");

    // Escape closes the topmost overlay listening for keys
    let root = document.lock().unwrap().root();
    document.dispatch_event(&DomEvent::keydown(root, "Escape"));
    scheduler.run_idle();

    // Clicking the backdrop closes the dialog; the backdrop fades out
    if let Some(backdrop) = dialog.backdrop_element() {
        document.dispatch_event(&DomEvent::click(backdrop, 5.0, 5.0));
    }
    scheduler.run_idle();
    scheduler.advance(strata_overlay::BACKDROP_FALLBACK_MS);
    print_tree(&document, "all closed");

    // Navigation disposes overlays that asked for it
    dropdown.attach(Portal::element(element(&document, "ul")))?;
    ctx.location().navigate("/next-page");
    tracing::info!("dropdown disposed on navigation: {}", dropdown.is_disposed());

    dialog.dispose();
    print_tree(&document, "disposed");
    Ok(())
}

fn element(document: &strata_core::SharedDocument, tag: &str) -> NodeId {
    let mut doc = document.lock().unwrap();
    let node = doc.create_element(tag);
    let body = doc.body();
    let _ = doc.append_child(body, node);
    node
}

fn print_tree(document: &strata_core::SharedDocument, label: &str) {
    let doc = document.lock().unwrap();
    println!("--- {} ---", label);
    print_node(&doc, doc.body(), 0);
}

fn print_node(doc: &Document, node: NodeId, depth: usize) {
    let classes = doc.classes(node);
    let mut line = format!(
        "{}<{}",
        "  ".repeat(depth),
        doc.tag(node).unwrap_or("?")
    );
    if !classes.is_empty() {
        line.push_str(&format!(" class=\"{}\"", classes.join(" ")));
    }
    for property in ["margin-top", "top", "left", "width"] {
        let value = doc.style(node, property);
        if !value.is_empty() {
            line.push_str(&format!(" {}={}", property, value));
        }
    }
    println!("{}>", line);
    for &child in doc.children(node) {
        print_node(doc, child, depth + 1);
    }
}
