//! Draggable Element
//!
//! Drives a drag-and-drop interaction: press, drag, then cancel with Escape
//! or drop by releasing the pointer.
//!
//! Key concepts:
//! - States are definitions yielding directives
//! - Entry actions attach listeners that vanish when the state is left
//! - Alias states (`Clicked`, `Dropped`, `Cancelled`) resolve to `Up`
//! - Observers consume change notifications as an async stream
//!
//! Run with: RUST_LOG=yieldmachine=debug cargo run --example draggable

use serde_json::json;
use std::sync::{Arc, Mutex};
use yieldmachine::{Emitter, Event, Machine, MachineConfig, Scope, StateDefinition};

#[derive(Clone, Copy, Debug, Default)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Default)]
struct Drag {
    origin: Option<Point>,
    start: Point,
    position: Point,
}

#[derive(Clone)]
struct Element {
    el: Emitter,
    window: Emitter,
    drag: Arc<Mutex<Drag>>,
}

fn pointer(kind: &str, x: f64, y: f64) -> Event {
    Event::new(kind).with_detail(json!({ "x": x, "y": y }))
}

fn point(event: &Event) -> Point {
    Point {
        x: event.detail["x"].as_f64().unwrap_or_default(),
        y: event.detail["y"].as_f64().unwrap_or_default(),
    }
}

impl Element {
    fn up(&self) -> StateDefinition<()> {
        let ctx = self.clone();
        StateDefinition::new("Up", move |steps| {
            let drag = Arc::clone(&ctx.drag);
            let el = ctx.el.clone();
            steps
                .entry(move |token| {
                    let drag = Arc::clone(&drag);
                    el.add_listener(
                        "pointerdown",
                        move |event| {
                            let mut drag = drag.lock().map_err(|_| "drag state poisoned")?;
                            drag.origin = Some(point(event));
                            drag.start = drag.position;
                            Ok(())
                        },
                        token,
                    );
                    Ok(())
                })
                .listen_to(&ctx.el, ["pointerdown"])
                .on("pointerdown", ctx.down());
            Ok(())
        })
    }

    fn down(&self) -> StateDefinition<()> {
        let ctx = self.clone();
        StateDefinition::new("Down", move |steps| {
            steps
                .listen_to(&ctx.el, ["pointermove", "pointerup"])
                .on("pointermove", ctx.dragging())
                .on("pointerup", StateDefinition::alias("Clicked", ctx.up()));
            Ok(())
        })
    }

    fn dragging(&self) -> StateDefinition<()> {
        let ctx = self.clone();
        StateDefinition::new("Dragging", move |steps| {
            let entry = ctx.clone();
            steps
                .entry(move |token| {
                    let drag = Arc::clone(&entry.drag);
                    entry.el.add_listener(
                        "pointermove",
                        move |event| {
                            let mut drag = drag.lock().map_err(|_| "drag state poisoned")?;
                            if let Some(origin) = drag.origin {
                                let now = point(event);
                                drag.position = Point {
                                    x: drag.start.x + now.x - origin.x,
                                    y: drag.start.y + now.y - origin.y,
                                };
                            }
                            Ok(())
                        },
                        token,
                    );

                    let drag = Arc::clone(&entry.drag);
                    let el = entry.el.clone();
                    entry.window.add_listener(
                        "keydown",
                        move |event| {
                            if event.detail["key"] == "Escape" {
                                {
                                    let mut drag = drag.lock().map_err(|_| "drag state poisoned")?;
                                    drag.position = drag.start;
                                    drag.origin = None;
                                }
                                el.emit("CANCEL");
                            }
                            Ok(())
                        },
                        token,
                    );
                    Ok(())
                })
                .listen_to(&ctx.el, ["pointerup", "CANCEL"])
                .on("pointerup", StateDefinition::alias("Dropped", ctx.up()))
                .on("CANCEL", StateDefinition::alias("Cancelled", ctx.up()));
            Ok(())
        })
    }

    fn position(&self) -> Point {
        self.drag.lock().map(|drag| drag.position).unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info,yieldmachine=debug")
        .init();

    println!("=== Draggable Element Example ===\n");

    let element = Element {
        el: Emitter::new("el"),
        window: Emitter::new("window"),
        drag: Arc::new(Mutex::new(Drag::default())),
    };
    let machine = Machine::builder()
        .initial(element.up())
        .label("draggable")
        .start()?;

    let observer = Scope::new();
    let mut changes = machine.notifications(observer.token());

    println!("Initial state: {}", machine.state());

    element.el.dispatch(&pointer("pointerdown", 10.0, 10.0));
    element.el.dispatch(&pointer("pointermove", 12.0, 12.0));
    element.el.dispatch(&pointer("pointermove", 40.0, 25.0));
    println!("Dragged to: {:?}", element.position());

    element
        .window
        .dispatch(&Event::new("keydown").with_detail(json!({ "key": "Escape" })));
    println!("After Escape: {:?}", element.position());

    element.el.dispatch(&pointer("pointerdown", 0.0, 0.0));
    element.el.dispatch(&pointer("pointermove", 5.0, 0.0));
    element.el.dispatch(&pointer("pointermove", 25.0, 5.0));
    element.el.dispatch(&pointer("pointerup", 25.0, 5.0));
    println!("Dropped at: {:?}", element.position());

    machine.stop();
    drop(observer);

    println!("\nTransitions:");
    while let Some(change) = changes.recv().await {
        let via = if change.aliases.is_empty() {
            String::new()
        } else {
            format!(" (via {})", change.aliases.join(" -> "))
        };
        println!(
            "  #{} {} -> {}{} on {:?}",
            change.sequence, change.previous, change.state, via, change.event
        );
    }

    println!("\nListeners left on el: {}", element.el.listener_count());
    println!("\n=== Example Complete ===");
    Ok(())
}
