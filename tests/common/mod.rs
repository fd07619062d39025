//! Drag-and-drop states shared by the integration tests.
//!
//! `el` stands in for the dragged element and `window` for the global key
//! target. Drag bookkeeping lives in a small owned struct shared by the
//! entry actions instead of in globals.

#![allow(dead_code)]

use serde_json::json;
use std::sync::{Arc, Mutex};
use yieldmachine::{Emitter, Event, StateDefinition};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Default)]
pub struct DragState {
    pub origin: Option<Point>,
    pub start: Option<Point>,
    pub position: Point,
}

#[derive(Clone)]
pub struct Draggable {
    pub el: Emitter,
    pub window: Emitter,
    pub drag: Arc<Mutex<DragState>>,
}

pub fn pointer(kind: &str, x: f64, y: f64) -> Event {
    Event::new(kind).with_detail(json!({ "x": x, "y": y }))
}

pub fn key(name: &str) -> Event {
    Event::new("keydown").with_detail(json!({ "key": name }))
}

fn point(event: &Event) -> Point {
    Point {
        x: event.detail["x"].as_f64().unwrap_or_default(),
        y: event.detail["y"].as_f64().unwrap_or_default(),
    }
}

impl Draggable {
    pub fn new() -> Self {
        Self {
            el: Emitter::new("el"),
            window: Emitter::new("window"),
            drag: Arc::new(Mutex::new(DragState::default())),
        }
    }

    pub fn position(&self) -> Point {
        self.drag.lock().unwrap().position
    }

    pub fn up(&self) -> StateDefinition<()> {
        let ctx = self.clone();
        StateDefinition::new("Up", move |steps| {
            let entry = ctx.clone();
            steps
                .entry(move |token| {
                    let drag = Arc::clone(&entry.drag);
                    entry.el.add_listener(
                        "pointerdown",
                        move |event| {
                            let mut drag = drag.lock().unwrap();
                            drag.origin = Some(point(event));
                            drag.start = Some(drag.position);
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

    pub fn down(&self) -> StateDefinition<()> {
        let ctx = self.clone();
        StateDefinition::new("Down", move |steps| {
            steps
                .listen_to(&ctx.el, ["pointermove", "pointerup"])
                .on("pointermove", ctx.dragging())
                .on("pointerup", ctx.clicked());
            Ok(())
        })
    }

    pub fn dragging(&self) -> StateDefinition<()> {
        let ctx = self.clone();
        StateDefinition::new("Dragging", move |steps| {
            let entry = ctx.clone();
            steps
                .entry(move |token| {
                    let drag = Arc::clone(&entry.drag);
                    entry.el.add_listener(
                        "pointermove",
                        move |event| {
                            let mut drag = drag.lock().unwrap();
                            if let (Some(origin), Some(start)) = (drag.origin, drag.start) {
                                let now = point(event);
                                drag.position = Point {
                                    x: start.x + now.x - origin.x,
                                    y: start.y + now.y - origin.y,
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
                            if event.detail["key"] != "Escape" {
                                return Ok(());
                            }
                            {
                                let mut drag = drag.lock().unwrap();
                                let Some(start) = drag.start else {
                                    return Ok(());
                                };
                                drag.origin = None;
                                drag.position = start;
                            }
                            el.emit("CANCEL");
                            Ok(())
                        },
                        token,
                    );
                    Ok(())
                })
                .listen_to(&ctx.el, ["pointerup", "CANCEL"])
                .on("pointerup", ctx.dropped())
                .on("CANCEL", ctx.cancelled());
            Ok(())
        })
    }

    pub fn clicked(&self) -> StateDefinition<()> {
        StateDefinition::alias("Clicked", self.up())
    }

    pub fn dropped(&self) -> StateDefinition<()> {
        StateDefinition::alias("Dropped", self.up())
    }

    pub fn cancelled(&self) -> StateDefinition<()> {
        StateDefinition::alias("Cancelled", self.up())
    }
}
