//! Browser runtime integration
//!
//! Once `_start` has been unwound, requestAnimationFrame drives the guest:
//! each tick hands over any dropped files, then calls the registered frame
//! callback through the guest's function table.
//!
//! The next frame is requested before the guest runs, so a callback that
//! traps does not end the chain.

use crate::boot::{SharedBridge, classify};
use crate::bridge::TickOutcome;
use crate::{console_error, console_log, console_warn};
use js_sys::{Function, WebAssembly};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Everything the frame loop needs from an instantiated guest
pub struct Guest {
    pub bridge: SharedBridge,
    pub table: WebAssembly::Table,
    /// Exported allocator, used to hand over dropped files
    pub malloc: Option<Function>,
}

/// State for the animation frame loop
struct RuntimeState {
    /// Callback for requestAnimationFrame (stored to prevent GC)
    frame_closure: Option<Closure<dyn FnMut(f64)>>,
    guest: Option<Rc<Guest>>,
    running: bool,
}

thread_local! {
    static STATE: RefCell<RuntimeState> = RefCell::new(RuntimeState {
        frame_closure: None,
        guest: None,
        running: false,
    });
}

/// Start the frame loop for `guest`
pub fn start(guest: Guest) {
    let already_running = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.running {
            return true;
        }
        state.running = true;
        state.guest = Some(Rc::new(guest));
        false
    });
    if already_running {
        console_warn!("[runtime] Already running");
        return;
    }

    console_log!("[runtime] Starting frame loop");
    request_animation_frame();
}

/// Stop the frame loop
pub fn stop() {
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.running = false;
        state.guest = None;
    });
    console_log!("[runtime] Stopped");
}

/// Request the next animation frame
fn request_animation_frame() {
    let window = match web_sys::window() {
        Some(w) => w,
        None => {
            console_error!("[runtime] No window object");
            return;
        }
    };

    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let closure = state.frame_closure.get_or_insert_with(|| {
            Closure::wrap(Box::new(frame_tick) as Box<dyn FnMut(f64)>)
        });
        if let Err(e) = window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            console_error!("[runtime] requestAnimationFrame failed: {:?}", e);
        }
    });
}

/// Called every frame by requestAnimationFrame
fn frame_tick(_timestamp: f64) {
    let guest = STATE.with(|state| {
        let state = state.borrow();
        if state.running { state.guest.clone() } else { None }
    });
    let Some(guest) = guest else {
        return;
    };
    if guest.bridge.borrow().frame().is_halted() {
        stop();
        return;
    }

    request_animation_frame();
    deliver_dropped_files(&guest);

    let callback = guest.bridge.borrow_mut().frame_mut().begin_tick();
    let Some(callback) = callback else {
        return;
    };

    let result = guest
        .table
        .get(callback.func)
        .and_then(|f| f.call1(&JsValue::NULL, &JsValue::from(callback.opaque)))
        .map(|_| ());
    let result = classify(&guest.bridge, result);

    let outcome = guest.bridge.borrow_mut().frame_mut().end_tick(result);
    if outcome == TickOutcome::Stop {
        stop();
    }
}

/// Copy queued drops into guest memory through its allocator
fn deliver_dropped_files(guest: &Guest) {
    let files = guest.bridge.borrow_mut().take_dropped_files();
    for file in files {
        let Some(malloc) = &guest.malloc else {
            console_warn!("[runtime] {} discarded: guest has no allocator", file.name);
            continue;
        };

        let ptr = match malloc.call1(&JsValue::NULL, &JsValue::from(file.data.len() as u32)) {
            Ok(ptr) => ptr.as_f64().unwrap_or(0.0) as i64 as u32,
            Err(e) => {
                console_error!("[runtime] malloc for {} threw: {:?}", file.name, e);
                continue;
            }
        };
        if ptr == 0 {
            console_warn!("[runtime] malloc({}) failed for {}", file.data.len(), file.name);
            continue;
        }

        match guest.bridge.borrow_mut().deliver_file(ptr, &file.data) {
            Ok(()) => console_log!("[runtime] {} copied to 0x{:X}", file.name, ptr),
            Err(e) => console_error!("[runtime] {} not delivered: {}", file.name, e),
        }
    }
}
