//! Boot sequence
//!
//! Fetch the guest module, wire every import in `Import::ALL` to the shared
//! `Bridge`, instantiate, and run `_start`. A libmatoya guest never returns
//! from `_start` normally: it registers a frame callback and is unwound, at
//! which point the frame loop in `runtime` takes over.

use crate::bridge::abi::{ValType, Value, exports};
use crate::bridge::memory::JsMemory;
use crate::bridge::{Bridge, BridgeError, BridgeResult, FrameState, Import};
use crate::config::BridgeConfig;
use crate::platform::web::WebPlatform;
use crate::runtime::{self, Guest};
use crate::{console_log, console_warn};
use js_sys::{Array, Function, Object, Reflect, WebAssembly};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// The bridge as shared by every import closure and the frame loop
pub type SharedBridge = Rc<RefCell<Bridge<WebPlatform>>>;

/// Thrown to unwind the guest after `web_raf`
const UNWIND: &str = "mty-bridge: unwind";
/// Thrown to unwind the guest after `proc_exit`
const EXIT: &str = "mty-bridge: exit";

/// How `_start` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Returned without registering a frame callback
    Returned,
    /// Unwound by `web_raf`; the frame loop owns the guest from here
    ContinuationRegistered,
    Exited(i32),
}

/// Boot the guest at `url`
pub async fn boot(url: &str, config: BridgeConfig) -> BridgeResult<()> {
    let bytes = fetch_module(url).await?;
    let module = compile_module(&bytes).await?;
    check_imports(&module);

    let malloc_export = config.malloc_export.clone();
    let bridge: SharedBridge = Rc::new(RefCell::new(Bridge::new(WebPlatform::new(), config)));
    let imports = create_imports(&bridge)?;
    let instance = instantiate_module(&module, &imports).await?;
    let exports = instance.exports();

    let memory: WebAssembly::Memory = export(&exports, exports::MEMORY, "Memory")?;
    bridge.borrow_mut().bind_memory(JsMemory::new(memory));
    let table: WebAssembly::Table = export(&exports, exports::FUNCTION_TABLE, "Table")?;
    let start: Function = export(&exports, exports::START, "Function")?;
    let malloc = optional_function(&exports, &malloc_export);

    console_log!("[boot] {} instantiated, running {}", url, exports::START);
    let result = start.call0(&JsValue::NULL).map(|_| ());
    match classify_entry(&bridge, result)? {
        EntryOutcome::Returned => {
            console_log!("[boot] {} returned without a frame callback", exports::START)
        }
        EntryOutcome::Exited(code) => console_log!("[boot] guest exited with code {}", code),
        EntryOutcome::ContinuationRegistered => runtime::start(Guest {
            bridge,
            table,
            malloc,
        }),
    }
    Ok(())
}

/// Sort the result of a call into the guest into the bridge's terms
///
/// The glue throws a marker for the bridge's own control flow; anything else
/// the guest threw is a trap.
pub fn classify(bridge: &SharedBridge, result: Result<(), JsValue>) -> BridgeResult<()> {
    let Err(thrown) = result else {
        return Ok(());
    };
    if let Some(code) = bridge.borrow().exit_code() {
        return Err(BridgeError::Exit { code });
    }
    match thrown.as_string().as_deref() {
        Some(UNWIND) => Err(BridgeError::Unwind),
        _ => Err(BridgeError::Trap {
            reason: describe(&thrown),
        }),
    }
}

fn classify_entry(
    bridge: &SharedBridge,
    result: Result<(), JsValue>,
) -> BridgeResult<EntryOutcome> {
    match classify(bridge, result) {
        Ok(()) => Ok(EntryOutcome::Returned),
        Err(BridgeError::Exit { code }) => Ok(EntryOutcome::Exited(code)),
        Err(BridgeError::Unwind) => match bridge.borrow().frame().state() {
            FrameState::Scheduled(_) => Ok(EntryOutcome::ContinuationRegistered),
            FrameState::Idle | FrameState::Halted => Ok(EntryOutcome::Returned),
        },
        Err(e) => Err(e),
    }
}

fn describe(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    match value.dyn_ref::<js_sys::Error>() {
        Some(e) => String::from(e.message()),
        None => format!("{:?}", value),
    }
}

async fn fetch_module(url: &str) -> BridgeResult<JsValue> {
    let fetch_err = |reason: String| BridgeError::Fetch {
        url: url.to_string(),
        reason,
    };

    let window = web_sys::window().ok_or_else(|| fetch_err("no window".to_string()))?;
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| fetch_err(describe(&e)))?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| fetch_err("not a Response".to_string()))?;
    if !response.ok() {
        return Err(fetch_err(format!("HTTP {}", response.status())));
    }

    let buffer = response.array_buffer().map_err(|e| fetch_err(describe(&e)))?;
    JsFuture::from(buffer)
        .await
        .map_err(|e| fetch_err(describe(&e)))
}

/// Compile WASM bytecode into a module
async fn compile_module(bytes: &JsValue) -> BridgeResult<WebAssembly::Module> {
    let result = JsFuture::from(WebAssembly::compile(bytes))
        .await
        .map_err(|e| BridgeError::InstantiationFailed {
            reason: describe(&e),
        })?;

    result
        .dyn_into::<WebAssembly::Module>()
        .map_err(|_| BridgeError::InstantiationFailed {
            reason: "failed to cast to Module".to_string(),
        })
}

/// Log declared imports the bridge does not provide
fn check_imports(module: &WebAssembly::Module) {
    for descriptor in WebAssembly::Module::imports(module).iter() {
        let field = |key: &str| {
            Reflect::get(&descriptor, &JsValue::from_str(key))
                .ok()
                .and_then(|v| v.as_string())
                .unwrap_or_default()
        };
        let (namespace, name, kind) = (field("module"), field("name"), field("kind"));
        if kind == "function" && Import::lookup(&namespace, &name).is_none() {
            console_warn!("[boot] unknown import {}.{}", namespace, name);
        }
    }
}

/// Instantiate a compiled module with imports
async fn instantiate_module(
    module: &WebAssembly::Module,
    imports: &Object,
) -> BridgeResult<WebAssembly::Instance> {
    let result = JsFuture::from(WebAssembly::instantiate_module(module, imports))
        .await
        .map_err(|e| BridgeError::InstantiationFailed {
            reason: describe(&e),
        })?;

    result
        .dyn_into::<WebAssembly::Instance>()
        .map_err(|_| BridgeError::InstantiationFailed {
            reason: "failed to cast to Instance".to_string(),
        })
}

fn export<T: JsCast>(
    exports: &Object,
    name: &'static str,
    expected: &'static str,
) -> BridgeResult<T> {
    let value = Reflect::get(exports, &JsValue::from_str(name))
        .ok()
        .filter(|v| !v.is_undefined())
        .ok_or(BridgeError::MissingExport { name })?;
    value
        .dyn_into()
        .map_err(|_| BridgeError::WrongExportType { name, expected })
}

fn optional_function(exports: &Object, name: &str) -> Option<Function> {
    let function = Reflect::get(exports, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.dyn_into::<Function>().ok());
    if function.is_none() {
        console_warn!("[boot] no '{}' export, dropped files will be discarded", name);
    }
    function
}

/// Import object with one function per entry in `Import::ALL`
fn create_imports(bridge: &SharedBridge) -> BridgeResult<Object> {
    let set_err = |what: &str| BridgeError::InstantiationFailed {
        reason: format!("failed to set {}", what),
    };

    // Wasm calls imports with positional arguments; collect them into one array
    let variadic = Function::new_with_args("f", "return function(...args) { return f(args); }");

    let namespaces = Object::new();
    for &import in Import::ALL {
        let namespace = JsValue::from_str(import.namespace());
        let table = match Reflect::get(&namespaces, &namespace) {
            Ok(t) if t.is_object() => t,
            _ => {
                let t: JsValue = Object::new().into();
                Reflect::set(&namespaces, &namespace, &t).map_err(|_| set_err(import.namespace()))?;
                t
            }
        };

        let shared = Rc::clone(bridge);
        let closure = Closure::wrap(Box::new(move |args: Array| -> Result<JsValue, JsValue> {
            dispatch(&shared, import, &args)
        }) as Box<dyn FnMut(Array) -> Result<JsValue, JsValue>>);

        let function = variadic
            .call1(&JsValue::NULL, closure.as_ref())
            .map_err(|_| set_err(import.name()))?;
        closure.forget(); // Leak intentionally - imports live as long as the guest

        Reflect::set(&table, &JsValue::from_str(import.name()), &function)
            .map_err(|_| set_err(import.name()))?;
    }
    Ok(namespaces)
}

/// Run one import, releasing the bridge before any throw
fn dispatch(bridge: &SharedBridge, import: Import, args: &Array) -> Result<JsValue, JsValue> {
    let signature = import.signature();
    let values: Vec<Value> = signature
        .params
        .iter()
        .enumerate()
        .map(|(i, &ty)| to_value(ty, args.get(i as u32)))
        .collect();

    let result = bridge.borrow_mut().call(import, &values);
    match result {
        Ok(Some(Value::I32(v))) => Ok(JsValue::from(v)),
        Ok(Some(Value::I64(v))) => Ok(js_sys::BigInt::from(v).into()),
        Ok(Some(Value::F32(v))) => Ok(JsValue::from(v)),
        Ok(None) => Ok(JsValue::UNDEFINED),
        Err(BridgeError::Unwind) => Err(JsValue::from_str(UNWIND)),
        Err(BridgeError::Exit { .. }) => Err(JsValue::from_str(EXIT)),
        Err(e) => Err(js_sys::Error::new(&e.to_string()).into()),
    }
}

fn to_value(ty: ValType, arg: JsValue) -> Value {
    match ty {
        ValType::I32 => Value::I32(arg.as_f64().map(|n| n as i64 as i32).unwrap_or(0)),
        ValType::F32 => Value::F32(arg.as_f64().unwrap_or(0.0) as f32),
        ValType::I64 => Value::I64(
            arg.dyn_ref::<js_sys::BigInt>()
                .and_then(|b| b.to_string(10).ok())
                .and_then(|s| String::from(s).parse().ok())
                .unwrap_or(0),
        ),
    }
}
