#![cfg(target_arch = "wasm32")]

use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_name = queueMicrotask)]
	fn queue_microtask(closure: &JsValue);
}

/// Runs `func` once the current JS task is done, which is where a batch
/// started with `Runtime::batch_microtask` flushes.
pub fn queue<F: FnOnce() + 'static>(func: F) {
	queue_microtask(&Closure::once_into_js(func));
}
