/// Writes a status line to the browser console. Native builds (tests) stay silent.
#[cfg(target_arch = "wasm32")]
pub fn log_status(s: &str) {
    web_sys::console::log_1(&format!("mapnotes: {}", s.trim()).into());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log_status(_s: &str) {}
