pub mod app;
#[cfg(feature = "ssr")]
pub mod cancellable_sse;
pub mod client;
pub mod components;
#[cfg(feature = "ssr")]
pub mod config;
#[cfg(feature = "ssr")]
pub mod handlers;
#[cfg(feature = "ssr")]
pub mod middleware;
pub mod models;
pub mod pages;
#[cfg(feature = "ssr")]
pub mod services;
pub mod state;
pub mod storage;
pub mod types;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}
