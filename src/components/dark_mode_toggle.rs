use leptos::prelude::*;
use log::warn;
use web_sys::window;

use crate::storage::{load_dark_mode, save_dark_mode};

#[component]
pub fn DarkModeToggle() -> impl IntoView {
    let (is_dark, set_is_dark) = signal(false);

    // runs once after hydration, localStorage does not exist on the server
    Effect::new(move |_| {
        let dark_mode = load_dark_mode().unwrap_or_else(prefers_dark);
        set_is_dark.set(dark_mode);
        apply_dark_mode(dark_mode);
    });

    let toggle_dark_mode = move |_| {
        let new_state = !is_dark.get();
        set_is_dark.set(new_state);
        apply_dark_mode(new_state);

        if let Err(e) = save_dark_mode(new_state) {
            warn!("dark mode preference not saved: {e}");
        }
    };

    view! {
        <button
            class="p-2 rounded-full text-lg hover:bg-green-100 dark:hover:bg-gray-700 transition-colors"
            aria-label="Toggle dark mode"
            on:click=toggle_dark_mode
        >
            {move || if is_dark.get() { "🌞" } else { "🌙" }}
        </button>
    }
}

fn prefers_dark() -> bool {
    window()
        .and_then(|w| w.match_media("(prefers-color-scheme: dark)").ok().flatten())
        .map(|query| query.matches())
        .unwrap_or(false)
}

fn apply_dark_mode(is_dark: bool) {
    if let Some(window) = window() {
        if let Some(document) = window.document() {
            if let Some(body) = document.body() {
                let _ = if is_dark {
                    body.class_list().add_1("dark")
                } else {
                    body.class_list().remove_1("dark")
                };
            }
        }
    }
}
