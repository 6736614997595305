use leptos::prelude::*;

#[component]
pub fn Toast(
    message: ReadSignal<String>,
    visible: ReadSignal<bool>,
    #[prop(into)] on_close: Callback<()>,
) -> impl IntoView {
    let visibility_class = move || {
        if visible.get() {
            "opacity-100 pointer-events-auto"
        } else {
            "opacity-0 pointer-events-none"
        }
    };

    view! {
        <div
            role="alert"
            class=move || {
                format!(
                    "{} fixed bottom-4 right-4 z-50 max-w-sm bg-white dark:bg-gray-800 text-red-600 dark:text-red-400 border border-red-200 dark:border-red-800 px-4 py-2 rounded-lg shadow-lg transition-opacity duration-300",
                    visibility_class(),
                )
            }
        >
            {message}
            <button
                class="ml-2 text-gray-500 hover:text-gray-700 dark:text-gray-400 dark:hover:text-gray-200"
                aria-label="Dismiss"
                on:click=move |_| on_close.run(())
            >
                "×"
            </button>
        </div>
    }
}
