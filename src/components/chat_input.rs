use leptos::{ev::SubmitEvent, prelude::*, task::spawn_local};
use leptos_icons::Icon;
use log::error;
use web_sys::{HtmlInputElement, MouseEvent};

use crate::client::read_image;
use crate::types::ImageAttachment;

#[component]
pub fn ChatInput(
    #[prop(into)] is_streaming: Signal<bool>,
    #[prop(into)] on_send: Callback<(String, Option<ImageAttachment>)>,
    #[prop(into)] on_cancel: Callback<()>,
    #[prop(into)] on_error: Callback<String>,
) -> impl IntoView {
    let (text, set_text) = signal(String::new());
    let attachment = RwSignal::new(None::<ImageAttachment>);

    let submit = move || {
        if is_streaming.get_untracked() {
            return;
        }
        let message = text.get_untracked();
        if message.trim().is_empty() {
            return;
        }
        on_send.run((message, attachment.get_untracked()));
        set_text.set(String::new());
        attachment.set(None);
    };

    let on_file_change = move |event: web_sys::Event| {
        let input = event_target::<HtmlInputElement>(&event);
        let Some(file) = input.files().and_then(|files| files.get(0)) else {
            return;
        };
        // lets the same file be picked again after removing it
        input.set_value("");

        spawn_local(async move {
            match read_image(file).await {
                Ok(image) => attachment.set(Some(image)),
                Err(e) => {
                    error!("failed to attach image: {e}");
                    on_error.run(e.to_string());
                }
            }
        });
    };

    let on_button_click = move |event: MouseEvent| {
        if is_streaming.get_untracked() {
            event.prevent_default();
            on_cancel.run(());
        }
    };

    let preview = move || {
        attachment.get().map(|image| {
            view! {
                <div class="flex items-center gap-2 mb-2 px-2 py-1 w-fit rounded-lg bg-green-100 dark:bg-gray-700 text-xs text-green-800 dark:text-green-200">
                    <img src=image.data_url() alt="Attached image" class="h-10 w-10 object-cover rounded" />
                    <span>{image.mime_type.clone()}</span>
                    <button
                        type="button"
                        class="text-gray-500 hover:text-red-500"
                        aria-label="Remove image"
                        on:click=move |_| attachment.set(None)
                    >
                        <Icon icon=icondata_mdi::MdiClose width="14" height="14" />
                    </button>
                </div>
            }
        })
    };

    view! {
        <div class="p-4 border-t border-white/20 dark:border-gray-700/50 bg-transparent">
            {preview}
            <form
                class="flex items-center space-x-3"
                on:submit=move |event: SubmitEvent| {
                    event.prevent_default();
                    submit();
                }
            >
                <label
                    class="p-2 rounded-full cursor-pointer text-green-600 dark:text-green-400 hover:bg-green-100 dark:hover:bg-gray-700 transition-colors"
                    title="Attach an image"
                >
                    <Icon icon=icondata_mdi::MdiPaperclip width="22" height="22" />
                    <input
                        type="file"
                        accept="image/*"
                        class="hidden"
                        on:change=on_file_change
                        disabled=move || is_streaming.get()
                    />
                </label>
                <input
                    type="text"
                    class="flex-1 px-5 py-3 bg-gray-100/50 dark:bg-gray-900/50 text-gray-800 dark:text-gray-200
                    border-2 border-transparent rounded-full
                    focus:outline-none focus:ring-2 focus:ring-green-400 dark:focus:border-green-500 focus:bg-white dark:focus:bg-gray-700
                    transition-all duration-300"
                    placeholder="Ask GreenBot anything..."
                    aria-label="Chat input"
                    prop:value=text
                    on:input=move |event| set_text.set(event_target_value(&event))
                    disabled=move || is_streaming.get()
                />
                <button
                    type="submit"
                    class="p-3 text-white rounded-full transition-all duration-300 transform hover:scale-110
                    disabled:opacity-50 disabled:cursor-not-allowed
                    focus:outline-none focus:ring-2 focus:ring-offset-2 focus:ring-green-500 dark:focus:ring-offset-gray-800"
                    class:bg-gradient-to-br=move || !is_streaming.get()
                    class:from-green-500=move || !is_streaming.get()
                    class:to-teal-500=move || !is_streaming.get()
                    class:bg-red-500=move || is_streaming.get()
                    class:hover:bg-red-600=move || is_streaming.get()
                    aria-label=move || if is_streaming.get() { "Stop response" } else { "Send message" }
                    disabled=move || !is_streaming.get() && text.with(|t| t.trim().is_empty())
                    on:click=on_button_click
                >
                    {move || {
                        if is_streaming.get() {
                            view! { <Icon icon=icondata_mdi::MdiStop width="24" height="24" /> }
                                .into_any()
                        } else {
                            view! { <Icon icon=icondata_io::IoSend width="24" height="24" /> }
                                .into_any()
                        }
                    }}
                </button>
            </form>
        </div>
    }
}
