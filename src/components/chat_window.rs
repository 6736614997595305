use leptos::{html::Div, prelude::*};
use web_sys::{ScrollBehavior, ScrollIntoViewOptions};

use crate::components::message::MessageBubble;
use crate::types::Message;

const GREETING: &str =
    "Hi, I'm GreenBot. Ask me about code, game dev or anything GGStudio is working on.";

#[component]
pub fn ChatWindow(#[prop(into)] messages: Signal<Vec<Message>>) -> impl IntoView {
    let chat_end = NodeRef::<Div>::new();

    Effect::new(move |_| {
        messages.track();
        if let Some(end) = chat_end.get() {
            let options = ScrollIntoViewOptions::new();
            options.set_behavior(ScrollBehavior::Smooth);
            end.scroll_into_view_with_scroll_into_view_options(&options);
        }
    });

    view! {
        <div class="flex-1 p-6 overflow-y-auto">
            <div class="flex flex-col gap-5">
                <Show when=move || messages.with(Vec::is_empty)>
                    <div class="flex flex-col items-center justify-center mt-16 text-center text-gray-500 dark:text-gray-400">
                        <p class="text-lg font-semibold text-green-600 dark:text-green-400">
                            "Hello there!"
                        </p>
                        <p class="mt-2 max-w-sm text-sm">{GREETING}</p>
                    </div>
                </Show>
                <For
                    each=move || messages.get()
                    key=|message| message.id.clone()
                    children=move |message| {
                        let id = message.id.clone();
                        // keep the last seen copy if the message vanishes mid-update
                        let current = Memo::new(move |_| {
                            messages
                                .with(|all| all.iter().find(|m| m.id == id).cloned())
                                .unwrap_or_else(|| message.clone())
                        });
                        view! { <MessageBubble message=current /> }
                    }
                />
                <div node_ref=chat_end></div>
            </div>
        </div>
    }
}
