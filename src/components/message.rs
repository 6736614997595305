use leptos::prelude::*;
use leptos_icons::Icon;

use crate::components::markdown::MarkdownRenderer;
use crate::types::{Message, MessageStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BotBody {
    Typing,
    Failed,
    Markdown,
}

#[component]
pub fn MessageBubble(#[prop(into)] message: Signal<Message>) -> impl IntoView {
    // the sender of a message never changes
    if message.with_untracked(Message::is_user) {
        view! { <UserBubble message=message /> }.into_any()
    } else {
        view! { <BotBubble message=message /> }.into_any()
    }
}

#[component]
fn UserBubble(message: Signal<Message>) -> impl IntoView {
    let attachment = move || {
        message.with(|m| m.image_mime.clone()).map(|mime| {
            view! {
                <div class="flex items-center gap-1 mb-2 text-xs text-white/80">
                    <Icon icon=icondata_mdi::MdiPaperclip width="14" height="14" />
                    <span>{attachment_label(&mime)}</span>
                </div>
            }
        })
    };

    view! {
        <div class="flex items-start gap-3 animate-fade-in-up justify-end">
            <div class="px-4 py-3 rounded-2xl max-w-sm md:max-w-md break-words shadow-md bg-gradient-to-br from-green-500 to-teal-500 text-white rounded-br-none">
                {attachment}
                <p class="whitespace-pre-wrap">{move || message.with(|m| m.text.clone())}</p>
            </div>
        </div>
    }
}

#[component]
fn BotBubble(message: Signal<Message>) -> impl IntoView {
    let text = Signal::derive(move || message.with(|m| m.text.clone()));
    let body = Memo::new(move |_| {
        message.with(|m| match m.status {
            MessageStatus::Streaming if m.text.is_empty() => BotBody::Typing,
            MessageStatus::Error => BotBody::Failed,
            _ => BotBody::Markdown,
        })
    });

    let bubble_class = move || {
        let palette = if body.get() == BotBody::Failed {
            "bg-red-50 dark:bg-red-900/40 text-red-700 dark:text-red-300 border border-red-200 dark:border-red-800"
        } else {
            "bg-white dark:bg-gray-700 text-gray-800 dark:text-gray-200"
        };
        format!("{palette} px-4 py-3 rounded-2xl max-w-sm md:max-w-md break-words shadow-md rounded-bl-none min-w-0")
    };

    view! {
        <div class="flex items-start gap-3 animate-fade-in-up justify-start">
            <div class="flex-shrink-0 w-8 h-8 rounded-full bg-green-100 dark:bg-green-900/50 flex items-center justify-center ring-2 ring-white dark:ring-gray-800 text-green-500 dark:text-green-400">
                <Icon icon=icondata_mdi::MdiRobotHappyOutline width="20" height="20" />
            </div>
            <div class=bubble_class>
                {move || match body.get() {
                    BotBody::Typing => view! { <TypingIndicator /> }.into_any(),
                    BotBody::Failed => {
                        view! { <p class="whitespace-pre-wrap">{move || text.get()}</p> }.into_any()
                    }
                    BotBody::Markdown => view! { <MarkdownRenderer content=text /> }.into_any(),
                }}
            </div>
        </div>
    }
}

#[component]
fn TypingIndicator() -> impl IntoView {
    view! {
        <div class="flex items-center gap-1 py-1" aria-label="GreenBot is typing">
            <span class="w-2 h-2 rounded-full bg-green-400 animate-bounce"></span>
            <span class="w-2 h-2 rounded-full bg-green-400 animate-bounce [animation-delay:150ms]"></span>
            <span class="w-2 h-2 rounded-full bg-green-400 animate-bounce [animation-delay:300ms]"></span>
        </div>
    }
}

fn attachment_label(mime: &str) -> String {
    match mime.strip_prefix("image/") {
        Some(kind) if !kind.is_empty() => format!("Image attached ({kind})"),
        _ => "Image attached".to_string(),
    }
}
