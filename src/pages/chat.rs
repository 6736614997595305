use leptos::{prelude::*, task::spawn_local};
use log::{error, info, warn};
use std::time::Duration;
use web_sys::EventSource;

use crate::client::{self, StreamUpdate};
use crate::components::chat_input::ChatInput;
use crate::components::chat_window::ChatWindow;
use crate::components::header::Header;
use crate::components::sidebar::Sidebar;
use crate::components::toast::Toast;
use crate::models::sessions::SessionStore;
use crate::models::stream_slot::StreamSlot;
use crate::storage;
use crate::types::{ChatRequest, ImageAttachment, StreamEvent};

const CONNECTION_LOST: &str = "Lost connection to the chatbot service.";

fn release_stream(stream_id: String) {
    spawn_local(async move {
        match client::cancel_stream(&stream_id).await {
            Ok(()) => info!("Stream {stream_id} cancelled"),
            Err(e) => warn!("failed to cancel stream {stream_id}: {e}"),
        }
    });
}

#[component]
pub fn ChatPage() -> impl IntoView {
    let store = RwSignal::new(SessionStore::new());
    let (loaded, set_loaded) = signal(false);
    // EventSource is not Send, so the slot stays on this thread
    let slot = StoredValue::new_local(StreamSlot::<EventSource>::default());
    let (is_streaming, set_is_streaming) = signal(false);
    let (toast_visible, set_toast_visible) = signal(false);
    let (toast_message, set_toast_message) = signal(String::new());

    Effect::new(move |_| {
        store.set(storage::load_sessions());
        set_loaded.set(true);
    });

    // persist every change once the saved sessions are in
    Effect::new(move |_| {
        if !loaded.get() {
            return;
        }
        store.with(|s| {
            if let Err(e) = storage::save_sessions(s) {
                warn!("sessions not saved: {e}");
            }
        });
    });

    let show_toast = move |message: String| {
        set_toast_message.set(message);
        set_toast_visible.set(true);
        set_timeout(move || set_toast_visible.set(false), Duration::from_secs(5));
    };

    let is_current =
        move |placeholder_id: &str| slot.with_value(|s| s.is_current(placeholder_id));

    // Some when `placeholder_id` still owned the stream
    let end_stream = move |placeholder_id: &str| {
        let released = slot
            .try_update_value(|s| s.finish(placeholder_id))
            .flatten();
        set_is_streaming.set(slot.with_value(|s| s.is_active()));
        released
    };

    let fail_reply = move |placeholder_id: &str, reason: String| {
        if end_stream(placeholder_id).is_some() {
            store.update(|s| s.fail_message(placeholder_id, &reason));
            show_toast(reason);
        }
    };

    let send_message = move |(text, image): (String, Option<ImageAttachment>)| {
        if slot.with_value(|s| s.is_active()) {
            return;
        }

        let Some((placeholder_id, request)) = store.try_update(|s| {
            s.append_user_message(&text, image.as_ref().map(|i| i.mime_type.clone()));
            let history = s.request_history();
            let placeholder_id = s.push_placeholder();
            (placeholder_id, ChatRequest { history, image })
        }) else {
            return;
        };

        slot.update_value(|s| {
            s.begin(placeholder_id.clone());
        });
        set_is_streaming.set(true);

        spawn_local(async move {
            let stream_id = match client::create_stream(&request).await {
                Ok(stream_id) => stream_id,
                Err(e) => {
                    error!("failed to create stream: {e}");
                    fail_reply(&placeholder_id, e.to_string());
                    return;
                }
            };

            let attached = slot
                .try_update_value(|s| s.attach_stream_id(&placeholder_id, &stream_id))
                .unwrap_or(false);
            if !attached {
                // cancelled before the relay answered
                release_stream(stream_id);
                return;
            }

            let handler_id = placeholder_id.clone();
            let opened = client::open_event_stream(&stream_id, move |update| {
                match update {
                    StreamUpdate::Event(StreamEvent::Content { content }) => {
                        if !is_current(&handler_id) {
                            return false;
                        }
                        let delivered = store
                            .try_update(|s| s.append_chunk(&handler_id, &content))
                            .unwrap_or(false);
                        if !delivered {
                            // its session was deleted
                            let released = end_stream(&handler_id).and_then(|r| r.stream_id);
                            if let Some(stream_id) = released {
                                release_stream(stream_id);
                            }
                        }
                        delivered
                    }
                    StreamUpdate::Event(StreamEvent::Done) => {
                        if end_stream(&handler_id).is_some() {
                            store.update(|s| s.finish_message(&handler_id));
                        }
                        false
                    }
                    StreamUpdate::Event(StreamEvent::Cancelled) => {
                        if end_stream(&handler_id).is_some() {
                            store.update(|s| s.cancel_message(&handler_id));
                        }
                        false
                    }
                    StreamUpdate::Event(StreamEvent::Error { content }) => {
                        error!("stream failed: {content}");
                        fail_reply(&handler_id, content);
                        false
                    }
                    StreamUpdate::Disconnected => {
                        fail_reply(&handler_id, CONNECTION_LOST.to_string());
                        false
                    }
                }
            });

            match opened {
                Ok(event_source) => {
                    // a stale connection is closed by the slot itself
                    slot.update_value(|s| {
                        s.attach_connection(&placeholder_id, event_source);
                    });
                }
                Err(e) => {
                    error!("failed to open event stream: {e}");
                    fail_reply(&placeholder_id, e.to_string());
                    release_stream(stream_id);
                }
            }
        });
    };

    let cancel_message = move |_: ()| {
        // closes the EventSource before the relay confirms
        let Some(released) = slot.try_update_value(|s| s.cancel()).flatten() else {
            return;
        };
        set_is_streaming.set(false);
        store.update(|s| s.cancel_message(&released.placeholder_id));
        if let Some(stream_id) = released.stream_id {
            release_stream(stream_id);
        }
    };

    let new_chat = move |_: ()| {
        store.update(|s| {
            s.create_session();
        });
    };

    let select_chat = move |id: String| {
        store.update(|s| {
            s.switch_to(&id);
        });
    };

    let delete_chat = move |id: String| {
        store.update(|s| {
            s.delete_session(&id);
        });
        let orphaned = slot.with_value(|s| {
            s.placeholder_id()
                .is_some_and(|p| !store.with_untracked(|st| st.has_message(p)))
        });
        if !orphaned {
            return;
        }
        if let Some(released) = slot.try_update_value(|s| s.cancel()).flatten() {
            set_is_streaming.set(false);
            if let Some(stream_id) = released.stream_id {
                release_stream(stream_id);
            }
        }
    };

    let sessions = Signal::derive(move || store.with(|s| s.summaries()));
    let active_id = Signal::derive(move || store.with(|s| s.active_id().to_string()));
    let messages = Memo::new(move |_| store.with(|s| s.active_messages().to_vec()));

    view! {
        <div class="flex h-screen bg-gradient-to-br from-emerald-50 via-teal-100 to-cyan-100 dark:from-gray-900 dark:via-emerald-900/50 dark:to-black">
            <Sidebar
                sessions=sessions
                active_id=active_id
                on_new=new_chat
                on_select=select_chat
                on_delete=delete_chat
            />
            <div class="flex-1 flex items-center justify-center p-4 min-w-0">
                <div class="w-full max-w-2xl h-[90vh] max-h-[800px] flex flex-col bg-white/70 dark:bg-gray-800/70 backdrop-blur-2xl rounded-3xl shadow-2xl shadow-green-500/10 border border-white/30 dark:border-gray-700/50">
                    <Header />
                    <ChatWindow messages=messages />
                    <ChatInput
                        is_streaming=is_streaming
                        on_send=send_message
                        on_cancel=cancel_message
                        on_error=move |message: String| show_toast(message)
                    />
                </div>
            </div>
            <Toast
                message=toast_message
                visible=toast_visible
                on_close=move || set_toast_visible.set(false)
            />
        </div>
    }
}
