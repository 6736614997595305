use leptos::prelude::*;
use leptos_icons::Icon;
use web_sys::MouseEvent;

use crate::models::sessions::SessionSummary;

#[component]
pub fn Sidebar(
    #[prop(into)] sessions: Signal<Vec<SessionSummary>>,
    #[prop(into)] active_id: Signal<String>,
    #[prop(into)] on_new: Callback<()>,
    #[prop(into)] on_select: Callback<String>,
    #[prop(into)] on_delete: Callback<String>,
) -> impl IntoView {
    view! {
        <div class="hidden md:flex flex-col w-64 bg-gray-200 dark:bg-gray-800/50 p-4 border-r border-white/10 dark:border-gray-700/50">
            <button
                class="flex items-center justify-center w-full px-4 py-3 mb-4 text-sm font-semibold text-white
                bg-gradient-to-br from-green-500 to-teal-500 rounded-lg
                hover:from-green-600 hover:to-teal-600 transition-all duration-300 transform hover:scale-105
                focus:outline-none focus:ring-2 focus:ring-offset-2 focus:ring-green-500 dark:focus:ring-offset-gray-800"
                on:click=move |_| on_new.run(())
            >
                <Icon icon=icondata_mdi::MdiPlus width="20" height="20" />
                <span class="ml-2">"New Chat"</span>
            </button>

            <div class="flex-1 overflow-y-auto">
                <h2 class="px-2 mb-2 text-xs font-semibold text-gray-500 dark:text-gray-400 uppercase tracking-wider">
                    "Recent Chats"
                </h2>
                <div class="space-y-2">
                    <For
                        each=move || sessions.get()
                        key=|session| (session.id.clone(), session.title.clone())
                        children=move |session| {
                            let id = session.id.clone();
                            let is_active = Signal::derive(move || active_id.get() == id);
                            view! {
                                <SessionItem
                                    session=session
                                    is_active=is_active
                                    on_select=on_select
                                    on_delete=on_delete
                                />
                            }
                        }
                    />
                </div>
            </div>

            <div class="mt-auto pt-4">
                <p class="text-xs text-center text-gray-500 dark:text-gray-400">"© GGStudio"</p>
            </div>
        </div>
    }
}

#[component]
fn SessionItem(
    session: SessionSummary,
    is_active: Signal<bool>,
    on_select: Callback<String>,
    on_delete: Callback<String>,
) -> impl IntoView {
    let select_id = session.id.clone();
    let delete_id = session.id;
    let tooltip = session.title.clone();

    let item_class = move || {
        let state = if is_active.get() {
            "bg-gray-300/50 dark:bg-gray-700/50"
        } else {
            "hover:bg-gray-300/50 dark:hover:bg-gray-700/50"
        };
        format!(
            "{state} group flex items-center px-3 py-2 text-sm font-medium text-gray-700 dark:text-gray-200 rounded-lg cursor-pointer"
        )
    };

    view! {
        <div class=item_class on:click=move |_| on_select.run(select_id.clone())>
            <span class="mr-3 text-gray-500 dark:text-gray-400">
                <Icon icon=icondata_mdi::MdiMessageOutline width="20" height="20" />
            </span>
            <span class="flex-1 truncate" title=tooltip>
                {session.title}
            </span>
            <button
                class="ml-2 text-gray-400 dark:text-gray-500 hover:text-red-500 opacity-0 group-hover:opacity-100 transition-opacity"
                aria-label="Delete chat"
                on:click=move |event: MouseEvent| {
                    event.stop_propagation();
                    on_delete.run(delete_id.clone());
                }
            >
                <Icon icon=icondata_bs::BsTrash width="16" height="16" />
            </button>
        </div>
    }
}
