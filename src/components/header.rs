use leptos::prelude::*;
use leptos_icons::Icon;

use crate::components::dark_mode_toggle::DarkModeToggle;

#[component]
pub fn Header() -> impl IntoView {
    view! {
        <div class="flex items-center justify-between p-4 border-b border-white/20 dark:border-gray-700/50">
            <div class="flex items-center">
                <div class="relative text-green-500 dark:text-green-400">
                    <Icon icon=icondata_mdi::MdiRobotHappyOutline width="44" height="44" />
                    <span class="absolute bottom-0 right-0 block h-3 w-3 rounded-full bg-green-500 border-2 border-white/80 dark:border-gray-800/80 animate-pulse"></span>
                </div>
                <div class="ml-4">
                    <h1 class="text-xl font-bold bg-clip-text text-transparent bg-gradient-to-r from-green-600 to-teal-500 dark:from-green-400 dark:to-teal-300">
                        "GGStudio Bot"
                    </h1>
                    <p class="text-sm text-green-700 dark:text-green-400 opacity-80">
                        "Coding Assistant"
                    </p>
                </div>
            </div>
            <DarkModeToggle />
        </div>
    }
}
