use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "ssr")] {
        use axum::extract::FromRef;
        use leptos::prelude::LeptosOptions;

        use crate::cancellable_sse::StreamRegistry;
        use crate::config::RelayConfig;
        use crate::services::GeminiService;

        #[derive(FromRef, Clone)]
        pub struct AppState {
            pub leptos_options: LeptosOptions,
            pub gemini: GeminiService,
            pub streams: StreamRegistry,
        }

        impl AppState {
            pub fn new(leptos_options: LeptosOptions, config: RelayConfig) -> Self {
                let streams = StreamRegistry::new(config.stream_ttl);
                Self {
                    leptos_options,
                    gemini: GeminiService::new(config),
                    streams,
                }
            }
        }
    }
}
