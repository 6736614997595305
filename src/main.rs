use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "ssr")] {
        use anyhow::Context;
        use axum::Router;
        use dotenv::dotenv;
        use env_logger::Env;
        use greenbot::app::*;
        use greenbot::config::RelayConfig;
        use greenbot::handlers::api_router;
        use greenbot::state::AppState;
        use leptos::prelude::*;
        use leptos_axum::{generate_route_list, LeptosRoutes};
        use std::net::SocketAddr;

        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            dotenv().ok();
            env_logger::init_from_env(Env::default().default_filter_or("info"));

            let conf = get_configuration(None).context("failed to read leptos configuration")?;
            let addr = conf.leptos_options.site_addr;
            let leptos_options = conf.leptos_options;

            let relay_config = RelayConfig::from_env()?;
            if relay_config.api_key.is_none() {
                log::warn!("API_KEY is not set, chat requests will fail until it is");
            }
            log::info!("relaying to model {}", relay_config.model);
            let max_body_bytes = relay_config.max_body_bytes();

            // Generate the list of routes in your Leptos App
            let routes = generate_route_list(App);

            let app_state = AppState::new(leptos_options.clone(), relay_config);
            app_state.streams.spawn_sweeper();

            let app = Router::new()
                .merge(api_router(max_body_bytes))
                .leptos_routes(&app_state, routes, {
                    let leptos_options = leptos_options.clone();
                    move || shell(leptos_options.clone())
                })
                .fallback(leptos_axum::file_and_error_handler::<AppState, _>(shell))
                .with_state(app_state);

            log::info!("Starting server at {addr}");

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            log::info!("listening on http://{}", &addr);
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
            Ok(())
        }
    } else {
        pub fn main() {
            // no client-side main function
            // see lib.rs for hydration function instead
        }
    }
}
