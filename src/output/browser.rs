//! Viewer page: hosts the Avaturn iframe and relays its messages

use axum::{extract::State, response::Html, routing::get, Router};
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::config::{LoaderConfig, ViewerConfig};
use crate::AppState;

/// Serves the viewer page and the asset directory
pub struct BrowserServer {
    app_state: Arc<AppState>,
    viewer: ViewerConfig,
    loader: LoaderConfig,
}

impl BrowserServer {
    pub fn new(app_state: Arc<AppState>) -> Self {
        let config = app_state.session.config();
        let viewer = config.viewer.clone();
        let loader = config.loader.clone();
        Self {
            app_state,
            viewer,
            loader,
        }
    }

    /// Create the router for the viewer page and static assets
    pub fn router(self) -> Router {
        let assets_dir = self.loader.assets_root.clone();
        let shared_state = Arc::new(self);

        Router::new()
            .route("/viewer", get(viewer_page))
            .nest_service("/assets", ServeDir::new(assets_dir))
            .with_state(shared_state)
    }
}

type BrowserState = Arc<BrowserServer>;

async fn viewer_page(State(state): State<BrowserState>) -> Html<String> {
    let current = state
        .app_state
        .session
        .current_avatar()
        .await
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());

    Html(render_viewer_page(&state.viewer.avaturn_url, &current))
}

/// Escape text for use inside an HTML attribute or element
fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render_viewer_page(avaturn_url: &str, current_avatar: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Kawari3D Viewer</title>
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            display: flex;
            height: 100vh;
            font-family: sans-serif;
            background: #ffffff;
        }}
        .avaturn-frame {{
            width: 50%;
            height: 100%;
            border: none;
        }}
        .viewer-status {{
            width: 50%;
            padding: 1rem;
            overflow-y: auto;
        }}
        .viewer-status li {{
            font-family: monospace;
            font-size: 0.85rem;
        }}
        .swap-failed {{
            color: #b00020;
        }}
    </style>
</head>
<body>
    <iframe
        id="avaturn-sdk-container"
        class="avaturn-frame"
        src="{avaturn_url}"
        allow="camera *; clipboard-write"
    ></iframe>

    <div class="viewer-status">
        <h3>Current avatar: <span id="current-avatar">{current_avatar}</span></h3>
        <ul id="event-log"></ul>
    </div>

    <script>
        // Relay every message from the iframe verbatim; the service decides
        // what is actionable.
        window.addEventListener('message', function(event) {{
            const body = typeof event.data === 'string'
                ? event.data
                : JSON.stringify(event.data);
            fetch('/api/message', {{
                method: 'POST',
                headers: {{ 'Content-Type': 'text/plain' }},
                body: body
            }}).catch(function(err) {{
                console.error('Failed to relay message:', err);
            }});
        }});

        function log(text, className) {{
            const item = document.createElement('li');
            item.textContent = new Date().toLocaleTimeString() + ' ' + text;
            if (className) {{
                item.className = className;
            }}
            document.getElementById('event-log').prepend(item);
        }}

        const evtSource = new EventSource('/api/stream');

        evtSource.addEventListener('avatar_swapped', function(event) {{
            const data = JSON.parse(event.data);
            document.getElementById('current-avatar').textContent = 'model#' + data.current;
            log('avatar swapped to model#' + data.current);
        }});

        evtSource.addEventListener('swap_failed', function(event) {{
            const data = JSON.parse(event.data);
            log('swap failed: ' + data.reason, 'swap-failed');
        }});

        evtSource.addEventListener('model_disposed', function(event) {{
            const data = JSON.parse(event.data);
            log('disposed model#' + data.id);
        }});

        evtSource.onerror = function(err) {{
            console.error('SSE error:', err);
        }};
    </script>
</body>
</html>"#,
        avaturn_url = escape_html(avaturn_url),
        current_avatar = escape_html(current_avatar),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"https://a.dev/?x="1"&y=<2>"#),
            "https://a.dev/?x=&quot;1&quot;&amp;y=&lt;2&gt;"
        );
    }

    #[test]
    fn test_viewer_page_embeds_iframe() {
        let html = render_viewer_page("https://demo.avaturn.dev", "model#1");
        assert!(html.contains(r#"src="https://demo.avaturn.dev""#));
        assert!(html.contains("model#1"));
        assert!(html.contains("fetch('/api/message'"));
        assert!(html.contains("new EventSource('/api/stream')"));
    }
}
