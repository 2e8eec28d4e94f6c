//! WebSocket live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the reload WebSocket endpoint.
pub const RELOAD_PATH: &str = "/__reload";

/// Path the client script is served from.
pub const RELOAD_SCRIPT_PATH: &str = "/__reload.js";

/// Messages pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Connection established
    Connected,
}

/// Broadcasts reload messages to every connected client.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Ask every connected page to reload.
    pub fn reload(&self) {
        let clients = self.send(ReloadMessage::Reload);
        tracing::debug!("Reload sent to {} client(s)", clients);
    }

    /// Send a message, returning how many clients received it.
    pub fn send(&self, msg: ReloadMessage) -> usize {
        // No receivers just means no browser is connected.
        self.sender.send(msg).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Tag injected into served HTML pages.
pub fn reload_script_tag() -> String {
    format!(r#"<script src="{}"></script>"#, RELOAD_SCRIPT_PATH)
}

/// Client-side script that connects to the reload socket on the page's own host.
pub fn reload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var attempts = 0;

  function connect() {{
    var ws = new WebSocket(scheme + location.host + '{}');

    ws.onopen = function() {{
      attempts = 0;
    }};

    ws.onmessage = function(event) {{
      var msg = JSON.parse(event.data);
      if (msg.type === 'reload') {{
        location.reload();
      }} else if (msg.type === 'connected') {{
        console.log('[pages] live reload connected');
      }}
    }};

    ws.onclose = function() {{
      if (attempts < 10) {{
        attempts++;
        setTimeout(connect, 1000 * attempts);
      }}
    }};
  }}

  connect();
}})();
"#,
        RELOAD_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_reload() {
        let hub = ReloadHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.reload();

        assert_eq!(first.try_recv().unwrap(), ReloadMessage::Reload);
        assert_eq!(second.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[test]
    fn sending_without_clients_is_harmless() {
        let hub = ReloadHub::new();
        assert_eq!(hub.send(ReloadMessage::Reload), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn serializes_messages() {
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Reload).unwrap(),
            r#"{"type":"reload"}"#
        );
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Connected).unwrap(),
            r#"{"type":"connected"}"#
        );
    }

    #[test]
    fn client_script_targets_reload_endpoint() {
        let script = reload_client_script();
        assert!(script.contains("'/__reload'"));
        assert!(script.contains("location.reload()"));
    }
}
