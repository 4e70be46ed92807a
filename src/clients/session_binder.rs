use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::models::{BootstrapResponse, CodeMessage};

type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The editing surface the binder keeps in sync.
pub trait Editor {
    fn get_value(&self) -> String;
    fn set_value(&mut self, value: &str);
}

/// In-memory editor, used headless and in tests.
#[derive(Debug, Clone, Default)]
pub struct BufferEditor {
    value: String,
}

impl BufferEditor {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

impl Editor for BufferEditor {
    fn get_value(&self) -> String {
        self.value.clone()
    }

    fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
    }
}

/// Location path paired with the session it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBinding {
    pub location: String,
    pub session_id: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("bootstrap request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),
    #[error("client is not bound to a session")]
    Unbound,
    #[error("no open connection")]
    NotConnected,
    #[error("connection closed by server")]
    Closed,
}

impl From<tungstenite::Error> for ClientError {
    fn from(e: tungstenite::Error) -> Self {
        ClientError::WebSocket(Box::new(e))
    }
}

pub fn live_path(session_id: &str) -> String {
    format!("/live/{}", session_id)
}

/// Last non-empty path segment, e.g. `abc123` for `/live/abc123/`.
pub fn session_id_from_path(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Client half of the protocol: obtains a session, keeps exactly one live
/// connection to it, and mirrors the document into an [`Editor`].
pub struct SessionBinder<E: Editor> {
    http: Client,
    base_url: String,
    ws_base: String,
    editor: E,
    location: String,
    binding: Option<ClientBinding>,
    /// Survives one load cycle; taken when the connection target is built.
    transient: Option<String>,
    connection: Option<LiveSocket>,
}

impl<E: Editor> SessionBinder<E> {
    pub fn new(base_url: impl Into<String>, editor: E) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base_url.clone()
        };
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url,
            ws_base,
            editor,
            location: "/".to_string(),
            binding: None,
            transient: None,
            connection: None,
        })
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn binding(&self) -> Option<&ClientBinding> {
        self.binding.as_ref()
    }

    pub fn pending_session(&self) -> Option<&str> {
        self.transient.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Ask the server for a session and bind to it. On failure the error is
    /// logged and the binder stays unbound.
    pub async fn bootstrap(&mut self) -> Result<String, ClientError> {
        match self.fetch_session_id().await {
            Ok(session_id) => {
                self.bind(&session_id);
                info!("Bound to session {}", session_id);
                Ok(session_id)
            }
            Err(e) => {
                error!("Failed to fetch session ID: {}", e);
                Err(e)
            }
        }
    }

    async fn fetch_session_id(&self) -> Result<String, ClientError> {
        let url = format!("{}/", self.base_url);
        let response: BootstrapResponse = self.http
            .get(&url)
            .send().await?
            .error_for_status()?
            .json().await?;
        Ok(response.session_id)
    }

    fn bind(&mut self, session_id: &str) {
        let location = live_path(session_id);
        self.location = location.clone();
        self.transient = Some(session_id.to_string());
        self.binding = Some(ClientBinding {
            location,
            session_id: session_id.to_string(),
        });
    }

    /// Bootstrap then connect, the full first-load sequence.
    pub async fn load(&mut self) -> Result<String, ClientError> {
        let session_id = self.bootstrap().await?;
        self.connect().await?;
        Ok(session_id)
    }

    /// Open the realtime connection for the bound session.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let session_id = match self.transient.take() {
            Some(session_id) => session_id,
            None => self
                .binding
                .as_ref()
                .map(|b| b.session_id.clone())
                .ok_or(ClientError::Unbound)?,
        };
        self.rebind(&session_id).await
    }

    /// Close whatever is open, then open a connection to `session_id`.
    async fn rebind(&mut self, session_id: &str) -> Result<(), ClientError> {
        self.disconnect().await;
        let url = format!("{}{}", self.ws_base, live_path(session_id));
        let (socket, _) = connect_async(url.as_str()).await?;
        debug!("Connected to {}", url);
        self.connection = Some(socket);
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut socket) = self.connection.take() {
            if let Err(e) = socket.close(None).await {
                debug!("Close handshake failed: {}", e);
            }
        }
    }

    /// The location changed without a reload. Rebinds when it names another
    /// session; returns whether a new connection was opened.
    pub async fn navigate(&mut self, path: &str) -> Result<bool, ClientError> {
        let Some(session_id) = session_id_from_path(path).map(str::to_string) else {
            return Ok(false);
        };
        self.location = path.to_string();

        let same = self.binding.as_ref().is_some_and(|b| b.session_id == session_id);
        if same && self.connection.is_some() {
            return Ok(false);
        }

        self.transient = None;
        self.binding = Some(ClientBinding {
            location: live_path(&session_id),
            session_id: session_id.clone(),
        });
        self.rebind(&session_id).await?;
        info!("Rebound to session {}", session_id);
        Ok(true)
    }

    /// Send the editor's full content.
    pub async fn on_local_change(&mut self) -> Result<(), ClientError> {
        let frame = CodeMessage::new(self.editor.get_value()).encode();
        let socket = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        socket.send(Message::text(frame)).await?;
        Ok(())
    }

    /// Wait for the next document from the server and put it into the
    /// editor verbatim.
    pub async fn next_update(&mut self) -> Result<String, ClientError> {
        loop {
            let socket = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
            let next = socket.next().await;
            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.connection = None;
                    return Err(e.into());
                }
                None => {
                    self.connection = None;
                    return Err(ClientError::Closed);
                }
            };

            match read_frame(&message) {
                Inbound::Code(code) => {
                    self.editor.set_value(&code);
                    return Ok(code);
                }
                Inbound::Closed => {
                    self.connection = None;
                    return Err(ClientError::Closed);
                }
                Inbound::Skip => continue,
            }
        }
    }
}

/// What an inbound frame means for the bound editor.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Code(String),
    Closed,
    Skip,
}

/// Decode a server frame. Binary frames must be UTF-8 JSON like text ones;
/// anything else is skipped.
fn read_frame(message: &Message) -> Inbound {
    let text = match message {
        Message::Text(text) => text.as_str(),
        Message::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping binary frame that is not UTF-8: {}", e);
                return Inbound::Skip;
            }
        },
        Message::Close(_) => return Inbound::Closed,
        _ => return Inbound::Skip,
    };

    match serde_json::from_str::<CodeMessage>(text) {
        Ok(msg) => Inbound::Code(msg.code),
        Err(e) => {
            warn!("Skipping malformed frame: {}", e);
            Inbound::Skip
        }
    }
}
