//! WebSocket session server
//!
//! One connection carries one conversation session. The persona comes from
//! the registry (`/voice-stream/{persona_id}`) or from a `start_session`
//! message (`/session`). Units are processed one at a time; a reader task
//! keeps watching the socket so a disconnect abandons the unit in flight.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::backend::{CompletionChain, OpenAiSpeech};
use crate::config::AppConfig;
use crate::conversation::PromptComposer;
use crate::error::{Error, Result};
use crate::persona::PersonaRegistry;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::{PipelineServices, StreamingOrchestrator, TRANSCRIPTION_APOLOGY};

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

// ─────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────

/// Where a connection's persona comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/voice-stream/{id}`: persona from the registry
    Registered(String),
    /// `/session`: persona sent in a `start_session` message
    Inline,
    Unknown(String),
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let path = path.split('?').next().unwrap_or_default().trim_end_matches('/');
        match path.strip_prefix("/voice-stream/") {
            Some(id) if !id.is_empty() && !id.contains('/') => Route::Registered(id.to_string()),
            _ if path == "/session" => Route::Inline,
            _ => Route::Unknown(path.to_string()),
        }
    }
}

/// Text shown to the client for a unit-scoped failure.
pub fn client_error_message(err: &Error) -> String {
    match err {
        Error::Transcription { .. } => TRANSCRIPTION_APOLOGY.to_string(),
        Error::ProtocolMalformed { message } => message.clone(),
        Error::SessionClosed { .. } => "The conversation has already ended.".to_string(),
        Error::PersonaInvalid { reason, .. } => format!("Invalid persona: {}", reason),
        Error::PersonaNotFound { id } => format!("Unknown persona '{}'", id),
        _ => "Something went wrong processing that message.".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────

/// Shared, read-only state for every connection
pub struct SessionServer {
    services: Arc<PipelineServices>,
    registry: Arc<PersonaRegistry>,
    greeting: String,
    max_message_bytes: usize,
}

impl SessionServer {
    pub fn new(services: Arc<PipelineServices>, registry: Arc<PersonaRegistry>, greeting: impl Into<String>) -> Self {
        Self {
            services,
            registry,
            greeting: greeting.into(),
            max_message_bytes: 16 * 1024 * 1024,
        }
    }

    /// Build the provider chain, speech gateway and registry from config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = PersonaRegistry::load(config.persona_dir().as_deref())?;

        let chain = CompletionChain::from_settings(&config.providers)?;
        if !config.providers.primary.is_configured() && !config.providers.secondary.is_configured() {
            warn!("No completion provider configured, replies will come from the offline simulator");
        }

        let speech = Arc::new(OpenAiSpeech::new(config.speech.clone())?);
        if !speech.is_configured() {
            warn!("Speech gateway not configured, audio units will fail and replies will be text-only");
        }

        let services = PipelineServices::new(chain, speech.clone(), speech)
            .with_composer(PromptComposer::new(config.conversation.history_window))
            .with_speaking_rate(config.speech.speaking_rate);

        let mut server = Self::new(Arc::new(services), Arc::new(registry), config.server.greeting.clone());
        server.max_message_bytes = config.server.max_message_bytes;
        Ok(server)
    }

    /// Accept connections until the listener fails.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, personas = self.registry.list().len(), "Session server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!(peer_addr = %peer_addr, "Incoming connection");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            debug!(peer_addr = %peer_addr, error = %e, "Connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut path = String::new();
        let ws_config = WebSocketConfig {
            max_message_size: Some(self.max_message_bytes),
            ..Default::default()
        };
        let ws = tokio_tungstenite::accept_hdr_async_with_config(
            stream,
            |req: &Request, resp: Response| {
                path = req.uri().path().to_string();
                Ok(resp)
            },
            Some(ws_config),
        )
        .await?;

        let (mut write, mut read) = ws.split();

        // Reader task: forwards frames and flags disconnects.
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<String>(32);
        let (closed_tx, mut closed_rx) = watch::channel(false);
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let text = match frame {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                if inbound_tx.send(text).await.is_err() {
                    break;
                }
            }
            let _ = closed_tx.send(true);
        });

        let result = match self.open_session(&path, &mut write, &mut inbound_rx).await {
            Ok(Some(orchestrator)) => {
                self.session_loop(orchestrator, &mut write, &mut inbound_rx, &mut closed_rx)
                    .await
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(path = %path, error = %e, "Session rejected");
                let _ = send(&mut write, &ServerMessage::error(client_error_message(&e))).await;
                let _ = write.send(WsMessage::Close(None)).await;
                Err(e)
            }
        };

        reader.abort();
        result
    }

    /// Resolve the persona for this connection and announce the session.
    async fn open_session(
        &self,
        path: &str,
        write: &mut WsSink,
        inbound_rx: &mut mpsc::Receiver<String>,
    ) -> Result<Option<StreamingOrchestrator>> {
        let orchestrator = match Route::parse(path) {
            Route::Registered(id) => {
                let persona = self.registry.get(&id).ok_or(Error::PersonaNotFound { id })?;
                StreamingOrchestrator::with_persona(Arc::clone(&self.services), persona)
            }
            Route::Inline => loop {
                let Some(text) = inbound_rx.recv().await else {
                    return Ok(None);
                };
                match ClientMessage::from_json(&text) {
                    Ok(ClientMessage::StartSession { persona }) => {
                        break StreamingOrchestrator::new(Arc::clone(&self.services), persona)?;
                    }
                    Ok(ClientMessage::EndConversation) => return Ok(None),
                    Err(e) => {
                        send(write, &ServerMessage::error(client_error_message(&e))).await?;
                    }
                    Ok(other) => {
                        let message = format!("Expected start_session, got {}", other.type_name());
                        send(write, &ServerMessage::error(message)).await?;
                    }
                }
            },
            Route::Unknown(path) => {
                return Err(Error::ProtocolMalformed {
                    message: format!("Unknown path '{}'", path),
                });
            }
        };

        let session = orchestrator.session();
        send(
            write,
            &ServerMessage::SessionStarted {
                session_id: session.id(),
                persona: session.persona().name().to_string(),
                voice: orchestrator.voice().voice,
                greeting: self.greeting.clone(),
            },
        )
        .await?;

        Ok(Some(orchestrator))
    }

    async fn session_loop(
        &self,
        mut orchestrator: StreamingOrchestrator,
        write: &mut WsSink,
        inbound_rx: &mut mpsc::Receiver<String>,
        closed_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let session_id = orchestrator.session().id();

        while let Some(text) = inbound_rx.recv().await {
            let message = match ClientMessage::from_json(&text) {
                Ok(message) => message,
                Err(e) => {
                    send(write, &ServerMessage::error(client_error_message(&e))).await?;
                    continue;
                }
            };

            match message {
                ClientMessage::EndConversation => {
                    let summary = orchestrator.end();
                    send(write, &ServerMessage::from(summary)).await?;
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok(());
                }
                ClientMessage::StartSession { .. } => {
                    send(write, &ServerMessage::error("Session already started")).await?;
                }
                other => {
                    let unit = match other.into_unit() {
                        Ok(Some(unit)) => unit,
                        Ok(None) => continue,
                        Err(e) => {
                            send(write, &ServerMessage::error(client_error_message(&e))).await?;
                            continue;
                        }
                    };

                    let outcome = tokio::select! {
                        result = orchestrator.handle_unit(unit) => Some(result),
                        _ = closed_rx.changed() => None,
                    };

                    match outcome {
                        Some(Ok(reply)) => send(write, &ServerMessage::from(reply)).await?,
                        Some(Err(e)) => send(write, &ServerMessage::error(client_error_message(&e))).await?,
                        None => {
                            info!(session_id = %session_id, "Client disconnected mid-unit, unit abandoned");
                            break;
                        }
                    }
                }
            }
        }

        orchestrator.end();
        info!(session_id = %session_id, "Client disconnected");
        Ok(())
    }
}

async fn send(write: &mut WsSink, message: &ServerMessage) -> Result<()> {
    let json = message.to_json()?;
    write
        .send(WsMessage::Text(json))
        .await
        .map_err(|e| Error::ConnectionLost {
            message: e.to_string(),
        })
}
