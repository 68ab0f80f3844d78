//! Session handler module.
//!
//! Runs one connection: reads lines, classifies them as commands or chat
//! text, and calls into the room directory, the session registry and rooms.
//! Everything the connection receives, its own replies included, goes
//! through its [`Outbox`] and is written by a dedicated writer task.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::ChatApp;
use crate::chat::{
    format_help, format_room_list, format_who, parse_input, ChatCommand, ChatInput,
    ChatParticipant, ConnectionId, Outbox,
};
use crate::error::{ChatError, Result};
use crate::server::{EchoMode, InputResult, LineBuffer, DEFAULT_MAX_LINE_BYTES};

/// Maximum nickname length, in characters.
pub const MAX_NICKNAME_LENGTH: usize = 24;

/// How long a closing session waits for its writer to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection options supplied by the transport.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Peer description for logs.
    pub peer: String,
    /// Name supplied by the transport (SSH user). When absent or invalid the
    /// client is asked for a nickname.
    pub username: Option<String>,
    /// Whether typed characters must be echoed back.
    pub echo: EchoMode,
}

/// Whether the session loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Disconnect,
}

/// Session handler for a single client connection.
pub struct SessionHandler {
    app: ChatApp,
    participant: ChatParticipant,
    outbox: Outbox,
    /// Show a `<name> > ` prompt; only for clients without local echo.
    prompt: bool,
}

impl SessionHandler {
    /// Serve one connection until it closes or the client exits.
    ///
    /// On return the connection has left its room and its writer has
    /// flushed.
    pub async fn run<S>(app: ChatApp, stream: S, options: SessionOptions) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = ConnectionId::new();
        let (reader, writer) = tokio::io::split(stream);
        let (outbox, receiver) = Outbox::channel(app.config().chat.outbox_capacity);
        let writer_task = tokio::spawn(write_loop(writer, receiver, id));

        info!("Session {} opened from {}", id, options.peer);

        let idle_timeout = match app.config().server.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let mut lines = LineReader::new(reader, outbox.clone(), options.echo, idle_timeout);

        let result = Self::serve(&app, id, &mut lines, outbox, options).await;

        if let Some(room) = app.registry().clear(&id).await {
            debug!("Session {} removed from room {}", id, room.name());
        }
        // Dropping the reader releases the last outbox clone; the writer then
        // drains whatever is queued and stops.
        drop(lines);
        match timeout(WRITER_DRAIN_TIMEOUT, writer_task).await {
            Ok(_) => {}
            Err(_) => warn!("Session {} writer did not drain in time", id),
        }

        match &result {
            Ok(()) => info!("Session {} closed", id),
            Err(e) => info!("Session {} closed with error: {}", id, e),
        }
        result
    }

    async fn serve<R>(
        app: &ChatApp,
        id: ConnectionId,
        lines: &mut LineReader<R>,
        outbox: Outbox,
        options: SessionOptions,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let name = match options.username.as_deref().and_then(normalize_nickname) {
            Some(name) => name,
            None => {
                outbox.send_raw(b"Nickname: ".to_vec()).await?;
                match lines.read_line().await? {
                    Some(line) => normalize_nickname(&line).unwrap_or_else(|| guest_name(&id)),
                    None => return Ok(()),
                }
            }
        };
        info!("Session {} is {}", id, name);

        let mut handler = SessionHandler {
            app: app.clone(),
            participant: ChatParticipant::new(id, name),
            outbox,
            prompt: options.echo == EchoMode::Normal,
        };

        handler
            .send_line(&format!("Hello {}!", handler.participant.name))
            .await?;
        handler.send_text(&format_help()).await?;
        handler.send_prompt().await?;

        while let Some(line) = lines.read_line().await? {
            if handler.dispatch(&line).await? == Flow::Disconnect {
                break;
            }
            handler.send_prompt().await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, line: &str) -> Result<Flow> {
        match parse_input(line) {
            ChatInput::Message(text) if text.trim().is_empty() => {}
            ChatInput::Message(text) => self.say(text).await?,
            ChatInput::Command(command) => {
                debug!("{} issued {}", self.participant.name, command);
                match command {
                    ChatCommand::Enter(name) => self.enter(&name).await?,
                    ChatCommand::Leave => self.leave().await?,
                    ChatCommand::Exit => {
                        self.send_line("Goodbye!").await?;
                        return Ok(Flow::Disconnect);
                    }
                    ChatCommand::List => self.list().await?,
                    ChatCommand::Create(name) => self.create(&name).await?,
                    ChatCommand::Who => self.who().await?,
                    ChatCommand::Help => self.send_text(&format_help()).await?,
                    ChatCommand::Unknown(name) => {
                        self.send_line(&format!("Unknown command: /{name}")).await?;
                        self.send_text(&format_help()).await?;
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn say(&mut self, text: String) -> Result<()> {
        let Some(room) = self.app.registry().get(&self.participant.id).await else {
            self.send_line("You are not in a room yet.").await?;
            return self.send_text(&format_help()).await;
        };

        let max = self.app.config().chat.max_message_length;
        if text.chars().count() > max {
            return self
                .send_line(&format!("*** Message too long (max {max} characters)"))
                .await;
        }

        let delivery = room.broadcast(&self.participant, text).await;
        if !delivery.is_complete() {
            debug!(
                "Broadcast from {} in {} missed {} recipient(s)",
                self.participant.name,
                room.name(),
                delivery.failed.len()
            );
        }
        Ok(())
    }

    async fn enter(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return self.send_line("Usage: /enter <room>").await;
        }
        let room = match self.app.directory().get(name).await {
            Ok(room) => room,
            Err(ChatError::NotFound(what)) => {
                debug!("{} asked for unknown {}", self.participant.name, what);
                return self.send_line("Invalid room!").await;
            }
            Err(e) => return Err(e),
        };
        self.app
            .registry()
            .enter(&room, self.participant.clone(), self.outbox.clone())
            .await;
        Ok(())
    }

    async fn leave(&mut self) -> Result<()> {
        match self.app.registry().clear(&self.participant.id).await {
            Some(room) => self.send_line(&format!("You left {}.", room.name())).await,
            None => self.send_line("You are not in a room.").await,
        }
    }

    async fn list(&mut self) -> Result<()> {
        let rooms = self.app.directory().list_rooms().await;
        self.send_text(&format_room_list(&rooms)).await
    }

    async fn create(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return self.send_line("Usage: /create <room>").await;
        }
        match self.app.directory().create(name).await {
            Ok(room) => {
                info!("{} created room {}", self.participant.name, room.name());
                self.send_line(&format!(
                    "Room created successfully. Use /enter {} to enter the room",
                    room.name()
                ))
                .await
            }
            Err(ChatError::AlreadyExists(_)) => {
                self.send_line(&format!("Room {name} already exists.")).await
            }
            Err(e) => self.send_line(&format!("Could not create room: {e}")).await,
        }
    }

    async fn who(&mut self) -> Result<()> {
        match self.app.registry().get(&self.participant.id).await {
            Some(room) => {
                let members = room.members().await;
                self.send_text(&format_who(&members, room.name())).await
            }
            None => self.send_line("You are not in a room.").await,
        }
    }

    async fn send_line(&self, line: &str) -> Result<()> {
        self.outbox.send_line(line).await?;
        Ok(())
    }

    async fn send_prompt(&self) -> Result<()> {
        if self.prompt {
            let prompt = format!("{} > ", self.participant.name);
            self.outbox.send_raw(prompt.into_bytes()).await?;
        }
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        for line in text.lines() {
            self.send_line(line).await?;
        }
        Ok(())
    }
}

/// Reads complete lines from a connection, echoing keystrokes when asked.
struct LineReader<R> {
    reader: R,
    buffer: LineBuffer,
    pending: VecDeque<String>,
    outbox: Outbox,
    idle_timeout: Option<Duration>,
    eof: bool,
    truncated: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(reader: R, outbox: Outbox, echo: EchoMode, idle_timeout: Option<Duration>) -> Self {
        Self {
            reader,
            buffer: LineBuffer::new(DEFAULT_MAX_LINE_BYTES, echo),
            pending: VecDeque::new(),
            outbox,
            idle_timeout,
            eof: false,
            truncated: false,
        }
    }

    /// Read the next line. `None` means the client is gone.
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }

            let n = match self.idle_timeout {
                Some(limit) => match timeout(limit, self.reader.read(&mut chunk)).await {
                    Ok(read) => read?,
                    Err(_) => {
                        info!("Idle timeout after {:?}", limit);
                        let _ = self.outbox.push_line("*** Idle timeout, disconnecting");
                        return Ok(None);
                    }
                },
                None => self.reader.read(&mut chunk).await?,
            };
            if n == 0 {
                return Ok(None);
            }

            let (results, echo) = self.buffer.process_bytes(&chunk[..n]);
            if !echo.is_empty() {
                self.outbox.send_raw(echo).await?;
            }
            for result in results {
                match result {
                    InputResult::Line(line) => {
                        if std::mem::take(&mut self.truncated) {
                            debug!("Line cut at {} bytes", DEFAULT_MAX_LINE_BYTES);
                            self.outbox
                                .send_line(&format!(
                                    "*** Line too long, truncated to {DEFAULT_MAX_LINE_BYTES} bytes"
                                ))
                                .await?;
                        }
                        self.pending.push_back(line);
                    }
                    InputResult::Overflow => self.truncated = true,
                    InputResult::Eof => {
                        self.eof = true;
                        break;
                    }
                    InputResult::Cancel => self.truncated = false,
                    InputResult::Buffering => {}
                }
            }
        }
    }
}

/// Drain a connection's outbox into its socket.
async fn write_loop<W>(mut writer: W, mut receiver: mpsc::Receiver<Vec<u8>>, id: ConnectionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = receiver.recv().await {
        let written = match writer.write_all(&bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            debug!("Session {} write failed: {}", id, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Validate a requested nickname, returning it trimmed.
pub fn normalize_nickname(name: &str) -> Option<String> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name.chars().count() <= MAX_NICKNAME_LENGTH
        && !name.starts_with('/')
        && !name.chars().any(|c| c.is_whitespace() || c.is_control() || c == '>');
    valid.then(|| name.to_string())
}

fn guest_name(id: &ConnectionId) -> String {
    let simple = id.as_uuid().simple().to_string();
    format!("guest-{}", &simple[..4])
}
