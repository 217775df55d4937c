//! Live-reload channel.
//!
//! [`ReloadHub`] fans reload notifications out to every connected browser.
//! [`ReloadServer`] exposes it over plain HTTP on loopback:
//!
//! ```text
//! GET /events     text/event-stream, one `event: refresh` per sync
//! GET /client.js  script that reloads the page on `refresh`
//! ```

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::error::{io_err, WatchError};
use crate::paths::{events_url, reload_addr, CLIENT_SCRIPT_PATH, EVENTS_PATH};

/// Fire-and-forget notification sink.
pub trait ReloadChannel: Send + Sync {
    fn emit(&self, event: &str);
}

#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<String>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ReloadChannel for ReloadHub {
    fn emit(&self, event: &str) {
        // No receivers is not a failure: nobody is looking at the preview.
        match self.tx.send(event.to_string()) {
            Ok(clients) => tracing::debug!(event, clients, "reload notification sent"),
            Err(_) => tracing::debug!(event, "reload notification dropped, no clients"),
        }
    }
}

/// Bound reload endpoint, not yet serving.
pub struct ReloadServer {
    listener: TcpListener,
    addr: SocketAddr,
    hub: ReloadHub,
}

impl ReloadServer {
    /// Bind `127.0.0.1:<port>`. Port 0 picks a free port.
    pub async fn bind(port: u16, hub: ReloadHub) -> Result<Self, WatchError> {
        let requested = reload_addr(port);
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| WatchError::Bind {
                addr: requested,
                source,
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| io_err("reload listener", e))?;
        Ok(Self {
            listener,
            addr,
            hub,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept clients until shutdown. Open event streams are closed on
    /// shutdown as well.
    pub async fn serve(
        self,
        shutdown_tx: broadcast::Sender<()>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), WatchError> {
        tracing::info!(url = %events_url(self.addr), "reload endpoint listening");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::warn!(error = %err, "reload endpoint accept failed");
                            continue;
                        }
                    };
                    let hub = self.hub.clone();
                    let client_shutdown = shutdown_tx.subscribe();
                    let addr = self.addr;
                    tokio::spawn(async move {
                        if let Err(err) = handle_client(stream, hub, addr, client_shutdown).await {
                            tracing::debug!(%peer, error = %err, "reload client closed");
                        }
                    });
                }
            }
        }

        Ok(())
    }
}

async fn handle_client(
    stream: TcpStream,
    hub: ReloadHub,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .await
        .map_err(|e| io_err("reload request", e))?;
    loop {
        let mut header = String::new();
        let read = reader
            .read_line(&mut header)
            .await
            .map_err(|e| io_err("reload request", e))?;
        if read == 0 || header.trim().is_empty() {
            break;
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target);

    match path {
        EVENTS_PATH => {
            // Subscribe before answering so nothing emitted after the
            // client sees the headers is lost.
            let mut events = hub.subscribe();
            let head = "HTTP/1.1 200 OK\r\n\
                        Content-Type: text/event-stream\r\n\
                        Cache-Control: no-cache\r\n\
                        Connection: keep-alive\r\n\
                        Access-Control-Allow-Origin: *\r\n\r\n\
                        : connected\n\n";
            write_all(&mut writer, head.as_bytes()).await?;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    event = events.recv() => match event {
                        Ok(name) => {
                            let frame = format!("event: {name}\ndata: {name}\n\n");
                            write_all(&mut writer, frame.as_bytes()).await?;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "reload client lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        }
        CLIENT_SCRIPT_PATH => {
            let body = client_script(addr);
            let response = format!(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: application/javascript\r\n\
                 Content-Length: {}\r\n\
                 Access-Control-Allow-Origin: *\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            write_all(&mut writer, response.as_bytes()).await?;
        }
        _ => {
            write_all(
                &mut writer,
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            )
            .await?;
        }
    }

    Ok(())
}

async fn write_all(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    bytes: &[u8],
) -> Result<(), WatchError> {
    writer
        .write_all(bytes)
        .await
        .map_err(|e| io_err("reload client write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("reload client flush", e))
}

/// Script served at `/client.js`; include it in the theme layout during
/// development.
pub fn client_script(addr: SocketAddr) -> String {
    format!(
        "(function () {{\n  \
           var source = new EventSource('{}');\n  \
           source.addEventListener('{}', function () {{ window.location.reload(); }});\n\
         }})();\n",
        events_url(addr),
        crate::paths::RELOAD_EVENT
    )
}
