//! TCP server dispatching client frames to per-connection handlers.
//!
//! The accept loop registers every new connection with the factory's
//! initial handler and spawns one worker task for it. The worker reads a
//! frame, asks the session's current handler whether it is relevant, lets
//! it handle the request, installs the handler it names, and writes the
//! reply back. Any I/O failure ends only that session.

use crate::config::Config;
use crate::error::ServerError;
use crate::handler::{RequestResult, Transition};
use crate::handlers::HandlerFactory;
use crate::protocol::{read_frame, RequestInfo, MAX_FRAME_SIZE};
use crate::session::{ConnectionId, SessionRegistry};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

/// Per-session I/O deadlines. `None` waits forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }
}

/// Server instance
pub struct Server {
    listener: TcpListener,
    factory: Arc<dyn HandlerFactory>,
    sessions: Arc<SessionRegistry>,
    connection_limit: Arc<Semaphore>,
    options: SessionOptions,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &Config, factory: Arc<dyn HandlerFactory>) -> Result<Self, ServerError> {
        let listener = bind_listener(&config.listen, config.backlog)?;

        Ok(Server {
            listener,
            factory,
            sessions: Arc::new(SessionRegistry::new()),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            options: SessionOptions::from(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Accept connections until the listener fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves or the listener fails,
    /// then close every session and wait for the workers to finish.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        tokio::pin!(shutdown);

        if let Ok(addr) = self.local_addr() {
            info!(address = %addr, "Server listening");
        }

        let result = loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                _ = &mut shutdown => break Ok(()),
                Some(res) = workers.join_next(), if !workers.is_empty() => {
                    reap(res);
                    continue;
                }
                permit = Arc::clone(&self.connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Ok(()),
                },
            };

            tokio::select! {
                biased;

                _ = &mut shutdown => break Ok(()),

                Some(res) = workers.join_next(), if !workers.is_empty() => reap(res),

                res = self.listener.accept() => match res {
                    Ok((stream, peer)) => {
                        let id = self.sessions.register(self.factory.create_login_handler());
                        debug!(conn = %id, peer = %peer, "New connection");

                        let sessions = Arc::clone(&self.sessions);
                        let options = self.options;
                        let shutdown_rx = shutdown_rx.clone();
                        workers.spawn(async move {
                            serve_session(stream, id, sessions, options, shutdown_rx).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        break Err(ServerError::Accept(e));
                    }
                },
            }
        };

        info!(sessions = self.sessions.len(), "Server stopping, closing sessions");
        let _ = shutdown_tx.send(true);
        while let Some(res) = workers.join_next().await {
            reap(res);
        }
        info!("All sessions closed");

        result
    }
}

fn reap(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        if e.is_panic() {
            error!("A session worker panicked: {e:?}");
        }
    }
}

/// Create the listening socket with `SO_REUSEADDR` and the given backlog.
fn bind_listener(listen: &str, backlog: i32) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = listen.parse().map_err(|source| ServerError::InvalidAddress {
        addr: listen.to_string(),
        source,
    })?;
    let bind_err = |source| ServerError::Bind {
        addr: listen.to_string(),
        source,
    };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(backlog).map_err(bind_err)?;

    TcpListener::from_std(socket.into()).map_err(bind_err)
}

/// Removes the session and notifies its last handler when the worker exits,
/// including by panic.
struct SessionGuard {
    sessions: Arc<SessionRegistry>,
    id: ConnectionId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(slot) = self.sessions.remove(self.id) {
            let mut handler = slot.lock();
            debug!(conn = %self.id, state = handler.name(), "Session closed");
            handler.on_disconnect();
        }
    }
}

/// What the current handler made of a frame.
enum Dispatch {
    /// Not relevant in the current state.
    Ignored,
    Reply { response: Bytes, close: bool },
    /// The session is no longer registered.
    Gone,
}

/// Run one request against the session's current handler and apply the
/// transition it returns.
fn dispatch(sessions: &SessionRegistry, id: ConnectionId, request: &RequestInfo) -> Dispatch {
    let Some(slot) = sessions.get(id) else {
        return Dispatch::Gone;
    };
    let mut handler = slot.lock();

    if !handler.is_request_relevant(request) {
        trace!(conn = %id, state = handler.name(), code = ?request.code, "Dropping irrelevant request");
        return Dispatch::Ignored;
    }

    let RequestResult {
        response,
        transition,
    } = handler.handle_request(request);

    let close = match transition {
        Transition::Stay => false,
        Transition::Switch(next) => {
            debug!(conn = %id, from = handler.name(), to = next.name(), "Session transition");
            *handler = next;
            false
        }
        Transition::Close => true,
    };

    Dispatch::Reply { response, close }
}

/// Apply an optional deadline to an I/O future.
async fn with_deadline<F, T>(deadline: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed")),
        },
        None => fut.await,
    }
}

/// Serve one registered session until the peer goes away, an I/O call
/// fails, the handler closes the session, or `shutdown` fires.
///
/// The session is removed from `sessions` on every exit path.
pub async fn serve_session<S>(
    mut stream: S,
    id: ConnectionId,
    sessions: Arc<SessionRegistry>,
    options: SessionOptions,
    mut shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _guard = SessionGuard {
        sessions: Arc::clone(&sessions),
        id,
    };
    let mut buf = [0u8; MAX_FRAME_SIZE];

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => {
                debug!(conn = %id, "Closing session for shutdown");
                return;
            }
            frame = with_deadline(options.read_timeout, read_frame(&mut stream, &mut buf)) => frame,
        };

        let request = match frame {
            Ok(Some(request)) => request,
            Ok(None) => {
                trace!(conn = %id, "Connection closed by client");
                return;
            }
            Err(e) => {
                debug!(conn = %id, error = %e, "Read failed");
                return;
            }
        };

        let (response, close) = match dispatch(&sessions, id, &request) {
            Dispatch::Ignored => continue,
            Dispatch::Reply { response, close } => (response, close),
            Dispatch::Gone => {
                warn!(conn = %id, "Session vanished from registry");
                return;
            }
        };

        if !response.is_empty() {
            // A peer that stops reading must not hold up shutdown
            let written = tokio::select! {
                _ = shutdown.changed() => {
                    debug!(conn = %id, "Closing session for shutdown during write");
                    return;
                }
                res = with_deadline(options.write_timeout, stream.write_all(&response)) => res,
            };
            if let Err(e) = written {
                debug!(conn = %id, error = %e, "Write failed");
                return;
            }
        }

        if close {
            trace!(conn = %id, "Handler closed the session");
            let _ = stream.shutdown().await;
            return;
        }
    }
}
