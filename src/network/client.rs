//! Client
//!
//! The client side of a session: binds its three channel listeners, sends
//! CONNECT and waits for the server to dial back.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{KvsError, Result};
use crate::protocol::{
    decode_notification, encode_connect, encode_request, read_response, ConnectRequest, OpCode,
    Request, Status, NOTIFICATION_SIZE,
};
use crate::subscription::Notification;

const CHANNEL_OPEN_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// A connected client session
pub struct Client {
    request: TcpStream,
    response: TcpStream,
    notifications: Option<NotificationStream>,
}

impl Client {
    /// Open a session with the server at `server`
    ///
    /// Returns once a session worker has acknowledged the CONNECT, which
    /// may take a while if every worker is busy.
    pub fn connect(server: impl ToSocketAddrs) -> Result<Self> {
        let listeners = [bind_channel()?, bind_channel()?, bind_channel()?];
        let ids = listeners
            .iter()
            .map(|l| l.local_addr().map(|a| a.to_string()))
            .collect::<std::io::Result<Vec<_>>>()?;

        let connect = ConnectRequest {
            request: ids[0].clone(),
            response: ids[1].clone(),
            notification: ids[2].clone(),
        };

        let mut rendezvous = TcpStream::connect(server)
            .map_err(|e| KvsError::Init(format!("cannot reach server: {}", e)))?;
        rendezvous.write_all(&encode_connect(&connect)?)?;
        rendezvous.flush()?;

        let deadline = Instant::now() + CHANNEL_OPEN_TIMEOUT;
        let [request, response, notification] = listeners;
        let request = accept_within(&request, deadline)?;
        let mut response = accept_within(&response, deadline)?;
        let notification = accept_within(&notification, deadline)?;
        request.set_nodelay(true)?;

        let ack = read_response(&mut response)?;
        if ack.opcode != OpCode::Connect || !ack.status.is_ok() {
            return Err(KvsError::Protocol(format!(
                "unexpected CONNECT reply: {:?}",
                ack
            )));
        }
        tracing::debug!("Connected: req={} resp={} notif={}", ids[0], ids[1], ids[2]);

        Ok(Self {
            request,
            response,
            notifications: Some(NotificationStream::new(notification)),
        })
    }

    /// Subscribe to `key`
    pub fn subscribe(&mut self, key: &str) -> Result<Status> {
        self.call(Request::Subscribe {
            key: key.to_string(),
        })
    }

    /// Unsubscribe from `key`
    pub fn unsubscribe(&mut self, key: &str) -> Result<Status> {
        self.call(Request::Unsubscribe {
            key: key.to_string(),
        })
    }

    /// End the session
    pub fn disconnect(mut self) -> Result<()> {
        match self.call(Request::Disconnect) {
            Ok(_) => Ok(()),
            // Already closed from the server side.
            Err(e) if e.is_disconnect() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Take the notification stream, e.g. to drain it on another thread
    pub fn take_notifications(&mut self) -> Option<NotificationStream> {
        self.notifications.take()
    }

    fn call(&mut self, request: Request) -> Result<Status> {
        let opcode = request.opcode();
        self.request.write_all(&encode_request(&request)?)?;
        self.request.flush()?;

        let response = read_response(&mut self.response)?;
        if response.opcode != opcode {
            return Err(KvsError::Protocol(format!(
                "reply to {:?} carried opcode {:?}",
                opcode, response.opcode
            )));
        }
        Ok(response.status)
    }
}

/// Incoming notifications of one session
pub struct NotificationStream {
    stream: TcpStream,
    partial: Vec<u8>,
}

impl NotificationStream {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            partial: Vec::with_capacity(NOTIFICATION_SIZE),
        }
    }

    /// Block for the next notification; `None` once the server closed the channel
    pub fn recv(&mut self) -> Result<Option<Notification>> {
        match self.next_frame(None) {
            Ok(notification) => Ok(notification),
            Err(KvsError::ChannelClosed(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Wait up to `timeout`; `None` on timeout, `ChannelClosed` once closed
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Notification>> {
        self.next_frame(Some(Instant::now() + timeout))
    }

    fn next_frame(&mut self, deadline: Option<Instant>) -> Result<Option<Notification>> {
        let mut chunk = [0u8; NOTIFICATION_SIZE];

        while self.partial.len() < NOTIFICATION_SIZE {
            let timeout = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            self.stream.set_read_timeout(timeout)?;

            let wanted = NOTIFICATION_SIZE - self.partial.len();
            match self.stream.read(&mut chunk[..wanted]) {
                Ok(0) => {
                    return Err(KvsError::ChannelClosed("notification channel".to_string()))
                }
                Ok(n) => self.partial.extend_from_slice(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    let error = KvsError::Io(e);
                    if error.is_disconnect() {
                        return Err(KvsError::ChannelClosed(format!(
                            "notification channel: {}",
                            error
                        )));
                    }
                    return Err(error);
                }
            }
        }

        let notification = decode_notification(&self.partial);
        self.partial.clear();
        notification.map(Some)
    }
}

impl Iterator for NotificationStream {
    type Item = Notification;

    fn next(&mut self) -> Option<Self::Item> {
        match self.recv() {
            Ok(notification) => notification,
            Err(e) => {
                tracing::debug!("Notification stream ended: {}", e);
                None
            }
        }
    }
}

fn bind_channel() -> Result<TcpListener> {
    TcpListener::bind("127.0.0.1:0")
        .map_err(|e| KvsError::Init(format!("cannot bind channel listener: {}", e)))
}

fn accept_within(listener: &TcpListener, deadline: Instant) -> Result<TcpStream> {
    listener.set_nonblocking(true)?;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                if Instant::now() >= deadline {
                    return Err(KvsError::Init(
                        "server did not open the session channels".to_string(),
                    ));
                }
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}
