// RouterOS API session
//
// Owns one framed TCP connection to a router. Commands are strictly
// sequential: a sentence is written, then replies are read until the
// terminating `!done`. Tags are never used, so a session must not be
// shared between concurrent callers (`&mut self` enforces that).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::codec::SentenceCodec;
use crate::error::Error;
use crate::reply::{Record, Reply};
use crate::transport::TransportConfig;

/// An authenticated RouterOS API connection.
pub struct Session {
    framed: Framed<TcpStream, SentenceCodec>,
    peer: String,
    transport: TransportConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a TCP connection and log in with plaintext credentials.
    ///
    /// The whole sequence (resolve, connect, login) is bounded by
    /// `transport.connect_timeout`. A `!trap` in reply to `/login` is
    /// reported as [`Error::Authentication`].
    pub async fn connect(
        address: &str,
        port: u16,
        username: &str,
        password: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let peer = format!("{address}:{port}");
        let limit = transport.connect_timeout;
        debug!(%peer, "opening API session");

        let open = async {
            let stream = TcpStream::connect((address, port)).await?;
            stream.set_nodelay(true)?;

            let mut session = Self {
                framed: Framed::new(stream, SentenceCodec::new()),
                peer: peer.clone(),
                transport: *transport,
            };
            session.login(username, password).await?;
            Ok::<_, Error>(session)
        };

        let session = tokio::time::timeout(limit, open)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: limit.as_secs(),
            })??;

        debug!(%peer, "API session established");
        Ok(session)
    }

    /// `host:port` this session is connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), Error> {
        let words = [
            "/login".to_owned(),
            format!("=name={username}"),
            format!("=password={}", password.expose_secret()),
        ];

        match self.exchange(&words).await {
            // Pre-6.43 routers answer with an MD5 challenge instead of
            // logging in; only the plaintext flow is supported.
            Ok((_, done)) if done.contains_key("ret") => Err(Error::Authentication {
                message: "router requested challenge login (RouterOS < 6.43 is not supported)"
                    .into(),
            }),
            Ok(_) => Ok(()),
            Err(Error::Trap { message, .. }) => Err(Error::Authentication { message }),
            Err(e) => Err(e),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Run a command and collect every `!re` record it returns.
    ///
    /// Bounded by `transport.request_timeout`.
    pub async fn call(
        &mut self,
        command: &str,
        attributes: &[(&str, &str)],
    ) -> Result<Vec<Record>, Error> {
        let mut words = Vec::with_capacity(attributes.len() + 1);
        words.push(command.to_owned());
        words.extend(attributes.iter().map(|(k, v)| format!("={k}={v}")));

        let limit = self.transport.request_timeout;
        let (records, _) = tokio::time::timeout(limit, self.exchange(&words))
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: limit.as_secs(),
            })??;
        Ok(records)
    }

    /// Send `count` echo requests to `address` from the router.
    ///
    /// The router streams one record per reply plus running totals
    /// (`sent`, `received`, `packet-loss`, `avg-rtt`, ...).
    pub async fn ping(
        &mut self,
        address: &str,
        count: u32,
        interval: Duration,
    ) -> Result<Vec<Record>, Error> {
        let count = count.to_string();
        let interval = format_interval(interval);
        self.call(
            "/ping",
            &[
                ("address", address),
                ("count", count.as_str()),
                ("interval", interval.as_str()),
            ],
        )
        .await
    }

    /// Ask the router to end the session and shut the socket down.
    pub async fn close(mut self) -> Result<(), Error> {
        debug!(peer = %self.peer, "closing API session");
        self.framed.send(&["/quit"][..]).await?;
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }

    // ── Wire exchange ────────────────────────────────────────────────

    /// Write one sentence and read replies up to `!done`.
    ///
    /// A `!trap` is remembered and returned once the trailing `!done`
    /// arrives, leaving the session in sync for the next command.
    async fn exchange(&mut self, words: &[String]) -> Result<(Vec<Record>, Record), Error> {
        let command = words.first().map_or("", String::as_str).to_owned();
        trace!(peer = %self.peer, %command, "sending sentence");

        self.framed.send(words).await?;

        let mut records = Vec::new();
        let mut trap = None;
        loop {
            let Some(sentence) = self.framed.next().await else {
                return Err(Error::ConnectionClosed);
            };

            match Reply::parse(sentence?)? {
                Reply::Record(record) => records.push(record),
                Reply::Empty => {}
                Reply::Trap { message } => {
                    trap.get_or_insert(message);
                }
                Reply::Fatal { message } => return Err(Error::Fatal { message }),
                Reply::Done(done) => {
                    trace!(peer = %self.peer, %command, records = records.len(), "command done");
                    return match trap {
                        Some(message) => Err(Error::Trap { command, message }),
                        None => Ok((records, done)),
                    };
                }
            }
        }
    }
}

/// Render a ping interval the way RouterOS accepts it: whole seconds as
/// a bare number, anything finer in milliseconds.
fn format_interval(interval: Duration) -> String {
    if interval.subsec_nanos() == 0 {
        interval.as_secs().to_string()
    } else {
        format!("{}ms", interval.as_millis())
    }
}
