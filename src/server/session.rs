//! Per-connection SSH handler.
//!
//! Gates public-key authentication through the [`Authorizer`] and serves the
//! terminal info view once a shell is opened.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use russh_keys::key::PublicKey;
use russh_keys::PublicKeyBase64;
use ssh_key::HashAlg;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::authorization::{Authorizer, Decision};
use crate::view::{SessionView, ENTER_ALT_SCREEN, LEAVE_ALT_SCREEN};

const CTRL_C: u8 = 0x03;

/// How often an open shell is redrawn without any input.
pub const REDRAW_INTERVAL: Duration = Duration::from_secs(10);

pub struct SessionHandler {
    authorizer: Authorizer,
    peer: Option<SocketAddr>,
    user: Option<String>,
    view: Option<SessionView>,
    shell: Option<ChannelId>,
    // Dropping the sender stops the redraw task.
    redraw: Option<watch::Sender<SessionView>>,
    connected_at: Instant,
}

/// Re-encode a transport key as an `ssh_key` key via its wire format.
pub fn candidate_key(public_key: &PublicKey) -> Result<ssh_key::PublicKey, ssh_key::Error> {
    ssh_key::PublicKey::from_bytes(&public_key.public_key_bytes())
}

impl SessionHandler {
    pub fn new(authorizer: Authorizer, peer: Option<SocketAddr>) -> Self {
        debug!(peer = ?peer, "connection opened");
        Self {
            authorizer,
            peer,
            user: None,
            view: None,
            shell: None,
            redraw: None,
            connected_at: Instant::now(),
        }
    }

    /// Must run on a multi-threaded runtime.
    pub(crate) fn check_key(&self, user: &str, public_key: &PublicKey) -> bool {
        let candidate = match candidate_key(public_key) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(peer = ?self.peer, user, "unsupported public key: {}", e);
                return false;
            }
        };
        let fingerprint = candidate.fingerprint(HashAlg::Sha256);

        // Key files are read on this connection's task; let the runtime move
        // other work off the worker while it blocks.
        let decision = tokio::task::block_in_place(|| self.authorizer.evaluate(&candidate));

        match decision {
            Decision::Allow { source, .. } => {
                info!(peer = ?self.peer, user, %fingerprint, %source, "public key accepted");
                true
            }
            Decision::Deny => {
                warn!(peer = ?self.peer, user, %fingerprint, "public key rejected");
                false
            }
        }
    }

    fn close(&mut self, channel: ChannelId, status: u32, session: &mut Session) {
        session.exit_status_request(channel, status);
        session.eof(channel);
        session.close(channel);
        self.shell = None;
        self.redraw = None;
        info!(
            peer = ?self.peer,
            user = self.user.as_deref().unwrap_or("-"),
            status,
            elapsed = ?self.connected_at.elapsed(),
            "session closed"
        );
    }
}

/// Redraw the view every `period` and whenever it changes, until the sender
/// is dropped or `write` reports the channel is gone.
pub(crate) async fn redraw_loop<F, Fut>(
    mut view: watch::Receiver<SessionView>,
    period: Duration,
    mut write: F,
) where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut ticker = tokio::time::interval(period);
    // The first tick is immediate; the shell request already drew a frame.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {}
        }

        let frame = view.borrow_and_update().frame();
        if !write(frame).await {
            break;
        }
    }
}

#[async_trait]
impl Handler for SessionHandler {
    type Error = russh::Error;

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        if self.check_key(user, public_key) {
            self.user = Some(user.to_string());
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        debug!(peer = ?self.peer, channel = ?channel.id(), "session channel opened");
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        info!(
            peer = ?self.peer,
            term,
            width = col_width,
            height = row_height,
            "pty requested"
        );
        self.view = Some(SessionView::new(term, col_width, row_height));
        session.channel_success(channel);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel);

        let Some(view) = &self.view else {
            session.data(
                channel,
                CryptoVec::from_slice(b"no active terminal, skipping\r\n"),
            );
            self.close(channel, 1, session);
            return Ok(());
        };

        let screen = format!("{}{}", ENTER_ALT_SCREEN, view.frame());
        session.data(channel, CryptoVec::from(screen));

        let (sender, receiver) = watch::channel(view.clone());
        let handle = session.handle();
        tokio::spawn(redraw_loop(receiver, REDRAW_INTERVAL, move |frame| {
            let handle = handle.clone();
            async move { handle.data(channel, CryptoVec::from(frame)).await.is_ok() }
        }));

        self.redraw = Some(sender);
        self.shell = Some(channel);
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        _channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!(peer = ?self.peer, width = col_width, height = row_height, "window resized");

        if let Some(view) = self.view.as_mut() {
            view.resize(col_width, row_height);
            if let Some(redraw) = &self.redraw {
                redraw.send_replace(view.clone());
            }
        }
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.shell != Some(channel) {
            return Ok(());
        }

        if data.iter().any(|b| *b == b'q' || *b == CTRL_C) {
            session.data(channel, CryptoVec::from_slice(LEAVE_ALT_SCREEN.as_bytes()));
            self.close(channel, 0, session);
        }
        Ok(())
    }
}

impl Drop for SessionHandler {
    fn drop(&mut self) {
        debug!(
            peer = ?self.peer,
            elapsed = ?self.connected_at.elapsed(),
            "connection closed"
        );
    }
}
