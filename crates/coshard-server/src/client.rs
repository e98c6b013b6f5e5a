//! Client connection: handshake, authentication and the command loop

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use coshard_core::{CoshardError, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::mysql::auth::{check_password, random_salt};
use crate::mysql::consts::*;
use crate::mysql::{PacketIo, SqlError, put_lenenc_int, read_lenenc_int};
use crate::server::ServerState;


/// One client session on the proxy
pub struct ClientConn<S> {
    io: PacketIo<S>,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
    connection_id: u32,
    /// Peer host, reported in access-denied errors
    host: String,
    /// Capabilities the client announced
    capability: u32,
    status: u16,
    salt: [u8; SALT_LEN],
    user: String,
    db: Option<String>,
    closed: bool,
}

impl<S> ClientConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        stream: S,
        host: impl Into<String>,
        connection_id: u32,
        state: Arc<ServerState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            io: PacketIo::new(stream),
            state,
            shutdown,
            connection_id,
            host: host.into(),
            capability: 0,
            status: SERVER_STATUS_AUTOCOMMIT,
            salt: random_salt(),
            user: String::new(),
            db: None,
            closed: false,
        }
    }

    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Schema selected during the handshake
    pub fn db(&self) -> Option<&str> {
        self.db.as_deref()
    }

    /// Authenticate the client, then serve commands until it leaves
    #[tracing::instrument(skip_all, fields(connection_id = self.connection_id, host = %self.host))]
    pub async fn serve(mut self) {
        if let Err(e) = self.handshake().await {
            if let CoshardError::Protocol(_) = e {
                let err = SqlError::from(&e);
                if let Err(write_err) = self.write_error(&err).await {
                    tracing::debug!(error = %write_err, "failed to report handshake error");
                }
            }
            tracing::warn!(error = %e, user = %self.user, "client handshake failed");
            self.close().await;
            return;
        }

        if let Err(e) = self.run().await {
            tracing::debug!(error = %e, "client connection ended with error");
        }
        self.close().await;
        tracing::debug!(user = %self.user, "client disconnected");
    }

    /// Initial handshake, optional auth switch, password check and OK
    pub async fn handshake(&mut self) -> Result<()> {
        self.write_initial_handshake().await?;

        let packet = self.io.read_packet().await?;
        let response = HandshakeResponse::parse(&packet)?;
        self.capability = response.capability;
        self.user = response.user;

        let Some(password) = self.state.password(&self.user).map(str::to_owned) else {
            return self.deny(!response.auth.is_empty()).await;
        };

        let auth = match response.plugin.as_deref() {
            Some(plugin) if plugin != MYSQL_NATIVE_PASSWORD => {
                tracing::debug!(plugin = %plugin, "switching client to {}", MYSQL_NATIVE_PASSWORD);
                self.switch_auth().await?
            }
            _ => response.auth,
        };

        if !check_password(&self.salt, &password, &auth) {
            return self.deny(!auth.is_empty()).await;
        }

        if let Some(db) = response.db.filter(|db| !db.is_empty()) {
            if self.state.schema(&db).is_none() {
                let err = SqlError::bad_db(&db);
                self.write_error(&err).await?;
                return Err(CoshardError::NotFound(err.message));
            }
            self.db = Some(db);
        }

        self.write_ok().await?;
        self.io.reset_sequence();
        tracing::info!(user = %self.user, db = ?self.db, "client authenticated");
        Ok(())
    }

    /// Command loop; returns when the client quits or the server shuts down
    pub async fn run(&mut self) -> Result<()> {
        while !self.closed {
            let packet = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("server shutting down, dropping client");
                    break;
                }
                packet = self.io.read_packet() => packet?,
            };

            self.dispatch(&packet).await?;
            self.io.reset_sequence();
        }
        Ok(())
    }

    async fn dispatch(&mut self, packet: &[u8]) -> Result<()> {
        let Some((&command, _body)) = packet.split_first() else {
            self.closed = true;
            return Ok(());
        };

        match command {
            COM_QUIT => {
                self.closed = true;
                Ok(())
            }
            COM_PING => self.write_ok().await,
            _ => {
                tracing::debug!(command, "unsupported command");
                self.write_error(&SqlError::unsupported_command(command)).await
            }
        }
    }

    async fn deny(&mut self, using_password: bool) -> Result<()> {
        let err = SqlError::access_denied(&self.user, &self.host, using_password);
        self.write_error(&err).await?;
        Err(CoshardError::AccessDenied(err.message))
    }

    async fn write_initial_handshake(&mut self) -> Result<()> {
        let mut data = BytesMut::with_capacity(128);

        data.put_u8(PROTOCOL_VERSION);
        data.put_slice(SERVER_VERSION.as_bytes());
        data.put_u8(0);
        data.put_u32_le(self.connection_id);

        // auth-plugin-data-part-1
        data.put_slice(&self.salt[..8]);
        data.put_u8(0);

        data.put_u16_le(DEFAULT_CAPABILITY as u16);
        data.put_u8(DEFAULT_COLLATION_ID);
        data.put_u16_le(self.status);
        data.put_u16_le((DEFAULT_CAPABILITY >> 16) as u16);

        // length of auth-plugin-data, salt plus terminator
        data.put_u8(SALT_LEN as u8 + 1);
        data.put_slice(&[0; 10]);

        // auth-plugin-data-part-2
        data.put_slice(&self.salt[8..]);
        data.put_u8(0);

        data.put_slice(MYSQL_NATIVE_PASSWORD.as_bytes());
        data.put_u8(0);

        self.io.write_packet(&data).await
    }

    /// Ask the client to re-authenticate with `mysql_native_password` and
    /// return its new auth response
    async fn switch_auth(&mut self) -> Result<Vec<u8>> {
        let mut data = BytesMut::with_capacity(MYSQL_NATIVE_PASSWORD.len() + SALT_LEN + 3);
        data.put_u8(AUTH_SWITCH_HEADER);
        data.put_slice(MYSQL_NATIVE_PASSWORD.as_bytes());
        data.put_u8(0);
        data.put_slice(&self.salt);
        data.put_u8(0);
        self.io.write_packet(&data).await?;

        self.io.read_packet().await
    }

    async fn write_ok(&mut self) -> Result<()> {
        let mut data = BytesMut::with_capacity(11);
        data.put_u8(OK_HEADER);
        put_lenenc_int(&mut data, 0); // affected rows
        put_lenenc_int(&mut data, 0); // last insert id
        if self.capability & CLIENT_PROTOCOL_41 != 0 {
            data.put_u16_le(self.status);
            data.put_u16_le(0);
        }
        self.io.write_packet(&data).await
    }

    async fn write_error(&mut self, err: &SqlError) -> Result<()> {
        let mut data = BytesMut::with_capacity(9 + err.message.len());
        data.put_u8(ERR_HEADER);
        data.put_u16_le(err.code);
        if self.capability & CLIENT_PROTOCOL_41 != 0 {
            data.put_u8(b'#');
            data.put_slice(err.state.as_bytes());
        }
        data.put_slice(err.message.as_bytes());
        self.io.write_packet(&data).await
    }

    async fn close(&mut self) {
        self.closed = true;
        if let Err(e) = self.io.shutdown().await {
            tracing::trace!(error = %e, "client socket already closed");
        }
    }
}

/// Fields of a HandshakeResponse41 packet
#[derive(Debug, Clone, PartialEq, Eq)]
struct HandshakeResponse {
    capability: u32,
    user: String,
    auth: Vec<u8>,
    db: Option<String>,
    plugin: Option<String>,
}

impl HandshakeResponse {
    /// capability(4) + max packet size(4) + charset(1) + reserved(23)
    const FIXED_LEN: usize = 32;

    fn parse(data: &[u8]) -> Result<Self> {
        let malformed = || CoshardError::Protocol("malformed handshake response".into());
        if data.len() < Self::FIXED_LEN {
            return Err(malformed());
        }

        let capability = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let mut pos = Self::FIXED_LEN;

        let user = read_cstr(data, &mut pos).ok_or_else(malformed)?;
        let user = String::from_utf8_lossy(user).into_owned();

        let auth = if capability & CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
            let (len, width) = read_lenenc_int(data.get(pos..).ok_or_else(malformed)?).ok_or_else(malformed)?;
            pos += width;
            take(data, &mut pos, len as usize).ok_or_else(malformed)?
        } else if capability & CLIENT_SECURE_CONNECTION != 0 {
            let len = *data.get(pos).ok_or_else(malformed)? as usize;
            pos += 1;
            take(data, &mut pos, len).ok_or_else(malformed)?
        } else {
            read_cstr(data, &mut pos).ok_or_else(malformed)?
        };

        let mut optional_cstr = |flag: u32| {
            (capability & flag != 0 && pos < data.len())
                .then(|| read_cstr(data, &mut pos))
                .flatten()
                .map(|s| String::from_utf8_lossy(s).into_owned())
        };
        let db = optional_cstr(CLIENT_CONNECT_WITH_DB);
        let plugin = optional_cstr(CLIENT_PLUGIN_AUTH);

        Ok(Self {
            capability,
            user,
            auth: auth.to_vec(),
            db,
            plugin,
        })
    }
}

/// NUL-terminated string at `pos`; a missing terminator ends at the packet end
fn read_cstr<'a>(data: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let rest = data.get(*pos..)?;
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    *pos += (end + 1).min(rest.len());
    Some(&rest[..end])
}

fn take<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Option<&'a [u8]> {
    let bytes = data.get(*pos..pos.checked_add(len)?)?;
    *pos += len;
    Some(bytes)
}
