//! Protocol constants

pub const PROTOCOL_VERSION: u8 = 10;
pub const SERVER_VERSION: &str = "5.6.20-coshard";

/// Largest payload a single packet frame can carry
pub const MAX_PAYLOAD_LEN: usize = 0x00ff_ffff;

pub const SALT_LEN: usize = 20;
pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";

// Capability flags
pub const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;
pub const CLIENT_LONG_FLAG: u32 = 0x0000_0004;
pub const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;
pub const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
pub const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;
pub const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
pub const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;
pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;

pub const DEFAULT_CAPABILITY: u32 = CLIENT_LONG_PASSWORD
    | CLIENT_LONG_FLAG
    | CLIENT_CONNECT_WITH_DB
    | CLIENT_PROTOCOL_41
    | CLIENT_TRANSACTIONS
    | CLIENT_SECURE_CONNECTION
    | CLIENT_PLUGIN_AUTH;

// Status flags
pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;

/// utf8_general_ci
pub const DEFAULT_COLLATION_ID: u8 = 33;

// Packet headers
pub const OK_HEADER: u8 = 0x00;
pub const EOF_HEADER: u8 = 0xfe;
pub const AUTH_SWITCH_HEADER: u8 = 0xfe;
pub const ERR_HEADER: u8 = 0xff;

// Commands
pub const COM_QUIT: u8 = 0x01;
pub const COM_PING: u8 = 0x0e;

// Error codes
pub const ER_HANDSHAKE_ERROR: u16 = 1043;
pub const ER_ACCESS_DENIED_ERROR: u16 = 1045;
pub const ER_BAD_DB_ERROR: u16 = 1049;
pub const ER_UNKNOWN_ERROR: u16 = 1105;

/// SQLSTATE reported for codes without a specific one
pub const DEFAULT_SQL_STATE: &str = "HY000";

/// SQLSTATE for a known error code
pub fn sql_state(code: u16) -> &'static str {
    match code {
        ER_HANDSHAKE_ERROR => "08S01",
        ER_ACCESS_DENIED_ERROR => "28000",
        ER_BAD_DB_ERROR => "42000",
        _ => DEFAULT_SQL_STATE,
    }
}
