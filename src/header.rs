//! # Chunk Headers
//!
//! Every entry written by a run shares one header template. The template is
//! synthesized once, before the first chunk is read, and carries the invoking
//! user's identity and a single timestamp. Only the entry name and size are
//! rewritten for each chunk.

use chrono::{DateTime, Utc};
use tracing::warn;

/// Permission bits of every chunk entry.
pub const CHUNK_MODE: u32 = 0o444;

/// Numeric id used when the host cannot tell us who we are.
pub const FALLBACK_ID: u64 = 999;

/// User and group name used when the host cannot tell us who we are.
pub const FALLBACK_NAME: &str = "unknown";

/// The owner recorded in every chunk entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u64,
    pub gid: u64,
    pub user_name: String,
    pub group_name: String,
}

impl Identity {
    /// The sentinel identity used when lookups fail.
    pub fn unknown() -> Self {
        Identity {
            uid: FALLBACK_ID,
            gid: FALLBACK_ID,
            user_name: FALLBACK_NAME.to_string(),
            group_name: FALLBACK_NAME.to_string(),
        }
    }

    /// Resolves the invoking user and their primary group.
    ///
    /// Lookup failures are never fatal: they are logged and the missing
    /// parts are replaced by the sentinel identity.
    pub fn current() -> Self {
        lookup_current()
    }
}

#[cfg(unix)]
fn lookup_current() -> Identity {
    use nix::unistd::{getuid, Group, User};

    let uid = getuid();
    let user = match User::from_uid(uid) {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(uid = uid.as_raw(), "no user entry for current uid, using fallback identity");
            return Identity::unknown();
        }
        Err(err) => {
            warn!(uid = uid.as_raw(), error = %err, "failed to get current user, using fallback identity");
            return Identity::unknown();
        }
    };

    let group_name = match Group::from_gid(user.gid) {
        Ok(Some(group)) => group.name,
        Ok(None) => {
            warn!(gid = user.gid.as_raw(), "no group entry for primary gid");
            FALLBACK_NAME.to_string()
        }
        Err(err) => {
            warn!(gid = user.gid.as_raw(), error = %err, "failed to look up gid");
            FALLBACK_NAME.to_string()
        }
    };

    Identity {
        uid: u64::from(uid.as_raw()),
        gid: u64::from(user.gid.as_raw()),
        user_name: user.name,
        group_name,
    }
}

#[cfg(not(unix))]
fn lookup_current() -> Identity {
    warn!("user lookup is not supported on this platform, using fallback identity");
    Identity::unknown()
}

/// Metadata for one output entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Always [`tar::EntryType::Regular`] for chunk entries.
    pub kind: tar::EntryType,
    pub name: String,
    /// Byte count of the chunk body. Must match what is written after the header.
    pub size: u64,
    pub mode: u32,
    pub owner: Identity,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    pub device_major: u32,
    pub device_minor: u32,
    /// Extended attributes as `(name, value)` pairs, e.g. `("user.origin", b"...")`.
    pub xattrs: Vec<(String, Vec<u8>)>,
}

impl ChunkHeader {
    /// Builds the run template for the current user at the current instant.
    pub fn synthesize() -> Self {
        Self::template(Identity::current(), Utc::now())
    }

    /// Builds a run template for an explicit owner and timestamp.
    pub fn template(owner: Identity, at: DateTime<Utc>) -> Self {
        ChunkHeader {
            kind: tar::EntryType::Regular,
            name: String::new(),
            size: 0,
            mode: CHUNK_MODE,
            owner,
            created: at,
            modified: at,
            accessed: at,
            device_major: 0,
            device_minor: 0,
            xattrs: Vec::new(),
        }
    }

    /// Points the template at the next chunk.
    pub fn prepare(&mut self, name: String, size: u64) {
        self.name = name;
        self.size = size;
    }
}
