//! User Records

use jiff::Timestamp;

use crate::uuids::TypedUuid;

/// User UUID
pub type UserUuid = TypedUuid<UserRecord>;

/// User Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub uuid: UserUuid,
    pub email: String,
    pub name: String,
    pub created_at: Timestamp,
}

/// New User Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub uuid: UserUuid,
    pub email: String,
    pub name: String,
}

/// A freshly created user and the only copy of their raw token.
#[derive(Debug, Clone)]
pub struct IssuedUser {
    pub user: UserRecord,
    pub token: String,
}
