//! Bracketed response codes (`[READ-ONLY]`, `[UIDVALIDITY n]`, ...).

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Response code carried by a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `ALERT`: text must be shown to the user.
    Alert,
    /// `AUTHENTICATIONFAILED`
    AuthenticationFailed,
    /// `CAPABILITY` list inside a greeting or LOGIN completion.
    Capability(Vec<Capability>),
    /// `NONEXISTENT`: the named mailbox does not exist.
    NonExistent,
    /// `PERMANENTFLAGS`
    PermanentFlags(Vec<Flag>),
    /// `READ-ONLY`
    ReadOnly,
    /// `READ-WRITE`
    ReadWrite,
    /// `TRYCREATE`
    TryCreate,
    /// `UIDNEXT`
    UidNext(Uid),
    /// `UIDVALIDITY`
    UidValidity(UidValidity),
    /// `UNSEEN`
    Unseen(SeqNum),
    /// Any other code, with its raw argument text if present.
    Other(String, Option<String>),
}
