//! Server capabilities and completion status.

/// Status of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`
    Ok,
    /// `NO`: operational failure.
    No,
    /// `BAD`: protocol or syntax error.
    Bad,
    /// `PREAUTH` greeting.
    PreAuth,
    /// `BYE`: the server is closing the connection.
    Bye,
}

impl Status {
    /// Returns true for `OK` and `PREAUTH`.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// A capability advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1`
    Imap4Rev1,
    /// `IMAP4rev2`
    Imap4Rev2,
    /// `STARTTLS`
    StartTls,
    /// `LOGINDISABLED`
    LoginDisabled,
    /// `AUTH=<mechanism>`
    Auth(String),
    /// `UIDPLUS` (RFC 4315), enables `UID EXPUNGE`.
    UidPlus,
    /// `MOVE` (RFC 6851)
    Move,
    /// `SPECIAL-USE` (RFC 6154)
    SpecialUse,
    /// `IDLE`
    Idle,
    /// Anything else.
    Unknown(String),
}

impl Capability {
    /// Parses a capability atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        if let Some(mechanism) = upper.strip_prefix("AUTH=") {
            return Self::Auth(mechanism.to_string());
        }
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "SPECIAL-USE" => Self::SpecialUse,
            "IDLE" => Self::Idle,
            _ => Self::Unknown(s.to_string()),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Imap4Rev1 => "IMAP4rev1",
            Self::Imap4Rev2 => "IMAP4rev2",
            Self::StartTls => "STARTTLS",
            Self::LoginDisabled => "LOGINDISABLED",
            Self::Auth(mechanism) => return write!(f, "AUTH={mechanism}"),
            Self::UidPlus => "UIDPLUS",
            Self::Move => "MOVE",
            Self::SpecialUse => "SPECIAL-USE",
            Self::Idle => "IDLE",
            Self::Unknown(s) => s,
        };
        f.write_str(text)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn parse_known() {
        assert_eq!(Capability::parse("uidplus"), Capability::UidPlus);
        assert_eq!(Capability::parse("MOVE"), Capability::Move);
        assert_eq!(Capability::parse("IMAP4rev1"), Capability::Imap4Rev1);
    }

    #[test]
    fn parse_auth_mechanism() {
        assert_eq!(
            Capability::parse("AUTH=PLAIN"),
            Capability::Auth("PLAIN".to_string())
        );
    }

    #[test]
    fn unknown_round_trips_display() {
        let cap = Capability::parse("X-YANDEX");
        assert_eq!(cap, Capability::Unknown("X-YANDEX".to_string()));
        assert_eq!(cap.to_string(), "X-YANDEX");
    }

    #[test]
    fn status_ok() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
    }
}
