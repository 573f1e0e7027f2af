//! Deleting one message by UID.

use mailbridge_imap::{
    Client, Error as ImapError, Flag, SearchKey, Selected, StoreAction, Uid, UidSet,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::DeleteStrategy;
use crate::error::{BridgeError, Result};
use crate::session::MailSession;

/// What happened to the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Flagged `\Deleted` and expunged.
    Expunged,
    /// Moved to the named folder.
    Moved(String),
}

/// Deletes `uid` from `folder` in a session of its own.
///
/// The folder is selected read-write and the UID is checked first; a
/// message that is already gone yields [`BridgeError::StaleReference`]
/// with `reference` as the user saw it. Once `\Deleted` has been stored,
/// the expunge is always attempted.
///
/// # Errors
///
/// [`BridgeError::Connection`] if the connection breaks while looking up
/// the trash folder, [`BridgeError::Folder`] if the folder cannot be opened
/// read-write, [`BridgeError::StaleReference`] if the message no longer exists, and
/// [`BridgeError::Delete`] for a failed store, move or expunge.
pub async fn delete_by_uid<S>(
    session: &mut MailSession<S>,
    folder: &str,
    uid: Uid,
    strategy: &DeleteStrategy,
    reference: &str,
) -> Result<DeleteOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let trash = resolve_trash(session, strategy, folder).await?;

    let info = session.select_folder(folder, false).await?;
    if info.read_only {
        return Err(session.fail(BridgeError::Folder {
            folder: folder.to_string(),
            message: "opened read-only".to_string(),
        }));
    }

    let failed = |message: String| BridgeError::Delete { uid, message };
    let Some(client) = session.selected_mut() else {
        return Err(failed("no folder selected".to_string()));
    };
    let target = UidSet::single(uid);

    let present = client
        .uid_search(&[SearchKey::Uid(target.clone())])
        .await
        .map_err(|e| failed(e.to_string()));
    match present {
        Ok(found) if found.contains(&uid) => {}
        Ok(_) => {
            debug!(%uid, "message already gone");
            return Err(BridgeError::StaleReference {
                reference: reference.to_string(),
            });
        }
        Err(e) => return Err(session.fail(e)),
    }

    let outcome = match trash {
        Some(trash) => move_to(client, &target, &trash).await.map(|()| DeleteOutcome::Moved(trash)),
        None => flag_and_expunge(client, &target).await.map(|()| DeleteOutcome::Expunged),
    };
    match outcome {
        Ok(outcome) => {
            info!(%uid, folder, ?outcome, "message deleted");
            Ok(outcome)
        }
        Err(e) => Err(session.fail(failed(e.to_string()))),
    }
}

/// Moves with `UID MOVE`, or emulates it with copy, flag and expunge.
async fn move_to<S>(
    client: &mut Client<S, Selected>,
    target: &UidSet,
    trash: &str,
) -> mailbridge_imap::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if client.supports_move() {
        debug!(%target, trash, "UID MOVE");
        return client.uid_move(target, trash).await;
    }
    debug!(%target, trash, "UID COPY, then expunge");
    client.uid_copy(target, trash).await?;
    flag_and_expunge(client, target).await
}

/// Stores `\Deleted`, then expunges: `UID EXPUNGE` with UIDPLUS, plain
/// `EXPUNGE` otherwise.
async fn flag_and_expunge<S>(
    client: &mut Client<S, Selected>,
    target: &UidSet,
) -> mailbridge_imap::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client
        .uid_store(target, StoreAction::Add(vec![Flag::Deleted]))
        .await?;
    let expunged = if client.supports_uidplus() {
        client.uid_expunge(target).await?
    } else {
        client.expunge().await?
    };
    debug!(%target, expunged = expunged.len(), "expunge complete");
    Ok(())
}

/// Picks the folder to move into, or `None` to delete in place.
///
/// A configured name must show up in LIST; otherwise the `\Trash`
/// special-use folder is used. A folder that is missing, or a LIST the
/// server refuses, falls back to expunging. Transport failures end the
/// request.
async fn resolve_trash<S>(
    session: &mut MailSession<S>,
    strategy: &DeleteStrategy,
    folder: &str,
) -> Result<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let DeleteStrategy::MoveToTrash { folder: configured } = strategy else {
        return Ok(None);
    };

    let folders = match session.list_folders().await {
        Ok(folders) => folders,
        Err(e @ (ImapError::No(_) | ImapError::Bad(_))) => {
            warn!(error = %e, "LIST refused, deleting in place");
            return Ok(None);
        }
        Err(e) => return Err(session.fail(BridgeError::Connection(e.to_string()))),
    };

    let found = folders
        .into_iter()
        .filter(|entry| entry.is_selectable())
        .find(|entry| match configured {
            Some(name) => entry.mailbox.as_str() == name,
            None => entry.is_trash(),
        })
        .map(|entry| entry.mailbox.as_str().to_string());

    match (&found, configured) {
        (None, Some(name)) => warn!(trash = %name, "trash folder does not exist, deleting in place"),
        (None, None) => warn!("no \\Trash folder advertised, deleting in place"),
        _ => {}
    }
    Ok(found.filter(|name| !name.eq_ignore_ascii_case(folder)))
}
