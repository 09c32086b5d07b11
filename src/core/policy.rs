//! Access control rules.
//!
//! Every handler funnels its permission check through [`authorize`] so the
//! ownership and visibility rules live in one place instead of being
//! restated inline per route.

use crate::errors::ApiError;
use crate::models::{Music, Playlist, User};

/// What the actor wants to do with the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Modify,
}

/// The thing being accessed
#[derive(Debug)]
pub enum Resource<'a> {
    /// Another user's account
    User(&'a User),
    /// A task or task list, identified by its owner
    TaskOwned(i64),
    Music(&'a Music),
    Playlist(&'a Playlist),
    /// The track listing of a playlist. Modifying it is more permissive
    /// than modifying the playlist itself when the playlist is collaborative.
    PlaylistTracks(&'a Playlist),
}

/// Check whether `actor` may perform `access` on `resource`.
///
/// Admins pass every check. Returns `Forbidden` otherwise, or `NotFound`
/// where revealing the resource's existence would already leak information.
pub fn authorize(actor: &User, resource: &Resource<'_>, access: Access) -> Result<(), ApiError> {
    if actor.is_admin {
        return Ok(());
    }

    let allowed = match resource {
        Resource::User(target) => target.id == actor.id,
        Resource::TaskOwned(owner_id) => *owner_id == actor.id,
        Resource::Music(music) => match access {
            Access::Read => music.is_public || music.uploaded_by_id == Some(actor.id),
            Access::Modify => music.uploaded_by_id == Some(actor.id),
        },
        Resource::Playlist(playlist) => match access {
            Access::Read => playlist.is_public || playlist.owner_id == actor.id,
            Access::Modify => playlist.owner_id == actor.id,
        },
        Resource::PlaylistTracks(playlist) => match access {
            Access::Read => playlist.is_public || playlist.owner_id == actor.id,
            Access::Modify => playlist.owner_id == actor.id || playlist.is_collaborative,
        },
    };

    if allowed {
        Ok(())
    } else {
        // Private resources the actor cannot even see read as missing
        let hidden = matches!(
            (resource, access),
            (Resource::TaskOwned(_), _)
                | (Resource::Music(_), Access::Read)
                | (Resource::Playlist(_), Access::Read)
        );
        if hidden {
            Err(ApiError::not_found("Resource not found"))
        } else {
            Err(ApiError::forbidden("Permission denied"))
        }
    }
}

/// Only admins may change the admin and active flags of an account
pub fn check_privileged_fields(
    actor: &User,
    wants_admin: Option<bool>,
    wants_active: Option<bool>,
) -> Result<(), ApiError> {
    if (wants_admin.is_some() || wants_active.is_some()) && !actor.is_admin {
        return Err(ApiError::forbidden(
            "Only administrators can change account flags",
        ));
    }
    Ok(())
}

/// Refuse to deactivate the last remaining active admin
pub fn check_sole_admin(target: &User, active_admins: i64) -> Result<(), ApiError> {
    if target.is_admin && target.is_active && active_admins <= 1 {
        return Err(ApiError::conflict(
            "Cannot deactivate the only administrator",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, is_admin: bool) -> User {
        let mut user = User::new(
            format!("user{id}"),
            format!("user{id}@example.com"),
            "hash".to_string(),
        );
        user.id = id;
        user.is_admin = is_admin;
        user
    }

    #[test]
    fn test_admin_passes_everything() {
        let admin = user(1, true);
        let other = user(2, false);
        let mut playlist = crate::models::Playlist::new("Mix".to_string(), other.id);
        playlist.is_public = false;

        assert!(authorize(&admin, &Resource::User(&other), Access::Modify).is_ok());
        assert!(authorize(&admin, &Resource::Playlist(&playlist), Access::Modify).is_ok());
        assert!(authorize(&admin, &Resource::TaskOwned(other.id), Access::Read).is_ok());
    }

    #[test]
    fn test_private_playlist_reads_as_missing() {
        let owner = user(1, false);
        let stranger = user(2, false);
        let mut playlist = crate::models::Playlist::new("Mix".to_string(), owner.id);
        playlist.is_public = false;

        assert!(authorize(&owner, &Resource::Playlist(&playlist), Access::Read).is_ok());
        let err = authorize(&stranger, &Resource::Playlist(&playlist), Access::Read).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_public_playlist_modify_is_forbidden_not_missing() {
        let owner = user(1, false);
        let stranger = user(2, false);
        let playlist = crate::models::Playlist::new("Mix".to_string(), owner.id);

        let err = authorize(&stranger, &Resource::Playlist(&playlist), Access::Modify).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_collaborative_tracks_rule() {
        let owner = user(1, false);
        let stranger = user(2, false);
        let mut playlist = crate::models::Playlist::new("Mix".to_string(), owner.id);

        // not collaborative: only the owner edits tracks
        assert!(
            authorize(&stranger, &Resource::PlaylistTracks(&playlist), Access::Modify).is_err()
        );

        playlist.is_collaborative = true;
        assert!(
            authorize(&stranger, &Resource::PlaylistTracks(&playlist), Access::Modify).is_ok()
        );

        // the collaborative flag opens track edits even on private playlists
        playlist.is_public = false;
        assert!(
            authorize(&stranger, &Resource::PlaylistTracks(&playlist), Access::Modify).is_ok()
        );
    }

    #[test]
    fn test_music_visibility() {
        let uploader = user(1, false);
        let stranger = user(2, false);
        let mut music = crate::models::Music::new("Song".to_string(), "Artist".to_string());
        music.uploaded_by_id = Some(uploader.id);
        music.is_public = false;

        assert!(authorize(&uploader, &Resource::Music(&music), Access::Read).is_ok());
        assert!(authorize(&stranger, &Resource::Music(&music), Access::Read).is_err());

        music.is_public = true;
        assert!(authorize(&stranger, &Resource::Music(&music), Access::Read).is_ok());
        assert!(authorize(&stranger, &Resource::Music(&music), Access::Modify).is_err());
    }

    #[test]
    fn test_privileged_fields_and_sole_admin() {
        let admin = user(1, true);
        let plain = user(2, false);

        assert!(check_privileged_fields(&plain, Some(true), None).is_err());
        assert!(check_privileged_fields(&plain, None, None).is_ok());
        assert!(check_privileged_fields(&admin, Some(true), Some(false)).is_ok());

        assert!(check_sole_admin(&admin, 1).is_err());
        assert!(check_sole_admin(&admin, 2).is_ok());
        assert!(check_sole_admin(&plain, 1).is_ok());
    }
}
