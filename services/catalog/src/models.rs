//! Catalog aggregates and their search filters

use chrono::{DateTime, SubsecRound, Utc};
use common::Notification;

pub mod cast_member;
pub mod category;
pub mod genre;
pub mod video;

pub use cast_member::{
    CastMember, CastMemberCreateCommand, CastMemberFilter, CastMemberId, CastMemberType,
};
pub use category::{Category, CategoryCreateCommand, CategoryFilter, CategoryId};
pub use genre::{Genre, GenreCreateCommand, GenreFilter, GenreId};
pub use video::{
    AudioVideoField, AudioVideoMedia, AudioVideoMediaStatus, ImageField, ImageMedia, Rating, Video,
    VideoCreateCommand, VideoEvent, VideoFilter, VideoId,
};

/// Longest accepted name or title
pub const MAX_NAME_LENGTH: usize = 255;

/// Creation timestamp, truncated to the microsecond precision PostgreSQL keeps
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn check_max_length(
    notification: &mut Notification,
    field: &str,
    value: &str,
    max: usize,
) {
    if value.chars().count() > max {
        notification.add_error(
            field,
            format!("{field} must be shorter than or equal to {max} characters"),
        );
    }
}
