//! Video aggregate
//!
//! A video references categories, genres and cast members through relation
//! sets and owns up to five media slots. Image slots hold a finished file;
//! audio/video slots (`trailer`, `video`) go through an encoding pipeline and
//! carry a processing status. The video counts as published only once both
//! audio/video slots have completed.
//!
//! Media slots change only through the `replace_*` methods and the
//! processing transitions, never through the generic repository `update`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::repository::contains_ignore_case;
use common::search::{filter_ids, filter_object, filter_text};
use common::{
    Entity, EntityValidationError, Notification, RelationSet, SearchFilter, Searchable, SortValue,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cast_member::CastMemberId;
use super::category::CategoryId;
use super::genre::GenreId;
use super::{MAX_NAME_LENGTH, check_max_length, now};

common::entity_id!(
    /// Identity of a video
    VideoId
);

/// Advisory age rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "L")]
    RL,
    #[serde(rename = "10")]
    R10,
    #[serde(rename = "12")]
    R12,
    #[serde(rename = "14")]
    R14,
    #[serde(rename = "16")]
    R16,
    #[serde(rename = "18")]
    R18,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::RL => "L",
            Rating::R10 => "10",
            Rating::R12 => "12",
            Rating::R14 => "14",
            Rating::R16 => "16",
            Rating::R18 => "18",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L" => Ok(Rating::RL),
            "10" => Ok(Rating::R10),
            "12" => Ok(Rating::R12),
            "14" => Ok(Rating::R14),
            "16" => Ok(Rating::R16),
            "18" => Ok(Rating::R18),
            other => Err(format!("Invalid rating: {other}")),
        }
    }
}

/// A finished image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMedia {
    pub name: String,
    pub location: String,
}

impl ImageMedia {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageField {
    Banner,
    Thumbnail,
    ThumbnailHalf,
}

impl ImageField {
    pub const ALL: [ImageField; 3] = [
        ImageField::Banner,
        ImageField::Thumbnail,
        ImageField::ThumbnailHalf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageField::Banner => "banner",
            ImageField::Thumbnail => "thumbnail",
            ImageField::ThumbnailHalf => "thumbnail_half",
        }
    }
}

impl FromStr for ImageField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("Invalid image field: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioVideoMediaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AudioVideoMediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioVideoMediaStatus::Pending => "pending",
            AudioVideoMediaStatus::Processing => "processing",
            AudioVideoMediaStatus::Completed => "completed",
            AudioVideoMediaStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AudioVideoMediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioVideoMediaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AudioVideoMediaStatus::Pending),
            "processing" => Ok(AudioVideoMediaStatus::Processing),
            "completed" => Ok(AudioVideoMediaStatus::Completed),
            "failed" => Ok(AudioVideoMediaStatus::Failed),
            other => Err(format!("Invalid media status: {other}")),
        }
    }
}

/// An uploaded audio/video file and its encoding state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioVideoMedia {
    pub name: String,
    pub raw_location: String,
    pub encoded_location: Option<String>,
    pub status: AudioVideoMediaStatus,
}

impl AudioVideoMedia {
    /// Freshly uploaded, waiting for the encoder
    pub fn new(name: impl Into<String>, raw_location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_location: raw_location.into(),
            encoded_location: None,
            status: AudioVideoMediaStatus::Pending,
        }
    }

    pub fn process(&mut self) {
        self.status = AudioVideoMediaStatus::Processing;
    }

    pub fn complete(&mut self, encoded_location: impl Into<String>) {
        self.encoded_location = Some(encoded_location.into());
        self.status = AudioVideoMediaStatus::Completed;
    }

    pub fn fail(&mut self) {
        self.status = AudioVideoMediaStatus::Failed;
    }

    pub fn is_completed(&self) -> bool {
        self.status == AudioVideoMediaStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioVideoField {
    Trailer,
    Video,
}

impl AudioVideoField {
    pub const ALL: [AudioVideoField; 2] = [AudioVideoField::Trailer, AudioVideoField::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioVideoField::Trailer => "trailer",
            AudioVideoField::Video => "video",
        }
    }
}

impl fmt::Display for AudioVideoField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioVideoField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("Invalid audio video field: {s}"))
    }
}

/// Something that happened to a video and that other parts of the system may
/// want to hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VideoEvent {
    /// A trailer or video file was uploaded and now awaits encoding
    AudioVideoMediaReplaced {
        video_id: VideoId,
        field: AudioVideoField,
        media: AudioVideoMedia,
        occurred_on: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Video {
    pub(crate) video_id: VideoId,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) year_launched: i32,
    pub(crate) duration: i32,
    pub(crate) rating: Rating,
    pub(crate) is_opened: bool,
    pub(crate) is_published: bool,
    pub(crate) banner: Option<ImageMedia>,
    pub(crate) thumbnail: Option<ImageMedia>,
    pub(crate) thumbnail_half: Option<ImageMedia>,
    pub(crate) trailer: Option<AudioVideoMedia>,
    pub(crate) video: Option<AudioVideoMedia>,
    pub(crate) categories_id: RelationSet<CategoryId>,
    pub(crate) genres_id: RelationSet<GenreId>,
    pub(crate) cast_members_id: RelationSet<CastMemberId>,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<VideoEvent>,
    #[serde(skip)]
    pub(crate) notification: Notification,
}

/// Input for [`Video::create`]
#[derive(Debug, Clone, Deserialize)]
pub struct VideoCreateCommand {
    pub title: String,
    pub description: String,
    pub year_launched: i32,
    pub duration: i32,
    pub rating: Rating,
    pub is_opened: bool,
    #[serde(default)]
    pub categories_id: Vec<CategoryId>,
    #[serde(default)]
    pub genres_id: Vec<GenreId>,
    #[serde(default)]
    pub cast_members_id: Vec<CastMemberId>,
}

impl Video {
    pub fn create(command: VideoCreateCommand) -> Self {
        let mut video = Self {
            video_id: VideoId::new(),
            title: command.title,
            description: command.description,
            year_launched: command.year_launched,
            duration: command.duration,
            rating: command.rating,
            is_opened: command.is_opened,
            is_published: false,
            banner: None,
            thumbnail: None,
            thumbnail_half: None,
            trailer: None,
            video: None,
            categories_id: command.categories_id.into_iter().collect(),
            genres_id: command.genres_id.into_iter().collect(),
            cast_members_id: command.cast_members_id.into_iter().collect(),
            created_at: now(),
            events: Vec::new(),
            notification: Notification::new(),
        };
        video.validate();
        video
    }

    pub fn video_id(&self) -> VideoId {
        self.video_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn year_launched(&self) -> i32 {
        self.year_launched
    }

    pub fn duration(&self) -> i32 {
        self.duration
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn is_opened(&self) -> bool {
        self.is_opened
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn image(&self, field: ImageField) -> Option<&ImageMedia> {
        match field {
            ImageField::Banner => self.banner.as_ref(),
            ImageField::Thumbnail => self.thumbnail.as_ref(),
            ImageField::ThumbnailHalf => self.thumbnail_half.as_ref(),
        }
    }

    pub fn audio_video(&self, field: AudioVideoField) -> Option<&AudioVideoMedia> {
        match field {
            AudioVideoField::Trailer => self.trailer.as_ref(),
            AudioVideoField::Video => self.video.as_ref(),
        }
    }

    pub fn categories_id(&self) -> &RelationSet<CategoryId> {
        &self.categories_id
    }

    pub fn genres_id(&self) -> &RelationSet<GenreId> {
        &self.genres_id
    }

    pub fn cast_members_id(&self) -> &RelationSet<CastMemberId> {
        &self.cast_members_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    pub(crate) fn notification_mut(&mut self) -> &mut Notification {
        &mut self.notification
    }

    pub fn change_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.validate();
    }

    pub fn change_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn change_year_launched(&mut self, year_launched: i32) {
        self.year_launched = year_launched;
    }

    pub fn change_duration(&mut self, duration: i32) {
        self.duration = duration;
    }

    pub fn change_rating(&mut self, rating: Rating) {
        self.rating = rating;
    }

    pub fn mark_as_opened(&mut self) {
        self.is_opened = true;
    }

    pub fn mark_as_not_opened(&mut self) {
        self.is_opened = false;
    }

    pub fn sync_categories_id(&mut self, ids: impl IntoIterator<Item = CategoryId>) {
        self.categories_id.sync(ids);
    }

    pub fn sync_genres_id(&mut self, ids: impl IntoIterator<Item = GenreId>) {
        self.genres_id.sync(ids);
    }

    pub fn sync_cast_members_id(&mut self, ids: impl IntoIterator<Item = CastMemberId>) {
        self.cast_members_id.sync(ids);
    }

    pub fn add_category_id(&mut self, id: CategoryId) {
        self.categories_id.add(id);
    }

    pub fn add_genre_id(&mut self, id: GenreId) {
        self.genres_id.add(id);
    }

    pub fn add_cast_member_id(&mut self, id: CastMemberId) {
        self.cast_members_id.add(id);
    }

    pub fn remove_category_id(&mut self, id: &CategoryId) {
        self.categories_id.remove(id);
    }

    pub fn remove_genre_id(&mut self, id: &GenreId) {
        self.genres_id.remove(id);
    }

    pub fn remove_cast_member_id(&mut self, id: &CastMemberId) {
        self.cast_members_id.remove(id);
    }

    pub fn replace_image(&mut self, field: ImageField, media: ImageMedia) {
        let slot = match field {
            ImageField::Banner => &mut self.banner,
            ImageField::Thumbnail => &mut self.thumbnail,
            ImageField::ThumbnailHalf => &mut self.thumbnail_half,
        };
        *slot = Some(media);
    }

    pub fn replace_banner(&mut self, media: ImageMedia) {
        self.replace_image(ImageField::Banner, media);
    }

    pub fn replace_thumbnail(&mut self, media: ImageMedia) {
        self.replace_image(ImageField::Thumbnail, media);
    }

    pub fn replace_thumbnail_half(&mut self, media: ImageMedia) {
        self.replace_image(ImageField::ThumbnailHalf, media);
    }

    /// Put a new upload into an audio/video slot and record the replacement
    pub fn replace_audio_video(&mut self, field: AudioVideoField, media: AudioVideoMedia) {
        *self.audio_video_slot(field) = Some(media.clone());
        self.refresh_published();
        self.events.push(VideoEvent::AudioVideoMediaReplaced {
            video_id: self.video_id,
            field,
            media,
            occurred_on: Utc::now(),
        });
    }

    pub fn replace_trailer(&mut self, media: AudioVideoMedia) {
        self.replace_audio_video(AudioVideoField::Trailer, media);
    }

    pub fn replace_video(&mut self, media: AudioVideoMedia) {
        self.replace_audio_video(AudioVideoField::Video, media);
    }

    /// Record the encoder's outcome for a slot
    ///
    /// `Some(location)` completes the media, `None` marks it failed. Returns
    /// false when the slot is empty.
    pub fn finish_processing(
        &mut self,
        field: AudioVideoField,
        encoded_location: Option<String>,
    ) -> bool {
        let Some(media) = self.audio_video_slot(field).as_mut() else {
            return false;
        };
        match encoded_location {
            Some(location) => media.complete(location),
            None => media.fail(),
        }
        self.refresh_published();
        true
    }

    /// Hand over the events recorded since the last call
    pub fn take_events(&mut self) -> Vec<VideoEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn validate(&mut self) -> bool {
        self.notification.clear_fields(&["title"]);
        check_max_length(&mut self.notification, "title", &self.title, MAX_NAME_LENGTH);
        !self.notification.has_errors()
    }

    fn audio_video_slot(&mut self, field: AudioVideoField) -> &mut Option<AudioVideoMedia> {
        match field {
            AudioVideoField::Trailer => &mut self.trailer,
            AudioVideoField::Video => &mut self.video,
        }
    }

    fn refresh_published(&mut self) {
        self.is_published = self.trailer.as_ref().is_some_and(AudioVideoMedia::is_completed)
            && self.video.as_ref().is_some_and(AudioVideoMedia::is_completed);
    }
}

impl Entity for Video {
    type Id = VideoId;
    const NAME: &'static str = "Video";

    fn entity_id(&self) -> &VideoId {
        &self.video_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Media slots and the derived publication flag are left untouched
    fn apply_update(&mut self, incoming: &Self) {
        self.title = incoming.title.clone();
        self.description = incoming.description.clone();
        self.year_launched = incoming.year_launched;
        self.duration = incoming.duration;
        self.rating = incoming.rating;
        self.is_opened = incoming.is_opened;
        self.categories_id = incoming.categories_id.clone();
        self.genres_id = incoming.genres_id.clone();
        self.cast_members_id = incoming.cast_members_id.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFilter {
    pub title: Option<String>,
    pub categories_id: Vec<CategoryId>,
    pub genres_id: Vec<GenreId>,
    pub cast_members_id: Vec<CastMemberId>,
}

impl VideoFilter {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.categories_id.is_empty()
            && self.genres_id.is_empty()
            && self.cast_members_id.is_empty()
    }
}

impl SearchFilter for VideoFilter {
    fn from_raw(raw: &Value) -> Result<Option<Self>, EntityValidationError> {
        let Some(object) = filter_object(raw) else {
            return Ok(None);
        };

        // Report every malformed id list at once
        let mut errors = EntityValidationError::default();
        let categories_id = collect_ids(filter_ids(object, "categories_id"), &mut errors);
        let genres_id = collect_ids(filter_ids(object, "genres_id"), &mut errors);
        let cast_members_id = collect_ids(filter_ids(object, "cast_members_id"), &mut errors);
        if !errors.errors.is_empty() {
            return Err(errors);
        }

        let filter = Self {
            title: filter_text(object, "title"),
            categories_id,
            genres_id,
            cast_members_id,
        };
        Ok((!filter.is_empty()).then_some(filter))
    }
}

fn collect_ids<I>(
    result: Result<Vec<I>, EntityValidationError>,
    errors: &mut EntityValidationError,
) -> Vec<I> {
    result.unwrap_or_else(|error| {
        errors.errors.extend(error.errors);
        Vec::new()
    })
}

impl Searchable for Video {
    type Filter = VideoFilter;
    const SORTABLE_FIELDS: &'static [&'static str] = &["title", "created_at"];

    fn matches(&self, filter: &VideoFilter) -> bool {
        filter
            .title
            .as_deref()
            .is_none_or(|title| contains_ignore_case(&self.title, title))
            && (filter.categories_id.is_empty()
                || self.categories_id.intersects(&filter.categories_id))
            && (filter.genres_id.is_empty() || self.genres_id.intersects(&filter.genres_id))
            && (filter.cast_members_id.is_empty()
                || self.cast_members_id.intersects(&filter.cast_members_id))
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "title" => Some(SortValue::Text(self.title.clone())),
            "created_at" => Some(SortValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(title: &str) -> VideoCreateCommand {
        VideoCreateCommand {
            title: title.to_string(),
            description: "some description".to_string(),
            year_launched: 2020,
            duration: 90,
            rating: Rating::R12,
            is_opened: false,
            categories_id: vec![],
            genres_id: vec![],
            cast_members_id: vec![],
        }
    }

    #[test]
    fn test_rating_codes() {
        assert_eq!("L".parse::<Rating>(), Ok(Rating::RL));
        assert_eq!(Rating::R18.as_str(), "18");
        assert_eq!("11".parse::<Rating>(), Err("Invalid rating: 11".to_string()));
        assert_eq!(serde_json::to_value(Rating::R10).unwrap(), json!("10"));
    }

    #[test]
    fn test_create_is_unpublished_without_media() {
        let video = Video::create(command("Movie"));
        assert!(!video.is_published());
        assert!(video.audio_video(AudioVideoField::Trailer).is_none());
        assert!(!video.notification().has_errors());
    }

    #[test]
    fn test_title_too_long_is_reported() {
        let video = Video::create(command(&"t".repeat(256)));
        assert!(video.notification().errors().contains_key("title"));
    }

    #[test]
    fn test_replace_audio_video_records_event() {
        let mut video = Video::create(command("Movie"));
        video.replace_trailer(AudioVideoMedia::new("trailer.mp4", "raw/trailer.mp4"));

        let events = video.take_events();
        assert_eq!(events.len(), 1);
        let VideoEvent::AudioVideoMediaReplaced {
            video_id,
            field,
            media,
            ..
        } = &events[0];
        assert_eq!(*video_id, video.video_id());
        assert_eq!(*field, AudioVideoField::Trailer);
        assert_eq!(media.status, AudioVideoMediaStatus::Pending);

        assert!(video.take_events().is_empty());
    }

    #[test]
    fn test_published_once_both_slots_complete() {
        let mut video = Video::create(command("Movie"));
        video.replace_trailer(AudioVideoMedia::new("trailer.mp4", "raw/trailer.mp4"));
        video.replace_video(AudioVideoMedia::new("video.mp4", "raw/video.mp4"));

        assert!(video.finish_processing(
            AudioVideoField::Trailer,
            Some("encoded/trailer.m3u8".to_string())
        ));
        assert!(!video.is_published());

        assert!(video.finish_processing(
            AudioVideoField::Video,
            Some("encoded/video.m3u8".to_string())
        ));
        assert!(video.is_published());

        video.finish_processing(AudioVideoField::Video, None);
        assert!(!video.is_published());
        assert_eq!(
            video.audio_video(AudioVideoField::Video).map(|m| m.status),
            Some(AudioVideoMediaStatus::Failed)
        );
    }

    #[test]
    fn test_finish_processing_on_empty_slot() {
        let mut video = Video::create(command("Movie"));
        assert!(!video.finish_processing(AudioVideoField::Video, None));
    }

    #[test]
    fn test_apply_update_keeps_media() {
        let mut stored = Video::create(command("Movie"));
        stored.replace_banner(ImageMedia::new("banner.png", "images/banner.png"));

        let mut incoming = stored.clone();
        incoming.banner = None;
        incoming.change_title("Other");
        incoming.mark_as_opened();

        stored.apply_update(&incoming);
        assert_eq!(stored.title(), "Other");
        assert!(stored.is_opened());
        assert_eq!(
            stored.image(ImageField::Banner),
            Some(&ImageMedia::new("banner.png", "images/banner.png"))
        );
    }

    #[test]
    fn test_filter_from_raw_reports_every_bad_list() {
        let error = VideoFilter::from_raw(&json!({
            "categories_id": ["fake"],
            "genres_id": "also-fake",
        }))
        .unwrap_err();
        assert!(error.field("categories_id").is_some());
        assert!(error.field("genres_id").is_some());
        assert!(error.field("cast_members_id").is_none());
    }

    #[test]
    fn test_filter_matching() {
        let genre_id = GenreId::new();
        let mut video = Video::create(command("The Matrix"));
        video.add_genre_id(genre_id);

        let filter = VideoFilter::from_raw(&json!({ "title": "matrix" }))
            .unwrap()
            .unwrap();
        assert!(video.matches(&filter));

        let filter = VideoFilter {
            genres_id: vec![GenreId::new()],
            ..Default::default()
        };
        assert!(!video.matches(&filter));

        let filter = VideoFilter {
            title: Some("MAT".to_string()),
            genres_id: vec![genre_id],
            ..Default::default()
        };
        assert!(video.matches(&filter));
        assert_eq!(VideoFilter::from_raw(&json!({})).unwrap(), None);
    }
}
