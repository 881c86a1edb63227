use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    Entity, EntityValidationError, NotFoundError, SearchParams, UnitOfWork, UnitOfWorkExt,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{ListOutput, parse_id};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    AudioVideoField, AudioVideoMedia, AudioVideoMediaStatus, ImageField, ImageMedia, Rating, Video,
    VideoCreateCommand, VideoEvent, VideoId,
};
use crate::repositories::{
    CastMemberRepository, CategoryRepository, GenreRepository, VideoRepository,
};
use crate::validation::{RelationValidator, merge_outcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoOutput {
    pub id: String,
    pub title: String,
    pub description: String,
    pub year_launched: i32,
    pub duration: i32,
    pub rating: Rating,
    pub is_opened: bool,
    pub is_published: bool,
    pub banner: Option<ImageMedia>,
    pub thumbnail: Option<ImageMedia>,
    pub thumbnail_half: Option<ImageMedia>,
    pub trailer: Option<AudioVideoMedia>,
    pub video: Option<AudioVideoMedia>,
    pub categories_id: Vec<String>,
    pub genres_id: Vec<String>,
    pub cast_members_id: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Video> for VideoOutput {
    fn from(video: &Video) -> Self {
        Self {
            id: video.video_id().to_string(),
            title: video.title().to_string(),
            description: video.description().to_string(),
            year_launched: video.year_launched(),
            duration: video.duration(),
            rating: video.rating(),
            is_opened: video.is_opened(),
            is_published: video.is_published(),
            banner: video.image(ImageField::Banner).cloned(),
            thumbnail: video.image(ImageField::Thumbnail).cloned(),
            thumbnail_half: video.image(ImageField::ThumbnailHalf).cloned(),
            trailer: video.audio_video(AudioVideoField::Trailer).cloned(),
            video: video.audio_video(AudioVideoField::Video).cloned(),
            categories_id: video.categories_id().ids().map(ToString::to_string).collect(),
            genres_id: video.genres_id().ids().map(ToString::to_string).collect(),
            cast_members_id: video.cast_members_id().ids().map(ToString::to_string).collect(),
            created_at: video.created_at(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVideoInput {
    pub title: String,
    pub description: String,
    pub year_launched: i32,
    pub duration: i32,
    pub rating: Rating,
    pub is_opened: bool,
    #[serde(default)]
    pub categories_id: Vec<String>,
    #[serde(default)]
    pub genres_id: Vec<String>,
    #[serde(default)]
    pub cast_members_id: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVideoInput {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub year_launched: Option<i32>,
    pub duration: Option<i32>,
    pub rating: Option<Rating>,
    pub is_opened: Option<bool>,
    pub categories_id: Option<Vec<String>>,
    pub genres_id: Option<Vec<String>>,
    pub cast_members_id: Option<Vec<String>>,
}

/// Encoder outcome for one audio/video slot
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessAudioVideoMediaInput {
    pub video_id: String,
    pub field: AudioVideoField,
    pub status: AudioVideoMediaStatus,
    pub encoded_location: Option<String>,
}

/// A new upload for a trailer or video slot
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceAudioVideoMediaInput {
    pub video_id: String,
    pub field: AudioVideoField,
    pub name: String,
    pub raw_location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceImageMediaInput {
    pub video_id: String,
    pub field: ImageField,
    pub name: String,
    pub location: String,
}

/// The stored video and the events its change produced, for the caller to publish
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceMediaOutput {
    pub video: VideoOutput,
    pub events: Vec<VideoEvent>,
}

#[derive(Clone)]
pub struct VideoUseCases {
    repository: Arc<dyn VideoRepository>,
    categories: RelationValidator<dyn CategoryRepository>,
    genres: RelationValidator<dyn GenreRepository>,
    cast_members: RelationValidator<dyn CastMemberRepository>,
    uow: Arc<dyn UnitOfWork>,
}

impl VideoUseCases {
    pub fn new(
        repository: Arc<dyn VideoRepository>,
        categories: Arc<dyn CategoryRepository>,
        genres: Arc<dyn GenreRepository>,
        cast_members: Arc<dyn CastMemberRepository>,
        uow: Arc<dyn UnitOfWork>,
    ) -> Self {
        Self {
            repository,
            categories: RelationValidator::new(categories),
            genres: RelationValidator::new(genres),
            cast_members: RelationValidator::new(cast_members),
            uow,
        }
    }

    pub async fn create(&self, input: CreateVideoInput) -> CatalogResult<VideoOutput> {
        let mut video = Video::create(VideoCreateCommand {
            title: input.title,
            description: input.description,
            year_launched: input.year_launched,
            duration: input.duration,
            rating: input.rating,
            is_opened: input.is_opened,
            categories_id: Vec::new(),
            genres_id: Vec::new(),
            cast_members_id: Vec::new(),
        });
        self.resolve_relations(
            &mut video,
            Some(input.categories_id.as_slice()),
            Some(input.genres_id.as_slice()),
            Some(input.cast_members_id.as_slice()),
        )
        .await?;
        if video.notification().has_errors() {
            return Err(video.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.insert(&video).await?) })
            .await?;
        info!(id = %video.video_id(), "Video created");
        Ok(VideoOutput::from(&video))
    }

    pub async fn update(&self, input: UpdateVideoInput) -> CatalogResult<VideoOutput> {
        let mut video = self.load(&input.id).await?;

        if let Some(title) = input.title {
            video.change_title(title);
        }
        if let Some(description) = input.description {
            video.change_description(description);
        }
        if let Some(year_launched) = input.year_launched {
            video.change_year_launched(year_launched);
        }
        if let Some(duration) = input.duration {
            video.change_duration(duration);
        }
        if let Some(rating) = input.rating {
            video.change_rating(rating);
        }
        match input.is_opened {
            Some(true) => video.mark_as_opened(),
            Some(false) => video.mark_as_not_opened(),
            None => {}
        }
        self.resolve_relations(
            &mut video,
            input.categories_id.as_deref(),
            input.genres_id.as_deref(),
            input.cast_members_id.as_deref(),
        )
        .await?;
        if video.notification().has_errors() {
            return Err(video.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.update(&video).await?) })
            .await?;
        Ok(VideoOutput::from(&video))
    }

    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let id: VideoId = parse_id(id)?;
        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.delete(&id).await?) })
            .await
    }

    pub async fn get(&self, id: &str) -> CatalogResult<VideoOutput> {
        let video = self.load(id).await?;
        Ok(VideoOutput::from(&video))
    }

    pub async fn list(&self, raw: &Value) -> CatalogResult<ListOutput<VideoOutput>> {
        let params = SearchParams::create(raw)?;
        let result = self.repository.search(&params).await?;
        Ok(ListOutput::present(result, |video| VideoOutput::from(&video)))
    }

    /// Apply the encoder's verdict to a trailer or video slot
    pub async fn process_audio_video_media(
        &self,
        input: ProcessAudioVideoMediaInput,
    ) -> CatalogResult<VideoOutput> {
        let encoded_location = match (input.status, input.encoded_location) {
            (AudioVideoMediaStatus::Completed, Some(location)) => Some(location),
            (AudioVideoMediaStatus::Completed, None) => {
                return Err(EntityValidationError::single(
                    "encoded_location",
                    "encoded_location is required for a completed media",
                )
                .into());
            }
            (AudioVideoMediaStatus::Failed, _) => None,
            (status, _) => {
                return Err(EntityValidationError::single(
                    "status",
                    format!("Media cannot be processed to status {status}"),
                )
                .into());
            }
        };

        let mut video = self.load(&input.video_id).await?;
        if !video.finish_processing(input.field, encoded_location) {
            return Err(EntityValidationError::single(
                input.field.as_str(),
                format!("{} media not found", input.field),
            )
            .into());
        }
        if input.status == AudioVideoMediaStatus::Failed {
            warn!(id = %video.video_id(), field = %input.field, "Media processing failed");
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.update_media(&video).await?) })
            .await?;
        Ok(VideoOutput::from(&video))
    }

    pub async fn replace_audio_video_media(
        &self,
        input: ReplaceAudioVideoMediaInput,
    ) -> CatalogResult<ReplaceMediaOutput> {
        let mut video = self.load(&input.video_id).await?;
        video.replace_audio_video(
            input.field,
            AudioVideoMedia::new(input.name, input.raw_location),
        );

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.update_media(&video).await?) })
            .await?;
        let events = video.take_events();
        Ok(ReplaceMediaOutput {
            video: VideoOutput::from(&video),
            events,
        })
    }

    pub async fn replace_image_media(
        &self,
        input: ReplaceImageMediaInput,
    ) -> CatalogResult<ReplaceMediaOutput> {
        let mut video = self.load(&input.video_id).await?;
        video.replace_image(input.field, ImageMedia::new(input.name, input.location));

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.update_media(&video).await?) })
            .await?;
        Ok(ReplaceMediaOutput {
            video: VideoOutput::from(&video),
            events: video.take_events(),
        })
    }

    async fn load(&self, raw_id: &str) -> CatalogResult<Video> {
        let id: VideoId = parse_id(raw_id)?;
        let video = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| NotFoundError::new(id, Video::NAME))?;
        Ok(video)
    }

    /// Validate the given relation lists together and sync the valid ones
    ///
    /// A `None` list leaves that relation set untouched.
    async fn resolve_relations(
        &self,
        video: &mut Video,
        categories_id: Option<&[String]>,
        genres_id: Option<&[String]>,
        cast_members_id: Option<&[String]>,
    ) -> CatalogResult<()> {
        let (categories, genres, cast_members) = tokio::join!(
            async {
                match categories_id {
                    Some(ids) => self.categories.validate(ids).await.map(Some),
                    None => Ok(None),
                }
            },
            async {
                match genres_id {
                    Some(ids) => self.genres.validate(ids).await.map(Some),
                    None => Ok(None),
                }
            },
            async {
                match cast_members_id {
                    Some(ids) => self.cast_members.validate(ids).await.map(Some),
                    None => Ok(None),
                }
            },
        );

        if let Some(outcome) = categories? {
            let ids = merge_outcome(video.notification_mut(), "categories_id", outcome);
            video.sync_categories_id(ids);
        }
        if let Some(outcome) = genres? {
            let ids = merge_outcome(video.notification_mut(), "genres_id", outcome);
            video.sync_genres_id(ids);
        }
        if let Some(outcome) = cast_members? {
            let ids = merge_outcome(video.notification_mut(), "cast_members_id", outcome);
            video.sync_cast_members_id(ids);
        }
        Ok(())
    }
}
