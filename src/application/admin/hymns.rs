use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::hymns::{HymnService, HymnServiceError, normalize_search};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CatalogRepo, CreateHymnParams, HymnQueryFilter, HymnsRepo, HymnsWriteRepo, MediaRecord,
    NewMedia, RepoError, UpdateHymnParams,
};
use crate::application::session::SessionContext;
use crate::cache::{CacheTrigger, Loaded};
use crate::domain::entities::{HymnRecord, HymnSummary};
use crate::domain::error::DomainError;
use crate::domain::hymns::HymnDraft;
use crate::domain::types::{HymnSort, HymnStatus};
use crate::domain::users::validate_http_url;

const TARGET: &str = "hymnary::application::admin::hymns";
const MAX_MEDIA_LABEL_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AdminHymnError {
    #[error("hymn not found")]
    NotFound,
    #[error("media not found")]
    MediaNotFound,
    #[error("{entity} `{id}` does not exist")]
    UnknownLink { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Hymns(#[from] HymnServiceError),
}

#[derive(Debug, Clone)]
pub struct HymnWriteCommand {
    pub number: Option<i32>,
    pub title: String,
    pub lyrics: String,
    pub status: Option<HymnStatus>,
    pub author_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct AdminHymnService {
    reader: Arc<dyn HymnsRepo>,
    writer: Arc<dyn HymnsWriteRepo>,
    catalog: Arc<dyn CatalogRepo>,
    hymns: HymnService,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl AdminHymnService {
    pub fn new(
        reader: Arc<dyn HymnsRepo>,
        writer: Arc<dyn HymnsWriteRepo>,
        catalog: Arc<dyn CatalogRepo>,
        hymns: HymnService,
    ) -> Self {
        Self {
            reader,
            writer,
            catalog,
            hymns,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger(mut self, trigger: Arc<CacheTrigger>) -> Self {
        self.cache_trigger = Some(trigger);
        self
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    /// Hymns of every status unless `status` narrows it, newest first.
    pub async fn list(
        &self,
        status: Option<HymnStatus>,
        search: Option<String>,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<HymnSummary>>, AdminHymnError> {
        let filter = HymnQueryFilter {
            status,
            search: normalize_search(search),
            sort: HymnSort::Recent,
            ..HymnQueryFilter::default()
        };
        Ok(self.hymns.list_filtered(filter, page).await?)
    }

    pub async fn create(
        &self,
        actor: &SessionContext,
        command: HymnWriteCommand,
    ) -> Result<HymnRecord, AdminHymnError> {
        let draft = HymnDraft::new(command.number, &command.title, &command.lyrics)?;
        let author_ids = dedup(command.author_ids);
        let category_ids = dedup(command.category_ids);
        self.ensure_links_exist(&author_ids, &category_ids).await?;

        let hymn = self
            .writer
            .create_hymn(CreateHymnParams {
                draft,
                status: command.status.unwrap_or(HymnStatus::Pending),
                created_by: Some(actor.user_id),
            })
            .await?;
        self.writer
            .replace_hymn_links(hymn.id, &author_ids, &category_ids)
            .await?;

        info!(
            target: TARGET,
            hymn_id = %hymn.id,
            status = %hymn.status,
            actor_id = %actor.user_id,
            "Hymn created"
        );
        self.hymn_changed(hymn.id);
        Ok(hymn)
    }

    pub async fn update(
        &self,
        actor: &SessionContext,
        id: Uuid,
        command: HymnWriteCommand,
    ) -> Result<HymnRecord, AdminHymnError> {
        let draft = HymnDraft::new(command.number, &command.title, &command.lyrics)?;
        let current = self.load(id).await?;
        let author_ids = dedup(command.author_ids);
        let category_ids = dedup(command.category_ids);
        self.ensure_links_exist(&author_ids, &category_ids).await?;

        let mut hymn = self
            .writer
            .update_hymn(UpdateHymnParams { id, draft })
            .await?;
        self.writer
            .replace_hymn_links(id, &author_ids, &category_ids)
            .await?;
        if let Some(status) = command.status
            && status != current.status
        {
            hymn = self.writer.set_hymn_status(id, status).await?;
        }

        info!(target: TARGET, hymn_id = %id, actor_id = %actor.user_id, "Hymn updated");
        self.hymn_changed(id);
        Ok(hymn)
    }

    /// Moves a hymn between moderation states; status-filtered listings
    /// pick the change up on their next read.
    pub async fn set_status(
        &self,
        actor: &SessionContext,
        id: Uuid,
        status: HymnStatus,
    ) -> Result<HymnRecord, AdminHymnError> {
        let current = self.load(id).await?;
        if current.status == status {
            return Ok(current);
        }
        let hymn = self.writer.set_hymn_status(id, status).await?;

        info!(
            target: TARGET,
            hymn_id = %id,
            from = %current.status,
            to = %status,
            actor_id = %actor.user_id,
            "Hymn status changed"
        );
        if let Some(trigger) = &self.cache_trigger {
            trigger.hymn_status_changed(id);
        }
        Ok(hymn)
    }

    pub async fn delete(&self, actor: &SessionContext, id: Uuid) -> Result<(), AdminHymnError> {
        self.load(id).await?;
        self.writer.delete_hymn(id).await?;

        info!(target: TARGET, hymn_id = %id, actor_id = %actor.user_id, "Hymn deleted");
        if let Some(trigger) = &self.cache_trigger {
            trigger.hymn_deleted(id);
        }
        Ok(())
    }

    /// Replaces the author and category links of a hymn.
    pub async fn set_links(
        &self,
        id: Uuid,
        author_ids: Vec<Uuid>,
        category_ids: Vec<Uuid>,
    ) -> Result<(), AdminHymnError> {
        self.load(id).await?;
        let author_ids = dedup(author_ids);
        let category_ids = dedup(category_ids);
        self.ensure_links_exist(&author_ids, &category_ids).await?;
        self.writer
            .replace_hymn_links(id, &author_ids, &category_ids)
            .await?;
        self.hymn_changed(id);
        Ok(())
    }

    /// Records a PDF, audio or video attachment by URL. Recordings may point
    /// at a score of the same hymn.
    pub async fn attach_media(
        &self,
        hymn_id: Uuid,
        media: NewMedia,
    ) -> Result<MediaRecord, AdminHymnError> {
        self.load(hymn_id).await?;
        let media = self.validate_media(hymn_id, media).await?;
        let record = self.writer.attach_media(hymn_id, media).await?;

        info!(target: TARGET, hymn_id = %hymn_id, media = record_kind(&record), "Media attached");
        self.hymn_changed(hymn_id);
        Ok(record)
    }

    pub async fn detach_media(&self, hymn_id: Uuid, media_id: Uuid) -> Result<(), AdminHymnError> {
        if !self.writer.detach_media(hymn_id, media_id).await? {
            return Err(AdminHymnError::MediaNotFound);
        }
        self.hymn_changed(hymn_id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<HymnRecord, AdminHymnError> {
        self.reader
            .find_hymn(id)
            .await?
            .ok_or(AdminHymnError::NotFound)
    }

    async fn ensure_links_exist(
        &self,
        author_ids: &[Uuid],
        category_ids: &[Uuid],
    ) -> Result<(), AdminHymnError> {
        for &id in author_ids {
            if self.catalog.find_author(id).await?.is_none() {
                return Err(AdminHymnError::UnknownLink {
                    entity: "author",
                    id,
                });
            }
        }
        for &id in category_ids {
            if self.catalog.find_category(id).await?.is_none() {
                return Err(AdminHymnError::UnknownLink {
                    entity: "category",
                    id,
                });
            }
        }
        Ok(())
    }

    async fn validate_media(
        &self,
        hymn_id: Uuid,
        media: NewMedia,
    ) -> Result<NewMedia, AdminHymnError> {
        let pdf_id = match &media {
            NewMedia::Pdf { .. } => None,
            NewMedia::Audio { pdf_id, .. } | NewMedia::Video { pdf_id, .. } => *pdf_id,
        };
        if let Some(pdf_id) = pdf_id {
            let existing = self.reader.hymn_media(hymn_id).await?;
            if !existing.pdfs.iter().any(|pdf| pdf.id == pdf_id) {
                return Err(AdminHymnError::MediaNotFound);
            }
        }

        Ok(match media {
            NewMedia::Pdf { url, description } => NewMedia::Pdf {
                url: validate_http_url(&url, "pdf url")?,
                description: label(description)?,
            },
            NewMedia::Audio { url, title, pdf_id } => NewMedia::Audio {
                url: validate_http_url(&url, "audio url")?,
                title: label(title)?,
                pdf_id,
            },
            NewMedia::Video {
                url,
                source,
                pdf_id,
            } => NewMedia::Video {
                url: validate_http_url(&url, "video url")?,
                source: label(source)?.map(|source| source.to_lowercase()),
                pdf_id,
            },
        })
    }

    fn hymn_changed(&self, id: Uuid) {
        if let Some(trigger) = &self.cache_trigger {
            trigger.hymn_upserted(id);
        }
    }
}

fn label(value: Option<String>) -> Result<Option<String>, DomainError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_MEDIA_LABEL_CHARS {
        return Err(DomainError::validation(format!(
            "media labels must be at most {MAX_MEDIA_LABEL_CHARS} characters"
        )));
    }
    Ok(Some(value))
}

fn record_kind(record: &MediaRecord) -> &'static str {
    match record {
        MediaRecord::Pdf(_) => "pdf",
        MediaRecord::Audio(_) => "audio",
        MediaRecord::Video(_) => "video",
    }
}

fn dedup(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    ids
}
