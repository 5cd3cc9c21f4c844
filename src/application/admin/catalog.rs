use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CatalogRepo, CatalogWriteRepo, RepoError};
use crate::application::session::SessionContext;
use crate::cache::CacheTrigger;
use crate::domain::entities::{AuthorRecord, CategoryRecord};
use crate::domain::error::DomainError;
use crate::domain::hymns::{AuthorDraft, CategoryDraft};

const TARGET: &str = "hymnary::application::admin::catalog";

#[derive(Debug, Error)]
pub enum AdminCatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{entity} is linked to {count} hymns")]
    InUse { entity: &'static str, count: u64 },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct AuthorCommand {
    pub name: String,
    pub biography: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CategoryCommand {
    pub name: String,
    pub description: Option<String>,
}

/// Author and category maintenance.
#[derive(Clone)]
pub struct AdminCatalogService {
    reader: Arc<dyn CatalogRepo>,
    writer: Arc<dyn CatalogWriteRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl AdminCatalogService {
    pub fn new(reader: Arc<dyn CatalogRepo>, writer: Arc<dyn CatalogWriteRepo>) -> Self {
        Self {
            reader,
            writer,
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

    pub async fn create_author(
        &self,
        actor: &SessionContext,
        command: AuthorCommand,
    ) -> Result<AuthorRecord, AdminCatalogError> {
        let draft = author_draft(&command)?;
        let author = self.writer.create_author(draft).await?;

        info!(target: TARGET, author_id = %author.id, actor_id = %actor.user_id, "Author created");
        if let Some(trigger) = &self.cache_trigger {
            trigger.author_upserted(author.id);
        }
        Ok(author)
    }

    pub async fn update_author(
        &self,
        actor: &SessionContext,
        id: Uuid,
        command: AuthorCommand,
    ) -> Result<AuthorRecord, AdminCatalogError> {
        let draft = author_draft(&command)?;
        self.reader
            .find_author(id)
            .await?
            .ok_or(AdminCatalogError::NotFound("author"))?;
        let author = self.writer.update_author(id, draft).await?;

        info!(target: TARGET, author_id = %id, actor_id = %actor.user_id, "Author updated");
        if let Some(trigger) = &self.cache_trigger {
            trigger.author_upserted(id);
        }
        Ok(author)
    }

    /// Refused while any hymn still credits the author.
    pub async fn delete_author(
        &self,
        actor: &SessionContext,
        id: Uuid,
    ) -> Result<(), AdminCatalogError> {
        self.reader
            .find_author(id)
            .await?
            .ok_or(AdminCatalogError::NotFound("author"))?;
        let count = self.writer.count_author_links(id).await?;
        if count > 0 {
            return Err(AdminCatalogError::InUse {
                entity: "author",
                count,
            });
        }
        self.writer.delete_author(id).await?;

        info!(target: TARGET, author_id = %id, actor_id = %actor.user_id, "Author deleted");
        if let Some(trigger) = &self.cache_trigger {
            trigger.author_deleted(id);
        }
        Ok(())
    }

    pub async fn create_category(
        &self,
        actor: &SessionContext,
        command: CategoryCommand,
    ) -> Result<CategoryRecord, AdminCatalogError> {
        let draft = CategoryDraft::new(&command.name, command.description.as_deref())?;
        let category = self.writer.create_category(draft).await?;

        info!(target: TARGET, category_id = %category.id, actor_id = %actor.user_id, "Category created");
        if let Some(trigger) = &self.cache_trigger {
            trigger.category_upserted(category.id);
        }
        Ok(category)
    }

    pub async fn update_category(
        &self,
        actor: &SessionContext,
        id: Uuid,
        command: CategoryCommand,
    ) -> Result<CategoryRecord, AdminCatalogError> {
        let draft = CategoryDraft::new(&command.name, command.description.as_deref())?;
        self.reader
            .find_category(id)
            .await?
            .ok_or(AdminCatalogError::NotFound("category"))?;
        let category = self.writer.update_category(id, draft).await?;

        info!(target: TARGET, category_id = %id, actor_id = %actor.user_id, "Category updated");
        if let Some(trigger) = &self.cache_trigger {
            trigger.category_upserted(id);
        }
        Ok(category)
    }

    /// Refused while any hymn still belongs to the category.
    pub async fn delete_category(
        &self,
        actor: &SessionContext,
        id: Uuid,
    ) -> Result<(), AdminCatalogError> {
        self.reader
            .find_category(id)
            .await?
            .ok_or(AdminCatalogError::NotFound("category"))?;
        let count = self.writer.count_category_links(id).await?;
        if count > 0 {
            return Err(AdminCatalogError::InUse {
                entity: "category",
                count,
            });
        }
        self.writer.delete_category(id).await?;

        info!(target: TARGET, category_id = %id, actor_id = %actor.user_id, "Category deleted");
        if let Some(trigger) = &self.cache_trigger {
            trigger.category_deleted(id);
        }
        Ok(())
    }
}

fn author_draft(command: &AuthorCommand) -> Result<AuthorDraft, DomainError> {
    AuthorDraft::new(
        &command.name,
        command.biography.as_deref(),
        command.birth_year,
        command.death_year,
    )
}
