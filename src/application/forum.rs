//! Discussion forum: posts, comments, likes, bookmarks and tags, with the
//! notifications and reputation awards they produce.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::hymns::normalize_search;
use crate::application::notifications::{NotificationService, NotificationsError};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CreateCommentParams, CreateForumPostParams, ForumPostFilter, ForumRepo, ForumWriteRepo,
    HymnsRepo, RepoError, UsersRepo,
};
use crate::application::session::{SessionContext, viewer_key};
use crate::cache::{CacheTrigger, Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::{
    ForumCommentRecord, ForumPostDetail, ForumPostRecord, ForumPostSummary, TagWithCount,
};
use crate::domain::error::DomainError;
use crate::domain::forum::{CommentDraft, PostDraft, extract_mentions, reputation};
use crate::domain::types::NotificationKind;
use crate::domain::users::NotificationDraft;

const TARGET: &str = "hymnary::application::forum";

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("post not found")]
    PostNotFound,
    #[error("comment not found")]
    CommentNotFound,
    #[error("hymn not found")]
    HymnNotFound,
    #[error("only the author or a moderator may change this content")]
    Forbidden,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Clone)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    pub hymn_id: Option<Uuid>,
    pub tags: Vec<String>,
}

#[derive(Clone)]
pub struct ForumService {
    reader: Arc<dyn ForumRepo>,
    writer: Arc<dyn ForumWriteRepo>,
    hymns: Arc<dyn HymnsRepo>,
    users: Arc<dyn UsersRepo>,
    notifications: NotificationService,
    queries: Arc<QueryClient>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl ForumService {
    pub fn new(
        reader: Arc<dyn ForumRepo>,
        writer: Arc<dyn ForumWriteRepo>,
        hymns: Arc<dyn HymnsRepo>,
        users: Arc<dyn UsersRepo>,
        notifications: NotificationService,
        queries: Arc<QueryClient>,
    ) -> Self {
        Self {
            reader,
            writer,
            hymns,
            users,
            notifications,
            queries,
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

    pub async fn list_posts(
        &self,
        filter: ForumPostFilter,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<ForumPostSummary>>, ForumError> {
        let filter = ForumPostFilter {
            search: normalize_search(filter.search),
            tag: filter
                .tag
                .map(|tag| tag.trim().trim_start_matches('#').to_lowercase())
                .filter(|tag| !tag.is_empty()),
            ..filter
        };
        let key = QueryKey::prefix(Resource::ForumPosts)
            .with("sort", filter.sort)
            .with_opt("search", filter.search.as_deref())
            .with_opt("tag", filter.tag.as_deref())
            .with_opt("hymn", filter.hymn_id)
            .with_opt("user", filter.user_id)
            .with("page", page.page())
            .with("page_size", page.page_size());
        let reader = self.reader.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                reader.list_posts(&filter, page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    /// The post with its comments, oldest first. Counts a view; a failed
    /// counter update is only logged.
    pub async fn post_detail(
        &self,
        id: Uuid,
        session: Option<&SessionContext>,
    ) -> Result<Loaded<ForumPostDetail>, ForumError> {
        let viewer = session.map(|s| s.user_id);
        let key = QueryKey::prefix(Resource::ForumPost)
            .with("id", id)
            .with("viewer", viewer_key(session));
        let reader = self.reader.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                let (summary, post) = tokio::try_join!(reader.post_summary(id), reader.find_post(id))?;
                let (Some(summary), Some(post)) = (summary, post) else {
                    return Ok::<_, RepoError>(None);
                };
                let comments = reader.list_comments(id).await?;
                let (liked_by_viewer, bookmarked_by_viewer) = match viewer {
                    Some(user_id) => tokio::try_join!(
                        reader.has_liked(id, user_id),
                        reader.is_bookmarked(id, user_id)
                    )?,
                    None => (false, false),
                };
                Ok(Some(ForumPostDetail {
                    summary,
                    content: post.content,
                    comments,
                    liked_by_viewer,
                    bookmarked_by_viewer,
                }))
            })
            .await;

        let detail = state
            .into_loaded()?
            .transpose()
            .ok_or(ForumError::PostNotFound)?;

        match self.reader.increment_post_view(id).await {
            Ok(()) => {
                if let Some(trigger) = &self.cache_trigger {
                    trigger.forum_post_viewed(id);
                }
            }
            Err(err) => {
                warn!(target: TARGET, post_id = %id, error = %err, "Failed to record post view");
            }
        }
        Ok(detail)
    }

    pub async fn create_post(
        &self,
        session: &SessionContext,
        input: PostInput,
    ) -> Result<ForumPostRecord, ForumError> {
        let draft = PostDraft::new(&input.title, &input.content, &input.tags)?;
        if let Some(hymn_id) = input.hymn_id {
            self.hymns
                .find_hymn(hymn_id)
                .await?
                .ok_or(ForumError::HymnNotFound)?;
        }

        let post = self
            .writer
            .create_post(CreateForumPostParams {
                user_id: session.user_id,
                hymn_id: input.hymn_id,
                draft,
            })
            .await?;

        info!(target: TARGET, post_id = %post.id, user_id = %session.user_id, "Forum post created");
        self.award(session.user_id, reputation::POST_CREATED).await;

        let mut skip = HashSet::from([session.user_id]);
        self.notify_mentions(
            &post.content,
            &mut skip,
            session,
            NotificationKind::PostMention,
            &format!("{} mentioned you in \"{}\"", session.display_name, post.title),
            &format!("/forum/posts/{}", post.id),
        )
        .await;

        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_post_upserted(post.id);
        }
        Ok(post)
    }

    pub async fn update_post(
        &self,
        session: &SessionContext,
        id: Uuid,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<ForumPostRecord, ForumError> {
        let existing = self.load_post(id).await?;
        if !session.can_modify(existing.user_id) {
            return Err(ForumError::Forbidden);
        }
        let draft = PostDraft::new(title, content, tags)?;
        let post = self.writer.update_post(id, draft).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_post_upserted(post.id);
        }
        Ok(post)
    }

    pub async fn delete_post(&self, session: &SessionContext, id: Uuid) -> Result<(), ForumError> {
        let existing = self.load_post(id).await?;
        if !session.can_modify(existing.user_id) {
            return Err(ForumError::Forbidden);
        }
        self.writer.delete_post(id).await?;

        info!(target: TARGET, post_id = %id, actor_id = %session.user_id, "Forum post deleted");
        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_post_deleted(id);
        }
        Ok(())
    }

    /// Adds a comment and tells the post author, the author of the comment
    /// being answered and anyone `@mentioned`, each at most once and never
    /// the commenter.
    pub async fn add_comment(
        &self,
        session: &SessionContext,
        post_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<ForumCommentRecord, ForumError> {
        let post = self.load_post(post_id).await?;
        let draft = CommentDraft::new(content)?;

        let parent = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .reader
                    .find_comment(parent_id)
                    .await?
                    .filter(|comment| comment.post_id == post_id)
                    .ok_or(ForumError::CommentNotFound)?;
                Some(parent)
            }
            None => None,
        };

        let comment = self
            .writer
            .add_comment(CreateCommentParams {
                post_id,
                user_id: session.user_id,
                parent_id,
                draft,
            })
            .await?;

        self.award(session.user_id, reputation::COMMENT_ADDED).await;

        let link = format!("/forum/posts/{post_id}");
        let mut skip = HashSet::from([session.user_id]);
        if skip.insert(post.user_id) {
            self.notify(
                post.user_id,
                session,
                NotificationKind::CommentReply,
                "New comment on your post",
                &format!("{} commented on \"{}\"", session.display_name, post.title),
                &link,
            )
            .await;
        }
        if let Some(parent) = parent
            && skip.insert(parent.author.id)
        {
            self.notify(
                parent.author.id,
                session,
                NotificationKind::CommentReply,
                "New reply to your comment",
                &format!("{} replied to your comment on \"{}\"", session.display_name, post.title),
                &link,
            )
            .await;
        }
        self.notify_mentions(
            &comment.content,
            &mut skip,
            session,
            NotificationKind::CommentMention,
            &format!("{} mentioned you in a comment on \"{}\"", session.display_name, post.title),
            &link,
        )
        .await;

        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_comment_added(post_id);
        }
        Ok(comment)
    }

    pub async fn delete_comment(&self, session: &SessionContext, id: Uuid) -> Result<(), ForumError> {
        let comment = self
            .reader
            .find_comment(id)
            .await?
            .ok_or(ForumError::CommentNotFound)?;
        if !session.can_modify(comment.author.id) {
            return Err(ForumError::Forbidden);
        }
        self.writer.delete_comment(id).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_comment_deleted(comment.post_id);
        }
        Ok(())
    }

    /// Likes or unlikes a post. The author gains (or loses) a reputation
    /// point and is notified of new likes; liking your own post does
    /// neither.
    pub async fn toggle_like(&self, session: &SessionContext, post_id: Uuid) -> Result<bool, ForumError> {
        let post = self.load_post(post_id).await?;
        let liked = self.writer.toggle_like(post_id, session.user_id).await?;

        if post.user_id != session.user_id {
            let delta = if liked {
                reputation::POST_LIKE_RECEIVED
            } else {
                -reputation::POST_LIKE_RECEIVED
            };
            self.award(post.user_id, delta).await;
            if liked {
                self.notify(
                    post.user_id,
                    session,
                    NotificationKind::PostLike,
                    "Your post was liked",
                    &format!("{} liked \"{}\"", session.display_name, post.title),
                    &format!("/forum/posts/{post_id}"),
                )
                .await;
            }
        }

        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_post_liked(post_id);
        }
        Ok(liked)
    }

    /// Likes or unlikes a comment, with the same reputation and notification
    /// rules as post likes.
    pub async fn toggle_comment_like(
        &self,
        session: &SessionContext,
        comment_id: Uuid,
    ) -> Result<bool, ForumError> {
        let comment = self
            .reader
            .find_comment(comment_id)
            .await?
            .ok_or(ForumError::CommentNotFound)?;
        let liked = self
            .writer
            .toggle_comment_like(comment_id, session.user_id)
            .await?;

        if comment.author.id != session.user_id {
            let delta = if liked {
                reputation::COMMENT_LIKE_RECEIVED
            } else {
                -reputation::COMMENT_LIKE_RECEIVED
            };
            self.award(comment.author.id, delta).await;
            if liked {
                self.notify(
                    comment.author.id,
                    session,
                    NotificationKind::CommentLike,
                    "Your comment was liked",
                    &format!("{} liked your comment", session.display_name),
                    &format!("/forum/posts/{}", comment.post_id),
                )
                .await;
            }
        }

        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_comment_liked(comment.post_id);
        }
        Ok(liked)
    }

    /// Bookmarks or un-bookmarks a post for the caller; returns the new state.
    pub async fn toggle_bookmark(
        &self,
        session: &SessionContext,
        post_id: Uuid,
    ) -> Result<bool, ForumError> {
        self.load_post(post_id).await?;
        let bookmarked = self.writer.toggle_bookmark(post_id, session.user_id).await?;

        info!(
            target: TARGET,
            post_id = %post_id,
            user_id = %session.user_id,
            bookmarked,
            "Forum bookmark toggled"
        );
        if let Some(trigger) = &self.cache_trigger {
            trigger.bookmark_toggled(session.user_id, post_id);
        }
        Ok(bookmarked)
    }

    pub async fn list_bookmarks(
        &self,
        session: &SessionContext,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<ForumPostSummary>>, ForumError> {
        let user_id = session.user_id;
        let key = QueryKey::prefix(Resource::Bookmarks)
            .with("user", user_id)
            .with("page", page.page())
            .with("page_size", page.page_size());
        let reader = self.reader.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                reader.list_bookmarks(user_id, page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    pub async fn list_tags(&self) -> Result<Loaded<Vec<TagWithCount>>, ForumError> {
        let reader = self.reader.clone();
        let state = self
            .queries
            .fetch(QueryKey::prefix(Resource::ForumTags), move || async move {
                reader.list_tags().await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    /// Moderator action. Featuring a post for the first time rewards and
    /// notifies its author.
    pub async fn feature_post(
        &self,
        session: &SessionContext,
        id: Uuid,
        featured: bool,
    ) -> Result<ForumPostRecord, ForumError> {
        if !session.is_moderator() {
            return Err(ForumError::Forbidden);
        }
        let existing = self.load_post(id).await?;
        let post = self.writer.set_featured(id, featured).await?;

        if featured && !existing.is_featured {
            self.award(post.user_id, reputation::FEATURED_POST).await;
            self.notify(
                post.user_id,
                session,
                NotificationKind::PostFeatured,
                "Your post was featured",
                &format!("\"{}\" is now featured in the forum", post.title),
                &format!("/forum/posts/{id}"),
            )
            .await;
        }

        if let Some(trigger) = &self.cache_trigger {
            trigger.forum_post_upserted(id);
        }
        Ok(post)
    }

    async fn load_post(&self, id: Uuid) -> Result<ForumPostRecord, ForumError> {
        self.reader
            .find_post(id)
            .await?
            .ok_or(ForumError::PostNotFound)
    }

    async fn award(&self, user_id: Uuid, points: i32) {
        match self.users.adjust_reputation(user_id, points).await {
            Ok(()) => {
                if let Some(trigger) = &self.cache_trigger {
                    trigger.profile_updated(user_id);
                }
            }
            Err(err) => {
                warn!(target: TARGET, user_id = %user_id, points, error = %err, "Failed to adjust reputation");
            }
        }
    }

    /// Notifies users mentioned in `content` who are not in `skip`, adding
    /// each one to it.
    async fn notify_mentions(
        &self,
        content: &str,
        skip: &mut HashSet<Uuid>,
        actor: &SessionContext,
        kind: NotificationKind,
        message: &str,
        link: &str,
    ) {
        let handles = extract_mentions(content);
        if handles.is_empty() {
            return;
        }
        let mentioned = match self.users.find_users_by_handles(&handles).await {
            Ok(users) => users,
            Err(err) => {
                warn!(target: TARGET, error = %err, "Failed to resolve mentions");
                return;
            }
        };
        for user in mentioned {
            if skip.insert(user.id) {
                self.notify(user.id, actor, kind, "You were mentioned", message, link)
                    .await;
            }
        }
    }

    async fn notify(
        &self,
        recipient: Uuid,
        actor: &SessionContext,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: &str,
    ) {
        let result = match NotificationDraft::new(title, message, Some(link)) {
            Ok(draft) => {
                self.notifications
                    .notify(recipient, Some(actor.user_id), kind, draft)
                    .await
            }
            Err(err) => Err(NotificationsError::from(err)),
        };
        if let Err(err) = result {
            warn!(
                target: TARGET,
                recipient = %recipient,
                kind = %kind,
                error = %err,
                "Failed to send forum notification"
            );
        }
    }
}
