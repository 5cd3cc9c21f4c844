//! Query keys.
//!
//! A key is a resource name followed by an ordered list of parameters.
//! Invalidation works on prefixes: a prefix matches every key with the same
//! resource whose parameters start with the prefix's parameters.

use std::fmt;

/// Cached resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Hymns,
    Hymn,
    Authors,
    Author,
    Categories,
    Category,
    Favorites,
    ForumPosts,
    ForumPost,
    ForumTags,
    Bookmarks,
    Notifications,
    NotificationCounts,
    Profile,
    AdminUsers,
    AdminReports,
    Dashboard,
    Search,
}

impl Resource {
    pub const ALL: &'static [Resource] = &[
        Resource::Hymns,
        Resource::Hymn,
        Resource::Authors,
        Resource::Author,
        Resource::Categories,
        Resource::Category,
        Resource::Favorites,
        Resource::ForumPosts,
        Resource::ForumPost,
        Resource::ForumTags,
        Resource::Bookmarks,
        Resource::Notifications,
        Resource::NotificationCounts,
        Resource::Profile,
        Resource::AdminUsers,
        Resource::AdminReports,
        Resource::Dashboard,
        Resource::Search,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Hymns => "hymns",
            Resource::Hymn => "hymn",
            Resource::Authors => "authors",
            Resource::Author => "author",
            Resource::Categories => "categories",
            Resource::Category => "category",
            Resource::Favorites => "favorites",
            Resource::ForumPosts => "forum_posts",
            Resource::ForumPost => "forum_post",
            Resource::ForumTags => "forum_tags",
            Resource::Bookmarks => "bookmarks",
            Resource::Notifications => "notifications",
            Resource::NotificationCounts => "notification_counts",
            Resource::Profile => "profile",
            Resource::AdminUsers => "admin_users",
            Resource::AdminReports => "admin_reports",
            Resource::Dashboard => "dashboard",
            Resource::Search => "search",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: Resource,
    params: Vec<(String, String)>,
}

impl QueryKey {
    /// A key with no parameters; as a prefix it matches the whole resource.
    pub fn prefix(resource: Resource) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    /// Appends the parameter only when a value is present.
    pub fn with_opt(self, name: &str, value: Option<impl fmt::Display>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.resource == prefix.resource
            && self.params.len() >= prefix.params.len()
            && self.params[..prefix.params.len()] == prefix.params[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource.as_str())?;
        for (name, value) in &self.params {
            write!(f, ":{name}={value}")?;
        }
        Ok(())
    }
}
