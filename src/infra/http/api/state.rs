use std::sync::Arc;

use crate::application::catalog::CatalogService;
use crate::application::favorites::FavoritesService;
use crate::application::forum::ForumService;
use crate::application::hymns::HymnService;
use crate::application::notifications::NotificationService;
use crate::application::profile::ProfileService;
use crate::application::reports::ReportService;
use crate::application::repos::HealthRepo;
use crate::application::session::SessionService;
use crate::presentation::SiteIdentity;

#[derive(Clone)]
pub struct ApiState {
    pub site: SiteIdentity,
    pub sessions: Arc<SessionService>,
    pub hymns: Arc<HymnService>,
    pub catalog: Arc<CatalogService>,
    pub favorites: Arc<FavoritesService>,
    pub forum: Arc<ForumService>,
    pub notifications: Arc<NotificationService>,
    pub profile: Arc<ProfileService>,
    pub reports: Arc<ReportService>,
    pub health: Arc<dyn HealthRepo>,
}
