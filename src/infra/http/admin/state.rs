use std::sync::Arc;

use crate::application::admin::{
    AdminCatalogService, AdminDashboardService, AdminHymnService, AdminUserService,
};
use crate::application::forum::ForumService;
use crate::application::notifications::NotificationService;
use crate::application::reports::ReportService;
use crate::application::repos::HealthRepo;
use crate::application::session::SessionService;

#[derive(Clone)]
pub struct AdminState {
    pub sessions: Arc<SessionService>,
    pub dashboard: Arc<AdminDashboardService>,
    pub hymns: Arc<AdminHymnService>,
    pub catalog: Arc<AdminCatalogService>,
    pub users: Arc<AdminUserService>,
    pub notifications: Arc<NotificationService>,
    pub reports: Arc<ReportService>,
    pub forum: Arc<ForumService>,
    pub health: Arc<dyn HealthRepo>,
}
