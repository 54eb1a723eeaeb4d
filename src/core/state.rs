use std::sync::Arc;

use crate::api::client::{HttpQuizApi, QuizApi};
use crate::core::config::Settings;
use crate::schemas::user::CurrentUser;
use crate::services::attempt_session::SessionContext;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    api: Arc<dyn QuizApi>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, api: Arc<dyn QuizApi>) -> Self {
        Self { inner: Arc::new(InnerState { settings, api }) }
    }

    pub(crate) fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let api = HttpQuizApi::from_settings(&settings)?;
        Ok(Self::new(settings, Arc::new(api)))
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn api(&self) -> Arc<dyn QuizApi> {
        self.inner.api.clone()
    }

    /// A fresh context per attempt; each one carries its own liveness flag.
    pub(crate) fn session_context(&self) -> anyhow::Result<SessionContext> {
        let user = self.settings().user();
        let user_id = user
            .user_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("KAMBAZ_USER_ID is required to take or review a quiz"))?;
        Ok(SessionContext::new(CurrentUser::new(user_id, user.role), user.course_id.clone()))
    }
}
