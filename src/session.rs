// src/session.rs
// 会话与角色路由: 登录前只能注册/登录, 登录后按角色固定一个工作流
use log::{info, warn};
use thiserror::Error;
use crate::imaging::ImageWorkflow;
use crate::signals::SignalWorkflow;
use crate::store::{AnalysisLog, AuthenticatedUser, CredentialStore, History, StoreError};
use crate::types::{Role, UserId};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("please log in first")]
    NotAuthenticated,
    #[error("already logged in as {0}")]
    AlreadyAuthenticated(String),
    #[error("this operation is not available for the {0} role")]
    WrongRole(Role),
    #[error("username and password are required")]
    EmptyCredentials,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

// 登录时按角色选定, 会话内不再变化
pub enum Workflow {
    Image(ImageWorkflow),
    Signal(SignalWorkflow),
}

impl Workflow {
    fn for_user(user: &AuthenticatedUser, log: AnalysisLog) -> Self {
        match user.role {
            Role::ImageExpert => Workflow::Image(ImageWorkflow::new(log, user.id)),
            Role::SignalExpert => Workflow::Signal(SignalWorkflow::new(log, user.id)),
        }
    }
}

enum State {
    Unauthenticated,
    Authenticated {
        user: AuthenticatedUser,
        workflow: Workflow,
    },
}

/// Unauthenticated until the first successful login, then fixed to that user
/// and role for the rest of the process. There is no logout.
pub struct Session {
    credentials: CredentialStore,
    log: AnalysisLog,
    state: State,
}

impl Session {
    pub fn new(credentials: CredentialStore, log: AnalysisLog) -> Self {
        Self {
            credentials,
            log,
            state: State::Unauthenticated,
        }
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match &self.state {
            State::Unauthenticated => None,
            State::Authenticated { user, .. } => Some(user),
        }
    }

    pub fn register(&self, username: &str, password: &str, role: Role) -> Result<UserId, SessionError> {
        self.ensure_unauthenticated()?;
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::EmptyCredentials);
        }
        Ok(self.credentials.register(username, password, role)?)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<&AuthenticatedUser, SessionError> {
        self.ensure_unauthenticated()?;
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::EmptyCredentials);
        }
        let Some(user) = self.credentials.authenticate(username, password)? else {
            warn!("failed login attempt for `{username}`");
            return Err(SessionError::InvalidCredentials);
        };
        info!("`{}` logged in as {}", user.username, user.role);
        let workflow = Workflow::for_user(&user, self.log.clone());
        self.state = State::Authenticated { user, workflow };
        self.user().ok_or(SessionError::NotAuthenticated)
    }

    pub fn image_workflow(&mut self) -> Result<&mut ImageWorkflow, SessionError> {
        match &mut self.state {
            State::Unauthenticated => Err(SessionError::NotAuthenticated),
            State::Authenticated { workflow: Workflow::Image(wf), .. } => Ok(wf),
            State::Authenticated { user, .. } => Err(SessionError::WrongRole(user.role)),
        }
    }

    pub fn signal_workflow(&mut self) -> Result<&mut SignalWorkflow, SessionError> {
        match &mut self.state {
            State::Unauthenticated => Err(SessionError::NotAuthenticated),
            State::Authenticated { workflow: Workflow::Signal(wf), .. } => Ok(wf),
            State::Authenticated { user, .. } => Err(SessionError::WrongRole(user.role)),
        }
    }

    /// The logged-in user's records, newest first.
    pub fn history(&self) -> Result<History, SessionError> {
        let user = self.user().ok_or(SessionError::NotAuthenticated)?;
        Ok(self.log.history(user.id)?)
    }

    fn ensure_unauthenticated(&self) -> Result<(), SessionError> {
        match self.user() {
            Some(user) => Err(SessionError::AlreadyAuthenticated(user.username.clone())),
            None => Ok(()),
        }
    }
}
