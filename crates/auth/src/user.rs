//! User aggregate (event-sourced).
//!
//! The stream id is derived from the lowercased email, so creating a second
//! account for the same address collides on the event store's
//! create-if-absent append rather than on a separate lookup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

use crate::Role;
use crate::password::{
    PasswordHash, RESET_TOKEN_TTL_MINUTES, ResetToken, validate_password_strength,
};

// ─────────────────────────────────────────────────────────────────────────────
// Value types
// ─────────────────────────────────────────────────────────────────────────────

/// How the account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Email,
    Google,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingReset {
    token_digest: String,
    expires_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// User Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// User aggregate.
///
/// # Invariants
/// - `email` is lowercased and fixed at signup; the id is derived from it.
/// - At most one password reset is pending; issuing a new one replaces it.
/// - A reset token can be consumed once, before it expires.
#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    password: Option<PasswordHash>,
    auth_provider: AuthProvider,
    role: Role,
    image: Option<String>,
    pending_reset: Option<PendingReset>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl User {
    /// Stream type recorded with every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "auth.user";

    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            email: String::new(),
            password: None,
            auth_provider: AuthProvider::Email,
            role: Role::USER,
            image: None,
            pending_reset: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    /// Stream id for the account registered under `email`.
    pub fn id_for_email(email: &str) -> UserId {
        UserId::derived("user", &normalize_email(email))
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn auth_provider(&self) -> AuthProvider {
        self.auth_provider
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Accounts without a local password (OAuth) never verify.
    pub fn verify_password(&self, raw: &str) -> bool {
        self.password.as_ref().is_some_and(|hash| hash.verify(raw))
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural email check: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command: register a local (email + password) account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUp {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub password: PasswordHash,
    pub role: Role,
    pub image: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SignUp {
    /// Validate raw signup input and hash the password.
    ///
    /// Hashing draws a random salt, so it happens here rather than inside the
    /// (deterministic) aggregate.
    pub fn prepare(
        name: &str,
        email: &str,
        password: &str,
        role: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let missing = [("name", name), ("email", email), ("password", password), ("role", role)]
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k);
        if let Some(err) = DomainError::missing_fields(missing) {
            return Err(err);
        }

        if !is_valid_email(email) {
            return Err(DomainError::validation("Email is not valid"));
        }
        validate_password_strength(password)?;
        let role = Role::parse(role).ok_or_else(|| DomainError::validation("Invalid role"))?;

        let email = normalize_email(email);
        Ok(Self {
            user_id: User::id_for_email(&email),
            name: name.trim().to_string(),
            email,
            password: PasswordHash::hash(password)?,
            role,
            image: None,
            occurred_at,
        })
    }
}

/// Command: store the digest of a freshly generated reset token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuePasswordReset {
    pub user_id: UserId,
    pub token_digest: String,
    pub occurred_at: DateTime<Utc>,
}

impl IssuePasswordReset {
    pub fn for_token(token: &ResetToken, occurred_at: DateTime<Utc>) -> Self {
        Self {
            user_id: token.user_id(),
            token_digest: token.digest(),
            occurred_at,
        }
    }
}

/// Command: consume a reset token and set a new password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPassword {
    pub user_id: UserId,
    pub token_digest: String,
    pub new_password: PasswordHash,
    pub occurred_at: DateTime<Utc>,
}

impl ResetPassword {
    pub fn prepare(
        token: &ResetToken,
        new_password: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_password_strength(new_password)?;
        Ok(Self {
            user_id: token.user_id(),
            token_digest: token.digest(),
            new_password: PasswordHash::hash(new_password)?,
            occurred_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    SignUp(SignUp),
    IssuePasswordReset(IssuePasswordReset),
    ResetPassword(ResetPassword),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUp {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub password: PasswordHash,
    pub auth_provider: AuthProvider,
    pub role: Role,
    pub image: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetIssued {
    pub user_id: UserId,
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub user_id: UserId,
    pub password: PasswordHash,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    SignedUp(SignedUp),
    PasswordResetIssued(PasswordResetIssued),
    PasswordReset(PasswordReset),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::SignedUp(_) => "auth.user.signed_up",
            UserEvent::PasswordResetIssued(_) => "auth.user.password_reset_issued",
            UserEvent::PasswordReset(_) => "auth.user.password_reset",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::SignedUp(e) => e.occurred_at,
            UserEvent::PasswordResetIssued(e) => e.occurred_at,
            UserEvent::PasswordReset(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate impl
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::SignedUp(e) => {
                self.id = e.user_id;
                self.name = e.name.clone();
                self.email = e.email.clone();
                self.password = Some(e.password.clone());
                self.auth_provider = e.auth_provider;
                self.role = e.role.clone();
                self.image = e.image.clone();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            UserEvent::PasswordResetIssued(e) => {
                self.pending_reset = Some(PendingReset {
                    token_digest: e.token_digest.clone(),
                    expires_at: e.expires_at,
                });
            }
            UserEvent::PasswordReset(e) => {
                self.password = Some(e.password.clone());
                self.pending_reset = None;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::SignUp(cmd) => self.handle_sign_up(cmd),
            UserCommand::IssuePasswordReset(cmd) => self.handle_issue_reset(cmd),
            UserCommand::ResetPassword(cmd) => self.handle_reset(cmd),
        }
    }
}

impl User {
    fn ensure_user_id(&self, user_id: UserId) -> Result<(), DomainError> {
        if self.id != user_id {
            return Err(DomainError::invariant("user_id mismatch"));
        }
        Ok(())
    }

    fn handle_sign_up(&self, cmd: &SignUp) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::duplicate("Email already in use"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if !is_valid_email(&cmd.email) {
            return Err(DomainError::validation("Email is not valid"));
        }
        if cmd.user_id != User::id_for_email(&cmd.email) {
            return Err(DomainError::invariant("user id is not derived from email"));
        }
        self.ensure_user_id(cmd.user_id)?;

        Ok(vec![UserEvent::SignedUp(SignedUp {
            user_id: cmd.user_id,
            name: cmd.name.clone(),
            email: normalize_email(&cmd.email),
            password: cmd.password.clone(),
            auth_provider: AuthProvider::Email,
            role: cmd.role.clone(),
            image: cmd.image.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue_reset(&self, cmd: &IssuePasswordReset) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("user"));
        }
        self.ensure_user_id(cmd.user_id)?;
        if self.auth_provider != AuthProvider::Email {
            return Err(DomainError::validation("account has no local password"));
        }

        Ok(vec![UserEvent::PasswordResetIssued(PasswordResetIssued {
            user_id: cmd.user_id,
            token_digest: cmd.token_digest.clone(),
            expires_at: cmd.occurred_at + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reset(&self, cmd: &ResetPassword) -> Result<Vec<UserEvent>, DomainError> {
        let invalid = || DomainError::validation("Reset token is invalid or has expired");

        if !self.created {
            return Err(invalid());
        }
        self.ensure_user_id(cmd.user_id)?;

        let pending = self.pending_reset.as_ref().ok_or_else(invalid)?;
        if pending.token_digest != cmd.token_digest {
            return Err(invalid());
        }
        if cmd.occurred_at >= pending.expires_at {
            return Err(invalid());
        }

        Ok(vec![UserEvent::PasswordReset(PasswordReset {
            user_id: cmd.user_id,
            password: cmd.new_password.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn signed_up(email: &str) -> User {
        let cmd = SignUp::prepare("Ada", email, "Str0ng!pass", "user", Utc::now()).unwrap();
        let mut user = User::empty(cmd.user_id);
        execute(&mut user, &UserCommand::SignUp(cmd)).unwrap();
        user
    }

    #[test]
    fn signup_lowercases_email_and_derives_the_id() {
        let user = signed_up("Ada@Example.COM");
        assert_eq!(user.email(), "ada@example.com");
        assert_eq!(*user.id(), User::id_for_email("ada@example.com"));
        assert!(user.verify_password("Str0ng!pass"));
        assert!(!user.verify_password("wrong"));
    }

    #[test]
    fn signup_reports_all_missing_fields() {
        let err = SignUp::prepare("", "", "Str0ng!pass", "", Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::MissingFields(vec!["name".into(), "email".into(), "role".into()])
        );
    }

    #[test]
    fn signup_validates_email_password_and_role() {
        let now = Utc::now();
        assert!(SignUp::prepare("A", "not-an-email", "Str0ng!pass", "user", now).is_err());
        assert!(SignUp::prepare("A", "a@b.co", "weak", "user", now).is_err());
        let err = SignUp::prepare("A", "a@b.co", "Str0ng!pass", "root", now).unwrap_err();
        assert_eq!(err, DomainError::validation("Invalid role"));
    }

    #[test]
    fn second_signup_on_same_stream_is_a_duplicate() {
        let user = signed_up("ada@example.com");
        let again = SignUp::prepare("Ada", "ADA@example.com", "Str0ng!pass", "user", Utc::now()).unwrap();

        let err = user.handle(&UserCommand::SignUp(again)).unwrap_err();
        assert_eq!(err, DomainError::duplicate("Email already in use"));
    }

    #[test]
    fn reset_flow_replaces_the_password_once() {
        let mut user = signed_up("ada@example.com");
        let now = Utc::now();
        let token = ResetToken::generate(*user.id());

        execute(
            &mut user,
            &UserCommand::IssuePasswordReset(IssuePasswordReset::for_token(&token, now)),
        )
        .unwrap();

        let reset = ResetPassword::prepare(&token, "N3w!password", now + Duration::minutes(5)).unwrap();
        execute(&mut user, &UserCommand::ResetPassword(reset.clone())).unwrap();

        assert!(user.verify_password("N3w!password"));
        assert!(!user.verify_password("Str0ng!pass"));

        // Token is consumed.
        assert!(user.handle(&UserCommand::ResetPassword(reset)).is_err());
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let mut user = signed_up("ada@example.com");
        let now = Utc::now();
        let token = ResetToken::generate(*user.id());
        execute(
            &mut user,
            &UserCommand::IssuePasswordReset(IssuePasswordReset::for_token(&token, now)),
        )
        .unwrap();

        let late = ResetPassword::prepare(&token, "N3w!password", now + Duration::minutes(31)).unwrap();
        assert!(user.handle(&UserCommand::ResetPassword(late)).is_err());

        let other = ResetToken::generate(*user.id());
        let wrong = ResetPassword::prepare(&other, "N3w!password", now).unwrap();
        assert!(user.handle(&UserCommand::ResetPassword(wrong)).is_err());
    }
}
