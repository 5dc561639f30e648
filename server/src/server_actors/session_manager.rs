use crate::messages::internal_messages::{
    Authenticate, IssueTokens, RefreshAccess, RevokeTokens, RevokeUser, Session, TokenPair,
};
use actix::prelude::*;
use actix::SpawnHandle;
use colored::Color;
use common::logger::Logger;
use common::utils::generate_session_token;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

struct TokenEntry {
    session: Session,
    kind: TokenKind,
    timer: SpawnHandle,
}

/// Keeps the live access and refresh tokens.
///
/// Every token owns a timer; when it fires the token is forgotten. Revoking a
/// token cancels its timer.
///
/// # Responsibilities
/// - Issues access/refresh pairs on login.
/// - Resolves bearer tokens to the session they belong to.
/// - Mints new access tokens from a live refresh token.
/// - Revokes single tokens on logout and every token of a deleted user.
pub struct SessionManager {
    /// Live tokens, both kinds.
    tokens: HashMap<String, TokenEntry>,
    /// Lifetime of access tokens.
    access_ttl: Duration,
    /// Lifetime of refresh tokens.
    refresh_ttl: Duration,
    /// Logger for session events.
    logger: Logger,
}

impl SessionManager {
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            tokens: HashMap::new(),
            access_ttl,
            refresh_ttl,
            logger: Logger::new("Sessions", Color::Magenta),
        }
    }

    fn issue(&mut self, session: Session, kind: TokenKind, ctx: &mut Context<Self>) -> String {
        let token = generate_session_token();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expiring = token.clone();
        let timer = ctx.run_later(ttl, move |act, _ctx| {
            if act.tokens.remove(&expiring).is_some() {
                act.logger
                    .debug(format!("{kind:?} token for user #{} expired", session.user_id));
            }
        });
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                session,
                kind,
                timer,
            },
        );
        token
    }

    /// Forgets a token and cancels its expiry timer.
    fn revoke(&mut self, token: &str, ctx: &mut Context<Self>) {
        if let Some(entry) = self.tokens.remove(token) {
            ctx.cancel_future(entry.timer);
        }
    }

    fn lookup(&self, token: &str, kind: TokenKind) -> Option<Session> {
        self.tokens
            .get(token)
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.session)
    }
}

impl Actor for SessionManager {
    type Context = Context<Self>;
}

/// Opens a session: one access and one refresh token.
impl Handler<IssueTokens> for SessionManager {
    type Result = MessageResult<IssueTokens>;

    fn handle(&mut self, msg: IssueTokens, ctx: &mut Self::Context) -> Self::Result {
        let access_token = self.issue(msg.session, TokenKind::Access, ctx);
        let refresh_token = self.issue(msg.session, TokenKind::Refresh, ctx);
        self.logger
            .info(format!("Session opened for user #{}", msg.session.user_id));
        MessageResult(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

/// Resolves an access token. Refresh tokens are not accepted here.
impl Handler<Authenticate> for SessionManager {
    type Result = Option<Session>;

    fn handle(&mut self, msg: Authenticate, _ctx: &mut Self::Context) -> Self::Result {
        self.lookup(&msg.access_token, TokenKind::Access)
    }
}

/// Issues a new access token. The refresh token stays valid until it expires.
impl Handler<RefreshAccess> for SessionManager {
    type Result = Option<String>;

    fn handle(&mut self, msg: RefreshAccess, ctx: &mut Self::Context) -> Self::Result {
        let session = self.lookup(&msg.refresh_token, TokenKind::Refresh)?;
        self.logger
            .debug(format!("Access token refreshed for user #{}", session.user_id));
        Some(self.issue(session, TokenKind::Access, ctx))
    }
}

impl Handler<RevokeTokens> for SessionManager {
    type Result = ();

    fn handle(&mut self, msg: RevokeTokens, ctx: &mut Self::Context) -> Self::Result {
        for token in [msg.access_token, msg.refresh_token].into_iter().flatten() {
            self.revoke(&token, ctx);
        }
    }
}

/// Revokes every token of a user and returns how many were dropped.
impl Handler<RevokeUser> for SessionManager {
    type Result = usize;

    fn handle(&mut self, msg: RevokeUser, ctx: &mut Self::Context) -> Self::Result {
        let owned: Vec<String> = self
            .tokens
            .iter()
            .filter(|(_, entry)| entry.session.user_id == msg.user_id)
            .map(|(token, _)| token.clone())
            .collect();
        for token in &owned {
            self.revoke(token, ctx);
        }
        if !owned.is_empty() {
            self.logger.info(format!(
                "Revoked {} tokens for user #{}",
                owned.len(),
                msg.user_id
            ));
        }
        owned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::user::UserRole;
    use ntest::timeout;

    const SESSION: Session = Session {
        user_id: 7,
        role: UserRole::Customer,
    };

    #[actix_rt::test]
    async fn issued_access_tokens_authenticate() {
        let sessions =
            SessionManager::new(Duration::from_secs(60), Duration::from_secs(600)).start();
        let pair = sessions.send(IssueTokens { session: SESSION }).await.unwrap();

        let found = sessions
            .send(Authenticate {
                access_token: pair.access_token.clone(),
            })
            .await
            .unwrap();
        assert_eq!(found, Some(SESSION));

        // A refresh token is not an access token.
        let wrong_kind = sessions
            .send(Authenticate {
                access_token: pair.refresh_token,
            })
            .await
            .unwrap();
        assert_eq!(wrong_kind, None);
    }

    #[actix_rt::test]
    async fn refresh_issues_a_new_access_token() {
        let sessions =
            SessionManager::new(Duration::from_secs(60), Duration::from_secs(600)).start();
        let pair = sessions.send(IssueTokens { session: SESSION }).await.unwrap();

        let fresh = sessions
            .send(RefreshAccess {
                refresh_token: pair.refresh_token,
            })
            .await
            .unwrap()
            .unwrap();
        assert_ne!(fresh, pair.access_token);

        let unknown = sessions
            .send(RefreshAccess {
                refresh_token: "nope".into(),
            })
            .await
            .unwrap();
        assert!(unknown.is_none());
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn tokens_expire_after_their_ttl() {
        let sessions =
            SessionManager::new(Duration::from_millis(50), Duration::from_secs(600)).start();
        let pair = sessions.send(IssueTokens { session: SESSION }).await.unwrap();

        actix_rt::time::sleep(Duration::from_millis(150)).await;

        let expired = sessions
            .send(Authenticate {
                access_token: pair.access_token,
            })
            .await
            .unwrap();
        assert_eq!(expired, None);
        assert!(
            sessions
                .send(RefreshAccess {
                    refresh_token: pair.refresh_token,
                })
                .await
                .unwrap()
                .is_some()
        );
    }

    #[actix_rt::test]
    async fn revoking_forgets_tokens() {
        let sessions =
            SessionManager::new(Duration::from_secs(60), Duration::from_secs(600)).start();
        let first = sessions.send(IssueTokens { session: SESSION }).await.unwrap();
        let second = sessions.send(IssueTokens { session: SESSION }).await.unwrap();

        sessions
            .send(RevokeTokens {
                access_token: Some(first.access_token.clone()),
                refresh_token: Some(first.refresh_token),
            })
            .await
            .unwrap();
        let gone = sessions
            .send(Authenticate {
                access_token: first.access_token,
            })
            .await
            .unwrap();
        assert_eq!(gone, None);

        let revoked = sessions.send(RevokeUser { user_id: 7 }).await.unwrap();
        assert_eq!(revoked, 2);
        let gone = sessions
            .send(Authenticate {
                access_token: second.access_token,
            })
            .await
            .unwrap();
        assert_eq!(gone, None);
    }
}
