use authgate_common::{SignUpRequest, UpdateProfileRequest};
use authgate_lib::auth::{PresentedCredential, TokenType, VerificationToken, VerificationTokenStore};
use authgate_lib::error::AppError;
use authgate_lib::users::UserStore;
use chrono::{Duration, Utc};

use crate::test_utils::{seed_user, setup_test_env, MailKind, SEEDED_EMAIL, SEEDED_PASSWORD};

fn signup(email: &str) -> SignUpRequest {
    SignUpRequest {
        email: email.to_string(),
        password: "password123".to_string(),
        confirm_password: "password123".to_string(),
        name: Some("New User".to_string()),
    }
}

#[tokio::test]
async fn test_sign_in_seeded_user_creates_valid_session() {
    let env = setup_test_env().await;

    let signed_in = env
        .state
        .auth
        .sign_in(SEEDED_EMAIL, SEEDED_PASSWORD)
        .await
        .unwrap();

    assert!(!signed_in.token.is_empty());
    assert!(!signed_in.session_id.is_empty());
    assert_eq!(signed_in.user.email, SEEDED_EMAIL);

    // The credential embeds exactly the session that was stored
    let claims = env.state.codec.validate(&signed_in.token).unwrap();
    assert_eq!(claims.session_id, signed_in.session_id);
    assert_eq!(claims.user_id, env.seeded.id);
    assert_eq!(claims.exp, signed_in.expires_at);
    assert!(env
        .state
        .sessions
        .validate(env.seeded.id, &signed_in.session_id, &signed_in.token)
        .await
        .unwrap());

    let sessions = env.state.sessions.list(env.seeded.id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, signed_in.session_id);
}

#[tokio::test]
async fn test_sign_in_normalizes_email() {
    let env = setup_test_env().await;
    let signed_in = env
        .state
        .auth
        .sign_in("  JOHN@Example.com ", SEEDED_PASSWORD)
        .await
        .unwrap();
    assert_eq!(signed_in.user.id, env.seeded.id);
}

#[tokio::test]
async fn test_concurrent_sign_ins_get_independent_sessions() {
    let env = setup_test_env().await;
    let auth = env.state.auth.clone();

    let (a, b) = tokio::join!(
        auth.sign_in(SEEDED_EMAIL, SEEDED_PASSWORD),
        auth.sign_in(SEEDED_EMAIL, SEEDED_PASSWORD)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.session_id, b.session_id);
    let sessions = &env.state.sessions;
    assert!(sessions.validate(env.seeded.id, &a.session_id, &a.token).await.unwrap());
    assert!(sessions.validate(env.seeded.id, &b.session_id, &b.token).await.unwrap());
    // Tokens are bound to their own session only
    assert!(!sessions.validate(env.seeded.id, &a.session_id, &b.token).await.unwrap());
}

#[tokio::test]
async fn test_sign_in_failures() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    assert!(matches!(
        auth.sign_in(SEEDED_EMAIL, "wrong-password").await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(matches!(
        auth.sign_in("nobody@example.com", SEEDED_PASSWORD).await,
        Err(AppError::UserNotFound)
    ));

    // Unverified accounts look exactly like missing ones
    seed_user(&env.users, "pending@example.com", "password123", false).await;
    assert!(matches!(
        auth.sign_in("pending@example.com", "password123").await,
        Err(AppError::UserNotFound)
    ));
    assert!(env.state.sessions.list(env.seeded.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;
    let signed_in = auth.sign_in(SEEDED_EMAIL, SEEDED_PASSWORD).await.unwrap();
    let presented = PresentedCredential {
        token: Some(&signed_in.token),
        expires_at: Some(signed_in.expires_at),
    };

    auth.logout(env.seeded.id, &signed_in.session_id, presented)
        .await
        .unwrap();
    assert!(!env
        .state
        .sessions
        .validate(env.seeded.id, &signed_in.session_id, &signed_in.token)
        .await
        .unwrap());

    // Second logout of the same session succeeds
    auth.logout(env.seeded.id, &signed_in.session_id, presented)
        .await
        .unwrap();
    auth.logout(env.seeded.id, &signed_in.session_id, PresentedCredential::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_logout_revokes_presented_token() {
    let env = setup_test_env().await;
    let signed_in = env
        .state
        .auth
        .sign_in(SEEDED_EMAIL, SEEDED_PASSWORD)
        .await
        .unwrap();

    env.state
        .auth
        .logout(
            env.seeded.id,
            &signed_in.session_id,
            PresentedCredential {
                token: Some(&signed_in.token),
                expires_at: Some(signed_in.expires_at),
            },
        )
        .await
        .unwrap();

    let hash = authgate_lib::auth::hash_token(&signed_in.token);
    assert!(env.state.revocations.is_revoked(&hash).await.unwrap());
}

#[tokio::test]
async fn test_logout_all_ends_every_session() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;
    let a = auth.sign_in(SEEDED_EMAIL, SEEDED_PASSWORD).await.unwrap();
    let b = auth.sign_in(SEEDED_EMAIL, SEEDED_PASSWORD).await.unwrap();

    let listed = auth.list_sessions(env.seeded.id, &a.session_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed.iter().filter(|s| s.current).count(), 1);

    let ended = auth
        .logout_all(
            env.seeded.id,
            PresentedCredential {
                token: Some(&a.token),
                expires_at: Some(a.expires_at),
            },
        )
        .await
        .unwrap();
    assert_eq!(ended, 2);

    let sessions = &env.state.sessions;
    assert!(!sessions.validate(env.seeded.id, &a.session_id, &a.token).await.unwrap());
    assert!(!sessions.validate(env.seeded.id, &b.session_id, &b.token).await.unwrap());
    assert!(auth.list_sessions(env.seeded.id, "").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sign_up_rejects_existing_unverified_email() {
    let env = setup_test_env().await;
    seed_user(&env.users, "dup@example.com", "password123", false).await;
    let before = env.users.count().await;

    let err = env
        .state
        .auth
        .sign_up(signup("dup@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::EmailExists));
    assert_eq!(err.to_string(), "email already exists");
    assert_eq!(env.users.count().await, before);
    assert!(env.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_sign_up_verify_then_sign_in() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    let created = auth.sign_up(signup("New@Example.com")).await.unwrap();
    assert_eq!(created.email, "new@example.com");
    assert!(!created.is_verified);

    let mails = env.mailer.sent();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "new@example.com");
    let token = env.mailer.last_token(MailKind::Verification).unwrap();
    assert_eq!(token.len(), 64);

    auth.verify_email(&token).await.unwrap();
    assert!(env.users.get_by_id(created.id).await.unwrap().is_verified);

    // Tokens are single-use
    let err = auth.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));
    assert_eq!(err.to_string(), "invalid or expired token");

    let signed_in = auth.sign_in("new@example.com", "password123").await.unwrap();
    assert_eq!(signed_in.user.id, created.id);
}

#[tokio::test]
async fn test_password_reset_redeems_once() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    auth.forgot_password(SEEDED_EMAIL).await.unwrap();
    let token = env.mailer.last_token(MailKind::PasswordReset).unwrap();

    auth.reset_password(&token, "new-password-1", "new-password-1")
        .await
        .unwrap();

    assert!(matches!(
        auth.sign_in(SEEDED_EMAIL, SEEDED_PASSWORD).await,
        Err(AppError::InvalidCredentials)
    ));
    auth.sign_in(SEEDED_EMAIL, "new-password-1").await.unwrap();

    let err = auth
        .reset_password(&token, "another-pass-2", "another-pass-2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidResetToken));
    assert_eq!(err.to_string(), "invalid or expired reset token");
}

#[tokio::test]
async fn test_reset_validates_password_before_token_lookup() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    let err = auth
        .reset_password("does-not-exist", "short", "short")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth
        .reset_password("does-not-exist", "password123", "password124")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "passwords do not match");
}

#[tokio::test]
async fn test_tokens_are_isolated_by_type() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    auth.sign_up(signup("typed@example.com")).await.unwrap();
    let verification = env.mailer.last_token(MailKind::Verification).unwrap();

    assert!(matches!(
        auth.reset_password(&verification, "password999", "password999").await,
        Err(AppError::InvalidTokenType)
    ));
    assert!(matches!(
        auth.verify_email_change(&verification).await,
        Err(AppError::InvalidTokenType)
    ));

    auth.forgot_password(SEEDED_EMAIL).await.unwrap();
    let reset = env.mailer.last_token(MailKind::PasswordReset).unwrap();
    let err = auth.verify_email(&reset).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTokenType));
    assert_eq!(err.to_string(), "invalid token type");

    auth.update_profile(
        env.seeded.id,
        UpdateProfileRequest {
            email: Some("moved@example.com".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let change = env.mailer.last_token(MailKind::EmailChange).unwrap();
    assert!(matches!(
        auth.verify_email(&change).await,
        Err(AppError::InvalidTokenType)
    ));
    assert!(matches!(
        auth.reset_password(&change, "password999", "password999").await,
        Err(AppError::InvalidTokenType)
    ));

    // Rejected attempts do not consume the token
    auth.verify_email(&verification).await.unwrap();
    auth.reset_password(&reset, "password999", "password999")
        .await
        .unwrap();
    auth.verify_email_change(&change).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_of_one_token_succeed_once() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;
    auth.forgot_password(SEEDED_EMAIL).await.unwrap();
    let reset = env.mailer.last_token(MailKind::PasswordReset).unwrap();

    let (first, second) = tokio::join!(
        auth.reset_password(&reset, "password777", "password777"),
        auth.reset_password(&reset, "password888", "password888"),
    );

    let (winner, loser) = match (first, second) {
        (Ok(()), Err(e)) => ("password777", e),
        (Err(e), Ok(())) => ("password888", e),
        (a, b) => panic!("expected exactly one redemption, got {a:?} and {b:?}"),
    };
    assert!(matches!(loser, AppError::InvalidResetToken));
    assert!(env.tokens.tokens_for(env.seeded.id).is_empty());
    auth.sign_in(SEEDED_EMAIL, winner).await.unwrap();
}

#[tokio::test]
async fn test_expired_reset_token_is_rejected_and_kept() {
    let env = setup_test_env().await;
    let expired = VerificationToken {
        token: "expired-token".to_string(),
        expires_at: Utc::now() - Duration::minutes(61),
        ..VerificationToken::issue(env.seeded.id, TokenType::PasswordReset, None)
    };
    env.tokens.create(&expired).await.unwrap();

    let err = env
        .state
        .auth
        .reset_password("expired-token", "password456", "password456")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidResetToken));
    assert_eq!(err.to_string(), "invalid or expired reset token");
    let remaining = env.tokens.tokens_for(env.seeded.id);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].token, "expired-token");
}

#[tokio::test]
async fn test_forgot_password_for_unknown_email_is_silent() {
    let env = setup_test_env().await;

    env.state
        .auth
        .forgot_password("nobody@example.com")
        .await
        .unwrap();

    assert!(env.tokens.is_empty());
    assert!(env.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_forgot_password_for_unverified_account_is_silent() {
    let env = setup_test_env().await;
    let pending = seed_user(&env.users, "pending@example.com", "password123", false).await;

    env.state
        .auth
        .forgot_password("pending@example.com")
        .await
        .unwrap();

    assert!(env.tokens.tokens_for(pending.id).is_empty());
    assert!(env.mailer.last_token(MailKind::PasswordReset).is_none());
}

#[tokio::test]
async fn test_forgot_password_keeps_one_live_token() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    auth.forgot_password(SEEDED_EMAIL).await.unwrap();
    let first = env.mailer.last_token(MailKind::PasswordReset).unwrap();
    auth.forgot_password(SEEDED_EMAIL).await.unwrap();
    let second = env.mailer.last_token(MailKind::PasswordReset).unwrap();

    assert_ne!(first, second);
    assert_eq!(env.tokens.tokens_for(env.seeded.id).len(), 1);
    assert!(matches!(
        auth.reset_password(&first, "password456", "password456").await,
        Err(AppError::InvalidResetToken)
    ));
    auth.reset_password(&second, "password456", "password456")
        .await
        .unwrap();
}
