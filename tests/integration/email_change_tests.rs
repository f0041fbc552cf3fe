use authgate_common::UpdateProfileRequest;
use authgate_lib::error::{AppError, StoreError};
use authgate_lib::auth::VerificationTokenStore;
use authgate_lib::users::UserStore;

use crate::test_utils::{seed_user, setup_test_env, MailKind, SEEDED_EMAIL, SEEDED_PASSWORD};

fn change_email(to: &str) -> UpdateProfileRequest {
    UpdateProfileRequest {
        email: Some(to.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_email_change_commits_only_after_redemption() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    let response = auth
        .update_profile(
            env.seeded.id,
            UpdateProfileRequest {
                name: Some("Johnny".to_string()),
                email: Some("  John.New@Example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(response.email_change_pending);
    assert_eq!(response.user.email, SEEDED_EMAIL);
    assert_eq!(response.user.name, "Johnny");
    assert!(!response.user.is_verified);

    // Nothing is bound to the new address yet
    assert_eq!(
        env.users.get_by_email("john.new@example.com").await,
        Err(StoreError::NotFound)
    );
    let staged = env.users.get_by_id(env.seeded.id).await.unwrap();
    assert_eq!(staged.email, SEEDED_EMAIL);
    assert!(!staged.is_verified);

    // The link went to the new mailbox
    let mail = env
        .mailer
        .sent()
        .into_iter()
        .find(|m| m.kind == MailKind::EmailChange)
        .unwrap();
    assert_eq!(mail.to, "john.new@example.com");

    auth.verify_email_change(&mail.token).await.unwrap();

    let committed = env.users.get_by_email("john.new@example.com").await.unwrap();
    assert_eq!(committed.id, env.seeded.id);
    assert!(committed.is_verified);
    assert_eq!(
        env.users.get_by_email(SEEDED_EMAIL).await,
        Err(StoreError::NotFound)
    );

    assert!(matches!(
        auth.verify_email_change(&mail.token).await,
        Err(AppError::InvalidToken)
    ));
    auth.sign_in("john.new@example.com", SEEDED_PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_email_change_to_taken_address_conflicts() {
    let env = setup_test_env().await;
    seed_user(&env.users, "taken@example.com", "password123", false).await;

    let err = env
        .state
        .auth
        .update_profile(env.seeded.id, change_email("taken@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::EmailExists));
    let user = env.users.get_by_id(env.seeded.id).await.unwrap();
    assert!(user.is_verified);
    assert!(env.tokens.is_empty());
}

#[tokio::test]
async fn test_address_taken_before_redemption_keeps_token() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;
    auth.update_profile(env.seeded.id, change_email("moved@example.com"))
        .await
        .unwrap();
    let token = env.mailer.last_token(MailKind::EmailChange).unwrap();

    seed_user(&env.users, "moved@example.com", "password123", true).await;

    let err = auth.verify_email_change(&token).await.unwrap_err();
    assert!(matches!(err, AppError::EmailExists));
    assert!(env.tokens.find_valid(&token).await.is_ok());
    let user = env.users.get_by_id(env.seeded.id).await.unwrap();
    assert_eq!(user.email, SEEDED_EMAIL);
    assert!(!user.is_verified);
}

#[tokio::test]
async fn test_same_email_is_not_a_change() {
    let env = setup_test_env().await;

    let response = env
        .state
        .auth
        .update_profile(env.seeded.id, change_email("JOHN@example.com"))
        .await
        .unwrap();

    assert!(!response.email_change_pending);
    assert!(response.user.is_verified);
    assert!(env.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_profile_update_validates_fields() {
    let env = setup_test_env().await;
    let auth = &env.state.auth;

    let err = auth
        .update_profile(env.seeded.id, change_email("not-an-email"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth
        .update_profile(
            env.seeded.id,
            UpdateProfileRequest {
                phone: Some("call me maybe".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let updated = auth
        .update_profile(
            env.seeded.id,
            UpdateProfileRequest {
                phone: Some("+1 555 0100".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.user.phone.as_deref(), Some("+1 555 0100"));
    assert_eq!(updated.user.name, "John");
}

#[tokio::test]
async fn test_profile_update_for_missing_user() {
    let env = setup_test_env().await;
    assert!(matches!(
        env.state
            .auth
            .update_profile(uuid::Uuid::new_v4(), UpdateProfileRequest::default())
            .await,
        Err(AppError::UserNotFound)
    ));
}
