use std::sync::Arc;

use warden_auth::{
    AuthError, CLIENT_ROLE, DEV_IDENTITY_STUB_AVAILABLE, DevelopmentStubClient, FederatedIdentity,
    NewUser, Principal, TokenIssuer, UserDirectory, find_or_create_federated_user, hash_password,
    is_legacy_secret, select_identity_provider, verify_password,
};
use warden_core::DeploymentMode;
use warden_infra::{InMemoryDirectory, migrate_legacy_secrets, seed_default_rbac};

fn seeded() -> Arc<InMemoryDirectory> {
    let dir = InMemoryDirectory::new();
    seed_default_rbac(&dir).unwrap();
    Arc::new(dir)
}

async fn client_user(dir: &InMemoryDirectory, username: &str, secret: &str) -> Principal {
    let role = dir.get_role_by_name(CLIENT_ROLE).await.unwrap().unwrap();
    let record = dir
        .create_user(NewUser {
            username: username.to_string(),
            secret: secret.to_string(),
            role_id: role.id,
            email: None,
            display_name: None,
            avatar_url: None,
            external_id: None,
        })
        .await
        .unwrap();
    Principal::from(&record)
}

fn identity(email: &str) -> FederatedIdentity {
    FederatedIdentity {
        external_id: "ext-123".to_string(),
        email: email.to_string(),
        display_name: Some("Grace".to_string()),
        avatar_url: None,
        synthetic: false,
    }
}

#[tokio::test]
async fn rotation_reflects_live_record() {
    let dir = seeded();
    let principal = client_user(&dir, "client", &hash_password("pw123456").unwrap()).await;
    let issuer = TokenIssuer::new(b"a", b"r");
    let pair = issuer.issue_pair(&principal).unwrap();

    let (rotated, rotated_principal) = issuer.rotate(&pair.refresh_token, dir.as_ref()).await.unwrap();
    assert_eq!(rotated_principal, principal);
    assert_ne!(rotated.access_token, pair.access_token);
    assert!(issuer.verify_access(&rotated.access_token).is_ok());

    dir.set_active(principal.id, false).unwrap();
    assert_eq!(
        issuer.rotate(&pair.refresh_token, dir.as_ref()).await,
        Err(AuthError::UserInactive)
    );

    dir.remove_user(principal.id).unwrap();
    assert_eq!(
        issuer.rotate(&pair.refresh_token, dir.as_ref()).await,
        Err(AuthError::InvalidRefreshToken)
    );
}

#[tokio::test]
async fn rotation_picks_up_role_change() {
    let dir = seeded();
    let principal = client_user(&dir, "client", "x").await;
    let admin = dir.get_role_by_name("admin").await.unwrap().unwrap();
    let issuer = TokenIssuer::new(b"a", b"r");
    let pair = issuer.issue_pair(&principal).unwrap();

    dir.set_role(principal.id, admin.id).unwrap();
    let (rotated, now_principal) = issuer.rotate(&pair.refresh_token, dir.as_ref()).await.unwrap();
    assert_eq!(now_principal.role_id, admin.id);
    let claims = issuer.verify_access(&rotated.access_token).unwrap();
    assert_eq!(claims.role_id, Some(admin.id));
}

#[tokio::test]
async fn federated_user_is_created_once_with_client_role() {
    let dir = seeded();
    let client = dir.get_role_by_name(CLIENT_ROLE).await.unwrap().unwrap();

    let first = find_or_create_federated_user(dir.as_ref(), &identity("Grace@Example.com"))
        .await
        .unwrap();
    assert_eq!(first.role_id, client.id);
    assert_eq!(first.username, "grace");
    assert_eq!(first.email.as_deref(), Some("grace@example.com"));
    assert!(!is_legacy_secret(&first.secret));

    let again = find_or_create_federated_user(dir.as_ref(), &identity("grace@example.com"))
        .await
        .unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(dir.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn federated_username_collision_gets_a_suffix() {
    let dir = seeded();
    client_user(&dir, "grace", "x").await;

    let created = find_or_create_federated_user(dir.as_ref(), &identity("grace@example.com"))
        .await
        .unwrap();
    assert!(created.username.starts_with("grace-"));
}

#[tokio::test]
async fn concurrent_first_logins_converge_on_one_user() {
    let dir = seeded();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dir = dir.clone();
        handles.push(tokio::spawn(async move {
            find_or_create_federated_user(dir.as_ref(), &identity("race@example.com")).await
        }));
    }

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(dir.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn inactive_federated_user_is_refused() {
    let dir = seeded();
    let user = find_or_create_federated_user(dir.as_ref(), &identity("x@example.com"))
        .await
        .unwrap();
    dir.set_active(user.id, false).unwrap();

    assert_eq!(
        find_or_create_federated_user(dir.as_ref(), &identity("x@example.com")).await,
        Err(AuthError::UserInactive)
    );
}

#[tokio::test]
async fn development_stub_is_selected_only_in_development() {
    assert!(select_identity_provider(None, DeploymentMode::Production).unwrap().is_none());

    let dev = select_identity_provider(None, DeploymentMode::Development).unwrap();
    if !DEV_IDENTITY_STUB_AVAILABLE {
        assert!(dev.is_none());
        return;
    }
    let dev = dev.expect("stub in development");
    assert_eq!(dev.name(), "development-stub");
    let identity = dev.verify("anything").await.unwrap();
    assert!(identity.synthetic);
    assert_eq!(identity.email, DevelopmentStubClient::EMAIL);
}

#[tokio::test(flavor = "current_thread")]
async fn federated_provisioning_yields_while_hashing() {
    let dir = seeded();
    let started = std::time::Instant::now();

    // The secret is hashed on the blocking pool, so a single-threaded runtime
    // can still fire a short timer while provisioning is in flight.
    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(1),
        find_or_create_federated_user(dir.as_ref(), &identity("slow@example.com")),
    )
    .await;
    assert!(outcome.is_err(), "provisioning finished without yielding");
    assert!(started.elapsed() < std::time::Duration::from_millis(250));

    let created = find_or_create_federated_user(dir.as_ref(), &identity("slow@example.com"))
        .await
        .unwrap();
    assert!(!verify_password("not-the-secret", Some(&created.secret)));
    assert!(!is_legacy_secret(&created.secret));
}

#[tokio::test]
async fn legacy_secrets_are_migrated_and_still_verify() {
    let dir = seeded();
    let legacy = client_user(&dir, "legacy", "plain-password").await;
    let modern = client_user(&dir, "modern", &hash_password("pw").unwrap()).await;
    let modern_secret = dir.get_user(modern.id).await.unwrap().unwrap().secret;

    let report = migrate_legacy_secrets(dir.as_ref()).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.failed, 0);

    let migrated = dir.get_user(legacy.id).await.unwrap().unwrap();
    assert!(!is_legacy_secret(&migrated.secret));
    assert!(verify_password("plain-password", Some(&migrated.secret)));

    let untouched = dir.get_user(modern.id).await.unwrap().unwrap();
    assert_eq!(untouched.secret, modern_secret);

    let second = migrate_legacy_secrets(dir.as_ref()).await.unwrap();
    assert_eq!(second.migrated, 0);
}
