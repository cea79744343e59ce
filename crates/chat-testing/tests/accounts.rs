//! Account operations through a pooled connection.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chat_pool::PoolConfig;
use chat_store::{AccountRequest, Availability, Lookup, PasswordChange, Registration, StorePool};
use chat_testing::{MemoryServer, memory_pool};

async fn pool(server: &MemoryServer, size: u32) -> StorePool {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    memory_pool(server, PoolConfig::new().pool_size(size).health_check(false))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_registered_identity_is_taken() {
    let server = MemoryServer::new();
    let pool = pool(&server, 1).await;
    let mut conn = pool.get().await.unwrap();

    let alice = AccountRequest::new("alice", "s3cret", "alice@example.com");
    assert_eq!(
        conn.check_account_availability(&alice.username, &alice.email).await,
        Availability::Available
    );

    let Registration::Created(uuid) = conn.register_new_user(&alice).await else {
        panic!("registration failed");
    };
    assert_eq!(
        conn.check_account_availability(&alice.username, &alice.email).await,
        Availability::Taken
    );
    assert_eq!(conn.register_new_user(&alice).await, Registration::Taken);

    let row = conn.check_uuid(uuid).await.found().unwrap();
    assert_eq!(row.get_by_name::<String>("email").unwrap(), "alice@example.com");

    let profile = conn.user_profile(uuid).await.found().unwrap();
    assert_eq!(profile.get_by_name::<String>("nickname").unwrap(), "alice");
    assert_eq!(server.accounts().len(), 1);
}

#[tokio::test]
async fn test_password_change_moves_login() {
    let server = MemoryServer::new();
    server.seed_account("bob", "old", "bob@example.com");
    let pool = pool(&server, 1).await;
    let mut conn = pool.get().await.unwrap();

    assert_eq!(conn.check_account_login("bob", "old").await, Lookup::Found(1));

    let change = AccountRequest::new("bob", "new", "bob@example.com");
    assert_eq!(conn.alter_user_password(&change).await, PasswordChange::Changed);

    assert_eq!(conn.check_account_login("bob", "new").await, Lookup::Found(1));
    assert_eq!(conn.check_account_login("bob", "old").await, Lookup::NotFound);
}

#[tokio::test]
async fn test_password_change_for_unknown_identity() {
    let server = MemoryServer::new();
    let pool = pool(&server, 1).await;
    let mut conn = pool.get().await.unwrap();

    let change = AccountRequest::new("nobody", "pw", "nobody@example.com");
    assert_eq!(
        conn.alter_user_password(&change).await,
        PasswordChange::UnknownIdentity
    );
}

#[tokio::test]
async fn test_outage_is_not_reported_as_taken() {
    let server = MemoryServer::new();
    let pool = pool(&server, 1).await;
    let mut conn = pool.get().await.unwrap();

    server.fail_queries(true);
    let carol = AccountRequest::new("carol", "pw", "carol@example.com");
    assert_eq!(
        conn.check_account_availability(&carol.username, &carol.email).await,
        Availability::Unknown
    );
    assert_eq!(conn.register_new_user(&carol).await, Registration::Failed);
    assert_eq!(conn.alter_user_password(&carol).await, PasswordChange::Failed);
    assert_eq!(conn.check_account_login("carol", "pw").await, Lookup::Failed);

    server.fail_queries(false);
    assert!(matches!(
        conn.register_new_user(&carol).await,
        Registration::Created(_)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_create_one_identity() {
    let server = MemoryServer::new();
    let pool = pool(&server, 4).await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let mut conn = pool.get().await.unwrap();
                conn.register_new_user(&AccountRequest::new("dave", "pw", "dave@example.com"))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Registration::Created(_) => created += 1,
            Registration::Taken => {}
            Registration::Failed => panic!("registration failed against a healthy datastore"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(server.accounts().len(), 1);
}
