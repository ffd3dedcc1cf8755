//! Scenario tests for the auth crate
//! Reconciliation, password credentials and the HTTP surface end to end

#[cfg(test)]
mod reconcile_tests {
    use std::sync::Arc;

    use crate::application::{IdentityLocks, MemorySession, ReconcileUseCase, Session};
    use crate::domain::entity::identity::ExternalIdentity;
    use crate::domain::entity::person::Person;
    use crate::domain::repository::{AccountRepository, EmailIndex, IdentityRepository};
    use crate::domain::value_object::{
        account_id::AccountId, composite_id::CompositeId, email::Email,
    };
    use crate::error::AuthError;
    use crate::infra::memory::MemoryAuthRepository;

    struct Harness {
        repo: Arc<MemoryAuthRepository>,
        locks: Arc<IdentityLocks>,
        engine: Arc<ReconcileUseCase<MemoryAuthRepository>>,
    }

    fn harness() -> Harness {
        let repo = Arc::new(MemoryAuthRepository::new());
        let locks = Arc::new(IdentityLocks::new());
        let engine = Arc::new(ReconcileUseCase::new(repo.clone(), locks.clone()));
        Harness {
            repo,
            locks,
            engine,
        }
    }

    fn dev_identity(id: &str) -> ExternalIdentity {
        ExternalIdentity::new("Dev", "http://localhost:8080").with_provider_id(id)
    }

    #[tokio::test]
    async fn test_first_login_creates_account() {
        let h = harness();
        let mut session = MemorySession::new();

        let output = h.engine.execute(&mut session, dev_identity("1")).await.unwrap();

        assert!(output.account_created);
        assert_eq!(
            output.account.linked_identities,
            vec![CompositeId::from_db("dev|1")]
        );
        assert_eq!(session.current_account_id().unwrap(), output.account.account_id);
        assert_eq!(output.identity.account_id, Some(output.account.account_id));
        assert_eq!(h.repo.account_count().await, 1);

        let stored = h
            .repo
            .find_by_composite_id(&CompositeId::from_db("dev|1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.account_id, Some(output.account.account_id));
        assert_eq!(stored.person.kind, "dev#person");
    }

    #[tokio::test]
    async fn test_repeated_login_is_idempotent() {
        let h = harness();

        let first = h
            .engine
            .execute(&mut MemorySession::new(), dev_identity("1"))
            .await
            .unwrap();
        let second = h
            .engine
            .execute(&mut MemorySession::new(), dev_identity("1"))
            .await
            .unwrap();

        assert!(!second.account_created);
        assert_eq!(first.account.account_id, second.account.account_id);
        assert_eq!(second.account.linked_identities.len(), 1);
        assert_eq!(second.identity.created_at, first.identity.created_at);
        assert_eq!(h.repo.account_count().await, 1);
        assert_eq!(h.repo.identity_count().await, 1);
    }

    #[tokio::test]
    async fn test_new_identity_links_to_logged_in_account() {
        let h = harness();
        let mut session = MemorySession::new();

        let first = h.engine.execute(&mut session, dev_identity("1")).await.unwrap();
        let google = ExternalIdentity::new("Google", "https://google.com").with_provider_id("42");
        let second = h.engine.execute(&mut session, google).await.unwrap();

        assert!(!second.account_created);
        assert_eq!(second.account.account_id, first.account.account_id);
        assert_eq!(
            second.account.linked_identities,
            vec![
                CompositeId::from_db("dev|1"),
                CompositeId::from_db("google|42")
            ]
        );
        assert_eq!(h.repo.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_stored_link_wins_over_session() {
        let h = harness();

        let owner = h
            .engine
            .execute(&mut MemorySession::new(), dev_identity("owner"))
            .await
            .unwrap();
        let mut other_session = MemorySession::new();
        let other = h
            .engine
            .execute(&mut other_session, dev_identity("other"))
            .await
            .unwrap();
        assert_ne!(owner.account.account_id, other.account.account_id);

        // Logged in as `other`, presenting `owner`'s identity
        let output = h
            .engine
            .execute(&mut other_session, dev_identity("owner"))
            .await
            .unwrap();

        assert_eq!(output.account.account_id, owner.account.account_id);
        assert_eq!(
            other_session.current_account_id().unwrap(),
            owner.account.account_id
        );

        let other_account = h
            .repo
            .find_by_id(&other.account.account_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            other_account.linked_identities,
            vec![CompositeId::from_db("dev|other")]
        );
    }

    #[tokio::test]
    async fn test_session_for_missing_account_is_sync_fault() {
        let h = harness();
        let mut session = MemorySession::logged_in(AccountId::new());

        let result = h.engine.execute(&mut session, dev_identity("1")).await;

        assert!(matches!(result, Err(AuthError::AccountSyncFault { .. })));
        assert_eq!(h.repo.identity_count().await, 0);
        assert_eq!(h.repo.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_identity_never_stored() {
        let h = harness();
        let mut session = MemorySession::new();

        let no_id = ExternalIdentity::new("Dev", "");
        let result = h.engine.execute(&mut session, no_id).await;

        assert!(matches!(result, Err(AuthError::MalformedIdentity(_))));
        assert!(session.current_account_id().is_err());
        assert_eq!(h.repo.identity_count().await, 0);
        assert_eq!(h.repo.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_admin_role_is_sticky() {
        let h = harness();

        let mut admin = dev_identity("root");
        admin.is_admin = true;
        let first = h
            .engine
            .execute(&mut MemorySession::new(), admin)
            .await
            .unwrap();
        assert!(first.account.is_admin());

        let second = h
            .engine
            .execute(&mut MemorySession::new(), dev_identity("root"))
            .await
            .unwrap();
        assert!(second.account.is_admin());

        let stored = h
            .repo
            .find_by_composite_id(&CompositeId::from_db("dev|root"))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_admin);
    }

    #[tokio::test]
    async fn test_email_index_first_owner_keeps_address() {
        let h = harness();
        let email = Email::parse("barack@example.com").unwrap();

        let first = h
            .engine
            .execute(
                &mut MemorySession::new(),
                dev_identity("1").with_person(Person::with_email("barack@example.com")),
            )
            .await
            .unwrap();
        assert_eq!(
            h.repo.lookup_account_id(&email).await.unwrap(),
            Some(first.account.account_id)
        );

        let second = h
            .engine
            .execute(
                &mut MemorySession::new(),
                dev_identity("2").with_person(Person::with_email("Barack@Example.com")),
            )
            .await
            .unwrap();

        assert_ne!(first.account.account_id, second.account.account_id);
        assert_eq!(
            h.repo.lookup_account_id(&email).await.unwrap(),
            Some(first.account.account_id)
        );
    }

    #[tokio::test]
    async fn test_unusable_email_is_skipped() {
        let h = harness();
        let output = h
            .engine
            .execute(
                &mut MemorySession::new(),
                dev_identity("1").with_person(Person::with_email("not-an-email")),
            )
            .await
            .unwrap();
        assert_eq!(output.identity.person.email, "not-an-email");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_logins_create_one_account() {
        let h = harness();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let engine = h.engine.clone();
                tokio::spawn(async move {
                    let mut session = MemorySession::new();
                    engine
                        .execute(&mut session, dev_identity("race"))
                        .await
                        .unwrap()
                        .account
                        .account_id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(h.repo.account_count().await, 1);
        assert_eq!(h.repo.identity_count().await, 1);
        assert!(h.locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_links_into_one_account_are_all_kept() {
        let h = harness();
        let mut session = MemorySession::new();
        let owner = h
            .engine
            .execute(&mut session, dev_identity("owner"))
            .await
            .unwrap();
        let account_id = owner.account.account_id;

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let engine = h.engine.clone();
                tokio::spawn(async move {
                    let mut session = MemorySession::logged_in(account_id);
                    engine
                        .execute(&mut session, dev_identity(&format!("link-{i}")))
                        .await
                        .unwrap()
                        .account
                        .account_id
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), account_id);
        }

        let account = h.repo.find_by_id(&account_id).await.unwrap().unwrap();
        assert_eq!(account.linked_identities.len(), 33);
        for i in 0..32 {
            let key = CompositeId::new("Dev", &format!("link-{i}"));
            assert!(account.is_linked(&key), "{key} missing from account");
            let stored = h.repo.find_by_composite_id(&key).await.unwrap().unwrap();
            assert_eq!(stored.account_id, Some(account_id));
        }
        assert!(h.locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_independent_engines_converge_on_one_account() {
        // Separate lock sets over one store, as with two gateway replicas.
        let repo = Arc::new(MemoryAuthRepository::new());
        let engines = [
            Arc::new(ReconcileUseCase::new(repo.clone(), Arc::new(IdentityLocks::new()))),
            Arc::new(ReconcileUseCase::new(repo.clone(), Arc::new(IdentityLocks::new()))),
        ];

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let engine = engines[i % 2].clone();
                tokio::spawn(async move {
                    engine
                        .execute(&mut MemorySession::new(), dev_identity("replicated"))
                        .await
                        .unwrap()
                        .account
                        .account_id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(repo.account_count().await, 1);
        assert_eq!(repo.identity_count().await, 1);
    }

    #[tokio::test]
    async fn test_allocated_account_is_created_with_identity() {
        let h = harness();
        let account_id = AccountId::new();
        let mut identity = dev_identity("1");
        identity.account_id = Some(account_id);
        identity.allocates_account = true;

        let output = h
            .engine
            .execute(&mut MemorySession::new(), identity)
            .await
            .unwrap();

        assert!(output.account_created);
        assert_eq!(output.account.account_id, account_id);
        assert!(!output.identity.allocates_account);
        assert!(h.repo.find_by_id(&account_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pre_bound_missing_account_is_sync_fault() {
        let h = harness();
        let mut identity = dev_identity("1");
        identity.account_id = Some(AccountId::new());

        let result = h.engine.execute(&mut MemorySession::new(), identity).await;

        assert!(matches!(result, Err(AuthError::AccountSyncFault { .. })));
        assert_eq!(h.repo.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share_locks() {
        let h = harness();
        let a = CompositeId::from_db("dev|a");
        let b = CompositeId::from_db("dev|b");
        let account_id = AccountId::new();

        let guard_a = h.locks.lock_identity(&a).await;
        let guard_b = h.locks.lock_identity(&b).await;
        let guard_account = h.locks.lock_account(&account_id).await;
        assert_eq!(h.locks.len(), 3);

        drop(guard_a);
        drop(guard_b);
        drop(guard_account);
        assert!(h.locks.is_empty());
    }
}

#[cfg(test)]
mod password_tests {
    use std::sync::Arc;

    use platform::password::{ClearTextPassword, HashParams, PasswordPolicy};

    use crate::application::password::{password_composite_id, stored_hash};
    use crate::application::{
        AuthConfig, IdentityLocks, ListProfilesUseCase, MemorySession, PasswordInput,
        PasswordUseCase, ReconcileOutput, ReconcileUseCase, Session,
    };
    use crate::domain::entity::identity::ExternalIdentity;
    use crate::domain::entity::person::{Person, PersonName};
    use crate::domain::repository::{AccountRepository, IdentityRepository};
    use crate::error::{AuthError, AuthResult};
    use crate::infra::memory::MemoryAuthRepository;

    const EMAIL: &str = "barack@example.com";

    struct Harness {
        repo: Arc<MemoryAuthRepository>,
        password: PasswordUseCase<MemoryAuthRepository>,
        engine: ReconcileUseCase<MemoryAuthRepository>,
    }

    fn harness() -> Harness {
        let repo = Arc::new(MemoryAuthRepository::new());
        let config = Arc::new(AuthConfig {
            hash_params: HashParams::new(1024, 1, 1),
            ..AuthConfig::development()
        });
        Harness {
            password: PasswordUseCase::new(repo.clone(), config),
            engine: ReconcileUseCase::new(repo.clone(), Arc::new(IdentityLocks::new())),
            repo,
        }
    }

    fn input(new: Option<&str>, current: Option<&str>, email: &str) -> PasswordInput {
        PasswordInput {
            new: new.map(str::to_string),
            current: current.map(str::to_string),
            email: email.to_string(),
            person: Person::default(),
        }
    }

    async fn submit(
        h: &Harness,
        session: &mut MemorySession,
        input: PasswordInput,
    ) -> AuthResult<ReconcileOutput> {
        let identity = h
            .password
            .execute(session.current_account_id().ok(), input)
            .await?
            .ok_or(AuthError::CredentialsMissing)?;
        h.engine.execute(session, identity).await
    }

    #[tokio::test]
    async fn test_sign_up_then_log_in() {
        let h = harness();

        let mut session = MemorySession::new();
        let created = submit(&h, &mut session, input(Some("secret1"), None, EMAIL))
            .await
            .unwrap();
        let account_id = created.account.account_id;
        assert_eq!(
            created.account.linked_identities,
            vec![password_composite_id(&account_id)]
        );
        assert_eq!(created.identity.person.email, EMAIL);

        let mut fresh = MemorySession::new();
        let logged_in = submit(&h, &mut fresh, input(None, Some("secret1"), EMAIL))
            .await
            .unwrap();
        assert_eq!(logged_in.account.account_id, account_id);
        assert_eq!(fresh.current_account_id().unwrap(), account_id);
        assert_eq!(h.repo.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let h = harness();
        submit(&h, &mut MemorySession::new(), input(Some("secret1"), None, EMAIL))
            .await
            .unwrap();

        let mut session = MemorySession::new();
        let result = submit(&h, &mut session, input(None, Some("secret2"), EMAIL)).await;

        assert!(matches!(result, Err(AuthError::PasswordMismatch)));
        assert!(session.current_account_id().is_err());
    }

    #[tokio::test]
    async fn test_unknown_email_has_no_profile() {
        let h = harness();
        let result = submit(
            &h,
            &mut MemorySession::new(),
            input(None, Some("secret1"), "nobody@example.com"),
        )
        .await;
        assert!(matches!(result, Err(AuthError::ProfileNotFound)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let h = harness();
        let mut session = MemorySession::new();
        submit(&h, &mut session, input(Some("secret1"), None, EMAIL))
            .await
            .unwrap();

        submit(&h, &mut session, input(Some("secret2"), Some("secret1"), EMAIL))
            .await
            .unwrap();

        let old = submit(&h, &mut MemorySession::new(), input(None, Some("secret1"), EMAIL)).await;
        assert!(matches!(old, Err(AuthError::PasswordMismatch)));
        submit(&h, &mut MemorySession::new(), input(None, Some("secret2"), EMAIL))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_change_requires_current_password() {
        let h = harness();
        let mut session = MemorySession::new();
        submit(&h, &mut session, input(Some("secret1"), None, EMAIL))
            .await
            .unwrap();

        let result = submit(&h, &mut session, input(Some("secret3"), Some("wrong"), EMAIL)).await;
        assert!(matches!(result, Err(AuthError::PasswordMismatch)));
    }

    #[tokio::test]
    async fn test_length_boundaries() {
        let h = harness();
        let too_long = "x".repeat(32);
        let longest = "x".repeat(31);

        for bad in ["abc", too_long.as_str()] {
            let result = h
                .password
                .execute(None, input(Some(bad), None, EMAIL))
                .await;
            assert!(
                matches!(result, Err(AuthError::PasswordLengthInvalid(_))),
                "{} chars accepted",
                bad.len()
            );
        }

        for (i, good) in ["abcd", longest.as_str()].into_iter().enumerate() {
            let email = format!("user{i}@example.com");
            let result = h
                .password
                .execute(None, input(Some(good), None, &email))
                .await
                .unwrap();
            assert!(result.is_some());
        }
    }

    #[tokio::test]
    async fn test_invalid_email() {
        let h = harness();
        let result = h
            .password
            .execute(None, input(Some("secret1"), None, "not-an-email"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidEmail(_))));
        assert_eq!(h.repo.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_password_fields_is_noop() {
        let h = harness();
        let result = h.password.execute(None, input(None, Some(""), EMAIL)).await.unwrap();
        assert!(result.is_none());
        assert_eq!(h.repo.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_sign_up_twice_is_rejected() {
        let h = harness();
        let mut session = MemorySession::new();
        let first = submit(&h, &mut session, input(Some("secret1"), None, EMAIL))
            .await
            .unwrap();

        // Same password, no session
        let again = submit(&h, &mut MemorySession::new(), input(Some("secret1"), None, EMAIL)).await;
        assert!(matches!(again, Err(AuthError::PasswordAlreadySet)));

        // Logged in as the owner; changing goes through `current`
        let logged_in = submit(&h, &mut session, input(Some("secret9"), None, EMAIL)).await;
        assert!(matches!(logged_in, Err(AuthError::PasswordAlreadySet)));

        let stored = h
            .repo
            .find_by_composite_id(&password_composite_id(&first.account.account_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.credential_secret, first.identity.credential_secret);
        assert_eq!(h.repo.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_sign_up_cannot_claim_email_of_another_account() {
        let h = harness();
        let google = ExternalIdentity::new("Google", "https://google.com")
            .with_provider_id("42")
            .with_person(Person::with_email(EMAIL));
        let victim = h
            .engine
            .execute(&mut MemorySession::new(), google)
            .await
            .unwrap();

        let mut session = MemorySession::new();
        let result = submit(&h, &mut session, input(Some("secret1"), None, EMAIL)).await;

        assert!(matches!(result, Err(AuthError::EmailInUse)));
        assert!(session.current_account_id().is_err());
        let account = h
            .repo
            .find_by_id(&victim.account.account_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.linked_identities.len(), 1);
        assert!(!h.password.is_set(&victim.account.account_id).await.unwrap());
        assert_eq!(h.repo.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_sign_up_persists_nothing_before_reconcile() {
        let h = harness();

        let identity = h
            .password
            .execute(None, input(Some("secret1"), None, EMAIL))
            .await
            .unwrap()
            .unwrap();
        assert!(identity.allocates_account);
        assert_eq!(h.repo.account_count().await, 0);
        assert_eq!(h.repo.identity_count().await, 0);

        let account_id = identity.account_id.unwrap();
        let output = h
            .engine
            .execute(&mut MemorySession::new(), identity)
            .await
            .unwrap();
        assert!(output.account_created);
        assert_eq!(output.account.account_id, account_id);
        assert_eq!(h.repo.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_password_added_to_logged_in_account() {
        let h = harness();
        let mut session = MemorySession::new();
        let dev = h
            .engine
            .execute(
                &mut session,
                ExternalIdentity::new("Dev", "").with_provider_id("1"),
            )
            .await
            .unwrap();

        let output = submit(&h, &mut session, input(Some("secret1"), None, EMAIL))
            .await
            .unwrap();

        assert_eq!(output.account.account_id, dev.account.account_id);
        assert_eq!(output.account.linked_identities.len(), 2);
        assert!(h.password.is_set(&dev.account.account_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_up_and_list_profile() {
        let h = harness();
        let mut session = MemorySession::new();

        let mut sign_up = input(Some("secret1"), None, EMAIL);
        sign_up.person = Person {
            name: PersonName {
                given_name: "Barack".to_string(),
                family_name: "Obama".to_string(),
                ..PersonName::default()
            },
            ..Person::default()
        };
        let output = submit(&h, &mut session, sign_up).await.unwrap();
        let account_id = output.account.account_id;

        assert!(h.password.is_set(&account_id).await.unwrap());

        let policy = PasswordPolicy::default();
        let hashed = stored_hash(&output.identity).unwrap();
        assert!(hashed.verify(&ClearTextPassword::new("secret1".into(), &policy).unwrap(), None));
        assert!(!hashed.verify(&ClearTextPassword::new("secret2".into(), &policy).unwrap(), None));

        let profiles = ListProfilesUseCase::new(h.repo.clone())
            .execute(&account_id)
            .await
            .unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name.given_name, "Barack");
        assert_eq!(profiles[0].email, EMAIL);
        assert_eq!(profiles[0].kind, "password#person");
        assert_eq!(profiles[0].id, account_id.to_string());
    }
}

#[cfg(test)]
mod router_tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Response, StatusCode, header};
    use platform::password::HashParams;
    use tower::ServiceExt;

    use crate::application::config::AuthConfig;
    use crate::domain::entity::identity::ExternalIdentity;
    use crate::error::AuthResult;
    use crate::infra::memory::MemoryAuthRepository;
    use crate::presentation::handlers::AuthAppState;
    use crate::presentation::router::{api_router, auth_router};
    use crate::provider::dev::DevProvider;
    use crate::provider::google;
    use crate::provider::oauth2::STATE_COOKIE_NAME;
    use crate::provider::password::PasswordProvider;
    use crate::provider::{AuthOutcome, Provider, ProviderRegistry, ProviderRequest};

    /// Returns an identity without a provider ID
    struct BrokenProvider;

    #[async_trait]
    impl Provider for BrokenProvider {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn authenticate(&self, _req: &ProviderRequest) -> AuthResult<AuthOutcome> {
            Ok(AuthOutcome::Identity(ExternalIdentity::new("Broken", "")))
        }
    }

    fn app() -> (Router, Arc<MemoryAuthRepository>) {
        let repo = Arc::new(MemoryAuthRepository::new());
        let config = Arc::new(AuthConfig {
            hash_params: HashParams::new(1024, 1, 1),
            ..AuthConfig::development()
        });

        let mut registry = ProviderRegistry::new();
        registry
            .register("dev", Arc::new(DevProvider::new()))
            .register(
                "password",
                Arc::new(PasswordProvider::new(repo.clone(), config.clone())),
            )
            .register("broken", Arc::new(BrokenProvider))
            .register(
                "google",
                Arc::new(
                    google::provider("client", "secret", None, &config.session_secret)
                        .with_cookie_secure(false),
                ),
            );

        let state = AuthAppState::new(repo.clone(), config, registry);
        let router = Router::new()
            .nest("/-/auth", auth_router(state.clone()))
            .nest("/api/auth", api_router(state));
        (router, repo)
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(form.to_string())).unwrap()
    }

    fn post_json(uri: &str, json: serde_json::Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(json.to_string())).unwrap()
    }

    fn location(response: &Response<Body>) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    /// `name=value` part of the Set-Cookie header
    fn session_cookie(response: &Response<Body>) -> Option<String> {
        let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
        value.split(';').next().map(str::to_string)
    }

    async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let (app, _) = app();
        let response = app.oneshot(get("/-/auth/nope", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dev_login_sets_session() {
        let (app, repo) = app();

        let response = app
            .clone()
            .oneshot(get("/-/auth/dev?ID=1&Name.GivenName=Barack", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");
        let cookie = session_cookie(&response).unwrap();
        assert!(cookie.starts_with("auth_session="));
        assert_eq!(repo.account_count().await, 1);

        let response = app
            .oneshot(get("/api/auth/profiles", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["profiles"][0]["name"]["givenName"], "Barack");
        assert_eq!(body["profiles"][0]["provider"]["name"], "Dev");
    }

    #[tokio::test]
    async fn test_provider_names_are_case_insensitive() {
        let (app, _) = app();
        let response = app.oneshot(get("/-/auth/DEV", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(session_cookie(&response).is_some());
    }

    #[tokio::test]
    async fn test_failed_login_redirects_to_login_page() {
        let (app, _) = app();

        let response = app
            .oneshot(post_form(
                "/-/auth/password",
                "Email=barack%40example.com&Password.Current=secret1",
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/-/auth/login");
        assert!(session_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn test_password_form_sign_up_and_log_in() {
        let (app, repo) = app();

        let response = app
            .clone()
            .oneshot(post_form(
                "/-/auth/password",
                "Email=barack%40example.com&Password.New=secret1",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/");
        assert!(session_cookie(&response).is_some());

        let response = app
            .oneshot(post_form(
                "/-/auth/password",
                "Email=barack%40example.com&Password.Current=secret1",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/");
        assert!(session_cookie(&response).is_some());
        assert_eq!(repo.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_malformed_identity_is_server_error() {
        let (app, repo) = app();
        let response = app.oneshot(get("/-/auth/broken", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(repo.identity_count().await, 0);
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let (app, _) = app();
        let login = app.clone().oneshot(get("/-/auth/dev", None)).await.unwrap();
        let cookie = session_cookie(&login).unwrap();

        let response = app
            .oneshot(get("/-/auth/logout", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("auth_session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_profiles_require_login() {
        let (app, _) = app();
        let response = app
            .oneshot(get("/api/auth/profiles", Some("auth_session=forged")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("x-auth-required").unwrap(), "true");
    }

    #[tokio::test]
    async fn test_password_json_api() {
        let (app, _) = app();

        let status = app
            .clone()
            .oneshot(get("/api/auth/password", None))
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/auth/password",
                serde_json::json!({
                    "password": { "new": "secret1", "email": "Barack@Example.com" },
                    "person": { "name": { "givenName": "Barack", "familyName": "Obama" } }
                }),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response).unwrap();
        let body = json_body(response).await;
        assert_eq!(body["person"]["email"], "barack@example.com");
        assert_eq!(body["person"]["name"]["familyName"], "Obama");

        let status = app
            .clone()
            .oneshot(get("/api/auth/password", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::OK);
        assert_eq!(json_body(status).await["isSet"], true);

        let empty = app
            .oneshot(post_json(
                "/api/auth/password",
                serde_json::json!({ "password": { "email": "barack@example.com" } }),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oauth2_entry_sets_state_cookie() {
        let (app, _) = app();
        let response = app.oneshot(get("/-/auth/google", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("https://accounts.google.com/"));
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with(&format!("{STATE_COOKIE_NAME}=")));
        assert!(set_cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_oauth2_callback_without_state_cookie_redirects_to_login() {
        let (app, repo) = app();
        let entry = app.clone().oneshot(get("/-/auth/google", None)).await.unwrap();
        let authorize = url::Url::parse(location(&entry)).unwrap();
        let state = authorize
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        // The callback URL opened in a browser that never started the flow
        let callback = format!(
            "/-/auth/google/callback?code=attacker&state={}",
            url::form_urlencoded::byte_serialize(state.as_bytes()).collect::<String>()
        );
        let response = app.oneshot(get(&callback, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/-/auth/login");
        assert!(session_cookie(&response).is_none());
        assert_eq!(repo.identity_count().await, 0);
    }

    #[tokio::test]
    async fn test_password_sign_up_with_taken_email_conflicts() {
        let (app, _) = app();
        let login = app
            .clone()
            .oneshot(get("/-/auth/dev?ID=1&Email=barack%40example.com", None))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::FOUND);

        let response = app
            .oneshot(post_json(
                "/api/auth/password",
                serde_json::json!({
                    "password": { "new": "secret1", "email": "barack@example.com" }
                }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(session_cookie(&response).is_none());
    }
}
