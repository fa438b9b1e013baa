//! Contract checks shared by every [`AuthStore`] backend.
//!
//! Each backend's unit tests call [`run_all`] with a factory that yields a fresh, empty
//! store per check, so the in-memory double, SQLite, and fjall are held to the same
//! semantics.

// crates.io
use time::macros;
// self
use crate::{
	_prelude::*,
	auth::{
		JwtPayload, KeyCode, KeyPair, Lifecycle, MinerAddr, NewUser, Page, Perm, RequestQuota,
		SourceType, User, UserFilter, UserName, UserPatch, UserRateLimit, UserState,
	},
	store::{AuthStore, Entity, SCHEMA_V1, StoreError},
};

/// Runs every check against stores produced by `make`.
pub async fn run_all<S, F, Fut>(make: F)
where
	S: 'static + AuthStore,
	F: Fn() -> Fut,
	Fut: Future<Output = Arc<S>>,
{
	token_put_rejects_duplicates(&*make().await).await;
	token_lifecycle_hides_from_lists(&*make().await).await;
	token_pages_are_stable(&*make().await).await;
	far_pages_are_empty(&*make().await).await;
	user_names_stay_reserved_after_delete(&*make().await).await;
	user_patch_skips_deleted_rows(&*make().await).await;
	user_list_filters_and_pages(&*make().await).await;
	miner_upsert_reports_creation(&*make().await).await;
	miner_delete_reports_existence(&*make().await).await;
	rate_limits_converge_per_scope(&*make().await).await;
	rate_limit_windows_read_back_unchanged(&*make().await).await;
	migration_is_idempotent(&*make().await).await;
	concurrent_user_creates_have_one_winner(make().await).await;
	concurrent_miner_upserts_have_one_creator(make().await).await;
	concurrent_rate_limit_upserts_converge(make().await).await;
}

fn name(value: &str) -> UserName {
	UserName::new(value).expect("User name fixture should be valid.")
}

fn addr(value: &str) -> MinerAddr {
	MinerAddr::new(value).expect("Miner fixture should be valid.")
}

fn at(seconds: i64) -> OffsetDateTime {
	macros::datetime!(2025-01-01 00:00 UTC) + Duration::seconds(seconds)
}

fn pair(token: &str, owner: &str, seconds: i64) -> KeyPair {
	KeyPair::issue(token.into(), &JwtPayload::new(name(owner), Perm::Read, ""), at(seconds))
}

fn user(owner: &str, seconds: i64) -> User {
	User::from_new(NewUser::new(name(owner)), at(seconds))
}

fn quota(cap: u64) -> RequestQuota {
	RequestQuota::new(cap, Duration::minutes(1)).expect("Quota fixture should be valid.")
}

/// Token inserts are unique and keyed lookups see the stored record.
pub async fn token_put_rejects_duplicates<S: AuthStore>(store: &S) {
	let record = pair("t.one.sig", "alice", 0);

	store.put_token(record.clone()).await.expect("First insert should succeed.");

	assert!(matches!(
		store.put_token(pair("t.one.sig", "bob", 1)).await,
		Err(StoreError::Conflict { entity: Entity::Token, .. })
	));
	assert_eq!(
		store.get_token("t.one.sig").await.expect("Lookup should succeed."),
		Some(record),
		"Duplicate insert must not overwrite the original record."
	);
	assert_eq!(store.get_token("t.missing.sig").await.expect("Lookup should succeed."), None);
}

/// Revoked tokens drop out of lists but stay visible to keyed lookups.
pub async fn token_lifecycle_hides_from_lists<S: AuthStore>(store: &S) {
	store.put_token(pair("t.a.sig", "alice", 0)).await.expect("Insert should succeed.");
	store.put_token(pair("t.b.sig", "alice", 1)).await.expect("Insert should succeed.");

	assert!(
		store
			.set_token_lifecycle("t.a.sig", Lifecycle::Deleted)
			.await
			.expect("Lifecycle update should succeed.")
	);
	assert!(
		!store
			.set_token_lifecycle("t.none.sig", Lifecycle::Deleted)
			.await
			.expect("Lifecycle update should succeed.")
	);

	let owned = store.tokens_by_name(&name("alice")).await.expect("Owner listing should succeed.");
	let listed = store.list_tokens(Page::default()).await.expect("Listing should succeed.");
	let revoked = store
		.get_token("t.a.sig")
		.await
		.expect("Lookup should succeed.")
		.expect("Revoked token should remain stored.");

	assert_eq!(owned.iter().map(|p| p.token.as_str()).collect::<Vec<_>>(), ["t.b.sig"]);
	assert_eq!(listed.len(), 1);
	assert_eq!(revoked.lifecycle, Lifecycle::Deleted);

	store
		.set_token_lifecycle("t.a.sig", Lifecycle::Active)
		.await
		.expect("Lifecycle update should succeed.");

	assert_eq!(store.list_tokens(Page::default()).await.expect("Listing should succeed.").len(), 2);
}

/// Consecutive pages concatenate to the full ordered listing.
pub async fn token_pages_are_stable<S: AuthStore>(store: &S) {
	// Insert out of order; creation time decides.
	for (token, seconds) in [("t.c.sig", 2), ("t.a.sig", 0), ("t.e.sig", 4), ("t.b.sig", 1), ("t.d.sig", 3)]
	{
		store.put_token(pair(token, "alice", seconds)).await.expect("Insert should succeed.");
	}

	let mut paged = Vec::new();

	for skip in [0, 2, 4] {
		let page = store.list_tokens(Page::new(skip, 2)).await.expect("Listing should succeed.");

		paged.extend(page.into_iter().map(|p| p.token));
	}

	assert_eq!(paged, ["t.a.sig", "t.b.sig", "t.c.sig", "t.d.sig", "t.e.sig"]);
	assert!(store.list_tokens(Page::new(5, 2)).await.expect("Listing should succeed.").is_empty());
}

/// A soft-deleted user still owns its name.
pub async fn user_names_stay_reserved_after_delete<S: AuthStore>(store: &S) {
	store.put_user(user("alice", 0)).await.expect("Insert should succeed.");

	assert!(
		store
			.set_user_lifecycle(&name("alice"), Lifecycle::Deleted, at(1))
			.await
			.expect("Lifecycle update should succeed.")
	);
	assert!(matches!(
		store.put_user(user("alice", 2)).await,
		Err(StoreError::Conflict { entity: Entity::User, .. })
	));

	let stored = store
		.get_user(&name("alice"))
		.await
		.expect("Lookup should succeed.")
		.expect("Deleted user should remain stored.");

	assert_eq!(stored.lifecycle, Lifecycle::Deleted);
	assert_eq!(stored.update_time, at(1));
	assert!(
		!store
			.set_user_lifecycle(&name("ghost"), Lifecycle::Deleted, at(1))
			.await
			.expect("Lifecycle update should succeed.")
	);
}

/// Patches apply only the provided fields and never touch deleted rows.
pub async fn user_patch_skips_deleted_rows<S: AuthStore>(store: &S) {
	let original = User::from_new(
		NewUser::new(name("alice")).with_comment("rig").with_key_code(KeyCode(3)),
		at(0),
	);

	store.put_user(original.clone()).await.expect("Insert should succeed.");

	let patch = UserPatch::new(name("alice")).state(UserState::Disabled);

	assert!(store.update_user(&patch, at(5)).await.expect("Update should succeed."));

	let updated = store
		.get_user(&name("alice"))
		.await
		.expect("Lookup should succeed.")
		.expect("User should exist.");

	assert_eq!(updated.state, UserState::Disabled);
	assert_eq!(updated.comment, "rig");
	assert_eq!(updated.key_code, KeyCode(3));
	assert_eq!(updated.id, original.id);
	assert_eq!(updated.create_time, at(0));
	assert_eq!(updated.update_time, at(5));

	store
		.set_user_lifecycle(&name("alice"), Lifecycle::Deleted, at(6))
		.await
		.expect("Lifecycle update should succeed.");

	assert!(
		!store
			.update_user(&UserPatch::new(name("alice")).comment("late"), at(7))
			.await
			.expect("Update should succeed.")
	);
	assert!(
		!store
			.update_user(&UserPatch::new(name("ghost")).comment("x"), at(7))
			.await
			.expect("Update should succeed.")
	);
}

/// Filters combine with AND, deleted users are hidden, and pages follow creation order.
pub async fn user_list_filters_and_pages<S: AuthStore>(store: &S) {
	for (owner, seconds, source) in
		[("carol", 2, 1), ("alice", 0, 1), ("bob", 1, 2), ("dave", 3, 1), ("erin", 4, 1)]
	{
		let new = NewUser::new(name(owner)).with_source_type(SourceType(source));

		store.put_user(User::from_new(new, at(seconds))).await.expect("Insert should succeed.");
	}

	store
		.set_user_lifecycle(&name("dave"), Lifecycle::Deleted, at(10))
		.await
		.expect("Lifecycle update should succeed.");

	let names = |users: Vec<User>| users.into_iter().map(|u| u.name.to_string()).collect::<Vec<_>>();
	let filter = UserFilter { source_type: Some(SourceType(1)), ..Default::default() };
	let all = store.list_users(&filter, Page::default()).await.expect("Listing should succeed.");
	let second_page =
		store.list_users(&filter, Page::new(1, 2)).await.expect("Listing should succeed.");
	let none = UserFilter { state: Some(UserState::Disabled), ..Default::default() };

	assert_eq!(names(all), ["alice", "carol", "erin"]);
	assert_eq!(names(second_page), ["carol", "erin"]);
	assert!(
		store.list_users(&none, Page::default()).await.expect("Listing should succeed.").is_empty()
	);
	assert_eq!(
		store
			.list_users(&UserFilter::default(), Page::default())
			.await
			.expect("Listing should succeed.")
			.len(),
		4
	);
}

/// Upserts report whether the mapping was created, and the last writer owns the miner.
pub async fn miner_upsert_reports_creation<S: AuthStore>(store: &S) {
	let miner = addr("f01000");

	assert!(
		store.upsert_miner(&miner, &name("alice"), at(0)).await.expect("Upsert should succeed.")
	);
	assert!(
		!store.upsert_miner(&miner, &name("alice"), at(1)).await.expect("Upsert should succeed.")
	);
	assert!(!store.upsert_miner(&miner, &name("bob"), at(2)).await.expect("Upsert should succeed."));

	let mapping = store
		.get_miner(&miner)
		.await
		.expect("Lookup should succeed.")
		.expect("Mapping should exist.");

	assert_eq!(mapping.user, name("bob"));
	assert_eq!(mapping.create_time, at(0));
	assert_eq!(mapping.update_time, at(2));

	store.upsert_miner(&addr("t0999"), &name("bob"), at(3)).await.expect("Upsert should succeed.");
	store.upsert_miner(&addr("f0200"), &name("bob"), at(4)).await.expect("Upsert should succeed.");

	let owned = store.list_miners(&name("bob")).await.expect("Listing should succeed.");

	assert_eq!(
		owned.iter().map(|m| m.miner.to_string()).collect::<Vec<_>>(),
		["f01000", "f0200", "t0999"]
	);
	assert!(store.list_miners(&name("alice")).await.expect("Listing should succeed.").is_empty());
}

/// Deleting a mapping reports whether it existed and is safe to repeat.
pub async fn miner_delete_reports_existence<S: AuthStore>(store: &S) {
	let miner = addr("f01000");

	assert!(!store.delete_miner(&miner).await.expect("Delete should succeed."));

	store.upsert_miner(&miner, &name("alice"), at(0)).await.expect("Upsert should succeed.");

	assert!(store.delete_miner(&miner).await.expect("Delete should succeed."));
	assert!(!store.delete_miner(&miner).await.expect("Delete should succeed."));
	assert_eq!(store.get_miner(&miner).await.expect("Lookup should succeed."), None);
}

/// An index far past the end yields nothing rather than wrapping to the first page.
pub async fn far_pages_are_empty<S: AuthStore>(store: &S) {
	for (i, owner) in ["alice", "bob", "carol"].into_iter().enumerate() {
		store.put_user(user(owner, i as i64)).await.expect("Insert should succeed.");
		store
			.put_token(pair(&format!("t.{owner}.sig"), owner, i as i64))
			.await
			.expect("Insert should succeed.");
	}

	let far = Page::from_index(i64::MAX, 10);
	let beyond = Page { skip: u64::MAX, limit: 10 };

	for page in [far, beyond] {
		assert!(
			store
				.list_users(&UserFilter::default(), page)
				.await
				.expect("Listing should succeed.")
				.is_empty()
		);
		assert!(store.list_tokens(page).await.expect("Listing should succeed.").is_empty());
	}
}

/// Stored windows come back exactly as written.
pub async fn rate_limit_windows_read_back_unchanged<S: AuthStore>(store: &S) {
	let quota = RequestQuota::new(7, Duration::seconds(90)).expect("Quota fixture should be valid.");
	let record = UserRateLimit::new(name("alice"), Some("wallet.sign".into()), quota);

	store.upsert_rate_limit(record.clone()).await.expect("Upsert should succeed.");

	assert_eq!(store.rate_limits(&name("alice"), None).await.expect("Listing should succeed."), [
		record
	]);
}

/// One record per (user, scope); later upserts replace the quota in place.
pub async fn rate_limits_converge_per_scope<S: AuthStore>(store: &S) {
	let alice = name("alice");
	let first = UserRateLimit::new(alice.clone(), None, quota(10));
	let first_id = store.upsert_rate_limit(first.clone()).await.expect("Upsert should succeed.");
	let again = store
		.upsert_rate_limit(UserRateLimit::new(alice.clone(), Some(String::new()), quota(50)))
		.await
		.expect("Upsert should succeed.");
	let scoped = store
		.upsert_rate_limit(UserRateLimit::new(alice.clone(), Some("wallet.sign".into()), quota(1)))
		.await
		.expect("Upsert should succeed.");

	assert_eq!(first_id, first.id);
	assert_eq!(again, first_id);
	assert_ne!(scoped, first_id);

	let all = store.rate_limits(&alice, None).await.expect("Listing should succeed.");

	assert_eq!(all.len(), 2);
	assert_eq!(all[0].quota.cap(), 50);
	assert_eq!(all[1].api.as_deref(), Some("wallet.sign"));

	let narrowed = store.rate_limits(&alice, Some(&scoped)).await.expect("Listing should succeed.");

	assert_eq!(narrowed.len(), 1);
	assert!(
		store.rate_limits(&name("bob"), Some(&scoped)).await.expect("Listing should succeed.").is_empty()
	);
	assert!(store.delete_rate_limit(&scoped).await.expect("Delete should succeed."));
	assert!(!store.delete_rate_limit(&scoped).await.expect("Delete should succeed."));
	assert_eq!(store.rate_limits(&alice, None).await.expect("Listing should succeed.").len(), 1);
}

/// A fresh store starts at version 0 and upgrading twice is harmless.
pub async fn migration_is_idempotent<S: AuthStore>(store: &S) {
	assert_eq!(store.version().await.expect("Version should be readable."), 0);

	store.migrate_to_v1().await.expect("Migration should succeed.");
	store.put_user(user("alice", 0)).await.expect("Insert should succeed.");
	store.migrate_to_v1().await.expect("Repeated migration should succeed.");

	assert_eq!(store.version().await.expect("Version should be readable."), SCHEMA_V1);
	assert!(store.get_user(&name("alice")).await.expect("Lookup should succeed.").is_some());
}

/// Parallel creates of one name produce exactly one row.
pub async fn concurrent_user_creates_have_one_winner<S: 'static + AuthStore>(store: Arc<S>) {
	let handles = (0..8)
		.map(|i| {
			let store = store.clone();

			tokio::spawn(async move { store.put_user(user("racer", i)).await })
		})
		.collect::<Vec<_>>();
	let mut winners = 0;

	for handle in handles {
		match handle.await.expect("Task should not panic.") {
			Ok(()) => winners += 1,
			Err(StoreError::Conflict { entity: Entity::User, .. }) => {},
			Err(e) => panic!("Unexpected store error: {e}"),
		}
	}

	assert_eq!(winners, 1);
}

/// Parallel upserts of one miner report creation exactly once.
pub async fn concurrent_miner_upserts_have_one_creator<S: 'static + AuthStore>(store: Arc<S>) {
	let handles = (0..8)
		.map(|i| {
			let store = store.clone();

			tokio::spawn(async move {
				store.upsert_miner(&addr("f01000"), &name(&format!("owner-{i}")), at(i)).await
			})
		})
		.collect::<Vec<_>>();
	let mut created = 0;

	for handle in handles {
		if handle.await.expect("Task should not panic.").expect("Upsert should succeed.") {
			created += 1;
		}
	}

	assert_eq!(created, 1);
	assert!(store.get_miner(&addr("f01000")).await.expect("Lookup should succeed.").is_some());
}

/// Parallel upserts of one scope agree on a single record.
pub async fn concurrent_rate_limit_upserts_converge<S: 'static + AuthStore>(store: Arc<S>) {
	let handles = (0..8)
		.map(|i| {
			let store = store.clone();

			tokio::spawn(async move {
				store
					.upsert_rate_limit(UserRateLimit::new(
						name("alice"),
						Some("wallet.sign".into()),
						quota(i),
					))
					.await
			})
		})
		.collect::<Vec<_>>();
	let mut ids = Vec::new();

	for handle in handles {
		ids.push(handle.await.expect("Task should not panic.").expect("Upsert should succeed."));
	}

	let stored = store.rate_limits(&name("alice"), None).await.expect("Listing should succeed.");

	assert_eq!(stored.len(), 1);
	assert!(ids.iter().all(|id| id == &stored[0].id));
}
