//! User records, create/patch requests, and list filters.

// self
use crate::{
	_prelude::*,
	auth::{Lifecycle, UserId, UserName},
};

/// Administrative state of a user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
	/// User may authenticate.
	#[default]
	Active,
	/// User is disabled by an operator.
	Disabled,
}
impl UserState {
	/// Relational column encoding.
	pub const fn as_code(self) -> i64 {
		match self {
			UserState::Active => 1,
			UserState::Disabled => 2,
		}
	}

	/// Decodes the relational column; unknown codes read as disabled.
	pub const fn from_code(code: i64) -> Self {
		if code == 1 { UserState::Active } else { UserState::Disabled }
	}
}

/// Provenance classification of a user (which onboarding channel created it).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceType(pub u32);

/// Classification tag used when filtering users.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub i32);

/// Identity record managed by the user directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	/// Generated identifier.
	pub id: UserId,
	/// Unique, human-facing name.
	pub name: UserName,
	/// Free-form operator comment.
	pub comment: String,
	/// Provenance classification.
	pub source_type: SourceType,
	/// Administrative state.
	pub state: UserState,
	/// Classification tag.
	pub key_code: KeyCode,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub create_time: OffsetDateTime,
	/// Last mutation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub update_time: OffsetDateTime,
	/// Soft-delete state.
	pub lifecycle: Lifecycle,
}
impl User {
	/// Materializes a new active user from a create request.
	pub fn from_new(new: NewUser, now: OffsetDateTime) -> Self {
		Self {
			id: UserId::generate(),
			name: new.name,
			comment: new.comment,
			source_type: new.source_type,
			state: new.state,
			key_code: new.key_code,
			create_time: now,
			update_time: now,
			lifecycle: Lifecycle::Active,
		}
	}

	/// Applies a partial update in place.
	pub fn apply(&mut self, patch: &UserPatch, now: OffsetDateTime) {
		if let Some(comment) = &patch.comment {
			self.comment = comment.clone();
		}
		if let Some(source_type) = patch.source_type {
			self.source_type = source_type;
		}
		if let Some(state) = patch.state {
			self.state = state;
		}
		if let Some(key_code) = patch.key_code {
			self.key_code = key_code;
		}

		self.update_time = now;
	}
}

/// Create request for [`User`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
	/// Unique name.
	pub name: UserName,
	/// Free-form operator comment.
	#[serde(default)]
	pub comment: String,
	/// Provenance classification.
	#[serde(default)]
	pub source_type: SourceType,
	/// Initial state.
	#[serde(default)]
	pub state: UserState,
	/// Classification tag.
	#[serde(default)]
	pub key_code: KeyCode,
}
impl NewUser {
	/// Creates an active user request with default classification.
	pub fn new(name: UserName) -> Self {
		Self {
			name,
			comment: String::new(),
			source_type: SourceType::default(),
			state: UserState::default(),
			key_code: KeyCode::default(),
		}
	}

	/// Sets the comment.
	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = comment.into();

		self
	}

	/// Sets the provenance classification.
	pub fn with_source_type(mut self, source_type: SourceType) -> Self {
		self.source_type = source_type;

		self
	}

	/// Sets the initial state.
	pub fn with_state(mut self, state: UserState) -> Self {
		self.state = state;

		self
	}

	/// Sets the classification tag.
	pub fn with_key_code(mut self, key_code: KeyCode) -> Self {
		self.key_code = key_code;

		self
	}
}

/// Partial update addressed by user name; `None` fields are left untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
	/// Target user.
	pub name: UserName,
	/// Replacement comment.
	#[serde(default)]
	pub comment: Option<String>,
	/// Replacement provenance classification.
	#[serde(default)]
	pub source_type: Option<SourceType>,
	/// Replacement state.
	#[serde(default)]
	pub state: Option<UserState>,
	/// Replacement classification tag.
	#[serde(default)]
	pub key_code: Option<KeyCode>,
}
impl UserPatch {
	/// Creates an empty patch for `name`.
	pub fn new(name: UserName) -> Self {
		Self { name, comment: None, source_type: None, state: None, key_code: None }
	}

	/// Replaces the comment.
	pub fn comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());

		self
	}

	/// Replaces the provenance classification.
	pub fn source_type(mut self, source_type: SourceType) -> Self {
		self.source_type = Some(source_type);

		self
	}

	/// Replaces the state.
	pub fn state(mut self, state: UserState) -> Self {
		self.state = Some(state);

		self
	}

	/// Replaces the classification tag.
	pub fn key_code(mut self, key_code: KeyCode) -> Self {
		self.key_code = Some(key_code);

		self
	}
}

/// Optional list filters; set fields combine with logical AND.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
	/// Only users in this state.
	#[serde(default)]
	pub state: Option<UserState>,
	/// Only users with this provenance.
	#[serde(default)]
	pub source_type: Option<SourceType>,
	/// Only users with this classification tag.
	#[serde(default)]
	pub key_code: Option<KeyCode>,
}
impl UserFilter {
	/// Returns `true` when `user` satisfies every set field.
	pub fn matches(&self, user: &User) -> bool {
		self.state.is_none_or(|state| user.state == state)
			&& self.source_type.is_none_or(|source_type| user.source_type == source_type)
			&& self.key_code.is_none_or(|key_code| user.key_code == key_code)
	}
}
