use serde_json::Value;
use tracing::warn;

use super::SessionData;
use crate::models::{CollectionSpec, Fields, Record, RecordId, WritePolicy, AUTHOR_NAME_FIELD, AUTHOR_UID_FIELD};
use crate::store::RemoteStore;

/// Collection holding one profile document per user, keyed by uid.
const USERS_COLLECTION: &str = "users";

const ROLE_FIELD: &str = "role";

const KEEPER_ROLE: &str = "keeper";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Member,
    Keeper,
}

/// The signed-in user as seen by a page: identity plus role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub uid: String,
    pub name: String,
    pub role: Role,
}

impl Viewer {
    pub fn new(uid: &str, name: &str, role: Role) -> Self {
        Self {
            uid: uid.to_string(),
            name: name.to_string(),
            role,
        }
    }

    pub fn from_session(session: &SessionData, role: Role) -> Self {
        Self::new(&session.uid, session.author_name(), role)
    }

    pub fn is_keeper(&self) -> bool {
        self.role == Role::Keeper
    }

    /// `authorUid` and `authorName` to stamp on records this viewer creates.
    pub fn author_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(AUTHOR_UID_FIELD.to_string(), Value::String(self.uid.clone()));
        fields.insert(AUTHOR_NAME_FIELD.to_string(), Value::String(self.name.clone()));
        fields
    }

    pub fn owns(&self, record: &Record) -> bool {
        record.author_uid() == Some(self.uid.as_str())
    }

    pub fn can_create(&self, spec: &CollectionSpec) -> bool {
        match spec.policy {
            WritePolicy::KeeperOnly => self.is_keeper(),
            WritePolicy::AuthorsOwn | WritePolicy::AuthorsOrKeeper => true,
        }
    }

    /// Whether this viewer may edit or delete `record`.
    pub fn can_modify(&self, spec: &CollectionSpec, record: &Record) -> bool {
        match spec.policy {
            WritePolicy::KeeperOnly => self.is_keeper(),
            WritePolicy::AuthorsOwn => self.owns(record),
            WritePolicy::AuthorsOrKeeper => self.is_keeper() || self.owns(record),
        }
    }
}

/// Read the user's role from their profile document.
///
/// Lookup failures are not fatal: the viewer is treated as a member.
pub async fn resolve_role<S: RemoteStore>(store: &S, uid: &str) -> Role {
    match store.fetch(USERS_COLLECTION, &RecordId::from(uid)).await {
        Ok(Some(doc)) if doc.fields.get(ROLE_FIELD).and_then(Value::as_str) == Some(KEEPER_ROLE) => {
            Role::Keeper
        }
        Ok(_) => Role::Member,
        Err(e) => {
            warn!(uid = uid, error = %e, "Failed to read user role");
            Role::Member
        }
    }
}
