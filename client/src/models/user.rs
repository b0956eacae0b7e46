use payloads::{UserId, collections, responses};

use super::Entity;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

impl User {
    /// The user's name, falling back to their email address.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

impl Entity for User {
    type Id = UserId;
    type Record = responses::User;

    const COLLECTION: &'static str = collections::USERS;

    fn from_record(record: responses::User) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            image: record.image,
        }
    }

    fn id(&self) -> UserId {
        self.id
    }
}
