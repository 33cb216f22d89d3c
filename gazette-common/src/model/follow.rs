use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// `user` follows `author`. At most one exists per pair.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Follow {
    pub user: Id<UserMarker>,
    pub author: Id<UserMarker>,
}

impl Display for Follow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "User {} follows {}", self.user, self.author)
    }
}
