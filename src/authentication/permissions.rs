use serde::{Deserialize, Serialize};

use super::jwt::SessionData;

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnReviews,
            ActionType::ManageOwnProfile,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnReviews,
            ActionType::ManageOwnProfile,
            ActionType::ManageAllRecipes,
            ActionType::ManageCategories,
            ActionType::ManageHashtags,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn from_admin_flag(admin: bool) -> Self {
        match admin {
            true => Self::Admin,
            false => Self::User,
        }
    }
}

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnReviews,
    ManageOwnProfile,

    ManageAllRecipes,
    ManageCategories,
    ManageHashtags,
    ManageUsers,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if session.role != *role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: String::from("u1"),
            email: String::from("anna@example.com"),
            display_name: String::from("Anna"),
            role,
            is_admin: role == UserRole::Admin,
        }
    }

    #[test]
    fn users_manage_their_own_content() {
        let user = session(UserRole::User);
        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(ActionType::ManageOwnReviews.authenticate(&user));
        assert!(!ActionType::ManageAllRecipes.authenticate(&user));
        assert!(!ActionType::ManageCategories.authenticate(&user));
    }

    #[test]
    fn admins_curate_everything() {
        let admin = session(UserRole::Admin);
        assert!(ActionType::ManageUsers.authenticate(&admin));
        assert!(ActionType::ManageHashtags.authenticate(&admin));
        assert!(ActionType::ManageOwnProfile.authenticate(&admin));
    }
}
