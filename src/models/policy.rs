use crate::models::{ActingUser, Post};

/// Decides whether a user may edit or delete a post.
pub trait PostPolicy: Send + Sync {
    fn can_manage(&self, user: Option<&ActingUser>, post: &Post) -> bool;
}

/// Admins manage every post, members manage the posts they own.
pub struct OwnershipPolicy;

impl PostPolicy for OwnershipPolicy {
    fn can_manage(&self, user: Option<&ActingUser>, post: &Post) -> bool {
        let Some(user) = user else { return false };
        if user.is_admin() {
            return true;
        }
        post.user_id == Some(user.id)
    }
}
