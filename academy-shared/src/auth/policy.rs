/// Role based authorization policies
///
/// Every check is a pure function of the acting user ([`Actor`]) and the
/// records involved, so handlers load what they need and then ask the policy.
/// Checks use the explicit role predicates on [`UserRole`]; rank is never
/// compared.
///
/// # Example
///
/// ```
/// use academy_shared::auth::policy::{Actor, UserPolicy};
/// use academy_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let academy_id = Uuid::new_v4();
/// let admin = Actor::new(Uuid::new_v4(), UserRole::AcademyAdmin, Some(academy_id));
///
/// assert!(UserPolicy::create(&admin, UserRole::Coach, Some(academy_id)).is_ok());
/// assert!(UserPolicy::create(&admin, UserRole::SuperAdmin, Some(academy_id)).is_err());
/// ```

use uuid::Uuid;

use crate::models::academy::Academy;
use crate::models::player_guardian::PlayerGuardian;
use crate::models::user::{User, UserRole};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("Not authorized to perform this action")]
    NotAuthorized,

    #[error("Not allowed to assign the {0} role")]
    CannotAssignRole(UserRole),

    #[error("You cannot delete your own account")]
    SelfDeletion,
}

/// The acting user as seen by the policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
    pub academy_id: Option<Uuid>,
}

impl Actor {
    pub fn new(id: Uuid, role: UserRole, academy_id: Option<Uuid>) -> Self {
        Self {
            id,
            role,
            academy_id,
        }
    }

    fn is(&self, user_id: Uuid) -> bool {
        self.id == user_id
    }

    /// Whether the actor belongs to `academy_id` (false when either is unset)
    fn in_academy(&self, academy_id: Option<Uuid>) -> bool {
        matches!((self.academy_id, academy_id), (Some(mine), Some(theirs)) if mine == theirs)
    }

    fn is_staff_of(&self, academy_id: Option<Uuid>) -> bool {
        self.role.is_academy_staff() && self.in_academy(academy_id)
    }

    fn is_manager_of(&self, academy_id: Option<Uuid>) -> bool {
        self.role.is_academy_manager() && self.in_academy(academy_id)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.id, user.role, user.academy_id)
    }
}

/// Which records a listing may include
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Academy(Uuid),
    Nothing,
}

impl Scope {
    /// Narrows a requested academy filter to what the scope allows
    ///
    /// Returns `None` when the request asks for an academy outside the scope.
    pub fn restrict(&self, requested: Option<Uuid>) -> Option<Option<Uuid>> {
        match (self, requested) {
            (Scope::All, requested) => Some(requested),
            (Scope::Academy(own), None) => Some(Some(*own)),
            (Scope::Academy(own), Some(requested)) if *own == requested => Some(Some(requested)),
            _ => None,
        }
    }
}

fn allow(condition: bool) -> Result<(), AuthzError> {
    if condition {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Access to user accounts
pub struct UserPolicy;

impl UserPolicy {
    pub fn index(actor: &Actor) -> Result<Scope, AuthzError> {
        if actor.role.is_super_admin() {
            return Ok(Scope::All);
        }

        match actor.academy_id {
            Some(academy_id) if actor.role.is_academy_staff() => Ok(Scope::Academy(academy_id)),
            _ => Err(AuthzError::NotAuthorized),
        }
    }

    pub fn show(actor: &Actor, target: &User) -> Result<(), AuthzError> {
        allow(
            actor.role.is_super_admin()
                || actor.is(target.id)
                || actor.is_staff_of(target.academy_id),
        )
    }

    /// Creating an account with `role` in `academy_id`
    pub fn create(
        actor: &Actor,
        role: UserRole,
        academy_id: Option<Uuid>,
    ) -> Result<(), AuthzError> {
        if actor.role.is_super_admin() {
            return Ok(());
        }

        allow(actor.is_manager_of(academy_id))?;

        if !actor.role.can_assign(role) {
            return Err(AuthzError::CannotAssignRole(role));
        }

        Ok(())
    }

    /// Replacing `current` with `proposed` (the same account after the edit)
    pub fn update(actor: &Actor, current: &User, proposed: &User) -> Result<(), AuthzError> {
        if actor.role.is_super_admin() {
            return Ok(());
        }

        if actor.is(current.id) {
            if proposed.role != current.role {
                return Err(AuthzError::CannotAssignRole(proposed.role));
            }
            return allow(proposed.academy_id == current.academy_id);
        }

        allow(
            actor.is_manager_of(current.academy_id)
                && actor.is_manager_of(proposed.academy_id)
                && actor.role.can_assign(current.role),
        )?;

        if !actor.role.can_assign(proposed.role) {
            return Err(AuthzError::CannotAssignRole(proposed.role));
        }

        Ok(())
    }

    pub fn destroy(actor: &Actor, target: &User) -> Result<(), AuthzError> {
        if actor.is(target.id) {
            return Err(AuthzError::SelfDeletion);
        }

        if actor.role.is_super_admin() {
            return Ok(());
        }

        allow(
            actor.role == UserRole::AcademyOwner
                && actor.in_academy(target.academy_id)
                && !matches!(target.role, UserRole::AcademyOwner | UserRole::SuperAdmin),
        )
    }
}

/// Access to academies
pub struct AcademyPolicy;

impl AcademyPolicy {
    /// Every signed-in user may list; non-admins only see their own academy
    pub fn index(actor: &Actor) -> Scope {
        if actor.role.is_super_admin() {
            return Scope::All;
        }

        actor.academy_id.map_or(Scope::Nothing, Scope::Academy)
    }

    pub fn show(actor: &Actor, academy: &Academy) -> Result<(), AuthzError> {
        allow(actor.role.is_super_admin() || actor.in_academy(Some(academy.id)))
    }

    pub fn create(actor: &Actor) -> Result<(), AuthzError> {
        allow(actor.role.is_super_admin())
    }

    /// Owners may edit their academy but not change its status
    pub fn update(actor: &Actor, current: &Academy, proposed: &Academy) -> Result<(), AuthzError> {
        if actor.role.is_super_admin() {
            return Ok(());
        }

        allow(
            actor.role == UserRole::AcademyOwner
                && actor.in_academy(Some(current.id))
                && proposed.status == current.status,
        )
    }

    pub fn destroy(actor: &Actor) -> Result<(), AuthzError> {
        allow(actor.role.is_super_admin())
    }
}

/// Access to player-guardian relationships
pub struct GuardianPolicy;

impl GuardianPolicy {
    /// Inviting a guardian for `player`
    pub fn invite(actor: &Actor, player: &User) -> Result<(), AuthzError> {
        allow(actor.role.is_super_admin() || actor.is_staff_of(player.academy_id))
    }

    /// Listing `player`'s guardians
    ///
    /// `linked_guardian` tells whether the actor already has a relationship
    /// with the player.
    pub fn list(actor: &Actor, player: &User, linked_guardian: bool) -> Result<(), AuthzError> {
        if Self::invite(actor, player).is_ok() || actor.is(player.id) {
            return Ok(());
        }

        allow(actor.role == UserRole::Parent && linked_guardian)
    }

    /// Accepting or declining
    pub fn respond(actor: &Actor, relationship: &PlayerGuardian) -> Result<(), AuthzError> {
        allow(actor.is(relationship.guardian_id) || actor.role.is_super_admin())
    }

    pub fn revoke(
        actor: &Actor,
        relationship: &PlayerGuardian,
        player: &User,
    ) -> Result<(), AuthzError> {
        allow(
            actor.is(relationship.guardian_id)
                || actor.role.is_super_admin()
                || actor.is_manager_of(player.academy_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::academy::AcademyStatus;
    use crate::models::player_guardian::{GuardianStatus, RelationshipType};
    use chrono::Utc;

    fn user(role: UserRole, academy_id: Option<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@academy.test", role),
            password_hash: String::new(),
            role,
            first_name: Some("Sam".to_string()),
            last_name: Some("Jones".to_string()),
            phone: None,
            academy_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_sign_in_at: None,
        }
    }

    fn academy(id: Uuid) -> Academy {
        Academy {
            id,
            name: "North FC".to_string(),
            email: "info@northfc.test".to_string(),
            subdomain: "north-fc".to_string(),
            status: AcademyStatus::Active,
            address: None,
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn relationship(player: &User, guardian: &User) -> PlayerGuardian {
        PlayerGuardian {
            id: Uuid::new_v4(),
            player_id: player.id,
            guardian_id: guardian.id,
            relationship_type: RelationshipType::Father,
            status: GuardianStatus::Pending,
            invited_by: None,
            invited_at: Utc::now(),
            accepted_at: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn actor(user: &User) -> Actor {
        Actor::from(user)
    }

    #[test]
    fn test_user_index_scope() {
        let academy_id = Uuid::new_v4();

        assert_eq!(
            UserPolicy::index(&actor(&user(UserRole::SuperAdmin, None))),
            Ok(Scope::All)
        );
        assert_eq!(
            UserPolicy::index(&actor(&user(UserRole::Coach, Some(academy_id)))),
            Ok(Scope::Academy(academy_id))
        );
        assert_eq!(
            UserPolicy::index(&actor(&user(UserRole::Parent, Some(academy_id)))),
            Err(AuthzError::NotAuthorized)
        );
    }

    #[test]
    fn test_scope_restrict() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(Scope::All.restrict(Some(other)), Some(Some(other)));
        assert_eq!(Scope::All.restrict(None), Some(None));
        assert_eq!(Scope::Academy(own).restrict(None), Some(Some(own)));
        assert_eq!(Scope::Academy(own).restrict(Some(own)), Some(Some(own)));
        assert_eq!(Scope::Academy(own).restrict(Some(other)), None);
        assert_eq!(Scope::Nothing.restrict(None), None);
    }

    #[test]
    fn test_user_show() {
        let academy_id = Uuid::new_v4();
        let player = user(UserRole::Player, Some(academy_id));

        assert!(UserPolicy::show(&actor(&player), &player).is_ok());
        assert!(UserPolicy::show(&actor(&user(UserRole::Staff, Some(academy_id))), &player).is_ok());
        assert!(UserPolicy::show(&actor(&user(UserRole::Staff, Some(Uuid::new_v4()))), &player).is_err());
        assert!(UserPolicy::show(&actor(&user(UserRole::Player, Some(academy_id))), &player).is_err());
    }

    #[test]
    fn test_admin_cannot_create_owner_or_super_admin() {
        let academy_id = Uuid::new_v4();
        let admin = actor(&user(UserRole::AcademyAdmin, Some(academy_id)));

        assert_eq!(
            UserPolicy::create(&admin, UserRole::SuperAdmin, Some(academy_id)),
            Err(AuthzError::CannotAssignRole(UserRole::SuperAdmin))
        );
        assert_eq!(
            UserPolicy::create(&admin, UserRole::AcademyOwner, Some(academy_id)),
            Err(AuthzError::CannotAssignRole(UserRole::AcademyOwner))
        );
        assert!(UserPolicy::create(&admin, UserRole::Player, Some(academy_id)).is_ok());
    }

    #[test]
    fn test_create_in_foreign_academy_denied() {
        let owner = actor(&user(UserRole::AcademyOwner, Some(Uuid::new_v4())));

        assert_eq!(
            UserPolicy::create(&owner, UserRole::Coach, Some(Uuid::new_v4())),
            Err(AuthzError::NotAuthorized)
        );
        assert_eq!(
            UserPolicy::create(&owner, UserRole::Coach, None),
            Err(AuthzError::NotAuthorized)
        );
    }

    #[test]
    fn test_coach_cannot_create_accounts() {
        let academy_id = Uuid::new_v4();
        let coach = actor(&user(UserRole::Coach, Some(academy_id)));

        assert!(UserPolicy::create(&coach, UserRole::Player, Some(academy_id)).is_err());
    }

    #[test]
    fn test_self_update_cannot_change_role() {
        let coach = user(UserRole::Coach, Some(Uuid::new_v4()));
        let mut renamed = coach.clone();
        renamed.first_name = Some("Alex".to_string());
        let mut promoted = coach.clone();
        promoted.role = UserRole::AcademyOwner;

        assert!(UserPolicy::update(&actor(&coach), &coach, &renamed).is_ok());
        assert_eq!(
            UserPolicy::update(&actor(&coach), &coach, &promoted),
            Err(AuthzError::CannotAssignRole(UserRole::AcademyOwner))
        );
    }

    #[test]
    fn test_admin_update_limits() {
        let academy_id = Uuid::new_v4();
        let admin = actor(&user(UserRole::AcademyAdmin, Some(academy_id)));
        let player = user(UserRole::Player, Some(academy_id));

        let mut to_coach = player.clone();
        to_coach.role = UserRole::Coach;
        assert!(UserPolicy::update(&admin, &player, &to_coach).is_ok());

        let mut to_admin = player.clone();
        to_admin.role = UserRole::AcademyAdmin;
        assert_eq!(
            UserPolicy::update(&admin, &player, &to_admin),
            Err(AuthzError::CannotAssignRole(UserRole::AcademyAdmin))
        );

        let owner = user(UserRole::AcademyOwner, Some(academy_id));
        assert!(UserPolicy::update(&admin, &owner, &owner).is_err());

        let mut moved = player.clone();
        moved.academy_id = Some(Uuid::new_v4());
        assert!(UserPolicy::update(&admin, &player, &moved).is_err());
    }

    #[test]
    fn test_nobody_deletes_themselves() {
        for role in UserRole::ALL {
            let me = user(role, Some(Uuid::new_v4()));
            assert_eq!(
                UserPolicy::destroy(&actor(&me), &me),
                Err(AuthzError::SelfDeletion)
            );
        }
    }

    #[test]
    fn test_destroy_rules() {
        let academy_id = Uuid::new_v4();
        let owner = actor(&user(UserRole::AcademyOwner, Some(academy_id)));
        let admin = actor(&user(UserRole::AcademyAdmin, Some(academy_id)));
        let coach = user(UserRole::Coach, Some(academy_id));
        let other_owner = user(UserRole::AcademyOwner, Some(academy_id));
        let foreign_coach = user(UserRole::Coach, Some(Uuid::new_v4()));

        assert!(UserPolicy::destroy(&owner, &coach).is_ok());
        assert!(UserPolicy::destroy(&owner, &other_owner).is_err());
        assert!(UserPolicy::destroy(&owner, &foreign_coach).is_err());
        assert!(UserPolicy::destroy(&admin, &coach).is_err());
        assert!(UserPolicy::destroy(&actor(&user(UserRole::SuperAdmin, None)), &other_owner).is_ok());
    }

    #[test]
    fn test_academy_policy() {
        let academy_id = Uuid::new_v4();
        let north = academy(academy_id);
        let super_admin = actor(&user(UserRole::SuperAdmin, None));
        let owner = actor(&user(UserRole::AcademyOwner, Some(academy_id)));
        let admin = actor(&user(UserRole::AcademyAdmin, Some(academy_id)));
        let outsider = actor(&user(UserRole::AcademyOwner, Some(Uuid::new_v4())));

        assert_eq!(AcademyPolicy::index(&super_admin), Scope::All);
        assert_eq!(AcademyPolicy::index(&admin), Scope::Academy(academy_id));
        assert_eq!(AcademyPolicy::index(&actor(&user(UserRole::Player, None))), Scope::Nothing);

        assert!(AcademyPolicy::show(&admin, &north).is_ok());
        assert!(AcademyPolicy::show(&outsider, &north).is_err());

        assert!(AcademyPolicy::create(&super_admin).is_ok());
        assert!(AcademyPolicy::create(&owner).is_err());
        assert!(AcademyPolicy::destroy(&owner).is_err());

        let mut renamed = north.clone();
        renamed.name = "North FC Juniors".to_string();
        assert!(AcademyPolicy::update(&owner, &north, &renamed).is_ok());
        assert!(AcademyPolicy::update(&admin, &north, &renamed).is_err());
        assert!(AcademyPolicy::update(&outsider, &north, &renamed).is_err());

        let mut suspended = north.clone();
        suspended.status = AcademyStatus::Suspended;
        assert!(AcademyPolicy::update(&owner, &north, &suspended).is_err());
        assert!(AcademyPolicy::update(&super_admin, &north, &suspended).is_ok());
    }

    #[test]
    fn test_staff_of_other_academy_cannot_invite() {
        let player = user(UserRole::Player, Some(Uuid::new_v4()));

        assert!(GuardianPolicy::invite(&actor(&user(UserRole::Coach, player.academy_id)), &player).is_ok());
        assert!(GuardianPolicy::invite(&actor(&user(UserRole::Coach, Some(Uuid::new_v4()))), &player).is_err());
        assert!(GuardianPolicy::invite(&actor(&user(UserRole::Parent, player.academy_id)), &player).is_err());
        assert!(GuardianPolicy::invite(&actor(&user(UserRole::SuperAdmin, None)), &player).is_ok());
    }

    #[test]
    fn test_guardian_list() {
        let player = user(UserRole::Player, Some(Uuid::new_v4()));
        let parent = user(UserRole::Parent, player.academy_id);

        assert!(GuardianPolicy::list(&actor(&player), &player, false).is_ok());
        assert!(GuardianPolicy::list(&actor(&parent), &player, true).is_ok());
        assert!(GuardianPolicy::list(&actor(&parent), &player, false).is_err());

        let other_player = user(UserRole::Player, player.academy_id);
        assert!(GuardianPolicy::list(&actor(&other_player), &player, false).is_err());
    }

    #[test]
    fn test_respond_and_revoke() {
        let academy_id = Some(Uuid::new_v4());
        let player = user(UserRole::Player, academy_id);
        let guardian = user(UserRole::Parent, academy_id);
        let link = relationship(&player, &guardian);

        assert!(GuardianPolicy::respond(&actor(&guardian), &link).is_ok());
        assert!(GuardianPolicy::respond(&actor(&player), &link).is_err());
        assert!(GuardianPolicy::respond(&actor(&user(UserRole::AcademyOwner, academy_id)), &link).is_err());

        assert!(GuardianPolicy::revoke(&actor(&guardian), &link, &player).is_ok());
        assert!(GuardianPolicy::revoke(&actor(&user(UserRole::AcademyAdmin, academy_id)), &link, &player).is_ok());
        assert!(GuardianPolicy::revoke(&actor(&user(UserRole::Coach, academy_id)), &link, &player).is_err());
        assert!(GuardianPolicy::revoke(&actor(&player), &link, &player).is_err());
    }
}
