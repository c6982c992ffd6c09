//! Authorization policy for users and problems.
//!
//! [`decide`] is the single place where permissions are evaluated. Handlers
//! describe what they are about to do as an [`Action`] (carrying whatever
//! ownership data the rule needs) and call [`authorize`], which turns the
//! [`Decision`] into a [`CoreError`].
//!
//! | Action          | Allowed when                                                 |
//! |-----------------|--------------------------------------------------------------|
//! | `ViewProblem`   | always, including anonymous callers                          |
//! | `CreateProblem` | role is admin or tecnico                                     |
//! | `EditProblem`   | role is admin, or caller authored the problem                |
//! | `DeleteProblem` | role is admin                                                |
//! | `RegisterUser`  | role is admin                                                |
//! | `ListUsers`     | role is admin                                                |
//! | `UpdateUser`    | role is admin                                                |
//! | `ViewUser`      | role is admin, or caller is the target                       |
//! | `DeleteUser`    | role is admin, target is not the caller, not the last admin  |
//! | `InitialSetup`  | no admin exists yet                                          |

use crate::error::CoreError;
use crate::roles::Role;
use crate::types::DbId;

/// Message attached to every denial so callers learn nothing about the target.
pub const DENIED_MESSAGE: &str = "Unauthorized access";

/// Message attached when an operation needs a session and none was presented.
pub const UNAUTHENTICATED_MESSAGE: &str = "Not authenticated";

/// The resolved identity of the user making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: DbId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: DbId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// An operation to be checked, with the target data its rule depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewProblem,
    CreateProblem,
    EditProblem { author_id: DbId },
    DeleteProblem,
    RegisterUser,
    ListUsers,
    UpdateUser,
    ViewUser { target_id: DbId },
    DeleteUser {
        target_id: DbId,
        target_role: Role,
        /// Number of admins currently in the system, including the target.
        admin_count: i64,
    },
    InitialSetup { admin_count: i64 },
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// The action requires a session and the request carried none.
    Unauthenticated,
    /// The caller's role or ownership does not grant the action.
    Deny,
    /// The caller is entitled in principle but a business rule forbids it.
    Refuse(&'static str),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Evaluate `action` for `caller` (`None` for anonymous requests).
pub fn decide(caller: Option<&Caller>, action: &Action) -> Decision {
    match *action {
        Action::ViewProblem => Decision::Allow,
        Action::InitialSetup { admin_count } => decide_setup(admin_count),
        _ => match caller {
            None => Decision::Unauthenticated,
            Some(caller) => decide_authenticated(caller, action),
        },
    }
}

fn decide_authenticated(caller: &Caller, action: &Action) -> Decision {
    let admin = caller.role.is_admin();
    match *action {
        Action::CreateProblem => allow_if(caller.role.can_author()),
        Action::EditProblem { author_id } => allow_if(admin || caller.user_id == author_id),
        Action::DeleteProblem
        | Action::RegisterUser
        | Action::ListUsers
        | Action::UpdateUser => allow_if(admin),
        Action::ViewUser { target_id } => allow_if(admin || caller.user_id == target_id),
        Action::DeleteUser {
            target_id,
            target_role,
            admin_count,
        } => {
            if !admin {
                Decision::Deny
            } else if caller.user_id == target_id {
                Decision::Refuse("Cannot delete your own user")
            } else if target_role.is_admin() && admin_count <= 1 {
                Decision::Refuse("Cannot delete the last administrator")
            } else {
                Decision::Allow
            }
        }
        Action::ViewProblem => Decision::Allow,
        Action::InitialSetup { admin_count } => decide_setup(admin_count),
    }
}

fn decide_setup(admin_count: i64) -> Decision {
    if admin_count == 0 {
        Decision::Allow
    } else {
        Decision::Refuse("An administrator is already configured")
    }
}

fn allow_if(granted: bool) -> Decision {
    if granted {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Evaluate `action` and map anything but [`Decision::Allow`] to an error.
///
/// - `Unauthenticated` -> [`CoreError::Unauthorized`] (401)
/// - `Deny` -> [`CoreError::Forbidden`] with [`DENIED_MESSAGE`] (403)
/// - `Refuse` -> [`CoreError::Conflict`] with the rule's reason
pub fn authorize(caller: Option<&Caller>, action: &Action) -> Result<(), CoreError> {
    match decide(caller, action) {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => Err(CoreError::Unauthorized(UNAUTHENTICATED_MESSAGE.into())),
        Decision::Deny => Err(CoreError::Forbidden(DENIED_MESSAGE.into())),
        Decision::Refuse(reason) => Err(CoreError::Conflict(reason.into())),
    }
}

/// Whether demoting `target_role` to `new_role` would leave no admin behind.
pub fn demotes_last_admin(target_role: Role, new_role: Role, admin_count: i64) -> bool {
    target_role.is_admin() && !new_role.is_admin() && admin_count <= 1
}
